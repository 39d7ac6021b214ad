//! Application services - Business logic orchestration

pub mod command_service;
pub mod executor;
pub mod moderation;
pub mod reconcile_service;

pub use command_service::{CommandService, Interpretation};
pub use executor::{Action, ActionExecutor, FanOutReport};
pub use moderation::{ModerationService, SessionRuntime};
pub use reconcile_service::ReconcileService;
