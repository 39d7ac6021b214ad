//! Domain entities - Core business objects with no external dependencies

pub mod ids;
pub mod event;
pub mod thread_state;
pub mod command;
pub mod bot_config;

pub use ids::{ThreadId, UserId};
pub use event::Event;
pub use thread_state::{LockKind, ThreadLocks, ThreadState, DEFAULT_EMOJI};
pub use command::{prefixed_usage, Command, LockTarget, Verb};
pub use bot_config::{BotConfig, DEFAULT_PREFIX};
