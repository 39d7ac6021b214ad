//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Registry: in-memory desired state
//! - Services: command interpretation, reconciliation, action execution
//! - Errors: Domain-specific errors
//! - Messaging: Command parsing, gate middleware, per-thread dispatching

pub mod errors;
pub mod registry;
pub mod services;
pub mod messaging;
