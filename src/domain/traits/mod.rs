//! Domain traits - Abstractions for infrastructure implementations

pub mod platform;
pub mod store;

pub use platform::{Platform, PlatformInfo};
pub use store::{Category, Record, Snapshot, Store};
