//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: YAML/env configuration loading and credential checks
//! - Storage: JSON file persistence
//! - Adapters: Platform integrations (console, in-memory recorder)

pub mod config;
pub mod storage;
pub mod adapters;
