//! Domain layer - Core moderation model with no I/O
//! 
//! This layer contains:
//! - Entities: identifiers, platform events, lock state, commands, bot config
//! - Traits: Abstractions for infrastructure (Platform, Store)

pub mod entities;
pub mod traits;
