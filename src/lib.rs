//! warden-bot - keeps chat groups the way their admin locked them
//!
//! Layers follow the usual split: `domain` holds the model and the
//! platform/store seams, `application` the moderation logic, and
//! `infrastructure` the config, JSON storage and platform adapters.

pub mod application;
pub mod domain;
pub mod infrastructure;
