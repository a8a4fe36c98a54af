//! Serde helpers.

pub mod duration_millis;
