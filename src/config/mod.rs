//! Configuration module for VoiceDesk.
//!
//! Provides CLI argument parsing, the synthesis language table and the
//! interface message tables.

#[allow(clippy::module_inception)]
mod config;
pub mod languages;
pub mod locale;

pub use config::AppConfig;
