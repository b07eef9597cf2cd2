//! Application layer: session state, commands and the two run modes.

mod batch;
mod commands;
mod runner;
mod state;

pub use batch::{BatchOptions, run_batch};
pub use runner::Runner;
pub use state::Session;
