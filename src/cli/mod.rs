//! Command-line interface for reelforge.
//!
//! Provides commands for inspecting and salvaging jobs, exercising the music
//! selector, and exporting metrics.

mod commands;

pub use commands::{open_store, parse_cli, run, run_with_cli, Cli, Commands};
