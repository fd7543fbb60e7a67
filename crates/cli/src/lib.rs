//! Command-line client: upload scanned images, follow processing, and
//! download the result.

pub mod app;
pub mod args;
pub mod config;
pub mod signals;
pub mod terminal;

pub use app::{run, run_with_commands, CliError, Outcome};
