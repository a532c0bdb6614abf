//! Command-line front end for multidb
//!
//! A thin shell over the facade: one command, one session, one JSON
//! response on stdout.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{execute, run, run_command, run_to};
pub use errors::{CliError, CliErrorCode, CliResult};
