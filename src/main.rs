//! multidb CLI entry point
//!
//! Parsing, dispatch and output all live in the `cli` module; this maps
//! the outcome to an exit status.

use std::process::ExitCode;

use multidb::cli;

fn main() -> ExitCode {
    match cli::run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        // The JSON envelope could not be written; stderr is all that is left
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
