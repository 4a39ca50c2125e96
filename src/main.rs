//! House rent trainer - Main Entry Point
//!
//! Parses the command line, sets up logging and maps failures to exit codes:
//! 0 on success, 2 when no runs were found to select from, 1 for any other
//! error and 101 for a panic.

use clap::Parser;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;

use house_rent::cli::{self, Cli};
use house_rent::logging::LoggingContext;
use house_rent::RentError;

const PANIC_EXIT_CODE: u8 = 101;

type Outcome = std::thread::Result<anyhow::Result<()>>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Kept alive until main returns so the file writer flushes.
    let _logging = match LoggingContext::init(&cli.paths.log_dir) {
        Ok(context) => Some(context),
        Err(e) => {
            eprintln!("warning: file logging disabled: {}", e);
            None
        }
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| cli::run(cli)));
    ExitCode::from(exit_code(&outcome))
}

fn exit_code(outcome: &Outcome) -> u8 {
    match outcome {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            tracing::error!(error = %format!("{:#}", e), "Unhandled error");
            eprintln!("error: {:#}", e);
            e.downcast_ref::<RentError>().map_or(1, RentError::exit_code)
        }
        Err(payload) => {
            tracing::error!(panic = %panic_message(&**payload), "Unhandled panic");
            PANIC_EXIT_CODE
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
