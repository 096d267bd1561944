use dlpool_core::logging;

mod cli;

use crate::cli::CliCommand;

fn main() {
    // Workers log to the same file; stdout belongs to the reply.
    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    if let Err(err) = CliCommand::run_from_args() {
        eprintln!("dlpool error: {:#}", err);
        std::process::exit(1);
    }
}
