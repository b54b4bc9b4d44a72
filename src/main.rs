mod cli;
mod execute;
mod logging;

use std::process::ExitCode;
use clap::Parser;
use tracing::error;
use crate::cli::CLI;

fn main() -> ExitCode {
    let cli = CLI::parse();
    logging::init_tracing(cli.log_level);
    match execute::execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            if std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true") {
                println!("::error::{e:#}");
            }
            ExitCode::FAILURE
        }
    }
}
