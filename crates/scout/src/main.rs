//! The `scout` command: ask questions, get answers backed by web search.

#[macro_use]
extern crate tracing;

use std::process::ExitCode;

use scout::shell::Shell;
use scout::{Config, SessionBuilder};
use tokio::io::{self, BufReader};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            warn!("could not load .env file: {err}");
        }
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    debug!("starting with {config:?}");

    let shell = Shell::new(BufReader::new(io::stdin()), std::io::stdout())
        .with_verbose(config.verbose);
    match shell.run(SessionBuilder::from_config(&config)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("terminal error: {err}");
            ExitCode::FAILURE
        }
    }
}
