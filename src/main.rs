#![allow(non_snake_case)]

use std::env;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use shiftBot::cli::{self, Cli};
use shiftBot::config::{AppConfig, Settings};
use shiftBot::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match env::var("CONFIG_FILE") {
        Ok(path) => match AppConfig::from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{}", err);
                return ExitCode::FAILURE;
            }
        },
        Err(_) => AppConfig::default(),
    };
    let settings = match Settings::from_config(&config) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings);

    match cli::run(cli.command, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "fatal");
            ExitCode::FAILURE
        }
    }
}
