mod cli;
mod signal;

use std::process::ExitCode;

use clap::Parser;
use fishnet_core::Config;
use fishnet_engine::{install_logger, ExitReason, Supervisor};
use log::info;

use crate::cli::Cli;
use crate::signal::SignalHandler;

/// Process exit codes the supervisor loop maps its outcome onto.
const EXIT_OK: u8 = 0;
const EXIT_UPDATE_REQUIRED: u8 = 70;
const EXIT_CONFIG_ERROR: u8 = 78;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Install the censoring logger before anything else can log the key.
    install_logger(&cli.api_key);

    match run(cli) {
        Ok(ExitReason::Shutdown) => {
            info!(target: "fishnet::cli", "fishnet stopped, goodbye");
            ExitCode::from(EXIT_OK)
        }
        Ok(ExitReason::UpdateRequired) => {
            info!(target: "fishnet::cli", "an update is required, exiting for the supervisor to restart us");
            ExitCode::from(EXIT_UPDATE_REQUIRED)
        }
        Err(err) => {
            eprintln!("fishnet: configuration error: {err:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitReason> {
    let custom_options = cli.custom_options()?;

    let mut config = Config::new(
        cli.endpoint.clone(),
        cli.api_key.clone(),
        cli.engine_command_argv(),
        cli.cores,
        cli.threads_per_process,
        cli.memory_mb,
    )?;
    config.engine_dir = cli.engine_dir;
    config.fixed_backoff = cli.fixed_backoff;
    config.custom_options = custom_options;

    let version = env!("CARGO_PKG_VERSION");
    let supervisor = Supervisor::start(&config, version)?;

    let handler = SignalHandler::install()?;
    let reason = supervisor.run(|| handler.poll());
    Ok(reason)
}
