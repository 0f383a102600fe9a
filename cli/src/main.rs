use anyhow::Context;
use clap::Parser;
use std::io;
use std::process::ExitCode;
use thememgr::cli::{Cli, Command};
use thememgr::{commands, config, logger};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref())?;
    logger::setup_logger(config.logging(), cli.verbose).context("Failed to set up logging")?;

    let sandbox_root = cli
        .sandbox
        .clone()
        .unwrap_or_else(|| config.sandbox().root());
    let mut out = io::stdout().lock();

    match &cli.command {
        Command::Inspect { bundle, json } => commands::inspect(&config, bundle, *json, &mut out)?,
        Command::List { dir } => commands::list(&config, dir, &mut out)?,
        Command::Apply(args) => {
            if commands::apply(&config, &sandbox_root, args, &mut out)
                .await?
                .is_none()
            {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Reset { uninstall, keep } => {
            commands::reset(&config, &sandbox_root, *uninstall, keep, &mut out).await?;
        }
        Command::Status { json } => commands::status(&config, &sandbox_root, *json, &mut out)?,
    }

    Ok(ExitCode::SUCCESS)
}
