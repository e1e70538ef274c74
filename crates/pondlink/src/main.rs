mod cli;
mod commands;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pondlink_core::{DeviceManager, FileRegistry};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a manager
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "pond", &mut std::io::stdout());
            Ok(())
        }

        // Everything else operates on the device fleet
        cmd => {
            let manager = build_manager(&cli.global)?;
            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &manager, &cli.global).await
        }
    }
}

/// Build a `DeviceManager` over the file registry from config + flags.
fn build_manager(global: &cli::GlobalOpts) -> Result<DeviceManager<FileRegistry>, CliError> {
    let cfg = match &global.config {
        Some(path) => pondlink_config::load_config_from(path)?,
        None => pondlink_config::load_config()?,
    };
    let settings = pondlink_config::to_manager_settings(&cfg, global.owner.as_deref())?;

    let registry = FileRegistry::open(pondlink_config::registry_dir(&cfg))
        .map_err(|e| CliError::RegistryUnavailable {
            reason: e.to_string(),
        })?;

    DeviceManager::new(Arc::new(registry), settings).map_err(CliError::from)
}
