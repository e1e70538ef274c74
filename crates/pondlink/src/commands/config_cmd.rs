//! Config subcommand handlers. These never touch the device fleet.

use pondlink_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = match &global.config {
                Some(path) => pondlink_config::load_config_from(path)?,
                None => pondlink_config::load_config_or_default(),
            };
            let rendered =
                toml::to_string_pretty(&cfg).map_err(|e| CliError::Internal(e.to_string()))?;
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init(init) => {
            let cfg = Config {
                owner: Some(init.owner),
                ..Config::default()
            };
            pondlink_config::save_config(&cfg)?;
            output::print_output(
                &format!("wrote {}", pondlink_config::config_path().display()),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(
                &pondlink_config::config_path().display().to_string(),
                global.quiet,
            );
            Ok(())
        }
    }
}
