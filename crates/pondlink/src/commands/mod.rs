//! Command dispatch: bridges CLI args -> DeviceManager calls -> output.

pub mod config_cmd;
pub mod devices;
pub mod monitor_cmd;
pub mod prefs;
pub mod provision;
pub mod toggle;
pub mod usage_cmd;
pub mod util;

use pondlink_core::{DeviceManager, FileRegistry};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a fleet-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    manager: &DeviceManager<FileRegistry>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Provision(args) => provision::handle(manager, args, global).await,
        Command::Devices(args) => devices::handle(manager, args, global).await,
        Command::Toggle(args) => toggle::handle(manager, args, global).await,
        Command::Usage(args) => usage_cmd::handle(manager, args, global).await,
        Command::Monitor(args) => monitor_cmd::handle(manager, args, global).await,
        Command::Notifications(args) => prefs::notifications(manager, args, global).await,
        Command::Maintenance(args) => prefs::maintenance(manager, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
