//! Per-device user preference handlers.

use pondlink_core::{DeviceManager, FileRegistry};

use crate::cli::{GlobalOpts, MaintenanceArgs, NotificationsArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn notifications(
    manager: &DeviceManager<FileRegistry>,
    args: NotificationsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let enabled = util::parse_on_off(&args.state);
    let record = util::resolve_record(manager, &args.id).await?;
    manager.set_notifications(&record.id, enabled).await?;
    output::print_output(
        &format!(
            "notifications {} for {}",
            if enabled { "enabled" } else { "disabled" },
            record.id
        ),
        global.quiet,
    );
    Ok(())
}

pub async fn maintenance(
    manager: &DeviceManager<FileRegistry>,
    args: MaintenanceArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let required = util::parse_on_off(&args.state);
    let record = util::resolve_record(manager, &args.id).await?;
    manager.set_maintenance(&record.id, required).await?;
    output::print_output(
        &format!(
            "maintenance flag {} for {}",
            if required { "set" } else { "cleared" },
            record.id
        ),
        global.quiet,
    );
    Ok(())
}
