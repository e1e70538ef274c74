//! Relay toggle handler.

use pondlink_core::{Actuator, DeviceManager, FileRegistry};

use crate::cli::{GlobalOpts, ToggleArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    manager: &DeviceManager<FileRegistry>,
    args: ToggleArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let actuator: Actuator = args.actuator.parse().map_err(|reason| CliError::Validation {
        field: "actuator".into(),
        reason,
    })?;
    let on = util::parse_on_off(&args.state);

    let record = util::resolve_record(manager, &args.id).await?;
    manager.toggle_actuator(&record.id, actuator, on).await?;

    output::print_output(
        &format!("{} {} {}", record.id, actuator, if on { "on" } else { "off" }),
        global.quiet,
    );
    Ok(())
}
