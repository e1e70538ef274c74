//! Monitor handler: continuous reconciliation or a single pass.

use pondlink_core::{DeviceManager, FileRegistry};

use crate::cli::{GlobalOpts, MonitorArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    manager: &DeviceManager<FileRegistry>,
    args: MonitorArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.once {
        manager.refresh_all().await?;
        manager.sweep_once().await;
        summary(manager, global);
        return Ok(());
    }

    manager.start().await?;
    output::print_output("monitoring; press Ctrl-C to stop", global.quiet);

    tokio::signal::ctrl_c().await?;
    // Flush accumulated state before the process goes away.
    manager.shutdown().await;
    summary(manager, global);
    Ok(())
}

fn summary(manager: &DeviceManager<FileRegistry>, global: &GlobalOpts) {
    let color = output::should_color(&global.color);
    for record in manager.snapshot().iter() {
        output::print_output(
            &format!(
                "{}  {}  {}",
                record.id,
                record
                    .ip
                    .map_or_else(|| "-".into(), |ip| ip.to_string()),
                output::status_label(record.status, color)
            ),
            global.quiet,
        );
    }
}
