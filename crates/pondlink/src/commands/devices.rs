//! Device list / show / remove handlers.

use std::sync::Arc;

use tabled::Tabled;

use pondlink_core::{DeviceManager, DeviceRecord, FileRegistry};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Relays")]
    relays: String,
}

fn to_row(record: &Arc<DeviceRecord>, color: bool) -> DeviceRow {
    DeviceRow {
        id: record.id.to_string(),
        site: record.site_name.clone(),
        ip: record.ip.map(|ip| ip.to_string()).unwrap_or_default(),
        mac: record.mac.to_string(),
        status: output::status_label(record.status, color),
        relays: relay_summary(record),
    }
}

/// Compact relay state, e.g. "P:on H:off A:off W:off".
fn relay_summary(record: &DeviceRecord) -> String {
    let onoff = |on: bool| if on { "on" } else { "off" };
    format!(
        "P:{} H:{} A:{} W:{}",
        onoff(record.actuators.pump.on),
        onoff(record.actuators.heater.on),
        onoff(record.actuators.auger.on),
        onoff(record.actuators.high_water.on),
    )
}

fn detail(record: &Arc<DeviceRecord>) -> String {
    let actuator_line = |name: &str, s: &pondlink_core::ActuatorState| {
        format!(
            "{name:<12} {}  {:>7.1} W  {:>5.1} V",
            if s.on { "on " } else { "off" },
            s.power,
            s.voltage
        )
    };
    [
        format!("ID:        {}", record.id),
        format!("Site:      {}", record.site_name),
        format!("Device:    {}", record.device_id),
        format!("MAC:       {}", record.mac),
        format!(
            "IP:        {}",
            record.ip.map_or_else(|| "-".into(), |ip| ip.to_string())
        ),
        format!("Status:    {}", output::status_label(record.status, false)),
        format!(
            "Notify:    {}",
            if record.notifications_enabled { "on" } else { "off" }
        ),
        format!("Updated:   {}", record.updated_at.to_rfc3339()),
        String::new(),
        actuator_line("pump", &record.actuators.pump),
        actuator_line("heater", &record.actuators.heater),
        actuator_line("auger", &record.actuators.auger),
        actuator_line("high-water", &record.actuators.high_water),
        String::new(),
        format!("Water total: {:.1} L", record.water_usage.total()),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    manager: &DeviceManager<FileRegistry>,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            manager.refresh_all().await?;
            let snapshot = manager.snapshot();
            let color = output::should_color(&global.color);

            let rendered = output::render_list(
                &global.output,
                &snapshot,
                |r| to_row(r, color),
                |r| r.id.to_string(),
            );
            output::print_output(&rendered, global.quiet);

            for mac in manager.duplicate_macs() {
                eprintln!("warning: multiple records share hardware address {mac}");
            }
            Ok(())
        }

        DevicesCommand::Show(arg) => {
            let record = util::resolve_record(manager, &arg.id).await?;
            let rendered =
                output::render_single(&global.output, &record, detail, |r| r.id.to_string());
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        DevicesCommand::Remove(arg) => {
            let record = util::resolve_record(manager, &arg.id).await?;
            if !global.yes {
                return Err(CliError::ConfirmationRequired {
                    action: format!("remove {}", record.id),
                });
            }
            manager.remove_device(&record.id).await?;
            output::print_output(&format!("removed {}", record.id), global.quiet);
            Ok(())
        }
    }
}
