//! Water usage report handler.

use chrono::{Duration, Local};
use tabled::Tabled;

use pondlink_core::{DeviceManager, FileRegistry};

use crate::cli::{GlobalOpts, UsageArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled, serde::Serialize)]
struct UsageRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Liters")]
    liters: String,
}

pub async fn handle(
    manager: &DeviceManager<FileRegistry>,
    args: UsageArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let record = util::resolve_record(manager, &args.id).await?;

    let today = Local::now().date_naive();
    let mut rows = Vec::new();
    for back in (0..args.days).rev() {
        let day = today - Duration::days(i64::from(back));
        rows.push(UsageRow {
            date: day.to_string(),
            liters: format!("{:.1}", record.water_usage.for_day(day)),
        });
    }

    let rendered = output::render_list(
        &global.output,
        &rows,
        |row| UsageRow {
            date: row.date.clone(),
            liters: row.liters.clone(),
        },
        |row| format!("{} {}", row.date, row.liters),
    );
    output::print_output(&rendered, global.quiet);
    output::print_output(
        &format!("total: {:.1} L", record.water_usage.total()),
        global.quiet,
    );
    Ok(())
}
