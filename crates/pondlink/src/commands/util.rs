//! Shared helpers for command handlers.

use std::sync::Arc;

use pondlink_core::{DeviceManager, DeviceRecord, FileRegistry, RecordId};

use crate::error::CliError;

/// Refresh the fleet and resolve an identifier to a record.
///
/// Accepts a full record id or a unique prefix of one, so users can
/// paste the short form from `devices list`.
pub async fn resolve_record(
    manager: &DeviceManager<FileRegistry>,
    identifier: &str,
) -> Result<Arc<DeviceRecord>, CliError> {
    manager.refresh_all().await?;

    let id = RecordId::new(identifier);
    if let Some(record) = manager.get(&id) {
        return Ok(record);
    }

    let snapshot = manager.snapshot();
    let mut matches = snapshot
        .iter()
        .filter(|r| r.id.as_str().starts_with(identifier));
    match (matches.next(), matches.next()) {
        (Some(record), None) => Ok(Arc::clone(record)),
        (Some(_), Some(_)) => Err(CliError::Validation {
            field: "id".into(),
            reason: format!("'{identifier}' matches more than one record"),
        }),
        _ => Err(CliError::RecordNotFound {
            id: identifier.into(),
        }),
    }
}

/// Parse an on/off word into a bool. Clap constrains the value, so
/// anything else is a programming error upstream.
pub fn parse_on_off(state: &str) -> bool {
    state == "on"
}
