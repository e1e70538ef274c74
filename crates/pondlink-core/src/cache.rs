// ── Local record cache ──
//
// Last-known-good copy of every record, one JSON blob per record id.
// Read once at startup so the UI can render before the registry
// answers; written on every accepted state change. Best effort: cache
// write failures are logged, never fatal.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{DeviceRecord, RecordId};

#[derive(Debug, Clone)]
pub struct DeviceCache {
    dir: PathBuf,
}

impl DeviceCache {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| CoreError::Cache {
            message: format!("cannot create {}: {e}", dir.display()),
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &RecordId) -> PathBuf {
        let name: String = id
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    /// Load every readable cached record. Unreadable blobs are skipped.
    pub fn load_all(&self) -> Vec<DeviceRecord> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()))
            {
                Ok(record) => records.push(record),
                Err(message) => {
                    warn!(path = %path.display(), %message, "skipping unreadable cache entry");
                }
            }
        }
        records
    }

    /// Persist a record snapshot. Failures are logged and swallowed.
    pub fn store(&self, record: &DeviceRecord) {
        let path = self.path_for(&record.id);
        let result = serde_json::to_string(record)
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                let tmp = path.with_extension("json.tmp");
                fs::write(&tmp, raw)
                    .and_then(|()| fs::rename(&tmp, &path))
                    .map_err(|e| e.to_string())
            });
        if let Err(message) = result {
            warn!(id = %record.id, %message, "cache write failed");
        } else {
            debug!(id = %record.id, "cached record");
        }
    }

    pub fn remove(&self, id: &RecordId) {
        let path = self.path_for(id);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(%id, error = %e, "cache remove failed");
            }
        }
    }
}
