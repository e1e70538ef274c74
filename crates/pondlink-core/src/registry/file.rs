// ── File-backed registry ──
//
// One pretty-printed JSON document per record under a base directory,
// named by a sanitized record id. Writes go through a temp file and
// rename so a crash never leaves a half-written document behind.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::model::{DeviceRecord, RecordId};

use super::{Registry, RegistryError, RecordPatch, apply_patch};

/// Registry persisted as JSON documents on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    dir: PathBuf,
}

impl FileRegistry {
    /// Open (creating if needed) a registry rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| RegistryError::Unavailable {
            reason: format!("cannot create {}: {e}", dir.display()),
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &RecordId) -> PathBuf {
        // Record ids may carry arbitrary owner text; keep filenames tame.
        let name: String = id
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    fn read_record(&self, path: &Path) -> Result<DeviceRecord, RegistryError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RegistryError::NotFound {
                    id: path.display().to_string(),
                }
            } else {
                RegistryError::Unavailable {
                    reason: format!("read {}: {e}", path.display()),
                }
            }
        })?;
        serde_json::from_str(&raw).map_err(|e| RegistryError::Invalid {
            message: format!("corrupt record {}: {e}", path.display()),
        })
    }

    fn write_record(&self, path: &Path, record: &DeviceRecord) -> Result<(), RegistryError> {
        let raw = serde_json::to_string_pretty(record).map_err(|e| RegistryError::Invalid {
            message: e.to_string(),
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|e| RegistryError::Unavailable {
            reason: format!("write {}: {e}", tmp.display()),
        })?;
        fs::rename(&tmp, path).map_err(|e| RegistryError::Unavailable {
            reason: format!("rename {}: {e}", path.display()),
        })
    }
}

impl Registry for FileRegistry {
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<DeviceRecord>, RegistryError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| RegistryError::Unavailable {
            reason: format!("list {}: {e}", self.dir.display()),
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| RegistryError::Unavailable {
                reason: e.to_string(),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_record(&path) {
                Ok(record) if record.owner == owner => records.push(record),
                Ok(_) => {}
                Err(RegistryError::Invalid { message }) => {
                    // A corrupt sibling must not hide the rest.
                    debug!(%message, "skipping unreadable record");
                }
                Err(e) => return Err(e),
            }
        }
        records.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(records)
    }

    async fn get(&self, id: &RecordId) -> Result<DeviceRecord, RegistryError> {
        let path = self.path_for(id);
        self.read_record(&path).map_err(|e| match e {
            RegistryError::NotFound { .. } => RegistryError::NotFound { id: id.to_string() },
            other => other,
        })
    }

    async fn create(&self, record: &DeviceRecord) -> Result<(), RegistryError> {
        let path = self.path_for(&record.id);
        if path.exists() {
            return Err(RegistryError::Invalid {
                message: format!("record {} already exists", record.id),
            });
        }
        let mut stored = record.clone();
        stored.revision = 0;
        self.write_record(&path, &stored)
    }

    async fn update(&self, id: &RecordId, patch: RecordPatch) -> Result<u64, RegistryError> {
        let path = self.path_for(id);
        let current = self.read_record(&path).map_err(|e| match e {
            RegistryError::NotFound { .. } => RegistryError::NotFound { id: id.to_string() },
            other => other,
        })?;
        let merged = apply_patch(&current, &patch)?;
        self.write_record(&path, &merged)?;
        Ok(merged.revision)
    }

    async fn delete(&self, id: &RecordId) -> Result<(), RegistryError> {
        let path = self.path_for(id);
        fs::remove_file(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RegistryError::NotFound { id: id.to_string() }
            } else {
                RegistryError::Unavailable {
                    reason: format!("delete {}: {e}", path.display()),
                }
            }
        })
    }
}
