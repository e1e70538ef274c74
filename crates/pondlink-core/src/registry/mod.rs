// ── Registry abstraction ──
//
// The registry is an opaque, owner-keyed document store. Core only ever
// consumes four operations; everything else about cloud persistence is
// someone else's problem. Patches are shallow merges applied
// server-side under an optimistic revision check.

mod file;
mod memory;

pub use file::FileRegistry;
pub use memory::MemoryRegistry;

use serde_json::Value;
use thiserror::Error;

use crate::model::{DeviceRecord, RecordId};

/// Registry operation errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Concurrent modification: the expected revision no longer matches.
    /// Consumers re-read, merge, and let the next scheduled write win.
    #[error("concurrent modification of record {id}")]
    Conflict { id: String },

    #[error("record not found: {id}")]
    NotFound { id: String },

    #[error("registry unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("invalid record or patch: {message}")]
    Invalid { message: String },
}

/// A shallow field patch with an optimistic concurrency precondition.
#[derive(Debug, Clone)]
pub struct RecordPatch {
    /// JSON object whose top-level fields replace the record's.
    pub fields: Value,
    /// When set, the update is rejected with [`RegistryError::Conflict`]
    /// unless the stored revision matches.
    pub expected_revision: Option<u64>,
}

impl RecordPatch {
    pub fn new(fields: Value) -> Self {
        Self {
            fields,
            expected_revision: None,
        }
    }

    pub fn with_expected_revision(mut self, revision: u64) -> Self {
        self.expected_revision = Some(revision);
        self
    }
}

/// The durable, owner-keyed store of device records.
pub trait Registry: Send + Sync {
    fn list_by_owner(
        &self,
        owner: &str,
    ) -> impl Future<Output = Result<Vec<DeviceRecord>, RegistryError>> + Send;

    fn get(
        &self,
        id: &RecordId,
    ) -> impl Future<Output = Result<DeviceRecord, RegistryError>> + Send;

    /// Store a new record. The stored revision starts at 0.
    fn create(
        &self,
        record: &DeviceRecord,
    ) -> impl Future<Output = Result<(), RegistryError>> + Send;

    /// Shallow-merge `patch` into the record; returns the new revision.
    fn update(
        &self,
        id: &RecordId,
        patch: RecordPatch,
    ) -> impl Future<Output = Result<u64, RegistryError>> + Send;

    fn delete(&self, id: &RecordId) -> impl Future<Output = Result<(), RegistryError>> + Send;
}

/// Apply a shallow patch to a record, bumping the revision.
///
/// Shared by both registry implementations so merge semantics cannot
/// drift between them.
pub(crate) fn apply_patch(
    record: &DeviceRecord,
    patch: &RecordPatch,
) -> Result<DeviceRecord, RegistryError> {
    if let Some(expected) = patch.expected_revision {
        if expected != record.revision {
            return Err(RegistryError::Conflict {
                id: record.id.to_string(),
            });
        }
    }

    let Value::Object(patch_fields) = &patch.fields else {
        return Err(RegistryError::Invalid {
            message: "patch must be a JSON object".into(),
        });
    };

    let mut doc = serde_json::to_value(record).map_err(|e| RegistryError::Invalid {
        message: e.to_string(),
    })?;
    let Value::Object(doc_fields) = &mut doc else {
        return Err(RegistryError::Invalid {
            message: "record did not serialize to an object".into(),
        });
    };

    for (key, value) in patch_fields {
        // The id and revision are server-controlled.
        if key == "id" || key == "revision" {
            continue;
        }
        doc_fields.insert(key.clone(), value.clone());
    }
    doc_fields.insert("revision".into(), Value::from(record.revision + 1));

    serde_json::from_value(doc).map_err(|e| RegistryError::Invalid {
        message: e.to_string(),
    })
}
