// ── In-memory registry ──
//
// Test double with the same revision semantics as the file registry,
// plus knobs for injecting the failure modes the engines must absorb:
// a one-shot conflict on the next update, and a sticky unavailable
// state.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::model::{DeviceRecord, RecordId};

use super::{Registry, RegistryError, RecordPatch, apply_patch};

#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: DashMap<RecordId, DeviceRecord>,
    conflict_next_update: AtomicBool,
    unavailable: AtomicBool,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `update` fail with a conflict, once.
    pub fn inject_conflict_on_next_update(&self) {
        self.conflict_next_update.store(true, Ordering::SeqCst);
    }

    /// Make every operation fail with `Unavailable` until cleared.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Out-of-band mutation, as if another client wrote to the registry.
    pub fn put_raw(&self, record: DeviceRecord) {
        self.records.insert(record.id.clone(), record);
    }

    fn check_available(&self) -> Result<(), RegistryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable {
                reason: "injected outage".into(),
            });
        }
        Ok(())
    }
}

impl Registry for MemoryRegistry {
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<DeviceRecord>, RegistryError> {
        self.check_available()?;
        let mut records: Vec<DeviceRecord> = self
            .records
            .iter()
            .filter(|entry| entry.value().owner == owner)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(records)
    }

    async fn get(&self, id: &RecordId) -> Result<DeviceRecord, RegistryError> {
        self.check_available()?;
        self.records
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    async fn create(&self, record: &DeviceRecord) -> Result<(), RegistryError> {
        self.check_available()?;
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.records.contains_key(&record.id) {
            return Err(RegistryError::Invalid {
                message: format!("record {} already exists", record.id),
            });
        }
        let mut stored = record.clone();
        stored.revision = 0;
        self.records.insert(stored.id.clone(), stored);
        Ok(())
    }

    async fn update(&self, id: &RecordId, patch: RecordPatch) -> Result<u64, RegistryError> {
        self.check_available()?;
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.conflict_next_update.swap(false, Ordering::SeqCst) {
            return Err(RegistryError::Conflict { id: id.to_string() });
        }
        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
        let merged = apply_patch(entry.value(), &patch)?;
        let revision = merged.revision;
        *entry.value_mut() = merged;
        Ok(revision)
    }

    async fn delete(&self, id: &RecordId) -> Result<(), RegistryError> {
        self.check_available()?;
        self.records
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{ActuatorBank, DeviceStatus, MacAddress, WaterUsage};
    use chrono::Utc;

    fn record(id: &str) -> DeviceRecord {
        DeviceRecord {
            id: RecordId::from(id),
            owner: "alice".into(),
            device_id: "relay-01".into(),
            mac: MacAddress::new("aa:bb:cc:00:11:22"),
            ip: None,
            site_name: "North pond".into(),
            status: DeviceStatus::Connected,
            actuators: ActuatorBank::default(),
            water_usage: WaterUsage::default(),
            notifications_enabled: true,
            updated_at: Utc::now(),
            revision: 0,
        }
    }

    #[tokio::test]
    async fn injected_conflict_fires_once() {
        let reg = MemoryRegistry::new();
        reg.create(&record("alice-relay-01-1")).await.unwrap();
        reg.inject_conflict_on_next_update();

        let id = RecordId::from("alice-relay-01-1");
        let patch = RecordPatch::new(serde_json::json!({"siteName": "x"}));
        assert!(matches!(
            reg.update(&id, patch.clone()).await,
            Err(RegistryError::Conflict { .. })
        ));
        assert_eq!(reg.update(&id, patch).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn outage_blocks_every_operation() {
        let reg = MemoryRegistry::new();
        reg.set_unavailable(true);
        assert!(matches!(
            reg.list_by_owner("alice").await,
            Err(RegistryError::Unavailable { .. })
        ));
        assert!(matches!(
            reg.create(&record("alice-relay-01-1")).await,
            Err(RegistryError::Unavailable { .. })
        ));
        reg.set_unavailable(false);
        reg.create(&record("alice-relay-01-1")).await.unwrap();
    }
}
