// ── In-memory device store ──
//
// Lock-free concurrent storage of device records with O(1) lookups and
// push-based change notification via `watch` channels. The store is
// the read model; the registry and cache are the write-behind targets.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::{DeviceRecord, MacAddress, RecordId};

/// Reactive collection of device records.
///
/// Every mutation bumps a version counter and rebuilds the snapshot
/// that subscribers receive. MAC is a secondary, non-unique index:
/// the registry may legitimately hold several records sharing one
/// hardware address.
pub struct DeviceStore {
    by_id: DashMap<RecordId, Arc<DeviceRecord>>,

    /// MAC -> record ids carrying it. Non-unique by design.
    ids_by_mac: DashMap<MacAddress, Vec<RecordId>>,

    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation for cheap subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<DeviceRecord>>>>,
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_id: DashMap::new(),
            ids_by_mac: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or update a record. Returns `true` if the id was new.
    pub fn upsert(&self, record: DeviceRecord) -> bool {
        let id = record.id.clone();
        let mac = record.mac.clone();

        // Drop a stale MAC index entry when the record's MAC changed.
        if let Some(old) = self.by_id.get(&id) {
            if old.mac != mac {
                let old_mac = old.mac.clone();
                drop(old);
                self.unindex_mac(&old_mac, &id);
            }
        }

        let is_new = self.by_id.insert(id.clone(), Arc::new(record)).is_none();
        let mut ids = self.ids_by_mac.entry(mac).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
        drop(ids);

        self.rebuild_snapshot();
        self.bump_version();
        is_new
    }

    pub fn remove(&self, id: &RecordId) -> Option<Arc<DeviceRecord>> {
        let removed = self.by_id.remove(id).map(|(_, v)| v);
        if let Some(record) = &removed {
            self.unindex_mac(&record.mac, id);
            self.rebuild_snapshot();
            self.bump_version();
        }
        removed
    }

    pub fn get(&self, id: &RecordId) -> Option<Arc<DeviceRecord>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    /// All records carrying `mac`, in no particular order.
    pub fn get_by_mac(&self, mac: &MacAddress) -> Vec<Arc<DeviceRecord>> {
        let Some(ids) = self.ids_by_mac.get(mac) else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// MACs indexed by more than one record.
    pub fn duplicate_macs(&self) -> Vec<MacAddress> {
        self.ids_by_mac
            .iter()
            .filter(|entry| entry.value().len() > 1)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Current snapshot (cheap `Arc` clone), sorted by record id.
    pub fn snapshot(&self) -> Arc<Vec<Arc<DeviceRecord>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<DeviceRecord>>>> {
        self.snapshot.subscribe()
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.by_id.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn unindex_mac(&self, mac: &MacAddress, id: &RecordId) {
        if let Some(mut ids) = self.ids_by_mac.get_mut(mac) {
            ids.retain(|candidate| candidate != id);
            if ids.is_empty() {
                drop(ids);
                self.ids_by_mac.remove_if(mac, |_, ids| ids.is_empty());
            }
        }
    }

    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<DeviceRecord>> =
            self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}
