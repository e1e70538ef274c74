// ── Connection monitor ──
//
// Periodically classifies each known device as reachable or not and
// reconciles the record status. Writes are change-driven: a healthy
// fleet generates zero registry traffic from monitoring.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use pondlink_api::endpoints::{self, STATUS_PROBE_PATHS};
use pondlink_api::{DeviceAddr, HttpProbe};

use crate::cache::DeviceCache;
use crate::model::{DeviceRecord, DeviceStatus, RecordId};
use crate::registry::{RecordPatch, Registry, RegistryError};
use crate::store::DeviceStore;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How often the fleet is swept.
    pub interval: Duration,
    /// Per-path probe timeout.
    pub probe_timeout: Duration,
    /// HTTP port devices listen on.
    pub device_port: u16,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(2),
            device_port: 80,
        }
    }
}

/// Sweeps the fleet and reconciles reachability into record status.
pub struct ConnectionMonitor<R> {
    registry: Arc<R>,
    store: Arc<DeviceStore>,
    cache: DeviceCache,
    probe: HttpProbe,
    config: MonitorConfig,
}

impl<R: Registry> ConnectionMonitor<R> {
    pub fn new(
        registry: Arc<R>,
        store: Arc<DeviceStore>,
        cache: DeviceCache,
        probe: HttpProbe,
        config: MonitorConfig,
    ) -> Self {
        Self {
            registry,
            store,
            cache,
            probe,
            config,
        }
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Check every stored device once.
    pub async fn sweep(&self) {
        let snapshot = self.store.snapshot();
        for record in snapshot.iter() {
            self.check_one(record).await;
        }
    }

    /// Classify one device and reconcile its status.
    pub async fn check_one(&self, record: &DeviceRecord) {
        // User-flagged maintenance is sticky; reachability never clears it.
        if record.status == DeviceStatus::MaintenanceRequired {
            return;
        }

        let reachable = match record.ip {
            Some(ip) => self.is_reachable(DeviceAddr::from_ip_port(ip, self.config.device_port)).await,
            None => false,
        };
        let observed = if reachable {
            DeviceStatus::Connected
        } else {
            DeviceStatus::NotConnected
        };

        if observed == record.status {
            return;
        }

        info!(id = %record.id, from = ?record.status, to = ?observed, "device status changed");
        let mut updated = record.clone();
        updated.status = observed;
        updated.updated_at = Utc::now();
        self.persist_status(&updated).await;
    }

    /// A device counts as reachable when any known status path answers
    /// with a success status. Older firmware serves a different subset
    /// of paths, so the probe walks the whole list.
    async fn is_reachable(&self, addr: DeviceAddr) -> bool {
        let timeout = self.config.probe_timeout;
        let probe = &self.probe;
        let result = endpoints::try_in_order(STATUS_PROBE_PATHS, |path| {
            let url = addr.url(path);
            async move {
                let outcome = probe.get(&url, timeout).await;
                outcome.ok().map(|_| ())
            }
        })
        .await;
        result.is_some()
    }

    async fn persist_status(&self, updated: &DeviceRecord) {
        let patch = RecordPatch::new(serde_json::json!({
            "status": updated.status,
            "ip": updated.ip,
            "updatedAt": updated.updated_at,
        }))
        .with_expected_revision(updated.revision);

        match self.registry.update(&updated.id, patch).await {
            Ok(revision) => {
                let mut stored = updated.clone();
                stored.revision = revision;
                self.store.upsert(stored.clone());
                self.cache.store(&stored);
            }
            Err(RegistryError::Conflict { .. }) => {
                // Another writer got there first. Adopt the server copy;
                // the next sweep re-evaluates from it.
                debug!(id = %updated.id, "status write conflicted, refetching");
                self.refresh_from_registry(&updated.id).await;
            }
            Err(e) => {
                // Keep the observed status locally; the registry catches
                // up on a later successful write.
                warn!(id = %updated.id, error = %e, "status write failed");
                self.store.upsert(updated.clone());
                self.cache.store(updated);
            }
        }
    }

    async fn refresh_from_registry(&self, id: &RecordId) {
        match self.registry.get(id).await {
            Ok(record) => {
                self.cache.store(&record);
                self.store.upsert(record);
            }
            Err(e) => warn!(%id, error = %e, "refetch after conflict failed"),
        }
    }
}
