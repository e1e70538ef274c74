// ── Device manager ──
//
// Owns the store, the cache, and the three engines, and runs the
// background reconciliation loop. Startup is cache-first: the last
// known fleet renders immediately, then the registry refresh replaces
// it as the authoritative view.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pondlink_api::scan::ScanHit;
use pondlink_api::{
    DeviceAddr, HttpIdentityProber, HttpProbe, RpcClient, SubnetScanner,
};

use crate::cache::DeviceCache;
use crate::error::CoreError;
use crate::model::{Actuator, DeviceRecord, DeviceStatus, RecordId};
use crate::monitor::{ConnectionMonitor, MonitorConfig};
use crate::provision::{ProvisionRequest, ProvisionState, ProvisionTuning, ProvisioningOrchestrator};
use crate::registry::{RecordPatch, Registry, RegistryError};
use crate::store::DeviceStore;
use crate::sync::{StateSyncEngine, SyncConfig};

/// Everything the manager needs to run.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Owner whose records this manager operates on.
    pub owner: String,
    /// Directory for the local record cache.
    pub cache_dir: PathBuf,
    pub monitor: MonitorConfig,
    pub sync: SyncConfig,
    pub provision: ProvisionTuning,
}

struct Inner<R> {
    registry: Arc<R>,
    store: Arc<DeviceStore>,
    cache: DeviceCache,
    probe: HttpProbe,
    settings: ManagerSettings,
    orchestrator: ProvisioningOrchestrator<R>,
    monitor: ConnectionMonitor<R>,
    sync: StateSyncEngine<R>,
    /// Wakes the background loop for an immediate sync pass.
    poke: Notify,
    cancel: CancellationToken,
}

/// Facade over the whole device pipeline. Cheap to clone.
pub struct DeviceManager<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for DeviceManager<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Registry + 'static> DeviceManager<R> {
    pub fn new(registry: Arc<R>, settings: ManagerSettings) -> Result<Self, CoreError> {
        let cache = DeviceCache::open(&settings.cache_dir)?;
        let store = Arc::new(DeviceStore::new());
        let probe = HttpProbe::new()?;

        let orchestrator = ProvisioningOrchestrator::new(
            Arc::clone(&registry),
            probe.clone(),
            settings.provision.clone(),
        );
        let monitor = ConnectionMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            cache.clone(),
            probe.clone(),
            settings.monitor.clone(),
        );
        let sync = StateSyncEngine::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            cache.clone(),
            probe.clone(),
            settings.sync.clone(),
        );

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                store,
                cache,
                probe,
                settings,
                orchestrator,
                monitor,
                sync,
                poke: Notify::new(),
                cancel: CancellationToken::new(),
            }),
        })
    }

    /// Load the cached fleet, refresh from the registry, and start the
    /// background reconciliation loop.
    pub async fn start(&self) -> Result<(), CoreError> {
        let cached = self.inner.cache.load_all();
        info!(records = cached.len(), "loaded cached fleet");
        for record in cached {
            if record.owner == self.inner.settings.owner {
                self.inner.store.upsert(record);
            }
        }

        if let Err(e) = self.refresh_all().await {
            // Cache-first startup: a dead registry degrades to the last
            // known fleet instead of failing.
            warn!(error = %e, "registry refresh failed, running from cache");
        }

        for mac in self.inner.store.duplicate_macs() {
            warn!(%mac, "multiple records share one hardware address");
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.monitor.interval());
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = inner.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        inner.monitor.sweep().await;
                        inner.sync.sync_cycle().await;
                    }
                    () = inner.poke.notified() => {
                        inner.monitor.sweep().await;
                        inner.sync.sync_cycle().await;
                    }
                }
            }
            debug!("background loop stopped");
        });
        Ok(())
    }

    /// Replace the store contents with the registry's view.
    pub async fn refresh_all(&self) -> Result<(), CoreError> {
        let records = self
            .inner
            .registry
            .list_by_owner(&self.inner.settings.owner)
            .await?;

        let fresh_ids: Vec<RecordId> = records.iter().map(|r| r.id.clone()).collect();
        for record in records {
            self.inner.cache.store(&record);
            self.inner.store.upsert(record);
        }
        // The registry is authoritative: drop records it no longer has.
        for id in self.inner.store.ids() {
            if !fresh_ids.contains(&id) {
                self.inner.store.remove(&id);
                self.inner.cache.remove(&id);
            }
        }
        Ok(())
    }

    /// Run a provisioning job; the result lands in the store and cache.
    pub async fn provision(&self, request: &ProvisionRequest) -> Result<DeviceRecord, CoreError> {
        let record = self.inner.orchestrator.provision(request).await?;
        self.inner.store.upsert(record.clone());
        self.inner.cache.store(&record);
        Ok(record)
    }

    /// Progress of the current (or last) provisioning run.
    pub fn provision_progress(&self) -> tokio::sync::watch::Receiver<ProvisionState> {
        self.inner.orchestrator.progress()
    }

    /// Sweep the local subnet for an unprovisioned or lost device.
    pub async fn discover(
        &self,
        local_ip: Ipv4Addr,
        candidates: Option<&[Ipv4Addr]>,
    ) -> Result<ScanHit, CoreError> {
        let tuning = &self.inner.settings.provision;
        let prober = HttpIdentityProber::new(
            self.inner.probe.clone(),
            tuning.device_port,
            tuning.scan.probe_timeout,
        );
        let scanner = SubnetScanner::new(prober, tuning.scan.clone());
        let hit = match candidates {
            Some(candidates) => scanner.scan_candidates(candidates).await,
            None => scanner.scan_subnet(local_ip).await,
        };
        hit.ok_or_else(|| {
            let [a, b, c, _] = local_ip.octets();
            CoreError::DeviceNotFound {
                subnet: format!("{a}.{b}.{c}.0/24"),
            }
        })
    }

    /// Delete a record everywhere. Device reachability is irrelevant:
    /// removing a drowned or powered-off appliance must always work.
    pub async fn remove_device(&self, id: &RecordId) -> Result<(), CoreError> {
        match self.inner.registry.delete(id).await {
            Ok(()) => {}
            // Already gone remotely; still clean up locally.
            Err(RegistryError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        self.inner.store.remove(id);
        self.inner.cache.remove(id);
        info!(%id, "device removed");
        Ok(())
    }

    /// Flip one relay and fold the device's post-toggle state back in.
    pub async fn toggle_actuator(
        &self,
        id: &RecordId,
        actuator: Actuator,
        on: bool,
    ) -> Result<(), CoreError> {
        let record = self
            .inner
            .store
            .get(id)
            .ok_or_else(|| CoreError::RecordNotFound { id: id.to_string() })?;
        let ip = record.ip.ok_or_else(|| CoreError::DeviceUnreachable {
            addr: format!("{id} (no known address)"),
        })?;

        let addr = DeviceAddr::from_ip_port(ip, self.inner.settings.sync.device_port);
        let rpc = RpcClient::new(
            self.inner.probe.clone(),
            addr,
            self.inner.settings.sync.probe_timeout,
        );
        rpc.set_switch(actuator.channel(), on).await?;
        info!(%id, %actuator, on, "relay toggled");

        self.inner.sync.sync_one(&record).await;
        Ok(())
    }

    /// User preference; last write wins, no revision precondition.
    pub async fn set_notifications(&self, id: &RecordId, enabled: bool) -> Result<(), CoreError> {
        let patch = RecordPatch::new(serde_json::json!({
            "notificationsEnabled": enabled,
            "updatedAt": chrono::Utc::now(),
        }));
        self.inner.registry.update(id, patch).await?;
        self.adopt_from_registry(id).await
    }

    /// Set or clear the user-owned maintenance flag.
    pub async fn set_maintenance(&self, id: &RecordId, required: bool) -> Result<(), CoreError> {
        let status = if required {
            DeviceStatus::MaintenanceRequired
        } else {
            // Clearing re-enters normal classification; the next monitor
            // sweep settles the real value.
            DeviceStatus::NotConnected
        };
        let patch = RecordPatch::new(serde_json::json!({
            "status": status,
            "updatedAt": chrono::Utc::now(),
        }));
        self.inner.registry.update(id, patch).await?;
        self.adopt_from_registry(id).await
    }

    /// One synchronous reconciliation pass: reachability sweep followed
    /// by a device poll. Used by one-shot consumers that never start the
    /// background loop.
    pub async fn sweep_once(&self) {
        self.inner.monitor.sweep().await;
        self.inner.sync.sync_cycle().await;
    }

    /// Wake the background loop for an immediate reconciliation pass,
    /// reachability sweep included.
    pub fn poke(&self) {
        self.inner.poke.notify_one();
    }

    /// Push all pending local state to the registry, bypassing the
    /// write gate. Call before the host suspends.
    pub async fn flush_on_suspend(&self) {
        self.inner.sync.flush().await;
    }

    /// Stop the background loop and flush.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.sync.flush().await;
    }

    pub fn get(&self, id: &RecordId) -> Option<Arc<DeviceRecord>> {
        self.inner.store.get(id)
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<DeviceRecord>>> {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<Arc<Vec<Arc<DeviceRecord>>>> {
        self.inner.store.subscribe()
    }

    pub fn duplicate_macs(&self) -> Vec<crate::model::MacAddress> {
        self.inner.store.duplicate_macs()
    }

    async fn adopt_from_registry(&self, id: &RecordId) -> Result<(), CoreError> {
        let record = self.inner.registry.get(id).await?;
        self.inner.cache.store(&record);
        self.inner.store.upsert(record);
        Ok(())
    }
}
