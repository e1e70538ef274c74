// ── State sync engine ──
//
// Polls each device's relay and telemetry state, derives water usage
// from pump runtime, and reconciles the result into the store, the
// cache, and (rate-limited) the registry. Local state is always
// current; registry writes are batched behind a minimum interval so a
// chatty device cannot translate into a chatty cloud client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

use pondlink_api::rpc::SwitchStatus;
use pondlink_api::{DeviceAddr, HttpProbe, RpcClient};

use crate::cache::DeviceCache;
use crate::model::{DeviceRecord, DeviceStatus, RecordId};
use crate::registry::{RecordPatch, Registry, RegistryError};
use crate::store::DeviceStore;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Pump throughput used to derive liters from runtime.
    pub flow_rate_l_per_min: f64,
    /// Minimum interval between registry writes per record.
    pub write_gate: Duration,
    /// Per-device poll timeout.
    pub probe_timeout: Duration,
    /// HTTP port devices listen on.
    pub device_port: u16,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flow_rate_l_per_min: 16.0,
            write_gate: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
            device_port: 80,
        }
    }
}

/// Reconciles live device state into the record pipeline.
pub struct StateSyncEngine<R> {
    registry: Arc<R>,
    store: Arc<DeviceStore>,
    cache: DeviceCache,
    probe: HttpProbe,
    config: SyncConfig,
    /// Per-record timestamp of the last accepted registry write.
    last_write: DashMap<RecordId, Instant>,
}

impl<R: Registry> StateSyncEngine<R> {
    pub fn new(
        registry: Arc<R>,
        store: Arc<DeviceStore>,
        cache: DeviceCache,
        probe: HttpProbe,
        config: SyncConfig,
    ) -> Self {
        Self {
            registry,
            store,
            cache,
            probe,
            config,
            last_write: DashMap::new(),
        }
    }

    /// Poll and reconcile every device that has an address.
    pub async fn sync_cycle(&self) {
        let snapshot = self.store.snapshot();
        for record in snapshot.iter() {
            self.sync_one(record).await;
        }
    }

    /// Poll one device and fold the result into local and remote state.
    pub async fn sync_one(&self, record: &DeviceRecord) {
        let Some(ip) = record.ip else {
            return;
        };

        let addr = DeviceAddr::from_ip_port(ip, self.config.device_port);
        let rpc = RpcClient::new(self.probe.clone(), addr, self.config.probe_timeout);
        let status = match rpc.full_status().await {
            Ok(status) => status,
            Err(e) => {
                // Reachability bookkeeping belongs to the monitor.
                debug!(id = %record.id, error = %e, "device poll failed, skipping");
                return;
            }
        };

        let updated = integrate(record, &status.switches, Utc::now(), self.config.flow_rate_l_per_min);

        // Local state first: the UI must never wait on the registry.
        self.store.upsert(updated.clone());
        self.cache.store(&updated);

        if self.gate_open(&updated.id) {
            self.write_registry(&updated).await;
        }
    }

    /// Push every record's current state to the registry, ignoring the
    /// write gate. Called when the process is about to suspend or exit.
    pub async fn flush(&self) {
        let snapshot = self.store.snapshot();
        for record in snapshot.iter() {
            self.write_registry(record).await;
        }
    }

    fn gate_open(&self, id: &RecordId) -> bool {
        match self.last_write.get(id) {
            Some(last) => last.elapsed() >= self.config.write_gate,
            None => true,
        }
    }

    async fn write_registry(&self, record: &DeviceRecord) {
        let patch = RecordPatch::new(serde_json::json!({
            "actuators": record.actuators,
            "waterUsage": record.water_usage,
            "ip": record.ip,
            "status": record.status,
            "updatedAt": record.updated_at,
        }))
        .with_expected_revision(record.revision);

        match self.registry.update(&record.id, patch).await {
            Ok(revision) => {
                self.last_write.insert(record.id.clone(), Instant::now());
                let mut stored = record.clone();
                stored.revision = revision;
                self.store.upsert(stored.clone());
                self.cache.store(&stored);
            }
            Err(RegistryError::Conflict { .. }) => {
                debug!(id = %record.id, "sync write conflicted, merging server copy");
                self.merge_conflict(record).await;
            }
            Err(e) => {
                // Local state stays authoritative; a later gated write
                // carries the accumulated changes.
                warn!(id = %record.id, error = %e, "sync write failed");
            }
        }
    }

    /// Conflict path: adopt the server record, fold local usage and live
    /// actuator state back in, and let the next gated write carry it.
    async fn merge_conflict(&self, local: &DeviceRecord) {
        let server = match self.registry.get(&local.id).await {
            Ok(server) => server,
            Err(e) => {
                warn!(id = %local.id, error = %e, "refetch after conflict failed");
                return;
            }
        };

        let mut merged = local.clone();
        merged.revision = server.revision;
        // Fields other writers own: keep the server's view.
        merged.site_name = server.site_name.clone();
        merged.notifications_enabled = server.notifications_enabled;
        if server.status == DeviceStatus::MaintenanceRequired {
            merged.status = server.status;
        }

        let today = Local::now().date_naive();
        merged
            .water_usage
            .merge_server(&server.water_usage.daily, today);

        self.store.upsert(merged.clone());
        self.cache.store(&merged);
    }
}

/// Fold a device status snapshot into a record, integrating pump
/// runtime into the day's water usage.
///
/// Usage accrues only for intervals where the pump was on at both
/// sample points. The interval is attributed to the local calendar
/// date of `now`.
pub fn integrate(
    record: &DeviceRecord,
    switches: &[SwitchStatus],
    now: DateTime<Utc>,
    flow_rate_l_per_min: f64,
) -> DeviceRecord {
    let mut updated = record.clone();

    let pump_was_on = updated.actuators.pump.on;
    updated.actuators.apply_switches(switches);
    let pump_still_on = updated.actuators.pump.on;

    if pump_was_on && pump_still_on {
        let elapsed = (now - updated.water_usage.last_sample)
            .num_milliseconds()
            .max(0) as f64
            / 60_000.0;
        let day = now.with_timezone(&Local).date_naive();
        updated.water_usage.add(day, elapsed * flow_rate_l_per_min);
    }
    updated.water_usage.last_sample = now;
    updated.updated_at = now;
    updated
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{ActuatorBank, MacAddress, WaterUsage};
    use chrono::TimeZone;

    fn record_with_pump(on: bool, last_sample: DateTime<Utc>) -> DeviceRecord {
        let mut actuators = ActuatorBank::default();
        actuators.pump.on = on;
        DeviceRecord {
            id: RecordId::from("a-1"),
            owner: "alice".into(),
            device_id: "relay-01".into(),
            mac: MacAddress::new("aa:bb:cc:00:11:22"),
            ip: None,
            site_name: "North pond".into(),
            status: DeviceStatus::Connected,
            actuators,
            water_usage: WaterUsage::new(last_sample),
            notifications_enabled: true,
            updated_at: last_sample,
            revision: 0,
        }
    }

    fn pump_switch(on: bool) -> SwitchStatus {
        SwitchStatus {
            id: 0,
            output: on,
            ..Default::default()
        }
    }

    #[test]
    fn usage_accrues_while_pump_runs() {
        let t0 = Utc.with_ymd_and_hms(2026, 8, 29, 10, 0, 0).unwrap();
        let t1 = t0 + chrono::Duration::minutes(3);
        let rec = record_with_pump(true, t0);

        let updated = integrate(&rec, &[pump_switch(true)], t1, 16.0);
        let day = t1.with_timezone(&Local).date_naive();
        assert!((updated.water_usage.for_day(day) - 48.0).abs() < 1e-6);
        assert_eq!(updated.water_usage.last_sample, t1);
    }

    #[test]
    fn no_usage_when_pump_was_off() {
        let t0 = Utc.with_ymd_and_hms(2026, 8, 29, 10, 0, 0).unwrap();
        let t1 = t0 + chrono::Duration::minutes(3);
        let rec = record_with_pump(false, t0);

        // Pump turned on somewhere inside the interval; the interval
        // itself does not count.
        let updated = integrate(&rec, &[pump_switch(true)], t1, 16.0);
        assert!((updated.water_usage.total()).abs() < 1e-9);
        assert!(updated.actuators.pump.on);
    }

    #[test]
    fn no_usage_when_pump_turned_off() {
        let t0 = Utc.with_ymd_and_hms(2026, 8, 29, 10, 0, 0).unwrap();
        let t1 = t0 + chrono::Duration::minutes(3);
        let rec = record_with_pump(true, t0);

        let updated = integrate(&rec, &[pump_switch(false)], t1, 16.0);
        assert!((updated.water_usage.total()).abs() < 1e-9);
    }

    #[test]
    fn usage_is_monotonic_across_samples() {
        let t0 = Utc.with_ymd_and_hms(2026, 8, 29, 10, 0, 0).unwrap();
        let mut rec = record_with_pump(true, t0);

        let mut previous_total = 0.0;
        for i in 1..=10 {
            let now = t0 + chrono::Duration::seconds(i * 30);
            rec = integrate(&rec, &[pump_switch(true)], now, 16.0);
            let total = rec.water_usage.total();
            assert!(total >= previous_total, "usage never decreases");
            previous_total = total;
        }
        // 10 samples x 30s at 16 l/min = 80 liters.
        assert!((previous_total - 80.0).abs() < 1e-6);
    }

    #[test]
    fn clock_rollback_adds_nothing() {
        let t0 = Utc.with_ymd_and_hms(2026, 8, 29, 10, 0, 0).unwrap();
        let rec = record_with_pump(true, t0);

        let earlier = t0 - chrono::Duration::minutes(5);
        let updated = integrate(&rec, &[pump_switch(true)], earlier, 16.0);
        assert!((updated.water_usage.total()).abs() < 1e-9);
        assert_eq!(updated.water_usage.last_sample, earlier);
    }

    #[test]
    fn telemetry_snapshot_replaces_bank() {
        let t0 = Utc.with_ymd_and_hms(2026, 8, 29, 10, 0, 0).unwrap();
        let rec = record_with_pump(false, t0);

        let switches = vec![
            SwitchStatus {
                id: 1,
                output: true,
                apower: 1200.0,
                voltage: 229.5,
                ..Default::default()
            },
        ];
        let updated = integrate(&rec, &switches, t0, 16.0);
        assert!(updated.actuators.heater.on);
        assert!((updated.actuators.heater.power - 1200.0).abs() < f64::EPSILON);
    }
}
