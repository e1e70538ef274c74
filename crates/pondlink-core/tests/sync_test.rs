// Sync engine behavior against a mock device and an in-memory registry:
// the write gate, the suspend flush, and conflict merging.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pondlink_api::HttpProbe;
use pondlink_core::{
    ActuatorBank, DeviceCache, DeviceRecord, DeviceStatus, DeviceStore, MacAddress, MemoryRegistry,
    RecordId, Registry, StateSyncEngine, SyncConfig, WaterUsage,
};

fn record(id: &str, ip: Ipv4Addr, pump_on: bool) -> DeviceRecord {
    let mut actuators = ActuatorBank::default();
    actuators.pump.on = pump_on;
    DeviceRecord {
        id: RecordId::from(id),
        owner: "alice".into(),
        device_id: "pond-relay-7f3a".into(),
        mac: MacAddress::new("a4:cf:12:7f:3a:01"),
        ip: Some(ip),
        site_name: "North pond".into(),
        status: DeviceStatus::Connected,
        actuators,
        water_usage: WaterUsage::new(Utc::now()),
        notifications_enabled: true,
        updated_at: Utc::now(),
        revision: 0,
    }
}

async fn mock_device(pump_on: bool) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "switches": [
                { "id": 0, "output": pump_on, "apower": 38.5 },
                { "id": 1, "output": false },
                { "id": 2, "output": false },
                { "id": 3, "output": false }
            ]
        })))
        .mount(&server)
        .await;
    server
}

fn engine(
    registry: Arc<MemoryRegistry>,
    store: Arc<DeviceStore>,
    port: u16,
    write_gate: Duration,
) -> (StateSyncEngine<MemoryRegistry>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let cache = DeviceCache::open(dir.path().join("cache")).unwrap();
    let engine = StateSyncEngine::new(
        registry,
        store,
        cache,
        HttpProbe::new().unwrap(),
        SyncConfig {
            flow_rate_l_per_min: 16.0,
            write_gate,
            probe_timeout: Duration::from_secs(1),
            device_port: port,
        },
    );
    (engine, dir)
}

#[tokio::test]
async fn registry_writes_are_rate_limited_but_local_state_is_not() {
    let device = mock_device(true).await;
    let registry = Arc::new(MemoryRegistry::new());
    let store = Arc::new(DeviceStore::new());

    let rec = record("alice-pond-relay-7f3a-1", Ipv4Addr::LOCALHOST, true);
    registry.create(&rec).await.unwrap();
    store.upsert(rec.clone());

    let (engine, _dir) = engine(
        Arc::clone(&registry),
        Arc::clone(&store),
        device.address().port(),
        Duration::from_secs(60),
    );

    let before = store.get(&rec.id).unwrap().water_usage.last_sample;
    for _ in 0..5 {
        let current = store.get(&rec.id).unwrap();
        engine.sync_one(&current).await;
    }

    assert_eq!(registry.update_calls(), 1, "only the first write passes the gate");
    let after = store.get(&rec.id).unwrap();
    assert!(after.water_usage.last_sample > before, "local state kept moving");
    assert!((after.actuators.pump.power - 38.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn flush_bypasses_the_write_gate() {
    let device = mock_device(true).await;
    let registry = Arc::new(MemoryRegistry::new());
    let store = Arc::new(DeviceStore::new());

    let rec = record("alice-pond-relay-7f3a-1", Ipv4Addr::LOCALHOST, true);
    registry.create(&rec).await.unwrap();
    store.upsert(rec.clone());

    let (engine, _dir) = engine(
        Arc::clone(&registry),
        Arc::clone(&store),
        device.address().port(),
        Duration::from_secs(60),
    );

    let current = store.get(&rec.id).unwrap();
    engine.sync_one(&current).await;
    let current = store.get(&rec.id).unwrap();
    engine.sync_one(&current).await;
    assert_eq!(registry.update_calls(), 1);

    engine.flush().await;
    assert_eq!(registry.update_calls(), 2, "suspend flush writes immediately");
}

#[tokio::test]
async fn conflict_adopts_server_fields_and_keeps_local_usage() {
    let device = mock_device(true).await;
    let registry = Arc::new(MemoryRegistry::new());
    let store = Arc::new(DeviceStore::new());

    let rec = record("alice-pond-relay-7f3a-1", Ipv4Addr::LOCALHOST, true);
    registry.create(&rec).await.unwrap();
    store.upsert(rec.clone());

    // Another client renamed the site and logged historical usage.
    let yesterday = Local::now().date_naive().pred_opt().unwrap();
    let mut server_copy = rec.clone();
    server_copy.site_name = "Renamed pond".into();
    server_copy.water_usage.add(yesterday, 12.0);
    server_copy.revision = 5;
    registry.put_raw(server_copy);

    registry.inject_conflict_on_next_update();

    let (engine, _dir) = engine(
        Arc::clone(&registry),
        Arc::clone(&store),
        device.address().port(),
        Duration::ZERO,
    );

    let current = store.get(&rec.id).unwrap();
    engine.sync_one(&current).await;

    let merged = store.get(&rec.id).unwrap();
    assert_eq!(merged.site_name, "Renamed pond", "server-owned field adopted");
    assert_eq!(merged.revision, 5, "revision fast-forwarded to the server's");
    assert!(
        (merged.water_usage.for_day(yesterday) - 12.0).abs() < 1e-9,
        "historical usage taken from the server"
    );

    // Next write succeeds against the new revision.
    let current = store.get(&rec.id).unwrap();
    engine.sync_one(&current).await;
    assert_eq!(registry.get(&rec.id).await.unwrap().revision, 6);
}

#[tokio::test]
async fn unreachable_device_is_skipped_entirely() {
    let registry = Arc::new(MemoryRegistry::new());
    let store = Arc::new(DeviceStore::new());

    // 192.0.2.0/24 is reserved for documentation; nothing answers.
    let rec = record("alice-pond-relay-7f3a-1", Ipv4Addr::new(192, 0, 2, 1), true);
    registry.create(&rec).await.unwrap();
    store.upsert(rec.clone());

    let (engine, _dir) = engine(Arc::clone(&registry), Arc::clone(&store), 80, Duration::ZERO);
    engine.sync_cycle().await;

    assert_eq!(registry.update_calls(), 0);
    let unchanged = store.get(&rec.id).unwrap();
    assert_eq!(unchanged.water_usage.total(), rec.water_usage.total());
}
