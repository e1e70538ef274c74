// DeviceManager behavior: cache-first startup, registry-authoritative
// refresh, relay toggling, and removal of unreachable devices.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pondlink_core::{
    Actuator, ActuatorBank, CoreError, DeviceCache, DeviceManager, DeviceRecord, DeviceStatus,
    MacAddress, ManagerSettings, MemoryRegistry, MonitorConfig, ProvisionTuning, RecordId,
    Registry, SyncConfig, WaterUsage,
};

fn record(id: &str, owner: &str, ip: Option<Ipv4Addr>) -> DeviceRecord {
    DeviceRecord {
        id: RecordId::from(id),
        owner: owner.into(),
        device_id: "pond-relay-7f3a".into(),
        mac: MacAddress::new("a4:cf:12:7f:3a:01"),
        ip,
        site_name: "North pond".into(),
        status: DeviceStatus::NotConnected,
        actuators: ActuatorBank::default(),
        water_usage: WaterUsage::new(Utc::now()),
        notifications_enabled: true,
        updated_at: Utc::now(),
        revision: 0,
    }
}

fn settings(cache_dir: &std::path::Path, device_port: u16) -> ManagerSettings {
    ManagerSettings {
        owner: "alice".into(),
        cache_dir: cache_dir.to_path_buf(),
        monitor: MonitorConfig {
            interval: Duration::from_secs(60),
            probe_timeout: Duration::from_millis(300),
            device_port,
        },
        sync: SyncConfig {
            flow_rate_l_per_min: 16.0,
            write_gate: Duration::ZERO,
            probe_timeout: Duration::from_secs(1),
            device_port,
        },
        provision: ProvisionTuning::default(),
    }
}

#[tokio::test]
async fn startup_is_cache_first_and_registry_authoritative() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("cache");

    // Seed the cache with a record the registry no longer has, one it
    // still has, and one belonging to someone else.
    let cache = DeviceCache::open(&cache_dir).unwrap();
    cache.store(&record("alice-pond-relay-7f3a-1", "alice", None));
    cache.store(&record("alice-pond-relay-7f3a-2", "alice", None));
    cache.store(&record("bob-pond-relay-9999-1", "bob", None));

    let registry = Arc::new(MemoryRegistry::new());
    registry
        .create(&record("alice-pond-relay-7f3a-2", "alice", None))
        .await
        .unwrap();

    let manager = DeviceManager::new(Arc::clone(&registry), settings(&cache_dir, 80)).unwrap();
    manager.start().await.unwrap();

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.len(), 1, "stale and foreign records dropped");
    assert_eq!(snapshot[0].id.as_str(), "alice-pond-relay-7f3a-2");
    manager.shutdown().await;
}

#[tokio::test]
async fn registry_outage_degrades_to_cached_fleet() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("cache");

    let cache = DeviceCache::open(&cache_dir).unwrap();
    cache.store(&record("alice-pond-relay-7f3a-1", "alice", None));

    let registry = Arc::new(MemoryRegistry::new());
    registry.set_unavailable(true);

    let manager = DeviceManager::new(Arc::clone(&registry), settings(&cache_dir, 80)).unwrap();
    manager.start().await.unwrap();

    assert_eq!(manager.snapshot().len(), 1, "cached fleet survives the outage");
    manager.shutdown().await;
}

#[tokio::test]
async fn toggle_drives_the_relay_and_refreshes_state() {
    let device = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rpc/Switch.Set"))
        .and(query_param("id", "1"))
        .and(query_param("on", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&device)
        .await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "switches": [
                { "id": 0, "output": false },
                { "id": 1, "output": true, "apower": 1450.0 },
                { "id": 2, "output": false },
                { "id": 3, "output": false }
            ]
        })))
        .mount(&device)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(MemoryRegistry::new());
    let id = RecordId::from("alice-pond-relay-7f3a-1");
    registry
        .create(&record(id.as_str(), "alice", Some(Ipv4Addr::LOCALHOST)))
        .await
        .unwrap();

    let manager = DeviceManager::new(
        Arc::clone(&registry),
        settings(&dir.path().join("cache"), device.address().port()),
    )
    .unwrap();
    manager.refresh_all().await.unwrap();

    manager
        .toggle_actuator(&id, Actuator::Heater, true)
        .await
        .unwrap();

    let after = manager.get(&id).unwrap();
    assert!(after.actuators.heater.on);
    assert!((after.actuators.heater.power - 1450.0).abs() < f64::EPSILON);
    assert!(registry.update_calls() >= 1, "new state reached the registry");
}

#[tokio::test]
async fn toggle_without_address_is_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(MemoryRegistry::new());
    let id = RecordId::from("alice-pond-relay-7f3a-1");
    registry
        .create(&record(id.as_str(), "alice", None))
        .await
        .unwrap();

    let manager = DeviceManager::new(
        Arc::clone(&registry),
        settings(&dir.path().join("cache"), 80),
    )
    .unwrap();
    manager.refresh_all().await.unwrap();

    let err = manager
        .toggle_actuator(&id, Actuator::Pump, true)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DeviceUnreachable { .. }));
}

#[tokio::test]
async fn removal_never_requires_a_reachable_device() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(MemoryRegistry::new());
    let id = RecordId::from("alice-pond-relay-7f3a-1");
    // 192.0.2.0/24 never answers; the device is effectively drowned.
    registry
        .create(&record(id.as_str(), "alice", Some(Ipv4Addr::new(192, 0, 2, 9))))
        .await
        .unwrap();

    let manager = DeviceManager::new(
        Arc::clone(&registry),
        settings(&dir.path().join("cache"), 80),
    )
    .unwrap();
    manager.refresh_all().await.unwrap();

    manager.remove_device(&id).await.unwrap();
    assert!(manager.get(&id).is_none());
    assert!(registry.is_empty());

    // Removing again is idempotent.
    manager.remove_device(&id).await.unwrap();
}

#[tokio::test]
async fn poke_runs_a_reachability_sweep() {
    let device = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(MemoryRegistry::new());
    let id = RecordId::from("alice-pond-relay-7f3a-1");
    registry
        .create(&record(id.as_str(), "alice", Some(Ipv4Addr::LOCALHOST)))
        .await
        .unwrap();

    let manager = DeviceManager::new(
        Arc::clone(&registry),
        settings(&dir.path().join("cache"), device.address().port()),
    )
    .unwrap();
    manager.start().await.unwrap();

    // The startup tick sweeps while no status path answers yet, so the
    // device stays NotConnected.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(manager.get(&id).unwrap().status, DeviceStatus::NotConnected);

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&device)
        .await;
    manager.poke();

    // The sweep interval is a minute; only the poke can reclassify.
    let mut connected = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if manager.get(&id).unwrap().status == DeviceStatus::Connected {
            connected = true;
            break;
        }
    }
    assert!(connected, "poke did not run a reachability sweep");
    manager.shutdown().await;
}

#[tokio::test]
async fn notifications_preference_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(MemoryRegistry::new());
    let id = RecordId::from("alice-pond-relay-7f3a-1");
    registry
        .create(&record(id.as_str(), "alice", None))
        .await
        .unwrap();

    let manager = DeviceManager::new(
        Arc::clone(&registry),
        settings(&dir.path().join("cache"), 80),
    )
    .unwrap();
    manager.refresh_all().await.unwrap();

    manager.set_notifications(&id, false).await.unwrap();
    assert!(!manager.get(&id).unwrap().notifications_enabled);
    assert!(!registry.get(&id).await.unwrap().notifications_enabled);
}

#[tokio::test]
async fn maintenance_flag_is_user_owned() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(MemoryRegistry::new());
    let id = RecordId::from("alice-pond-relay-7f3a-1");
    registry
        .create(&record(id.as_str(), "alice", None))
        .await
        .unwrap();

    let manager = DeviceManager::new(
        Arc::clone(&registry),
        settings(&dir.path().join("cache"), 80),
    )
    .unwrap();
    manager.refresh_all().await.unwrap();

    manager.set_maintenance(&id, true).await.unwrap();
    assert_eq!(
        manager.get(&id).unwrap().status,
        DeviceStatus::MaintenanceRequired
    );

    manager.set_maintenance(&id, false).await.unwrap();
    assert_ne!(
        manager.get(&id).unwrap().status,
        DeviceStatus::MaintenanceRequired
    );
}
