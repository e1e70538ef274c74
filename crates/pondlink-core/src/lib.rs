// pondlink-core: Domain layer between pondlink-api and consumers (CLI).
//
// Owns the device record model, the registry abstraction, the local
// cache, and the three engines that keep cache, registry, and physical
// device state convergent: ProvisioningOrchestrator, ConnectionMonitor,
// and StateSyncEngine. DeviceManager is the facade consumers hold.

pub mod cache;
pub mod error;
pub mod manager;
pub mod model;
pub mod monitor;
pub mod provision;
pub mod registry;
pub mod store;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::DeviceCache;
pub use error::CoreError;
pub use manager::{DeviceManager, ManagerSettings};
pub use monitor::{ConnectionMonitor, MonitorConfig};
pub use provision::{ProvisionRequest, ProvisionState, ProvisionTuning, ProvisioningOrchestrator};
pub use registry::{FileRegistry, MemoryRegistry, RecordPatch, Registry, RegistryError};
pub use store::DeviceStore;
pub use sync::{StateSyncEngine, SyncConfig};

// Discovery tuning travels inside `ProvisionTuning`; re-exported so
// consumers can build one without depending on pondlink-api directly.
pub use pondlink_api::ScanConfig;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Actuator, ActuatorBank, ActuatorState, DeviceRecord, DeviceStatus, MacAddress, RecordId,
    WaterUsage,
};
