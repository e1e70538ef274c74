// ── Domain model ──

mod device;
mod usage;

pub use device::{
    Actuator, ActuatorBank, ActuatorState, DeviceRecord, DeviceStatus, MacAddress, RecordId,
};
pub use usage::WaterUsage;
