// ── Device record domain types ──

use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use pondlink_api::rpc::SwitchStatus;

use super::usage::WaterUsage;

/// Stable registry record identifier.
///
/// Assigned exactly once at successful provisioning and never reused;
/// the only key valid for later updates and deletes -- never the IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Hardware MAC address, normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacAddress(String);

impl MacAddress {
    pub fn new(mac: impl AsRef<str>) -> Self {
        Self(mac.as_ref().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reachability / health classification of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Connected,
    NotConnected,
    /// Set and cleared only by explicit user action; the monitor never
    /// overwrites it.
    MaintenanceRequired,
}

/// The four fixed actuator channels on the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "camelCase")]
pub enum Actuator {
    Pump,
    Heater,
    Auger,
    HighWater,
}

impl Actuator {
    /// Relay channel index on the device.
    pub fn channel(self) -> u8 {
        match self {
            Self::Pump => 0,
            Self::Heater => 1,
            Self::Auger => 2,
            Self::HighWater => 3,
        }
    }

    pub fn from_channel(channel: u8) -> Option<Self> {
        match channel {
            0 => Some(Self::Pump),
            1 => Some(Self::Heater),
            2 => Some(Self::Auger),
            3 => Some(Self::HighWater),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pump => "pump",
            Self::Heater => "heater",
            Self::Auger => "auger",
            Self::HighWater => "high-water",
        }
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Actuator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pump" => Ok(Self::Pump),
            "heater" => Ok(Self::Heater),
            "auger" => Ok(Self::Auger),
            "highwater" | "high-water" | "high_water" => Ok(Self::HighWater),
            other => Err(format!("unknown actuator: {other}")),
        }
    }
}

/// Relay state and power telemetry for one actuator channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActuatorState {
    pub on: bool,
    pub power: f64,
    pub voltage: f64,
    pub current: f64,
    pub energy: f64,
    pub temperature: f64,
    pub frequency: f64,
}

impl From<&SwitchStatus> for ActuatorState {
    fn from(s: &SwitchStatus) -> Self {
        Self {
            on: s.output,
            power: s.apower,
            voltage: s.voltage,
            current: s.current,
            energy: s.energy,
            temperature: s.temperature,
            frequency: s.freq,
        }
    }
}

/// Fixed bank of exactly four actuators.
///
/// Modeled as a struct rather than a map so a record can never hold a
/// partial component set: missing channels deserialize to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActuatorBank {
    pub pump: ActuatorState,
    pub heater: ActuatorState,
    pub auger: ActuatorState,
    pub high_water: ActuatorState,
}

impl ActuatorBank {
    pub fn get(&self, actuator: Actuator) -> &ActuatorState {
        match actuator {
            Actuator::Pump => &self.pump,
            Actuator::Heater => &self.heater,
            Actuator::Auger => &self.auger,
            Actuator::HighWater => &self.high_water,
        }
    }

    pub fn get_mut(&mut self, actuator: Actuator) -> &mut ActuatorState {
        match actuator {
            Actuator::Pump => &mut self.pump,
            Actuator::Heater => &mut self.heater,
            Actuator::Auger => &mut self.auger,
            Actuator::HighWater => &mut self.high_water,
        }
    }

    /// Apply a device status snapshot. Channels outside 0..=3 are ignored.
    pub fn apply_switches(&mut self, switches: &[SwitchStatus]) {
        for status in switches {
            if let Some(actuator) = Actuator::from_channel(status.id) {
                *self.get_mut(actuator) = ActuatorState::from(status);
            }
        }
    }
}

/// The canonical device record: owned by the registry, cached locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: RecordId,
    /// Owner identity the registry is keyed by.
    pub owner: String,
    /// Stable hardware identifier; recognizes a restarted device even
    /// when its IP changed.
    pub device_id: String,
    pub mac: MacAddress,
    /// Last-known address. Volatile; never used as an update key.
    pub ip: Option<Ipv4Addr>,
    /// User label for the installation site.
    pub site_name: String,
    pub status: DeviceStatus,
    #[serde(default)]
    pub actuators: ActuatorBank,
    #[serde(default)]
    pub water_usage: WaterUsage,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    pub updated_at: DateTime<Utc>,
    /// Registry revision for optimistic concurrency. Server-assigned.
    #[serde(default)]
    pub revision: u64,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn actuator_channels_are_fixed() {
        assert_eq!(Actuator::Pump.channel(), 0);
        assert_eq!(Actuator::from_channel(3), Some(Actuator::HighWater));
        assert_eq!(Actuator::from_channel(4), None);
    }

    #[test]
    fn every_actuator_round_trips_through_its_channel() {
        use strum::IntoEnumIterator;
        for actuator in Actuator::iter() {
            assert_eq!(Actuator::from_channel(actuator.channel()), Some(actuator));
        }
    }

    #[test]
    fn mac_normalizes_to_lowercase() {
        assert_eq!(MacAddress::new("A4:CF:12:34:56:78").as_str(), "a4:cf:12:34:56:78");
    }

    #[test]
    fn bank_deserializes_partial_input_with_defaults() {
        // A partial component set must normalize, never persist partially.
        let bank: ActuatorBank =
            serde_json::from_str(r#"{"pump":{"on":true,"power":12.0}}"#).unwrap();
        assert!(bank.pump.on);
        assert!(!bank.heater.on);
        assert!((bank.auger.power).abs() < f64::EPSILON);
    }

    #[test]
    fn apply_switches_ignores_unknown_channels() {
        let mut bank = ActuatorBank::default();
        let switches = vec![
            pondlink_api::rpc::SwitchStatus {
                id: 1,
                output: true,
                apower: 900.0,
                ..Default::default()
            },
            pondlink_api::rpc::SwitchStatus {
                id: 7,
                output: true,
                ..Default::default()
            },
        ];
        bank.apply_switches(&switches);
        assert!(bank.heater.on);
        assert!((bank.heater.power - 900.0).abs() < f64::EPSILON);
        assert!(!bank.pump.on);
    }
}
