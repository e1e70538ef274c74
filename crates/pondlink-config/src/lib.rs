//! Shared configuration for pondlink tools.
//!
//! TOML file + `POND_*` environment variables, merged via figment, and
//! translated into `pondlink_core::ManagerSettings`. Timing knobs are
//! plain integers in the file (seconds / milliseconds) and become
//! `Duration`s during translation.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pondlink_core::{ManagerSettings, MonitorConfig, ProvisionTuning, ScanConfig, SyncConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no owner configured (set `owner` in config.toml or POND_OWNER)")]
    NoOwner,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Owner identity the registry is keyed by.
    pub owner: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub device: DeviceSection,

    #[serde(default)]
    pub monitor: MonitorSection,

    #[serde(default)]
    pub sync: SyncSection,

    #[serde(default)]
    pub provision: ProvisionSection,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// Where records and the local cache live.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RegistrySection {
    /// Registry directory. Defaults to the platform data dir.
    pub dir: Option<PathBuf>,

    /// Cache directory. Defaults to the platform cache dir.
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DeviceSection {
    /// HTTP port the appliances listen on.
    #[serde(default = "default_device_port")]
    pub port: u16,

    /// Per-request timeout against a device, in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            port: default_device_port(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

fn default_device_port() -> u16 {
    80
}
fn default_probe_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MonitorSection {
    /// Fleet sweep interval, in seconds.
    #[serde(default = "default_monitor_interval")]
    pub interval_secs: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            interval_secs: default_monitor_interval(),
        }
    }
}

fn default_monitor_interval() -> u64 {
    30
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SyncSection {
    /// Pump throughput used to derive water usage.
    #[serde(default = "default_flow_rate")]
    pub flow_rate_l_per_min: f64,

    /// Minimum seconds between registry writes per record.
    #[serde(default = "default_write_gate")]
    pub write_gate_secs: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            flow_rate_l_per_min: default_flow_rate(),
            write_gate_secs: default_write_gate(),
        }
    }
}

fn default_flow_rate() -> f64 {
    16.0
}
fn default_write_gate() -> u64 {
    5
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProvisionSection {
    /// Wait after credential handover before rediscovery, in seconds.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,

    #[serde(default = "default_rejoin_attempts")]
    pub rejoin_attempts: u32,

    #[serde(default = "default_rejoin_delay")]
    pub rejoin_delay_secs: u64,

    /// Subnet sweep batch size.
    #[serde(default = "default_batch_size")]
    pub scan_batch_size: usize,

    /// Per-candidate sweep probe timeout, in milliseconds.
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_probe_timeout_ms: u64,

    /// Gateway to probe first during the sweep, e.g. "192.168.1.1".
    /// Defaults to `.1` of the local /24.
    pub gateway: Option<Ipv4Addr>,
}

impl Default for ProvisionSection {
    fn default() -> Self {
        Self {
            settle_delay_secs: default_settle_delay(),
            rejoin_attempts: default_rejoin_attempts(),
            rejoin_delay_secs: default_rejoin_delay(),
            scan_batch_size: default_batch_size(),
            scan_probe_timeout_ms: default_scan_timeout_ms(),
            gateway: None,
        }
    }
}

fn default_settle_delay() -> u64 {
    30
}
fn default_rejoin_attempts() -> u32 {
    5
}
fn default_rejoin_delay() -> u64 {
    5
}
fn default_batch_size() -> usize {
    20
}
fn default_scan_timeout_ms() -> u64 {
    750
}

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "pondlink", "pondlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default registry directory under the platform data dir.
pub fn default_registry_dir() -> PathBuf {
    ProjectDirs::from("com", "pondlink", "pondlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("registry");
            p
        },
        |dirs| dirs.data_dir().join("registry"),
    )
}

/// Default cache directory under the platform cache dir.
pub fn default_cache_dir() -> PathBuf {
    ProjectDirs::from("com", "pondlink", "pondlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("cache");
            p
        },
        |dirs| dirs.cache_dir().join("records"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("pondlink");
    p
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit path, then `POND_*` environment overrides.
pub fn load_config_from(path: &std::path::Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("POND_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Translation to core settings ────────────────────────────────────

/// The registry directory this config points at.
pub fn registry_dir(cfg: &Config) -> PathBuf {
    cfg.registry.dir.clone().unwrap_or_else(default_registry_dir)
}

/// Build `ManagerSettings` from a loaded config.
///
/// `owner_override` (typically a CLI flag) beats the config file.
pub fn to_manager_settings(
    cfg: &Config,
    owner_override: Option<&str>,
) -> Result<ManagerSettings, ConfigError> {
    let owner = owner_override
        .map(str::to_owned)
        .or_else(|| cfg.owner.clone())
        .ok_or(ConfigError::NoOwner)?;

    if cfg.sync.flow_rate_l_per_min <= 0.0 {
        return Err(ConfigError::Validation {
            field: "sync.flow_rate_l_per_min".into(),
            reason: "must be positive".into(),
        });
    }
    if cfg.provision.rejoin_attempts == 0 {
        return Err(ConfigError::Validation {
            field: "provision.rejoin_attempts".into(),
            reason: "must be at least 1".into(),
        });
    }
    if cfg.provision.scan_batch_size == 0 {
        return Err(ConfigError::Validation {
            field: "provision.scan_batch_size".into(),
            reason: "must be at least 1".into(),
        });
    }

    let probe_timeout = Duration::from_millis(cfg.device.probe_timeout_ms);

    Ok(ManagerSettings {
        owner,
        cache_dir: cfg.registry.cache_dir.clone().unwrap_or_else(default_cache_dir),
        monitor: MonitorConfig {
            interval: Duration::from_secs(cfg.monitor.interval_secs),
            probe_timeout,
            device_port: cfg.device.port,
        },
        sync: SyncConfig {
            flow_rate_l_per_min: cfg.sync.flow_rate_l_per_min,
            write_gate: Duration::from_secs(cfg.sync.write_gate_secs),
            probe_timeout,
            device_port: cfg.device.port,
        },
        provision: to_provision_tuning(cfg),
    })
}

/// Build provisioning tuning from a loaded config.
pub fn to_provision_tuning(cfg: &Config) -> ProvisionTuning {
    ProvisionTuning {
        settle_delay: Duration::from_secs(cfg.provision.settle_delay_secs),
        rejoin_attempts: cfg.provision.rejoin_attempts,
        rejoin_delay: Duration::from_secs(cfg.provision.rejoin_delay_secs),
        ap_timeout: Duration::from_millis(cfg.device.probe_timeout_ms.max(2000)),
        verify_timeout: Duration::from_millis(cfg.device.probe_timeout_ms),
        scan: ScanConfig {
            batch_size: cfg.provision.scan_batch_size,
            probe_timeout: Duration::from_millis(cfg.provision.scan_probe_timeout_ms),
            gateway: cfg.provision.gateway,
        },
        device_port: cfg.device.port,
    }
}
