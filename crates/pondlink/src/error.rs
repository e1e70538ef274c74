//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use pondlink_config::ConfigError;
use pondlink_core::CoreError;

/// Exit codes for process termination.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const BUSY: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Discovery / provisioning ─────────────────────────────────────
    #[error("No device found on subnet {subnet}")]
    #[diagnostic(
        code(pond::no_device),
        help(
            "Make sure the appliance is powered and on the same network.\n\
             You can point the sweep at a specific address with --candidate."
        )
    )]
    NoDevice { subnet: String },

    #[error("Device was configured but never reappeared ({attempts} attempts)")]
    #[diagnostic(
        code(pond::rejoin_failed),
        help(
            "The device likely rejected the Wi-Fi credentials or is out of range.\n\
             Power-cycle it and re-run: pond provision"
        )
    )]
    RejoinFailed { attempts: u32 },

    #[error("Device rejected the configuration: {message}")]
    #[diagnostic(code(pond::config_rejected), help("Check the SSID and passphrase and retry."))]
    ConfigRejected { message: String },

    #[error("Another provisioning run is already in progress")]
    #[diagnostic(code(pond::busy))]
    ProvisionInProgress,

    #[error("Device at {addr} is not reachable")]
    #[diagnostic(
        code(pond::unreachable),
        help("Run: pond monitor --once to refresh reachability state.")
    )]
    DeviceUnreachable { addr: String },

    // ── Registry ─────────────────────────────────────────────────────
    #[error("Registry is unavailable: {reason}")]
    #[diagnostic(
        code(pond::registry_down),
        help("Local state is preserved; changes sync once the registry is back.")
    )]
    RegistryUnavailable { reason: String },

    #[error("Device record '{id}' not found")]
    #[diagnostic(code(pond::not_found), help("Run: pond devices list"))]
    RecordNotFound { id: String },

    #[error("Concurrent modification of record {id}")]
    #[diagnostic(code(pond::conflict), help("Retry the command; the record was refreshed."))]
    Conflict { id: String },

    // ── Validation / configuration ───────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pond::validation))]
    Validation { field: String, reason: String },

    #[error("No owner configured")]
    #[diagnostic(
        code(pond::no_owner),
        help(
            "Set an owner with: pond config init --owner <name>\n\
             Or pass --owner / set POND_OWNER."
        )
    )]
    NoOwner,

    #[error("Could not determine this machine's address on the home subnet")]
    #[diagnostic(
        code(pond::no_local_ip),
        help("Pass it explicitly with --local-ip.")
    )]
    NoLocalIp,

    #[error(transparent)]
    #[diagnostic(code(pond::config))]
    Config(Box<figment::Error>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(pond::confirmation_required),
        help("Use --yes (-y) to confirm.")
    )]
    ConfirmationRequired { action: String },

    // ── IO / internal ────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    #[diagnostic(code(pond::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoDevice { .. } | Self::RecordNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::DeviceUnreachable { .. }
            | Self::RejoinFailed { .. }
            | Self::RegistryUnavailable { .. } => exit_code::CONNECTION,
            Self::ProvisionInProgress => exit_code::BUSY,
            Self::Validation { .. }
            | Self::NoOwner
            | Self::NoLocalIp
            | Self::ConfirmationRequired { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Lower-layer error mapping ────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DeviceNotFound { subnet } => CliError::NoDevice { subnet },
            CoreError::VerificationFailed { attempts } => CliError::RejoinFailed { attempts },
            CoreError::ConfigRejected { message } => CliError::ConfigRejected { message },
            CoreError::ProvisionInProgress => CliError::ProvisionInProgress,
            CoreError::DeviceUnreachable { addr } => CliError::DeviceUnreachable { addr },
            CoreError::RegistryUnavailable { reason } => CliError::RegistryUnavailable { reason },
            CoreError::RecordNotFound { id } => CliError::RecordNotFound { id },
            CoreError::RegistryConflict { id } => CliError::Conflict { id },
            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Cache { message } | CoreError::Internal(message) => {
                CliError::Internal(message)
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoOwner => CliError::NoOwner,
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
            ConfigError::Serialization(e) => CliError::Internal(e.to_string()),
        }
    }
}
