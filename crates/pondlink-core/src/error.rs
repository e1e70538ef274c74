// ── Core error types ──
//
// User-facing errors from pondlink-core. Consumers never see raw probe
// outcomes or JSON parse failures directly; the `From` impls translate
// transport-layer and registry-layer errors into domain variants.

use thiserror::Error;

use crate::registry::RegistryError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Discovery / provisioning ─────────────────────────────────────
    #[error("No device found on subnet {subnet}")]
    DeviceNotFound { subnet: String },

    #[error("Device was reconfigured but could not be rediscovered after {attempts} attempts")]
    VerificationFailed { attempts: u32 },

    #[error("Device rejected configuration: {message}")]
    ConfigRejected { message: String },

    #[error("A provisioning run is already in progress")]
    ProvisionInProgress,

    #[error("Device at {addr} is not reachable")]
    DeviceUnreachable { addr: String },

    // ── Registry ─────────────────────────────────────────────────────
    #[error("Registry is unavailable: {reason}")]
    RegistryUnavailable { reason: String },

    #[error("Registry record not found: {id}")]
    RecordNotFound { id: String },

    /// Normally absorbed by the sync engine's merge path; surfaces only
    /// when a conflict hits an operation with no merge strategy.
    #[error("Concurrent registry modification for {id}")]
    RegistryConflict { id: String },

    // ── Local state ──────────────────────────────────────────────────
    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from lower-layer errors ───────────────────────────────

impl From<pondlink_api::Error> for CoreError {
    fn from(err: pondlink_api::Error) -> Self {
        match err {
            pondlink_api::Error::NoAnswer { addr } => CoreError::DeviceUnreachable { addr },
            pondlink_api::Error::ConfigRejected { status, message } => CoreError::ConfigRejected {
                message: format!("HTTP {status}: {message}"),
            },
            pondlink_api::Error::Rpc { method, message } => CoreError::ConfigRejected {
                message: format!("{method}: {message}"),
            },
            pondlink_api::Error::Deserialization { message, .. } => {
                CoreError::Internal(format!("deserialization: {message}"))
            }
            pondlink_api::Error::InvalidUrl(e) => CoreError::Validation {
                message: format!("invalid URL: {e}"),
            },
            pondlink_api::Error::Transport(e) => CoreError::Internal(e.to_string()),
        }
    }
}

impl From<RegistryError> for CoreError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unavailable { reason } => CoreError::RegistryUnavailable { reason },
            RegistryError::NotFound { id } => CoreError::RecordNotFound { id },
            RegistryError::Conflict { id } => CoreError::RegistryConflict { id },
            RegistryError::Invalid { message } => CoreError::Validation { message },
        }
    }
}
