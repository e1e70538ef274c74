use thiserror::Error;

/// Top-level error type for the `pondlink-api` crate.
///
/// Probe-level failures (timeout, connection refused) are NOT errors --
/// they are [`ProbeOutcome`](crate::probe::ProbeOutcome) values, because
/// "no answer" is an expected result during discovery. This enum covers
/// the cases where an operation genuinely cannot proceed.
#[derive(Debug, Error)]
pub enum Error {
    /// The device did not answer on any attempted path or encoding.
    ///
    /// Collapses `TimedOut` and `NetworkError` probe outcomes: callers
    /// treat both identically as "no answer".
    #[error("No answer from device at {addr}")]
    NoAnswer { addr: String },

    /// The device answered but refused the configuration on every
    /// transport encoding it was offered.
    #[error("Device rejected configuration (HTTP {status}): {message}")]
    ConfigRejected { status: u16, message: String },

    /// Structured RPC endpoint returned an error payload.
    #[error("RPC {method} failed: {message}")]
    Rpc {
        method: &'static str,
        message: String,
    },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP client construction failed.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl Error {
    /// Returns `true` if this error means the device simply never answered.
    pub fn is_no_answer(&self) -> bool {
        matches!(self, Self::NoAnswer { .. })
    }

    /// Returns `true` if the device answered but refused the request.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::ConfigRejected { .. } | Self::Rpc { .. })
    }
}
