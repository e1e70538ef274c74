// Device identity lookup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::addr::DeviceAddr;
use crate::endpoints;
use crate::error::Error;
use crate::probe::HttpProbe;

/// Hardware identity reported by the device's `/identify` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Stable hardware identifier (survives IP changes and reboots).
    pub device_id: String,
    /// Hardware MAC address.
    pub mac: String,
    /// Model string, if the firmware reports one.
    #[serde(default)]
    pub model: Option<String>,
    /// Protocol generation hint (1 = legacy, 2 = RPC). Advisory only --
    /// generation detection probes the RPC surface directly.
    #[serde(default, rename = "gen")]
    pub generation: Option<u8>,
}

/// Fetch the device identity, or fail with `NoAnswer`/`Deserialization`.
pub async fn fetch_identity(
    probe: &HttpProbe,
    addr: &DeviceAddr,
    timeout: Duration,
) -> Result<DeviceIdentity, Error> {
    let url = addr.url(endpoints::IDENTITY);
    let outcome = probe.get(&url, timeout).await;

    let reply = outcome.ok().ok_or_else(|| Error::NoAnswer {
        addr: addr.to_string(),
    })?;

    serde_json::from_str(&reply.body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: reply.body.clone(),
    })
}
