// Structured RPC protocol (second-generation devices).
//
// Wi-Fi configuration, explicit reboot, per-relay status and relay set,
// plus the full telemetry snapshot the sync layer polls. All calls are
// plain HTTP against `/rpc/*`; error payloads arrive as
// `{"error": {"code": N, "message": "..."}}` with HTTP 200 on some
// firmware builds, so both the status line and the body are checked.

use std::time::Duration;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::addr::DeviceAddr;
use crate::endpoints;
use crate::error::Error;
use crate::injector::WifiCredentials;
use crate::probe::{HttpProbe, ProbeOutcome};

/// Per-relay status and telemetry as reported by the device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchStatus {
    pub id: u8,
    /// Relay output state.
    pub output: bool,
    #[serde(default)]
    pub apower: f64,
    #[serde(default)]
    pub voltage: f64,
    #[serde(default)]
    pub current: f64,
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default)]
    pub freq: f64,
}

/// Full device status: one entry per relay channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FullStatus {
    #[serde(default)]
    pub switches: Vec<SwitchStatus>,
}

/// Device info from the structured info endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcDeviceInfo {
    pub device_id: String,
    pub mac: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub firmware: Option<String>,
}

#[derive(Serialize)]
struct WifiSetConfigBody<'a> {
    ssid: &'a str,
    pass: &'a str,
    enable: bool,
    /// Keep the device's own AP up so a failed join can be retried
    /// without re-pairing.
    keep_ap: bool,
}

/// Some firmware wraps errors as `{"error":{...}}` with HTTP 200.
#[derive(Deserialize)]
struct RpcErrorEnvelope {
    error: Option<RpcErrorInner>,
}

#[derive(Deserialize)]
struct RpcErrorInner {
    #[allow(dead_code)]
    code: i32,
    message: Option<String>,
}

/// Client for the structured RPC endpoint family.
pub struct RpcClient {
    probe: HttpProbe,
    addr: DeviceAddr,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(probe: HttpProbe, addr: DeviceAddr, timeout: Duration) -> Self {
        Self {
            probe,
            addr,
            timeout,
        }
    }

    /// The device address this client talks to.
    pub fn addr(&self) -> &DeviceAddr {
        &self.addr
    }

    /// `GET /rpc/Device.GetInfo`
    pub async fn device_info(&self) -> Result<RpcDeviceInfo, Error> {
        let url = self.addr.url(endpoints::RPC_DEVICE_INFO);
        let outcome = self.probe.get(&url, self.timeout).await;
        self.parse("Device.GetInfo", outcome)
    }

    /// `POST /rpc/Wifi.SetConfig` -- hand over station-mode credentials.
    ///
    /// The device's own AP stays active until it has successfully joined
    /// the target network.
    pub async fn set_wifi_config(&self, creds: &WifiCredentials) -> Result<(), Error> {
        let url = self.addr.url(endpoints::RPC_WIFI_SET_CONFIG);
        let body = WifiSetConfigBody {
            ssid: &creds.ssid,
            pass: creds.passphrase.expose_secret(),
            enable: true,
            keep_ap: true,
        };

        debug!("sending Wifi.SetConfig");
        let outcome = self.probe.post_json(&url, &body, self.timeout).await;
        self.expect_ok("Wifi.SetConfig", outcome)
    }

    /// `POST /rpc/Device.Reboot` -- explicit reboot command.
    ///
    /// A silent outcome here is tolerated by callers: the device may drop
    /// the connection as it goes down.
    pub async fn reboot(&self) -> Result<(), Error> {
        let url = self.addr.url(endpoints::RPC_DEVICE_REBOOT);
        debug!("sending Device.Reboot");
        let outcome = self
            .probe
            .post_json(&url, &serde_json::json!({}), self.timeout)
            .await;
        self.expect_ok("Device.Reboot", outcome)
    }

    /// `GET /status` -- full relay + telemetry snapshot.
    pub async fn full_status(&self) -> Result<FullStatus, Error> {
        let url = self.addr.url(endpoints::STATUS);
        let outcome = self.probe.get(&url, self.timeout).await;
        self.parse("status", outcome)
    }

    /// `GET /rpc/Switch.GetStatus?id=N`
    pub async fn switch_status(&self, channel: u8) -> Result<SwitchStatus, Error> {
        let url = format!(
            "{}?id={channel}",
            self.addr.url(endpoints::RPC_SWITCH_GET_STATUS)
        );
        let outcome = self.probe.get(&url, self.timeout).await;
        self.parse("Switch.GetStatus", outcome)
    }

    /// `GET /rpc/Switch.Set?id=N&on=...` -- drive a relay.
    pub async fn set_switch(&self, channel: u8, on: bool) -> Result<(), Error> {
        let url = format!(
            "{}?id={channel}&on={on}",
            self.addr.url(endpoints::RPC_SWITCH_SET)
        );
        debug!(channel, on, "sending Switch.Set");
        let outcome = self.probe.get(&url, self.timeout).await;
        self.expect_ok("Switch.Set", outcome)
    }

    // ── Response handling ────────────────────────────────────────────

    fn expect_ok(&self, method: &'static str, outcome: ProbeOutcome) -> Result<(), Error> {
        let reply = match outcome.answered() {
            Some(reply) => reply,
            None => {
                return Err(Error::NoAnswer {
                    addr: self.addr.to_string(),
                });
            }
        };

        if let Some(message) = embedded_error(&reply.body) {
            return Err(Error::Rpc { method, message });
        }

        if (200..300).contains(&reply.status) {
            Ok(())
        } else {
            Err(Error::Rpc {
                method,
                message: format!("HTTP {}", reply.status),
            })
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(
        &self,
        method: &'static str,
        outcome: ProbeOutcome,
    ) -> Result<T, Error> {
        let reply = outcome.answered().ok_or_else(|| Error::NoAnswer {
            addr: self.addr.to_string(),
        })?;

        if let Some(message) = embedded_error(&reply.body) {
            return Err(Error::Rpc { method, message });
        }

        // An answered error status is a device-side refusal, not silence.
        if !(200..300).contains(&reply.status) {
            return Err(Error::Rpc {
                method,
                message: format!("HTTP {}", reply.status),
            });
        }

        serde_json::from_str(&reply.body).map_err(|e| Error::Deserialization {
            message: format!("{method}: {e}"),
            body: reply.body.clone(),
        })
    }
}

/// Extract an embedded `{"error": ...}` message, if present.
fn embedded_error(body: &str) -> Option<String> {
    let envelope: RpcErrorEnvelope = serde_json::from_str(body).ok()?;
    let inner = envelope.error?;
    Some(inner.message.unwrap_or_else(|| "unspecified error".into()))
}
