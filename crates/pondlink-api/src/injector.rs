// Credential injection across device generations.
//
// Detects which protocol family the device speaks, hands over the target
// network credentials, and triggers the reboot that makes them take
// effect. Called while the client is joined to the device's own AP --
// everything here is clear HTTP by the device's own constraint.

use std::time::Duration;

use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::addr::DeviceAddr;
use crate::endpoints;
use crate::error::Error;
use crate::legacy::{CredentialEncoding, LegacyConfigClient};
use crate::probe::HttpProbe;
use crate::rpc::RpcClient;

/// Target-network credentials handed to the device.
#[derive(Debug, Clone)]
pub struct WifiCredentials {
    pub ssid: String,
    pub passphrase: SecretString,
}

/// Which configuration protocol family a device speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// `/settings/*` endpoint family; implicit reboot on accept.
    Legacy,
    /// `/rpc/*` endpoint family; explicit reboot command.
    Rpc,
}

/// What the injection run did, for logging and diagnostics.
#[derive(Debug, Clone)]
pub struct InjectionReport {
    pub generation: Generation,
    /// Which legacy encoding was accepted (legacy generation only).
    pub encoding: Option<CredentialEncoding>,
    /// Whether an explicit reboot command was dispatched.
    pub reboot_sent: bool,
}

/// Drives the generation-specific configuration protocols.
pub struct CredentialInjector {
    probe: HttpProbe,
    addr: DeviceAddr,
    timeout: Duration,
}

impl CredentialInjector {
    pub fn new(probe: HttpProbe, addr: DeviceAddr, timeout: Duration) -> Self {
        Self {
            probe,
            addr,
            timeout,
        }
    }

    /// Probe the structured info endpoint to classify the device.
    ///
    /// An HTTP 200 means the RPC surface exists. An answer with any other
    /// status means the firmware is serving but has no `/rpc` tree --
    /// legacy. Silence is a detection failure and defaults to RPC, the
    /// newer and more likely generation.
    pub async fn detect_generation(&self) -> Generation {
        let url = self.addr.url(endpoints::RPC_DEVICE_INFO);
        let outcome = self.probe.get(&url, self.timeout).await;

        let generation = match outcome.answered() {
            Some(reply) if (200..300).contains(&reply.status) => Generation::Rpc,
            Some(_) => Generation::Legacy,
            None => Generation::Rpc,
        };
        debug!(?generation, "device generation detected");
        generation
    }

    /// Inject credentials and trigger the reboot, per detected generation.
    pub async fn inject(&self, creds: &WifiCredentials) -> Result<InjectionReport, Error> {
        let generation = self.detect_generation().await;

        match generation {
            Generation::Rpc => {
                let rpc = RpcClient::new(self.probe.clone(), self.addr.clone(), self.timeout);
                rpc.set_wifi_config(creds).await?;
                info!(ssid = %creds.ssid, "credentials sent (rpc)");

                // The device may drop the connection mid-reboot; silence
                // here means the command very likely landed.
                let reboot_sent = match rpc.reboot().await {
                    Ok(()) => true,
                    Err(e) if e.is_no_answer() => {
                        debug!("no answer to reboot command; assuming reboot in progress");
                        true
                    }
                    Err(e) => {
                        warn!(error = %e, "reboot command rejected");
                        return Err(e);
                    }
                };

                Ok(InjectionReport {
                    generation,
                    encoding: None,
                    reboot_sent,
                })
            }
            Generation::Legacy => {
                let legacy =
                    LegacyConfigClient::new(self.probe.clone(), self.addr.clone(), self.timeout);
                let encoding = legacy.apply_credentials(creds).await?;
                info!(ssid = %creds.ssid, ?encoding, "credentials sent (legacy)");

                Ok(InjectionReport {
                    generation,
                    encoding: Some(encoding),
                    reboot_sent: false,
                })
            }
        }
    }
}
