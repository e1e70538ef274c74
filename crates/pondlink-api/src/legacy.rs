// Legacy settings protocol (first-generation devices).
//
// Field units vary in which transport encoding their `/settings/sta`
// endpoint accepts, so credentials are offered in increasing order of
// complexity: query-string GET, form POST, JSON POST. First HTTP
// success wins. Legacy devices reboot implicitly once credentials are
// accepted -- there is no explicit reboot call on this surface.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::time::Duration;

use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::debug;

use crate::addr::DeviceAddr;
use crate::endpoints::{self, try_in_order};
use crate::error::Error;
use crate::injector::WifiCredentials;
use crate::probe::HttpProbe;

/// Transport encodings for the legacy settings endpoint, in the order
/// they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialEncoding {
    /// GET with `ssid`/`key` query parameters.
    QueryGet,
    /// Form-encoded POST.
    FormPost,
    /// JSON POST.
    JsonPost,
}

/// Attempt order: cheapest / most widely accepted first.
pub const ENCODING_ORDER: &[CredentialEncoding] = &[
    CredentialEncoding::QueryGet,
    CredentialEncoding::FormPost,
    CredentialEncoding::JsonPost,
];

#[derive(Serialize)]
struct StaSettingsBody<'a> {
    ssid: &'a str,
    key: &'a str,
    enabled: bool,
}

/// Client for the legacy configuration endpoint family.
pub struct LegacyConfigClient {
    probe: HttpProbe,
    addr: DeviceAddr,
    timeout: Duration,
}

impl LegacyConfigClient {
    pub fn new(probe: HttpProbe, addr: DeviceAddr, timeout: Duration) -> Self {
        Self {
            probe,
            addr,
            timeout,
        }
    }

    /// Hand the device new Wi-Fi credentials, trying each encoding in
    /// [`ENCODING_ORDER`] until one returns HTTP success.
    ///
    /// Returns the encoding that was accepted. `NoAnswer` if the device
    /// never answered on any encoding; `ConfigRejected` if it answered
    /// but refused all of them.
    pub async fn apply_credentials(
        &self,
        creds: &WifiCredentials,
    ) -> Result<CredentialEncoding, Error> {
        let answered = AtomicBool::new(false);
        let last_status = AtomicU16::new(0);

        let hit = try_in_order(ENCODING_ORDER, |encoding| {
            let answered = &answered;
            let last_status = &last_status;
            async move {
                let outcome = self.send(encoding, creds).await;
                if let Some(reply) = outcome.answered() {
                    answered.store(true, Ordering::Relaxed);
                    last_status.store(reply.status, Ordering::Relaxed);
                }
                outcome.ok().map(|_| ())
            }
        })
        .await;

        match hit {
            Some((encoding, ())) => {
                debug!(?encoding, "legacy device accepted credentials");
                Ok(encoding)
            }
            None if answered.load(Ordering::Relaxed) => Err(Error::ConfigRejected {
                status: last_status.load(Ordering::Relaxed),
                message: "device refused credentials on every encoding".into(),
            }),
            None => Err(Error::NoAnswer {
                addr: self.addr.to_string(),
            }),
        }
    }

    async fn send(
        &self,
        encoding: CredentialEncoding,
        creds: &WifiCredentials,
    ) -> crate::probe::ProbeOutcome {
        let url = self.addr.url(endpoints::LEGACY_STA_SETTINGS);
        let ssid = creds.ssid.as_str();
        let key = creds.passphrase.expose_secret();

        match encoding {
            CredentialEncoding::QueryGet => {
                let params = [("ssid", ssid), ("key", key), ("enabled", "1")];
                self.probe.get_with_query(&url, &params, self.timeout).await
            }
            CredentialEncoding::FormPost => {
                let params = [("ssid", ssid), ("key", key), ("enabled", "1")];
                self.probe.post_form(&url, &params, self.timeout).await
            }
            CredentialEncoding::JsonPost => {
                let body = StaSettingsBody {
                    ssid,
                    key,
                    enabled: true,
                };
                self.probe.post_json(&url, &body, self.timeout).await
            }
        }
    }
}
