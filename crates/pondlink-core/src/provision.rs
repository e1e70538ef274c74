// ── Provisioning orchestrator ──
//
// Drives the full onboarding sequence: talk to the factory-default
// device over its own AP, hand over the target network credentials,
// wait out the reboot, rediscover the device on the home subnet, and
// only then commit a record to the registry. Registration strictly
// follows verification so the registry never holds a device that was
// configured but lost.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use secrecy::SecretString;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use pondlink_api::{
    CredentialInjector, DeviceAddr, DeviceIdentity, Generation, HttpIdentityProber, HttpProbe,
    RpcClient, ScanConfig, SubnetScanner, WifiCredentials,
};

use crate::error::CoreError;
use crate::model::{
    ActuatorBank, DeviceRecord, DeviceStatus, MacAddress, RecordId, WaterUsage,
};
use crate::registry::Registry;

/// Observable progress of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionState {
    Idle,
    ContactingDevice,
    GenerationDetected(Generation),
    CredentialsSent,
    /// Waiting for the device to reappear on the home subnet.
    AwaitingRejoin { attempt: u32 },
    Verified { ip: Ipv4Addr },
    Registered { id: RecordId },
}

/// Timing and discovery knobs for a provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionTuning {
    /// Wait after credential handover before the first rediscovery
    /// attempt. The device reboots and negotiates DHCP in this window.
    pub settle_delay: Duration,
    /// Rediscovery attempts before giving up.
    pub rejoin_attempts: u32,
    /// Pause between rediscovery attempts.
    pub rejoin_delay: Duration,
    /// Timeout for requests to the device over its own AP.
    pub ap_timeout: Duration,
    /// Timeout for the post-rejoin verification request.
    pub verify_timeout: Duration,
    /// Subnet sweep tuning for rediscovery.
    pub scan: ScanConfig,
    /// HTTP port devices listen on.
    pub device_port: u16,
}

impl Default for ProvisionTuning {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(30),
            rejoin_attempts: 5,
            rejoin_delay: Duration::from_secs(5),
            ap_timeout: Duration::from_secs(5),
            verify_timeout: Duration::from_secs(2),
            scan: ScanConfig::default(),
            device_port: 80,
        }
    }
}

/// One provisioning job.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub owner: String,
    /// User label for where the appliance is installed.
    pub site_name: String,
    /// Target network the device should join.
    pub ssid: String,
    pub passphrase: SecretString,
    /// Where the factory-default device answers (its own AP subnet).
    pub device_ap_addr: DeviceAddr,
    /// This client's address on the home subnet, for deriving the /24.
    pub local_ip: Ipv4Addr,
    /// Explicit rediscovery candidates; overrides the subnet sweep.
    pub candidates: Option<Vec<Ipv4Addr>>,
}

/// Runs provisioning jobs, one at a time.
pub struct ProvisioningOrchestrator<R> {
    registry: Arc<R>,
    probe: HttpProbe,
    tuning: ProvisionTuning,
    in_flight: AtomicBool,
    progress: watch::Sender<ProvisionState>,
}

/// Clears the single-flight flag even on early return.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<R: Registry> ProvisioningOrchestrator<R> {
    pub fn new(registry: Arc<R>, probe: HttpProbe, tuning: ProvisionTuning) -> Self {
        let (progress, _) = watch::channel(ProvisionState::Idle);
        Self {
            registry,
            probe,
            tuning,
            in_flight: AtomicBool::new(false),
            progress,
        }
    }

    /// Subscribe to progress updates of the current run.
    pub fn progress(&self) -> watch::Receiver<ProvisionState> {
        self.progress.subscribe()
    }

    /// Execute one provisioning run end to end.
    ///
    /// Fails with [`CoreError::ProvisionInProgress`] if another run is
    /// active; provisioning touches exclusive network state (the
    /// client's association with the device AP), so two runs can never
    /// overlap.
    pub async fn provision(&self, request: &ProvisionRequest) -> Result<DeviceRecord, CoreError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(CoreError::ProvisionInProgress);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let result = self.run(request).await;
        self.set_state(ProvisionState::Idle);
        result
    }

    async fn run(&self, request: &ProvisionRequest) -> Result<DeviceRecord, CoreError> {
        self.set_state(ProvisionState::ContactingDevice);

        // Identity first: the device_id read over the AP is what rejoin
        // verification must match against.
        let identity = pondlink_api::identity::fetch_identity(
            &self.probe,
            &request.device_ap_addr,
            self.tuning.ap_timeout,
        )
        .await?;
        info!(device_id = %identity.device_id, mac = %identity.mac, "device identified over AP");

        let injector = CredentialInjector::new(
            self.probe.clone(),
            request.device_ap_addr.clone(),
            self.tuning.ap_timeout,
        );
        let generation = injector.detect_generation().await;
        self.set_state(ProvisionState::GenerationDetected(generation));

        let creds = WifiCredentials {
            ssid: request.ssid.clone(),
            passphrase: request.passphrase.clone(),
        };
        let report = injector.inject(&creds).await?;
        debug!(?report, "credentials handed over");
        self.set_state(ProvisionState::CredentialsSent);

        tokio::time::sleep(self.tuning.settle_delay).await;

        let (ip, identity) = self.rediscover(request, &identity).await?;
        self.set_state(ProvisionState::Verified { ip });

        let record = self.register(request, &identity, ip).await?;
        self.set_state(ProvisionState::Registered {
            id: record.id.clone(),
        });
        Ok(record)
    }

    /// Find the device back on the home subnet and verify it is the one
    /// just configured.
    async fn rediscover(
        &self,
        request: &ProvisionRequest,
        expected: &DeviceIdentity,
    ) -> Result<(Ipv4Addr, DeviceIdentity), CoreError> {
        let prober = HttpIdentityProber::new(
            self.probe.clone(),
            self.tuning.device_port,
            self.tuning.scan.probe_timeout,
        );
        let scanner = SubnetScanner::new(prober, self.tuning.scan.clone());

        for attempt in 1..=self.tuning.rejoin_attempts {
            self.set_state(ProvisionState::AwaitingRejoin { attempt });

            let hit = match &request.candidates {
                Some(candidates) => scanner.scan_candidates(candidates).await,
                None => scanner.scan_subnet(request.local_ip).await,
            };

            match hit {
                Some(hit) if hit.identity.device_id == expected.device_id => {
                    if self.verify_device(hit.ip, expected).await {
                        info!(ip = %hit.ip, attempt, "device rejoined and verified");
                        return Ok((hit.ip, hit.identity));
                    }
                    debug!(ip = %hit.ip, "scan hit failed direct verification");
                }
                Some(hit) => {
                    warn!(
                        ip = %hit.ip,
                        found = %hit.identity.device_id,
                        expected = %expected.device_id,
                        "different device answered the sweep"
                    );
                }
                None => debug!(attempt, "rejoin sweep found nothing"),
            }

            if attempt < self.tuning.rejoin_attempts {
                tokio::time::sleep(self.tuning.rejoin_delay).await;
            }
        }

        Err(CoreError::VerificationFailed {
            attempts: self.tuning.rejoin_attempts,
        })
    }

    /// Direct verification at the rediscovered address. A scan hit alone
    /// is not enough: the device must answer a fresh identity request
    /// with the expected hardware id, then a status request.
    async fn verify_device(&self, ip: Ipv4Addr, expected: &DeviceIdentity) -> bool {
        let addr = DeviceAddr::from_ip_port(ip, self.tuning.device_port);

        let identity = match pondlink_api::identity::fetch_identity(
            &self.probe,
            &addr,
            self.tuning.verify_timeout,
        )
        .await
        {
            Ok(identity) => identity,
            Err(e) => {
                debug!(%ip, error = %e, "direct identity check failed");
                return false;
            }
        };
        if identity.device_id != expected.device_id {
            warn!(
                %ip,
                found = %identity.device_id,
                expected = %expected.device_id,
                "address answered with a different identity"
            );
            return false;
        }

        let url = addr.url(pondlink_api::endpoints::STATUS);
        self.probe
            .get(&url, self.tuning.verify_timeout)
            .await
            .ok()
            .is_some()
    }

    /// Commit the verified device to the registry.
    async fn register(
        &self,
        request: &ProvisionRequest,
        identity: &DeviceIdentity,
        ip: Ipv4Addr,
    ) -> Result<DeviceRecord, CoreError> {
        // Best effort initial telemetry; a default bank is fine if the
        // device is busy right after reboot.
        let addr = DeviceAddr::from_ip_port(ip, self.tuning.device_port);
        let rpc = RpcClient::new(self.probe.clone(), addr, self.tuning.verify_timeout);
        let actuators = match rpc.full_status().await {
            Ok(status) => {
                let mut bank = ActuatorBank::default();
                bank.apply_switches(&status.switches);
                bank
            }
            Err(e) => {
                debug!(error = %e, "initial status unavailable, starting with defaults");
                ActuatorBank::default()
            }
        };

        let now = Utc::now();
        let record = DeviceRecord {
            id: RecordId::new(format!(
                "{}-{}-{}",
                request.owner,
                identity.device_id,
                now.timestamp_millis()
            )),
            owner: request.owner.clone(),
            device_id: identity.device_id.clone(),
            mac: MacAddress::new(&identity.mac),
            ip: Some(ip),
            site_name: request.site_name.clone(),
            status: DeviceStatus::Connected,
            actuators,
            water_usage: WaterUsage::new(now),
            notifications_enabled: true,
            updated_at: now,
            revision: 0,
        };

        self.registry.create(&record).await?;
        info!(id = %record.id, "device registered");
        Ok(record)
    }

    fn set_state(&self, state: ProvisionState) {
        self.progress.send_modify(|s| *s = state);
    }
}
