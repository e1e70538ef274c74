// Subnet sweep for device discovery.
//
// A full sequential scan of 254 hosts at multi-second timeouts is
// unacceptably slow, so candidates are ordered by likelihood and probed
// in fixed-size concurrent batches with a short per-probe timeout. The
// batch fan-out is the only deliberate parallelism in the system.

use std::net::Ipv4Addr;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info};

use crate::addr::DeviceAddr;
use crate::identity::{self, DeviceIdentity};
use crate::probe::HttpProbe;

/// Tuning for a subnet sweep.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Number of concurrent probes per batch.
    pub batch_size: usize,
    /// Per-probe timeout. Short: most candidates will not answer.
    pub probe_timeout: Duration,
    /// Gateway address to try first. Defaults to `.1` of the /24.
    pub gateway: Option<Ipv4Addr>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            probe_timeout: Duration::from_millis(750),
            gateway: None,
        }
    }
}

/// Answers "is there a device at this address?" for the scanner.
///
/// The HTTP implementation probes the identity endpoint; tests substitute
/// a fake to exercise ordering and batching without sockets.
pub trait IdentityProber {
    fn identify(&self, ip: Ipv4Addr) -> impl Future<Output = Option<DeviceIdentity>> + Send;
}

/// Production prober: GET the identity endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIdentityProber {
    probe: HttpProbe,
    port: u16,
    timeout: Duration,
}

impl HttpIdentityProber {
    pub fn new(probe: HttpProbe, port: u16, timeout: Duration) -> Self {
        Self {
            probe,
            port,
            timeout,
        }
    }
}

impl IdentityProber for HttpIdentityProber {
    async fn identify(&self, ip: Ipv4Addr) -> Option<DeviceIdentity> {
        let addr = DeviceAddr::from_ip_port(ip, self.port);
        identity::fetch_identity(&self.probe, &addr, self.timeout)
            .await
            .ok()
    }
}

/// A discovered device: where it answered and what it claimed to be.
#[derive(Debug, Clone)]
pub struct ScanHit {
    pub ip: Ipv4Addr,
    pub identity: DeviceIdentity,
}

/// Priority-ordered batched subnet scanner.
pub struct SubnetScanner<P> {
    prober: P,
    config: ScanConfig,
}

impl<P: IdentityProber + Sync> SubnetScanner<P> {
    pub fn new(prober: P, config: ScanConfig) -> Self {
        Self { prober, config }
    }

    /// Recover the prober (used by tests to inspect probe order).
    pub fn into_prober(self) -> P {
        self.prober
    }

    /// Sweep the /24 derived from `local_ip`, first hit wins.
    ///
    /// Returns `None` only after every candidate has been probed.
    pub async fn scan_subnet(&self, local_ip: Ipv4Addr) -> Option<ScanHit> {
        let candidates = candidate_order(local_ip, self.config.gateway);
        self.scan_candidates(&candidates).await
    }

    /// Probe an explicit candidate list in the given order.
    pub async fn scan_candidates(&self, candidates: &[Ipv4Addr]) -> Option<ScanHit> {
        debug!(
            candidates = candidates.len(),
            batch = self.config.batch_size,
            "starting subnet sweep"
        );

        for batch in candidates.chunks(self.config.batch_size.max(1)) {
            let probes = batch.iter().map(|&ip| async move {
                self.prober
                    .identify(ip)
                    .await
                    .map(|identity| ScanHit { ip, identity })
            });

            // Await the whole batch, then pick the earliest candidate that
            // answered so priority ordering holds within a batch too.
            let results = join_all(probes).await;
            if let Some(hit) = results.into_iter().flatten().next() {
                info!(ip = %hit.ip, device_id = %hit.identity.device_id, "device found");
                return Some(hit);
            }
        }

        debug!("subnet sweep exhausted with no hit");
        None
    }
}

/// Build the full /24 candidate list ordered by likelihood.
///
/// Order: gateway, the typical DHCP lease band (.100-.149), the low
/// static band (.2-.49), then everything else ascending. The client's
/// own address is skipped.
pub fn candidate_order(local_ip: Ipv4Addr, gateway: Option<Ipv4Addr>) -> Vec<Ipv4Addr> {
    let [a, b, c, local_host] = local_ip.octets();
    let host = |h: u8| Ipv4Addr::new(a, b, c, h);

    let gateway = gateway.unwrap_or_else(|| host(1));
    let mut seen = [false; 256];
    seen[usize::from(local_host)] = true;

    let mut out = Vec::with_capacity(253);
    let mut push = |ip: Ipv4Addr, seen: &mut [bool; 256]| {
        let h = usize::from(ip.octets()[3]);
        if !seen[h] {
            seen[h] = true;
            out.push(ip);
        }
    };

    push(gateway, &mut seen);
    for h in 100..=149 {
        push(host(h), &mut seen);
    }
    for h in 2..=49 {
        push(host(h), &mut seen);
    }
    for h in 1..=254 {
        push(host(h), &mut seen);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ip(h: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, h)
    }

    #[test]
    fn gateway_comes_first() {
        let order = candidate_order(ip(42), None);
        assert_eq!(order[0], ip(1));
    }

    #[test]
    fn explicit_gateway_overrides_dot_one() {
        let order = candidate_order(ip(42), Some(ip(254)));
        assert_eq!(order[0], ip(254));
        // .1 still appears later via the remainder pass.
        assert!(order.contains(&ip(1)));
    }

    #[test]
    fn dhcp_band_precedes_low_static_band() {
        let order = candidate_order(ip(42), None);
        let pos = |h: u8| order.iter().position(|&c| c == ip(h)).unwrap();
        assert!(pos(107) < pos(10), ".107 (DHCP band) before .10 (static band)");
        assert!(pos(10) < pos(200), ".10 before .200 (remainder)");
    }

    #[test]
    fn covers_full_host_range_except_self() {
        let order = candidate_order(ip(42), None);
        assert_eq!(order.len(), 253); // 254 hosts minus the client itself
        assert!(!order.contains(&ip(42)));
        assert!(order.contains(&ip(254)));
    }
}
