// Device endpoint catalog.
//
// Firmware variants in the field expose different subsets of these
// paths. Encoding the fallback chains as ordered data -- consumed by
// one generic try-in-order helper -- keeps the "which endpoint first"
// knowledge out of the control flow that uses it.

/// Identity endpoint: hardware id, MAC, model, generation. Present on
/// every known firmware, which makes it the discovery/verification probe.
pub const IDENTITY: &str = "/identify";

/// Generic status endpoint: relay outputs plus per-channel telemetry.
pub const STATUS: &str = "/status";

/// Structured device-info endpoint (RPC generation only).
pub const RPC_DEVICE_INFO: &str = "/rpc/Device.GetInfo";

/// Structured Wi-Fi configuration call (RPC generation only).
pub const RPC_WIFI_SET_CONFIG: &str = "/rpc/Wifi.SetConfig";

/// Explicit reboot command (RPC generation only).
pub const RPC_DEVICE_REBOOT: &str = "/rpc/Device.Reboot";

/// Per-relay status (RPC generation only). Takes `?id=N`.
pub const RPC_SWITCH_GET_STATUS: &str = "/rpc/Switch.GetStatus";

/// Relay set (RPC generation only). Takes `?id=N&on=true|false`.
pub const RPC_SWITCH_SET: &str = "/rpc/Switch.Set";

/// Legacy station-mode Wi-Fi settings endpoint. Accepts (depending on
/// firmware) GET with query params, form POST, or JSON POST.
pub const LEGACY_STA_SETTINGS: &str = "/settings/sta";

/// Reachability classification list, tried cheapest / most-likely first.
///
/// A device is considered connected as soon as any of these answers;
/// the order encodes observed firmware compatibility.
pub const STATUS_PROBE_PATHS: &[&str] =
    &[IDENTITY, STATUS, RPC_DEVICE_INFO, "/", "/settings", "/info"];

/// Try candidates in order; first one `attempt` accepts wins.
///
/// Returns the winning candidate together with the value `attempt`
/// produced for it, or `None` when every candidate was refused.
pub async fn try_in_order<C, T, F, Fut>(candidates: &[C], mut attempt: F) -> Option<(C, T)>
where
    C: Copy,
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for &candidate in candidates {
        if let Some(value) = attempt(candidate).await {
            return Some((candidate, value));
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn try_in_order_returns_first_accepted() {
        let order: &[u32] = &[1, 2, 3, 4];
        let mut tried = Vec::new();

        let hit = try_in_order(order, |n| {
            tried.push(n);
            async move { (n == 3).then_some(n * 10) }
        })
        .await;

        assert_eq!(hit, Some((3, 30)));
        assert_eq!(tried, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn try_in_order_exhausts_to_none() {
        let order: &[u32] = &[1, 2];
        let hit: Option<(u32, ())> = try_in_order(order, |_| async { None }).await;
        assert!(hit.is_none());
    }
}
