// Device base address handling.
//
// The appliance speaks plain HTTP on its LAN address. `DeviceAddr`
// normalizes "where the device lives" so the rest of the crate never
// concatenates URL strings ad hoc.

use std::fmt;
use std::net::Ipv4Addr;

use url::Url;

use crate::error::Error;

/// Normalized base address of a device (`http://{ip}[:port]`).
///
/// Construct from an IP for production use, or from an arbitrary base URL
/// for tests that point at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAddr {
    base: String,
}

impl DeviceAddr {
    /// Address for a device on the default HTTP port.
    pub fn from_ip(ip: Ipv4Addr) -> Self {
        Self {
            base: format!("http://{ip}"),
        }
    }

    /// Address for a device on a non-default port.
    pub fn from_ip_port(ip: Ipv4Addr, port: u16) -> Self {
        if port == 80 {
            Self::from_ip(ip)
        } else {
            Self {
                base: format!("http://{ip}:{port}"),
            }
        }
    }

    /// Parse an explicit base URL (scheme + host + optional port).
    pub fn from_base(base: &str) -> Result<Self, Error> {
        let url = Url::parse(base)?;
        Ok(Self {
            base: url.as_str().trim_end_matches('/').to_owned(),
        })
    }

    /// Full URL for an absolute device path (must start with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// The normalized base URL string.
    pub fn as_str(&self) -> &str {
        &self.base
    }
}

impl fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn from_ip_omits_default_port() {
        let addr = DeviceAddr::from_ip_port(Ipv4Addr::new(192, 168, 1, 107), 80);
        assert_eq!(addr.as_str(), "http://192.168.1.107");
    }

    #[test]
    fn from_ip_port_keeps_custom_port() {
        let addr = DeviceAddr::from_ip_port(Ipv4Addr::new(10, 0, 0, 5), 8080);
        assert_eq!(addr.url("/status"), "http://10.0.0.5:8080/status");
    }

    #[test]
    fn from_base_strips_trailing_slash() {
        let addr = DeviceAddr::from_base("http://127.0.0.1:4455/").unwrap();
        assert_eq!(addr.url("/identify"), "http://127.0.0.1:4455/identify");
    }
}
