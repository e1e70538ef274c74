// pondlink-api: Async HTTP client for the pondlink relay appliance.
//
// Covers the full device-facing surface: single-shot probes, subnet
// discovery, identity lookup, the two credential-injection protocol
// families (legacy settings endpoints and structured RPC), and the
// telemetry/relay endpoints the sync layer polls.

pub mod addr;
pub mod endpoints;
pub mod error;
pub mod identity;
pub mod injector;
pub mod legacy;
pub mod probe;
pub mod rpc;
pub mod scan;

pub use addr::DeviceAddr;
pub use error::Error;
pub use identity::DeviceIdentity;
pub use injector::{CredentialInjector, Generation, InjectionReport, WifiCredentials};
pub use legacy::CredentialEncoding;
pub use probe::{HttpProbe, ProbeOutcome, ProbeReply};
pub use rpc::{RpcClient, SwitchStatus};
pub use scan::{HttpIdentityProber, IdentityProber, ScanConfig, SubnetScanner};
