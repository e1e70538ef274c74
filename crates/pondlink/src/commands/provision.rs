//! Provisioning handler: onboard a factory-default appliance.

use std::net::{Ipv4Addr, UdpSocket};

use pondlink_api::DeviceAddr;
use pondlink_core::{DeviceManager, FileRegistry, ProvisionRequest, ProvisionState};

use crate::cli::{GlobalOpts, ProvisionArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    manager: &DeviceManager<FileRegistry>,
    args: ProvisionArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let config_owner = match &global.config {
        Some(path) => pondlink_config::load_config_from(path)?.owner,
        None => pondlink_config::load_config_or_default().owner,
    };
    let owner = global
        .owner
        .clone()
        .or(config_owner)
        .ok_or(CliError::NoOwner)?;

    let device_ap_addr =
        DeviceAddr::from_base(&args.device_ap).map_err(|e| CliError::Validation {
            field: "device-ap".into(),
            reason: e.to_string(),
        })?;

    let local_ip = match args.local_ip {
        Some(ip) => ip,
        None => detect_local_ip().ok_or(CliError::NoLocalIp)?,
    };

    let request = ProvisionRequest {
        owner,
        site_name: args.site,
        ssid: args.ssid,
        passphrase: args.passphrase.into(),
        device_ap_addr,
        local_ip,
        candidates: (!args.candidates.is_empty()).then_some(args.candidates),
    };

    // Surface progress as it happens; provisioning takes a while.
    let mut progress = manager.provision_progress();
    let quiet = global.quiet;
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let state = progress.borrow_and_update().clone();
            if !quiet {
                if let Some(line) = progress_line(&state) {
                    eprintln!("{line}");
                }
            }
            if matches!(state, ProvisionState::Registered { .. }) {
                break;
            }
        }
    });

    let result = manager.provision(&request).await;
    reporter.abort();

    let record = result?;
    output::print_output(
        &format!("provisioned {} at {}", record.id, record.ip.map_or_else(|| "?".into(), |ip| ip.to_string())),
        global.quiet,
    );
    Ok(())
}

fn progress_line(state: &ProvisionState) -> Option<String> {
    match state {
        ProvisionState::Idle => None,
        ProvisionState::ContactingDevice => Some("contacting device on its AP...".into()),
        ProvisionState::GenerationDetected(generation) => {
            Some(format!("device generation: {generation:?}"))
        }
        ProvisionState::CredentialsSent => Some("credentials sent, device rebooting...".into()),
        ProvisionState::AwaitingRejoin { attempt } => {
            Some(format!("waiting for device to rejoin (attempt {attempt})..."))
        }
        ProvisionState::Verified { ip } => Some(format!("device verified at {ip}")),
        ProvisionState::Registered { id } => Some(format!("registered as {id}")),
    }
}

/// Best-effort local IPv4 discovery: a connected UDP socket reveals the
/// address the OS would route from. No packet is sent.
fn detect_local_ip() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("198.51.100.1:53").ok()?;
    match socket.local_addr().ok()? {
        std::net::SocketAddr::V4(addr) => Some(*addr.ip()),
        std::net::SocketAddr::V6(_) => None,
    }
}
