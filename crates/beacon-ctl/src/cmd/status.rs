//! Daemon status, peers, shutdown commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json, post_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    state: String,
    advertised: Vec<ServiceInfo>,
    peers: Vec<ServiceInfo>,
    disabled: Vec<ServiceInfo>,
}

#[derive(Deserialize)]
struct PeersResponse {
    peers: Vec<ServiceInfo>,
}

#[derive(Deserialize)]
struct ServiceInfo {
    name: String,
    service_type: String,
    host: String,
    addresses: Vec<String>,
    port: u16,
    parameters: String,
}

fn print_service(s: &ServiceInfo) {
    println!("  ┌─ {}", s.name);
    println!("  │  type      : {}", s.service_type);
    println!("  │  host      : {}", s.host);
    println!("  │  addresses : {}", s.addresses.join(", "));
    println!("  │  port      : {}", s.port);
    println!("  └─ parameters: {}", s.parameters);
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Beacon Status");
    println!("═══════════════════════════════════════");
    println!("  State            : {}", resp.state);
    println!("  Advertised       : {}", resp.advertised.len());
    println!("  Peers discovered : {}", resp.peers.len());
    println!("  Disabled         : {}", resp.disabled.len());

    if !resp.advertised.is_empty() {
        println!("\n  Advertising:");
        for s in &resp.advertised {
            print_service(s);
        }
    }
    if !resp.disabled.is_empty() {
        println!("\n  Not advertised (loopback only):");
        for s in &resp.disabled {
            print_service(s);
        }
    }

    Ok(())
}

pub async fn cmd_peers(port: u16) -> Result<()> {
    let resp: PeersResponse = get_json(&format!("{}/peers", base_url(port))).await?;

    if resp.peers.is_empty() {
        println!("No peers discovered yet.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Discovered Peers ({})", resp.peers.len());
    println!("═══════════════════════════════════════");

    for p in &resp.peers {
        print_service(p);
    }

    Ok(())
}

pub async fn cmd_shutdown(port: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct ShutdownResponse {
        message: String,
    }

    let resp: ShutdownResponse = post_json(&format!("{}/daemon/shutdown", base_url(port))).await?;
    println!("{}", resp.message);
    Ok(())
}
