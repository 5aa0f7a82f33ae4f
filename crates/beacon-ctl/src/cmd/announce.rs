//! Own announcement and offline signal verification.

use anyhow::{Context, Result};
use serde::Deserialize;

use beacon_core::signal::verify_signal;
use beacon_core::Framing;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct AnnouncementResponse {
    instance_name: String,
    framing: String,
    length: usize,
    payload: String,
}

pub async fn cmd_announcement(port: u16) -> Result<()> {
    let resp: AnnouncementResponse =
        get_json(&format!("{}/announcement", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Announcement");
    println!("═══════════════════════════════════════");
    println!("  Instance : {}", resp.instance_name);
    println!("  Framing  : {}", resp.framing);
    println!("  Length   : {} bytes", resp.length);
    println!("  Payload  : {}", resp.payload);

    Ok(())
}

/// Decode a hex payload and check its signature against `name`.
pub fn cmd_verify(name: &str, payload_hex: &str, framing: Option<&str>) -> Result<()> {
    let framing: Framing = match framing {
        Some(f) => f.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        None => Framing::default(),
    };
    let payload = hex::decode(payload_hex.trim()).context("payload is not valid hex")?;

    let ann = verify_signal(name, &payload, framing).context("signal rejected")?;

    println!("✓ signature valid");
    println!("  Instance   : {}", name);
    println!("  Pin        : {}", String::from_utf8_lossy(&ann.pin));
    println!("  Public key : {} bytes", ann.public_key.len());
    println!("  Signature  : {} bytes", ann.signature.len());
    Ok(())
}
