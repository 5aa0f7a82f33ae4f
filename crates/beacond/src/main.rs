//! beacond — announces this node's app server on the local network and
//! tracks nearby darknet peers over mDNS.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use beacon_core::config::BeaconConfig;
use beacon_core::crypto::{SigningKeypair, TlsIdentity};
use beacon_core::SignalEncoder;
use beacon_services::descriptor::local_host_name;
use beacon_services::{LifecycleConfig, LifecycleController};

mod app_server;
mod discovery;
mod host;
mod interfaces;
mod tls;

use discovery::MdnsBackend;
use host::NodeHost;
use interfaces::SystemInterfaces;
use tls::TlsListenerSocketAdapter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = BeaconConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = BeaconConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        BeaconConfig::default()
    });

    let node_name = config.identity.resolved_node_name();
    tracing::info!(node = %node_name, framing = %config.discovery.framing, "beacond starting");

    // TLS identity. Every announcement carries the pin of this certificate.
    let host_label = local_host_name(&node_name);
    let identity = TlsIdentity::self_signed(vec![
        host_label.trim_end_matches('.').to_string(),
        "localhost".to_string(),
    ])
    .context("failed to create TLS identity")?;
    let pin = identity.pin();
    tracing::info!(%pin, "TLS identity ready");

    let host = Arc::new(NodeHost::new(node_name, pin));

    // App server. The host reports ready once it has bound.
    let bind = SocketAddr::new(config.network.app_server_bind, config.network.app_server_port);
    let factory = TlsListenerSocketAdapter::new(bind, &identity)
        .context("failed to build TLS server config")?;
    {
        let host = host.clone();
        std::thread::Builder::new()
            .name("app-server".to_string())
            .spawn(move || match app_server::bind(&factory) {
                Ok((socket, addr)) => {
                    tracing::info!(%addr, "app server listening");
                    host.set_app_server(addr);
                    app_server::accept_loop(socket);
                }
                Err(e) => {
                    tracing::error!(bind = %factory.bind_addr(), error = %e, "app server bind failed, not advertising");
                }
            })
            .context("failed to spawn app server thread")?;
    }

    // Discovery
    let keypair = SigningKeypair::generate().context("failed to generate signing key")?;
    tracing::info!(public_key = hex::encode(keypair.public_key_der()), "signing key ready");
    let encoder = SignalEncoder::new(keypair, config.discovery.framing);
    let backend = Arc::new(MdnsBackend::new()?);

    let controller = Arc::new(LifecycleController::new(
        LifecycleConfig::from(&config),
        encoder,
        host,
        backend,
        Arc::new(SystemInterfaces),
    ));

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let discovery_task = {
        let controller = controller.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.run().await {
                tracing::error!(error = %e, "discovery stopped");
            }
        })
    };

    // Status HTTP endpoint
    let api_port = config.network.api_port;
    {
        let state = beacon_api::ApiState {
            controller: controller.clone(),
            shutdown_tx: shutdown_tx.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = beacon_api::serve(state, api_port).await {
                tracing::error!(error = %e, "status server failed");
            }
        });
    }

    // ── Wait for exit ────────────────────────────────────────────────────────

    let _ = shutdown_rx.recv().await;
    tracing::info!("shutting down");
    controller.terminate();

    match tokio::time::timeout(Duration::from_secs(5), discovery_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "discovery task panicked"),
        Err(_) => tracing::warn!("discovery task did not stop in time"),
    }

    Ok(())
}
