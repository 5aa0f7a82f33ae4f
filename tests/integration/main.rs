//! Beacon integration test harness.
//!
//! Everything runs in-process: nodes use the in-memory discovery backend,
//! so no multicast traffic leaves the machine, and the status API binds an
//! ephemeral port on 127.0.0.1.
//!
//!   cargo test --test integration

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use beacon_core::crypto::SigningKeypair;
use beacon_core::{Framing, SignalEncoder};
use beacon_services::testing::{MemoryBackend, StaticHost};
use beacon_services::{
    InterfaceSource, LifecycleConfig, LifecycleController, LifecycleError, LifecycleState,
    LocalInterface,
};

mod api;
mod discovery;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const NODE_TYPE: &str = "_darknet._udp.local.";
pub const APP_TYPE: &str = "_darknetapp._tcp.local.";

/// eth0 with two usable addresses, lo, and a 6to4 tunnel.
pub fn lan_interfaces() -> Arc<dyn InterfaceSource> {
    Arc::new(vec![
        LocalInterface {
            name: "lo".to_string(),
            is_up: true,
            is_loopback: true,
            is_virtual: false,
            addresses: vec!["127.0.0.1".parse().unwrap(), "::1".parse().unwrap()],
        },
        LocalInterface {
            name: "eth0".to_string(),
            is_up: true,
            is_loopback: false,
            is_virtual: false,
            addresses: vec!["192.168.7.10".parse().unwrap(), "fe80::10".parse().unwrap()],
        },
        LocalInterface {
            name: "tun6to4".to_string(),
            is_up: true,
            is_loopback: false,
            is_virtual: false,
            addresses: vec!["2002:c0a8:70a::1".parse().unwrap()],
        },
    ])
}

/// One in-process node with its discovery task running.
pub struct Node {
    pub controller: Arc<LifecycleController>,
    pub backend: Arc<MemoryBackend>,
    pub host: Arc<StaticHost>,
    pub run: JoinHandle<Result<(), LifecycleError>>,
}

impl Node {
    pub fn start(name: &str, bind: &str, framing: Framing, ready: bool) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let addr: SocketAddr = bind.parse().unwrap();
        let host = Arc::new(if ready {
            StaticHost::ready(name, &format!("pin-of-{name}"), addr)
        } else {
            StaticHost::new(name, &format!("pin-of-{name}"), addr)
        });
        let config = LifecycleConfig {
            instance_prefix: String::new(),
            node_service_type: NODE_TYPE.to_string(),
            app_server_service_type: APP_TYPE.to_string(),
            readiness_poll: Duration::from_millis(10),
        };
        let encoder = SignalEncoder::new(SigningKeypair::generate().unwrap(), framing);
        let controller = Arc::new(LifecycleController::new(
            config,
            encoder,
            host.clone(),
            backend.clone(),
            lan_interfaces(),
        ));
        let run = tokio::spawn({
            let controller = controller.clone();
            async move { controller.run().await }
        });
        Self {
            controller,
            backend,
            host,
            run,
        }
    }

    pub async fn wait_for(&self, state: LifecycleState) -> Result<()> {
        let mut rx = self.controller.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == state))
            .await
            .with_context(|| format!("timed out waiting for {state}"))?
            .context("state channel closed")?;
        Ok(())
    }

    pub async fn stop(self) -> Result<()> {
        self.controller.terminate();
        tokio::time::timeout(Duration::from_secs(5), self.run)
            .await
            .context("run did not return after terminate")?
            .context("run task panicked")?
            .context("run returned an error")?;
        Ok(())
    }
}

/// Serve the status API for `controller` on an ephemeral port.
pub async fn start_api(
    controller: Arc<LifecycleController>,
) -> Result<(String, broadcast::Sender<()>)> {
    let (shutdown_tx, _) = broadcast::channel(1);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}/api", listener.local_addr()?);
    let state = beacon_api::ApiState {
        controller,
        shutdown_tx: shutdown_tx.clone(),
    };
    tokio::spawn(async move {
        let _ = beacon_api::serve_on(listener, state).await;
    });
    Ok((base, shutdown_tx))
}
