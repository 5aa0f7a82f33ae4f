//! Discovery lifecycle.
//!
//! Starting → Advertising → ShuttingDown → Stopped.
//!
//! [`LifecycleController::run`] waits for the host, builds the signal, fans
//! out responders, starts browsing, then parks until [`terminate`] moves the
//! state to `Stopped`. The state lives in a watch channel so any task can
//! observe it, and so the parked worker wakes on the transition instead of
//! on a bare notify.
//!
//! [`terminate`]: LifecycleController::terminate

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::watch;

use beacon_core::config::BeaconConfig;
use beacon_core::signal::{instance_identity, pin_text, Signal, SignalEncoder};
use beacon_core::wire::WireError;

use crate::backend::{DiscoveryBackend, EventSink, Responder};
use crate::descriptor::{local_host_name, ServiceDescriptor};
use crate::fanout::{fan_out, InterfaceSource, LocalInterface};
use crate::listener::DiscoveryEventListener;
use crate::registry::{AdvertisedServices, DisabledServices, PeerRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Advertising,
    ShuttingDown,
    Stopped,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Advertising => "advertising",
            LifecycleState::ShuttingDown => "shutting_down",
            LifecycleState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot encode announcement: {0}")]
    Encoding(#[from] WireError),
}

/// What the controller needs from the node it advertises.
pub trait Host: Send + Sync {
    /// True once the node is initialised and its app server is bound.
    fn is_ready(&self) -> bool;
    fn node_name(&self) -> String;
    /// Fingerprint of the app server's TLS certificate.
    fn certificate_pin(&self) -> String;
    /// Where the app server listens. `None` until bound.
    fn app_server_addr(&self) -> Option<SocketAddr>;
}

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub instance_prefix: String,
    pub node_service_type: String,
    pub app_server_service_type: String,
    pub readiness_poll: Duration,
}

impl From<&BeaconConfig> for LifecycleConfig {
    fn from(config: &BeaconConfig) -> Self {
        Self {
            instance_prefix: config.identity.instance_prefix.clone(),
            node_service_type: config.discovery.node_service_type.clone(),
            app_server_service_type: config.discovery.app_server_service_type.clone(),
            readiness_poll: config.discovery.readiness_poll(),
        }
    }
}

/// Point-in-time copy of everything the status view shows.
#[derive(Debug, Clone)]
pub struct DiscoverySnapshot {
    pub state: LifecycleState,
    pub advertised: Vec<ServiceDescriptor>,
    pub peers: Vec<ServiceDescriptor>,
    pub disabled: Vec<ServiceDescriptor>,
}

pub struct LifecycleController {
    config: LifecycleConfig,
    encoder: SignalEncoder,
    host: Arc<dyn Host>,
    backend: Arc<dyn DiscoveryBackend>,
    interfaces: Arc<dyn InterfaceSource>,

    registry: PeerRegistry,
    advertised: AdvertisedServices,
    disabled: DisabledServices,
    listener: Arc<DiscoveryEventListener>,
    responders: Mutex<Vec<Box<dyn Responder>>>,
    /// Held for the whole of `terminate()`.
    terminating: Mutex<()>,
    signal: OnceLock<Signal>,
    state: watch::Sender<LifecycleState>,
}

impl LifecycleController {
    pub fn new(
        config: LifecycleConfig,
        encoder: SignalEncoder,
        host: Arc<dyn Host>,
        backend: Arc<dyn DiscoveryBackend>,
        interfaces: Arc<dyn InterfaceSource>,
    ) -> Self {
        let registry = PeerRegistry::new();
        let listener = Arc::new(DiscoveryEventListener::new(
            config.node_service_type.clone(),
            backend.clone(),
            registry.clone(),
        ));
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self {
            config,
            encoder,
            host,
            backend,
            interfaces,
            registry,
            advertised: AdvertisedServices::new(),
            disabled: DisabledServices::new(),
            listener,
            responders: Mutex::new(Vec::new()),
            terminating: Mutex::new(()),
            signal: OnceLock::new(),
            state,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// The announcement, once built.
    pub fn signal(&self) -> Option<&Signal> {
        self.signal.get()
    }

    pub fn snapshot(&self) -> DiscoverySnapshot {
        DiscoverySnapshot {
            state: self.state(),
            advertised: self.advertised.snapshot(),
            peers: self.registry.snapshot(),
            disabled: self.disabled.snapshot(),
        }
    }

    fn lock_responders(&self) -> MutexGuard<'_, Vec<Box<dyn Responder>>> {
        self.responders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Run ───────────────────────────────────────────────────────────────────

    /// Drive the lifecycle until terminated.
    ///
    /// Returns `Ok(())` after `terminate()`, including when it arrives before
    /// the host was ever ready. An encoding failure shuts the controller down
    /// and is returned.
    pub async fn run(&self) -> Result<(), LifecycleError> {
        let mut state_rx = self.state.subscribe();

        let Some(app_addr) = self.wait_until_ready(&mut state_rx).await else {
            tracing::info!("terminated before host became ready");
            return Ok(());
        };

        let node_name = self.host.node_name();
        let identity = instance_identity(&self.config.instance_prefix, &node_name);
        let pin = pin_text(&self.host.certificate_pin());

        let signal = match self.encoder.encode(&identity, &pin) {
            Ok(s) => self.signal.get_or_init(|| s),
            Err(e) => {
                tracing::error!(error = %e, "announcement encoding failed");
                self.terminate();
                return Err(e.into());
            }
        };
        tracing::info!(
            instance = %signal.instance_name,
            framing = %signal.framing,
            bytes = signal.payload.len(),
            "announcement built"
        );

        let descriptor = ServiceDescriptor {
            name: signal.instance_name.clone(),
            service_type: self.config.app_server_service_type.clone(),
            host: local_host_name(&node_name),
            addresses: vec![app_addr.ip()],
            port: app_addr.port(),
            metadata: Bytes::from(signal.payload.clone()),
        };

        let responders = if app_addr.ip().is_loopback() {
            tracing::info!(addr = %app_addr, "app server is loopback only, not advertising");
            self.disabled.push(descriptor);
            Vec::new()
        } else {
            let interfaces = self.advertisable_interfaces(app_addr.ip());
            fan_out(self.backend.as_ref(), &interfaces, &descriptor, &self.advertised)
        };

        let sink: Arc<dyn EventSink> = self.listener.clone();
        if let Err(e) = self.backend.browse(&self.config.node_service_type, sink) {
            tracing::warn!(error = %e, "browsing for peers failed");
        }

        {
            let mut held = self.lock_responders();
            held.extend(responders);
            let advanced = self.state.send_if_modified(|s| {
                if *s == LifecycleState::Starting {
                    *s = LifecycleState::Advertising;
                    true
                } else {
                    false
                }
            });
            if !advanced {
                // terminate() already drained the list; what we just added is ours to close.
                let late: Vec<_> = held.drain(..).collect();
                drop(held);
                close_responders(late);
                self.advertised.clear();
                return Ok(());
            }
        }

        tracing::info!(
            advertised = self.advertised.len(),
            disabled = self.disabled.len(),
            "advertising"
        );

        loop {
            if *state_rx.borrow_and_update() == LifecycleState::Stopped {
                break;
            }
            tokio::select! {
                r = state_rx.changed() => {
                    if r.is_err() {
                        break;
                    }
                }
                _ = self.listener.changed() => {
                    tracing::debug!(peers = self.registry.len(), "peer registry changed");
                }
            }
        }

        tracing::info!("discovery stopped");
        Ok(())
    }

    /// Poll the host until it is ready. `None` if terminated first.
    async fn wait_until_ready(
        &self,
        state_rx: &mut watch::Receiver<LifecycleState>,
    ) -> Option<SocketAddr> {
        loop {
            if *state_rx.borrow_and_update() != LifecycleState::Starting {
                return None;
            }
            if self.host.is_ready() {
                if let Some(addr) = self.host.app_server_addr() {
                    return Some(addr);
                }
            }
            tracing::trace!("host not ready");
            tokio::select! {
                _ = tokio::time::sleep(self.config.readiness_poll) => {}
                r = state_rx.changed() => {
                    if r.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    /// Local interfaces to advertise on, narrowed to `bind` when the app
    /// server is bound to one specific address.
    fn advertisable_interfaces(&self, bind: IpAddr) -> Vec<LocalInterface> {
        let mut interfaces = match self.interfaces.interfaces() {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "interface enumeration failed");
                return Vec::new();
            }
        };
        if !bind.is_unspecified() {
            for iface in &mut interfaces {
                iface.addresses.retain(|a| *a == bind);
            }
        }
        interfaces
    }

    // ── Terminate ─────────────────────────────────────────────────────────────

    /// Stop advertising and release every discovery handle.
    ///
    /// Safe from any thread, at any point, any number of times. Returns
    /// once the state is `Stopped`, also when another caller got there first.
    pub fn terminate(&self) {
        let _serial = self.terminating.lock().unwrap_or_else(PoisonError::into_inner);
        let began = self.state.send_if_modified(|s| match s {
            LifecycleState::Starting | LifecycleState::Advertising => {
                *s = LifecycleState::ShuttingDown;
                true
            }
            LifecycleState::ShuttingDown | LifecycleState::Stopped => false,
        });
        if !began {
            tracing::debug!(state = %self.state(), "terminate: already stopped");
            return;
        }

        let responders: Vec<_> = self.lock_responders().drain(..).collect();
        let count = responders.len();
        close_responders(responders);
        self.advertised.clear();

        if let Err(e) = self.backend.close() {
            tracing::warn!(error = %e, "closing discovery handle failed");
        }

        self.state.send_replace(LifecycleState::Stopped);
        tracing::info!(responders = count, "discovery terminated");
    }
}

fn close_responders(responders: Vec<Box<dyn Responder>>) {
    for responder in responders {
        if let Err(e) = responder.close() {
            tracing::warn!(addr = %responder.address(), error = %e, "closing responder failed");
        }
    }
}
