//! Discovery event listener.
//!
//! Receives add/remove/resolve callbacks from the discovery backend on the
//! backend's own threads and keeps the peer registry current. Only events
//! for the node channel touch the registry; everything else is logged and
//! dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::backend::{DiscoveryBackend, DiscoveryEvent, EventSink};
use crate::registry::PeerRegistry;

pub struct DiscoveryEventListener {
    node_service_type: String,
    backend: Arc<dyn DiscoveryBackend>,
    registry: PeerRegistry,
    notify: Notify,
    events_seen: AtomicU64,
}

impl DiscoveryEventListener {
    pub fn new(
        node_service_type: impl Into<String>,
        backend: Arc<dyn DiscoveryBackend>,
        registry: PeerRegistry,
    ) -> Self {
        Self {
            node_service_type: node_service_type.into(),
            backend,
            registry,
            notify: Notify::new(),
            events_seen: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Number of events handled so far, of any kind.
    pub fn events_seen(&self) -> u64 {
        self.events_seen.load(Ordering::Acquire)
    }

    /// Resolves after the next handled event.
    pub async fn changed(&self) {
        self.notify.notified().await;
    }

    /// Wait until at least `count` events have been handled in total.
    pub async fn wait_for_events(&self, count: u64) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent event cannot slip
            // between the load and the await.
            notified.as_mut().enable();
            if self.events_seen() >= count {
                return;
            }
            notified.await;
        }
    }

    fn handle(&self, event: DiscoveryEvent) {
        let on_node_channel = event.service_type() == self.node_service_type;

        match event {
            DiscoveryEvent::Added { service_type, name } => {
                tracing::debug!(%service_type, %name, "service added, requesting info");
                self.backend.request_info(&service_type, &name);
            }
            DiscoveryEvent::Resolved(descriptor) if on_node_channel => {
                tracing::info!(
                    name = %descriptor.name,
                    host = %descriptor.host,
                    port = descriptor.port,
                    "peer resolved"
                );
                if self.registry.upsert(descriptor) {
                    tracing::debug!(peers = self.registry.len(), "peer registry grew");
                }
            }
            DiscoveryEvent::Removed { name, .. } if on_node_channel => {
                if self.registry.remove(&name).is_some() {
                    tracing::info!(%name, "peer removed");
                } else {
                    tracing::debug!(%name, "removal for unknown peer");
                }
            }
            other => {
                tracing::trace!(
                    service_type = other.service_type(),
                    name = other.name(),
                    "ignoring event on foreign channel"
                );
            }
        }

        self.events_seen.fetch_add(1, Ordering::AcqRel);
        self.notify.notify_waiters();
    }
}

impl EventSink for DiscoveryEventListener {
    fn on_event(&self, event: DiscoveryEvent) {
        self.handle(event);
    }
}
