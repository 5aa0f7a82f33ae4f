//! HTTP API handlers — exposes discovery state as JSON.

pub mod announcement;
pub mod status;

use std::sync::Arc;

use serde::Serialize;

use beacon_services::{LifecycleController, ServiceDescriptor};

#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<LifecycleController>,
    /// Shutdown broadcast sender — signals graceful daemon shutdown.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

// ── Shared helpers ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub service_type: String,
    pub host: String,
    pub addresses: Vec<String>,
    pub port: u16,
    /// Metadata as hex.
    pub metadata: String,
    /// Metadata for display: the text itself when printable, hex otherwise.
    pub parameters: String,
}

impl From<&ServiceDescriptor> for ServiceInfo {
    fn from(d: &ServiceDescriptor) -> Self {
        Self {
            name: d.name.clone(),
            service_type: d.service_type.clone(),
            host: d.host.clone(),
            addresses: d.addresses.iter().map(|a| a.to_string()).collect(),
            port: d.port,
            metadata: hex::encode(&d.metadata),
            parameters: d.metadata_text(),
        }
    }
}

fn service_infos(descriptors: &[ServiceDescriptor]) -> Vec<ServiceInfo> {
    descriptors.iter().map(ServiceInfo::from).collect()
}

// Re-export handler functions for use in router setup.
pub use announcement::handle_announcement;
pub use status::{handle_peers, handle_shutdown, handle_status, handle_status_update};
