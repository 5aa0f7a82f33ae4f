//! Discovery backend seam.
//!
//! The multicast discovery library is a black box behind these traits. The
//! daemon plugs in mDNS; tests plug in an in-memory backend.

use std::net::IpAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::descriptor::ServiceDescriptor;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to create responder on {addr}: {reason}")]
    Setup { addr: IpAddr, reason: String },
    #[error("failed to register '{name}': {reason}")]
    Register { name: String, reason: String },
    #[error("failed to browse {service_type}: {reason}")]
    Browse { service_type: String, reason: String },
    #[error("failed to close discovery handle: {0}")]
    Shutdown(String),
}

/// A change reported by the discovery library for one remote instance.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// An instance name appeared; its record is not known yet.
    Added { service_type: String, name: String },
    /// An instance went away.
    Removed { service_type: String, name: String },
    /// The full record of an instance is known.
    Resolved(ServiceDescriptor),
}

impl DiscoveryEvent {
    pub fn name(&self) -> &str {
        match self {
            DiscoveryEvent::Added { name, .. } | DiscoveryEvent::Removed { name, .. } => name,
            DiscoveryEvent::Resolved(d) => &d.name,
        }
    }

    pub fn service_type(&self) -> &str {
        match self {
            DiscoveryEvent::Added { service_type, .. }
            | DiscoveryEvent::Removed { service_type, .. } => service_type,
            DiscoveryEvent::Resolved(d) => &d.service_type,
        }
    }
}

/// Receives discovery events. Called on threads owned by the backend.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: DiscoveryEvent);
}

/// A discovery endpoint bound to one local address.
pub trait Responder: Send + Sync {
    fn address(&self) -> IpAddr;

    /// Start advertising `descriptor` from this responder.
    fn register(&self, descriptor: &ServiceDescriptor) -> Result<(), DiscoveryError>;

    /// Withdraw everything registered here and release the endpoint.
    fn close(&self) -> Result<(), DiscoveryError>;
}

/// The primary discovery handle.
pub trait DiscoveryBackend: Send + Sync {
    /// Create an independent responder bound to `addr`.
    fn create_responder(&self, addr: IpAddr) -> Result<Box<dyn Responder>, DiscoveryError>;

    /// Deliver events for `service_type` to `sink` until the handle is closed.
    fn browse(&self, service_type: &str, sink: Arc<dyn EventSink>) -> Result<(), DiscoveryError>;

    /// Ask the library to fetch the full record of an instance.
    fn request_info(&self, service_type: &str, name: &str);

    /// Close the primary handle. Responders are closed separately.
    fn close(&self) -> Result<(), DiscoveryError>;
}
