//! beacon-services — discovery state and lifecycle.
//!
//! Everything here talks to the network through [`DiscoveryBackend`]; the
//! daemon supplies the mDNS implementation.

pub mod backend;
pub mod descriptor;
pub mod fanout;
pub mod lifecycle;
pub mod listener;
pub mod registry;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use backend::{DiscoveryBackend, DiscoveryError, DiscoveryEvent, EventSink, Responder};
pub use descriptor::ServiceDescriptor;
pub use fanout::{InterfaceSource, LocalInterface};
pub use lifecycle::{
    DiscoverySnapshot, Host, LifecycleConfig, LifecycleController, LifecycleError, LifecycleState,
};
pub use listener::DiscoveryEventListener;
pub use registry::{AdvertisedServices, DisabledServices, PeerRegistry, ServiceList};
