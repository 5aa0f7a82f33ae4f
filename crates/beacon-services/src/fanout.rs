//! Per-address responder fan-out.
//!
//! One discovery responder per qualifying local address, each advertising
//! its own copy of the service descriptor. A failure on one address never
//! stops the others.

use std::io;
use std::net::IpAddr;

use crate::backend::{DiscoveryBackend, Responder};
use crate::descriptor::ServiceDescriptor;
use crate::registry::AdvertisedServices;

/// A local network interface as seen at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInterface {
    pub name: String,
    pub is_up: bool,
    pub is_loopback: bool,
    /// Alias/sub-interface (e.g. `eth0:1`).
    pub is_virtual: bool,
    pub addresses: Vec<IpAddr>,
}

impl LocalInterface {
    /// Up, not loopback, not virtual.
    pub fn qualifies(&self) -> bool {
        self.is_up && !self.is_loopback && !self.is_virtual
    }
}

/// 6to4 transition addresses generate conflicting probes.
pub fn is_six_to_four(addr: &IpAddr) -> bool {
    addr.to_string().starts_with("2002:")
}

/// Every address a responder should be created for, in interface order.
pub fn qualifying_addresses(interfaces: &[LocalInterface]) -> Vec<IpAddr> {
    interfaces
        .iter()
        .filter(|iface| iface.qualifies())
        .flat_map(|iface| iface.addresses.iter().copied())
        .filter(|addr| !is_six_to_four(addr))
        .collect()
}

/// Source of the local interface list.
pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self) -> io::Result<Vec<LocalInterface>>;
}

impl InterfaceSource for Vec<LocalInterface> {
    fn interfaces(&self) -> io::Result<Vec<LocalInterface>> {
        Ok(self.clone())
    }
}

/// Create one responder per qualifying address and register `descriptor`
/// on each.
///
/// Every successful registration is recorded in `advertised`. Returns the
/// live responders; the caller owns them and must close them.
pub fn fan_out(
    backend: &dyn DiscoveryBackend,
    interfaces: &[LocalInterface],
    descriptor: &ServiceDescriptor,
    advertised: &AdvertisedServices,
) -> Vec<Box<dyn Responder>> {
    let mut responders = Vec::new();

    for addr in qualifying_addresses(interfaces) {
        let responder = match backend.create_responder(addr) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(%addr, error = %e, "responder setup failed, skipping address");
                continue;
            }
        };

        let clone = descriptor.on_address(addr);
        if let Err(e) = responder.register(&clone) {
            tracing::warn!(%addr, error = %e, "service registration failed, skipping address");
            if let Err(e) = responder.close() {
                tracing::debug!(%addr, error = %e, "closing failed responder");
            }
            continue;
        }

        tracing::info!(
            %addr,
            name = %clone.name,
            service_type = %clone.service_type,
            port = clone.port,
            "service advertised"
        );
        advertised.push(clone);
        responders.push(responder);
    }

    responders
}
