//! mDNS/DNS-SD backend on top of `mdns-sd`.
//!
//! The primary daemon browses. Each responder is a separate daemon limited
//! to one local address, so every address gets its own independent
//! announcer. The signal travels as the binary TXT value under
//! [`SIGNAL_TXT_KEY`].

use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use bytes::Bytes;
use mdns_sd::{IfKind, ServiceDaemon, ServiceEvent, ServiceInfo, TxtProperty};

use beacon_services::{
    DiscoveryBackend, DiscoveryError, DiscoveryEvent, EventSink, Responder, ServiceDescriptor,
};

/// TXT record key carrying the announcement payload.
pub const SIGNAL_TXT_KEY: &str = "signal";

pub struct MdnsBackend {
    daemon: ServiceDaemon,
}

impl MdnsBackend {
    pub fn new() -> Result<Self> {
        let daemon = ServiceDaemon::new().context("failed to start mDNS daemon")?;
        Ok(Self { daemon })
    }
}

impl DiscoveryBackend for MdnsBackend {
    fn create_responder(&self, addr: IpAddr) -> Result<Box<dyn Responder>, DiscoveryError> {
        let setup = |e: mdns_sd::Error| DiscoveryError::Setup {
            addr,
            reason: e.to_string(),
        };

        let daemon = ServiceDaemon::new().map_err(setup)?;
        let limited = daemon
            .disable_interface(IfKind::All)
            .and_then(|_| daemon.enable_interface(IfKind::Addr(addr)));
        if let Err(e) = limited {
            let _ = daemon.shutdown();
            return Err(setup(e));
        }

        tracing::debug!(%addr, "mDNS responder created");
        Ok(Box::new(MdnsResponder {
            addr,
            daemon,
            registered: Mutex::new(Vec::new()),
        }))
    }

    fn browse(&self, service_type: &str, sink: Arc<dyn EventSink>) -> Result<(), DiscoveryError> {
        let browse_err = |reason: String| DiscoveryError::Browse {
            service_type: service_type.to_string(),
            reason,
        };

        let receiver = self
            .daemon
            .browse(service_type)
            .map_err(|e| browse_err(e.to_string()))?;

        let ty = service_type.to_string();
        std::thread::Builder::new()
            .name("mdns-browse".to_string())
            .spawn(move || {
                // The channel closes when the daemon shuts down.
                while let Ok(event) = receiver.recv() {
                    if let Some(event) = translate(event) {
                        sink.on_event(event);
                    }
                }
                tracing::debug!(service_type = %ty, "browse ended");
            })
            .map_err(|e| browse_err(e.to_string()))?;

        tracing::info!(%service_type, "browsing");
        Ok(())
    }

    fn request_info(&self, service_type: &str, name: &str) {
        // mdns-sd resolves found instances on its own and reports
        // ServiceResolved; nothing to ask for.
        tracing::trace!(%service_type, %name, "resolution already in flight");
    }

    fn close(&self) -> Result<(), DiscoveryError> {
        self.daemon
            .shutdown()
            .map(|_| ())
            .map_err(|e| DiscoveryError::Shutdown(e.to_string()))
    }
}

struct MdnsResponder {
    addr: IpAddr,
    daemon: ServiceDaemon,
    /// Full names registered here, unregistered on close.
    registered: Mutex<Vec<String>>,
}

impl Responder for MdnsResponder {
    fn address(&self) -> IpAddr {
        self.addr
    }

    fn register(&self, descriptor: &ServiceDescriptor) -> Result<(), DiscoveryError> {
        let register_err = |e: mdns_sd::Error| DiscoveryError::Register {
            name: descriptor.name.clone(),
            reason: e.to_string(),
        };

        let info = service_record(descriptor, self.addr).map_err(register_err)?;

        let fullname = info.get_fullname().to_string();
        self.daemon.register(info).map_err(register_err)?;
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(fullname);
        Ok(())
    }

    fn close(&self) -> Result<(), DiscoveryError> {
        let names = std::mem::take(&mut *self.registered.lock().unwrap_or_else(PoisonError::into_inner));
        for name in names {
            if let Err(e) = self.daemon.unregister(&name) {
                tracing::debug!(addr = %self.addr, %name, error = %e, "unregister failed");
            }
        }
        self.daemon
            .shutdown()
            .map(|_| ())
            .map_err(|e| DiscoveryError::Shutdown(e.to_string()))
    }
}

/// The DNS-SD record published for `descriptor` on `addr`. The metadata is
/// carried verbatim as the TXT value, not as text.
fn service_record(
    descriptor: &ServiceDescriptor,
    addr: IpAddr,
) -> Result<ServiceInfo, mdns_sd::Error> {
    let properties = vec![TxtProperty::from((SIGNAL_TXT_KEY, &descriptor.metadata[..]))];
    ServiceInfo::new(
        &descriptor.service_type,
        &descriptor.name,
        &descriptor.host,
        addr,
        descriptor.port,
        properties,
    )
}

// ── Event translation ─────────────────────────────────────────────────────────

/// Strip `.{service_type}` from a full DNS-SD name.
fn instance_name(fullname: &str, service_type: &str) -> String {
    fullname
        .strip_suffix(service_type)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(fullname)
        .to_string()
}

fn descriptor_from(info: &ServiceInfo) -> ServiceDescriptor {
    let metadata = info
        .get_property_val(SIGNAL_TXT_KEY)
        .flatten()
        .map(Bytes::copy_from_slice)
        .unwrap_or_default();

    let mut addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
    addresses.sort();

    ServiceDescriptor {
        name: instance_name(info.get_fullname(), info.get_type()),
        service_type: info.get_type().to_string(),
        host: info.get_hostname().to_string(),
        addresses,
        port: info.get_port(),
        metadata,
    }
}

fn translate(event: ServiceEvent) -> Option<DiscoveryEvent> {
    match event {
        ServiceEvent::ServiceFound(ty, fullname) => Some(DiscoveryEvent::Added {
            name: instance_name(&fullname, &ty),
            service_type: ty,
        }),
        ServiceEvent::ServiceResolved(info) => {
            let descriptor = descriptor_from(&info);
            tracing::trace!(
                name = %descriptor.name,
                metadata = %hex::encode(&descriptor.metadata),
                "resolved record"
            );
            Some(DiscoveryEvent::Resolved(descriptor))
        }
        ServiceEvent::ServiceRemoved(ty, fullname) => Some(DiscoveryEvent::Removed {
            name: instance_name(&fullname, &ty),
            service_type: ty,
        }),
        _ => None,
    }
}
