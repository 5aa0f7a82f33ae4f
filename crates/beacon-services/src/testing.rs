//! In-memory discovery backend and host for tests.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backend::{DiscoveryBackend, DiscoveryError, DiscoveryEvent, EventSink, Responder};
use crate::descriptor::ServiceDescriptor;
use crate::lifecycle::Host;

#[derive(Default)]
struct Recorded {
    created: Vec<IpAddr>,
    registrations: Vec<(IpAddr, ServiceDescriptor)>,
    closed: Vec<IpAddr>,
    info_requests: Vec<(String, String)>,
    sinks: Vec<(String, Arc<dyn EventSink>)>,
    fail_setup: HashSet<IpAddr>,
    fail_register: HashSet<IpAddr>,
}

type Hook = Box<dyn FnOnce() + Send>;

/// Records every call; events are injected with [`MemoryBackend::emit`].
#[derive(Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<Recorded>>,
    closed: AtomicBool,
    fail_close: AtomicBool,
    close_delay: Mutex<Option<Duration>>,
    on_first_responder: Mutex<Option<Hook>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responder creation on `addr` fails.
    pub fn fail_on(&self, addr: IpAddr) {
        self.state.lock().unwrap().fail_setup.insert(addr);
    }

    /// Registration on the responder for `addr` fails.
    pub fn reject_registration_on(&self, addr: IpAddr) {
        self.state.lock().unwrap().fail_register.insert(addr);
    }

    /// Closing the primary handle fails.
    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    /// Closing the primary handle takes `delay`.
    pub fn slow_close(&self, delay: Duration) {
        *self.close_delay.lock().unwrap() = Some(delay);
    }

    /// Run `hook` inside the first `create_responder` call, before it returns.
    pub fn on_first_responder(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_first_responder.lock().unwrap() = Some(Box::new(hook));
    }

    /// Deliver `event` to every sink browsing its service type.
    pub fn emit(&self, event: DiscoveryEvent) {
        let sinks: Vec<Arc<dyn EventSink>> = self
            .state
            .lock()
            .unwrap()
            .sinks
            .iter()
            .filter(|(ty, _)| ty == event.service_type())
            .map(|(_, s)| s.clone())
            .collect();
        for sink in sinks {
            sink.on_event(event.clone());
        }
    }

    pub fn created_responders(&self) -> Vec<IpAddr> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn registrations(&self) -> Vec<(IpAddr, ServiceDescriptor)> {
        self.state.lock().unwrap().registrations.clone()
    }

    pub fn closed_responders(&self) -> Vec<IpAddr> {
        self.state.lock().unwrap().closed.clone()
    }

    pub fn info_requests(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().info_requests.clone()
    }

    pub fn browsed_types(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .sinks
            .iter()
            .map(|(ty, _)| ty.clone())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MemoryResponder {
    addr: IpAddr,
    state: Arc<Mutex<Recorded>>,
}

impl Responder for MemoryResponder {
    fn address(&self) -> IpAddr {
        self.addr
    }

    fn register(&self, descriptor: &ServiceDescriptor) -> Result<(), DiscoveryError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_register.contains(&self.addr) {
            return Err(DiscoveryError::Register {
                name: descriptor.name.clone(),
                reason: "rejected".to_string(),
            });
        }
        state.registrations.push((self.addr, descriptor.clone()));
        Ok(())
    }

    fn close(&self) -> Result<(), DiscoveryError> {
        self.state.lock().unwrap().closed.push(self.addr);
        Ok(())
    }
}

impl DiscoveryBackend for MemoryBackend {
    fn create_responder(&self, addr: IpAddr) -> Result<Box<dyn Responder>, DiscoveryError> {
        let hook = self.on_first_responder.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        let mut state = self.state.lock().unwrap();
        if state.fail_setup.contains(&addr) {
            return Err(DiscoveryError::Setup {
                addr,
                reason: "address unavailable".to_string(),
            });
        }
        state.created.push(addr);
        Ok(Box::new(MemoryResponder {
            addr,
            state: self.state.clone(),
        }))
    }

    fn browse(&self, service_type: &str, sink: Arc<dyn EventSink>) -> Result<(), DiscoveryError> {
        self.state
            .lock()
            .unwrap()
            .sinks
            .push((service_type.to_string(), sink));
        Ok(())
    }

    fn request_info(&self, service_type: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .info_requests
            .push((service_type.to_string(), name.to_string()));
    }

    fn close(&self) -> Result<(), DiscoveryError> {
        let delay = *self.close_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Shutdown("socket already gone".to_string()));
        }
        Ok(())
    }
}

/// A host whose readiness is flipped by the test.
pub struct StaticHost {
    ready: AtomicBool,
    node_name: String,
    pin: String,
    addr: SocketAddr,
}

impl StaticHost {
    pub fn new(node_name: &str, pin: &str, addr: SocketAddr) -> Self {
        Self {
            ready: AtomicBool::new(false),
            node_name: node_name.to_string(),
            pin: pin.to_string(),
            addr,
        }
    }

    pub fn ready(node_name: &str, pin: &str, addr: SocketAddr) -> Self {
        let host = Self::new(node_name, pin, addr);
        host.set_ready(true);
        host
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

impl Host for StaticHost {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn node_name(&self) -> String {
        self.node_name.clone()
    }

    fn certificate_pin(&self) -> String {
        self.pin.clone()
    }

    fn app_server_addr(&self) -> Option<SocketAddr> {
        Some(self.addr)
    }
}
