//! The local node as seen by the discovery lifecycle.

use std::net::SocketAddr;
use std::sync::OnceLock;

use beacon_services::Host;

/// Node identity plus the app server address, which is only known once the
/// listener has bound. Ready as soon as that address is set.
pub struct NodeHost {
    node_name: String,
    pin: String,
    app_server: OnceLock<SocketAddr>,
}

impl NodeHost {
    pub fn new(node_name: String, pin: String) -> Self {
        Self {
            node_name,
            pin,
            app_server: OnceLock::new(),
        }
    }

    /// Record the bound app server address. Later calls are ignored.
    pub fn set_app_server(&self, addr: SocketAddr) {
        if self.app_server.set(addr).is_err() {
            tracing::debug!(%addr, "app server address already set");
        }
    }
}

impl Host for NodeHost {
    fn is_ready(&self) -> bool {
        self.app_server.get().is_some()
    }

    fn node_name(&self) -> String {
        self.node_name.clone()
    }

    fn certificate_pin(&self) -> String {
        self.pin.clone()
    }

    fn app_server_addr(&self) -> Option<SocketAddr> {
        self.app_server.get().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_once_bound() {
        let host = NodeHost::new("node".to_string(), "pin".to_string());
        assert!(!host.is_ready());
        assert!(host.app_server_addr().is_none());

        let addr: SocketAddr = "0.0.0.0:7859".parse().unwrap();
        host.set_app_server(addr);
        host.set_app_server("0.0.0.0:1".parse().unwrap());

        assert!(host.is_ready());
        assert_eq!(host.app_server_addr(), Some(addr));
    }
}
