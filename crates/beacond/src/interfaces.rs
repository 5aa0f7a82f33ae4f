//! Local interface enumeration via getifaddrs(3).

use std::collections::BTreeMap;
use std::io;
use std::net::IpAddr;

use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;
use nix::sys::socket::SockaddrStorage;

use beacon_services::{InterfaceSource, LocalInterface};

/// Reads the system interface table on every call.
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> io::Result<Vec<LocalInterface>> {
        let addrs = getifaddrs().map_err(io::Error::from)?;

        // getifaddrs yields one entry per (interface, address); fold by name.
        let mut by_name: BTreeMap<String, LocalInterface> = BTreeMap::new();
        for ifa in addrs {
            let entry = by_name
                .entry(ifa.interface_name.clone())
                .or_insert_with(|| LocalInterface {
                    name: ifa.interface_name.clone(),
                    is_up: ifa.flags.contains(InterfaceFlags::IFF_UP),
                    is_loopback: ifa.flags.contains(InterfaceFlags::IFF_LOOPBACK),
                    is_virtual: is_alias(&ifa.interface_name),
                    addresses: Vec::new(),
                });
            if let Some(ip) = ifa.address.as_ref().and_then(ip_of) {
                entry.addresses.push(ip);
            }
        }

        let interfaces: Vec<LocalInterface> = by_name.into_values().collect();
        tracing::debug!(count = interfaces.len(), "enumerated interfaces");
        Ok(interfaces)
    }
}

/// Alias interfaces are named `parent:N`.
fn is_alias(name: &str) -> bool {
    name.contains(':')
}

fn ip_of(addr: &SockaddrStorage) -> Option<IpAddr> {
    if let Some(v4) = addr.as_sockaddr_in() {
        return Some(IpAddr::V4(v4.ip()));
    }
    addr.as_sockaddr_in6().map(|v6| IpAddr::V6(v6.ip()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_detection() {
        assert!(is_alias("eth0:1"));
        assert!(!is_alias("eth0"));
        assert!(!is_alias("wlp3s0"));
    }

    #[test]
    fn enumerates_loopback() {
        let interfaces = SystemInterfaces.interfaces().unwrap();
        let lo = interfaces.iter().find(|i| i.is_loopback);
        if let Some(lo) = lo {
            assert!(!lo.qualifies());
        }
    }
}
