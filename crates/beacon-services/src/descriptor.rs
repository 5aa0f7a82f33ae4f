//! Service descriptors: one record per advertised or discovered service.

use std::net::IpAddr;

use bytes::Bytes;

/// A discovery record: who, where, and the opaque metadata it carries.
///
/// Equality is identity plus metadata. Two records for the same instance
/// name with the same payload are the same service, whatever address or
/// port they were seen on.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// Instance name. At most 62 bytes, no '.'.
    pub name: String,
    /// Fully qualified service type, e.g. `_darknetapp._tcp.local.`.
    pub service_type: String,
    /// Host name of the machine offering the service.
    pub host: String,
    pub addresses: Vec<IpAddr>,
    pub port: u16,
    /// Free-form record metadata. For the app server this is the signal.
    pub metadata: Bytes,
}

impl PartialEq for ServiceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.metadata == other.metadata
    }
}

impl Eq for ServiceDescriptor {}

impl ServiceDescriptor {
    /// Clone of this descriptor advertised on a single address.
    pub fn on_address(&self, addr: IpAddr) -> Self {
        Self {
            addresses: vec![addr],
            ..self.clone()
        }
    }

    /// Metadata rendered for humans: UTF-8 text when it is text, hex otherwise.
    pub fn metadata_text(&self) -> String {
        match std::str::from_utf8(&self.metadata) {
            Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
            _ => hex::encode(&self.metadata),
        }
    }
}

/// Turn a node name into a `.local.` host name.
///
/// Keeps ASCII alphanumerics and '-', maps everything else to '-'.
pub fn local_host_name(node_name: &str) -> String {
    let label: String = node_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .take(63)
        .collect();
    let label = label.trim_matches('-');
    if label.is_empty() {
        "beacon.local.".to_string()
    } else {
        format!("{label}.local.")
    }
}
