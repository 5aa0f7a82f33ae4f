//! Discovery backends.
//!
//! The lifecycle only sees the `DiscoveryBackend` trait; mDNS is the one
//! the daemon ships with.

pub mod mdns;

pub use mdns::MdnsBackend;
