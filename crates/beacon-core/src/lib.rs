//! beacon-core — wire format, announcement signing, and configuration.
//! All other Beacon crates depend on this one.

pub mod config;
pub mod crypto;
pub mod signal;
pub mod wire;

pub use signal::{Signal, SignalEncoder};
pub use wire::{Announcement, Framing, WireError};
