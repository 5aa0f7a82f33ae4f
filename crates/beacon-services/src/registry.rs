//! Peer registry and advertised/disabled service lists.
//!
//! The registry is a concurrent map from instance name to descriptor,
//! written by discovery callback threads and read by the status view.
//! Readers always get a copy, never a live view.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;

use crate::descriptor::ServiceDescriptor;

// ── Peer registry ─────────────────────────────────────────────────────────────

/// Services discovered from other nodes, keyed by instance name.
///
/// A resolve for a known name replaces the stored descriptor, so the
/// registry holds at most one entry per identity.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<DashMap<String, ServiceDescriptor>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            peers: Arc::new(DashMap::new()),
        }
    }

    /// Insert or replace. Returns true if the name was not present.
    pub fn upsert(&self, descriptor: ServiceDescriptor) -> bool {
        self.peers
            .insert(descriptor.name.clone(), descriptor)
            .is_none()
    }

    /// Remove the entry for `name`, if any.
    pub fn remove(&self, name: &str) -> Option<ServiceDescriptor> {
        self.peers.remove(name).map(|(_, d)| d)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.peers.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<ServiceDescriptor> {
        self.peers.get(name).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Copy of every entry, ordered by name.
    pub fn snapshot(&self) -> Vec<ServiceDescriptor> {
        let mut peers: Vec<ServiceDescriptor> =
            self.peers.iter().map(|e| e.value().clone()).collect();
        peers.sort_by(|a, b| a.name.cmp(&b.name));
        peers
    }
}

// ── Ordered service lists ─────────────────────────────────────────────────────

/// An ordered, mutex-guarded list of descriptors.
///
/// Used for the services this node advertises (one entry per address) and
/// for the services it deliberately keeps off the network.
#[derive(Clone, Default)]
pub struct ServiceList {
    entries: Arc<Mutex<Vec<ServiceDescriptor>>>,
}

/// Descriptors currently advertised, one per responder address.
pub type AdvertisedServices = ServiceList;

/// Descriptors known but not advertised.
pub type DisabledServices = ServiceList;

impl ServiceList {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ServiceDescriptor>> {
        // Every critical section is a plain Vec operation; a poisoned lock
        // still holds a consistent list.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, descriptor: ServiceDescriptor) {
        self.lock().push(descriptor);
    }

    /// Empty the list, returning what it held.
    pub fn clear(&self) -> Vec<ServiceDescriptor> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<ServiceDescriptor> {
        self.lock().clone()
    }
}
