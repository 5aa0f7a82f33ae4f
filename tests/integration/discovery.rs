use std::net::IpAddr;

use bytes::Bytes;

use beacon_core::signal::verify_signal;
use beacon_core::wire::{join_marker, LEGACY_TAIL_LEN};
use beacon_services::{DiscoveryEvent, ServiceDescriptor};

use crate::*;

fn removed(name: &str) -> DiscoveryEvent {
    DiscoveryEvent::Removed {
        service_type: NODE_TYPE.to_string(),
        name: name.to_string(),
    }
}

fn added(name: &str) -> DiscoveryEvent {
    DiscoveryEvent::Added {
        service_type: NODE_TYPE.to_string(),
        name: name.to_string(),
    }
}

/// What node `from` looks like to a browser on the node channel.
fn seen_on_node_channel(from: &Node) -> DiscoveryEvent {
    let advertised = from.controller.snapshot().advertised;
    let first = advertised.first().expect("node advertises nothing");
    DiscoveryEvent::Resolved(ServiceDescriptor {
        service_type: NODE_TYPE.to_string(),
        ..first.clone()
    })
}

#[tokio::test]
async fn node_advertises_once_per_qualifying_address() -> Result<()> {
    let node = Node::start("MyNode", "0.0.0.0:7859", Framing::Legacy, true);
    node.wait_for(LifecycleState::Advertising).await?;

    let created: Vec<String> = node
        .backend
        .created_responders()
        .iter()
        .map(IpAddr::to_string)
        .collect();
    assert_eq!(created, ["192.168.7.10", "fe80::10"]);

    for (addr, descriptor) in node.backend.registrations() {
        assert_eq!(descriptor.addresses, vec![addr]);
        assert_eq!(descriptor.service_type, APP_TYPE);
        assert_eq!(descriptor.name, "server -=MyNode=-");
        assert_eq!(descriptor.port, 7859);
    }
    assert_eq!(node.backend.browsed_types(), vec![NODE_TYPE.to_string()]);

    node.stop().await
}

#[tokio::test]
async fn legacy_signal_tail_matches_field_lengths() -> Result<()> {
    let node = Node::start("MyNode", "0.0.0.0:7859", Framing::Legacy, true);
    node.wait_for(LifecycleState::Advertising).await?;

    let signal = node.controller.signal().context("no signal")?.clone();
    let ann = verify_signal(&signal.instance_name, &signal.payload, Framing::Legacy)?;

    let s = ann.signature.len();
    let k = ann.public_key.len();
    let tail = &signal.payload[signal.payload.len() - LEGACY_TAIL_LEN..];
    assert_eq!(tail, [(s / 16) as u8, (s % 16) as u8, ((s + k) / 16) as u8, ((s + k) % 16) as u8]);
    assert_eq!(join_marker(tail[0], tail[1]), s);
    assert_eq!(join_marker(tail[2], tail[3]), s + k);
    assert_eq!(ann.pin, b"pin -=pin-of-MyNode=-");

    node.stop().await
}

#[tokio::test]
async fn peer_signal_verifies_from_registry() -> Result<()> {
    let a = Node::start("alpha", "0.0.0.0:7859", Framing::LengthPrefixed, true);
    let b = Node::start("bravo", "0.0.0.0:7860", Framing::LengthPrefixed, true);
    a.wait_for(LifecycleState::Advertising).await?;
    b.wait_for(LifecycleState::Advertising).await?;

    a.backend.emit(added("server -=bravo=-"));
    a.backend.emit(seen_on_node_channel(&b));

    let peers = a.controller.registry().snapshot();
    assert_eq!(peers.len(), 1);
    let peer = &peers[0];
    assert_eq!(peer.name, "server -=bravo=-");
    verify_signal(&peer.name, &peer.metadata, Framing::LengthPrefixed)?;

    // A forged identity does not verify with bravo's signal.
    assert!(verify_signal("server -=mallory=-", &peer.metadata, Framing::LengthPrefixed).is_err());

    assert_eq!(
        a.backend.info_requests(),
        vec![(NODE_TYPE.to_string(), "server -=bravo=-".to_string())]
    );

    a.stop().await?;
    b.stop().await
}

#[tokio::test]
async fn registry_converges_to_last_terminal_event() -> Result<()> {
    let node = Node::start("MyNode", "0.0.0.0:7859", Framing::Legacy, true);
    node.wait_for(LifecycleState::Advertising).await?;

    let resolved = |name: &str, tag: &'static [u8]| {
        DiscoveryEvent::Resolved(ServiceDescriptor {
            name: name.to_string(),
            service_type: NODE_TYPE.to_string(),
            host: "peer.local.".to_string(),
            addresses: vec!["192.168.7.20".parse().unwrap()],
            port: 1,
            metadata: Bytes::from_static(tag),
        })
    };

    let sequences: Vec<(Vec<DiscoveryEvent>, bool)> = vec![
        (vec![added("p"), resolved("p", b"1")], true),
        (vec![added("p"), resolved("p", b"1"), removed("p")], false),
        (vec![resolved("p", b"1"), removed("p"), added("p"), resolved("p", b"2")], true),
        (vec![removed("p"), resolved("p", b"1"), resolved("p", b"2")], true),
        (vec![resolved("p", b"1"), added("p"), removed("p"), added("p")], false),
    ];

    for (events, present) in sequences {
        node.backend.emit(removed("p"));
        for event in events {
            node.backend.emit(event);
        }
        assert_eq!(node.controller.registry().contains("p"), present);
    }

    node.stop().await
}

#[tokio::test]
async fn terminate_closes_every_responder_and_is_idempotent() -> Result<()> {
    let node = Node::start("MyNode", "0.0.0.0:7859", Framing::Legacy, true);
    node.wait_for(LifecycleState::Advertising).await?;

    let controller = node.controller.clone();
    let backend = node.backend.clone();
    node.stop().await?;

    assert_eq!(controller.state(), LifecycleState::Stopped);
    controller.terminate();
    assert_eq!(controller.state(), LifecycleState::Stopped);

    let mut created = backend.created_responders();
    let mut closed = backend.closed_responders();
    created.sort();
    closed.sort();
    assert_eq!(created, closed);
    assert!(backend.is_closed());
    assert!(controller.snapshot().advertised.is_empty());
    Ok(())
}

#[tokio::test]
async fn node_waits_for_host_then_advertises() -> Result<()> {
    let node = Node::start("late", "0.0.0.0:7859", Framing::Legacy, false);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(node.controller.state(), LifecycleState::Starting);
    assert!(node.controller.signal().is_none());

    node.host.set_ready(true);
    node.wait_for(LifecycleState::Advertising).await?;
    assert!(node.controller.signal().is_some());

    node.stop().await
}
