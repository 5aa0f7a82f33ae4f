use serde_json::Value;

use beacon_core::signal::verify_signal;
use beacon_services::{DiscoveryEvent, ServiceDescriptor};

use crate::*;

async fn get(url: &str) -> Result<Value> {
    Ok(reqwest::get(url).await?.error_for_status()?.json().await?)
}

#[tokio::test]
async fn status_reports_lifecycle_and_sets() -> Result<()> {
    let node = Node::start("MyNode", "0.0.0.0:7859", Framing::Legacy, true);
    node.wait_for(LifecycleState::Advertising).await?;
    let (base, _shutdown) = start_api(node.controller.clone()).await?;

    let status = get(&format!("{base}/status")).await?;
    assert_eq!(status["state"], "advertising");
    assert_eq!(status["advertised"].as_array().map(Vec::len), Some(2));
    assert_eq!(status["peers"].as_array().map(Vec::len), Some(0));
    assert_eq!(status["disabled"].as_array().map(Vec::len), Some(0));

    let first = &status["advertised"][0];
    assert_eq!(first["name"], "server -=MyNode=-");
    assert_eq!(first["service_type"], APP_TYPE);
    assert_eq!(first["addresses"][0], "192.168.7.10");
    assert_eq!(first["port"], 7859);

    node.stop().await
}

#[tokio::test]
async fn status_post_is_a_no_op() -> Result<()> {
    let node = Node::start("MyNode", "0.0.0.0:7859", Framing::Legacy, true);
    node.wait_for(LifecycleState::Advertising).await?;
    let (base, _shutdown) = start_api(node.controller.clone()).await?;

    let resp = reqwest::Client::new()
        .post(format!("{base}/status"))
        .body("{\"state\":\"stopped\"}")
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 204);
    assert!(resp.bytes().await?.is_empty());

    let status = get(&format!("{base}/status")).await?;
    assert_eq!(status["state"], "advertising");

    node.stop().await
}

#[tokio::test]
async fn loopback_node_shows_disabled_service() -> Result<()> {
    let node = Node::start("Local", "127.0.0.1:7859", Framing::Legacy, true);
    node.wait_for(LifecycleState::Advertising).await?;
    let (base, _shutdown) = start_api(node.controller.clone()).await?;

    let status = get(&format!("{base}/status")).await?;
    assert_eq!(status["advertised"].as_array().map(Vec::len), Some(0));
    assert_eq!(status["disabled"].as_array().map(Vec::len), Some(1));
    assert_eq!(status["disabled"][0]["addresses"][0], "127.0.0.1");
    assert!(node.backend.created_responders().is_empty());

    node.stop().await
}

#[tokio::test]
async fn peers_endpoint_tracks_registry() -> Result<()> {
    let node = Node::start("MyNode", "0.0.0.0:7859", Framing::Legacy, true);
    node.wait_for(LifecycleState::Advertising).await?;
    let (base, _shutdown) = start_api(node.controller.clone()).await?;

    node.backend.emit(DiscoveryEvent::Resolved(ServiceDescriptor {
        name: "server -=Other=-".to_string(),
        service_type: NODE_TYPE.to_string(),
        host: "other.local.".to_string(),
        addresses: vec!["192.168.7.44".parse().unwrap()],
        port: 7859,
        metadata: bytes::Bytes::from_static(b"\x01\x02"),
    }));

    node.backend.emit(DiscoveryEvent::Resolved(ServiceDescriptor {
        name: "printer".to_string(),
        service_type: NODE_TYPE.to_string(),
        host: "printer.local.".to_string(),
        addresses: vec!["192.168.7.45".parse().unwrap()],
        port: 631,
        metadata: bytes::Bytes::from_static(b"version=1"),
    }));

    let peers = get(&format!("{base}/peers")).await?;
    assert_eq!(peers["peers"][0]["name"], "printer");
    assert_eq!(peers["peers"][0]["parameters"], "version=1");
    assert_eq!(peers["peers"][1]["name"], "server -=Other=-");
    assert_eq!(peers["peers"][1]["metadata"], "0102");
    assert_eq!(peers["peers"][1]["parameters"], "0102");

    node.backend.emit(DiscoveryEvent::Removed {
        service_type: NODE_TYPE.to_string(),
        name: "printer".to_string(),
    });

    node.backend.emit(DiscoveryEvent::Removed {
        service_type: NODE_TYPE.to_string(),
        name: "server -=Other=-".to_string(),
    });
    let peers = get(&format!("{base}/peers")).await?;
    assert_eq!(peers["peers"].as_array().map(Vec::len), Some(0));

    node.stop().await
}

#[tokio::test]
async fn announcement_endpoint_serves_verifiable_payload() -> Result<()> {
    let node = Node::start("MyNode", "0.0.0.0:7859", Framing::Legacy, false);
    let (base, _shutdown) = start_api(node.controller.clone()).await?;

    // Not built until the host is ready.
    let resp = reqwest::get(format!("{base}/announcement")).await?;
    assert_eq!(resp.status().as_u16(), 503);

    node.host.set_ready(true);
    node.wait_for(LifecycleState::Advertising).await?;

    let ann = get(&format!("{base}/announcement")).await?;
    assert_eq!(ann["framing"], "legacy");
    let name = ann["instance_name"].as_str().context("instance_name")?;
    let payload = ann["payload"].as_str().context("payload")?;
    let bytes = hex::decode(payload)?;
    assert_eq!(ann["length"], bytes.len());
    verify_signal(name, &bytes, Framing::Legacy)?;

    node.stop().await
}

#[tokio::test]
async fn shutdown_endpoint_broadcasts() -> Result<()> {
    let node = Node::start("MyNode", "0.0.0.0:7859", Framing::Legacy, true);
    let (base, shutdown) = start_api(node.controller.clone()).await?;
    let mut rx = shutdown.subscribe();

    let resp: Value = reqwest::Client::new()
        .post(format!("{base}/daemon/shutdown"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["message"], "shutting down");

    tokio::time::timeout(Duration::from_secs(5), rx.recv()).await??;
    node.stop().await
}
