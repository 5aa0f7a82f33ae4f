//! /status, /peers, /daemon/shutdown handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::{service_infos, ApiState, ServiceInfo};

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub state: String,
    pub advertised: Vec<ServiceInfo>,
    pub peers: Vec<ServiceInfo>,
    pub disabled: Vec<ServiceInfo>,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let snap = state.controller.snapshot();
    Json(StatusResponse {
        state: snap.state.to_string(),
        advertised: service_infos(&snap.advertised),
        peers: service_infos(&snap.peers),
        disabled: service_infos(&snap.disabled),
    })
}

/// The status view is read-only; writes are accepted and ignored.
pub async fn handle_status_update() -> StatusCode {
    StatusCode::NO_CONTENT
}

// ── /peers ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PeersResponse {
    pub peers: Vec<ServiceInfo>,
}

pub async fn handle_peers(State(state): State<ApiState>) -> Json<PeersResponse> {
    Json(PeersResponse {
        peers: service_infos(&state.controller.registry().snapshot()),
    })
}

// ── /daemon/shutdown ──────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ShutdownResponse {
    pub message: String,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    let _ = state.shutdown_tx.send(());
    Json(ShutdownResponse {
        message: "shutting down".to_string(),
    })
}
