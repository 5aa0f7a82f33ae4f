//! /announcement — this node's own signed announcement.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::ApiState;

#[derive(Serialize)]
pub struct AnnouncementResponse {
    pub instance_name: String,
    pub framing: String,
    pub length: usize,
    pub payload: String,
}

pub async fn handle_announcement(
    State(state): State<ApiState>,
) -> Result<Json<AnnouncementResponse>, (StatusCode, String)> {
    let signal = state.controller.signal().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "announcement not built yet".to_string(),
    ))?;
    Ok(Json(AnnouncementResponse {
        instance_name: signal.instance_name.clone(),
        framing: signal.framing.to_string(),
        length: signal.payload.len(),
        payload: hex::encode(&signal.payload),
    }))
}
