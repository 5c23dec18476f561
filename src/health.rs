use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub time: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    pub environment: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/message", get(message))
}

pub async fn health() -> Json<HealthResponse> {
    let time = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(HealthResponse {
        status: "ok".into(),
        time,
    })
}

pub async fn message(State(state): State<AppState>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Citricloud backend is online.".into(),
        environment: state.config.environment.clone(),
    })
}
