//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - HTTP routes for press / release / reset / connect
//! - Status snapshot and SSE event feed for the UI

mod ptz_routes;
mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::ptz_controller::ConnectionState;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.controller.status().await;

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "actuator_connected": status.connection == ConnectionState::Connected,
    }))
}
