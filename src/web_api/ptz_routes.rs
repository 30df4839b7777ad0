//! PTZ API Routes
//!
//! HTTP endpoints standing in for the hold-to-move buttons

use crate::error::{Error, Result};
use crate::ptz_controller::{
    Axis, ConnectInfo, ControllerEvent, MoveIntent, Position, PressOutcome, PtzDirection,
    PtzStatus,
};
use crate::state::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;

/// Press request: a UI direction, or an explicit axis + increment
#[derive(Debug, Clone, Deserialize)]
pub struct PressRequest {
    #[serde(default)]
    pub direction: Option<PtzDirection>,
    #[serde(default)]
    pub axis: Option<String>,
    #[serde(default)]
    pub increment: Option<f64>,
}

/// Simple acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct PtzResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PtzResponse {
    pub fn success_with_message(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: Some(message.into()),
        }
    }
}

/// GET /api/ptz/status
pub async fn ptz_status(State(state): State<AppState>) -> Json<PtzStatus> {
    Json(state.controller.status().await)
}

/// POST /api/ptz/press
pub async fn ptz_press(
    State(state): State<AppState>,
    Json(request): Json<PressRequest>,
) -> Result<Json<PressOutcome>> {
    let outcome = match (request.direction, request.axis) {
        (Some(direction), _) => state.controller.press(direction).await?,
        (None, Some(axis)) => {
            let axis: Axis = axis.parse()?;
            let increment = request
                .increment
                .ok_or_else(|| Error::Validation("increment required with axis".to_string()))?;
            state
                .controller
                .press_intent(MoveIntent::new(axis, increment))
                .await?
        }
        (None, None) => {
            return Err(Error::Validation(
                "either direction or axis+increment required".to_string(),
            ))
        }
    };
    Ok(Json(outcome))
}

/// POST /api/ptz/release
pub async fn ptz_release(State(state): State<AppState>) -> Json<PtzResponse> {
    state.controller.release().await;
    Json(PtzResponse::success_with_message("released"))
}

/// POST /api/ptz/reset
pub async fn ptz_reset(State(state): State<AppState>) -> Result<Json<Position>> {
    Ok(Json(state.controller.reset().await?))
}

/// POST /api/ptz/connect
pub async fn ptz_connect(State(state): State<AppState>) -> Result<Json<ConnectInfo>> {
    Ok(Json(state.controller.connect().await?))
}

/// POST /api/ptz/disconnect
pub async fn ptz_disconnect(State(state): State<AppState>) -> Json<PtzResponse> {
    state.controller.disconnect().await;
    Json(PtzResponse::success_with_message("disconnected"))
}

/// GET /api/ptz/events
/// Controller events as Server-Sent Events
pub async fn ptz_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let receiver = state.controller.subscribe();

    let stream = futures::stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let name = event_name(&event);
                    match Event::default().event(name).json_data(&event) {
                        Ok(sse) => return Some((Ok::<_, Infallible>(sse), receiver)),
                        Err(e) => tracing::warn!(error = %e, "Failed to encode PTZ event"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "PTZ event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn event_name(event: &ControllerEvent) -> &'static str {
    match event {
        ControllerEvent::Connected { .. } => "connected",
        ControllerEvent::ConnectionFailed { .. } => "connection_failed",
        ControllerEvent::GestureStarted { .. } => "gesture_started",
        ControllerEvent::GestureStopped => "gesture_stopped",
        ControllerEvent::PositionChanged(_) => "position_changed",
        ControllerEvent::GestureFailed { .. } => "gesture_failed",
        ControllerEvent::ResetDone(_) => "reset_done",
        ControllerEvent::Disconnected => "disconnected",
    }
}
