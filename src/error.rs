//! Error handling for the PTZ hold controller

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::ptz_controller::ActuatorError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Actuator unreachable or permission denied (fatal until reconnect)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Exclusive operation rejected (reset while moving, press while resetting)
    #[error("Busy: {0}")]
    Busy(String),

    /// Unknown axis name
    #[error("Invalid axis: {0}")]
    InvalidAxis(String),

    /// A single actuation failed
    #[error("Actuator error: {0}")]
    Actuator(#[from] ActuatorError),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::Connection(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CONNECTION_ERROR",
                msg.clone(),
            ),
            Error::Busy(msg) => (StatusCode::CONFLICT, "BUSY", msg.clone()),
            Error::InvalidAxis(msg) => (StatusCode::BAD_REQUEST, "INVALID_AXIS", msg.clone()),
            Error::Actuator(e) => (StatusCode::BAD_GATEWAY, "ACTUATOR_ERROR", e.to_string()),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            Error::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                msg.clone(),
            ),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
