//! Actuator interface
//!
//! The physical/virtual PTZ head. Implementations: `SimulatedActuator`,
//! `OnvifActuator`.

use super::types::{Axis, Capabilities, ConnectInfo, Position};
use async_trait::async_trait;

/// Failure of a single actuator call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActuatorError {
    /// Device refused the constraint
    #[error("{axis} target {value} rejected: {reason}")]
    Rejected { axis: Axis, value: f64, reason: String },

    /// Transport failure
    #[error("I/O failure: {0}")]
    Io(String),

    /// Track/session gone
    #[error("actuator disconnected")]
    Disconnected,

    /// Non-finite target short-circuited before reaching the device
    #[error("invalid {axis} target {value}")]
    InvalidTarget { axis: Axis, value: f64 },

    /// Apply exceeded the configured timeout
    #[error("apply timed out after {0} ms")]
    Timeout(u64),

    /// Device unreachable or permission denied
    #[error("actuator unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous PTZ device. Callers keep at most one `apply_target` outstanding.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Acquire the device (media track)
    async fn connect(&self) -> Result<ConnectInfo, ActuatorError>;

    /// Per-axis movement range
    async fn get_range(&self) -> Result<Capabilities, ActuatorError>;

    /// Currently reported settings
    async fn get_position(&self) -> Result<Position, ActuatorError>;

    /// Move one axis to an absolute value
    async fn apply_target(&self, axis: Axis, value: f64) -> Result<(), ActuatorError>;

    /// Release the device (stop the track)
    async fn release(&self);
}
