//! SingleFlightActuator - at most one in-flight apply per actuator
//!
//! Overlapping submits are rejected immediately with `Busy` (no queueing, no
//! waiting); the caller retries on its own schedule. The in-flight slot is an
//! owned mutex guard held for the duration of one apply and released on drop,
//! so every exit path (success, error, invalid input, timeout, cancellation)
//! clears it exactly once.

use super::actuator::{Actuator, ActuatorError};
use super::types::Axis;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;

/// Submit failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmitError {
    /// Another apply is outstanding
    #[error("actuator busy")]
    Busy,

    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}

/// Single-flight wrapper around an external actuator
pub struct SingleFlightActuator {
    actuator: Arc<dyn Actuator>,
    slot: Arc<Mutex<()>>,
    apply_timeout: Duration,
}

impl SingleFlightActuator {
    pub fn new(actuator: Arc<dyn Actuator>, apply_timeout: Duration) -> Self {
        Self {
            actuator,
            slot: Arc::new(Mutex::new(())),
            apply_timeout,
        }
    }

    pub fn actuator(&self) -> &Arc<dyn Actuator> {
        &self.actuator
    }

    /// Whether an apply is currently outstanding
    pub fn is_in_flight(&self) -> bool {
        self.slot.try_lock().is_err()
    }

    /// Take the in-flight slot without waiting; `None` if already taken.
    /// Released when the returned lease is dropped.
    pub fn try_reserve(&self) -> Option<InFlightLease> {
        self.slot
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| InFlightLease { _guard: guard })
    }

    /// Apply `{axis: value}`; returns the applied value.
    /// Position is not touched here; committing is the caller's job.
    pub async fn submit(&self, axis: Axis, value: f64) -> Result<f64, SubmitError> {
        let Some(_lease) = self.try_reserve() else {
            tracing::trace!(axis = %axis, value, "Submit rejected - apply in flight");
            return Err(SubmitError::Busy);
        };

        if !value.is_finite() {
            return Err(ActuatorError::InvalidTarget { axis, value }.into());
        }

        tracing::debug!(axis = %axis, value, "Applying PTZ target");

        match timeout(self.apply_timeout, self.actuator.apply_target(axis, value)).await {
            Ok(Ok(())) => Ok(value),
            Ok(Err(e)) => {
                tracing::warn!(axis = %axis, value, error = %e, "PTZ apply failed");
                Err(e.into())
            }
            Err(_) => {
                let ms = self.apply_timeout.as_millis() as u64;
                tracing::warn!(axis = %axis, value, timeout_ms = ms, "PTZ apply timed out");
                Err(ActuatorError::Timeout(ms).into())
            }
        }
    }
}

/// Holds the in-flight slot; dropping it clears the guard
pub struct InFlightLease {
    _guard: OwnedMutexGuard<()>,
}

impl Drop for InFlightLease {
    fn drop(&mut self) {
        tracing::trace!("In-flight slot released");
    }
}
