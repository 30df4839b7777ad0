//! Simulated PTZ head
//!
//! Virtual actuator with a fixed range, configurable apply latency and
//! failure injection. Rejects out-of-range targets the way real hardware
//! rejects an over-constrained request. Tracks how many applies overlap.

use super::actuator::{Actuator, ActuatorError};
use super::types::{Axis, Capabilities, ConnectInfo, Position};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct SimState {
    position: Position,
    connected: bool,
    released: bool,
    refuse_connect: Option<String>,
    range_unavailable: bool,
    fail_calls: HashSet<usize>,
    fail_all: bool,
    applied: Vec<(Axis, f64)>,
}

/// Virtual actuator
pub struct SimulatedActuator {
    label: String,
    capabilities: Capabilities,
    latency: Duration,
    state: Mutex<SimState>,
    apply_calls: AtomicUsize,
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
}

impl SimulatedActuator {
    pub fn new(capabilities: Capabilities, position: Position) -> Self {
        Self {
            label: "Simulated PTZ".to_string(),
            capabilities,
            latency: Duration::ZERO,
            state: Mutex::new(SimState {
                position,
                ..Default::default()
            }),
            apply_calls: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
            max_outstanding: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Make `connect` fail (permission denied / unplugged)
    pub async fn refuse_connect(&self, reason: impl Into<String>) {
        self.state.lock().await.refuse_connect = Some(reason.into());
    }

    pub async fn allow_connect(&self) {
        self.state.lock().await.refuse_connect = None;
    }

    /// Make `get_range` fail
    pub async fn hide_range(&self, hidden: bool) {
        self.state.lock().await.range_unavailable = hidden;
    }

    /// Fail the n-th apply call (1-based)
    pub async fn fail_call(&self, n: usize) {
        self.state.lock().await.fail_calls.insert(n);
    }

    /// Fail every apply call while set
    pub async fn set_failing(&self, failing: bool) {
        self.state.lock().await.fail_all = failing;
    }

    /// Targets accepted so far, in order
    pub async fn applied(&self) -> Vec<(Axis, f64)> {
        self.state.lock().await.applied.clone()
    }

    pub async fn position(&self) -> Position {
        self.state.lock().await.position
    }

    pub async fn is_released(&self) -> bool {
        self.state.lock().await.released
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    /// Highest number of applies ever outstanding at once
    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding.load(Ordering::SeqCst)
    }

    async fn apply_inner(&self, call: usize, axis: Axis, value: f64) -> Result<(), ActuatorError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.state.lock().await;
        if !state.connected {
            return Err(ActuatorError::Disconnected);
        }
        if state.fail_all || state.fail_calls.remove(&call) {
            return Err(ActuatorError::Rejected {
                axis,
                value,
                reason: "simulated failure".to_string(),
            });
        }
        match self.capabilities.get(axis) {
            Some(range) if range.contains(value) => {}
            Some(_) => {
                return Err(ActuatorError::Rejected {
                    axis,
                    value,
                    reason: "outside range".to_string(),
                })
            }
            None => {
                return Err(ActuatorError::Rejected {
                    axis,
                    value,
                    reason: "axis not supported".to_string(),
                })
            }
        }

        state.position.set(axis, value);
        state.applied.push((axis, value));
        Ok(())
    }
}

struct OutstandingGuard<'a>(&'a AtomicUsize);

impl Drop for OutstandingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Actuator for SimulatedActuator {
    async fn connect(&self) -> Result<ConnectInfo, ActuatorError> {
        let mut state = self.state.lock().await;
        if let Some(reason) = &state.refuse_connect {
            return Err(ActuatorError::Unavailable(reason.clone()));
        }
        state.connected = true;
        state.released = false;
        tracing::info!(label = %self.label, "Simulated actuator connected");
        Ok(ConnectInfo {
            label: self.label.clone(),
        })
    }

    async fn get_range(&self) -> Result<Capabilities, ActuatorError> {
        let state = self.state.lock().await;
        if state.range_unavailable {
            return Err(ActuatorError::Unavailable("range not reported".to_string()));
        }
        Ok(self.capabilities)
    }

    async fn get_position(&self) -> Result<Position, ActuatorError> {
        Ok(self.state.lock().await.position)
    }

    async fn apply_target(&self, axis: Axis, value: f64) -> Result<(), ActuatorError> {
        let call = self.apply_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_outstanding.fetch_max(now, Ordering::SeqCst);
        let _outstanding = OutstandingGuard(&self.outstanding);

        self.apply_inner(call, axis, value).await
    }

    async fn release(&self) {
        let mut state = self.state.lock().await;
        state.connected = false;
        state.released = true;
        tracing::info!(label = %self.label, "Simulated actuator released");
    }
}
