//! GestureRouter - press/release events to move intents
//!
//! Repeated presses while a loop is active only overwrite the intent
//! (last-write-wins); that is how a direction change mid-hold works. A loop is
//! spawned only on the Idle→Starting transition.

use super::move_loop::{ContinuousMoveLoop, ControlState, LoopExit};
use super::range::RangeModel;
use super::single_flight::SingleFlightActuator;
use super::types::{
    ControllerConfig, ControllerEvent, LoopPhase, MoveIntent, PressOutcome, PtzDirection,
};
use crate::error::{Error, Result};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub struct GestureRouter {
    state: Arc<ControlState>,
    actuator: Arc<SingleFlightActuator>,
    config: ControllerConfig,
    task: Mutex<Option<JoinHandle<LoopExit>>>,
}

impl GestureRouter {
    pub fn new(
        state: Arc<ControlState>,
        actuator: Arc<SingleFlightActuator>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            state,
            actuator,
            config,
            task: Mutex::new(None),
        }
    }

    /// Press on a UI direction. The increment is one RangeModel step for the
    /// (rotation-adjusted) axis; unsupported axes are ignored.
    pub async fn on_press_start(&self, direction: PtzDirection) -> Result<PressOutcome> {
        let actual = direction.apply_rotation(self.config.rotation);
        let (axis, sign) = actual.axis_sign();

        let step = match *self.state.capabilities.read().await {
            Some(capabilities) => {
                RangeModel::new(capabilities, self.config.step_fraction).step(axis)
            }
            None => 0.0,
        };
        if step == 0.0 {
            tracing::debug!(
                direction = ?direction,
                axis = %axis,
                "Press ignored - axis not routable"
            );
            return Ok(PressOutcome::Ignored { axis });
        }

        tracing::debug!(
            direction = %direction.symbol(),
            actual = %actual.symbol(),
            axis = %axis,
            step,
            "PTZ press"
        );
        self.on_press(MoveIntent::new(axis, sign * step)).await
    }

    /// Press with an explicit intent
    pub async fn on_press(&self, intent: MoveIntent) -> Result<PressOutcome> {
        if !intent.increment.is_finite() {
            return Err(Error::Validation(format!(
                "increment must be finite, got {}",
                intent.increment
            )));
        }

        let mut phase = self.state.phase.lock().await;
        if !self.state.accepting.load(Ordering::SeqCst) {
            return Err(Error::Connection("actuator not connected".to_string()));
        }
        if *phase == LoopPhase::Resetting {
            return Err(Error::Busy("reset in progress".to_string()));
        }

        *self.state.intent.write().await = Some(intent);
        self.state.held.store(true, Ordering::SeqCst);

        if *phase != LoopPhase::Idle {
            self.state.wake_loop();
            tracing::debug!(axis = %intent.axis, increment = intent.increment, "PTZ intent retargeted");
            return Ok(PressOutcome::Retargeted { intent });
        }

        *phase = LoopPhase::Starting;
        self.state.loop_starts.fetch_add(1, Ordering::SeqCst);
        tracing::info!(axis = %intent.axis, increment = intent.increment, "PTZ gesture started");
        self.state.emit(ControllerEvent::GestureStarted { intent });

        let move_loop = ContinuousMoveLoop::new(
            self.state.clone(),
            self.actuator.clone(),
            intent,
            self.config.ramp_multiplier,
        );
        let handle = tokio::spawn(move_loop.run());
        *self.task.lock().await = Some(handle);

        Ok(PressOutcome::Started { intent })
    }

    /// Release: the loop stops at the top of its next iteration
    pub async fn on_press_end(&self) {
        let _phase = self.state.phase.lock().await;
        self.state.held.store(false, Ordering::SeqCst);
        *self.state.intent.write().await = None;
        self.state.wake_loop();
    }

    /// Stop accepting presses and release the hold in one step, so a press
    /// racing with teardown cannot re-arm the loop.
    pub async fn close(&self) {
        let _phase = self.state.phase.lock().await;
        self.state.accepting.store(false, Ordering::SeqCst);
        self.state.held.store(false, Ordering::SeqCst);
        *self.state.intent.write().await = None;
        self.state.wake_loop();
    }

    pub async fn open(&self) {
        let _phase = self.state.phase.lock().await;
        self.state.accepting.store(true, Ordering::SeqCst);
    }

    /// Wait for the current loop task (if any) to finish
    pub async fn wait_idle(&self) -> Option<LoopExit> {
        let handle = self.task.lock().await.take()?;
        match handle.await {
            Ok(exit) => Some(exit),
            Err(e) => {
                tracing::error!(error = %e, "PTZ move loop task failed");
                None
            }
        }
    }
}
