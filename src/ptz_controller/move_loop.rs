//! ContinuousMoveLoop - hold-to-move state machine
//!
//! One loop instance per gesture, spawned by the `GestureRouter` on the
//! Idle→Starting transition. Each iteration re-reads the current intent, so a
//! direction change takes effect on the very next tick. Release is cooperative:
//! the hold flag is polled at the top of an iteration, and an apply already in
//! flight is allowed to complete.
//!
//! There is no timer between iterations. The retry rate on `Busy` is bounded
//! by the single-flight guard (i.e. by actuator latency); the loop only yields
//! to the scheduler between ticks. A no-op tick issues no actuator call, so
//! the loop parks until the intent, the hold or the capabilities change.

use super::actuator::ActuatorError;
use super::clamp::{clamp, ClampResult, NoOpReason};
use super::single_flight::{SingleFlightActuator, SubmitError};
use super::types::{Capabilities, ControllerEvent, LoopPhase, MoveIntent, Position};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, Notify, RwLock};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// State shared between the router, the running loop and the service.
/// Position is written only by the loop that owns the current gesture (or by
/// reset, which runs exclusively).
pub struct ControlState {
    pub(crate) capabilities: RwLock<Option<Capabilities>>,
    pub(crate) position: RwLock<Position>,
    pub(crate) intent: RwLock<Option<MoveIntent>>,
    pub(crate) held: AtomicBool,
    pub(crate) phase: Mutex<LoopPhase>,
    pub(crate) loop_starts: AtomicU64,
    pub(crate) last_warning: RwLock<Option<String>>,
    /// Presses are accepted only while connected; flipped under the phase lock
    pub(crate) accepting: AtomicBool,
    wake: Notify,
    events: broadcast::Sender<ControllerEvent>,
}

impl ControlState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            capabilities: RwLock::new(None),
            position: RwLock::new(Position::default()),
            intent: RwLock::new(None),
            held: AtomicBool::new(false),
            phase: Mutex::new(LoopPhase::Idle),
            loop_starts: AtomicU64::new(0),
            last_warning: RwLock::new(None),
            accepting: AtomicBool::new(false),
            wake: Notify::new(),
            events,
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// Wake a loop parked on a no-op tick. The permit is kept if nobody waits yet.
    pub fn wake_loop(&self) {
        self.wake.notify_one();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Broadcast to subscribers; no subscribers is not an error
    pub fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one actuation attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Applied(f64),
    NoOp(NoOpReason),
    Busy,
}

/// What one loop iteration did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub iteration: u64,
    pub intent: MoveIntent,
    pub multiplier: f64,
    /// Clamped destination, `None` when the clamp was a no-op
    pub target: Option<f64>,
    pub outcome: TickOutcome,
}

/// Why a loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    /// Hold released (or controller teardown)
    Released,
    /// Hard actuator error; the gesture is aborted
    Failed(ActuatorError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopStep {
    Tick(TickReport),
    Finished(LoopExit),
}

/// Hold-to-move loop
pub struct ContinuousMoveLoop {
    state: Arc<ControlState>,
    actuator: Arc<SingleFlightActuator>,
    ramp_multiplier: f64,
    phase: LoopPhase,
    current: MoveIntent,
    multiplier: f64,
    reset_pending: bool,
    iteration: u64,
}

impl ContinuousMoveLoop {
    /// Create a loop in `Starting`. The caller has already claimed the
    /// shared phase (Idle→Starting).
    pub fn new(
        state: Arc<ControlState>,
        actuator: Arc<SingleFlightActuator>,
        intent: MoveIntent,
        ramp_multiplier: f64,
    ) -> Self {
        Self {
            state,
            actuator,
            ramp_multiplier,
            phase: LoopPhase::Starting,
            current: intent,
            multiplier: 1.0,
            reset_pending: false,
            iteration: 0,
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// Drive the loop until release or a hard error
    pub async fn run(mut self) -> LoopExit {
        loop {
            match self.step().await {
                LoopStep::Finished(exit) => return exit,
                LoopStep::Tick(report) => self.pace(&report).await,
            }
        }
    }

    async fn pace(&self, report: &TickReport) {
        match report.outcome {
            TickOutcome::NoOp(_) => self.state.wake.notified().await,
            TickOutcome::Applied(_) | TickOutcome::Busy => tokio::task::yield_now().await,
        }
    }

    /// Execute one state-machine transition
    pub async fn step(&mut self) -> LoopStep {
        match self.phase {
            LoopPhase::Starting => self.first_attempt().await,
            LoopPhase::Running => self.iterate().await,
            _ => LoopStep::Finished(LoopExit::Released),
        }
    }

    async fn first_attempt(&mut self) -> LoopStep {
        match self.attempt(1.0).await {
            Ok(report) => {
                // Even a NoOp/Busy first attempt enters Running so the hold can retry
                *self.state.phase.lock().await = LoopPhase::Running;
                self.phase = LoopPhase::Running;
                self.multiplier = self.ramp_multiplier;
                LoopStep::Tick(report)
            }
            Err(e) => self.finish(LoopExit::Failed(e)).await,
        }
    }

    async fn iterate(&mut self) -> LoopStep {
        {
            let mut phase = self.state.phase.lock().await;
            let intent = *self.state.intent.read().await;
            match intent {
                Some(intent) if self.state.is_held() => {
                    if intent != self.current {
                        tracing::debug!(
                            from_axis = %self.current.axis,
                            to_axis = %intent.axis,
                            increment = intent.increment,
                            "Move intent changed, multiplier reset"
                        );
                        self.current = intent;
                        self.multiplier = 1.0;
                        self.reset_pending = true;
                    }
                }
                _ => {
                    // Transition under the phase lock so a concurrent press either
                    // sees Running (and we see its hold) or sees Idle and spawns anew
                    self.phase = LoopPhase::Stopping;
                    *phase = LoopPhase::Idle;
                    self.phase = LoopPhase::Idle;
                    self.state.emit(ControllerEvent::GestureStopped);
                    drop(phase);
                    tracing::info!(iterations = self.iteration, "PTZ gesture released");
                    return LoopStep::Finished(LoopExit::Released);
                }
            }
        }

        match self.attempt(self.multiplier).await {
            Ok(report) => {
                if self.reset_pending {
                    self.multiplier = self.ramp_multiplier;
                    self.reset_pending = false;
                }
                LoopStep::Tick(report)
            }
            Err(e) => self.finish(LoopExit::Failed(e)).await,
        }
    }

    /// Clamp, submit and commit one actuation
    async fn attempt(&mut self, multiplier: f64) -> Result<TickReport, ActuatorError> {
        self.iteration += 1;
        let intent = self.current;
        let delta = intent.increment * multiplier;

        let capabilities = *self.state.capabilities.read().await;
        let position = *self.state.position.read().await;

        let (target, outcome) = match clamp(intent.axis, &position, delta, capabilities.as_ref())
        {
            ClampResult::NoOp(reason) => {
                tracing::trace!(axis = %intent.axis, reason = ?reason, "PTZ tick no-op");
                (None, TickOutcome::NoOp(reason))
            }
            ClampResult::Target(value) => match self.actuator.submit(intent.axis, value).await {
                Ok(applied) => {
                    let committed = {
                        let mut position = self.state.position.write().await;
                        position.set(intent.axis, applied);
                        *position
                    };
                    tracing::debug!(axis = %intent.axis, value = applied, "PTZ position committed");
                    self.state.emit(ControllerEvent::PositionChanged(committed));
                    (Some(value), TickOutcome::Applied(applied))
                }
                Err(SubmitError::Busy) => (Some(value), TickOutcome::Busy),
                Err(SubmitError::Actuator(e)) => return Err(e),
            },
        };

        Ok(TickReport {
            iteration: self.iteration,
            intent,
            multiplier,
            target,
            outcome,
        })
    }

    async fn finish(&mut self, exit: LoopExit) -> LoopStep {
        {
            let mut phase = self.state.phase.lock().await;
            self.phase = LoopPhase::Stopping;
            if let LoopExit::Failed(e) = &exit {
                // Abort the gesture; a fresh press starts over from Starting
                self.state.held.store(false, Ordering::SeqCst);
                *self.state.intent.write().await = None;
                *self.state.last_warning.write().await = Some(e.to_string());
                self.state.emit(ControllerEvent::GestureFailed {
                    message: e.to_string(),
                });
            }
            *phase = LoopPhase::Idle;
            self.phase = LoopPhase::Idle;
        }

        if let LoopExit::Failed(e) = &exit {
            tracing::warn!(
                axis = %self.current.axis,
                iterations = self.iteration,
                error = %e,
                "PTZ gesture aborted by actuator error"
            );
        }
        LoopStep::Finished(exit)
    }
}
