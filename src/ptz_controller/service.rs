//! PTZ Controller Service
//!
//! Owns one actuator connection: capability discovery, the gesture router,
//! exclusive reset, teardown and status.

use super::actuator::Actuator;
use super::clamp::{clamp_to, ClampResult};
use super::gesture::GestureRouter;
use super::move_loop::{ControlState, LoopExit};
use super::range::RangeModel;
use super::single_flight::{SingleFlightActuator, SubmitError};
use super::types::*;
use crate::error::{Error, Result};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};

/// PTZ controller service
pub struct PtzController {
    actuator: Arc<SingleFlightActuator>,
    state: Arc<ControlState>,
    router: GestureRouter,
    step_fraction: f64,
    connection: RwLock<ConnectionState>,
    label: RwLock<Option<String>>,
    /// Serializes connect, reset and disconnect
    lifecycle: Mutex<()>,
}

impl PtzController {
    /// Create a disconnected controller
    pub fn new(actuator: Arc<dyn Actuator>, config: ControllerConfig) -> Result<Self> {
        config.validate()?;

        let actuator = Arc::new(SingleFlightActuator::new(
            actuator,
            Duration::from_millis(config.apply_timeout_ms),
        ));
        let state = Arc::new(ControlState::new());
        let step_fraction = config.step_fraction;
        let router = GestureRouter::new(state.clone(), actuator.clone(), config);

        Ok(Self {
            actuator,
            state,
            router,
            step_fraction,
            connection: RwLock::new(ConnectionState::Disconnected),
            label: RwLock::new(None),
            lifecycle: Mutex::new(()),
        })
    }

    /// Connect (or reconnect) to the actuator and discover its range/position.
    /// Failure is fatal for movement until a later connect succeeds.
    pub async fn connect(&self) -> Result<ConnectInfo> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.state.phase.lock().await.is_moving() {
            return Err(Error::Busy("movement in progress".to_string()));
        }

        let info = match self.actuator.actuator().connect().await {
            Ok(info) => info,
            Err(e) => {
                let message = e.to_string();
                tracing::error!(error = %message, "PTZ actuator connection failed");
                self.router.close().await;
                *self.connection.write().await = ConnectionState::Failed(message.clone());
                self.state.emit(ControllerEvent::ConnectionFailed {
                    message: message.clone(),
                });
                return Err(Error::Connection(message));
            }
        };

        self.discover_capabilities().await;

        let position = match self.actuator.actuator().get_position().await {
            Ok(position) => position,
            Err(e) => {
                tracing::warn!(error = %e, "PTZ position unavailable, assuming origin");
                Position::default()
            }
        };
        *self.state.position.write().await = position;
        *self.state.last_warning.write().await = None;
        *self.label.write().await = Some(info.label.clone());
        *self.connection.write().await = ConnectionState::Connected;
        self.router.open().await;

        tracing::info!(
            label = %info.label,
            pan = position.pan,
            tilt = position.tilt,
            zoom = position.zoom,
            "PTZ actuator connected"
        );
        self.state.emit(ControllerEvent::Connected {
            label: info.label.clone(),
        });

        Ok(info)
    }

    /// Retry range discovery when it was unavailable at connect time
    pub async fn refresh_capabilities(&self) -> Result<Option<Capabilities>> {
        self.ensure_connected().await?;
        Ok(self.discover_capabilities().await)
    }

    async fn discover_capabilities(&self) -> Option<Capabilities> {
        let capabilities = match self.actuator.actuator().get_range().await {
            Ok(capabilities) => {
                tracing::info!(capabilities = ?capabilities, "PTZ capabilities discovered");
                Some(capabilities)
            }
            Err(e) => {
                // Not an operator-facing error: every tick is a NoOp until resolved
                tracing::warn!(error = %e, "PTZ capabilities unavailable");
                None
            }
        };
        *self.state.capabilities.write().await = capabilities;
        // A loop parked on CapabilitiesUnavailable re-evaluates
        self.state.wake_loop();
        capabilities
    }

    /// Press on a UI direction
    pub async fn press(&self, direction: PtzDirection) -> Result<PressOutcome> {
        self.ensure_connected().await?;
        self.router.on_press_start(direction).await
    }

    /// Press with an explicit axis/increment
    pub async fn press_intent(&self, intent: MoveIntent) -> Result<PressOutcome> {
        self.ensure_connected().await?;
        self.router.on_press(intent).await
    }

    /// Release the held gesture
    pub async fn release(&self) {
        self.router.on_press_end().await;
    }

    /// Move pan, tilt and zoom to 0 (clamped), one after another.
    /// Exclusive: rejected with `Busy` unless the loop is Idle.
    pub async fn reset(&self) -> Result<Position> {
        let _lifecycle = self.lifecycle.lock().await;
        self.ensure_connected().await?;

        {
            let mut phase = self.state.phase.lock().await;
            if *phase != LoopPhase::Idle {
                return Err(Error::Busy(format!("cannot reset while {:?}", *phase)));
            }
            *phase = LoopPhase::Resetting;
        }

        let result = self.run_reset().await;
        *self.state.phase.lock().await = LoopPhase::Idle;

        match &result {
            Ok(position) => {
                tracing::info!(
                    pan = position.pan,
                    tilt = position.tilt,
                    zoom = position.zoom,
                    "PTZ reset to initial position"
                );
                self.state.emit(ControllerEvent::ResetDone(*position));
            }
            Err(e) => tracing::warn!(error = %e, "PTZ reset failed"),
        }
        result
    }

    async fn run_reset(&self) -> Result<Position> {
        let capabilities = *self.state.capabilities.read().await;

        for axis in Axis::ALL {
            let position = *self.state.position.read().await;
            let ClampResult::Target(value) = clamp_to(axis, &position, 0.0, capabilities.as_ref())
            else {
                continue;
            };

            match self.actuator.submit(axis, value).await {
                Ok(applied) => {
                    let committed = {
                        let mut position = self.state.position.write().await;
                        position.set(axis, applied);
                        *position
                    };
                    self.state.emit(ControllerEvent::PositionChanged(committed));
                }
                Err(SubmitError::Busy) => {
                    return Err(Error::Busy("actuator busy".to_string()));
                }
                Err(SubmitError::Actuator(e)) => {
                    *self.state.last_warning.write().await = Some(e.to_string());
                    return Err(e.into());
                }
            }
        }

        Ok(*self.state.position.read().await)
    }

    /// Teardown: stop the loop cooperatively, wait for the in-flight
    /// iteration, release the actuator track, forget capabilities.
    /// Waits for a reset in progress; presses are refused from the start.
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.router.close().await;
        *self.connection.write().await = ConnectionState::Disconnected;
        if let Some(exit) = self.router.wait_idle().await {
            tracing::debug!(exit = ?exit, "PTZ move loop halted for teardown");
        }

        self.actuator.actuator().release().await;
        *self.state.capabilities.write().await = None;
        *self.label.write().await = None;

        tracing::info!("PTZ actuator released");
        self.state.emit(ControllerEvent::Disconnected);
    }

    /// Wait until the current gesture loop (if any) has ended
    pub async fn wait_idle(&self) -> Option<LoopExit> {
        self.router.wait_idle().await
    }

    pub async fn status(&self) -> PtzStatus {
        let capabilities = *self.state.capabilities.read().await;
        let routable_axes = capabilities
            .map(|c| RangeModel::new(c, self.step_fraction).routable_axes())
            .unwrap_or_default();

        PtzStatus {
            connection: self.connection.read().await.clone(),
            label: self.label.read().await.clone(),
            capabilities,
            routable_axes,
            position: *self.state.position.read().await,
            phase: *self.state.phase.lock().await,
            holding: self.state.is_held(),
            intent: *self.state.intent.read().await,
            in_flight: self.actuator.is_in_flight(),
            last_warning: self.state.last_warning.read().await.clone(),
            loop_starts: self.state.loop_starts.load(Ordering::SeqCst),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.state.subscribe()
    }

    async fn ensure_connected(&self) -> Result<()> {
        match &*self.connection.read().await {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Failed(message) => Err(Error::Connection(message.clone())),
            ConnectionState::Disconnected => {
                Err(Error::Connection("actuator not connected".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ptz_controller::simulated::SimulatedActuator;

    fn caps() -> Capabilities {
        Capabilities::default()
            .with(Axis::Pan, AxisRange::new(-200.0, 200.0))
            .with(Axis::Tilt, AxisRange::new(-150.0, 150.0))
            .with(Axis::Zoom, AxisRange::new(100.0, 400.0))
    }

    fn sim(latency_ms: u64, position: Position) -> Arc<SimulatedActuator> {
        Arc::new(
            SimulatedActuator::new(caps(), position)
                .with_latency(Duration::from_millis(latency_ms)),
        )
    }

    async fn connected(sim: &Arc<SimulatedActuator>) -> PtzController {
        let controller = PtzController::new(sim.clone(), ControllerConfig::default()).unwrap();
        controller.connect().await.unwrap();
        controller
    }

    #[tokio::test]
    async fn test_connect_discovers_range_and_position() {
        let sim = sim(0, Position::new(10.0, -5.0, 150.0));
        let controller = connected(&sim).await;
        let status = controller.status().await;
        assert_eq!(status.connection, ConnectionState::Connected);
        assert_eq!(status.capabilities, Some(caps()));
        assert_eq!(status.position, Position::new(10.0, -5.0, 150.0));
        assert_eq!(status.phase, LoopPhase::Idle);
        assert_eq!(status.label.as_deref(), Some("Simulated PTZ"));
        assert_eq!(status.routable_axes, vec![Axis::Pan, Axis::Tilt, Axis::Zoom]);
    }

    #[tokio::test]
    async fn test_connection_error_disables_movement_until_reconnect() {
        let sim = sim(0, Position::default());
        sim.refuse_connect("permission denied").await;
        let controller = PtzController::new(sim.clone(), ControllerConfig::default()).unwrap();

        assert!(matches!(controller.connect().await, Err(Error::Connection(_))));
        assert!(matches!(
            controller.status().await.connection,
            ConnectionState::Failed(_)
        ));
        assert!(matches!(
            controller.press(PtzDirection::Right).await,
            Err(Error::Connection(_))
        ));
        assert!(matches!(controller.reset().await, Err(Error::Connection(_))));
        assert_eq!(sim.apply_calls(), 0);

        sim.allow_connect().await;
        controller.connect().await.unwrap();
        assert!(controller.press(PtzDirection::Right).await.is_ok());
        controller.release().await;
        controller.wait_idle().await;
    }

    #[tokio::test]
    async fn test_capabilities_unavailable_means_noop() {
        let sim = sim(0, Position::default());
        sim.hide_range(true).await;
        let controller = connected(&sim).await;
        assert_eq!(controller.status().await.capabilities, None);

        // Direction presses are not routable without a range
        assert_eq!(
            controller.press(PtzDirection::Right).await.unwrap(),
            PressOutcome::Ignored { axis: Axis::Pan }
        );
        // Explicit intents run but every tick is a NoOp
        controller.press_intent(MoveIntent::new(Axis::Pan, 6.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.release().await;
        controller.wait_idle().await;
        assert_eq!(sim.apply_calls(), 0);

        sim.hide_range(false).await;
        assert_eq!(controller.refresh_capabilities().await.unwrap(), Some(caps()));
    }

    #[tokio::test]
    async fn test_reset_while_running_rejected() {
        let sim = sim(5, Position::new(0.0, 0.0, 100.0));
        let controller = connected(&sim).await;
        controller.press_intent(MoveIntent::new(Axis::Pan, 6.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;

        let calls_before = sim.apply_calls();
        assert!(matches!(controller.reset().await, Err(Error::Busy(_))));

        controller.release().await;
        controller.wait_idle().await;
        assert!(sim.apply_calls() >= calls_before);
        assert!(sim.applied().await.iter().all(|(axis, _)| *axis == Axis::Pan));
        assert_eq!(sim.max_outstanding(), 1);
    }

    #[tokio::test]
    async fn test_reset_when_idle_moves_to_clamped_origin() {
        let sim = sim(0, Position::new(50.0, -20.0, 300.0));
        let controller = connected(&sim).await;

        let position = controller.reset().await.unwrap();
        assert_eq!(position, Position::new(0.0, 0.0, 100.0));
        assert_eq!(
            sim.applied().await,
            vec![(Axis::Pan, 0.0), (Axis::Tilt, 0.0), (Axis::Zoom, 100.0)]
        );
        assert_eq!(controller.status().await.phase, LoopPhase::Idle);

        // Already there: all three clamps are no-ops
        controller.reset().await.unwrap();
        assert_eq!(sim.apply_calls(), 3);
    }

    #[tokio::test]
    async fn test_reset_error_restores_idle() {
        let sim = sim(0, Position::new(50.0, -20.0, 300.0));
        let controller = connected(&sim).await;
        sim.fail_call(2).await;

        assert!(matches!(controller.reset().await, Err(Error::Actuator(_))));
        let status = controller.status().await;
        assert_eq!(status.phase, LoopPhase::Idle);
        assert_eq!(status.position, Position::new(0.0, -20.0, 300.0));
        assert!(status.last_warning.is_some());
    }

    #[tokio::test]
    async fn test_actuator_error_ends_gesture_but_not_controller() {
        let sim = sim(1, Position::new(0.0, 0.0, 100.0));
        let controller = connected(&sim).await;
        let mut events = controller.subscribe();
        sim.fail_call(3).await;

        controller.press_intent(MoveIntent::new(Axis::Pan, 6.0)).await.unwrap();
        let exit = controller.wait_idle().await;
        assert!(matches!(exit, Some(LoopExit::Failed(_))));
        let status = controller.status().await;
        assert_eq!(status.phase, LoopPhase::Idle);
        assert_eq!(status.position.pan, 48.0);
        assert!(status.last_warning.is_some());
        assert!(!status.holding);

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, ControllerEvent::GestureFailed { .. }) {
                saw_failure = true;
            }
        }
        assert!(saw_failure);

        // A fresh press starts a new loop
        assert!(matches!(
            controller.press_intent(MoveIntent::new(Axis::Pan, 6.0)).await.unwrap(),
            PressOutcome::Started { .. }
        ));
        controller.release().await;
        controller.wait_idle().await;
        assert_eq!(controller.status().await.loop_starts, 2);
    }

    #[tokio::test]
    async fn test_single_flight_under_press_release_interleavings() {
        let sim = sim(1, Position::new(0.0, 0.0, 100.0));
        let controller = Arc::new(connected(&sim).await);
        let directions = [
            PtzDirection::Right,
            PtzDirection::Up,
            PtzDirection::Left,
            PtzDirection::ZoomIn,
            PtzDirection::Down,
            PtzDirection::ZoomOut,
        ];

        // Gesture start/stop events, in emission order
        let gestures = Arc::new(std::sync::Mutex::new(Vec::new()));
        let collector = {
            let gestures = gestures.clone();
            let mut events = controller.subscribe();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(ControllerEvent::GestureStarted { .. }) => {
                            gestures.lock().unwrap().push(true)
                        }
                        Ok(ControllerEvent::GestureStopped)
                        | Ok(ControllerEvent::GestureFailed { .. }) => {
                            gestures.lock().unwrap().push(false)
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            panic!("event collector lagged by {n}")
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        let mut started = 0u64;
        let mut press = |outcome: PressOutcome| {
            if matches!(outcome, PressOutcome::Started { .. }) {
                started += 1;
            }
        };
        for round in 0..30usize {
            let direction = directions[round % directions.len()];
            press(controller.press(direction).await.unwrap());
            if round % 3 == 0 {
                let next = directions[(round + 1) % directions.len()];
                press(controller.press(next).await.unwrap());
            }
            tokio::time::sleep(Duration::from_millis((round % 4) as u64)).await;
            if round % 2 == 0 {
                controller.release().await;
                if round % 4 == 0 {
                    let _ = controller.reset().await;
                }
            }
        }
        controller.release().await;
        controller.wait_idle().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!collector.is_finished());
        collector.abort();

        assert_eq!(sim.max_outstanding(), 1);
        let status = controller.status().await;
        assert!(started >= 1);
        assert_eq!(status.loop_starts, started);
        assert_eq!(status.phase, LoopPhase::Idle);
        assert!(!status.in_flight);

        // Every start follows a stop of the previous loop: no overlapping loops
        let gestures = gestures.lock().unwrap().clone();
        assert_eq!(gestures.iter().filter(|s| **s).count() as u64, started);
        let mut active = false;
        for is_start in gestures {
            assert_ne!(is_start, active, "loop start/stop out of order");
            active = is_start;
        }
        assert!(!active);
    }

    #[tokio::test]
    async fn test_press_during_disconnect_is_refused() {
        let sim = sim(60, Position::new(0.0, 0.0, 100.0));
        let controller = Arc::new(connected(&sim).await);
        controller.press(PtzDirection::Right).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let teardown = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.disconnect().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(matches!(
            controller.press(PtzDirection::Right).await,
            Err(Error::Connection(_))
        ));

        tokio::time::timeout(Duration::from_millis(500), teardown)
            .await
            .unwrap()
            .unwrap();
        let status = controller.status().await;
        assert_eq!(status.connection, ConnectionState::Disconnected);
        assert_eq!(status.phase, LoopPhase::Idle);
        assert!(!status.holding);
        assert!(sim.is_released().await);
    }

    #[tokio::test]
    async fn test_disconnect_waits_for_reset() {
        let sim = sim(30, Position::new(50.0, -20.0, 300.0));
        let controller = Arc::new(connected(&sim).await);

        let reset = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.reset().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(controller.status().await.phase, LoopPhase::Resetting);

        controller.disconnect().await;
        assert_eq!(
            reset.await.unwrap().unwrap(),
            Position::new(0.0, 0.0, 100.0)
        );
        assert_eq!(sim.apply_calls(), 3);
        assert_eq!(
            controller.status().await.connection,
            ConnectionState::Disconnected
        );
    }

    #[tokio::test]
    async fn test_disconnect_halts_loop_and_releases_track() {
        let sim = sim(2, Position::new(0.0, 0.0, 100.0));
        let controller = connected(&sim).await;
        controller.press(PtzDirection::Up).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        controller.disconnect().await;
        let calls = sim.apply_calls();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sim.apply_calls(), calls);
        assert!(sim.is_released().await);

        let status = controller.status().await;
        assert_eq!(status.connection, ConnectionState::Disconnected);
        assert_eq!(status.phase, LoopPhase::Idle);
        assert_eq!(status.capabilities, None);
        assert!(matches!(
            controller.press(PtzDirection::Up).await,
            Err(Error::Connection(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let sim = sim(0, Position::default());
        let config = ControllerConfig {
            ramp_multiplier: 0.0,
            ..Default::default()
        };
        assert!(matches!(PtzController::new(sim, config), Err(Error::Config(_))));
    }
}
