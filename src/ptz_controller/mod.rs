//! PTZ Controller Module
//!
//! Hold-to-move control of a pan-tilt-zoom head: range discovery, clamped
//! targets, single-flight actuation and the continuous move loop.

pub mod actuator;
pub mod clamp;
pub mod gesture;
pub mod move_loop;
pub mod onvif_ptz;
pub mod range;
pub mod service;
pub mod simulated;
pub mod single_flight;
pub mod types;

pub use actuator::{Actuator, ActuatorError};
pub use clamp::{clamp, ClampResult, NoOpReason};
pub use gesture::GestureRouter;
pub use move_loop::{
    ContinuousMoveLoop, ControlState, LoopExit, LoopStep, TickOutcome, TickReport,
};
pub use onvif_ptz::OnvifActuator;
pub use range::{compute_step_increment, RangeModel};
pub use service::PtzController;
pub use simulated::SimulatedActuator;
pub use single_flight::{InFlightLease, SingleFlightActuator, SubmitError};
pub use types::*;
