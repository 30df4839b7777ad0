//! PTZ Hold Controller Library
//!
//! Steers a pan-tilt-zoom actuator while the operator holds a direction.
//!
//! ## Architecture
//!
//! 1. RangeModel - per-axis step from the discovered range
//! 2. PositionState - last committed pan/tilt/zoom
//! 3. ConstraintClamper - next legal target or no-op
//! 4. SingleFlightActuator - one apply in flight, overlapping submits are Busy
//! 5. ContinuousMoveLoop - ramped, retargetable hold loop
//! 6. GestureRouter - press/release to move intents
//! 7. WebAPI - HTTP surface standing in for the UI buttons
//!
//! ## Design Principles
//!
//! - Clamp before every actuation, against the tracked position
//! - Backpressure through the single-flight guard, not timers
//! - Cooperative cancellation at iteration boundaries

pub mod error;
pub mod ptz_controller;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
