//! PTZ Controller type definitions

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Actuator axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Pan,
    Tilt,
    Zoom,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Pan, Axis::Tilt, Axis::Zoom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pan => "pan",
            Self::Tilt => "tilt",
            Self::Zoom => "zoom",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Axis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pan" => Ok(Self::Pan),
            "tilt" => Ok(Self::Tilt),
            "zoom" => Ok(Self::Zoom),
            other => Err(Error::InvalidAxis(other.to_string())),
        }
    }
}

/// Physical range of one axis, immutable once discovered
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp a value into `[min, max]`
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

/// Per-axis ranges reported by the actuator. A missing axis is unsupported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan: Option<AxisRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tilt: Option<AxisRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<AxisRange>,
}

impl Capabilities {
    pub fn get(&self, axis: Axis) -> Option<AxisRange> {
        match axis {
            Axis::Pan => self.pan,
            Axis::Tilt => self.tilt,
            Axis::Zoom => self.zoom,
        }
    }

    pub fn supports(&self, axis: Axis) -> bool {
        self.get(axis).is_some()
    }

    pub fn with(mut self, axis: Axis, range: AxisRange) -> Self {
        match axis {
            Axis::Pan => self.pan = Some(range),
            Axis::Tilt => self.tilt = Some(range),
            Axis::Zoom => self.zoom = Some(range),
        }
        self
    }
}

/// Last committed actuator position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub pan: f64,
    pub tilt: f64,
    pub zoom: f64,
}

impl Position {
    pub fn new(pan: f64, tilt: f64, zoom: f64) -> Self {
        Self { pan, tilt, zoom }
    }

    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Pan => self.pan,
            Axis::Tilt => self.tilt,
            Axis::Zoom => self.zoom,
        }
    }

    pub fn set(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::Pan => self.pan = value,
            Axis::Tilt => self.tilt = value,
            Axis::Zoom => self.zoom = value,
        }
    }
}

/// Direction/magnitude requested while a gesture is held.
/// "No intent" is represented as `Option::<MoveIntent>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveIntent {
    pub axis: Axis,
    pub increment: f64,
}

impl MoveIntent {
    pub fn new(axis: Axis, increment: f64) -> Self {
        Self { axis, increment }
    }
}

/// UI press direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PtzDirection {
    Up,
    Down,
    Left,
    Right,
    ZoomIn,
    ZoomOut,
}

impl PtzDirection {
    /// Map a UI direction through the camera mount rotation.
    /// e.g. rotation=180: up→down, left→right. Zoom is unaffected.
    pub fn apply_rotation(&self, rotation: i32) -> Self {
        let normalized = ((rotation % 360) + 360) % 360;
        match (normalized, self) {
            (_, Self::ZoomIn | Self::ZoomOut) => *self,
            (90, Self::Up) => Self::Right,
            (90, Self::Right) => Self::Down,
            (90, Self::Down) => Self::Left,
            (90, Self::Left) => Self::Up,
            (180, Self::Up) => Self::Down,
            (180, Self::Down) => Self::Up,
            (180, Self::Left) => Self::Right,
            (180, Self::Right) => Self::Left,
            (270, Self::Up) => Self::Left,
            (270, Self::Left) => Self::Down,
            (270, Self::Down) => Self::Right,
            (270, Self::Right) => Self::Up,
            _ => *self,
        }
    }

    /// Axis and sign (+1 / -1) this direction drives
    pub fn axis_sign(&self) -> (Axis, f64) {
        match self {
            Self::Up => (Axis::Tilt, 1.0),
            Self::Down => (Axis::Tilt, -1.0),
            Self::Left => (Axis::Pan, -1.0),
            Self::Right => (Axis::Pan, 1.0),
            Self::ZoomIn => (Axis::Zoom, 1.0),
            Self::ZoomOut => (Axis::Zoom, -1.0),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Up => "↑",
            Self::Down => "↓",
            Self::Left => "←",
            Self::Right => "→",
            Self::ZoomIn => "+",
            Self::ZoomOut => "-",
        }
    }
}

/// Controller tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Fraction of an axis range moved per base tick
    #[serde(default = "default_step_fraction")]
    pub step_fraction: f64,
    /// Speed boost once a direction is confirmed held
    #[serde(default = "default_ramp_multiplier")]
    pub ramp_multiplier: f64,
    /// Upper bound for one apply round-trip
    #[serde(default = "default_apply_timeout_ms")]
    pub apply_timeout_ms: u64,
    /// Camera mount rotation in degrees (0/90/180/270)
    #[serde(default)]
    pub rotation: i32,
}

fn default_step_fraction() -> f64 {
    0.03
}

fn default_ramp_multiplier() -> f64 {
    7.0
}

fn default_apply_timeout_ms() -> u64 {
    10_000
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            step_fraction: default_step_fraction(),
            ramp_multiplier: default_ramp_multiplier(),
            apply_timeout_ms: default_apply_timeout_ms(),
            rotation: 0,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.step_fraction > 0.0 && self.step_fraction <= 1.0) {
            return Err(Error::Config(format!(
                "step_fraction must be in (0, 1], got {}",
                self.step_fraction
            )));
        }
        if !(self.ramp_multiplier >= 1.0 && self.ramp_multiplier.is_finite()) {
            return Err(Error::Config(format!(
                "ramp_multiplier must be >= 1, got {}",
                self.ramp_multiplier
            )));
        }
        if self.apply_timeout_ms == 0 {
            return Err(Error::Config("apply_timeout_ms must be > 0".to_string()));
        }
        if self.rotation % 90 != 0 {
            return Err(Error::Config(format!(
                "rotation must be a multiple of 90, got {}",
                self.rotation
            )));
        }
        Ok(())
    }
}

/// Continuous move loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopPhase {
    Idle,
    Starting,
    Running,
    /// Held only by the loop itself while it winds down. The shared phase
    /// moves Running→Idle under its lock and never shows this value.
    Stopping,
    /// Exclusive reset in progress; presses are rejected
    Resetting,
}

impl LoopPhase {
    pub fn is_moving(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

/// Actuator connection state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Failed(String),
}

/// Returned by a successful `Actuator::connect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectInfo {
    pub label: String,
}

/// Result of a press event
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PressOutcome {
    /// A new loop was spawned
    Started { intent: MoveIntent },
    /// A loop is already active; only the intent was overwritten
    Retargeted { intent: MoveIntent },
    /// Axis is unsupported or capabilities are unknown
    Ignored { axis: Axis },
}

/// Controller status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct PtzStatus {
    pub connection: ConnectionState,
    pub label: Option<String>,
    pub capabilities: Option<Capabilities>,
    /// Axes the UI may offer controls for
    pub routable_axes: Vec<Axis>,
    pub position: Position,
    pub phase: LoopPhase,
    pub holding: bool,
    pub intent: Option<MoveIntent>,
    pub in_flight: bool,
    pub last_warning: Option<String>,
    pub loop_starts: u64,
}

/// Controller events broadcast to the UI surface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ControllerEvent {
    Connected { label: String },
    ConnectionFailed { message: String },
    GestureStarted { intent: MoveIntent },
    GestureStopped,
    PositionChanged(Position),
    GestureFailed { message: String },
    ResetDone(Position),
    Disconnected,
}
