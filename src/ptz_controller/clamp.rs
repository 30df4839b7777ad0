//! ConstraintClamper
//!
//! Computes the next legal target for an axis. Runs before every actuation
//! attempt and compares against the tracked position, so a held button at a
//! limit stops issuing commands instead of spinning on the actuator.

use super::types::{Axis, Capabilities, Position};
use serde::Serialize;

/// Why a clamp produced no command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    /// Capabilities not discovered yet
    CapabilitiesUnavailable,
    /// Actuator reports no range for this axis
    AxisUnsupported,
    /// Clamped value equals the current position (limit reached or zero delta)
    Unchanged,
}

/// Result of a clamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClampResult {
    Target(f64),
    NoOp(NoOpReason),
}

/// `current[axis] + delta` clamped to the axis range, or `NoOp`
pub fn clamp(
    axis: Axis,
    current: &Position,
    delta: f64,
    capabilities: Option<&Capabilities>,
) -> ClampResult {
    resolve(axis, current, current.get(axis) + delta, capabilities)
}

/// Clamp toward an absolute destination (used by reset)
pub fn clamp_to(
    axis: Axis,
    current: &Position,
    destination: f64,
    capabilities: Option<&Capabilities>,
) -> ClampResult {
    resolve(axis, current, destination, capabilities)
}

fn resolve(
    axis: Axis,
    current: &Position,
    requested: f64,
    capabilities: Option<&Capabilities>,
) -> ClampResult {
    let Some(capabilities) = capabilities else {
        return ClampResult::NoOp(NoOpReason::CapabilitiesUnavailable);
    };
    let Some(range) = capabilities.get(axis) else {
        return ClampResult::NoOp(NoOpReason::AxisUnsupported);
    };
    if !requested.is_finite() {
        return ClampResult::NoOp(NoOpReason::Unchanged);
    }

    let value = range.clamp(requested);
    if value == current.get(axis) {
        ClampResult::NoOp(NoOpReason::Unchanged)
    } else {
        ClampResult::Target(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ptz_controller::types::AxisRange;

    fn caps() -> Capabilities {
        Capabilities::default()
            .with(Axis::Pan, AxisRange::new(-200.0, 200.0))
            .with(Axis::Tilt, AxisRange::new(-150.0, 150.0))
            .with(Axis::Zoom, AxisRange::new(100.0, 400.0))
    }

    #[test]
    fn test_target_within_range() {
        let pos = Position::new(0.0, 0.0, 100.0);
        assert_eq!(clamp(Axis::Pan, &pos, 6.0, Some(&caps())), ClampResult::Target(6.0));
    }

    #[test]
    fn test_clamped_to_max() {
        let pos = Position::new(174.0, 0.0, 100.0);
        assert_eq!(clamp(Axis::Pan, &pos, 42.0, Some(&caps())), ClampResult::Target(200.0));
    }

    #[test]
    fn test_at_limit_is_noop() {
        let pos = Position::new(200.0, 0.0, 100.0);
        assert_eq!(
            clamp(Axis::Pan, &pos, 42.0, Some(&caps())),
            ClampResult::NoOp(NoOpReason::Unchanged)
        );
        assert_eq!(
            clamp(Axis::Zoom, &pos, -10.0, Some(&caps())),
            ClampResult::NoOp(NoOpReason::Unchanged)
        );
    }

    #[test]
    fn test_zero_delta_is_noop() {
        let pos = Position::new(10.0, 0.0, 100.0);
        assert_eq!(
            clamp(Axis::Pan, &pos, 0.0, Some(&caps())),
            ClampResult::NoOp(NoOpReason::Unchanged)
        );
    }

    #[test]
    fn test_unknown_capabilities_is_noop() {
        let pos = Position::default();
        assert_eq!(
            clamp(Axis::Pan, &pos, 6.0, None),
            ClampResult::NoOp(NoOpReason::CapabilitiesUnavailable)
        );
        let pan_only = Capabilities::default().with(Axis::Pan, AxisRange::new(-1.0, 1.0));
        assert_eq!(
            clamp(Axis::Zoom, &pos, 0.5, Some(&pan_only)),
            ClampResult::NoOp(NoOpReason::AxisUnsupported)
        );
    }

    #[test]
    fn test_non_finite_delta_is_noop() {
        let pos = Position::default();
        assert!(matches!(
            clamp(Axis::Tilt, &pos, f64::NAN, Some(&caps())),
            ClampResult::NoOp(_)
        ));
    }

    #[test]
    fn test_never_leaves_range() {
        let caps = caps();
        let deltas = [-1e9, -500.0, -42.0, -6.0, -0.5, 0.5, 6.0, 42.0, 500.0, 1e9];
        for axis in Axis::ALL {
            let range = caps.get(axis).unwrap();
            let mut p = range.min;
            while p <= range.max {
                let mut pos = Position::default();
                pos.set(axis, p);
                for delta in deltas {
                    if let ClampResult::Target(v) = clamp(axis, &pos, delta, Some(&caps)) {
                        assert!(range.contains(v), "{axis} {p} + {delta} -> {v}");
                        assert_ne!(v, p);
                    }
                }
                p += 7.5;
            }
        }
    }

    #[test]
    fn test_repeated_increment_reaches_max_then_noop() {
        let caps = caps();
        for axis in Axis::ALL {
            let range = caps.get(axis).unwrap();
            let mut pos = Position::default();
            pos.set(axis, range.min);
            let mut applied = 0;
            while let ClampResult::Target(v) = clamp(axis, &pos, 13.0, Some(&caps)) {
                pos.set(axis, v);
                applied += 1;
                assert!(applied < 1000);
            }
            assert_eq!(pos.get(axis), range.max);
            for _ in 0..10 {
                assert_eq!(
                    clamp(axis, &pos, 13.0, Some(&caps)),
                    ClampResult::NoOp(NoOpReason::Unchanged)
                );
            }
        }
    }

    #[test]
    fn test_clamp_to_absolute() {
        let pos = Position::new(50.0, -20.0, 300.0);
        assert_eq!(clamp_to(Axis::Pan, &pos, 0.0, Some(&caps())), ClampResult::Target(0.0));
        // zoom range floor is 100
        assert_eq!(clamp_to(Axis::Zoom, &pos, 0.0, Some(&caps())), ClampResult::Target(100.0));
    }
}
