//! RangeModel - per-axis step increments derived from Capabilities

use super::types::{Axis, AxisRange, Capabilities};

/// Step increment for one base tick: `(max - min) * fraction`
pub fn compute_step_increment(range: AxisRange, fraction: f64) -> f64 {
    range.span() * fraction
}

/// Step increments for every axis of a discovered actuator
#[derive(Debug, Clone, Copy)]
pub struct RangeModel {
    capabilities: Capabilities,
    step_fraction: f64,
}

impl RangeModel {
    pub fn new(capabilities: Capabilities, step_fraction: f64) -> Self {
        Self {
            capabilities,
            step_fraction,
        }
    }

    /// Step for `axis`; 0 when the axis is unsupported
    pub fn step(&self, axis: Axis) -> f64 {
        self.capabilities
            .get(axis)
            .map(|range| compute_step_increment(range, self.step_fraction))
            .unwrap_or(0.0)
    }

    /// Axes that can be routed to (supported and with a non-zero step)
    pub fn routable_axes(&self) -> Vec<Axis> {
        Axis::ALL
            .into_iter()
            .filter(|axis| self.step(*axis) != 0.0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_step_increment() {
        let step = compute_step_increment(AxisRange::new(-200.0, 200.0), 0.03);
        assert!((step - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_unsupported_axis_has_zero_step() {
        let caps = Capabilities::default().with(Axis::Zoom, AxisRange::new(100.0, 400.0));
        let model = RangeModel::new(caps, 0.03);
        assert_eq!(model.step(Axis::Pan), 0.0);
        assert!((model.step(Axis::Zoom) - 9.0).abs() < 1e-9);
        assert_eq!(model.routable_axes(), vec![Axis::Zoom]);
    }

    #[test]
    fn test_degenerate_range_not_routable() {
        let caps = Capabilities::default().with(Axis::Tilt, AxisRange::new(5.0, 5.0));
        let model = RangeModel::new(caps, 0.03);
        assert!(model.routable_axes().is_empty());
    }
}
