//! Engine configuration.
//!
//! A flat record of limits and tolerances, passed explicitly to every
//! engine call. There is no process-wide configuration; root-finders that
//! need to loosen a limit clone the record and hand the relaxed copy down.

use crate::constants::GRAVITY_FPS2;

/// Tunable limits and tolerances for trajectory integration and zeroing.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Convergence tolerance for zero finding: how many feet of height
    /// error at the target a returned elevation may leave.
    pub zero_finding_accuracy_ft: f64,
    /// Iteration cap for the zero-finding loops.
    pub max_iterations: usize,
    /// Terminate a descending trajectory below this altitude ASL (ft).
    pub min_altitude_ft: f64,
    /// Terminate once height drops below this value (ft, negative).
    pub max_drop_ft: f64,
    /// Terminate once speed drops below this value (fps).
    pub min_velocity_fps: f64,
    /// Vertical acceleration (ft/s², negative is down).
    pub gravity_fps2: f64,
    /// Scales the per-engine nominal spatial step.
    pub step_multiplier: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            zero_finding_accuracy_ft: 5.0e-6,
            max_iterations: 60,
            min_altitude_ft: -1410.748, // lowest altitude the ICAO lapse model covers
            max_drop_ft: -10000.0,
            min_velocity_fps: 50.0,
            gravity_fps2: GRAVITY_FPS2,
            step_multiplier: 1.0,
        }
    }
}

impl EngineConfig {
    /// Copy with the drop and velocity floors effectively disabled, used
    /// while tracing a full arc for max-range and apex searches.
    pub fn without_range_limits(&self) -> Self {
        let mut relaxed = self.clone();
        relaxed.max_drop_ft = f64::NEG_INFINITY;
        relaxed.min_velocity_fps = 0.0;
        relaxed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_iterations, 60);
        assert!((config.min_velocity_fps - 50.0).abs() < 1e-12);
        assert!((config.max_drop_ft + 10000.0).abs() < 1e-12);
        assert!(config.gravity_fps2 < 0.0);
        assert!((config.step_multiplier - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_without_range_limits_leaves_original_untouched() {
        let config = EngineConfig::default();
        let relaxed = config.without_range_limits();
        assert_eq!(relaxed.min_velocity_fps, 0.0);
        assert!(relaxed.max_drop_ft.is_infinite());
        // the source record keeps its limits
        assert!((config.min_velocity_fps - 50.0).abs() < 1e-12);
        assert!(config.max_drop_ft.is_finite());
    }
}
