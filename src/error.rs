//! Error types for trajectory integration and zero finding.

use std::fmt;

use thiserror::Error;

use crate::trajectory_data::TrajectoryData;

/// Why an integration stopped before reaching the requested range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeErrorReason {
    MinimumVelocityReached,
    MaximumDropReached,
    MinimumAltitudeReached,
}

impl fmt::Display for RangeErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RangeErrorReason::MinimumVelocityReached => "Minimum velocity reached",
            RangeErrorReason::MaximumDropReached => "Maximum drop reached",
            RangeErrorReason::MinimumAltitudeReached => "Minimum altitude reached",
        };
        f.write_str(s)
    }
}

/// Integration terminated early on a velocity, drop, or altitude limit.
///
/// Carries every row recorded before termination so callers can still
/// inspect the reachable part of the trajectory.
#[derive(Debug, Clone, Error)]
#[error("max range not reached: {reason}")]
pub struct RangeError {
    pub reason: RangeErrorReason,
    pub partial_trajectory: Vec<TrajectoryData>,
}

impl RangeError {
    pub fn new(reason: RangeErrorReason, partial_trajectory: Vec<TrajectoryData>) -> Self {
        RangeError {
            reason,
            partial_trajectory,
        }
    }

    /// Horizontal distance of the last recorded point, if any (ft).
    pub fn last_distance_ft(&self) -> Option<f64> {
        self.partial_trajectory.last().map(|row| row.distance_ft)
    }
}

/// A requested zeroing distance exceeds the ballistic reach of the shot.
#[derive(Debug, Clone, Error)]
#[error(
    "requested distance {requested_distance_ft:.1} ft exceeds maximum achievable \
     {max_range_ft:.1} ft at look angle {look_angle_rad:.4} rad"
)]
pub struct OutOfRangeError {
    pub requested_distance_ft: f64,
    pub max_range_ft: f64,
    pub look_angle_rad: f64,
}

/// Why a zero-finding iteration gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroFindingReason {
    MaxIterationsExceeded,
    DistanceNonConvergent,
    ErrorNonConvergent,
    BracketingFailed,
}

impl fmt::Display for ZeroFindingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ZeroFindingReason::MaxIterationsExceeded => "maximum iterations exceeded",
            ZeroFindingReason::DistanceNonConvergent => "distance non-convergent",
            ZeroFindingReason::ErrorNonConvergent => "error non-convergent",
            ZeroFindingReason::BracketingFailed => "could not bracket a sign change",
        };
        f.write_str(s)
    }
}

/// Zero finding failed to converge on a barrel elevation.
#[derive(Debug, Clone, Error)]
#[error(
    "zero finding failed ({reason}): vertical error {error_magnitude_ft:.4} ft \
     after {iterations} iterations, last elevation {last_elevation_rad:.6} rad"
)]
pub struct ZeroFindingError {
    pub error_magnitude_ft: f64,
    pub iterations: usize,
    pub last_elevation_rad: f64,
    pub reason: ZeroFindingReason,
}

/// Top-level error for every fallible operation in the crate.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error(transparent)]
    OutOfRange(#[from] OutOfRangeError),
    #[error(transparent)]
    ZeroFinding(#[from] ZeroFindingError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("division by zero: {0}")]
    DivideByZero(String),
}

impl Error {
    /// Rows recorded before an early termination, when the error carries any.
    pub fn partial_trajectory(&self) -> Option<&[TrajectoryData]> {
        match self {
            Error::Range(e) => Some(&e.partial_trajectory),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_error_display() {
        let err = RangeError::new(RangeErrorReason::MinimumVelocityReached, Vec::new());
        assert_eq!(err.to_string(), "max range not reached: Minimum velocity reached");
        assert!(err.last_distance_ft().is_none());
    }

    #[test]
    fn test_out_of_range_display() {
        let err = OutOfRangeError {
            requested_distance_ft: 6000.0,
            max_range_ft: 5280.5,
            look_angle_rad: 0.1234,
        };
        let msg = err.to_string();
        assert!(msg.contains("6000.0"));
        assert!(msg.contains("5280.5"));
        assert!(msg.contains("0.1234"));
    }

    #[test]
    fn test_zero_finding_display() {
        let err = ZeroFindingError {
            error_magnitude_ft: 0.25,
            iterations: 60,
            last_elevation_rad: 0.015,
            reason: ZeroFindingReason::MaxIterationsExceeded,
        };
        let msg = err.to_string();
        assert!(msg.contains("maximum iterations exceeded"));
        assert!(msg.contains("60 iterations"));
    }

    #[test]
    fn test_top_level_wrapping_preserves_partial_trajectory() {
        let err: Error = RangeError::new(RangeErrorReason::MaximumDropReached, Vec::new()).into();
        assert!(err.partial_trajectory().is_some());
        assert!(matches!(err, Error::Range(_)));
    }
}
