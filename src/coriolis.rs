//! Coriolis acceleration in the shooter frame.

use nalgebra::Vector3;

use crate::constants::EARTH_ANGULAR_VELOCITY_RAD_S;

/// Earth-rotation context for a shot, frozen at firing time.
///
/// The shooter frame is x downrange, y up, z to the shooter's right. Earth's
/// angular velocity expressed in that frame depends on the latitude and the
/// azimuth of fire; the per-step acceleration is then `-2 * omega x v`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coriolis {
    omega_shooter: Vector3<f64>,
}

impl Coriolis {
    /// # Arguments
    /// * `latitude_rad` - shooter latitude, positive north
    /// * `azimuth_rad` - direction of fire, clockwise from true north
    pub fn new(latitude_rad: f64, azimuth_rad: f64) -> Self {
        let (sin_lat, cos_lat) = latitude_rad.sin_cos();
        let (sin_az, cos_az) = azimuth_rad.sin_cos();
        Self {
            omega_shooter: EARTH_ANGULAR_VELOCITY_RAD_S
                * Vector3::new(cos_lat * cos_az, sin_lat, -cos_lat * sin_az),
        }
    }

    /// Coriolis acceleration for a projectile velocity in the shooter frame
    /// (ft/s²).
    pub fn acceleration(&self, velocity: &Vector3<f64>) -> Vector3<f64> {
        -2.0 * self.omega_shooter.cross(velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    #[test]
    fn test_eastward_fire_at_equator_lifts() {
        // the Eötvös effect: eastward projectiles ride a weaker effective gravity
        let coriolis = Coriolis::new(0.0, FRAC_PI_2);
        let accel = coriolis.acceleration(&Vector3::new(2750.0, 0.0, 0.0));
        assert!(accel.y > 0.0, "vertical accel: {}", accel.y);
        assert!(accel.x.abs() < 1e-9);
        assert!(accel.z.abs() < 1e-9);
    }

    #[test]
    fn test_westward_fire_at_equator_presses_down() {
        let coriolis = Coriolis::new(0.0, -FRAC_PI_2);
        let accel = coriolis.acceleration(&Vector3::new(2750.0, 0.0, 0.0));
        assert!(accel.y < 0.0, "vertical accel: {}", accel.y);
    }

    #[test]
    fn test_northern_hemisphere_deflects_right() {
        let coriolis = Coriolis::new(FRAC_PI_4, 0.0);
        let accel = coriolis.acceleration(&Vector3::new(2750.0, 0.0, 0.0));
        assert!(accel.z > 0.0, "lateral accel: {}", accel.z);
    }

    #[test]
    fn test_southern_hemisphere_deflects_left() {
        let coriolis = Coriolis::new(-FRAC_PI_4, 0.0);
        let accel = coriolis.acceleration(&Vector3::new(2750.0, 0.0, 0.0));
        assert!(accel.z < 0.0, "lateral accel: {}", accel.z);
    }

    #[test]
    fn test_magnitude_is_bounded_by_two_omega_v() {
        let coriolis = Coriolis::new(0.7, 1.3);
        let v = Vector3::new(2000.0, -300.0, 50.0);
        let accel = coriolis.acceleration(&v);
        let bound = 2.0 * EARTH_ANGULAR_VELOCITY_RAD_S * v.norm();
        assert!(accel.norm() <= bound + 1e-12, "accel {} vs bound {}", accel.norm(), bound);
    }
}
