//! Gyroscopic stability (Miller twist rule) and spin drift.

use crate::constants::{INCHES_PER_FOOT, STANDARD_PRESSURE_INHG, STANDARD_TEMPERATURE_F};

/// Miller formula coefficient
const MILLER_COEFFICIENT: f64 = 30.0;

/// Muzzle velocity the Miller rule is normalized to (fps)
const VELOCITY_REF_FPS: f64 = 2800.0;

/// Litz spin-drift fit constants
const SPIN_DRIFT_COEFFICIENT: f64 = 1.25;
const SPIN_DRIFT_OFFSET: f64 = 1.2;
const SPIN_DRIFT_TIME_EXPONENT: f64 = 1.83;

/// Gyroscopic stability coefficient by the Miller twist rule.
///
/// Returns 0 when twist, length, diameter, or pressure is zero, which
/// downstream code reads as "stability unknown, no spin effects".
///
/// # Arguments
/// * `weight_gr` - projectile weight in grains
/// * `twist_in_per_turn` - barrel twist, inches per turn (sign ignored here)
/// * `diameter_in` - projectile diameter in inches
/// * `length_in` - projectile length in inches
/// * `muzzle_velocity_fps` - muzzle velocity
/// * `temperature_f`, `pressure_inhg` - air state at the muzzle
pub fn miller_stability_coefficient(
    weight_gr: f64,
    twist_in_per_turn: f64,
    diameter_in: f64,
    length_in: f64,
    muzzle_velocity_fps: f64,
    temperature_f: f64,
    pressure_inhg: f64,
) -> f64 {
    if twist_in_per_turn == 0.0 || diameter_in == 0.0 || length_in == 0.0 || pressure_inhg == 0.0 {
        return 0.0;
    }

    let twist_calibers = (twist_in_per_turn / diameter_in).abs();
    let length_calibers = length_in / diameter_in;

    let sd = MILLER_COEFFICIENT * weight_gr
        / (twist_calibers.powi(2)
            * diameter_in.powi(3)
            * length_calibers
            * (1.0 + length_calibers.powi(2)));

    let velocity_correction = (muzzle_velocity_fps / VELOCITY_REF_FPS).powf(1.0 / 3.0);

    // Miller's rule rounds the Rankine offset to 460
    let atmo_correction = ((temperature_f + 460.0) / (STANDARD_TEMPERATURE_F + 460.0))
        * (STANDARD_PRESSURE_INHG / pressure_inhg);

    sd * velocity_correction * atmo_correction
}

/// Lateral spin drift at flight time `time_s` (ft), the Litz empirical fit.
///
/// Positive twist (right-hand) drifts right, negative drifts left. Zero
/// twist or zero stability yields zero drift.
pub fn spin_drift_ft(time_s: f64, stability_coefficient: f64, twist_in_per_turn: f64) -> f64 {
    if twist_in_per_turn == 0.0 || stability_coefficient == 0.0 {
        return 0.0;
    }
    let sign = if twist_in_per_turn > 0.0 { 1.0 } else { -1.0 };
    sign * SPIN_DRIFT_COEFFICIENT
        * (stability_coefficient + SPIN_DRIFT_OFFSET)
        * time_s.powf(SPIN_DRIFT_TIME_EXPONENT)
        / INCHES_PER_FOOT
}
