//! Atmospheric model: density ratio and speed of sound along a trajectory.
//!
//! Conditions are anchored at a base altitude (typically the muzzle) and
//! extrapolated along the ICAO troposphere lapse as the projectile climbs or
//! drops. Base density uses the CIPM-2007 moist air formula for accuracy at
//! non-standard temperature, pressure, and humidity.

use crate::constants::{
    DENSITY_EXPONENT, FAHRENHEIT_TO_RANKINE, HPA_PER_INHG, SPEED_OF_SOUND_COEFF_FPS,
    STANDARD_DENSITY_KG_M3, STANDARD_PRESSURE_INHG, STANDARD_TEMPERATURE_F,
    TEMPERATURE_LAPSE_F_PER_FT, TROPOPAUSE_ALTITUDE_FT,
};

/// CIPM-2007 gas constants
const R_UNIVERSAL: f64 = 8.314472; // J/(mol·K)
const MOLAR_MASS_DRY_AIR: f64 = 28.96546e-3; // kg/mol
const MOLAR_MASS_WATER_VAPOR: f64 = 18.01528e-3; // kg/mol

/// Coldest temperature the lapse extrapolation may produce (°F),
/// the ICAO tropopause temperature
const LOWEST_TEMPERATURE_F: f64 = -69.67;

/// Atmospheric conditions anchored at a base altitude.
#[derive(Debug, Clone, PartialEq)]
pub struct Atmosphere {
    altitude_ft: f64,
    pressure_inhg: f64,
    temperature_f: f64,
    humidity_percent: f64,
    density_ratio: f64,
    mach_fps: f64,
}

impl Atmosphere {
    /// Conditions measured at a base altitude.
    ///
    /// # Arguments
    /// * `altitude_ft` - altitude of the measurement above sea level
    /// * `pressure_inhg` - station pressure
    /// * `temperature_f` - air temperature
    /// * `humidity_percent` - relative humidity, 0-100
    pub fn new(
        altitude_ft: f64,
        pressure_inhg: f64,
        temperature_f: f64,
        humidity_percent: f64,
    ) -> Self {
        let humidity = humidity_percent.clamp(0.0, 100.0);
        let density_kg_m3 = air_density_kg_m3(temperature_f, pressure_inhg, humidity);
        Self {
            altitude_ft,
            pressure_inhg,
            temperature_f,
            humidity_percent: humidity,
            density_ratio: density_kg_m3 / STANDARD_DENSITY_KG_M3,
            mach_fps: speed_of_sound_fps(temperature_f),
        }
    }

    /// ICAO standard conditions at the given altitude, dry air.
    pub fn icao(altitude_ft: f64) -> Self {
        Self::new(
            altitude_ft,
            standard_pressure_inhg(altitude_ft),
            standard_temperature_f(altitude_ft),
            0.0,
        )
    }

    pub fn altitude_ft(&self) -> f64 {
        self.altitude_ft
    }

    pub fn temperature_f(&self) -> f64 {
        self.temperature_f
    }

    pub fn pressure_inhg(&self) -> f64 {
        self.pressure_inhg
    }

    pub fn humidity_percent(&self) -> f64 {
        self.humidity_percent
    }

    /// Density ratio at the base altitude, relative to ICAO sea level.
    pub fn density_ratio(&self) -> f64 {
        self.density_ratio
    }

    /// Speed of sound at the base altitude (fps).
    pub fn mach_fps(&self) -> f64 {
        self.mach_fps
    }

    /// Air temperature at an arbitrary altitude, lapsed from the base (°F).
    pub fn temperature_at_altitude(&self, altitude_ft: f64) -> f64 {
        let t = (altitude_ft - self.altitude_ft) * TEMPERATURE_LAPSE_F_PER_FT + self.temperature_f;
        if t < LOWEST_TEMPERATURE_F {
            tracing::warn!(
                "lapse-extrapolated temperature {:.1}°F clamped to {:.1}°F",
                t, LOWEST_TEMPERATURE_F
            );
            return LOWEST_TEMPERATURE_F;
        }
        t
    }

    /// Density ratio and speed of sound at a trajectory altitude.
    ///
    /// Within 30 ft of the base altitude the anchored values are returned
    /// as-is; integration at rifle ranges stays inside that band almost
    /// always, so the expensive path only runs for steep or very long arcs.
    ///
    /// # Arguments
    /// * `altitude_ft` - projectile altitude above sea level
    ///
    /// # Returns
    /// Tuple of (density_ratio, speed_of_sound_fps)
    pub fn density_and_mach_for_altitude(&self, altitude_ft: f64) -> (f64, f64) {
        if (altitude_ft - self.altitude_ft).abs() < 30.0 {
            return (self.density_ratio, self.mach_fps);
        }
        if altitude_ft > TROPOPAUSE_ALTITUDE_FT {
            tracing::warn!(
                "altitude {:.0} ft is above the troposphere model limit {:.0} ft",
                altitude_ft, TROPOPAUSE_ALTITUDE_FT
            );
        }
        let t_f = self.temperature_at_altitude(altitude_ft);
        let t_r = t_f + FAHRENHEIT_TO_RANKINE;
        let base_r = self.temperature_f + FAHRENHEIT_TO_RANKINE;
        let density_ratio = self.density_ratio * (t_r / base_r).powf(DENSITY_EXPONENT);
        (density_ratio, speed_of_sound_fps(t_f))
    }
}

impl Default for Atmosphere {
    fn default() -> Self {
        Self::icao(0.0)
    }
}

/// Speed of sound in air at the given temperature (fps).
pub fn speed_of_sound_fps(temperature_f: f64) -> f64 {
    SPEED_OF_SOUND_COEFF_FPS * (temperature_f + FAHRENHEIT_TO_RANKINE).max(0.0).sqrt()
}

/// ICAO standard temperature at an altitude (°F).
pub fn standard_temperature_f(altitude_ft: f64) -> f64 {
    STANDARD_TEMPERATURE_F + altitude_ft * TEMPERATURE_LAPSE_F_PER_FT
}

/// ICAO standard pressure at an altitude (inHg).
pub fn standard_pressure_inhg(altitude_ft: f64) -> f64 {
    let t0_r = STANDARD_TEMPERATURE_F + FAHRENHEIT_TO_RANKINE;
    let t_r = standard_temperature_f(altitude_ft) + FAHRENHEIT_TO_RANKINE;
    STANDARD_PRESSURE_INHG * (t_r / t0_r).powf(DENSITY_EXPONENT + 1.0)
}

/// Moist air density by the CIPM-2007 formula.
///
/// # Arguments
/// * `temperature_f` - air temperature
/// * `pressure_inhg` - station pressure
/// * `humidity_percent` - relative humidity, 0-100
///
/// # Returns
/// Air density in kg/m³
pub fn air_density_kg_m3(temperature_f: f64, pressure_inhg: f64, humidity_percent: f64) -> f64 {
    let t_c = (temperature_f - 32.0) / 1.8;
    let p_hpa = pressure_inhg * HPA_PER_INHG;
    let t_k = t_c + 273.15;

    let p_sv = saturation_vapor_pressure_hpa(t_k);
    let f = enhancement_factor(p_hpa, t_c);
    let p_v = humidity_percent.clamp(0.0, 100.0) / 100.0 * f * p_sv;
    let x_v = if p_hpa > 0.0 { p_v / p_hpa } else { 0.0 };
    let z = compressibility_factor(p_hpa, t_k, x_v);

    let density = ((p_hpa * MOLAR_MASS_DRY_AIR) / (z * R_UNIVERSAL * t_k))
        * (1.0 - x_v * (1.0 - MOLAR_MASS_WATER_VAPOR / MOLAR_MASS_DRY_AIR));

    // pressure entered in hPa, the gas law wants Pa
    density * 100.0
}

/// Saturation vapor pressure of water (hPa).
/// Uses the IAPWS-IF97 formulation for high precision.
#[inline(always)]
fn saturation_vapor_pressure_hpa(t_k: f64) -> f64 {
    const A: [f64; 6] = [
        -7.85951783,
        1.84408259,
        -11.7866497,
        22.6807411,
        -15.9618719,
        1.80122502,
    ];

    let t_k_safe = t_k.max(173.15); // -100°C minimum
    let tau = 1.0 - t_k_safe / 647.096; // critical temperature of water
    let ln_p_ratio = (647.096 / t_k_safe)
        * (A[0] * tau
            + A[1] * tau.powf(1.5)
            + A[2] * tau.powf(3.0)
            + A[3] * tau.powf(3.5)
            + A[4] * tau.powf(4.0)
            + A[5] * tau.powf(7.5));

    220640.0 * ln_p_ratio.exp() // critical pressure in hPa (22.064 MPa)
}

/// CIPM enhancement factor with temperature dependence.
#[inline(always)]
fn enhancement_factor(p_hpa: f64, t_c: f64) -> f64 {
    const ALPHA: f64 = 1.00062;
    const BETA: f64 = 3.14e-8;
    const GAMMA: f64 = 5.6e-7;
    const DELTA: f64 = 1.2e-10;

    ALPHA + BETA * p_hpa + GAMMA * t_c * t_c + DELTA * p_hpa * t_c
}

/// Compressibility factor of moist air.
#[inline(always)]
fn compressibility_factor(p_hpa: f64, t_k: f64, x_v: f64) -> f64 {
    const A0: f64 = 1.58123e-6;
    const A1: f64 = -2.9331e-8;
    const A2: f64 = 1.1043e-10;
    const B0: f64 = 5.707e-6;
    const B1: f64 = -2.051e-8;
    const C0: f64 = 1.9898e-4;
    const C1: f64 = -2.376e-6;
    const D: f64 = 1.83e-11;
    const E: f64 = -0.765e-8;
    const F0: f64 = 2.1e-12;
    const F1: f64 = -1.1e-14;

    let t_k_safe = t_k.max(173.15);
    let t = t_k_safe - 273.15;
    let p_t = p_hpa / t_k_safe;

    let second_order =
        1.0 - p_t * (A0 + A1 * t + A2 * t * t + (B0 + B1 * t) * x_v + (C0 + C1 * t) * x_v * x_v);
    let third_order = p_t * p_t * (D + E * x_v * x_v);
    let fourth_order = p_t * p_t * p_t * (F0 + F1 * x_v * x_v * x_v);

    second_order + third_order + fourth_order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icao_sea_level() {
        let atmo = Atmosphere::icao(0.0);
        assert!((atmo.density_ratio() - 1.0).abs() < 1e-3, "ratio: {}", atmo.density_ratio());
        assert!((atmo.mach_fps() - 1116.45).abs() < 0.1, "mach: {}", atmo.mach_fps());
    }

    #[test]
    fn test_cipm_density_standard_conditions() {
        let density = air_density_kg_m3(59.0, 29.92, 0.0);
        assert!((density - 1.225).abs() < 0.005, "density: {density}");
    }

    #[test]
    fn test_humid_air_is_less_dense() {
        let dry = air_density_kg_m3(59.0, 29.92, 0.0);
        let humid = air_density_kg_m3(59.0, 29.92, 80.0);
        assert!(humid < dry);
    }

    #[test]
    fn test_standard_pressure_falls_with_altitude() {
        let p5k = standard_pressure_inhg(5000.0);
        assert!((p5k - 24.90).abs() < 0.05, "pressure at 5000 ft: {p5k}");
        assert!(standard_pressure_inhg(10000.0) < p5k);
    }

    #[test]
    fn test_density_and_mach_shortcut_near_base() {
        let atmo = Atmosphere::icao(1000.0);
        let (ratio, mach) = atmo.density_and_mach_for_altitude(1020.0);
        assert_eq!(ratio, atmo.density_ratio());
        assert_eq!(mach, atmo.mach_fps());
    }

    #[test]
    fn test_density_falls_and_air_cools_above_base() {
        let atmo = Atmosphere::icao(0.0);
        let (ratio, mach) = atmo.density_and_mach_for_altitude(10000.0);
        assert!(ratio < atmo.density_ratio(), "ratio at 10k ft: {ratio}");
        assert!(mach < atmo.mach_fps(), "mach at 10k ft: {mach}");
        // ICAO density ratio at 10,000 ft is about 0.738
        assert!((ratio - 0.738).abs() < 0.01, "ratio at 10k ft: {ratio}");
    }

    #[test]
    fn test_temperature_clamps_at_tropopause_floor() {
        let atmo = Atmosphere::icao(0.0);
        let t = atmo.temperature_at_altitude(60000.0);
        assert_eq!(t, LOWEST_TEMPERATURE_F);
    }

    #[test]
    fn test_hot_air_raises_speed_of_sound() {
        assert!(speed_of_sound_fps(100.0) > speed_of_sound_fps(0.0));
    }

    #[test]
    fn test_non_standard_conditions_shift_ratio() {
        // hot day, low pressure: thinner air
        let thin = Atmosphere::new(0.0, 29.00, 95.0, 0.0);
        assert!(thin.density_ratio() < 1.0);
        // cold day, high pressure: denser air
        let dense = Atmosphere::new(0.0, 30.50, 10.0, 0.0);
        assert!(dense.density_ratio() > 1.0);
    }
}
