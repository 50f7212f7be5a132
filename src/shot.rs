//! Shot description records and the flat snapshot the engines consume.
//!
//! `Weapon`, `Ammo`, `DragModel`, and `Shot` describe a firing problem in
//! internal units (feet, fps, radians, grains, inches where noted).
//! `ShotProps::from_shot` freezes them into plain floats plus a prebuilt
//! drag curve; after that point the engines never touch the source records.

use nalgebra::Vector3;

use crate::atmosphere::Atmosphere;
use crate::config::EngineConfig;
use crate::constants::{DRAG_CONVERSION_FACTOR, EULER_BASE_STEP_FT, MAX_CALC_STEP_FT};
use crate::coriolis::Coriolis;
use crate::drag::DragCurve;
use crate::drag_tables::{TABLE_G1, TABLE_G7};
use crate::error::Error;
use crate::stability;
use crate::wind::{Wind, WindSock};

/// Rifle description.
#[derive(Debug, Clone, PartialEq)]
pub struct Weapon {
    /// Height of the sight line above the bore axis (ft).
    pub sight_height_ft: f64,
    /// Barrel twist, inches per turn. Positive is right-hand.
    pub twist_in: f64,
    /// Elevation the sights are zeroed at (rad), composed into the barrel
    /// angle for every shot.
    pub zero_elevation_rad: f64,
}

impl Weapon {
    pub fn new(sight_height_ft: f64, twist_in: f64) -> Self {
        Self {
            sight_height_ft,
            twist_in,
            zero_elevation_rad: 0.0,
        }
    }
}

impl Default for Weapon {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Projectile drag description: a ballistic coefficient against a reference
/// drag table, plus the physical dimensions the spin model wants.
#[derive(Debug, Clone, PartialEq)]
pub struct DragModel {
    /// Ballistic coefficient (lb/in²).
    pub bc: f64,
    /// (Mach, Cd) reference table.
    pub table: Vec<(f64, f64)>,
    /// Projectile weight (grains).
    pub weight_gr: f64,
    /// Projectile diameter (inches).
    pub diameter_in: f64,
    /// Projectile length (inches).
    pub length_in: f64,
}

impl DragModel {
    pub fn new(
        bc: f64,
        table: Vec<(f64, f64)>,
        weight_gr: f64,
        diameter_in: f64,
        length_in: f64,
    ) -> Self {
        Self {
            bc,
            table,
            weight_gr,
            diameter_in,
            length_in,
        }
    }

    /// Model against the standard G1 (flat-base) table.
    pub fn g1(bc: f64, weight_gr: f64, diameter_in: f64, length_in: f64) -> Self {
        Self::new(bc, TABLE_G1.to_vec(), weight_gr, diameter_in, length_in)
    }

    /// Model against the standard G7 (boat-tail) table.
    pub fn g7(bc: f64, weight_gr: f64, diameter_in: f64, length_in: f64) -> Self {
        Self::new(bc, TABLE_G7.to_vec(), weight_gr, diameter_in, length_in)
    }
}

/// Cartridge description.
#[derive(Debug, Clone, PartialEq)]
pub struct Ammo {
    pub drag_model: DragModel,
    /// Muzzle velocity at `powder_temp_f` (fps).
    pub muzzle_velocity_fps: f64,
    /// Temperature the muzzle velocity was measured at (°F).
    pub powder_temp_f: f64,
    /// Percent velocity change per 15°F of powder temperature.
    pub temp_modifier: f64,
    /// Whether `velocity_for_temp` applies the modifier at all.
    pub use_powder_sensitivity: bool,
}

impl Ammo {
    pub fn new(drag_model: DragModel, muzzle_velocity_fps: f64) -> Self {
        Self {
            drag_model,
            muzzle_velocity_fps,
            powder_temp_f: 59.0,
            temp_modifier: 0.0,
            use_powder_sensitivity: false,
        }
    }

    /// Calibrate the powder temperature modifier from a second chronograph
    /// point, and enable sensitivity.
    ///
    /// # Arguments
    /// * `other_velocity_fps` - velocity measured at `other_temperature_f`
    ///
    /// # Returns
    /// The modifier (percent velocity per 15°F), or `Error::InvalidInput`
    /// when the two points share a temperature or velocity.
    pub fn calc_powder_sensitivity(
        &mut self,
        other_velocity_fps: f64,
        other_temperature_f: f64,
    ) -> Result<f64, Error> {
        let v_delta = (self.muzzle_velocity_fps - other_velocity_fps).abs();
        let t_delta = (self.powder_temp_f - other_temperature_f).abs();
        if v_delta == 0.0 || t_delta == 0.0 {
            return Err(Error::InvalidInput(
                "powder sensitivity needs two distinct chronograph points".to_string(),
            ));
        }
        let v_lower = self.muzzle_velocity_fps.min(other_velocity_fps);
        self.temp_modifier = v_delta / t_delta * (15.0 / v_lower) * 100.0;
        self.use_powder_sensitivity = true;
        Ok(self.temp_modifier)
    }

    /// Muzzle velocity adjusted for the powder temperature (fps).
    pub fn velocity_for_temp(&self, temperature_f: f64) -> f64 {
        if !self.use_powder_sensitivity {
            return self.muzzle_velocity_fps;
        }
        let t_delta = temperature_f - self.powder_temp_f;
        self.muzzle_velocity_fps
            + t_delta * (self.temp_modifier / 100.0) * (self.muzzle_velocity_fps / 15.0)
    }
}

/// One firing problem: angles, hardware, air, and wind.
#[derive(Debug, Clone)]
pub struct Shot {
    /// Sight-line inclination to the target (rad), positive uphill.
    pub look_angle_rad: f64,
    /// Additional hold relative to the sight line (rad).
    pub relative_angle_rad: f64,
    /// Rifle cant around the bore axis (rad).
    pub cant_angle_rad: f64,
    pub weapon: Weapon,
    pub ammo: Ammo,
    pub atmosphere: Atmosphere,
    pub winds: Vec<Wind>,
    /// Shooter latitude (rad, positive north); `None` disables Coriolis.
    pub latitude_rad: Option<f64>,
    /// Azimuth of fire (rad, clockwise from true north), only meaningful
    /// with a latitude.
    pub azimuth_rad: f64,
}

impl Shot {
    pub fn new(weapon: Weapon, ammo: Ammo) -> Self {
        Self {
            look_angle_rad: 0.0,
            relative_angle_rad: 0.0,
            cant_angle_rad: 0.0,
            weapon,
            ammo,
            atmosphere: Atmosphere::default(),
            winds: Vec::new(),
            latitude_rad: None,
            azimuth_rad: 0.0,
        }
    }

    /// Bore elevation composed from look, zero, and relative angles, with
    /// cant rotating part of the elevation into azimuth.
    pub fn barrel_elevation_rad(&self) -> f64 {
        self.look_angle_rad
            + self.cant_angle_rad.cos()
                * (self.weapon.zero_elevation_rad + self.relative_angle_rad)
    }

    /// Bore azimuth produced by cant (rad).
    pub fn barrel_azimuth_rad(&self) -> f64 {
        self.cant_angle_rad.sin() * (self.weapon.zero_elevation_rad + self.relative_angle_rad)
    }
}

/// Flat snapshot of a `Shot`, the only structure the engines read.
///
/// `barrel_elevation_rad` is the single field the zeroing solvers rewrite
/// between integrator runs; everything else is frozen at construction.
#[derive(Debug, Clone)]
pub struct ShotProps {
    pub bc: f64,
    pub curve: DragCurve,
    pub look_angle_rad: f64,
    pub twist_in: f64,
    pub length_in: f64,
    pub diameter_in: f64,
    pub weight_gr: f64,
    pub barrel_elevation_rad: f64,
    pub barrel_azimuth_rad: f64,
    pub sight_height_ft: f64,
    pub cant_cosine: f64,
    pub cant_sine: f64,
    pub alt0_ft: f64,
    pub calc_step_ft: f64,
    pub muzzle_velocity_fps: f64,
    pub stability_coefficient: f64,
    pub atmosphere: Atmosphere,
    pub winds: Vec<Wind>,
    pub coriolis: Option<Coriolis>,
}

impl ShotProps {
    /// Freeze a shot description against an engine configuration.
    ///
    /// Fails with `Error::InvalidInput` on a degenerate drag table or a
    /// non-positive ballistic coefficient.
    pub fn from_shot(shot: &Shot, config: &EngineConfig) -> Result<Self, Error> {
        if shot.ammo.drag_model.bc <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "ballistic coefficient must be positive, got {}",
                shot.ammo.drag_model.bc
            )));
        }
        let curve = DragCurve::new(&shot.ammo.drag_model.table)?;

        let atmosphere = shot.atmosphere.clone();
        let muzzle_velocity_fps = shot.ammo.velocity_for_temp(atmosphere.temperature_f());
        let stability_coefficient = stability::miller_stability_coefficient(
            shot.ammo.drag_model.weight_gr,
            shot.weapon.twist_in,
            shot.ammo.drag_model.diameter_in,
            shot.ammo.drag_model.length_in,
            muzzle_velocity_fps,
            atmosphere.temperature_f(),
            atmosphere.pressure_inhg(),
        );
        let coriolis = shot
            .latitude_rad
            .map(|latitude| Coriolis::new(latitude, shot.azimuth_rad));

        Ok(Self {
            bc: shot.ammo.drag_model.bc,
            curve,
            look_angle_rad: shot.look_angle_rad,
            twist_in: shot.weapon.twist_in,
            length_in: shot.ammo.drag_model.length_in,
            diameter_in: shot.ammo.drag_model.diameter_in,
            weight_gr: shot.ammo.drag_model.weight_gr,
            barrel_elevation_rad: shot.barrel_elevation_rad(),
            barrel_azimuth_rad: shot.barrel_azimuth_rad(),
            sight_height_ft: shot.weapon.sight_height_ft,
            cant_cosine: shot.cant_angle_rad.cos(),
            cant_sine: shot.cant_angle_rad.sin(),
            alt0_ft: atmosphere.altitude_ft(),
            calc_step_ft: (EULER_BASE_STEP_FT * config.step_multiplier).min(MAX_CALC_STEP_FT),
            muzzle_velocity_fps,
            stability_coefficient,
            atmosphere,
            winds: shot.winds.clone(),
            coriolis,
        })
    }

    /// Standard drag factor at a Mach number: Cd scaled so that
    /// deceleration = factor * density_ratio * v * |v_rel|.
    pub fn standard_drag(&self, mach: f64) -> f64 {
        self.curve.drag_coefficient(mach) * DRAG_CONVERSION_FACTOR / self.bc
    }

    /// Density ratio and speed of sound at an absolute altitude (ft ASL).
    pub fn density_and_mach(&self, altitude_ft: f64) -> (f64, f64) {
        self.atmosphere.density_and_mach_for_altitude(altitude_ft)
    }

    /// Lateral spin drift at flight time `time_s` (ft).
    pub fn spin_drift_ft(&self, time_s: f64) -> f64 {
        stability::spin_drift_ft(time_s, self.stability_coefficient, self.twist_in)
    }

    /// Fresh wind cursor for one integration pass. The cursor is stateful,
    /// so every pass gets its own.
    pub fn wind_sock(&self) -> WindSock {
        WindSock::new(self.winds.clone())
    }

    /// Muzzle position in the shooter frame: the bore sits below the sight
    /// line, rotated by cant.
    pub fn initial_position(&self) -> Vector3<f64> {
        Vector3::new(
            0.0,
            -self.sight_height_ft * self.cant_cosine,
            -self.sight_height_ft * self.cant_sine,
        )
    }

    /// Muzzle velocity vector along the barrel (fps).
    pub fn initial_velocity(&self) -> Vector3<f64> {
        let (sin_el, cos_el) = self.barrel_elevation_rad.sin_cos();
        let (sin_az, cos_az) = self.barrel_azimuth_rad.sin_cos();
        self.muzzle_velocity_fps * Vector3::new(cos_el * cos_az, sin_el, cos_el * sin_az)
    }
}
