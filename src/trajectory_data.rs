//! Output rows and the event flags that mark them.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use nalgebra::Vector3;

use crate::constants::{ENERGY_DENOMINATOR, MIN_DIVISION_THRESHOLD, OGW_COEFFICIENT};
use crate::shot::ShotProps;

/// Why a row was recorded. A row can carry several reasons at once, so the
/// flags are bits and coalesced rows hold their union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrajFlag(u32);

impl TrajFlag {
    pub const NONE: TrajFlag = TrajFlag(0);
    /// Crossed the sight line going up.
    pub const ZERO_UP: TrajFlag = TrajFlag(1);
    /// Crossed the sight line coming down.
    pub const ZERO_DOWN: TrajFlag = TrajFlag(2);
    /// Either sight-line crossing.
    pub const ZERO: TrajFlag = TrajFlag(3);
    /// Dropped through Mach 1.
    pub const MACH: TrajFlag = TrajFlag(4);
    /// Regular downrange sampling step.
    pub const RANGE: TrajFlag = TrajFlag(8);
    /// Highest point of the arc.
    pub const APEX: TrajFlag = TrajFlag(16);
    pub const ALL: TrajFlag = TrajFlag(31);

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when any bit of `other` is set in `self`.
    pub const fn intersects(self, other: TrajFlag) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for TrajFlag {
    type Output = TrajFlag;
    fn bitor(self, rhs: TrajFlag) -> TrajFlag {
        TrajFlag(self.0 | rhs.0)
    }
}

impl BitOrAssign for TrajFlag {
    fn bitor_assign(&mut self, rhs: TrajFlag) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for TrajFlag {
    type Output = TrajFlag;
    fn bitand(self, rhs: TrajFlag) -> TrajFlag {
        TrajFlag(self.0 & rhs.0)
    }
}

impl fmt::Display for TrajFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut names = Vec::new();
        if self.intersects(TrajFlag::ZERO_UP) {
            names.push("ZERO_UP");
        }
        if self.intersects(TrajFlag::ZERO_DOWN) {
            names.push("ZERO_DOWN");
        }
        if self.intersects(TrajFlag::MACH) {
            names.push("MACH");
        }
        if self.intersects(TrajFlag::RANGE) {
            names.push("RANGE");
        }
        if self.intersects(TrajFlag::APEX) {
            names.push("APEX");
        }
        f.write_str(&names.join("|"))
    }
}

/// One computed point of a trajectory, all values in internal units.
///
/// `drag` is the retardation coefficient at the point: deceleration per
/// unit velocity, 1/s.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryData {
    pub time_s: f64,
    pub distance_ft: f64,
    pub velocity_fps: f64,
    pub mach: f64,
    pub height_ft: f64,
    pub slant_height_ft: f64,
    pub drop_adj_rad: f64,
    pub windage_ft: f64,
    pub windage_adj_rad: f64,
    pub slant_distance_ft: f64,
    pub angle_rad: f64,
    pub density_ratio: f64,
    pub drag: f64,
    pub energy_ftlb: f64,
    pub ogw_lb: f64,
    pub flag: TrajFlag,
}

/// Angular correction an offset needs at a distance, zero at the muzzle.
fn get_correction(distance_ft: f64, offset_ft: f64) -> f64 {
    if distance_ft.abs() < MIN_DIVISION_THRESHOLD {
        return 0.0;
    }
    (offset_ft / distance_ft).atan()
}

impl TrajectoryData {
    /// Build a full output row from a raw integration state.
    ///
    /// # Arguments
    /// * `props` - frozen shot snapshot
    /// * `time_s` - flight time
    /// * `position` - shooter-frame position (ft)
    /// * `velocity` - shooter-frame velocity (fps)
    /// * `flag` - why this point is being recorded
    pub fn from_props(
        props: &ShotProps,
        time_s: f64,
        position: &Vector3<f64>,
        velocity: &Vector3<f64>,
        flag: TrajFlag,
    ) -> Self {
        let velocity_fps = velocity.norm();
        let (density_ratio, mach_fps) =
            props.density_and_mach(props.alt0_ft + position.y);
        let mach = if mach_fps > MIN_DIVISION_THRESHOLD {
            velocity_fps / mach_fps
        } else {
            0.0
        };

        let spin_drift = props.spin_drift_ft(time_s);
        let windage_ft = position.z + spin_drift;

        let drop_adjustment = get_correction(position.x, position.y);
        let windage_adjustment = get_correction(position.x, windage_ft);
        let look = props.look_angle_rad;
        let drop_adj_rad = if position.x.abs() < MIN_DIVISION_THRESHOLD {
            drop_adjustment
        } else {
            drop_adjustment - look
        };

        let (look_sin, look_cos) = look.sin_cos();

        Self {
            time_s,
            distance_ft: position.x,
            velocity_fps,
            mach,
            height_ft: position.y,
            slant_height_ft: position.y * look_cos - position.x * look_sin,
            drop_adj_rad,
            windage_ft,
            windage_adj_rad: windage_adjustment,
            slant_distance_ft: position.x * look_cos + position.y * look_sin,
            angle_rad: velocity.y.atan2(velocity.x),
            density_ratio,
            drag: density_ratio * velocity_fps * props.standard_drag(mach),
            energy_ftlb: props.weight_gr * velocity_fps * velocity_fps / ENERGY_DENOMINATOR,
            ogw_lb: props.weight_gr * props.weight_gr
                * velocity_fps.powi(3)
                * OGW_COEFFICIENT,
            flag,
        }
    }
}
