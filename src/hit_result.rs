//! Simulation output: the recorded rows, the shot snapshot they were
//! produced from, and the early-termination error when the trajectory
//! did not reach the requested range.

use std::fmt;

use crate::error::{Error, RangeError};
use crate::interpolation::{interpolate_2_pt, interpolate_3_pt};
use crate::shot::ShotProps;
use crate::trajectory_data::{TrajFlag, TrajectoryData};

/// Outcome of one integration pass.
///
/// Rows are strictly ascending in time. When integration stopped early the
/// error rides along here instead of discarding the reachable part, unless
/// the caller asked for it to be raised.
#[derive(Debug, Clone)]
pub struct HitResult {
    props: ShotProps,
    rows: Vec<TrajectoryData>,
    error: Option<RangeError>,
}

/// Downrange interval over which the arc stays inside a target's vertical
/// extent centered on the aim point. Bounds are snapped to recorded rows,
/// so their resolution is the recording step.
#[derive(Debug, Clone)]
pub struct DangerSpace {
    pub at_distance_ft: f64,
    pub target_height_ft: f64,
    pub begin_ft: f64,
    pub end_ft: f64,
}

impl fmt::Display for DangerSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "danger space for a {:.1} ft target at {:.0} ft: {:.0} ft to {:.0} ft",
            self.target_height_ft, self.at_distance_ft, self.begin_ft, self.end_ft
        )
    }
}

impl HitResult {
    pub fn new(props: ShotProps, rows: Vec<TrajectoryData>, error: Option<RangeError>) -> Self {
        HitResult { props, rows, error }
    }

    pub fn rows(&self) -> &[TrajectoryData] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<TrajectoryData> {
        self.rows
    }

    /// Shot snapshot the rows were integrated from.
    pub fn props(&self) -> &ShotProps {
        &self.props
    }

    /// Termination error for an incomplete trajectory, if any.
    pub fn error(&self) -> Option<&RangeError> {
        self.error.as_ref()
    }

    /// First row carrying any bit of `flag`.
    pub fn flag(&self, flag: TrajFlag) -> Option<&TrajectoryData> {
        self.rows.iter().find(|row| row.flag.intersects(flag))
    }

    /// Every row carrying any bit of `flag`, in time order.
    pub fn flagged(&self, flag: TrajFlag) -> Vec<&TrajectoryData> {
        self.rows
            .iter()
            .filter(|row| row.flag.intersects(flag))
            .collect()
    }

    /// Sight line crossings recorded in this pass.
    pub fn zeros(&self) -> Vec<&TrajectoryData> {
        self.flagged(TrajFlag::ZERO)
    }

    /// Synthesizes the row at an exact horizontal distance by monotone
    /// interpolation over the recorded neighbors.
    ///
    /// Requires at least two rows and a lookup inside the recorded span.
    /// Repeated key values (a vertical shot queried by distance) surface as
    /// `Error::DivideByZero` rather than a fabricated row.
    pub fn get_at_distance(&self, distance_ft: f64) -> Result<TrajectoryData, Error> {
        self.get_at(|row| row.distance_ft, distance_ft)
    }

    /// Synthesizes the row at an exact flight time. Same rules as
    /// [`Self::get_at_distance`] with time as the key.
    pub fn get_at_time(&self, time_s: f64) -> Result<TrajectoryData, Error> {
        self.get_at(|row| row.time_s, time_s)
    }

    fn get_at(
        &self,
        key: fn(&TrajectoryData) -> f64,
        x: f64,
    ) -> Result<TrajectoryData, Error> {
        if self.rows.len() < 2 {
            return Err(Error::InvalidState(
                "at least two trajectory rows are needed for interpolation".to_string(),
            ));
        }
        let first = key(&self.rows[0]);
        let last = key(&self.rows[self.rows.len() - 1]);
        if x < first.min(last) || x > first.max(last) {
            return Err(Error::InvalidInput(format!(
                "lookup key {} outside the recorded span {}..{}",
                x, first, last
            )));
        }

        let idx = self.rows.partition_point(|row| key(row) < x);
        let window = if self.rows.len() == 2 {
            &self.rows[..]
        } else if idx <= 1 {
            &self.rows[..3]
        } else if idx >= self.rows.len() - 1 {
            &self.rows[self.rows.len() - 3..]
        } else {
            &self.rows[idx - 1..idx + 2]
        };
        interpolate_window(x, key, window)
    }

    /// Interval around `at_slant_distance_ft` over which the arc would hit
    /// a target `target_height_ft` tall centered at the aim height.
    ///
    /// # Arguments
    /// * `at_slant_distance_ft` - aim distance along the sight line
    /// * `target_height_ft` - vertical extent of the target
    pub fn danger_space(
        &self,
        at_slant_distance_ft: f64,
        target_height_ft: f64,
    ) -> Result<DangerSpace, Error> {
        if target_height_ft <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "target height must be positive, got {}",
                target_height_ft
            )));
        }
        let (index, center) = self
            .rows
            .iter()
            .enumerate()
            .min_by(|(_, left), (_, right)| {
                let dl = (left.slant_distance_ft - at_slant_distance_ft).abs();
                let dr = (right.slant_distance_ft - at_slant_distance_ft).abs();
                dl.partial_cmp(&dr).expect("finite slant distances")
            })
            .ok_or_else(|| Error::InvalidState("empty trajectory".to_string()))?;

        let half_ft = target_height_ft / 2.0;
        let begin_ft = self.rows[..index]
            .iter()
            .rev()
            .find(|row| row.slant_height_ft - center.slant_height_ft >= half_ft)
            .map_or(self.rows[0].slant_distance_ft, |row| row.slant_distance_ft);
        let end_ft = self.rows[index + 1..]
            .iter()
            .find(|row| center.slant_height_ft - row.slant_height_ft >= half_ft)
            .map_or(self.rows[self.rows.len() - 1].slant_distance_ft, |row| {
                row.slant_distance_ft
            });
        Ok(DangerSpace {
            at_distance_ft: center.slant_distance_ft,
            target_height_ft,
            begin_ft,
            end_ft,
        })
    }
}

/// Builds a full synthetic row at `x` from a window of two or three
/// recorded neighbors, interpolating every numeric column.
fn interpolate_window(
    x: f64,
    key: fn(&TrajectoryData) -> f64,
    window: &[TrajectoryData],
) -> Result<TrajectoryData, Error> {
    let field = |select: fn(&TrajectoryData) -> f64| -> Result<f64, Error> {
        if window.len() >= 3 {
            interpolate_3_pt(
                x,
                key(&window[0]),
                select(&window[0]),
                key(&window[1]),
                select(&window[1]),
                key(&window[2]),
                select(&window[2]),
            )
        } else {
            interpolate_2_pt(
                x,
                key(&window[0]),
                select(&window[0]),
                key(&window[1]),
                select(&window[1]),
            )
        }
    };
    Ok(TrajectoryData {
        time_s: field(|r| r.time_s)?,
        distance_ft: field(|r| r.distance_ft)?,
        velocity_fps: field(|r| r.velocity_fps)?,
        mach: field(|r| r.mach)?,
        height_ft: field(|r| r.height_ft)?,
        slant_height_ft: field(|r| r.slant_height_ft)?,
        drop_adj_rad: field(|r| r.drop_adj_rad)?,
        windage_ft: field(|r| r.windage_ft)?,
        windage_adj_rad: field(|r| r.windage_adj_rad)?,
        slant_distance_ft: field(|r| r.slant_distance_ft)?,
        angle_rad: field(|r| r.angle_rad)?,
        density_ratio: field(|r| r.density_ratio)?,
        drag: field(|r| r.drag)?,
        energy_ftlb: field(|r| r.energy_ftlb)?,
        ogw_lb: field(|r| r.ogw_lb)?,
        flag: TrajFlag::NONE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{IntegrationMethod, TrajectoryEngine};
    use crate::shot::{Ammo, DragModel, Shot, Weapon};

    fn standard_shot() -> Shot {
        let weapon = Weapon::new(2.0 / 12.0, 12.0);
        let ammo = Ammo::new(DragModel::g1(0.223, 168.0, 0.308, 1.18), 2750.0);
        let mut shot = Shot::new(weapon, ammo);
        shot.relative_angle_rad = 0.001228;
        shot
    }

    fn sampled_hit() -> HitResult {
        TrajectoryEngine::new(IntegrationMethod::RungeKutta4)
            .integrate(&standard_shot(), 3000.0, 100.0, 0.0, TrajFlag::RANGE, true)
            .expect("well within limits")
    }

    #[test]
    fn test_get_at_distance_reproduces_recorded_row() {
        let hit = sampled_hit();
        let recorded = hit
            .rows()
            .iter()
            .find(|r| (r.distance_ft - 900.0).abs() < 1e-6)
            .expect("sample at 900 ft");
        let synthesized = hit.get_at_distance(900.0).expect("inside the span");
        assert!((synthesized.velocity_fps - recorded.velocity_fps).abs() < 1e-9);
        assert!((synthesized.height_ft - recorded.height_ft).abs() < 1e-9);
        assert!((synthesized.time_s - recorded.time_s).abs() < 1e-12);
        assert!(synthesized.flag.is_empty());
    }

    #[test]
    fn test_get_at_distance_between_rows_is_bounded() {
        let hit = sampled_hit();
        let before = hit.get_at_distance(400.0).expect("inside the span");
        let row = hit.get_at_distance(450.0).expect("inside the span");
        let after = hit.get_at_distance(500.0).expect("inside the span");
        // velocity decays monotonically, the interpolant must not overshoot
        assert!(row.velocity_fps < before.velocity_fps);
        assert!(row.velocity_fps > after.velocity_fps);
        assert!(row.time_s > before.time_s && row.time_s < after.time_s);
    }

    #[test]
    fn test_get_at_time_interpolates() {
        let hit = sampled_hit();
        let rows = hit.rows();
        let mid = 0.5 * (rows[1].time_s + rows[2].time_s);
        let row = hit.get_at_time(mid).expect("inside the span");
        assert!(row.distance_ft > rows[1].distance_ft);
        assert!(row.distance_ft < rows[2].distance_ft);
    }

    #[test]
    fn test_lookup_outside_span_errors() {
        let hit = sampled_hit();
        assert!(matches!(
            hit.get_at_distance(1.0e6),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(hit.get_at_time(-1.0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_flag_queries_on_arcing_shot() {
        let weapon = Weapon::new(2.0 / 12.0, 12.0);
        let ammo = Ammo::new(DragModel::g1(0.223, 168.0, 0.308, 1.18), 2750.0);
        let mut shot = Shot::new(weapon, ammo);
        shot.relative_angle_rad = 0.05;
        let hit = TrajectoryEngine::new(IntegrationMethod::RungeKutta4)
            .integrate(&shot, 12_000.0, 0.0, 0.0, TrajFlag::ALL, false)
            .expect("error is embedded instead");

        let apex = hit.flag(TrajFlag::APEX).expect("arc has an apex");
        let zeros = hit.zeros();
        assert!(!zeros.is_empty());
        assert!(zeros[0].flag.intersects(TrajFlag::ZERO_UP));
        assert!(zeros[0].time_s < apex.time_s);
        assert_eq!(hit.flagged(TrajFlag::APEX).len(), 1);
    }

    #[test]
    fn test_danger_space_brackets_the_aim_point() {
        let hit = sampled_hit();
        let danger = hit.danger_space(1800.0, 3.0).expect("rows cover 1800 ft");
        assert!(danger.begin_ft < 1800.0, "begin: {}", danger.begin_ft);
        assert!(danger.end_ft > 1800.0, "end: {}", danger.end_ft);
        assert!(danger.begin_ft > 0.0);
        assert!(danger.end_ft < 3000.0);
        let shown = danger.to_string();
        assert!(shown.contains("danger space"), "display: {shown}");
    }

    #[test]
    fn test_danger_space_rejects_flat_target() {
        let hit = sampled_hit();
        assert!(matches!(
            hit.danger_space(1800.0, 0.0),
            Err(Error::InvalidInput(_))
        ));
    }
}
