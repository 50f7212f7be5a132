//! Adaptive-step integration on an embedded Dormand-Prince 5(4) pair.
//!
//! Unlike the fixed-step methods, this solver controls its own step size
//! from a per-step error estimate, keeps a cubic Hermite dense output for
//! every accepted segment, and locates terminal conditions and row sample
//! points by root finding on that dense output instead of stepping onto
//! them. State is packed `[x, y, z, vx, vy, vz]`.

use nalgebra::Vector3;

use crate::config::EngineConfig;
use crate::constants::MAX_INTEGRATION_STEPS;
use crate::engine::Termination;
use crate::shot::ShotProps;
use crate::trajectory_data::{TrajFlag, TrajectoryData};

const RK45_RTOL: f64 = 1.0e-8;
const RK45_ATOL: f64 = 1.0e-6;
const SAFETY_FACTOR: f64 = 0.9;
const MIN_STEP_FACTOR: f64 = 0.2;
const MAX_STEP_FACTOR: f64 = 10.0;
// Segment cap keeps endpoint sign checks from straddling two event crossings.
const MAX_SEGMENT_S: f64 = 0.05;
const MIN_STEP_S: f64 = 1.0e-12;
const ROOT_TOLERANCE_S: f64 = 1.0e-10;
const ROOT_MAX_ITERATIONS: usize = 100;

// Dormand-Prince 5(4) tableau. The fifth-order weights are the last stage
// row, so the pair is first-same-as-last: the derivative at an accepted
// endpoint seeds the next step for free.
const A2: [f64; 1] = [1.0 / 5.0];
const A3: [f64; 2] = [3.0 / 40.0, 9.0 / 40.0];
const A4: [f64; 3] = [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0];
const A5: [f64; 4] = [
    19372.0 / 6561.0,
    -25360.0 / 2187.0,
    64448.0 / 6561.0,
    -212.0 / 729.0,
];
const A6: [f64; 5] = [
    9017.0 / 3168.0,
    -355.0 / 33.0,
    46732.0 / 5247.0,
    49.0 / 176.0,
    -5103.0 / 18656.0,
];
const B5: [f64; 6] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];
const B4: [f64; 7] = [
    5179.0 / 57600.0,
    0.0,
    7571.0 / 16695.0,
    393.0 / 640.0,
    -92097.0 / 339200.0,
    187.0 / 2100.0,
    1.0 / 40.0,
];

type State = [f64; 6];

/// One accepted step with enough data for cubic Hermite interpolation.
struct DenseSegment {
    t0: f64,
    h: f64,
    y0: State,
    y1: State,
    f0: State,
    f1: State,
}

impl DenseSegment {
    fn t1(&self) -> f64 {
        self.t0 + self.h
    }

    fn eval(&self, t: f64) -> State {
        let s = ((t - self.t0) / self.h).clamp(0.0, 1.0);
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;
        let mut out = [0.0; 6];
        for i in 0..6 {
            out[i] = h00 * self.y0[i]
                + h10 * self.h * self.f0[i]
                + h01 * self.y1[i]
                + h11 * self.h * self.f1[i];
        }
        out
    }
}

fn weighted_update(y: &State, h: f64, stages: &[&State], coefficients: &[f64]) -> State {
    let mut out = *y;
    for (stage, c) in stages.iter().zip(coefficients) {
        for i in 0..6 {
            out[i] += h * c * stage[i];
        }
    }
    out
}

fn speed(state: &State) -> f64 {
    (state[3] * state[3] + state[4] * state[4] + state[5] * state[5]).sqrt()
}

/// Brent's method on a bracketing interval. Returns `None` when the bracket
/// has no sign change or the iteration cap is hit.
fn brent_root<F>(f: F, mut a: f64, mut b: f64, tolerance: f64, max_iterations: usize) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    let mut fa = f(a);
    let mut fb = f(b);
    if fa * fb > 0.0 {
        return None;
    }
    if fa.abs() < fb.abs() {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }

    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut e = d;

    for _ in 0..max_iterations {
        if fb.abs() < tolerance {
            return Some(b);
        }
        if fa.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tolerance_scaled = 2.0 * f64::EPSILON * b.abs() + 0.5 * tolerance;
        let m = 0.5 * (c - b);
        if m.abs() <= tolerance_scaled {
            return Some(b);
        }

        if e.abs() >= tolerance_scaled && fc.abs() > fb.abs() {
            let s = fb / fc;
            let mut p;
            let mut q;
            if (a - c).abs() < f64::EPSILON {
                p = 2.0 * m * s;
                q = 1.0 - s;
            } else {
                q = fc / fa;
                let r = fb / fa;
                p = s * (2.0 * m * q * (q - r) - (b - a) * (r - 1.0));
                q = (q - 1.0) * (r - 1.0) * (s - 1.0);
            }
            if p > 0.0 {
                q = -q;
            } else {
                p = -p;
            }
            let previous = e;
            e = d;
            if 2.0 * p < 3.0 * m * q - (tolerance_scaled * q).abs() && p < (0.5 * previous * q).abs()
            {
                d = p / q;
            } else {
                d = m;
                e = d;
            }
        } else {
            d = m;
            e = d;
        }

        a = b;
        fa = fb;
        if d.abs() > tolerance_scaled {
            b += d;
        } else if m > 0.0 {
            b += tolerance_scaled;
        } else {
            b -= tolerance_scaled;
        }
        fb = f(b);

        if fc * fb > 0.0 {
            c = a;
            fc = fa;
            e = b - a;
            d = e;
        }
    }
    None
}

/// Integrates a shot with adaptive stepping. Same driver contract as the
/// fixed-step engines: rows out, termination reason back.
pub(crate) fn integrate(
    props: &ShotProps,
    config: &EngineConfig,
    max_range_ft: f64,
    range_step_ft: f64,
    time_step_s: f64,
    filter_flags: TrajFlag,
) -> (Vec<TrajectoryData>, Termination) {
    let gravity = Vector3::new(0.0, config.gravity_fps2, 0.0);
    let wind_sock = props.wind_sock();
    let derivative = |state: &State| -> State {
        let velocity = Vector3::new(state[3], state[4], state[5]);
        let wind = wind_sock.vector_for_range_stateless(state[0]);
        let (density_ratio, mach_fps) = props.density_and_mach(props.alt0_ft + state[1]);
        let relative = velocity - wind;
        let relative_speed = relative.norm();
        let km = density_ratio * props.standard_drag(relative_speed / mach_fps);
        let mut acceleration = gravity - relative * (km * relative_speed);
        if let Some(coriolis) = &props.coriolis {
            acceleration += coriolis.acceleration(&velocity);
        }
        [
            state[3],
            state[4],
            state[5],
            acceleration.x,
            acceleration.y,
            acceleration.z,
        ]
    };

    let initial_position = props.initial_position();
    let initial_velocity = props.initial_velocity();
    let mut t = 0.0;
    let mut y: State = [
        initial_position.x,
        initial_position.y,
        initial_position.z,
        initial_velocity.x,
        initial_velocity.y,
        initial_velocity.z,
    ];
    let mut f = derivative(&y);
    let mut h = (props.calc_step_ft / speed(&y).max(1.0)).min(MAX_SEGMENT_S);

    let max_drop_threshold_ft = config.max_drop_ft + y[1].max(0.0);
    let look_tangent = props.look_angle_rad.tan();
    let slant_offset = |state: &State| state[1] - state[0] * look_tangent;
    let mach_excess = |state: &State| {
        let (_, mach_fps) = props.density_and_mach(props.alt0_ft + state[1]);
        speed(state) / mach_fps - 1.0
    };

    let wants_range = filter_flags.intersects(TrajFlag::RANGE) && range_step_ft > 0.0;
    let wants_time = filter_flags.intersects(TrajFlag::RANGE) && time_step_s > 0.0;
    let mut next_record_distance_ft = 0.0;
    let mut previous_sample_time_s = 0.0;
    let mut seen_zero = TrajFlag::NONE;
    if y[1] >= 0.0 {
        seen_zero |= TrajFlag::ZERO_UP;
    } else if props.barrel_elevation_rad < props.look_angle_rad {
        seen_zero |= TrajFlag::ZERO_DOWN;
    }
    let mut seen_mach = false;
    let mut seen_apex = false;

    let mut raw_rows: Vec<(f64, State, TrajFlag)> = Vec::new();
    if wants_range || wants_time {
        raw_rows.push((0.0, y, TrajFlag::RANGE));
        next_record_distance_ft = range_step_ft;
    }

    let termination = if speed(&y) < config.min_velocity_fps {
        Termination::MinVelocity
    } else {
        let mut attempts = 0usize;
        loop {
            if attempts >= MAX_INTEGRATION_STEPS {
                tracing::warn!(
                    "adaptive step cap hit after {} attempts at x = {:.1} ft",
                    attempts,
                    y[0]
                );
                break Termination::StepLimit;
            }
            attempts += 1;

            let k1 = f;
            let k2 = derivative(&weighted_update(&y, h, &[&k1], &A2));
            let k3 = derivative(&weighted_update(&y, h, &[&k1, &k2], &A3));
            let k4 = derivative(&weighted_update(&y, h, &[&k1, &k2, &k3], &A4));
            let k5 = derivative(&weighted_update(&y, h, &[&k1, &k2, &k3, &k4], &A5));
            let k6 = derivative(&weighted_update(&y, h, &[&k1, &k2, &k3, &k4, &k5], &A6));
            let y_new = weighted_update(&y, h, &[&k1, &k2, &k3, &k4, &k5, &k6], &B5);
            let k7 = derivative(&y_new);
            let y_fourth = weighted_update(&y, h, &[&k1, &k2, &k3, &k4, &k5, &k6, &k7], &B4);

            let mut error_sq = 0.0;
            for i in 0..6 {
                let scale = RK45_ATOL + RK45_RTOL * y[i].abs().max(y_new[i].abs());
                let e = (y_new[i] - y_fourth[i]) / scale;
                error_sq += e * e;
            }
            let error_norm = (error_sq / 6.0).sqrt();

            if error_norm > 1.0 && h > MIN_STEP_S {
                let factor = (SAFETY_FACTOR * error_norm.powf(-0.2)).max(MIN_STEP_FACTOR);
                h = (h * factor).max(MIN_STEP_S);
                continue;
            }

            let segment = DenseSegment {
                t0: t,
                h,
                y0: y,
                y1: y_new,
                f0: k1,
                f1: k7,
            };

            // terminal events, earliest crossing wins
            let mut terminal_candidates: Vec<(f64, Termination)> = Vec::new();
            if segment.y1[0] > max_range_ft {
                let t_star = if segment.y0[0] >= max_range_ft {
                    segment.t0
                } else {
                    brent_root(
                        |t| segment.eval(t)[0] - max_range_ft,
                        segment.t0,
                        segment.t1(),
                        ROOT_TOLERANCE_S,
                        ROOT_MAX_ITERATIONS,
                    )
                    .unwrap_or_else(|| segment.t1())
                };
                terminal_candidates.push((t_star, Termination::MaxRange));
            }
            if segment.y1[1] < max_drop_threshold_ft {
                let t_star = if segment.y0[1] < max_drop_threshold_ft {
                    segment.t0
                } else {
                    brent_root(
                        |t| segment.eval(t)[1] - max_drop_threshold_ft,
                        segment.t0,
                        segment.t1(),
                        ROOT_TOLERANCE_S,
                        ROOT_MAX_ITERATIONS,
                    )
                    .unwrap_or_else(|| segment.t1())
                };
                terminal_candidates.push((t_star, Termination::MaxDrop));
            }
            if speed(&segment.y1) < config.min_velocity_fps {
                let t_star = if speed(&segment.y0) < config.min_velocity_fps {
                    segment.t0
                } else {
                    brent_root(
                        |t| speed(&segment.eval(t)) - config.min_velocity_fps,
                        segment.t0,
                        segment.t1(),
                        ROOT_TOLERANCE_S,
                        ROOT_MAX_ITERATIONS,
                    )
                    .unwrap_or_else(|| segment.t1())
                };
                terminal_candidates.push((t_star, Termination::MinVelocity));
            }
            if terminal_candidates.is_empty()
                && props.alt0_ft + segment.y1[1] < config.min_altitude_ft
                && segment.y1[4] <= 0.0
            {
                terminal_candidates.push((segment.t1(), Termination::MinAltitude));
            }

            let terminal = terminal_candidates
                .into_iter()
                .min_by(|left, right| left.0.partial_cmp(&right.0).expect("finite times"));
            let (t_limit, reason) = match terminal {
                Some((t_star, reason)) => (t_star, Some(reason)),
                None => (segment.t1(), None),
            };
            let y_limit = if reason.is_some() {
                segment.eval(t_limit)
            } else {
                y_new
            };

            if wants_range {
                while next_record_distance_ft <= y_limit[0]
                    && next_record_distance_ft <= max_range_ft
                {
                    let d = next_record_distance_ft;
                    let t_d = brent_root(
                        |t| segment.eval(t)[0] - d,
                        segment.t0,
                        t_limit,
                        ROOT_TOLERANCE_S,
                        ROOT_MAX_ITERATIONS,
                    )
                    .unwrap_or(t_limit);
                    raw_rows.push((t_d, segment.eval(t_d), TrajFlag::RANGE));
                    previous_sample_time_s = t_d;
                    next_record_distance_ft += range_step_ft;
                }
            }
            if wants_time {
                while previous_sample_time_s + time_step_s <= t_limit {
                    let t_s = previous_sample_time_s + time_step_s;
                    raw_rows.push((t_s, segment.eval(t_s), TrajFlag::RANGE));
                    previous_sample_time_s = t_s;
                }
            }

            if filter_flags.intersects(TrajFlag::ZERO) {
                let g0 = slant_offset(&segment.y0);
                let g1 = slant_offset(&y_limit);
                if !seen_zero.intersects(TrajFlag::ZERO_UP) {
                    if g0 < 0.0 && g1 >= 0.0 {
                        let t_star =
                            brent_root(
                                |t| slant_offset(&segment.eval(t)),
                                segment.t0,
                                t_limit,
                                ROOT_TOLERANCE_S,
                                ROOT_MAX_ITERATIONS,
                            )
                            .unwrap_or(t_limit);
                        raw_rows.push((t_star, segment.eval(t_star), TrajFlag::ZERO_UP));
                        seen_zero |= TrajFlag::ZERO_UP;
                    }
                } else if !seen_zero.intersects(TrajFlag::ZERO_DOWN) && g0 >= 0.0 && g1 < 0.0 {
                    let t_star = brent_root(
                        |t| slant_offset(&segment.eval(t)),
                        segment.t0,
                        t_limit,
                        ROOT_TOLERANCE_S,
                        ROOT_MAX_ITERATIONS,
                    )
                    .unwrap_or(t_limit);
                    raw_rows.push((t_star, segment.eval(t_star), TrajFlag::ZERO_DOWN));
                    seen_zero |= TrajFlag::ZERO_DOWN;
                }
            }
            if filter_flags.intersects(TrajFlag::MACH) && !seen_mach {
                let g0 = mach_excess(&segment.y0);
                let g1 = mach_excess(&y_limit);
                if g0 >= 0.0 && g1 < 0.0 {
                    let t_star = brent_root(
                        |t| mach_excess(&segment.eval(t)),
                        segment.t0,
                        t_limit,
                        ROOT_TOLERANCE_S,
                        ROOT_MAX_ITERATIONS,
                    )
                    .unwrap_or(t_limit);
                    raw_rows.push((t_star, segment.eval(t_star), TrajFlag::MACH));
                    seen_mach = true;
                }
            }
            if filter_flags.intersects(TrajFlag::APEX)
                && !seen_apex
                && segment.y0[4] > 0.0
                && y_limit[4] <= 0.0
            {
                let t_star = brent_root(
                    |t| segment.eval(t)[4],
                    segment.t0,
                    t_limit,
                    ROOT_TOLERANCE_S,
                    ROOT_MAX_ITERATIONS,
                )
                .unwrap_or(t_limit);
                raw_rows.push((t_star, segment.eval(t_star), TrajFlag::APEX));
                seen_apex = true;
            }

            if let Some(reason) = reason {
                t = t_limit;
                y = y_limit;
                break reason;
            }

            t = segment.t1();
            y = y_new;
            f = k7;
            let factor = if error_norm > f64::EPSILON {
                (SAFETY_FACTOR * error_norm.powf(-0.2)).clamp(MIN_STEP_FACTOR, MAX_STEP_FACTOR)
            } else {
                MAX_STEP_FACTOR
            };
            h = (h * factor).min(MAX_SEGMENT_S).max(MIN_STEP_S);
        }
    };

    raw_rows.sort_by(|left, right| left.0.partial_cmp(&right.0).expect("finite times"));
    let mut rows: Vec<TrajectoryData> = Vec::with_capacity(raw_rows.len());
    let mut pending: Option<(f64, State, TrajFlag)> = None;
    for (time_s, state, flag) in raw_rows {
        if let Some(entry) = pending.as_mut() {
            if (entry.0 - time_s).abs() < 1.0e-9 {
                entry.2 |= flag;
                continue;
            }
        }
        if let Some((merged_time, merged_state, merged_flag)) = pending.take() {
            rows.push(make_row(props, merged_time, &merged_state, merged_flag));
        }
        pending = Some((time_s, state, flag));
    }
    if let Some((merged_time, merged_state, merged_flag)) = pending {
        rows.push(make_row(props, merged_time, &merged_state, merged_flag));
    }

    let terminal_already_recorded = rows
        .last()
        .map(|row| (row.time_s - t).abs() < 1.0e-9)
        .unwrap_or(false);
    if rows.len() < 2 && !terminal_already_recorded {
        rows.push(make_row(props, t, &y, TrajFlag::NONE));
    }
    (rows, termination)
}

fn make_row(props: &ShotProps, time_s: f64, state: &State, flag: TrajFlag) -> TrajectoryData {
    let position = Vector3::new(state[0], state[1], state[2]);
    let velocity = Vector3::new(state[3], state[4], state[5]);
    TrajectoryData::from_props(props, time_s, &position, &velocity, flag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{IntegrationMethod, TrajectoryEngine};
    use crate::error::RangeErrorReason;
    use crate::shot::{Ammo, DragModel, Shot, Weapon};

    fn standard_shot() -> Shot {
        let weapon = Weapon::new(2.0 / 12.0, 12.0);
        let ammo = Ammo::new(DragModel::g1(0.223, 168.0, 0.308, 1.18), 2750.0);
        let mut shot = Shot::new(weapon, ammo);
        shot.relative_angle_rad = 0.001228;
        shot
    }

    #[test]
    fn test_brent_finds_quadratic_root() {
        let f = |x: f64| x * x - 4.0;
        let root = brent_root(f, 1.0, 3.0, 1e-9, 100).expect("bracketed");
        assert!((root - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_brent_rejects_unbracketed_interval() {
        let f = |x: f64| x * x + 1.0;
        assert!(brent_root(f, -1.0, 1.0, 1e-9, 100).is_none());
    }

    #[test]
    fn test_dense_output_matches_endpoints() {
        let segment = DenseSegment {
            t0: 1.0,
            h: 0.5,
            y0: [0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            y1: [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            f0: [2.0, 2.0, 2.0, 2.0, 2.0, 2.0],
            f1: [2.0, 2.0, 2.0, 2.0, 2.0, 2.0],
        };
        let start = segment.eval(1.0);
        let end = segment.eval(1.5);
        for i in 0..6 {
            assert!((start[i] - segment.y0[i]).abs() < 1e-12);
            assert!((end[i] - segment.y1[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_matches_runge_kutta() {
        let adaptive = TrajectoryEngine::new(IntegrationMethod::AdaptiveRk45);
        let fixed = TrajectoryEngine::new(IntegrationMethod::RungeKutta4);
        let mut velocities = Vec::new();
        for engine in [&adaptive, &fixed] {
            let hit = engine
                .integrate(&standard_shot(), 950.0, 900.0, 0.0, TrajFlag::RANGE, true)
                .expect("well within limits");
            let row = hit
                .rows()
                .iter()
                .find(|r| (r.distance_ft - 900.0).abs() < 1e-6)
                .expect("sample at 900 ft");
            velocities.push(row.velocity_fps);
        }
        let relative = (velocities[0] - velocities[1]).abs() / velocities[1];
        assert!(relative < 0.01, "velocities diverge: {velocities:?}");
    }

    #[test]
    fn test_samples_land_exactly_on_boundaries() {
        let engine = TrajectoryEngine::new(IntegrationMethod::AdaptiveRk45);
        let hit = engine
            .integrate(&standard_shot(), 1500.0, 300.0, 0.0, TrajFlag::RANGE, true)
            .expect("well within limits");
        let range_rows: Vec<_> = hit
            .rows()
            .iter()
            .filter(|r| r.flag.intersects(TrajFlag::RANGE))
            .collect();
        assert_eq!(range_rows.len(), 6);
        for (i, row) in range_rows.iter().enumerate() {
            assert!(
                (row.distance_ft - i as f64 * 300.0).abs() < 1e-6,
                "row {} at {}",
                i,
                row.distance_ft
            );
        }
    }

    #[test]
    fn test_event_flags_on_arcing_shot() {
        let weapon = Weapon::new(2.0 / 12.0, 12.0);
        let ammo = Ammo::new(DragModel::g1(0.223, 168.0, 0.308, 1.18), 2750.0);
        let mut shot = Shot::new(weapon, ammo);
        shot.relative_angle_rad = 0.05;
        let engine = TrajectoryEngine::new(IntegrationMethod::AdaptiveRk45);
        let hit = engine
            .integrate(&shot, 12000.0, 0.0, 0.0, TrajFlag::ALL, false)
            .expect("error would be embedded");

        let ups: Vec<_> = hit.flagged(TrajFlag::ZERO_UP);
        let downs: Vec<_> = hit.flagged(TrajFlag::ZERO_DOWN);
        let apexes: Vec<_> = hit.flagged(TrajFlag::APEX);
        let machs: Vec<_> = hit.flagged(TrajFlag::MACH);
        assert_eq!(ups.len(), 1);
        assert_eq!(downs.len(), 1);
        assert_eq!(apexes.len(), 1);
        assert_eq!(machs.len(), 1);
        assert!(ups[0].time_s < apexes[0].time_s);
        assert!(apexes[0].time_s < downs[0].time_s);
        assert!((machs[0].mach - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_velocity_terminates_immediately() {
        let weapon = Weapon::new(2.0 / 12.0, 12.0);
        let ammo = Ammo::new(DragModel::g1(0.223, 168.0, 0.308, 1.18), 0.0);
        let shot = Shot::new(weapon, ammo);
        let engine = TrajectoryEngine::new(IntegrationMethod::AdaptiveRk45);
        let hit = engine
            .integrate(&shot, 3000.0, 100.0, 0.0, TrajFlag::ALL, false)
            .expect("error is embedded instead");
        let error = hit.error().expect("cannot fly at rest");
        assert_eq!(error.reason, RangeErrorReason::MinimumVelocityReached);
        assert!(!hit.rows().is_empty());
    }
}
