//! Trajectory integration engines.
//!
//! Three fixed-step methods share one driver loop and one recording filter;
//! the adaptive method delegates to [`crate::adaptive`]. All of them advance
//! a point-mass state (time, position, velocity) under gravity, aerodynamic
//! drag, wind, and optionally Coriolis acceleration, in the shooter-local
//! frame: x downrange, y up, z to the shooter's right, feet and seconds.

use nalgebra::Vector3;

use crate::adaptive;
use crate::config::EngineConfig;
use crate::constants::{MAX_CALC_STEP_FT, MAX_INTEGRATION_STEPS, VERLET_STEP_SCALE};
use crate::error::{Error, RangeError, RangeErrorReason};
use crate::hit_result::HitResult;
use crate::recording::TrajectoryRecorder;
use crate::shot::{Shot, ShotProps};
use crate::trajectory_data::{TrajFlag, TrajectoryData};

/// Stepping algorithm used by [`TrajectoryEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrationMethod {
    /// Semi-implicit first order step, cheapest per evaluation.
    Euler,
    /// Classic fourth order Runge-Kutta with a step-frozen drag coefficient.
    #[default]
    RungeKutta4,
    /// Velocity Verlet. Better long-run energy behavior at a smaller step.
    VelocityVerlet,
    /// Embedded Dormand-Prince 5(4) pair with adaptive step control.
    AdaptiveRk45,
}

impl IntegrationMethod {
    /// Base spatial step in feet, before the per-step velocity scaling.
    ///
    /// The square-root scaling for Runge-Kutta is an empirical carry-over
    /// without a derived justification; it sets the drag-update granularity
    /// that method needs. Verlet runs at a fifth of the Euler step.
    fn base_step_ft(&self, props: &ShotProps) -> f64 {
        match self {
            IntegrationMethod::RungeKutta4 => props.calc_step_ft.sqrt().min(MAX_CALC_STEP_FT),
            IntegrationMethod::VelocityVerlet => VERLET_STEP_SCALE * props.calc_step_ft,
            _ => props.calc_step_ft,
        }
    }
}

/// Why the stepping loop stopped.
///
/// A run passes through three phases: initialized (state set from the shot),
/// stepping, terminated. This is the terminal phase's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Termination {
    MaxRange,
    MinVelocity,
    MaxDrop,
    MinAltitude,
    StepLimit,
}

impl Termination {
    /// Reasons that make the trajectory incomplete. Reaching the requested
    /// range is success, and the step cap is a loop bound rather than a
    /// physical limit, so neither maps to an error.
    pub(crate) fn range_error_reason(&self) -> Option<RangeErrorReason> {
        match self {
            Termination::MinVelocity => Some(RangeErrorReason::MinimumVelocityReached),
            Termination::MaxDrop => Some(RangeErrorReason::MaximumDropReached),
            Termination::MinAltitude => Some(RangeErrorReason::MinimumAltitudeReached),
            Termination::MaxRange | Termination::StepLimit => None,
        }
    }
}

/// Trajectory simulation entry point, also hosting the root finders built
/// on top of `integrate`.
#[derive(Debug, Clone)]
pub struct TrajectoryEngine {
    pub method: IntegrationMethod,
    pub config: EngineConfig,
}

impl TrajectoryEngine {
    pub fn new(method: IntegrationMethod) -> Self {
        TrajectoryEngine::with_config(method, EngineConfig::default())
    }

    pub fn with_config(method: IntegrationMethod, config: EngineConfig) -> Self {
        TrajectoryEngine { method, config }
    }

    /// Simulates one shot out to `max_range_ft`.
    ///
    /// # Arguments
    /// * `shot` - full shot description in internal units
    /// * `max_range_ft` - horizontal distance at which integration stops
    /// * `range_step_ft` - distance sampling interval for RANGE rows, zero
    ///   disables distance sampling
    /// * `time_step_s` - fallback sampling interval, zero disables it
    /// * `filter_flags` - which row kinds to record
    /// * `raise_range_error` - when true, an incomplete trajectory returns
    ///   `Error::Range` instead of a `HitResult` with the error attached;
    ///   the partial rows ride along in either case
    pub fn integrate(
        &self,
        shot: &Shot,
        max_range_ft: f64,
        range_step_ft: f64,
        time_step_s: f64,
        filter_flags: TrajFlag,
        raise_range_error: bool,
    ) -> Result<HitResult, Error> {
        let props = ShotProps::from_shot(shot, &self.config)?;
        let (rows, error) =
            self.integrate_props(&props, max_range_ft, range_step_ft, time_step_s, filter_flags);
        if raise_range_error {
            if let Some(error) = error {
                return Err(Error::Range(error));
            }
        }
        Ok(HitResult::new(props, rows, error))
    }

    /// Integration over prepared shot properties. The root finders call this
    /// repeatedly while rewriting `barrel_elevation_rad` between calls.
    pub(crate) fn integrate_props(
        &self,
        props: &ShotProps,
        max_range_ft: f64,
        range_step_ft: f64,
        time_step_s: f64,
        filter_flags: TrajFlag,
    ) -> (Vec<TrajectoryData>, Option<RangeError>) {
        let (rows, termination) = match self.method {
            IntegrationMethod::AdaptiveRk45 => adaptive::integrate(
                props,
                &self.config,
                max_range_ft,
                range_step_ft,
                time_step_s,
                filter_flags,
            ),
            _ => self.integrate_fixed(props, max_range_ft, range_step_ft, time_step_s, filter_flags),
        };
        let error = termination
            .range_error_reason()
            .map(|reason| RangeError::new(reason, rows.clone()));
        (rows, error)
    }

    fn integrate_fixed(
        &self,
        props: &ShotProps,
        max_range_ft: f64,
        range_step_ft: f64,
        time_step_s: f64,
        filter_flags: TrajFlag,
    ) -> (Vec<TrajectoryData>, Termination) {
        let gravity = Vector3::new(0.0, self.config.gravity_fps2, 0.0);
        let base_step_ft = self.method.base_step_ft(props);
        let mut wind_sock = props.wind_sock();
        let mut time_s = 0.0;
        let mut position = props.initial_position();
        let mut velocity = props.initial_velocity();
        // When the muzzle sits above the datum the drop allowance shifts with
        // it, keeping the permitted fall measured from the muzzle.
        let max_drop_threshold_ft = self.config.max_drop_ft + position.y.max(0.0);
        let mut recorder = TrajectoryRecorder::new(
            filter_flags,
            range_step_ft,
            max_range_ft,
            time_step_s,
            props.look_angle_rad,
            position.y,
            props.barrel_elevation_rad,
        );

        let mut steps = 0usize;
        let termination = loop {
            let (density_ratio, mach_fps) = props.density_and_mach(props.alt0_ft + position.y);
            recorder.record(props, time_s, &position, &velocity, mach_fps);

            // Checked after recording so the state just past the boundary is
            // available to bracket the final distance sample.
            if position.x > max_range_ft {
                break Termination::MaxRange;
            }
            if velocity.norm() < self.config.min_velocity_fps {
                break Termination::MinVelocity;
            }
            if position.y < max_drop_threshold_ft {
                break Termination::MaxDrop;
            }
            if props.alt0_ft + position.y < self.config.min_altitude_ft && velocity.y <= 0.0 {
                break Termination::MinAltitude;
            }
            if steps >= MAX_INTEGRATION_STEPS {
                tracing::warn!(
                    "integration step cap hit after {} steps at x = {:.1} ft",
                    steps,
                    position.x
                );
                break Termination::StepLimit;
            }

            let wind = wind_sock.vector_for_range(position.x);
            match self.method {
                IntegrationMethod::RungeKutta4 => rk4_step(
                    props,
                    &gravity,
                    &wind,
                    density_ratio,
                    mach_fps,
                    base_step_ft,
                    &mut time_s,
                    &mut position,
                    &mut velocity,
                ),
                IntegrationMethod::VelocityVerlet => verlet_step(
                    props,
                    &gravity,
                    &wind,
                    density_ratio,
                    mach_fps,
                    base_step_ft,
                    &mut time_s,
                    &mut position,
                    &mut velocity,
                ),
                _ => euler_step(
                    props,
                    &gravity,
                    &wind,
                    density_ratio,
                    mach_fps,
                    base_step_ft,
                    &mut time_s,
                    &mut position,
                    &mut velocity,
                ),
            }
            steps += 1;
        };

        let mut rows = recorder.into_rows();
        // Downstream curve fitting needs at least two usable rows; a filter
        // that recorded nothing still yields the terminal state.
        let terminal_already_recorded = rows
            .last()
            .map(|row| (row.time_s - time_s).abs() < 1.0e-9)
            .unwrap_or(false);
        if rows.len() < 2 && !terminal_already_recorded {
            rows.push(TrajectoryData::from_props(
                props,
                time_s,
                &position,
                &velocity,
                TrajFlag::NONE,
            ));
        }
        (rows, termination)
    }
}

fn euler_step(
    props: &ShotProps,
    gravity: &Vector3<f64>,
    wind: &Vector3<f64>,
    density_ratio: f64,
    mach_fps: f64,
    base_step_ft: f64,
    time_s: &mut f64,
    position: &mut Vector3<f64>,
    velocity: &mut Vector3<f64>,
) {
    let relative_velocity = *velocity - wind;
    let relative_speed = relative_velocity.norm();
    let dt = base_step_ft / relative_speed.max(1.0);
    let km = density_ratio * props.standard_drag(relative_speed / mach_fps);
    let mut acceleration = gravity - relative_velocity * (km * relative_speed);
    if let Some(coriolis) = &props.coriolis {
        acceleration += coriolis.acceleration(velocity);
    }
    *velocity += acceleration * dt;
    // position advances on the updated velocity
    *position += *velocity * dt;
    *time_s += dt;
}

fn rk4_step(
    props: &ShotProps,
    gravity: &Vector3<f64>,
    wind: &Vector3<f64>,
    density_ratio: f64,
    mach_fps: f64,
    base_step_ft: f64,
    time_s: &mut f64,
    position: &mut Vector3<f64>,
    velocity: &mut Vector3<f64>,
) {
    let relative_speed = (*velocity - wind).norm();
    let dt = base_step_ft / relative_speed.max(1.0);
    // drag coefficient frozen across the four stages
    let km = density_ratio * props.standard_drag(relative_speed / mach_fps);
    let accel = |v: &Vector3<f64>| -> Vector3<f64> {
        let relative = v - wind;
        let mut a = gravity - relative * (km * relative.norm());
        if let Some(coriolis) = &props.coriolis {
            a += coriolis.acceleration(v);
        }
        a
    };

    let v1 = accel(velocity) * dt;
    let v2 = accel(&(*velocity + v1 * 0.5)) * dt;
    let v3 = accel(&(*velocity + v2 * 0.5)) * dt;
    let v4 = accel(&(*velocity + v3)) * dt;
    let p1 = *velocity * dt;
    let p2 = (*velocity + v1 * 0.5) * dt;
    let p3 = (*velocity + v2 * 0.5) * dt;
    let p4 = (*velocity + v3) * dt;

    *position += (p1 + (p2 + p3) * 2.0 + p4) / 6.0;
    *velocity += (v1 + (v2 + v3) * 2.0 + v4) / 6.0;
    *time_s += dt;
}

fn verlet_step(
    props: &ShotProps,
    gravity: &Vector3<f64>,
    wind: &Vector3<f64>,
    density_ratio: f64,
    mach_fps: f64,
    base_step_ft: f64,
    time_s: &mut f64,
    position: &mut Vector3<f64>,
    velocity: &mut Vector3<f64>,
) {
    let relative_velocity = *velocity - wind;
    let relative_speed = relative_velocity.norm();
    let dt = base_step_ft / relative_speed.max(1.0);
    let km = density_ratio * props.standard_drag(relative_speed / mach_fps);

    let mut a1 = gravity - relative_velocity * (km * relative_speed);
    if let Some(coriolis) = &props.coriolis {
        a1 += coriolis.acceleration(velocity);
    }
    *position += *velocity * dt + a1 * (0.5 * dt * dt);

    let predicted = *velocity + a1 * dt;
    let relative_predicted = predicted - wind;
    let mut a2 = gravity - relative_predicted * (km * relative_predicted.norm());
    if let Some(coriolis) = &props.coriolis {
        a2 += coriolis.acceleration(&predicted);
    }
    *velocity += (a1 + a2) * (0.5 * dt);
    *time_s += dt;
}
