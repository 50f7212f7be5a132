//! Event-driven row recording for trajectory integration.
//!
//! Integrators hand every raw step to a [`TrajectoryRecorder`], which turns
//! the step stream into output rows: distance samples interpolated onto exact
//! multiples of the requested range step, plus one-shot event rows for sight
//! line crossings, the transonic boundary, and the apex.

use nalgebra::Vector3;

use crate::shot::ShotProps;
use crate::trajectory_data::{TrajFlag, TrajectoryData};

struct RawState {
    time_s: f64,
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    mach_fps: f64,
}

struct Candidate {
    time_s: f64,
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    flag: TrajFlag,
}

/// Filters raw integration states down to recorded trajectory rows.
///
/// Distance sampling interpolates linearly between the bracketing raw states,
/// so recorded distances land exactly on multiples of the range step. Event
/// detection is sign-change based and latched: each of ZERO_UP, ZERO_DOWN,
/// MACH and APEX fires at most once per trajectory, and ZERO_DOWN cannot fire
/// before ZERO_UP.
pub struct TrajectoryRecorder {
    filter: TrajFlag,
    range_step_ft: f64,
    max_range_ft: f64,
    time_step_s: f64,
    next_record_distance_ft: f64,
    previous_sample_time_s: f64,
    look_tangent: f64,
    seen_zero: TrajFlag,
    seen_mach: bool,
    seen_apex: bool,
    prev: Option<RawState>,
    rows: Vec<TrajectoryData>,
}

impl TrajectoryRecorder {
    /// # Arguments
    /// * `filter` - flags the caller wants recorded
    /// * `range_step_ft` - distance sampling interval, zero disables sampling
    /// * `max_range_ft` - no distance sample is taken beyond this
    /// * `time_step_s` - fallback sampling interval in seconds for stretches
    ///   where no distance boundary is crossed, zero disables it
    /// * `look_angle_rad` - sight line angle for zero-crossing detection
    /// * `initial_height_ft` - launch height relative to the sight line origin
    /// * `barrel_elevation_rad` - launch elevation, used to arm the latches
    pub fn new(
        filter: TrajFlag,
        range_step_ft: f64,
        max_range_ft: f64,
        time_step_s: f64,
        look_angle_rad: f64,
        initial_height_ft: f64,
        barrel_elevation_rad: f64,
    ) -> Self {
        // A shot that starts on or above the sight line can never cross it
        // upward, and one launched below the look angle never rises to it.
        let mut seen_zero = TrajFlag::NONE;
        if initial_height_ft >= 0.0 {
            seen_zero |= TrajFlag::ZERO_UP;
        } else if barrel_elevation_rad < look_angle_rad {
            seen_zero |= TrajFlag::ZERO_DOWN;
        }
        TrajectoryRecorder {
            filter,
            range_step_ft,
            max_range_ft,
            time_step_s,
            next_record_distance_ft: 0.0,
            previous_sample_time_s: 0.0,
            look_tangent: look_angle_rad.tan(),
            seen_zero,
            seen_mach: false,
            seen_apex: false,
            prev: None,
            rows: Vec::new(),
        }
    }

    fn wants_range_samples(&self) -> bool {
        self.filter.intersects(TrajFlag::RANGE) && self.range_step_ft > 0.0
    }

    /// Feeds one raw integration state through the filter.
    pub fn record(
        &mut self,
        props: &ShotProps,
        time_s: f64,
        position: &Vector3<f64>,
        velocity: &Vector3<f64>,
        mach_fps: f64,
    ) {
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut current_flag = TrajFlag::NONE;

        match self.prev.take() {
            None => {
                // the launch state is the zero-distance sample
                if self.filter.intersects(TrajFlag::RANGE)
                    && (self.wants_range_samples() || self.time_step_s > 0.0)
                {
                    current_flag |= TrajFlag::RANGE;
                    if self.wants_range_samples() {
                        self.next_record_distance_ft += self.range_step_ft;
                    }
                }
                self.previous_sample_time_s = time_s;
            }
            Some(prev) => {
                if self.wants_range_samples() {
                    let span = position.x - prev.position.x;
                    while span > 0.0
                        && self.next_record_distance_ft <= position.x
                        && self.next_record_distance_ft <= self.max_range_ft
                    {
                        let ratio = (self.next_record_distance_ft - prev.position.x) / span;
                        candidates.push(Candidate {
                            time_s: prev.time_s + ratio * (time_s - prev.time_s),
                            position: prev.position + ratio * (position - prev.position),
                            velocity: prev.velocity + ratio * (velocity - prev.velocity),
                            flag: TrajFlag::RANGE,
                        });
                        self.next_record_distance_ft += self.range_step_ft;
                    }
                }
                if let Some(sample) = candidates.last() {
                    self.previous_sample_time_s = sample.time_s;
                } else if self.filter.intersects(TrajFlag::RANGE)
                    && self.time_step_s > 0.0
                    && time_s - self.previous_sample_time_s >= self.time_step_s
                {
                    current_flag |= TrajFlag::RANGE;
                    self.previous_sample_time_s = time_s;
                }

                if self.filter.intersects(TrajFlag::ZERO) {
                    let prev_sh = prev.position.y - prev.position.x * self.look_tangent;
                    let cur_sh = position.y - position.x * self.look_tangent;
                    if !self.seen_zero.intersects(TrajFlag::ZERO_UP) {
                        if prev_sh < 0.0 && cur_sh >= 0.0 {
                            current_flag |= TrajFlag::ZERO_UP;
                            self.seen_zero |= TrajFlag::ZERO_UP;
                        }
                    } else if !self.seen_zero.intersects(TrajFlag::ZERO_DOWN)
                        && prev_sh >= 0.0
                        && cur_sh < 0.0
                    {
                        current_flag |= TrajFlag::ZERO_DOWN;
                        self.seen_zero |= TrajFlag::ZERO_DOWN;
                    }
                }

                if self.filter.intersects(TrajFlag::MACH) && !self.seen_mach {
                    let prev_mach = prev.velocity.norm() / prev.mach_fps;
                    let cur_mach = velocity.norm() / mach_fps;
                    if prev_mach >= 1.0 && cur_mach < 1.0 {
                        current_flag |= TrajFlag::MACH;
                        self.seen_mach = true;
                    }
                }

                if self.filter.intersects(TrajFlag::APEX)
                    && !self.seen_apex
                    && prev.velocity.y > 0.0
                    && velocity.y <= 0.0
                {
                    current_flag |= TrajFlag::APEX;
                    self.seen_apex = true;
                }
            }
        }

        if !current_flag.is_empty() {
            candidates.push(Candidate {
                time_s,
                position: *position,
                velocity: *velocity,
                flag: current_flag,
            });
        }

        for candidate in candidates {
            self.push_candidate(props, candidate);
        }

        self.prev = Some(RawState {
            time_s,
            position: *position,
            velocity: *velocity,
            mach_fps,
        });
    }

    /// Appends a candidate row, coalescing flags when it lands on the same
    /// instant as the previously recorded row.
    fn push_candidate(&mut self, props: &ShotProps, candidate: Candidate) {
        if let Some(last) = self.rows.last_mut() {
            if (last.time_s - candidate.time_s).abs() < 1.0e-9 {
                last.flag |= candidate.flag;
                return;
            }
        }
        self.rows.push(TrajectoryData::from_props(
            props,
            candidate.time_s,
            &candidate.position,
            &candidate.velocity,
            candidate.flag,
        ));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last_time_s(&self) -> Option<f64> {
        self.rows.last().map(|row| row.time_s)
    }

    pub fn into_rows(self) -> Vec<TrajectoryData> {
        self.rows
    }
}
