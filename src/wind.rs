//! Wind segments and the cursor that feeds them to the integrators.

use nalgebra::Vector3;

/// Ranges beyond any practical trajectory; a wind without an explicit
/// limit stays active through this distance (ft).
pub const MAX_WIND_DISTANCE_FT: f64 = 1e8;

/// One wind condition, active from the end of the previous segment out to
/// `until_distance_ft` downrange.
///
/// `direction_rad` is the direction the air moves toward, measured
/// clockwise viewed from above: 0 is a tailwind blowing from directly
/// behind the shooter, pi/2 pushes toward the shooter's right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wind {
    pub speed_fps: f64,
    pub direction_rad: f64,
    pub until_distance_ft: f64,
}

impl Wind {
    /// Wind that applies over the whole trajectory.
    pub fn new(speed_fps: f64, direction_rad: f64) -> Self {
        Self {
            speed_fps,
            direction_rad,
            until_distance_ft: MAX_WIND_DISTANCE_FT,
        }
    }

    /// Wind that applies out to a downrange limit.
    pub fn with_limit(speed_fps: f64, direction_rad: f64, until_distance_ft: f64) -> Self {
        Self {
            speed_fps,
            direction_rad,
            until_distance_ft,
        }
    }

    /// Air velocity vector in the shooter frame (fps).
    pub fn vector(&self) -> Vector3<f64> {
        if self.speed_fps.is_nan() || self.direction_rad.is_nan() {
            return Vector3::zeros();
        }
        Vector3::new(
            self.speed_fps * self.direction_rad.cos(),
            0.0,
            self.speed_fps * self.direction_rad.sin(),
        )
    }
}

/// Serves wind vectors to an integration loop that only moves downrange.
///
/// Keeps a cursor into the distance-sorted segment list so each step is an
/// O(1) comparison instead of a scan. Once the cursor passes the last
/// segment the wind is zero.
#[derive(Debug, Clone)]
pub struct WindSock {
    winds: Vec<Wind>,
    current: usize,
    next_range_ft: f64,
    current_vector: Vector3<f64>,
}

impl WindSock {
    pub fn new(mut winds: Vec<Wind>) -> Self {
        winds.sort_by(|a, b| {
            a.until_distance_ft
                .partial_cmp(&b.until_distance_ft)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut sock = Self {
            winds,
            current: 0,
            next_range_ft: MAX_WIND_DISTANCE_FT,
            current_vector: Vector3::zeros(),
        };
        sock.update_cache();
        sock
    }

    fn update_cache(&mut self) {
        match self.winds.get(self.current) {
            Some(wind) => {
                self.current_vector = wind.vector();
                self.next_range_ft = wind.until_distance_ft;
            }
            None => {
                self.current_vector = Vector3::zeros();
                self.next_range_ft = MAX_WIND_DISTANCE_FT;
            }
        }
    }

    /// Wind vector at a downrange distance that never decreases between
    /// calls. Advances the cursor as segment boundaries are crossed.
    pub fn vector_for_range(&mut self, range_ft: f64) -> Vector3<f64> {
        while range_ft >= self.next_range_ft {
            self.current += 1;
            if self.current >= self.winds.len() {
                self.current_vector = Vector3::zeros();
                self.next_range_ft = MAX_WIND_DISTANCE_FT;
                break;
            }
            self.update_cache();
        }
        self.current_vector
    }

    /// Wind vector at an arbitrary downrange distance, without touching the
    /// cursor. Used by the adaptive solver, whose trial stages may probe
    /// ranges out of order.
    pub fn vector_for_range_stateless(&self, range_ft: f64) -> Vector3<f64> {
        for wind in &self.winds {
            if range_ft < wind.until_distance_ft {
                return wind.vector();
            }
        }
        Vector3::zeros()
    }
}
