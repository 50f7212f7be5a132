//! Piecewise-quadratic drag curve over (Mach, Cd) data points.

use std::cmp::Ordering;

use crate::error::Error;

/// Coefficients of one curve segment: cd = c + mach * (b + a * mach).
#[derive(Debug, Clone, Copy)]
struct CurvePoint {
    a: f64,
    b: f64,
    c: f64,
}

/// Precomputed drag function built from a table of (Mach, Cd) points.
///
/// Each interior knot carries the parabola through itself and its two
/// neighbors; the first and last knots carry the straight line through the
/// adjacent pair (a = 0), which also serves as the extrapolation beyond the
/// table. Evaluation picks the segment of the knot nearest the query, the
/// selection rule every G-table trajectory program shares, so results match
/// published drop tables rather than a textbook spline.
#[derive(Debug, Clone)]
pub struct DragCurve {
    mach: Vec<f64>,
    curve: Vec<CurvePoint>,
}

impl DragCurve {
    /// Build a curve from (Mach, Cd) points.
    ///
    /// # Arguments
    /// * `points` - at least 3 pairs with strictly increasing Mach values
    ///
    /// # Returns
    /// `Error::InvalidInput` on too few points or a non-increasing Mach
    /// sequence.
    pub fn new(points: &[(f64, f64)]) -> Result<Self, Error> {
        let n = points.len();
        if n < 3 {
            return Err(Error::InvalidInput(format!(
                "drag curve needs at least 3 points, got {n}"
            )));
        }
        for (i, pair) in points.windows(2).enumerate() {
            if pair[1].0 <= pair[0].0 {
                return Err(Error::InvalidInput(format!(
                    "drag table Mach values must be strictly increasing \
                     ({} then {} at index {})",
                    pair[0].0,
                    pair[1].0,
                    i + 1
                )));
            }
        }

        let mut curve = Vec::with_capacity(n);

        let rate = (points[1].1 - points[0].1) / (points[1].0 - points[0].0);
        curve.push(CurvePoint {
            a: 0.0,
            b: rate,
            c: points[0].1 - points[0].0 * rate,
        });

        for i in 1..n - 1 {
            let (x1, y1) = points[i - 1];
            let (x2, y2) = points[i];
            let (x3, y3) = points[i + 1];
            let a = ((y3 - y1) * (x2 - x1) - (y2 - y1) * (x3 - x1))
                / ((x3 * x3 - x1 * x1) * (x2 - x1) - (x2 * x2 - x1 * x1) * (x3 - x1));
            let b = (y2 - y1) / (x2 - x1) - (x1 + x2) * a;
            let c = y1 - (a * x1 * x1 + b * x1);
            curve.push(CurvePoint { a, b, c });
        }

        let rate = (points[n - 1].1 - points[n - 2].1) / (points[n - 1].0 - points[n - 2].0);
        curve.push(CurvePoint {
            a: 0.0,
            b: rate,
            c: points[n - 1].1 - points[n - 1].0 * rate,
        });

        Ok(Self {
            mach: points.iter().map(|&(m, _)| m).collect(),
            curve,
        })
    }

    /// Drag coefficient at the given Mach number.
    pub fn drag_coefficient(&self, mach: f64) -> f64 {
        let n = self.mach.len();
        let idx = match self
            .mach
            .binary_search_by(|probe| probe.partial_cmp(&mach).unwrap_or(Ordering::Equal))
        {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) if i >= n => n - 1,
            Err(i) => {
                // nearest knot wins, ties go high
                if self.mach[i] - mach > mach - self.mach[i - 1] {
                    i - 1
                } else {
                    i
                }
            }
        };
        let seg = self.curve[idx];
        seg.c + mach * (seg.b + seg.a * mach)
    }

    /// The Mach breakpoints this curve was built from.
    pub fn mach_values(&self) -> &[f64] {
        &self.mach
    }

    /// Number of knots.
    pub fn len(&self) -> usize {
        self.mach.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mach.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_curve() -> DragCurve {
        DragCurve::new(&[
            (0.5, 0.2),
            (1.0, 0.5),
            (1.5, 0.45),
            (2.0, 0.38),
            (3.0, 0.3),
        ])
        .expect("valid table")
    }

    #[test]
    fn test_rejects_short_tables() {
        let err = DragCurve::new(&[(0.5, 0.2), (1.0, 0.5)]);
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_non_increasing_mach() {
        let dup = DragCurve::new(&[(0.5, 0.2), (0.5, 0.3), (1.0, 0.5)]);
        assert!(matches!(dup, Err(Error::InvalidInput(_))));

        let dec = DragCurve::new(&[(0.5, 0.2), (1.0, 0.5), (0.8, 0.4)]);
        assert!(matches!(dec, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_passes_through_knots() {
        let curve = sample_curve();
        for &(mach, cd) in &[(0.5, 0.2), (1.0, 0.5), (1.5, 0.45), (2.0, 0.38), (3.0, 0.3)] {
            let value = curve.drag_coefficient(mach);
            assert!((value - cd).abs() < 1e-12, "at Mach {mach}: {value} vs {cd}");
        }
    }

    #[test]
    fn test_linear_extrapolation_below() {
        let curve = sample_curve();
        // first segment slope is (0.5 - 0.2) / (1.0 - 0.5) = 0.6
        let value = curve.drag_coefficient(0.3);
        assert!((value - (0.2 - 0.2 * 0.6)).abs() < 1e-12, "below table: {value}");
    }

    #[test]
    fn test_linear_extrapolation_above() {
        let curve = sample_curve();
        // last segment slope is (0.3 - 0.38) / (3.0 - 2.0) = -0.08
        let value = curve.drag_coefficient(3.5);
        assert!((value - (0.3 - 0.5 * 0.08)).abs() < 1e-12, "above table: {value}");
    }

    #[test]
    fn test_interior_values_stay_reasonable() {
        let curve = sample_curve();
        for i in 0..200 {
            let mach = 0.5 + i as f64 * 0.0125;
            let cd = curve.drag_coefficient(mach);
            assert!(cd > 0.1 && cd < 0.6, "at Mach {mach}: {cd}");
        }
    }

    #[test]
    fn test_mach_values_round_trip() {
        let curve = sample_curve();
        assert_eq!(curve.mach_values(), &[0.5, 1.0, 1.5, 2.0, 3.0]);
        assert_eq!(curve.len(), 5);
        assert!(!curve.is_empty());
    }
}
