//! Shape-preserving interpolation over trajectory rows.
//!
//! Three-point monotone cubic (PCHIP construction) where three samples
//! exist, two-point linear at segment boundaries. Repeated keys are an
//! error: rows are keyed by strictly monotonic quantities, so a duplicate
//! means the caller picked a key that doubles back.

use crate::error::Error;

/// Cubic Hermite evaluation on [xa, xb] with endpoint slopes.
fn hermite(x: f64, xa: f64, xb: f64, ya: f64, yb: f64, ma: f64, mb: f64) -> f64 {
    let h = xb - xa;
    let t = (x - xa) / h;
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    h00 * ya + h10 * h * ma + h01 * yb + h11 * h * mb
}

/// One-sided PCHIP end slope, clamped so the curve cannot overshoot.
fn end_slope(h_near: f64, h_far: f64, d_near: f64, d_far: f64) -> f64 {
    let m = ((2.0 * h_near + h_far) * d_near - h_near * d_far) / (h_near + h_far);
    if m * d_near <= 0.0 {
        0.0
    } else if d_near * d_far <= 0.0 && m.abs() > 3.0 * d_near.abs() {
        3.0 * d_near
    } else {
        m
    }
}

/// Monotone cubic interpolation through three points.
///
/// Keys must be strictly monotonic; descending sequences are accepted and
/// reversed internally. A repeated key is `Error::DivideByZero`, a
/// non-monotonic triple is `Error::InvalidState`.
pub fn interpolate_3_pt(
    x: f64,
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
) -> Result<f64, Error> {
    let h0 = x1 - x0;
    let h1 = x2 - x1;
    if h0 == 0.0 || h1 == 0.0 {
        return Err(Error::DivideByZero(format!(
            "repeated interpolation keys ({x0}, {x1}, {x2})"
        )));
    }
    if h0 < 0.0 && h1 < 0.0 {
        return interpolate_3_pt(x, x2, y2, x1, y1, x0, y0);
    }
    if h0 < 0.0 || h1 < 0.0 {
        return Err(Error::InvalidState(format!(
            "interpolation keys are not monotonic ({x0}, {x1}, {x2})"
        )));
    }

    let d0 = (y1 - y0) / h0;
    let d1 = (y2 - y1) / h1;

    // middle slope: zero at a local extremum, weighted harmonic mean while
    // the data keeps one direction
    let m1 = if d0 * d1 <= 0.0 {
        0.0
    } else {
        let w0 = 2.0 * h1 + h0;
        let w1 = h1 + 2.0 * h0;
        (w0 + w1) / (w0 / d0 + w1 / d1)
    };
    let m0 = end_slope(h0, h1, d0, d1);
    let m2 = end_slope(h1, h0, d1, d0);

    if x <= x1 {
        Ok(hermite(x, x0, x1, y0, y1, m0, m1))
    } else {
        Ok(hermite(x, x1, x2, y1, y2, m1, m2))
    }
}

/// Linear interpolation through two points. A repeated key is
/// `Error::DivideByZero`.
pub fn interpolate_2_pt(x: f64, x0: f64, y0: f64, x1: f64, y1: f64) -> Result<f64, Error> {
    if x1 == x0 {
        return Err(Error::DivideByZero(format!(
            "repeated interpolation keys ({x0}, {x1})"
        )));
    }
    Ok(y0 + (x - x0) * (y1 - y0) / (x1 - x0))
}
