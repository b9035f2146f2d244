// src/profile/spline.rs - Natural cubic spline through profile setpoints
use super::{Bracket, Setpoint, bracket};

/// Natural cubic spline (zero curvature at both ends) through every setpoint.
///
/// Outside the setpoint span the curve is clamped to the nearest end
/// temperature instead of extrapolated. With two setpoints the spline is the
/// straight line between them.
#[derive(Debug, Clone)]
pub struct NaturalCubicSpline {
    points: Vec<Setpoint>,
    /// Second derivative of the curve at each setpoint.
    curvature: Vec<f64>,
}

impl NaturalCubicSpline {
    /// Fit the spline. `points` must be non-empty and strictly increasing in
    /// time, which `Profile::validate` guarantees.
    pub fn new(points: &[Setpoint]) -> Self {
        let n = points.len();
        let mut curvature = vec![0.0; n];
        if n > 2 {
            // Tridiagonal system for the interior second derivatives, solved
            // with the Thomas algorithm. Ends are pinned to zero.
            let m = n - 2;
            let mut diag = vec![0.0; m];
            let mut upper = vec![0.0; m];
            let mut rhs = vec![0.0; m];
            for k in 0..m {
                let i = k + 1;
                let h_prev = points[i].time - points[i - 1].time;
                let h_next = points[i + 1].time - points[i].time;
                diag[k] = 2.0 * (h_prev + h_next);
                upper[k] = h_next;
                rhs[k] = 6.0
                    * ((points[i + 1].temperature - points[i].temperature) / h_next
                        - (points[i].temperature - points[i - 1].temperature) / h_prev);
            }
            for k in 1..m {
                let lower = points[k + 1].time - points[k].time;
                let w = lower / diag[k - 1];
                diag[k] -= w * upper[k - 1];
                rhs[k] -= w * rhs[k - 1];
            }
            curvature[m] = rhs[m - 1] / diag[m - 1];
            for k in (0..m - 1).rev() {
                curvature[k + 1] = (rhs[k] - upper[k] * curvature[k + 2]) / diag[k];
            }
        }
        Self {
            points: points.to_vec(),
            curvature,
        }
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        match bracket(&self.points, t) {
            Bracket::Before => self.points[0].temperature,
            Bracket::Exact(i) => self.points[i].temperature,
            Bracket::After => self.points[self.points.len() - 1].temperature,
            Bracket::Between(i) => {
                let (a, b) = (self.points[i], self.points[i + 1]);
                let (ma, mb) = (self.curvature[i], self.curvature[i + 1]);
                let h = b.time - a.time;
                let left = b.time - t;
                let right = t - a.time;
                ma * left.powi(3) / (6.0 * h)
                    + mb * right.powi(3) / (6.0 * h)
                    + (a.temperature / h - ma * h / 6.0) * left
                    + (b.temperature / h - mb * h / 6.0) * right
            }
        }
    }
}
