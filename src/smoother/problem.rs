//! Nonlinear least-squares core shared by the smoother and upsampler.
//!
//! The waypoint polyline is optimized by Levenberg-Marquardt on the normal
//! equations (JtJ + lambda*I) dx = -Jt r. Every residual couples at most
//! three consecutive waypoints, so JtJ is a symmetric band matrix and one
//! banded Cholesky factorization solves each damped step.

use log::debug;

use crate::config::{OptimizerConfig, SmootherConfig};
use crate::core::{menger_curvature, WorldPoint};
use crate::costmap::{costs, Costmap};

/// Residuals reach two waypoints to either side, two scalars per waypoint.
const HALF_BANDWIDTH: usize = 5;

/// Step size for the curvature term's central differences, in meters.
const CURVATURE_DIFF_STEP: f32 = 1e-4;

/// Symmetric positive-definite band matrix, lower band stored row-major.
#[derive(Clone, Debug)]
struct BandMatrix {
    n: usize,
    data: Vec<f32>,
}

impl BandMatrix {
    fn new(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * (HALF_BANDWIDTH + 1)],
        }
    }

    fn reset(&mut self) {
        self.data.fill(0.0);
    }

    /// Storage offset of entry (i, j) with i >= j, i - j <= HALF_BANDWIDTH
    #[inline]
    fn offset(i: usize, j: usize) -> usize {
        i * (HALF_BANDWIDTH + 1) + (HALF_BANDWIDTH - (i - j))
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> f32 {
        self.data[Self::offset(i, j)]
    }

    #[inline]
    fn set(&mut self, i: usize, j: usize, value: f32) {
        self.data[Self::offset(i, j)] = value;
    }

    /// Accumulate into the symmetric entry (i, j)
    #[inline]
    fn add(&mut self, i: usize, j: usize, value: f32) {
        let (i, j) = if i >= j { (i, j) } else { (j, i) };
        debug_assert!(i - j <= HALF_BANDWIDTH);
        self.data[Self::offset(i, j)] += value;
    }

    fn add_diagonal(&mut self, value: f32) {
        for i in 0..self.n {
            self.data[Self::offset(i, i)] += value;
        }
    }

    /// In-place banded Cholesky factorization (A = L * Lt).
    ///
    /// Returns false when the matrix is not positive definite.
    fn cholesky(&mut self) -> bool {
        for j in 0..self.n {
            let lo = j.saturating_sub(HALF_BANDWIDTH);
            let mut sum = self.get(j, j);
            for k in lo..j {
                let l = self.get(j, k);
                sum -= l * l;
            }
            if sum <= 1e-12 {
                return false;
            }
            let diag = sum.sqrt();
            self.set(j, j, diag);

            let hi = (j + HALF_BANDWIDTH + 1).min(self.n);
            for i in (j + 1)..hi {
                let lo_i = i.saturating_sub(HALF_BANDWIDTH);
                let mut s = self.get(i, j);
                for k in lo_i..j {
                    s -= self.get(i, k) * self.get(j, k);
                }
                self.set(i, j, s / diag);
            }
        }
        true
    }

    /// Solve L * Lt * x = b in place, after `cholesky` succeeded.
    fn solve(&self, b: &mut [f32]) {
        debug_assert_eq!(b.len(), self.n);

        // Forward: L * z = b
        for i in 0..self.n {
            let lo = i.saturating_sub(HALF_BANDWIDTH);
            let mut sum = b[i];
            for k in lo..i {
                sum -= self.get(i, k) * b[k];
            }
            b[i] = sum / self.get(i, i);
        }

        // Backward: Lt * x = z
        for i in (0..self.n).rev() {
            let hi = (i + HALF_BANDWIDTH + 1).min(self.n);
            let mut sum = b[i];
            for k in (i + 1)..hi {
                sum -= self.get(k, i) * b[k];
            }
            b[i] = sum / self.get(i, i);
        }
    }
}

/// Jacobian of one residual: up to six scalar partials.
struct ResidualJacobian {
    vars: [usize; 6],
    derivs: [f32; 6],
    len: usize,
}

impl ResidualJacobian {
    #[inline]
    fn new() -> Self {
        Self {
            vars: [0; 6],
            derivs: [0.0; 6],
            len: 0,
        }
    }

    #[inline]
    fn push(&mut self, var: usize, deriv: f32) {
        self.vars[self.len] = var;
        self.derivs[self.len] = deriv;
        self.len += 1;
    }
}

struct Problem<'a> {
    costmap: &'a Costmap,
    params: &'a SmootherConfig,
    /// Free-variable rank per waypoint, `None` for pinned waypoints
    var_of: Vec<Option<usize>>,
    n_vars: usize,
    mean_spacing: f32,
    // Square roots of the term weights, applied to residuals
    sw: f32,
    dw: f32,
    cw: f32,
    kw: f32,
}

impl<'a> Problem<'a> {
    fn new(
        points: &[WorldPoint],
        free: &[bool],
        costmap: &'a Costmap,
        params: &'a SmootherConfig,
    ) -> Self {
        let mut var_of = Vec::with_capacity(points.len());
        let mut rank = 0usize;
        for &f in free {
            if f {
                var_of.push(Some(rank));
                rank += 1;
            } else {
                var_of.push(None);
            }
        }

        let mut spacing = 0.0;
        if points.len() > 1 {
            for w in points.windows(2) {
                spacing += w[0].distance(&w[1]);
            }
            spacing /= (points.len() - 1) as f32;
        }

        Self {
            costmap,
            params,
            var_of,
            n_vars: rank * 2,
            mean_spacing: spacing,
            sw: params.w_smooth.sqrt(),
            dw: params.w_distance.sqrt(),
            cw: params.w_cost.sqrt(),
            kw: params.w_curvature.sqrt(),
        }
    }

    #[inline]
    fn var(&self, point: usize, axis: usize) -> Option<usize> {
        self.var_of[point].map(|rank| rank * 2 + axis)
    }

    /// Normalized costmap value and world-frame gradient at `p`.
    ///
    /// Bilinear interpolation over cell centers, cost clamped at OCCUPIED
    /// so UNKNOWN does not dominate the obstacle band.
    fn sample_cost(&self, p: &WorldPoint) -> (f32, f32, f32) {
        let map = self.costmap;
        let res = map.resolution();
        let origin = map.origin();
        let sx = map.size_x() as i32;
        let sy = map.size_y() as i32;
        if sx < 2 || sy < 2 {
            return (0.0, 0.0, 0.0);
        }

        let u = (p.x - origin.x) / res - 0.5;
        let v = (p.y - origin.y) / res - 0.5;
        let x0 = (u.floor() as i32).clamp(0, sx - 2);
        let y0 = (v.floor() as i32).clamp(0, sy - 2);
        let fx = (u - x0 as f32).clamp(0.0, 1.0);
        let fy = (v - y0 as f32).clamp(0.0, 1.0);

        let sample = |x: i32, y: i32| -> f32 {
            let c = map.cost(x as u32, y as u32).min(costs::OCCUPIED);
            c as f32 / costs::OCCUPIED as f32
        };
        let c00 = sample(x0, y0);
        let c10 = sample(x0 + 1, y0);
        let c01 = sample(x0, y0 + 1);
        let c11 = sample(x0 + 1, y0 + 1);

        let value = c00 * (1.0 - fx) * (1.0 - fy)
            + c10 * fx * (1.0 - fy)
            + c01 * (1.0 - fx) * fy
            + c11 * fx * fy;
        let dx = ((c10 - c00) * (1.0 - fy) + (c11 - c01) * fy) / res;
        let dy = ((c01 - c00) * (1.0 - fx) + (c11 - c10) * fx) / res;
        (value, dx, dy)
    }

    /// Visit every weighted residual of the problem.
    ///
    /// `with_jacobian` skips partial-derivative work when only the total
    /// cost is needed (trial step evaluation).
    fn for_each_residual<F>(&self, points: &[WorldPoint], with_jacobian: bool, mut visit: F)
    where
        F: FnMut(f32, &ResidualJacobian),
    {
        let n = points.len();
        let empty = ResidualJacobian::new();

        // Smoothness: p[i-1] - 2 p[i] + p[i+1], per axis
        for i in 1..n - 1 {
            for axis in 0..2 {
                let value = |p: &WorldPoint| if axis == 0 { p.x } else { p.y };
                let r = self.sw
                    * (value(&points[i - 1]) - 2.0 * value(&points[i]) + value(&points[i + 1]));
                if with_jacobian {
                    let mut jac = ResidualJacobian::new();
                    for (j, c) in [(i - 1, 1.0f32), (i, -2.0), (i + 1, 1.0)] {
                        if let Some(v) = self.var(j, axis) {
                            jac.push(v, self.sw * c);
                        }
                    }
                    visit(r, &jac);
                } else {
                    visit(r, &empty);
                }
            }
        }

        // Distance preservation: segment lengths pulled toward the mean
        for i in 1..n {
            let dx = points[i].x - points[i - 1].x;
            let dy = points[i].y - points[i - 1].y;
            let length = (dx * dx + dy * dy).sqrt();
            let r = self.dw * (length - self.mean_spacing);
            if with_jacobian {
                let mut jac = ResidualJacobian::new();
                if length > 1e-9 {
                    for (j, sign) in [(i, 1.0f32), (i - 1, -1.0)] {
                        if let Some(v) = self.var(j, 0) {
                            jac.push(v, self.dw * sign * dx / length);
                        }
                        if let Some(v) = self.var(j, 1) {
                            jac.push(v, self.dw * sign * dy / length);
                        }
                    }
                }
                visit(r, &jac);
            } else {
                visit(r, &empty);
            }
        }

        // Costmap proximity
        for i in 1..n - 1 {
            let (value, gx, gy) = self.sample_cost(&points[i]);
            let r = self.cw * value;
            if with_jacobian {
                let mut jac = ResidualJacobian::new();
                if let Some(v) = self.var(i, 0) {
                    jac.push(v, self.cw * gx);
                }
                if let Some(v) = self.var(i, 1) {
                    jac.push(v, self.cw * gy);
                }
                visit(r, &jac);
            } else {
                visit(r, &empty);
            }
        }

        // Curvature bound: active only above kappa_max
        for i in 1..n - 1 {
            let kappa = menger_curvature(&points[i - 1], &points[i], &points[i + 1]);
            if kappa <= self.params.kappa_max {
                continue;
            }
            let r = self.kw * (kappa - self.params.kappa_max);
            if with_jacobian {
                // Central differences: the Menger quotient has no tidy
                // closed-form gradient.
                let mut jac = ResidualJacobian::new();
                let mut local = [points[i - 1], points[i], points[i + 1]];
                for j in 0..3 {
                    for axis in 0..2 {
                        let Some(v) = self.var(i - 1 + j, axis) else {
                            continue;
                        };
                        let original = if axis == 0 { local[j].x } else { local[j].y };
                        let set = |pt: &mut WorldPoint, val: f32| {
                            if axis == 0 {
                                pt.x = val;
                            } else {
                                pt.y = val;
                            }
                        };
                        set(&mut local[j], original + CURVATURE_DIFF_STEP);
                        let plus = menger_curvature(&local[0], &local[1], &local[2]);
                        set(&mut local[j], original - CURVATURE_DIFF_STEP);
                        let minus = menger_curvature(&local[0], &local[1], &local[2]);
                        set(&mut local[j], original);
                        jac.push(v, self.kw * (plus - minus) / (2.0 * CURVATURE_DIFF_STEP));
                    }
                }
                visit(r, &jac);
            } else {
                visit(r, &empty);
            }
        }
    }

    /// Total cost (sum of squared weighted residuals)
    fn cost(&self, points: &[WorldPoint]) -> f32 {
        let mut total = 0.0;
        self.for_each_residual(points, false, |r, _| total += r * r);
        total
    }

    /// Assemble the normal equations; returns the current cost.
    fn build(&self, points: &[WorldPoint], h: &mut BandMatrix, g: &mut [f32]) -> f32 {
        h.reset();
        g.fill(0.0);
        let mut total = 0.0;
        self.for_each_residual(points, true, |r, jac| {
            total += r * r;
            for a in 0..jac.len {
                g[jac.vars[a]] += jac.derivs[a] * r;
                for b in a..jac.len {
                    h.add(jac.vars[a], jac.vars[b], jac.derivs[a] * jac.derivs[b]);
                }
            }
        });
        total
    }
}

/// Optimize the free waypoints of `points`; pinned waypoints never move.
///
/// Returns the optimized polyline, or `None` when the solver cannot find a
/// usable step (damping exhausted or the system stays singular). The input
/// slice is left untouched either way.
pub(crate) fn optimize(
    points: &[WorldPoint],
    free: &[bool],
    costmap: &Costmap,
    params: &SmootherConfig,
    optimizer: &OptimizerConfig,
) -> Option<Vec<WorldPoint>> {
    debug_assert_eq!(points.len(), free.len());

    let problem = Problem::new(points, free, costmap, params);
    if problem.n_vars == 0 || points.len() < 3 {
        return Some(points.to_vec());
    }

    let mut current = points.to_vec();
    let mut h = BandMatrix::new(problem.n_vars);
    let mut g = vec![0.0f32; problem.n_vars];
    let mut lambda = optimizer.initial_lambda;
    let mut prev_cost = problem.cost(&current);

    for _ in 0..optimizer.max_iterations {
        problem.build(&current, &mut h, &mut g);

        // Already at a stationary point (e.g. the input is a straight,
        // evenly spaced line through free space)
        let gradient_sq: f32 = g.iter().map(|v| v * v).sum();
        if gradient_sq < 1e-12 {
            break;
        }

        // Retry the same step with increasing damping until it improves
        let improvement = loop {
            let mut damped = h.clone();
            damped.add_diagonal(lambda);
            if damped.cholesky() {
                let mut step: Vec<f32> = g.iter().map(|v| -v).collect();
                damped.solve(&mut step);

                let mut trial = current.clone();
                for (i, point) in trial.iter_mut().enumerate() {
                    if let Some(rank) = problem.var_of[i] {
                        point.x += step[rank * 2];
                        point.y += step[rank * 2 + 1];
                    }
                }

                let trial_cost = problem.cost(&trial);
                if trial_cost < prev_cost {
                    let improvement = prev_cost - trial_cost;
                    current = trial;
                    prev_cost = trial_cost;
                    lambda = (lambda / optimizer.lambda_factor).max(optimizer.min_lambda);
                    break improvement;
                }
            }

            lambda *= optimizer.lambda_factor;
            if lambda > optimizer.max_lambda {
                debug!("damping exhausted at lambda {:.2e}, cost {:.4e}", lambda, prev_cost);
                return None;
            }
        };

        if improvement < optimizer.cost_tolerance {
            break;
        }
    }

    Some(current)
}
