//! Costmap-aware nonlinear path smoothing.
//!
//! The raw lattice path is grid-blocky; this module refines it by
//! minimizing a weighted sum of smoothness, obstacle-proximity, spacing,
//! and curvature-bound residuals over the waypoint positions. Both
//! endpoints stay locked in place so the start and goal never drift.

mod problem;
pub mod upsampler;

pub use upsampler::Upsampler;

use crate::config::{OptimizerConfig, SmootherConfig};
use crate::core::WorldPoint;
use crate::costmap::Costmap;

/// Nonlinear least-squares smoother over waypoint positions.
pub struct Smoother {
    optimizer: OptimizerConfig,
}

impl Smoother {
    /// Create a smoother with the given solver settings.
    pub fn new(optimizer: OptimizerConfig) -> Self {
        Self { optimizer }
    }

    /// Smooth `path` in place against `costmap`.
    ///
    /// Interior waypoints move, the first and last never do. Returns false
    /// and leaves the path untouched when the solver cannot find a usable
    /// solution.
    pub fn smooth(
        &self,
        path: &mut Vec<WorldPoint>,
        costmap: &Costmap,
        params: &SmootherConfig,
    ) -> bool {
        if path.len() < 3 {
            return true;
        }

        let mut free = vec![true; path.len()];
        free[0] = false;
        *free.last_mut().unwrap() = false;

        match problem::optimize(path, &free, costmap, params, &self.optimizer) {
            Some(result) => {
                *path = result;
                true
            }
            None => false,
        }
    }

    /// Smooth with a reduced iteration budget, for when a planning-time
    /// budget has mostly elapsed.
    pub fn smooth_with_iteration_cap(
        &self,
        path: &mut Vec<WorldPoint>,
        costmap: &Costmap,
        params: &SmootherConfig,
        max_iterations: usize,
    ) -> bool {
        let capped = OptimizerConfig {
            max_iterations: max_iterations.min(self.optimizer.max_iterations),
            ..self.optimizer.clone()
        };
        let reduced = Smoother { optimizer: capped };
        reduced.smooth(path, costmap, params)
    }
}

/// Remove the end "hook": the small backward overshoot in front of the
/// locked goal point.
///
/// If the last segment is longer than the segment from the midpoint of
/// `p[n-3]` and `p[n-1]`, the second-to-last point is replaced with that
/// midpoint. Applying this twice changes nothing.
pub fn remove_hook(path: &mut [WorldPoint]) {
    let n = path.len();
    if n < 3 {
        return;
    }

    let interpolated = path[n - 3].midpoint(&path[n - 1]);
    if path[n - 2].distance_squared(&path[n - 1]) > interpolated.distance_squared(&path[n - 1]) {
        path[n - 2] = interpolated;
    }
}
