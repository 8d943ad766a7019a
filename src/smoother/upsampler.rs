//! Waypoint densification with re-optimization.
//!
//! Inserts interpolated waypoints between each adjacent pair, then runs the
//! smoothing objective with every original waypoint pinned so only the
//! inserted points move.

use log::warn;

use super::problem;
use crate::config::{OptimizerConfig, SmootherConfig};
use crate::core::WorldPoint;
use crate::costmap::Costmap;

/// Path upsampler: 2x or 4x waypoint densification.
pub struct Upsampler {
    optimizer: OptimizerConfig,
}

impl Upsampler {
    /// Create an upsampler with the given solver settings.
    pub fn new(optimizer: OptimizerConfig) -> Self {
        Self { optimizer }
    }

    /// Densify `path` in place by `ratio` (2 or 4; anything else is coerced
    /// to 2 with a warning).
    ///
    /// Returns false and leaves the path untouched when the solver cannot
    /// find a usable solution for the inserted points.
    pub fn upsample(
        &self,
        path: &mut Vec<WorldPoint>,
        costmap: &Costmap,
        params: &SmootherConfig,
        ratio: u32,
    ) -> bool {
        let ratio = match ratio {
            2 | 4 => ratio,
            other => {
                warn!(
                    "Upsampling ratio set to {}, only 2 and 4 are valid. Defaulting to 2.",
                    other
                );
                2
            }
        };

        if path.len() < 2 {
            return true;
        }

        let mut dense = Vec::with_capacity(path.len() * ratio as usize);
        let mut free = Vec::with_capacity(dense.capacity());
        for w in path.windows(2) {
            dense.push(w[0]);
            free.push(false);
            for k in 1..ratio {
                let t = k as f32 / ratio as f32;
                dense.push(WorldPoint::new(
                    w[0].x + t * (w[1].x - w[0].x),
                    w[0].y + t * (w[1].y - w[0].y),
                ));
                free.push(true);
            }
        }
        dense.push(*path.last().unwrap());
        free.push(false);

        match problem::optimize(&dense, &free, costmap, params, &self.optimizer) {
            Some(result) => {
                *path = result;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costmap::costs;

    fn free_map() -> Costmap {
        Costmap::filled(60, 60, 0.05, WorldPoint::ZERO, costs::FREE)
    }

    fn curved_path() -> Vec<WorldPoint> {
        vec![
            WorldPoint::new(0.50, 0.50),
            WorldPoint::new(0.70, 0.55),
            WorldPoint::new(0.90, 0.50),
            WorldPoint::new(1.10, 0.45),
            WorldPoint::new(1.30, 0.50),
        ]
    }

    #[test]
    fn test_upsample_counts() {
        let map = free_map();
        let upsampler = Upsampler::new(OptimizerConfig::default());
        let params = SmootherConfig::default();

        for ratio in [2u32, 4] {
            let mut path = curved_path();
            let n = path.len();
            assert!(upsampler.upsample(&mut path, &map, &params, ratio));
            assert_eq!(path.len(), (n - 1) * ratio as usize + 1);
        }
    }

    #[test]
    fn test_upsample_preserves_originals() {
        let map = free_map();
        let upsampler = Upsampler::new(OptimizerConfig::default());
        let original = curved_path();

        let mut path = original.clone();
        assert!(upsampler.upsample(&mut path, &map, &SmootherConfig::default(), 2));

        for (i, p) in original.iter().enumerate() {
            assert_eq!(path[i * 2], *p, "original waypoint {} moved", i);
        }
    }

    #[test]
    fn test_invalid_ratio_coerced_to_two() {
        let map = free_map();
        let upsampler = Upsampler::new(OptimizerConfig::default());
        let mut path = curved_path();
        let n = path.len();

        assert!(upsampler.upsample(&mut path, &map, &SmootherConfig::default(), 3));
        assert_eq!(path.len(), (n - 1) * 2 + 1);
    }

    #[test]
    fn test_trivial_paths_pass_through() {
        let map = free_map();
        let upsampler = Upsampler::new(OptimizerConfig::default());
        let mut path = vec![WorldPoint::new(0.5, 0.5)];
        assert!(upsampler.upsample(&mut path, &map, &SmootherConfig::default(), 2));
        assert_eq!(path.len(), 1);
    }
}
