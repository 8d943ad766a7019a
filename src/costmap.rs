//! Read-only costmap snapshot for planning.
//!
//! A costmap is a row-major byte grid where each cell holds a traversal
//! cost. Cells strictly below [`costs::INSCRIBED`] are traversable,
//! [`costs::UNKNOWN`] is traversable only when the planner allows unknown
//! space, and everything else is blocked.

use crate::core::{GridCoord, WorldPoint};
use crate::error::{PlannerError, Result};

/// Cost bands for path planning
pub mod costs {
    /// Safe to traverse, no penalty
    pub const FREE: u8 = 0;
    /// Robot body would touch an obstacle, blocked
    pub const INSCRIBED: u8 = 253;
    /// Obstacle cell, blocked
    pub const OCCUPIED: u8 = 254;
    /// Unobserved cell, traversable only when allowed
    pub const UNKNOWN: u8 = 255;
}

/// Immutable 2D grid of cell traversal costs.
///
/// The planner treats this as a frozen snapshot: the caller is responsible
/// for holding any lock for the duration of a plan. World conversions use
/// the cell-center convention, `world = origin + (cell + 0.5) * resolution`.
#[derive(Clone, Debug)]
pub struct Costmap {
    size_x: u32,
    size_y: u32,
    resolution: f32,
    origin: WorldPoint,
    data: Vec<u8>,
}

impl Costmap {
    /// Create a costmap from a row-major byte array.
    ///
    /// Fails if `data.len()` does not match `size_x * size_y`.
    pub fn new(
        size_x: u32,
        size_y: u32,
        resolution: f32,
        origin: WorldPoint,
        data: Vec<u8>,
    ) -> Result<Self> {
        let expected = (size_x as usize) * (size_y as usize);
        if data.len() != expected {
            return Err(PlannerError::Costmap(format!(
                "data length {} does not match map size {}x{}",
                data.len(),
                size_x,
                size_y
            )));
        }
        if resolution <= 0.0 {
            return Err(PlannerError::Costmap(format!(
                "resolution must be positive, got {}",
                resolution
            )));
        }

        Ok(Self {
            size_x,
            size_y,
            resolution,
            origin,
            data,
        })
    }

    /// Create a costmap with every cell set to `value`.
    pub fn filled(size_x: u32, size_y: u32, resolution: f32, origin: WorldPoint, value: u8) -> Self {
        Self {
            size_x,
            size_y,
            resolution,
            origin,
            data: vec![value; (size_x as usize) * (size_y as usize)],
        }
    }

    /// Grid width in cells
    #[inline]
    pub fn size_x(&self) -> u32 {
        self.size_x
    }

    /// Grid height in cells
    #[inline]
    pub fn size_y(&self) -> u32 {
        self.size_y
    }

    /// Total number of cells
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the grid has no cells
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cell edge length in meters
    #[inline]
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// World position of the grid's (0, 0) corner
    #[inline]
    pub fn origin(&self) -> WorldPoint {
        self.origin
    }

    /// Raw cost bytes, row-major
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Cost at a linear index
    #[inline]
    pub fn cost_at(&self, index: usize) -> u8 {
        self.data[index]
    }

    /// Cost at cell (x, y)
    #[inline]
    pub fn cost(&self, x: u32, y: u32) -> u8 {
        self.data[(y as usize) * (self.size_x as usize) + (x as usize)]
    }

    /// Set the cost at cell (x, y). Used when assembling snapshots.
    #[inline]
    pub fn set_cost(&mut self, x: u32, y: u32, value: u8) {
        self.data[(y as usize) * (self.size_x as usize) + (x as usize)] = value;
    }

    /// Whether (x, y) lies inside the grid
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.size_x && (y as u32) < self.size_y
    }

    /// Convert a world position to the containing cell.
    ///
    /// Returns `None` when the position falls outside the grid.
    pub fn world_to_map(&self, point: WorldPoint) -> Option<GridCoord> {
        let mx = ((point.x - self.origin.x) / self.resolution).floor();
        let my = ((point.y - self.origin.y) / self.resolution).floor();
        if mx < 0.0 || my < 0.0 || mx >= self.size_x as f32 || my >= self.size_y as f32 {
            return None;
        }
        Some(GridCoord::new(mx as i32, my as i32))
    }

    /// Convert continuous grid coordinates to world coordinates (cell center).
    #[inline]
    pub fn map_to_world(&self, mx: f32, my: f32) -> WorldPoint {
        WorldPoint::new(
            self.origin.x + (mx + 0.5) * self.resolution,
            self.origin.y + (my + 0.5) * self.resolution,
        )
    }

    /// Produce a coarser costmap by max-pooling `factor x factor` blocks.
    ///
    /// Taking the maximum keeps lethal and inscribed cells lethal in the
    /// coarse grid, so a plan on the downsampled map never cuts through an
    /// obstacle that the fine map knows about.
    pub fn downsample(&self, factor: u32) -> Costmap {
        if factor <= 1 {
            return self.clone();
        }

        let new_x = self.size_x.div_ceil(factor);
        let new_y = self.size_y.div_ceil(factor);
        let mut data = vec![costs::FREE; (new_x as usize) * (new_y as usize)];

        for y in 0..self.size_y {
            for x in 0..self.size_x {
                let c = self.cost(x, y);
                let idx = ((y / factor) as usize) * (new_x as usize) + (x / factor) as usize;
                if c > data[idx] {
                    data[idx] = c;
                }
            }
        }

        Costmap {
            size_x: new_x,
            size_y: new_y,
            resolution: self.resolution * factor as f32,
            origin: self.origin,
            data,
        }
    }
}
