//! Search-graph vertices for the 2D grid and the SE(2) lattice.

use crate::core::{GridPoint, GridPose};
use crate::costmap::costs;
use crate::search::motion::{MotionModel, MotionTable};

const SQRT_2: f32 = std::f32::consts::SQRT_2;

/// 2D neighborhood as (dx, dy) offsets. The first four entries are the
/// cardinal (Von-Neumann) subset; the full table is the Moore neighborhood.
const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
    (-1, -1),
];

/// One expansion candidate produced by a node.
#[derive(Clone, Copy, Debug)]
pub struct Successor {
    /// Lattice index of the candidate
    pub index: usize,
    /// Continuous pose the candidate was projected to
    pub pose: GridPose,
    /// Euclidean length of the motion, in cells
    pub distance: f32,
}

/// Whether a cell cost is traversable under the active unknown-space policy.
#[inline]
pub(crate) fn cost_traversable(cost: u8, traverse_unknown: bool) -> bool {
    if cost == costs::OCCUPIED || cost == costs::INSCRIBED {
        return false;
    }
    if cost == costs::UNKNOWN && !traverse_unknown {
        return false;
    }
    true
}

/// Capability set the search engine needs from a graph vertex.
///
/// Nodes are plain data reused across plans: `reset` restores the initial
/// field values without reallocating. Parents are pool indices, never
/// references, so plan-to-plan pool reuse cannot dangle.
pub trait SearchNode {
    /// Create a node for `index` with the given cell cost
    fn new(cost: u8, index: usize) -> Self;

    /// Restore initial field values for reuse
    fn reset(&mut self, cost: u8, index: usize);

    /// Lattice index of this node
    fn index(&self) -> usize;

    /// Cost of the underlying costmap cell
    fn cell_cost(&self) -> f32;

    /// Accumulated cost from the start (g-value)
    fn accumulated_cost(&self) -> f32;
    fn set_accumulated_cost(&mut self, cost: f32);

    /// Parent index in the pool, `None` for the start
    fn parent(&self) -> Option<usize>;
    fn set_parent(&mut self, parent: usize);

    /// Whether this node has been expanded in the current plan
    fn was_visited(&self) -> bool;
    fn visit(&mut self);

    /// Whether this node has a live open-set entry
    fn is_queued(&self) -> bool;
    fn set_queued(&mut self, queued: bool);

    /// Whether the underlying cell may be traversed
    fn is_valid(&self, traverse_unknown: bool) -> bool;

    /// Planar position in continuous grid cells
    fn coords(&self, table: &MotionTable) -> GridPoint;

    /// Record the continuous pose this node was reached at (SE(2) only)
    fn set_pose(&mut self, pose: GridPose);

    /// Append all expansion candidates to `out`
    fn successors(&self, table: &MotionTable, out: &mut Vec<Successor>);
}

/// Vertex of the plain 2D grid search (Moore or Von-Neumann neighborhoods).
#[derive(Clone, Debug)]
pub struct Node2D {
    cell_cost: f32,
    accumulated_cost: f32,
    index: usize,
    parent: Option<usize>,
    visited: bool,
    queued: bool,
}

impl SearchNode for Node2D {
    fn new(cost: u8, index: usize) -> Self {
        Self {
            cell_cost: cost as f32,
            accumulated_cost: f32::MAX,
            index,
            parent: None,
            visited: false,
            queued: false,
        }
    }

    fn reset(&mut self, cost: u8, index: usize) {
        self.cell_cost = cost as f32;
        self.accumulated_cost = f32::MAX;
        self.index = index;
        self.parent = None;
        self.visited = false;
        self.queued = false;
    }

    #[inline]
    fn index(&self) -> usize {
        self.index
    }

    #[inline]
    fn cell_cost(&self) -> f32 {
        self.cell_cost
    }

    #[inline]
    fn accumulated_cost(&self) -> f32 {
        self.accumulated_cost
    }

    #[inline]
    fn set_accumulated_cost(&mut self, cost: f32) {
        self.accumulated_cost = cost;
    }

    #[inline]
    fn parent(&self) -> Option<usize> {
        self.parent
    }

    #[inline]
    fn set_parent(&mut self, parent: usize) {
        self.parent = Some(parent);
    }

    #[inline]
    fn was_visited(&self) -> bool {
        self.visited
    }

    #[inline]
    fn visit(&mut self) {
        self.visited = true;
    }

    #[inline]
    fn is_queued(&self) -> bool {
        self.queued
    }

    #[inline]
    fn set_queued(&mut self, queued: bool) {
        self.queued = queued;
    }

    #[inline]
    fn is_valid(&self, traverse_unknown: bool) -> bool {
        cost_traversable(self.cell_cost as u8, traverse_unknown)
    }

    fn coords(&self, table: &MotionTable) -> GridPoint {
        let width = table.size_x() as usize;
        GridPoint::new((self.index % width) as f32, (self.index / width) as f32)
    }

    fn set_pose(&mut self, _pose: GridPose) {}

    fn successors(&self, table: &MotionTable, out: &mut Vec<Successor>) {
        let width = table.size_x() as usize;
        let x = (self.index % width) as i32;
        let y = (self.index / width) as i32;

        let connectivity = match table.model() {
            MotionModel::VonNeumann => 4,
            _ => NEIGHBOR_OFFSETS.len(),
        };

        for &(dx, dy) in &NEIGHBOR_OFFSETS[..connectivity] {
            let nx = x + dx;
            let ny = y + dy;
            if nx < 0 || ny < 0 || nx as u32 >= table.size_x() || ny as u32 >= table.size_y() {
                continue;
            }
            out.push(Successor {
                index: (ny as usize) * width + (nx as usize),
                pose: GridPose::new(nx as f32, ny as f32, 0.0),
                distance: SQRT_2,
            });
        }
    }
}

/// Vertex of the SE(2) lattice search.
///
/// Carries the continuous pose it was reached at; successors are projected
/// from that pose through the motion table. Validity consults only the cell
/// under (x, y); full-footprint collision checking is not performed here.
#[derive(Clone, Debug)]
pub struct NodeSE2 {
    pose: GridPose,
    cell_cost: f32,
    accumulated_cost: f32,
    index: usize,
    parent: Option<usize>,
    visited: bool,
    queued: bool,
}

impl NodeSE2 {
    /// The continuous pose this node was reached at
    #[inline]
    pub fn pose(&self) -> GridPose {
        self.pose
    }
}

impl SearchNode for NodeSE2 {
    fn new(cost: u8, index: usize) -> Self {
        Self {
            pose: GridPose::default(),
            cell_cost: cost as f32,
            accumulated_cost: f32::MAX,
            index,
            parent: None,
            visited: false,
            queued: false,
        }
    }

    fn reset(&mut self, cost: u8, index: usize) {
        self.pose = GridPose::default();
        self.cell_cost = cost as f32;
        self.accumulated_cost = f32::MAX;
        self.index = index;
        self.parent = None;
        self.visited = false;
        self.queued = false;
    }

    #[inline]
    fn index(&self) -> usize {
        self.index
    }

    #[inline]
    fn cell_cost(&self) -> f32 {
        self.cell_cost
    }

    #[inline]
    fn accumulated_cost(&self) -> f32 {
        self.accumulated_cost
    }

    #[inline]
    fn set_accumulated_cost(&mut self, cost: f32) {
        self.accumulated_cost = cost;
    }

    #[inline]
    fn parent(&self) -> Option<usize> {
        self.parent
    }

    #[inline]
    fn set_parent(&mut self, parent: usize) {
        self.parent = Some(parent);
    }

    #[inline]
    fn was_visited(&self) -> bool {
        self.visited
    }

    #[inline]
    fn visit(&mut self) {
        self.visited = true;
    }

    #[inline]
    fn is_queued(&self) -> bool {
        self.queued
    }

    #[inline]
    fn set_queued(&mut self, queued: bool) {
        self.queued = queued;
    }

    #[inline]
    fn is_valid(&self, traverse_unknown: bool) -> bool {
        cost_traversable(self.cell_cost as u8, traverse_unknown)
    }

    #[inline]
    fn coords(&self, _table: &MotionTable) -> GridPoint {
        self.pose.position()
    }

    #[inline]
    fn set_pose(&mut self, pose: GridPose) {
        self.pose = pose;
    }

    fn successors(&self, table: &MotionTable, out: &mut Vec<Successor>) {
        for (i, primitive) in table.projections().iter().enumerate() {
            let projected = table.project(&self.pose, i);
            let mx = projected.x.floor() as i32;
            let my = projected.y.floor() as i32;
            if mx < 0 || my < 0 || mx as u32 >= table.size_x() || my as u32 >= table.size_y() {
                continue;
            }
            let bin = table.bin_of(projected.theta);
            out.push(Successor {
                index: table.index(mx as u32, my as u32, bin),
                pose: projected,
                distance: primitive.chord_length(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_traversability_bands() {
        assert!(cost_traversable(costs::FREE, false));
        assert!(cost_traversable(128, false));
        assert!(cost_traversable(252, false));
        assert!(!cost_traversable(costs::INSCRIBED, true));
        assert!(!cost_traversable(costs::OCCUPIED, true));
        assert!(cost_traversable(costs::UNKNOWN, true));
        assert!(!cost_traversable(costs::UNKNOWN, false));
    }

    #[test]
    fn test_node_defaults_and_reset() {
        let mut node = Node2D::new(42, 17);
        assert_eq!(node.index(), 17);
        assert_eq!(node.cell_cost(), 42.0);
        assert_eq!(node.accumulated_cost(), f32::MAX);
        assert!(node.parent().is_none());
        assert!(!node.was_visited());
        assert!(!node.is_queued());

        node.set_accumulated_cost(3.5);
        node.set_parent(4);
        node.visit();
        node.set_queued(true);

        node.reset(7, 99);
        assert_eq!(node.index(), 99);
        assert_eq!(node.cell_cost(), 7.0);
        assert_eq!(node.accumulated_cost(), f32::MAX);
        assert!(node.parent().is_none());
        assert!(!node.was_visited());
        assert!(!node.is_queued());
    }

    #[test]
    fn test_node2d_successor_counts() {
        let moore = MotionTable::new(MotionModel::Moore, 10, 10, 1, 0.0);
        let vn = MotionTable::new(MotionModel::VonNeumann, 10, 10, 1, 0.0);

        // Interior cell (5, 5)
        let node = Node2D::new(0, 5 * 10 + 5);
        let mut out = Vec::new();
        node.successors(&moore, &mut out);
        assert_eq!(out.len(), 8);
        out.clear();
        node.successors(&vn, &mut out);
        assert_eq!(out.len(), 4);

        // Corner cell (0, 0) loses out-of-grid neighbors
        let corner = Node2D::new(0, 0);
        out.clear();
        corner.successors(&moore, &mut out);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_node2d_coords_from_index() {
        let table = MotionTable::new(MotionModel::Moore, 10, 10, 1, 0.0);
        let node = Node2D::new(0, 7 * 10 + 3);
        let c = node.coords(&table);
        assert_eq!((c.x, c.y), (3.0, 7.0));
    }

    #[test]
    fn test_se2_successors_projected_from_pose() {
        let table = MotionTable::new(MotionModel::Dubin, 40, 40, 72, 5.0);
        let mut node = NodeSE2::new(0, table.index(10, 10, 0));
        node.set_pose(GridPose::new(10.0, 10.0, 0.0));

        let mut out = Vec::new();
        node.successors(&table, &mut out);
        assert_eq!(out.len(), 3);

        // Straight successor advances sqrt(2) along +x
        let straight = &out[0];
        assert!((straight.pose.x - (10.0 + std::f32::consts::SQRT_2)).abs() < 1e-5);
        assert!((straight.distance - std::f32::consts::SQRT_2).abs() < 1e-5);

        // Every successor lands in a different cell than the origin
        for s in &out {
            let cell = table.cell_index(s.index);
            assert_ne!(cell, 10 * 40 + 10);
        }
    }

    #[test]
    fn test_se2_successors_dropped_at_edge() {
        let table = MotionTable::new(MotionModel::Dubin, 40, 40, 72, 5.0);
        // Facing out of the grid near the +x edge
        let mut node = NodeSE2::new(0, table.index(39, 10, 0));
        node.set_pose(GridPose::new(39.5, 10.0, 0.0));

        let mut out = Vec::new();
        node.successors(&table, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_se2_spin_in_place_keeps_cell() {
        let table = MotionTable::new(MotionModel::BalkcomMason, 20, 20, 16, 0.0);
        let mut node = NodeSE2::new(0, table.index(5, 5, 0));
        node.set_pose(GridPose::new(5.0, 5.0, 0.0));

        let mut out = Vec::new();
        node.successors(&table, &mut out);
        // Spin primitives keep the cell but change the heading bin
        let spin = out
            .iter()
            .find(|s| (s.pose.x - 5.0).abs() < 1e-6 && (s.pose.theta - table.bin_size()).abs() < 1e-6)
            .expect("spin successor present");
        assert_eq!(table.cell_index(spin.index), 5 * 20 + 5);
        assert_eq!(spin.distance, 0.0);
    }

    #[test]
    fn test_se2_heading_wraps_into_bins() {
        let table = MotionTable::new(MotionModel::BalkcomMason, 20, 20, 16, 0.0);
        let mut node = NodeSE2::new(0, table.index(5, 5, 15));
        node.set_pose(GridPose::new(5.0, 5.0, -table.bin_size()));

        let mut out = Vec::new();
        node.successors(&table, &mut out);
        // Spinning left from bin 15 wraps to bin 0
        assert!(out
            .iter()
            .any(|s| s.index == table.index(5, 5, 0) && s.pose.theta.abs() < 1e-5));
    }

    #[test]
    fn test_pure_rotations_only_in_balkcom_mason() {
        for (model, expect_rotation) in [
            (MotionModel::Dubin, false),
            (MotionModel::ReedsShepp, false),
            (MotionModel::BalkcomMason, true),
        ] {
            let table = MotionTable::new(model, 20, 20, 16, 2.0);
            let has_rotation = table
                .projections()
                .iter()
                .any(|p| p.chord_length() == 0.0 && p.dtheta != 0.0);
            assert_eq!(has_rotation, expect_rotation, "{:?}", model);
        }
    }

    #[test]
    fn test_se2_about_face_pose() {
        let table = MotionTable::new(MotionModel::ReedsShepp, 20, 20, 16, 2.0);
        let mut node = NodeSE2::new(0, table.index(10, 10, 8));
        node.set_pose(GridPose::new(10.0, 10.0, PI));

        let mut out = Vec::new();
        node.successors(&table, &mut out);
        // Straight ahead while facing -x moves toward smaller x
        assert!(out.iter().any(|s| s.pose.x < 10.0 - 1.0));
    }
}
