//! Generic A* search over grid and SE(2) lattice nodes.
//!
//! The engine is polymorphic over the node type: [`Node2D`] searches a
//! 4/8-connected grid, [`NodeSE2`] searches the (x, y, heading-bin) lattice
//! with motion-primitive expansion. Termination supports exact goal hits
//! and tolerance-based early exit bounded by an on-approach iteration cap.
//!
//! [`Node2D`]: crate::search::node::Node2D
//! [`NodeSE2`]: crate::search::node::NodeSE2

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::{debug, trace};
use thiserror::Error;

use crate::core::{GridPoint, GridPose};
use crate::costmap::Costmap;
use crate::search::graph::NodePool;
use crate::search::motion::{MotionModel, MotionTable};
use crate::search::node::{cost_traversable, SearchNode};

/// Search parameters fixed for the lifetime of one engine.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Blend between cell cost and travel distance in the edge cost,
    /// in [0, 1]: 1 = pure cost field, 0 = pure distance
    pub travel_cost_scale: f32,
    /// Whether unknown cells may be traversed
    pub allow_unknown: bool,
    /// Expansion budget; <= 0 disables the limit
    pub max_iterations: i32,
    /// Expansions allowed after the first within-tolerance node;
    /// <= 0 disables tolerance-based early exit
    pub max_on_approach_iterations: i32,
    /// Motion model searched
    pub motion_model: MotionModel,
    /// Minimum turning radius in cells (Ackermann models)
    pub min_turning_radius: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            travel_cost_scale: 0.8,
            allow_unknown: true,
            max_iterations: -1,
            max_on_approach_iterations: 1000,
            motion_model: MotionModel::Moore,
            min_turning_radius: 1.0,
        }
    }
}

/// Reason a search produced no path.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchError {
    #[error("start is not set")]
    StartNotSet,
    #[error("goal is not set")]
    GoalNotSet,
    #[error("graph is not set")]
    GraphNotSet,
    #[error("start is outside the costmap")]
    StartOutOfBounds,
    #[error("goal is outside the costmap")]
    GoalOutOfBounds,
    #[error("start is not traversable")]
    StartBlocked,
    #[error("goal is not traversable")]
    GoalBlocked,
    #[error("no valid path found")]
    NoPathFound,
    #[error("exceeded maximum iterations")]
    MaxIterationsExceeded,
}

/// Successful search output.
#[derive(Clone, Debug)]
pub struct SearchResult {
    /// Visited positions in continuous grid cells, ordered goal to start
    pub path: Vec<GridPoint>,
    /// Expansions performed
    pub iterations: usize,
}

/// Open-set entry. Ordering is reversed for the max-heap and ties fall back
/// to insertion order so identical inputs replay identically.
#[derive(Clone, Copy, Debug)]
struct QueueEntry {
    f_cost: f32,
    sequence: u64,
    index: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* search engine, generic over the node type.
///
/// Usage per plan: `create_graph` sizes the lattice to the costmap,
/// `set_start` / `set_goal` fix the endpoints, `create_path` runs the
/// search against a costmap snapshot. The node pool and open set retain
/// their allocations across plans.
pub struct AStar<N: SearchNode> {
    config: SearchConfig,
    max_iterations: usize,
    max_on_approach: usize,
    motion_table: Option<MotionTable>,
    graph: NodePool<N>,
    queue: BinaryHeap<QueueEntry>,
    sequence: u64,
    successors: Vec<crate::search::node::Successor>,
    start: Option<(u32, u32, u32)>,
    goal: Option<(u32, u32, u32)>,
}

fn resolve_limit(limit: i32) -> usize {
    if limit <= 0 {
        usize::MAX
    } else {
        limit as usize
    }
}

impl<N: SearchNode> AStar<N> {
    /// Create an engine with the given search parameters.
    pub fn new(config: SearchConfig) -> Self {
        let max_iterations = resolve_limit(config.max_iterations);
        let max_on_approach = resolve_limit(config.max_on_approach_iterations);
        Self {
            config,
            max_iterations,
            max_on_approach,
            motion_table: None,
            graph: NodePool::new(),
            queue: BinaryHeap::new(),
            sequence: 0,
            successors: Vec::new(),
            start: None,
            goal: None,
        }
    }

    /// The resolved expansion budget
    #[inline]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Replace the search parameters, keeping pool and queue allocations.
    ///
    /// Takes effect at the next `create_graph` call.
    pub fn reconfigure(&mut self, config: SearchConfig) {
        self.max_iterations = resolve_limit(config.max_iterations);
        self.max_on_approach = resolve_limit(config.max_on_approach_iterations);
        self.config = config;
    }

    /// Size the lattice to a costmap of `size_x` x `size_y` cells with
    /// `num_angle_quantization` heading bins (1 for plain 2D search).
    pub fn create_graph(&mut self, size_x: u32, size_y: u32, num_angle_quantization: u32) {
        let table = MotionTable::new(
            self.config.motion_model,
            size_x,
            size_y,
            num_angle_quantization,
            self.config.min_turning_radius,
        );
        self.graph.resize(table.num_indices());
        self.motion_table = Some(table);
    }

    /// Set the start cell and heading bin
    pub fn set_start(&mut self, mx: u32, my: u32, bin: u32) {
        self.start = Some((mx, my, bin));
    }

    /// Set the goal cell and heading bin
    pub fn set_goal(&mut self, mx: u32, my: u32, bin: u32) {
        self.goal = Some((mx, my, bin));
    }

    /// Search for a path on `costmap`.
    ///
    /// `tolerance_cells > 0` allows terminating at the best node within
    /// that Euclidean distance of the goal once the on-approach budget is
    /// spent (or the search otherwise exhausts). The returned path is
    /// ordered goal to start; callers reverse it for forward order.
    pub fn create_path(
        &mut self,
        costmap: &Costmap,
        tolerance_cells: f32,
    ) -> Result<SearchResult, SearchError> {
        let table = self.motion_table.as_ref().ok_or(SearchError::GraphNotSet)?;
        debug_assert_eq!(costmap.size_x(), table.size_x());
        debug_assert_eq!(costmap.size_y(), table.size_y());

        let (sx, sy, sbin) = self.start.ok_or(SearchError::StartNotSet)?;
        let (gx, gy, gbin) = self.goal.ok_or(SearchError::GoalNotSet)?;

        if sx >= table.size_x() || sy >= table.size_y() {
            return Err(SearchError::StartOutOfBounds);
        }
        if gx >= table.size_x() || gy >= table.size_y() {
            return Err(SearchError::GoalOutOfBounds);
        }

        let start_index = table.index(sx, sy, sbin % table.num_angle_quantization());
        let goal_index = table.index(gx, gy, gbin % table.num_angle_quantization());
        let goal_coords = GridPoint::new(gx as f32, gy as f32);

        let goal_cost = costmap.cost_at(table.cell_index(goal_index));
        if !cost_traversable(goal_cost, self.config.allow_unknown) {
            return Err(SearchError::GoalBlocked);
        }

        self.queue.clear();
        self.sequence = 0;

        // Seed the start node: g = 0, queued, pose at the cell center line
        let start_cost = costmap.cost_at(table.cell_index(start_index));
        {
            let node = self
                .graph
                .get_or_create(start_index, start_cost)
                .expect("start index inside sized pool");
            if !node.is_valid(self.config.allow_unknown) {
                return Err(SearchError::StartBlocked);
            }
            node.set_accumulated_cost(0.0);
            node.set_pose(GridPose::new(
                sx as f32,
                sy as f32,
                (sbin % table.num_angle_quantization()) as f32 * table.bin_size(),
            ));
            node.set_queued(true);
        }
        let h_start = GridPoint::new(sx as f32, sy as f32).distance(&goal_coords);
        self.queue.push(QueueEntry {
            f_cost: h_start,
            sequence: 0,
            index: start_index,
        });

        let travel = self.config.travel_cost_scale;
        let mut iterations = 0usize;
        let mut on_approach = 0usize;
        let mut best_in_tolerance: Option<(f32, usize)> = None;

        while let Some(entry) = self.queue.pop() {
            // Discard stale entries: the queued flag was already cleared
            // when a better entry for this node was processed.
            {
                let node = self
                    .graph
                    .node_mut(entry.index)
                    .expect("queued node exists");
                if !node.is_queued() {
                    continue;
                }
                node.set_queued(false);
            }

            iterations += 1;

            if entry.index == goal_index {
                trace!(
                    "goal reached after {} iterations, f = {:.2}",
                    iterations,
                    entry.f_cost
                );
                return Ok(SearchResult {
                    path: self.backtrace(table, entry.index),
                    iterations,
                });
            }

            if iterations >= self.max_iterations {
                if let Some((_, best)) = best_in_tolerance {
                    return Ok(SearchResult {
                        path: self.backtrace(table, best),
                        iterations,
                    });
                }
                debug!("gave up after {} iterations", iterations);
                return Err(SearchError::MaxIterationsExceeded);
            }

            let (coords, g_current) = {
                let node = self
                    .graph
                    .node_mut(entry.index)
                    .expect("queued node exists");
                node.visit();
                (node.coords(table), node.accumulated_cost())
            };

            if tolerance_cells > 0.0 {
                let h = coords.distance(&goal_coords);
                if h <= tolerance_cells {
                    match best_in_tolerance {
                        Some((best_h, _)) if best_h <= h => {}
                        _ => best_in_tolerance = Some((h, entry.index)),
                    }
                }
                if best_in_tolerance.is_some() {
                    on_approach += 1;
                    if on_approach >= self.max_on_approach {
                        let (_, best) = best_in_tolerance.unwrap();
                        trace!(
                            "tolerance exit after {} on-approach iterations",
                            on_approach
                        );
                        return Ok(SearchResult {
                            path: self.backtrace(table, best),
                            iterations,
                        });
                    }
                }
            }

            let mut scratch = std::mem::take(&mut self.successors);
            scratch.clear();
            {
                let node = self.graph.node(entry.index).expect("queued node exists");
                node.successors(table, &mut scratch);
            }

            for s in scratch.drain(..) {
                let cell_cost = costmap.cost_at(table.cell_index(s.index));
                if !cost_traversable(cell_cost, self.config.allow_unknown) {
                    continue;
                }

                let g_new =
                    g_current + travel * cell_cost as f32 + (1.0 - travel) * s.distance;

                let mut push = false;
                if let Some(neighbor) = self.graph.get_or_create(s.index, cell_cost) {
                    if !neighbor.was_visited() && g_new < neighbor.accumulated_cost() {
                        neighbor.set_accumulated_cost(g_new);
                        neighbor.set_parent(entry.index);
                        neighbor.set_pose(s.pose);
                        neighbor.set_queued(true);
                        push = true;
                    }
                }
                if push {
                    let h = s.pose.position().distance(&goal_coords);
                    self.sequence += 1;
                    self.queue.push(QueueEntry {
                        f_cost: g_new + h,
                        sequence: self.sequence,
                        index: s.index,
                    });
                }
            }
            self.successors = scratch;
        }

        if let Some((_, best)) = best_in_tolerance {
            return Ok(SearchResult {
                path: self.backtrace(table, best),
                iterations,
            });
        }

        debug!("open set exhausted after {} iterations", iterations);
        Err(SearchError::NoPathFound)
    }

    /// Walk parent indices from `index` back to the start.
    fn backtrace(&self, table: &MotionTable, index: usize) -> Vec<GridPoint> {
        let mut path = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            let node = self.graph.node(i).expect("path node exists");
            path.push(node.coords(table));
            current = node.parent();
        }
        path
    }
}
