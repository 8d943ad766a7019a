//! Planner facade: costmap snapshot and poses in, world-space path out.
//!
//! Orchestrates the full pipeline: optional costmap downsampling, graph
//! search with the configured motion model, grid-to-world conversion,
//! smoothing, hook removal, and optional upsampling. Per-plan failures
//! degrade gracefully: the most-refined result that succeeded is returned,
//! and a plan that found no path comes back empty with its failure reason.

use std::time::Instant;

use log::{info, warn};

use crate::config::PlannerConfig;
use crate::core::{Pose2D, WorldPoint};
use crate::costmap::Costmap;
use crate::error::Result;
use crate::search::{
    AStar, Node2D, NodeSE2, SearchConfig, SearchError, SearchNode, SearchResult,
};
use crate::smoother::{remove_hook, Smoother, Upsampler};

/// Ratio the raw path is decimated by before smoothing, giving the
/// optimizer slack to move waypoints.
const PRE_SMOOTHING_DECIMATION: usize = 4;

/// Result of one planning request.
#[derive(Clone, Debug)]
pub struct PlannedPath {
    /// Waypoints in world meters, ordered start to goal; empty on failure
    pub waypoints: Vec<WorldPoint>,
    /// Search expansions performed
    pub iterations: usize,
    /// Why the plan is empty, when it is
    pub failure: Option<SearchError>,
}

impl PlannedPath {
    fn empty(failure: SearchError) -> Self {
        Self {
            waypoints: Vec::new(),
            iterations: 0,
            failure: Some(failure),
        }
    }

    /// Whether a path was produced
    #[inline]
    pub fn found(&self) -> bool {
        self.failure.is_none() && !self.waypoints.is_empty()
    }

    /// Total path length in meters
    pub fn length(&self) -> f32 {
        self.waypoints
            .windows(2)
            .map(|w| w[0].distance(&w[1]))
            .sum()
    }
}

/// Kinematically-aware global path planner.
///
/// Construction validates the configuration. The search engine (node pool
/// and open set included) is kept across plans so repeated requests reuse
/// their allocations. The costmap snapshot passed to
/// [`create_plan`](Self::create_plan) must stay unchanged for the duration
/// of the call (hold the producer's lock or hand over a copy).
pub struct PathPlanner {
    config: PlannerConfig,
    engine_2d: Option<AStar<Node2D>>,
    engine_se2: Option<AStar<NodeSE2>>,
}

impl PathPlanner {
    /// Create a planner, rejecting invalid configuration.
    pub fn new(mut config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Planner configured with motion model {}, travel cost scale {:.2}, tolerance {:.3} m, \
             {} unknown traversal",
            config.motion_model_for_search,
            config.travel_cost_scale,
            config.tolerance,
            if config.allow_unknown { "allowing" } else { "not allowing" },
        );
        Ok(Self {
            config,
            engine_2d: None,
            engine_se2: None,
        })
    }

    /// The validated configuration
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan a path from `start` to `goal` on `costmap`.
    pub fn create_plan(&mut self, costmap: &Costmap, start: Pose2D, goal: Pose2D) -> PlannedPath {
        let clock = Instant::now();
        let config = &self.config;

        let downsampled;
        let map: &Costmap = if config.downsample_costmap && config.downsampling_factor > 1 {
            downsampled = costmap.downsample(config.downsampling_factor);
            &downsampled
        } else {
            costmap
        };

        let model = config.motion_model_for_search;
        let search = SearchConfig {
            travel_cost_scale: config.travel_cost_scale,
            allow_unknown: config.allow_unknown,
            max_iterations: config.max_iterations,
            max_on_approach_iterations: config.max_on_approach_iterations,
            motion_model: model,
            min_turning_radius: config.minimum_turning_radius / map.resolution(),
        };
        let bins = if model.is_se2() {
            config.angle_quantization_bins
        } else {
            1
        };
        let tolerance_cells = config.tolerance / map.resolution();

        let outcome = if model.is_se2() {
            let engine = self
                .engine_se2
                .get_or_insert_with(|| AStar::new(search.clone()));
            engine.reconfigure(search);
            run_search(engine, bins, map, start, goal, tolerance_cells)
        } else {
            let engine = self
                .engine_2d
                .get_or_insert_with(|| AStar::new(search.clone()));
            engine.reconfigure(search);
            run_search(engine, bins, map, start, goal, tolerance_cells)
        };

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!("failed to create plan, {}", e);
                return PlannedPath::empty(e);
            }
        };
        let iterations = result.iterations;

        // Search output is goal -> start in grid cells; flip and convert
        let mut waypoints: Vec<WorldPoint> = result
            .path
            .iter()
            .rev()
            .map(|p| map.map_to_world(p.x, p.y))
            .collect();

        // The endpoints represent the request, not cell centers
        waypoints[0] = start.position();
        let reached_goal_cell = map
            .world_to_map(*waypoints.last().unwrap())
            .zip(map.world_to_map(goal.position()))
            .is_some_and(|(reached, wanted)| reached == wanted);
        if reached_goal_cell {
            *waypoints.last_mut().unwrap() = goal.position();
        }

        if !config.smooth_path {
            return PlannedPath {
                waypoints,
                iterations,
                failure: None,
            };
        }

        let mut to_smooth: Vec<WorldPoint> = waypoints
            .iter()
            .copied()
            .step_by(PRE_SMOOTHING_DECIMATION)
            .collect();
        if (waypoints.len() - 1) % PRE_SMOOTHING_DECIMATION != 0 {
            to_smooth.push(*waypoints.last().unwrap());
        }
        if to_smooth.len() < 4 {
            return PlannedPath {
                waypoints,
                iterations,
                failure: None,
            };
        }

        let smoother = Smoother::new(config.smoother.optimizer.clone());
        let budget = config.max_planning_time;
        let mut smoothed = to_smooth;
        let smooth_ok = if budget > 0.0 {
            let elapsed = clock.elapsed().as_secs_f32();
            if elapsed >= budget {
                warn!(
                    "planning budget of {:.2} s already spent by the search; returning the raw path",
                    budget
                );
                return PlannedPath {
                    waypoints,
                    iterations,
                    failure: None,
                };
            }
            // Give the optimizer the iteration share the budget leaves over
            let remaining = 1.0 - elapsed / budget;
            let cap = ((config.smoother.optimizer.max_iterations as f32) * remaining).ceil();
            smoother.smooth_with_iteration_cap(
                &mut smoothed,
                map,
                &config.smoother,
                cap as usize,
            )
        } else {
            smoother.smooth(&mut smoothed, map, &config.smoother)
        };

        if !smooth_ok {
            warn!("failed to smooth plan, the optimizer could not find a usable solution");
            return PlannedPath {
                waypoints,
                iterations,
                failure: None,
            };
        }
        remove_hook(&mut smoothed);

        if config.upsample_path {
            let upsampler = Upsampler::new(config.smoother.optimizer.clone());
            let mut dense = smoothed.clone();
            if upsampler.upsample(&mut dense, map, &config.smoother, config.smoother.upsampling_ratio)
            {
                smoothed = dense;
            } else {
                warn!("failed to upsample plan, the optimizer could not find a usable solution");
            }
        }

        if budget > 0.0 && clock.elapsed().as_secs_f32() > budget {
            warn!("planning exceeded its {:.2} s budget", budget);
        }

        PlannedPath {
            waypoints: smoothed,
            iterations,
            failure: None,
        }
    }
}

/// Run one search on a (possibly reused) engine.
fn run_search<N: SearchNode>(
    engine: &mut AStar<N>,
    bins: u32,
    map: &Costmap,
    start: Pose2D,
    goal: Pose2D,
    tolerance_cells: f32,
) -> std::result::Result<SearchResult, SearchError> {
    let start_cell = map
        .world_to_map(start.position())
        .ok_or(SearchError::StartOutOfBounds)?;
    let goal_cell = map
        .world_to_map(goal.position())
        .ok_or(SearchError::GoalOutOfBounds)?;

    let bin_size = 2.0 * std::f32::consts::PI / bins as f32;
    let start_bin = heading_bin(start.theta, bin_size, bins);
    let goal_bin = heading_bin(goal.theta, bin_size, bins);

    engine.create_graph(map.size_x(), map.size_y(), bins);
    engine.set_start(start_cell.x as u32, start_cell.y as u32, start_bin);
    engine.set_goal(goal_cell.x as u32, goal_cell.y as u32, goal_bin);
    engine.create_path(map, tolerance_cells)
}

/// Quantize a heading into its angular bin.
fn heading_bin(theta: f32, bin_size: f32, bins: u32) -> u32 {
    ((theta / bin_size).round() as i64).rem_euclid(bins as i64) as u32
}
