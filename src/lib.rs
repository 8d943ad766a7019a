//! # Marga-Plan: Kinematically-Aware Global Path Planning
//!
//! A global path planner for mobile robots on 2D occupancy grids. Given a
//! costmap snapshot, a start pose, and a goal pose, it produces a sequence
//! of world-space waypoints that is collision-free, respects the motion
//! constraints of the chosen kinematic model, and is smooth enough for a
//! downstream controller to follow.
//!
//! ## Motion models
//!
//! - **MOORE / VON_NEUMANN**: plain 8- / 4-connected 2D grid search
//! - **DUBIN**: forward-only Ackermann with a minimum turning radius
//! - **REEDS_SHEPP**: forward/reverse Ackermann with a minimum turning radius
//! - **BALKCOM_MASON**: differential drive / omnidirectional, spin in place
//!
//! ## Quick Start
//!
//! ```rust
//! use marga_plan::{costs, Costmap, PathPlanner, PlannerConfig, Pose2D, WorldPoint};
//!
//! // 4 m x 4 m of free space at 5 cm resolution
//! let costmap = Costmap::filled(80, 80, 0.05, WorldPoint::ZERO, costs::FREE);
//!
//! let mut planner = PathPlanner::new(PlannerConfig::default()).unwrap();
//! let plan = planner.create_plan(
//!     &costmap,
//!     Pose2D::new(0.5, 0.5, 0.0),
//!     Pose2D::new(3.5, 3.5, 0.0),
//! );
//! assert!(plan.found());
//! println!("{} waypoints, {:.2} m", plan.waypoints.len(), plan.length());
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: coordinate and pose types shared across the planner
//! - [`costmap`]: read-only cost grid with world conversions
//! - [`search`]: motion tables, node pool, and the generic A* engine
//! - [`smoother`]: costmap-aware nonlinear smoothing and upsampling
//! - [`planner`]: the facade orchestrating search and refinement
//! - [`config`]: TOML-loadable configuration with validation
//!
//! ## Pipeline
//!
//! ```text
//! costmap snapshot + poses
//!        |
//!        v
//!  [optional downsample] -> [A* search] -> [grid -> world]
//!                                               |
//!                                               v
//!                          [smoother] -> [hook removal] -> [upsampler]
//! ```
//!
//! Failures degrade gracefully: a failed smooth or upsample returns the
//! most-refined path that succeeded, and a failed search returns an empty
//! path with its reason attached.

pub mod config;
pub mod core;
pub mod costmap;
pub mod error;
pub mod planner;
pub mod search;
pub mod smoother;

pub use config::{OptimizerConfig, PlannerConfig, SmootherConfig};
pub use self::core::{GridCoord, GridPoint, GridPose, Pose2D, WorldPoint};
pub use costmap::{costs, Costmap};
pub use error::{PlannerError, Result};
pub use planner::{PathPlanner, PlannedPath};
pub use search::{AStar, MotionModel, MotionTable, SearchConfig, SearchError};
pub use smoother::{Smoother, Upsampler};
