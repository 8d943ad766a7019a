//! Graph search over costmap grids and SE(2) lattices.
//!
//! The pieces: [`MotionTable`] precomputes the primitive set for a
//! kinematic model, [`NodePool`] stores search vertices densely by linear
//! index, and [`AStar`] runs the priority search generically over
//! [`Node2D`] or [`NodeSE2`].

pub mod astar;
pub mod graph;
pub mod motion;
pub mod node;

pub use astar::{AStar, SearchConfig, SearchError, SearchResult};
pub use graph::NodePool;
pub use motion::{MotionModel, MotionPrimitive, MotionTable};
pub use node::{Node2D, NodeSE2, SearchNode, Successor};
