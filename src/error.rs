//! Error types for the planner.

use thiserror::Error;

/// Fatal planner error type.
///
/// Covers conditions that make a planner unusable: rejected configuration
/// and malformed costmap snapshots. Recoverable per-plan failures (no path,
/// iteration budget, solver giving up) are reported on [`PlannedPath`]
/// instead and never raise this type.
///
/// [`PlannedPath`]: crate::planner::PlannedPath
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Costmap error: {0}")]
    Costmap(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for PlannerError {
    fn from(e: toml::de::Error) -> Self {
        PlannerError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlannerError>;
