// src/error.rs
// Error types surfaced by the mission control loop.

use thiserror::Error;

use crate::navigation::Robot;

/// Errors that stop the mission control loop.
///
/// Transient transform lookup failures are not represented here; they stay inside
/// the location resolver (see [`crate::core::TransformError`]).
#[derive(Debug, Error)]
pub enum MissionError {
    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Config(String),
    /// Config file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// Config file is not valid YAML for [`crate::MissionConfig`]
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Catalog accessed past its end
    #[error("catalog index {index} out of range (len {len})")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Catalog length
        len: usize,
    },
    /// Follower reached a marker slot nobody wrote
    #[error("no marker location recorded for slot {0}")]
    MarkerNotRecorded(usize),
    /// Goal could not be handed to the planning service
    #[error("goal dispatch failed: {0}")]
    GoalDispatch(String),
    /// Goal kept failing after every re-dispatch
    #[error("{robot} goal #{index} failed after {attempts} attempts")]
    GoalFailed {
        /// Robot whose goal failed
        robot: Robot,
        /// Waypoint or marker slot index
        index: usize,
        /// Dispatches made, including the first one
        attempts: u32,
    },
    /// Output message could not be published
    #[error("publish failed: {0}")]
    Publish(String),
    /// Middleware failure
    #[error("ROS error: {0}")]
    Ros(String),
}
