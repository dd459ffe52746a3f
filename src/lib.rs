//! Explore/Follow - two-robot search and retrieve
//!
//! An explorer robot visits a fixed list of waypoints and localizes a fiducial marker
//! at each one; a follower robot then visits the recorded marker locations in order
//! and finally returns home. This crate provides the coordination core:
//!
//! - [`core`]: target catalog, marker frame relay, transform store, location resolver
//!   and the mission state machine
//! - [`navigation`]: the seam to the planning service and velocity output
//! - [`config`]: YAML mission configuration
//! - `ros_interface` (feature `ros`): r2r adapters for ROS 2

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod config;
pub mod core;
pub mod error;
pub mod navigation;
#[cfg(feature = "ros")]
pub mod ros_interface;

// Re-export commonly used items for easier access
pub use crate::config::MissionConfig;
pub use crate::core::{
    Mission, MissionContext, MissionState, MissionStatus, ObservationBatch, ObservationHandler,
    TargetCatalog, TransformBuffer,
};
pub use crate::error::MissionError;
pub use crate::navigation::{GoalClient, GoalStatus, NavGoal, Robot, VelocityCommand, VelocityPublisher};
