//! Navigation seam for the mission
//!
//! The planning service that drives each robot is an external collaborator. This
//! module defines what the mission needs from it: goal dispatch with a pollable
//! status, a velocity output for scanning and stopping, and a blocking wait for
//! the service at startup.

mod controller;

pub use controller::*;

use std::fmt;
use std::time::Duration;

use log::info;
use nalgebra::UnitQuaternion;

use crate::MissionError;

/// Interval between availability polls in [`wait_for_server`]
pub const SERVER_POLL: Duration = Duration::from_millis(100);

/// The two robots the mission drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Robot {
    /// Visits the search waypoints and localizes markers
    Explorer,
    /// Visits the localized markers afterwards
    Follower,
}

impl fmt::Display for Robot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Robot::Explorer => write!(f, "explorer"),
            Robot::Follower => write!(f, "follower"),
        }
    }
}

/// Navigation goal: a planar position with fixed orientation
#[derive(Debug, Clone, PartialEq)]
pub struct NavGoal {
    /// Frame the position is expressed in
    pub frame_id: String,
    /// Target x (meters)
    pub x: f64,
    /// Target y (meters)
    pub y: f64,
    /// Target orientation
    pub orientation: UnitQuaternion<f64>,
}

impl NavGoal {
    /// Goal at `(x, y)` in `frame_id` with identity orientation
    pub fn new(frame_id: &str, x: f64, y: f64) -> Self {
        NavGoal {
            frame_id: frame_id.to_string(),
            x,
            y,
            orientation: UnitQuaternion::identity(),
        }
    }
}

/// Status of the most recently sent goal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalStatus {
    /// Sent, not yet accepted
    Pending,
    /// Being executed
    Active,
    /// Reached
    Succeeded,
    /// Planner gave up
    Aborted,
    /// Planner refused the goal
    Rejected,
    /// Cancelled before completion
    Canceled,
    /// Contact with the goal was lost
    Lost,
}

impl GoalStatus {
    /// True for terminal outcomes other than success
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            GoalStatus::Aborted | GoalStatus::Rejected | GoalStatus::Canceled | GoalStatus::Lost
        )
    }
}

/// Asynchronous goal handle for one robot's planning service.
///
/// `send_goal` must not block, and must reset [`GoalClient::status`] so the outcome
/// of an earlier goal is never reported for the new one.
#[cfg_attr(test, mockall::automock)]
pub trait GoalClient {
    /// True once the planning service accepts goals
    fn is_server_ready(&self) -> bool;
    /// Replaces the current goal
    fn send_goal(&mut self, goal: NavGoal) -> Result<(), MissionError>;
    /// Non-blocking status poll
    fn status(&self) -> GoalStatus;
}

/// Blocks until `client`'s server is ready. `pump` is called between polls and is
/// expected to process middleware events for about the given duration; a notice is
/// logged every `notice_every`. Returns the number of polls that found the server
/// unavailable.
pub fn wait_for_server<C, P>(client: &C, robot: Robot, notice_every: Duration, mut pump: P) -> u32
where
    C: GoalClient + ?Sized,
    P: FnMut(Duration),
{
    let mut waited = Duration::ZERO;
    let mut polls = 0;
    while !client.is_server_ready() {
        pump(SERVER_POLL);
        polls += 1;
        waited += SERVER_POLL;
        if waited >= notice_every {
            info!("Waiting for the navigation action server to come up for {}", robot);
            waited = Duration::ZERO;
        }
    }
    info!("Navigation server for {} is up", robot);
    polls
}
