// tests/common/mod.rs
// Simulated collaborators for mission scenarios: scripted navigation servers, a
// recording velocity sink, a `/tf` link that delivers one loop iteration late, and a
// camera that "sees" the marker placed near each explorer waypoint.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::SystemTime;

use explore_follow::core::{
    Detection, ObservationBatch, StampedTransform, TransformBroadcaster, TransformError, TransformLookup,
};
use explore_follow::{GoalClient, GoalStatus, MissionError, NavGoal, TransformBuffer, VelocityCommand, VelocityPublisher};
use nalgebra::{Isometry3, UnitQuaternion, Vector3};

pub type Shared<T> = Rc<RefCell<Vec<T>>>;

/// Navigation server that reports `Active` for a few polls, then the scripted outcome
pub struct SimClient {
    sent: Shared<NavGoal>,
    active_polls: u32,
    polls: Cell<u32>,
    outcomes: VecDeque<GoalStatus>,
    current: Option<GoalStatus>,
}

impl SimClient {
    pub fn new(active_polls: u32) -> (Self, Shared<NavGoal>) {
        let sent = Shared::default();
        let client = SimClient {
            sent: sent.clone(),
            active_polls,
            polls: Cell::new(0),
            outcomes: VecDeque::new(),
            current: None,
        };
        (client, sent)
    }

    /// Outcomes for successive goals; goals beyond the script succeed
    pub fn with_outcomes(mut self, outcomes: impl IntoIterator<Item = GoalStatus>) -> Self {
        self.outcomes = outcomes.into_iter().collect();
        self
    }
}

impl GoalClient for SimClient {
    fn is_server_ready(&self) -> bool {
        true
    }

    fn send_goal(&mut self, goal: NavGoal) -> Result<(), MissionError> {
        self.sent.borrow_mut().push(goal);
        self.polls.set(0);
        self.current = Some(self.outcomes.pop_front().unwrap_or(GoalStatus::Succeeded));
        Ok(())
    }

    fn status(&self) -> GoalStatus {
        let Some(outcome) = self.current else {
            return GoalStatus::Pending;
        };
        let polls = self.polls.get();
        self.polls.set(polls + 1);
        if polls < self.active_polls { GoalStatus::Active } else { outcome }
    }
}

/// Velocity sink that records every command
pub struct RecordingVelocity {
    commands: Shared<VelocityCommand>,
}

impl RecordingVelocity {
    pub fn new() -> (Self, Shared<VelocityCommand>) {
        let commands = Shared::default();
        (RecordingVelocity { commands: commands.clone() }, commands)
    }
}

impl VelocityPublisher for RecordingVelocity {
    fn publish(&self, command: VelocityCommand) -> Result<(), MissionError> {
        self.commands.borrow_mut().push(command);
        Ok(())
    }
}

/// Lookup that fails a fixed number of times before delegating to the buffer
pub struct FlakyLookup {
    inner: TransformBuffer,
    failures_left: Cell<u32>,
    calls: Rc<Cell<u32>>,
}

impl FlakyLookup {
    pub fn new(inner: TransformBuffer, failures: u32) -> (Self, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let lookup = FlakyLookup {
            inner,
            failures_left: Cell::new(failures),
            calls: calls.clone(),
        };
        (lookup, calls)
    }
}

impl TransformLookup for FlakyLookup {
    fn lookup_latest(
        &self,
        target: &str,
        source: &str,
        not_before: SystemTime,
    ) -> Result<Isometry3<f64>, TransformError> {
        self.calls.set(self.calls.get() + 1);
        let left = self.failures_left.get();
        if left > 0 {
            self.failures_left.set(left - 1);
            return Err(TransformError::FrameNotFound(source.to_string()));
        }
        self.inner.lookup_latest(target, source, not_before)
    }
}

/// Middleware `/tf` link: sent transforms wait until [`DelayedTf::deliver`]
pub struct DelayedTf {
    in_flight: Shared<StampedTransform>,
}

impl DelayedTf {
    pub fn new() -> (Self, Shared<StampedTransform>) {
        let in_flight = Shared::default();
        (DelayedTf { in_flight: in_flight.clone() }, in_flight)
    }

    /// Hands everything in flight to the subscriber side
    pub fn deliver(in_flight: &Shared<StampedTransform>, buffer: &TransformBuffer) {
        for transform in in_flight.borrow_mut().drain(..) {
            buffer.insert(transform);
        }
    }
}

impl TransformBroadcaster for DelayedTf {
    fn send_transform(&self, transform: StampedTransform) -> Result<(), MissionError> {
        self.in_flight.borrow_mut().push(transform);
        Ok(())
    }
}

pub const CAMERA: &str = "explorer_tf/camera_rgb_optical_frame";

/// Places the explorer camera at `(x, y)` in the map, facing along the map axes
pub fn place_camera(transforms: &TransformBuffer, x: f64, y: f64) {
    transforms.insert(StampedTransform::new(
        "map",
        CAMERA,
        Isometry3::translation(x, y, 0.0),
        SystemTime::now(),
    ));
}

/// Detection whose secondary frame lands `(dx, dy)` from the camera in the map plane
pub fn detection(marker_id: usize, dx: f64, dy: f64) -> Detection {
    Detection::new(marker_id, Vector3::new(dx, dy, -0.4), UnitQuaternion::identity())
}

/// Batch with a single detection
pub fn sighting(marker_id: usize, dx: f64, dy: f64) -> ObservationBatch {
    ObservationBatch::new(vec![detection(marker_id, dx, dy)])
}

pub fn assert_goal_near(goal: &NavGoal, x: f64, y: f64) {
    assert!(
        (goal.x - x).abs() < 1e-9 && (goal.y - y).abs() < 1e-9,
        "expected goal at ({x}, {y}), got ({}, {})",
        goal.x,
        goal.y
    );
    assert_eq!(goal.frame_id, "map");
}
