// core/state.rs

// Mission phases and sub-states, plus the mission's progress counters. The explicit
// enums replace loose "goal sent" / "start looking" / "exploring done" flags so that
// illegal combinations cannot be represented.

use super::perception::MarkerId;

/// Explorer sub-state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExploreStep {
    AwaitingDispatch, // next waypoint goes out this tick
    GoalActive,       // waiting for the planner to report success
    Scanning,         // rotating in place while the resolver localizes a marker
}

/// Follower sub-state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetrieveStep {
    AwaitingDispatch,
    GoalActive,
}

/// Mission state. Phases only ever move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissionState {
    /// Explorer visits waypoints and localizes markers
    Exploring(ExploreStep),
    /// Follower visits the localized markers, then home
    Retrieving(RetrieveStep),
    /// Follower reached home
    Done,
    /// A goal kept failing or a precondition broke
    Failed,
}

impl MissionState {
    /// True for [`MissionState::Done`] and [`MissionState::Failed`]
    pub fn is_terminal(self) -> bool {
        matches!(self, MissionState::Done | MissionState::Failed)
    }

    /// True while the explorer phase runs
    pub fn is_exploring(self) -> bool {
        matches!(self, MissionState::Exploring(_))
    }

    /// True while the follower phase runs
    pub fn is_retrieving(self) -> bool {
        matches!(self, MissionState::Retrieving(_))
    }
}

impl Default for MissionState {
    fn default() -> Self {
        MissionState::Exploring(ExploreStep::AwaitingDispatch)
    }
}

/// Progress counters. `None` means "not started".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MissionStatus {
    /// Index of the explorer's current waypoint
    pub explorer_target: Option<usize>,
    /// Marker identifier most recently localized
    pub observed_marker: Option<MarkerId>,
    /// Index of the follower's current destination
    pub follower_target: Option<usize>,
}

impl MissionStatus {
    /// Index of the explorer's next waypoint
    pub fn next_explorer_target(&self) -> usize {
        self.explorer_target.map_or(0, |i| i + 1)
    }

    /// Index of the follower's next destination
    pub fn next_follower_target(&self) -> usize {
        self.follower_target.map_or(0, |i| i + 1)
    }
}
