// core/mission.rs

// Mission state machine. One `tick` per control-loop cycle: dispatch the next goal when
// none is outstanding, poll the outstanding goal, drive the scan after each explorer
// waypoint, and hand over from exploring to retrieving exactly once. This is the only
// writer of the mission status and state.

use std::time::Instant;

use log::{error, info, warn};

use super::catalog::TargetCatalog;
use super::localization::{LocationResolver, Resolution};
use super::state::{ExploreStep, MissionState, MissionStatus, RetrieveStep};
use super::transform::TransformLookup;
use crate::config::MissionConfig;
use crate::navigation::{GoalClient, GoalStatus, NavGoal, Robot, VelocityCommand, VelocityPublisher};
use crate::MissionError;

/// Explorer/follower mission
pub struct Mission<E, F, V, L> {
    explorer: E,
    follower: F,
    velocity: V,
    resolver: LocationResolver<L>,
    catalog: TargetCatalog,
    status: MissionStatus,
    state: MissionState,
    map_frame: String,
    follower_home: [f64; 2],
    scan_command: VelocityCommand,
    max_goal_retries: u32,
    goal_retries: u32,
}

impl<E, F, V, L> Mission<E, F, V, L>
where
    E: GoalClient,
    F: GoalClient,
    V: VelocityPublisher,
    L: TransformLookup,
{
    /// Mission over the given collaborators, catalog built from `config`. Fails when
    /// `config` does not validate.
    pub fn new(
        config: &MissionConfig,
        explorer: E,
        follower: F,
        velocity: V,
        resolver: LocationResolver<L>,
    ) -> Result<Self, MissionError> {
        config.validate()?;
        Ok(Mission {
            explorer,
            follower,
            velocity,
            resolver,
            catalog: TargetCatalog::new(&config.waypoints, config.explorer_home),
            status: MissionStatus::default(),
            state: MissionState::default(),
            map_frame: config.frames.map.clone(),
            follower_home: config.follower_home,
            scan_command: VelocityCommand::rotate(config.scan_angular_velocity),
            max_goal_retries: config.max_goal_retries,
            goal_retries: 0,
        })
    }

    /// Current state
    pub fn state(&self) -> MissionState {
        self.state
    }

    /// Progress counters
    pub fn status(&self) -> MissionStatus {
        self.status
    }

    /// Waypoints and recorded marker locations
    pub fn catalog(&self) -> &TargetCatalog {
        &self.catalog
    }

    /// True once the follower is home and the process may exit
    pub fn shutdown_requested(&self) -> bool {
        self.state == MissionState::Done
    }

    /// Advances the mission by one control cycle. Any error is terminal: the state
    /// becomes [`MissionState::Failed`] and later ticks do nothing.
    pub fn tick(&mut self, now: Instant) -> Result<MissionState, MissionError> {
        let result = match self.state {
            MissionState::Exploring(step) => self.explore(step, now),
            MissionState::Retrieving(step) => self.retrieve(step),
            MissionState::Done | MissionState::Failed => Ok(()),
        };
        if let Err(e) = result {
            error!("Mission failed: {}", e);
            self.state = MissionState::Failed;
            return Err(e);
        }
        Ok(self.state)
    }

    fn explore(&mut self, step: ExploreStep, now: Instant) -> Result<(), MissionError> {
        if step == ExploreStep::AwaitingDispatch {
            self.dispatch_explorer()?;
        }
        match self.state {
            MissionState::Exploring(ExploreStep::GoalActive) => self.poll_explorer(now),
            MissionState::Exploring(ExploreStep::Scanning) => self.scan(now),
            _ => Ok(()),
        }
    }

    fn dispatch_explorer(&mut self) -> Result<(), MissionError> {
        let index = self.status.next_explorer_target();
        let goal = self.explorer_goal(index)?;
        info!("Sending goal #{} to explorer: ({:.2}, {:.2})", index, goal.x, goal.y);
        self.explorer.send_goal(goal)?;
        self.status.explorer_target = Some(index);
        self.goal_retries = 0;
        self.state = MissionState::Exploring(ExploreStep::GoalActive);
        Ok(())
    }

    fn poll_explorer(&mut self, now: Instant) -> Result<(), MissionError> {
        let index = self.status.explorer_target.unwrap_or_default();
        match self.explorer.status() {
            GoalStatus::Succeeded => {
                info!("Explorer reached goal #{}", index);
                self.resolver.begin_scan();
                self.state = MissionState::Exploring(ExploreStep::Scanning);
                self.scan(now)
            }
            status if status.is_failure() => self.redispatch(Robot::Explorer, index, status),
            _ => Ok(()),
        }
    }

    fn scan(&mut self, now: Instant) -> Result<(), MissionError> {
        let Resolution::Localized(location) = self.resolver.attempt(now, &mut self.catalog) else {
            return self.velocity.publish(self.scan_command);
        };
        self.status.observed_marker = Some(location.marker_id);
        let index = self.status.explorer_target.unwrap_or_default();
        if index >= self.catalog.last_search_index() {
            self.finish_exploring()
        } else {
            self.state = MissionState::Exploring(ExploreStep::AwaitingDispatch);
            Ok(())
        }
    }

    fn finish_exploring(&mut self) -> Result<(), MissionError> {
        let home = self.catalog.set_home(self.follower_home);
        self.catalog.log_summary();
        self.velocity.publish(VelocityCommand::stop())?;
        info!(
            "Explorer job done, follower home at ({:.2}, {:.2})",
            home.x, home.y
        );
        self.state = MissionState::Retrieving(RetrieveStep::AwaitingDispatch);
        Ok(())
    }

    fn retrieve(&mut self, step: RetrieveStep) -> Result<(), MissionError> {
        if step == RetrieveStep::AwaitingDispatch {
            self.dispatch_follower()?;
        }
        let index = self.status.follower_target.unwrap_or_default();
        match self.follower.status() {
            GoalStatus::Succeeded => {
                info!("Follower reached goal #{}", index);
                if index >= self.catalog.home_index() {
                    info!("Mission finished");
                    self.state = MissionState::Done;
                } else {
                    self.state = MissionState::Retrieving(RetrieveStep::AwaitingDispatch);
                }
                Ok(())
            }
            status if status.is_failure() => self.redispatch(Robot::Follower, index, status),
            _ => Ok(()),
        }
    }

    fn dispatch_follower(&mut self) -> Result<(), MissionError> {
        let index = self.status.next_follower_target();
        let goal = self.follower_goal(index)?;
        info!("Sending goal #{} to follower: ({:.2}, {:.2})", index, goal.x, goal.y);
        self.follower.send_goal(goal)?;
        self.status.follower_target = Some(index);
        self.goal_retries = 0;
        self.state = MissionState::Retrieving(RetrieveStep::GoalActive);
        Ok(())
    }

    fn explorer_goal(&self, index: usize) -> Result<NavGoal, MissionError> {
        let waypoint = self.catalog.waypoint(index)?;
        Ok(NavGoal::new(&self.map_frame, waypoint.x, waypoint.y))
    }

    fn follower_goal(&self, index: usize) -> Result<NavGoal, MissionError> {
        let location = self
            .catalog
            .marker_location(index)?
            .ok_or(MissionError::MarkerNotRecorded(index))?;
        Ok(NavGoal::new(&self.map_frame, location.x, location.y))
    }

    // Re-sends the same goal, or gives up once the retry budget is spent.
    fn redispatch(&mut self, robot: Robot, index: usize, status: GoalStatus) -> Result<(), MissionError> {
        if self.goal_retries >= self.max_goal_retries {
            return Err(MissionError::GoalFailed {
                robot,
                index,
                attempts: self.goal_retries + 1,
            });
        }
        self.goal_retries += 1;
        warn!(
            "{} goal #{} ended {:?}, re-sending ({}/{})",
            robot, index, status, self.goal_retries, self.max_goal_retries
        );
        match robot {
            Robot::Explorer => {
                let goal = self.explorer_goal(index)?;
                self.explorer.send_goal(goal)
            }
            Robot::Follower => {
                let goal = self.follower_goal(index)?;
                self.follower.send_goal(goal)
            }
        }
    }
}
