// src/ros_interface/action.rs
// nav2 NavigateToPose client implementing the mission's goal seam. Goal requests and
// results are awaited on local tasks; the latest known status is kept in a cell the
// control loop polls. A generation counter keeps a superseded goal's result from
// overwriting the status of the goal that replaced it.

use std::cell::Cell;
use std::rc::Rc;

use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use log::{debug, warn};
use r2r::geometry_msgs::msg::{Point, Pose, PoseStamped, Quaternion};
use r2r::nav2_msgs::action::NavigateToPose;
use r2r::std_msgs::msg::Header;

use crate::navigation::{GoalClient, GoalStatus, NavGoal};
use crate::MissionError;

/// Navigation action client for one robot
pub struct NavigateClient {
    client: r2r::ActionClient<NavigateToPose::Action>,
    spawner: LocalSpawner,
    name: String,
    ready: Rc<Cell<bool>>,
    status: Rc<Cell<GoalStatus>>,
    generation: Rc<Cell<u64>>,
}

impl NavigateClient {
    pub(super) fn new(node: &mut r2r::Node, spawner: &LocalSpawner, action: &str) -> Result<Self, MissionError> {
        let client = node.create_action_client::<NavigateToPose::Action>(action)?;
        let available = node.is_available(&client)?;
        let ready = Rc::new(Cell::new(false));
        let flag = ready.clone();
        let name = action.to_string();
        spawner.spawn_local(async move {
            match available.await {
                Ok(()) => flag.set(true),
                Err(e) => warn!("{}: availability check failed: {}", name, e),
            }
        })?;

        Ok(NavigateClient {
            client,
            spawner: spawner.clone(),
            name: action.to_string(),
            ready,
            status: Rc::new(Cell::new(GoalStatus::Pending)),
            generation: Rc::new(Cell::new(0)),
        })
    }
}

impl GoalClient for NavigateClient {
    fn is_server_ready(&self) -> bool {
        self.ready.get()
    }

    fn send_goal(&mut self, goal: NavGoal) -> Result<(), MissionError> {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.status.set(GoalStatus::Pending);

        let request = self
            .client
            .send_goal_request(navigate_goal(&goal))
            .map_err(|e| MissionError::GoalDispatch(e.to_string()))?;
        let status = self.status.clone();
        let current = self.generation.clone();
        let name = self.name.clone();
        self.spawner
            .spawn_local(async move {
                let update = |s: GoalStatus| {
                    if current.get() == generation {
                        status.set(s);
                    } else {
                        debug!("{}: dropping {:?} of superseded goal", name, s);
                    }
                };
                let (_handle, result, _feedback) = match request.await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("{}: goal not accepted: {}", name, e);
                        update(GoalStatus::Rejected);
                        return;
                    }
                };
                update(GoalStatus::Active);
                match result.await {
                    Ok((outcome, _)) => update(goal_status(outcome)),
                    Err(e) => {
                        warn!("{}: lost goal result: {}", name, e);
                        update(GoalStatus::Lost);
                    }
                }
            })
            .map_err(|e| MissionError::GoalDispatch(e.to_string()))
    }

    fn status(&self) -> GoalStatus {
        self.status.get()
    }
}

fn navigate_goal(goal: &NavGoal) -> NavigateToPose::Goal {
    let q = goal.orientation.into_inner();
    NavigateToPose::Goal {
        pose: PoseStamped {
            // zero stamp: use the latest available transform
            header: Header {
                frame_id: goal.frame_id.clone(),
                ..Default::default()
            },
            pose: Pose {
                position: Point {
                    x: goal.x,
                    y: goal.y,
                    z: 0.0,
                },
                orientation: Quaternion {
                    x: q.i,
                    y: q.j,
                    z: q.k,
                    w: q.w,
                },
            },
        },
        ..Default::default()
    }
}

fn goal_status(status: r2r::GoalStatus) -> GoalStatus {
    match status {
        r2r::GoalStatus::Accepted => GoalStatus::Pending,
        r2r::GoalStatus::Executing | r2r::GoalStatus::Canceling => GoalStatus::Active,
        r2r::GoalStatus::Succeeded => GoalStatus::Succeeded,
        r2r::GoalStatus::Canceled => GoalStatus::Canceled,
        r2r::GoalStatus::Aborted => GoalStatus::Aborted,
        _ => GoalStatus::Lost,
    }
}
