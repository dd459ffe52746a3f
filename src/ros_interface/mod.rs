//! ROS 2 interface for the mission
//!
//! r2r-backed implementations of the mission's collaborator seams:
//! - [`NavigateClient`]: nav2 `NavigateToPose` action client per robot
//! - [`TwistPublisher`]: explorer velocity output
//! - [`TfBroadcaster`]: marker frames onto `/tf`
//! - `/tf` + `/tf_static` listener feeding a [`TransformBuffer`]
//! - aruco marker subscription feeding an [`ObservationHandler`]
//!
//! Everything runs on the thread that owns the node: [`RosInterface::spin`] processes
//! middleware events and then drives the local futures behind subscriptions and goals.

mod action;
mod publisher;
mod subscriber;

pub use action::NavigateClient;
pub use publisher::{Publisher, TfBroadcaster, TwistPublisher};
pub use subscriber::{batch_from_markers, transform_from_msg};

use std::time::Duration;

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::SpawnError;
use log::info;
use r2r::{Context, Node, QosProfile};

use crate::config::MissionConfig;
use crate::core::{ObservationHandler, TransformBroadcaster, TransformBuffer};
use crate::MissionError;

impl From<r2r::Error> for MissionError {
    fn from(e: r2r::Error) -> Self {
        MissionError::Ros(e.to_string())
    }
}

impl From<SpawnError> for MissionError {
    fn from(e: SpawnError) -> Self {
        MissionError::Ros(format!("failed to spawn task: {e}"))
    }
}

/// Owns the ROS node and the local executor driving its streams
pub struct RosInterface {
    node: Node,
    pool: LocalPool,
    spawner: LocalSpawner,
}

impl RosInterface {
    /// Creates the node named in `config`
    pub fn new(config: &MissionConfig) -> Result<Self, MissionError> {
        let context = Context::create()?;
        let node = Node::create(context, &config.node_name, "")?;
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        info!("ROS node `{}` created", config.node_name);
        Ok(RosInterface { node, pool, spawner })
    }

    /// Processes pending middleware events, waiting at most `timeout` for one, then
    /// runs every local task that can make progress.
    pub fn spin(&mut self, timeout: Duration) {
        self.node.spin_once(timeout);
        self.pool.run_until_stalled();
    }

    /// Action client for the navigation server at `action`
    pub fn goal_client(&mut self, action: &str) -> Result<NavigateClient, MissionError> {
        NavigateClient::new(&mut self.node, &self.spawner, action)
    }

    /// Velocity publisher on `topic`
    pub fn velocity_publisher(&mut self, topic: &str) -> Result<TwistPublisher, MissionError> {
        Ok(Publisher::new(&mut self.node, topic, QosProfile::default())?)
    }

    /// Publisher for `/tf`
    pub fn tf_broadcaster(&mut self) -> Result<TfBroadcaster, MissionError> {
        Ok(Publisher::new(&mut self.node, "/tf", QosProfile::default())?)
    }

    /// Feeds `/tf` and `/tf_static` into `buffer`
    pub fn listen_tf(&mut self, buffer: TransformBuffer) -> Result<(), MissionError> {
        subscriber::spawn_tf_listener(&mut self.node, &self.spawner, buffer)
    }

    /// Feeds marker detections on `topic` into `handler`
    pub fn listen_markers<B>(&mut self, topic: &str, handler: ObservationHandler<B>) -> Result<(), MissionError>
    where
        B: TransformBroadcaster + 'static,
    {
        subscriber::spawn_marker_listener(&mut self.node, &self.spawner, topic, handler)
    }
}
