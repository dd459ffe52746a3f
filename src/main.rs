// src/main.rs
// Entry point: loads the mission config, connects both robots' navigation servers,
// wires the marker relay and resolver, and runs the mission loop until the follower
// is home.

use std::error::Error;
use std::time::{Duration, Instant};

use explore_follow::core::{EchoBroadcaster, MissionContext};
use explore_follow::navigation::{wait_for_server, LoopRate, Robot};
use explore_follow::ros_interface::RosInterface;
use explore_follow::{MissionConfig, TransformBuffer};
use log::info;

const DEFAULT_CONFIG: &str = "config/mission.yaml";

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = MissionConfig::load(&config_path)?;

    let mut ros = RosInterface::new(&config)?;
    let transforms = TransformBuffer::new();
    ros.listen_tf(transforms.clone())?;

    let explorer = ros.goal_client(&config.topics.explorer_action)?;
    let follower = ros.goal_client(&config.topics.follower_action)?;
    wait_for_server(&explorer, Robot::Explorer, config.server_wait(), |d| ros.spin(d));
    wait_for_server(&follower, Robot::Follower, config.server_wait(), |d| ros.spin(d));

    let cmd_vel = ros.velocity_publisher(&config.topics.explorer_cmd_vel)?;
    // relayed marker frames must be visible to the resolver before the /tf echo arrives
    let broadcaster = EchoBroadcaster::new(transforms.clone(), ros.tf_broadcaster()?);
    let context = MissionContext::new(&config, explorer, follower, cmd_vel, broadcaster, transforms)?;
    let (mut mission, observations) = context.into_parts();
    ros.listen_markers(&config.topics.markers, observations)?;
    info!("Mission started with {} search waypoints", config.waypoints.len());

    let mut rate = LoopRate::new(config.tick_rate_hz);
    info!("Control loop period {:?}", rate.period());
    while !mission.shutdown_requested() {
        ros.spin(Duration::ZERO);
        mission.tick(Instant::now())?;
        // flush goal requests issued during the tick
        ros.spin(Duration::ZERO);
        rate.sleep();
    }

    info!("PROJECT FINISHED");
    Ok(())
}
