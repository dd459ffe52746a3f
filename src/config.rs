// src/config.rs
// Mission configuration loaded once at startup from YAML.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use log::info;
use serde::Deserialize;

use crate::MissionError;

/// Frame names used by the relay and the resolver
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrameNames {
    /// Global frame goals and marker locations are expressed in
    pub map: String,
    /// Optical frame of the explorer camera, parent of the marker frame
    pub camera: String,
    /// Frame anchored at the observed marker pose
    pub marker: String,
    /// Frame offset from the marker frame, looked up in the map frame
    pub secondary: String,
}

impl Default for FrameNames {
    fn default() -> Self {
        FrameNames {
            map: "map".to_string(),
            camera: "explorer_tf/camera_rgb_optical_frame".to_string(),
            marker: "marker_frame".to_string(),
            secondary: "secondary_frame".to_string(),
        }
    }
}

/// Topic and action names
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TopicNames {
    /// Explorer navigation action server
    pub explorer_action: String,
    /// Follower navigation action server
    pub follower_action: String,
    /// Explorer velocity command topic
    pub explorer_cmd_vel: String,
    /// Marker detections topic
    pub markers: String,
}

impl Default for TopicNames {
    fn default() -> Self {
        TopicNames {
            explorer_action: "/explorer/navigate_to_pose".to_string(),
            follower_action: "/follower/navigate_to_pose".to_string(),
            explorer_cmd_vel: "/explorer/cmd_vel".to_string(),
            markers: "/aruco_markers".to_string(),
        }
    }
}

/// Top-level mission configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MissionConfig {
    /// Explorer search waypoints in visit order, `[x, y]` in the map frame
    pub waypoints: Vec<[f64; 2]>,
    /// Older parameter layout: `target_1`, `target_2`, ... keyed waypoints
    pub(crate) aruco_lookup_locations: BTreeMap<String, [f64; 2]>,
    /// Explorer home, stored as the last waypoint list entry
    pub explorer_home: [f64; 2],
    /// Follower home, appended as the final follower destination
    pub follower_home: [f64; 2],
    /// Control loop rate
    pub tick_rate_hz: f64,
    /// Wait after a failed transform lookup
    pub lookup_backoff_ms: u64,
    /// Rotation rate while scanning for a marker (rad/s)
    pub scan_angular_velocity: f64,
    /// Offset of the secondary frame from the marker frame
    pub marker_offset: [f64; 3],
    /// Re-dispatches allowed for a goal that ends without success
    pub max_goal_retries: u32,
    /// How long to wait for a planning server between notices
    pub server_wait_secs: u64,
    /// Frame names
    pub frames: FrameNames,
    /// Topic and action names
    pub topics: TopicNames,
    /// ROS node name
    pub node_name: String,
}

impl Default for MissionConfig {
    fn default() -> Self {
        MissionConfig {
            waypoints: Vec::new(),
            aruco_lookup_locations: BTreeMap::new(),
            explorer_home: [-4.0, 2.5],
            follower_home: [-4.0, 3.5],
            tick_rate_hz: 10.0,
            lookup_backoff_ms: 1000,
            scan_angular_velocity: 0.1,
            marker_offset: [0.0, 0.0, 0.4],
            max_goal_retries: 3,
            server_wait_secs: 5,
            frames: FrameNames::default(),
            topics: TopicNames::default(),
            node_name: "explore_follow".to_string(),
        }
    }
}

impl MissionConfig {
    /// Default configuration with the given search waypoints
    pub fn with_waypoints(waypoints: Vec<[f64; 2]>) -> Self {
        MissionConfig {
            waypoints,
            ..MissionConfig::default()
        }
    }

    /// Reads and validates a YAML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MissionError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let config: MissionConfig = serde_yaml::from_reader(file)?;
        let config = config.resolve_waypoints()?;
        info!(
            "Loaded mission config from {} ({} search waypoints)",
            path.display(),
            config.waypoints.len()
        );
        Ok(config)
    }

    /// Parses and validates a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, MissionError> {
        let config: MissionConfig = serde_yaml::from_str(yaml)?;
        config.resolve_waypoints()
    }

    // Folds the keyed `target_N` layout into `waypoints` when the list is absent.
    fn resolve_waypoints(mut self) -> Result<Self, MissionError> {
        if self.waypoints.is_empty() && !self.aruco_lookup_locations.is_empty() {
            let mut keyed = Vec::with_capacity(self.aruco_lookup_locations.len());
            for (key, point) in &self.aruco_lookup_locations {
                let order = key
                    .strip_prefix("target_")
                    .and_then(|n| n.parse::<u32>().ok())
                    .ok_or_else(|| {
                        MissionError::Config(format!("unexpected lookup location key `{key}`"))
                    })?;
                keyed.push((order, *point));
            }
            keyed.sort_by_key(|(order, _)| *order);
            self.waypoints = keyed.into_iter().map(|(_, point)| point).collect();
        }
        self.aruco_lookup_locations.clear();
        self.validate()?;
        Ok(self)
    }

    /// Checks the invariants the mission relies on
    pub fn validate(&self) -> Result<(), MissionError> {
        if self.waypoints.is_empty() {
            return Err(MissionError::Config("no search waypoints configured".into()));
        }
        if !(self.tick_rate_hz.is_finite() && self.tick_rate_hz > 0.0) {
            return Err(MissionError::Config(format!(
                "tick_rate_hz must be positive, got {}",
                self.tick_rate_hz
            )));
        }
        let points = self
            .waypoints
            .iter()
            .chain([&self.explorer_home, &self.follower_home]);
        for point in points {
            if point.iter().any(|c| !c.is_finite()) {
                return Err(MissionError::Config(format!("non-finite coordinate {point:?}")));
            }
        }
        if self.marker_offset.iter().any(|c| !c.is_finite()) || !self.scan_angular_velocity.is_finite() {
            return Err(MissionError::Config("non-finite scan parameters".into()));
        }
        Ok(())
    }

    /// Control loop period
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }

    /// Resolver backoff after a failed lookup
    pub fn lookup_backoff(&self) -> Duration {
        Duration::from_millis(self.lookup_backoff_ms)
    }

    /// Interval between "waiting for server" notices
    pub fn server_wait(&self) -> Duration {
        Duration::from_secs(self.server_wait_secs)
    }
}
