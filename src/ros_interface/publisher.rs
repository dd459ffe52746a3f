// src/ros_interface/publisher.rs
// Generic publisher wrapper plus the velocity and tf outputs built on it.

use std::time::{SystemTime, UNIX_EPOCH};

use r2r::builtin_interfaces::msg::Time;
use r2r::geometry_msgs::msg::{Quaternion, Transform, TransformStamped, Twist, Vector3};
use r2r::std_msgs::msg::Header;
use r2r::tf2_msgs::msg::TFMessage;
use r2r::QosProfile;

use crate::core::{StampedTransform, TransformBroadcaster};
use crate::navigation::{VelocityCommand, VelocityPublisher};
use crate::MissionError;

/// Publisher wrapper
pub struct Publisher<T>
where
    T: r2r::WrappedTypesupport,
{
    inner: r2r::Publisher<T>,
}

/// Explorer velocity output
pub type TwistPublisher = Publisher<Twist>;
/// `/tf` output
pub type TfBroadcaster = Publisher<TFMessage>;

impl<T> Publisher<T>
where
    T: r2r::WrappedTypesupport + 'static,
{
    /// Publisher on `topic` with `qos`
    pub fn new(node: &mut r2r::Node, topic: &str, qos: QosProfile) -> Result<Self, r2r::Error> {
        let inner = node.create_publisher::<T>(topic, qos)?;
        Ok(Publisher { inner })
    }

    /// Publishes `message`
    pub fn publish(&self, message: &T) -> Result<(), r2r::Error> {
        self.inner.publish(message)
    }
}

impl VelocityPublisher for Publisher<Twist> {
    fn publish(&self, command: VelocityCommand) -> Result<(), MissionError> {
        self.inner.publish(&twist(command)).map_err(|e| MissionError::Publish(e.to_string()))
    }
}

impl TransformBroadcaster for Publisher<TFMessage> {
    fn send_transform(&self, transform: StampedTransform) -> Result<(), MissionError> {
        let message = TFMessage {
            transforms: vec![transform_stamped(&transform)],
        };
        self.inner.publish(&message).map_err(|e| MissionError::Publish(e.to_string()))
    }
}

/// Velocity command as a ROS twist
pub fn twist(command: VelocityCommand) -> Twist {
    Twist {
        linear: Vector3 {
            x: command.linear,
            y: 0.0,
            z: 0.0,
        },
        angular: Vector3 {
            x: 0.0,
            y: 0.0,
            z: command.angular,
        },
    }
}

/// Wall-clock time as a ROS timestamp
pub fn ros_time(stamp: SystemTime) -> Time {
    let since_epoch = stamp.duration_since(UNIX_EPOCH).unwrap_or_default();
    Time {
        sec: i32::try_from(since_epoch.as_secs()).unwrap_or(i32::MAX),
        nanosec: since_epoch.subsec_nanos(),
    }
}

/// Stamped transform as a ROS message
pub fn transform_stamped(transform: &StampedTransform) -> TransformStamped {
    let translation = transform.transform.translation.vector;
    let rotation = transform.transform.rotation.into_inner();
    TransformStamped {
        header: Header {
            stamp: ros_time(transform.stamp),
            frame_id: transform.parent.clone(),
        },
        child_frame_id: transform.child.clone(),
        transform: Transform {
            translation: Vector3 {
                x: translation.x,
                y: translation.y,
                z: translation.z,
            },
            rotation: Quaternion {
                x: rotation.i,
                y: rotation.j,
                z: rotation.k,
                w: rotation.w,
            },
        },
    }
}
