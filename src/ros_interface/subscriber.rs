// src/ros_interface/subscriber.rs
// Subscriptions feeding the mission: tf into the transform buffer, marker detections
// into the observation handler. Both run as local tasks driven by `RosInterface::spin`.

use std::time::{Duration, UNIX_EPOCH};

use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use futures::{future, stream, StreamExt};
use log::warn;
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion};
use r2r::geometry_msgs::msg::{Pose, TransformStamped};
use r2r::ros2_aruco_interfaces::msg::ArucoMarkers;
use r2r::tf2_msgs::msg::TFMessage;
use r2r::QosProfile;

use crate::core::{
    Detection, MarkerId, ObservationBatch, ObservationHandler, StampedTransform, TransformBroadcaster,
    TransformBuffer,
};
use crate::MissionError;

pub(super) fn spawn_tf_listener(
    node: &mut r2r::Node,
    spawner: &LocalSpawner,
    buffer: TransformBuffer,
) -> Result<(), MissionError> {
    let dynamic = node.subscribe::<TFMessage>("/tf", QosProfile::default())?;
    let statics = node.subscribe::<TFMessage>("/tf_static", QosProfile::default().transient_local())?;
    spawner.spawn_local(async move {
        stream::select(dynamic, statics)
            .for_each(|message| {
                for transform in &message.transforms {
                    buffer.insert(transform_from_msg(transform));
                }
                future::ready(())
            })
            .await
    })?;
    Ok(())
}

pub(super) fn spawn_marker_listener<B>(
    node: &mut r2r::Node,
    spawner: &LocalSpawner,
    topic: &str,
    handler: ObservationHandler<B>,
) -> Result<(), MissionError>
where
    B: TransformBroadcaster + 'static,
{
    let markers = node.subscribe::<ArucoMarkers>(topic, QosProfile::default())?;
    spawner.spawn_local(async move {
        markers
            .for_each(|message| {
                if let Err(e) = handler.handle(&batch_from_markers(&message)) {
                    warn!("Failed to relay marker observation: {}", e);
                }
                future::ready(())
            })
            .await
    })?;
    Ok(())
}

/// ROS transform as a stamped transform
pub fn transform_from_msg(message: &TransformStamped) -> StampedTransform {
    let t = &message.transform.translation;
    let r = &message.transform.rotation;
    let stamp = &message.header.stamp;
    StampedTransform::new(
        message.header.frame_id.as_str(),
        message.child_frame_id.as_str(),
        Isometry3::from_parts(
            Translation3::new(t.x, t.y, t.z),
            UnitQuaternion::new_normalize(Quaternion::new(r.w, r.x, r.y, r.z)),
        ),
        UNIX_EPOCH + Duration::new(u64::try_from(stamp.sec).unwrap_or(0), stamp.nanosec),
    )
}

/// Marker message as an observation batch, detection order preserved. Only the first
/// detection is acted upon, so a message whose first identifier is negative yields an
/// empty batch; later negative identifiers are dropped.
pub fn batch_from_markers(message: &ArucoMarkers) -> ObservationBatch {
    if !message.marker_ids.first().is_some_and(|id| *id >= 0) {
        return ObservationBatch::default();
    }
    let detections = message
        .marker_ids
        .iter()
        .zip(&message.poses)
        .filter_map(|(id, pose)| {
            let marker_id = MarkerId::try_from(*id).ok()?;
            Some(Detection {
                marker_id,
                pose: isometry(pose),
            })
        })
        .collect();
    ObservationBatch::new(detections)
}

fn isometry(pose: &Pose) -> Isometry3<f64> {
    let p = &pose.position;
    let q = &pose.orientation;
    Isometry3::from_parts(
        Translation3::new(p.x, p.y, p.z),
        UnitQuaternion::new_normalize(Quaternion::new(q.w, q.x, q.y, q.z)),
    )
}
