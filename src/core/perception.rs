// core/perception.rs

// Turns marker observations into transform-store frames. For each batch with at least
// one detection, the first detection's pose is published as the marker frame under the
// camera's optical frame, plus a secondary frame at a fixed offset from it. The
// detection's identifier and the frames' stamp are then handed to the resolver over a
// single-slot channel (latest value wins, nothing queues).

use std::time::SystemTime;

use log::{debug, info};
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use tokio::sync::watch;

use super::transform::{StampedTransform, TransformBroadcaster};
use crate::config::FrameNames;
use crate::MissionError;

/// Fiducial identifier reported by perception
pub type MarkerId = usize;

/// A marker handed off to the resolver, with the stamp of the frames relayed for it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sighting {
    /// Fiducial identifier
    pub marker_id: MarkerId,
    /// Stamp of the marker and secondary frames published for this sighting
    pub stamp: SystemTime,
}

impl Sighting {
    /// Sighting of `marker_id` whose frames carry `stamp`
    pub fn new(marker_id: MarkerId, stamp: SystemTime) -> Self {
        Sighting { marker_id, stamp }
    }
}

/// Sending half of the marker hand-off channel
pub type MarkerSender = watch::Sender<Option<Sighting>>;
/// Receiving half of the marker hand-off channel
pub type MarkerReceiver = watch::Receiver<Option<Sighting>>;

/// Creates the marker hand-off channel
pub fn marker_channel() -> (MarkerSender, MarkerReceiver) {
    watch::channel(None)
}

/// One detected marker, pose in the camera's optical frame
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Fiducial identifier
    pub marker_id: MarkerId,
    /// Marker pose relative to the camera
    pub pose: Isometry3<f64>,
}

impl Detection {
    /// Detection from a translation and rotation
    pub fn new(marker_id: MarkerId, translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Detection {
            marker_id,
            pose: Isometry3::from_parts(Translation3::from(translation), rotation),
        }
    }
}

/// Everything perception reported in one message
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservationBatch {
    /// Detections in the order perception reported them
    pub detections: Vec<Detection>,
}

impl ObservationBatch {
    /// Batch with the given detections
    pub fn new(detections: Vec<Detection>) -> Self {
        ObservationBatch { detections }
    }

    /// The detection acted upon; any others are ignored
    pub fn primary(&self) -> Option<&Detection> {
        self.detections.first()
    }
}

/// Publishes the marker frame and its offset frame
pub struct FrameRelay<B> {
    broadcaster: B,
    camera_frame: String,
    marker_frame: String,
    secondary_frame: String,
    offset: Isometry3<f64>,
}

impl<B: TransformBroadcaster> FrameRelay<B> {
    /// Relay publishing through `broadcaster`
    pub fn new(broadcaster: B, frames: &FrameNames, offset: [f64; 3]) -> Self {
        FrameRelay {
            broadcaster,
            camera_frame: frames.camera.clone(),
            marker_frame: frames.marker.clone(),
            secondary_frame: frames.secondary.clone(),
            offset: Isometry3::from_parts(
                Translation3::new(offset[0], offset[1], offset[2]),
                UnitQuaternion::identity(),
            ),
        }
    }

    /// Publishes both frames for `detection`
    pub fn relay(&self, detection: &Detection, stamp: SystemTime) -> Result<(), MissionError> {
        let marker = StampedTransform::new(
            self.camera_frame.as_str(),
            self.marker_frame.as_str(),
            detection.pose,
            stamp,
        );
        let secondary = StampedTransform::new(
            self.marker_frame.as_str(),
            self.secondary_frame.as_str(),
            self.offset,
            stamp,
        );
        self.broadcaster.send_transform(marker)?;
        self.broadcaster.send_transform(secondary)
    }
}

/// Entry point for perception messages; owns the producer side of the hand-off
pub struct ObservationHandler<B> {
    relay: FrameRelay<B>,
    marker_tx: MarkerSender,
}

impl<B: TransformBroadcaster> ObservationHandler<B> {
    /// Handler relaying through `relay` and announcing markers on `marker_tx`
    pub fn new(relay: FrameRelay<B>, marker_tx: MarkerSender) -> Self {
        ObservationHandler { relay, marker_tx }
    }

    /// Processes one batch. Returns the identifier handed off, if any.
    ///
    /// Frames are published before the identifier. The hand-off carries their stamp so
    /// the resolver can tell them apart from frames of an earlier sighting.
    pub fn handle(&self, batch: &ObservationBatch) -> Result<Option<MarkerId>, MissionError> {
        let Some(detection) = batch.primary() else {
            return Ok(None);
        };
        if batch.detections.len() > 1 {
            debug!(
                "Observation has {} detections, using marker {} only",
                batch.detections.len(),
                detection.marker_id
            );
        }
        let stamp = SystemTime::now();
        self.relay.relay(detection, stamp)?;
        let previous = self.marker_tx.send_replace(Some(Sighting::new(detection.marker_id, stamp)));
        if previous.map(|s| s.marker_id) != Some(detection.marker_id) {
            info!("Explorer sees marker {}", detection.marker_id);
        }
        Ok(Some(detection.marker_id))
    }
}
