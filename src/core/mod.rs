// core/mod.rs

// Declares the mission core: target catalog, perception relay, transform store,
// location resolver and the mission state machine. `MissionContext` wires them
// together so the control loop and the observation path share nothing but the
// marker hand-off channel and the transform store.

pub mod catalog;
pub mod localization;
pub mod mission;
pub mod perception;
pub mod state;
pub mod transform;

pub use catalog::{MarkerLocation, TargetCatalog, Waypoint};
pub use localization::{LocationResolver, Resolution};
pub use mission::Mission;
pub use perception::{
    marker_channel, Detection, FrameRelay, MarkerId, MarkerReceiver, MarkerSender,
    ObservationBatch, ObservationHandler, Sighting,
};
pub use state::{ExploreStep, MissionState, MissionStatus, RetrieveStep};
pub use transform::{
    EchoBroadcaster, StampedTransform, TransformBroadcaster, TransformBuffer, TransformError,
    TransformLookup,
};

use crate::config::MissionConfig;
use crate::navigation::{GoalClient, VelocityPublisher};
use crate::MissionError;

/// The two halves of a running mission: the state machine driven by the control
/// loop, and the handler fed by the perception subscription.
pub struct MissionContext<E, F, V, B, L> {
    /// Control-loop side
    pub mission: Mission<E, F, V, L>,
    /// Observation side
    pub observations: ObservationHandler<B>,
}

impl<E, F, V, B, L> MissionContext<E, F, V, B, L>
where
    E: GoalClient,
    F: GoalClient,
    V: VelocityPublisher,
    B: TransformBroadcaster,
    L: TransformLookup,
{
    /// Assembles a mission from a validated `config`. Frames sent through
    /// `broadcaster` must reach `lookup` before the next tick; wrap a middleware
    /// publisher in an [`EchoBroadcaster`] over the lookup's buffer.
    pub fn new(
        config: &MissionConfig,
        explorer: E,
        follower: F,
        velocity: V,
        broadcaster: B,
        lookup: L,
    ) -> Result<Self, MissionError> {
        let (marker_tx, marker_rx) = marker_channel();
        let relay = FrameRelay::new(broadcaster, &config.frames, config.marker_offset);
        let resolver = LocationResolver::new(lookup, marker_rx, &config.frames, config.lookup_backoff());
        Ok(MissionContext {
            mission: Mission::new(config, explorer, follower, velocity, resolver)?,
            observations: ObservationHandler::new(relay, marker_tx),
        })
    }

    /// Splits into the control-loop and observation halves
    pub fn into_parts(self) -> (Mission<E, F, V, L>, ObservationHandler<B>) {
        (self.mission, self.observations)
    }
}
