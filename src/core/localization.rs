// core/localization.rs

// Location resolver: localizes the most recently observed marker in the map frame by
// looking up the relay's secondary frame. A failed lookup arms a backoff deadline
// instead of sleeping, so the control loop keeps ticking; attempts before the deadline
// are no-ops. Only identifiers observed since the current scan began are accepted, and
// only frames stamped no earlier than the first sighting of that identifier.

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::catalog::{MarkerLocation, TargetCatalog};
use super::perception::{MarkerReceiver, Sighting};
use super::transform::TransformLookup;
use crate::config::FrameNames;

/// Outcome of one resolver attempt
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Resolution {
    /// Marker located and recorded
    Localized(MarkerLocation),
    /// Nothing to record yet; try again next tick
    Pending,
    /// Inside the backoff window after a failed lookup
    BackingOff,
}

/// Resolves marker observations into catalog entries
pub struct LocationResolver<L> {
    lookup: L,
    marker_rx: MarkerReceiver,
    map_frame: String,
    secondary_frame: String,
    backoff: Duration,
    retry_at: Option<Instant>,
    observed: Option<Sighting>,
    resolved: Option<MarkerLocation>,
    failures: u32,
}

impl<L: TransformLookup> LocationResolver<L> {
    /// Resolver reading identifiers from `marker_rx`
    pub fn new(lookup: L, marker_rx: MarkerReceiver, frames: &FrameNames, backoff: Duration) -> Self {
        LocationResolver {
            lookup,
            marker_rx,
            map_frame: frames.map.clone(),
            secondary_frame: frames.secondary.clone(),
            backoff,
            retry_at: None,
            observed: None,
            resolved: None,
            failures: 0,
        }
    }

    /// Starts a new scan: forgets earlier observations and any backoff
    pub fn begin_scan(&mut self) {
        self.marker_rx.borrow_and_update();
        self.retry_at = None;
        self.observed = None;
        self.resolved = None;
        self.failures = 0;
    }

    /// Failed lookups in the current scan
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// One resolution attempt at time `now`
    pub fn attempt(&mut self, now: Instant, catalog: &mut TargetCatalog) -> Resolution {
        if let Some(location) = self.resolved {
            return Resolution::Localized(location);
        }
        if self.retry_at.is_some_and(|at| now < at) {
            return Resolution::BackingOff;
        }
        if matches!(self.marker_rx.has_changed(), Ok(true)) {
            let latest = *self.marker_rx.borrow_and_update();
            // a repeat sighting keeps the earliest stamp for that marker
            if latest.map(|s| s.marker_id) != self.observed.map(|s| s.marker_id) {
                self.observed = latest;
            }
        }
        let Some(Sighting { marker_id, stamp }) = self.observed else {
            debug!("No marker observed since the scan started");
            return Resolution::Pending;
        };

        match self.lookup.lookup_latest(&self.map_frame, &self.secondary_frame, stamp) {
            Ok(pose) => {
                let position = pose.translation.vector;
                info!(
                    "Marker {} position in {} frame: [{:.3}, {:.3}]",
                    marker_id, self.map_frame, position.x, position.y
                );
                match catalog.record_marker(marker_id, position.x, position.y) {
                    Ok(location) => {
                        self.retry_at = None;
                        self.resolved = Some(location);
                        Resolution::Localized(location)
                    }
                    Err(e) => {
                        // identifier outside the slots; wait for another observation
                        warn!("Discarding marker {}: {}", marker_id, e);
                        self.observed = None;
                        Resolution::Pending
                    }
                }
            }
            Err(e) => {
                self.failures += 1;
                warn!("{} (attempt {}), retrying in {:?}", e, self.failures, self.backoff);
                self.retry_at = Some(now + self.backoff);
                Resolution::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::perception::marker_channel;
    use crate::core::transform::{MockTransformLookup, TransformError};
    use nalgebra::Isometry3;
    use std::time::{SystemTime, UNIX_EPOCH};

    const BACKOFF: Duration = Duration::from_secs(1);

    fn catalog() -> TargetCatalog {
        TargetCatalog::new(&[[1.0, 1.0], [2.0, 2.0]], [-4.0, 2.5])
    }

    fn at(x: f64, y: f64) -> Isometry3<f64> {
        Isometry3::translation(x, y, 0.0)
    }

    fn seen(marker_id: usize) -> Option<Sighting> {
        Some(Sighting::new(marker_id, SystemTime::now()))
    }

    fn not_found() -> TransformError {
        TransformError::FrameNotFound("secondary_frame".into())
    }

    #[test]
    fn test_pending_until_a_marker_is_observed() {
        let mut lookup = MockTransformLookup::new();
        lookup.expect_lookup_latest().never();
        let (_tx, rx) = marker_channel();
        let mut resolver = LocationResolver::new(lookup, rx, &FrameNames::default(), BACKOFF);
        let mut catalog = catalog();

        resolver.begin_scan();

        assert_eq!(resolver.attempt(Instant::now(), &mut catalog), Resolution::Pending);
    }

    #[test]
    fn test_observation_from_before_the_scan_is_not_used() {
        let mut lookup = MockTransformLookup::new();
        lookup.expect_lookup_latest().never();
        let (tx, rx) = marker_channel();
        let mut resolver = LocationResolver::new(lookup, rx, &FrameNames::default(), BACKOFF);
        let mut catalog = catalog();

        tx.send_replace(seen(0));
        resolver.begin_scan();

        assert_eq!(resolver.attempt(Instant::now(), &mut catalog), Resolution::Pending);
    }

    #[test]
    fn test_successful_lookup_records_the_observed_marker() {
        let mut lookup = MockTransformLookup::new();
        lookup
            .expect_lookup_latest()
            .withf(|target, source, _| target == "map" && source == "secondary_frame")
            .times(1)
            .returning(|_, _, _| Ok(at(2.1, 2.1)));
        let (tx, rx) = marker_channel();
        let mut resolver = LocationResolver::new(lookup, rx, &FrameNames::default(), BACKOFF);
        let mut catalog = catalog();

        resolver.begin_scan();
        tx.send_replace(seen(1));
        let now = Instant::now();

        let expected = MarkerLocation { x: 2.1, y: 2.1, marker_id: 1 };
        assert_eq!(resolver.attempt(now, &mut catalog), Resolution::Localized(expected));
        assert_eq!(catalog.marker_location(1).unwrap(), Some(expected));
        // repeated calls do not look up again
        assert_eq!(resolver.attempt(now, &mut catalog), Resolution::Localized(expected));
    }

    #[test]
    fn test_failed_lookup_backs_off_without_mutation() {
        let mut lookup = MockTransformLookup::new();
        let mut calls = 0;
        lookup.expect_lookup_latest().times(4).returning(move |_, _, _| {
            calls += 1;
            if calls <= 3 { Err(not_found()) } else { Ok(at(1.1, 1.1)) }
        });
        let (tx, rx) = marker_channel();
        let mut resolver = LocationResolver::new(lookup, rx, &FrameNames::default(), BACKOFF);
        let mut catalog = catalog();
        resolver.begin_scan();
        tx.send_replace(seen(0));

        let start = Instant::now();
        let tick = Duration::from_millis(100);
        let mut outcomes = Vec::new();
        // 3.5 s of ticks: attempts at 0 s, 1 s, 2 s fail; 3 s succeeds
        for n in 0..=35u32 {
            let outcome = resolver.attempt(start + tick * n, &mut catalog);
            if outcome != Resolution::BackingOff {
                outcomes.push((n, outcome));
            }
            if n < 30 {
                assert_eq!(catalog.marker_location(0).unwrap(), None);
            }
        }

        assert_eq!(resolver.failures(), 3);
        assert_eq!(outcomes[0], (0, Resolution::Pending));
        assert_eq!(outcomes[1], (10, Resolution::Pending));
        assert_eq!(outcomes[2], (20, Resolution::Pending));
        assert!(matches!(outcomes[3], (30, Resolution::Localized(_))));
        assert!(catalog.marker_location(0).unwrap().is_some());
    }

    #[test]
    fn test_out_of_range_marker_is_discarded() {
        let mut lookup = MockTransformLookup::new();
        lookup.expect_lookup_latest().times(1).returning(|_, _, _| Ok(at(1.0, 1.0)));
        let (tx, rx) = marker_channel();
        let mut resolver = LocationResolver::new(lookup, rx, &FrameNames::default(), BACKOFF);
        let mut catalog = catalog();
        resolver.begin_scan();
        tx.send_replace(seen(7));

        let now = Instant::now();
        assert_eq!(resolver.attempt(now, &mut catalog), Resolution::Pending);
        // discarded identifier is not retried until a new observation arrives
        assert_eq!(resolver.attempt(now, &mut catalog), Resolution::Pending);
        assert_eq!(catalog.recorded_markers().count(), 0);
    }

    #[test]
    fn test_latest_identifier_is_used() {
        let mut lookup = MockTransformLookup::new();
        lookup.expect_lookup_latest().returning(|_, _, _| Ok(at(0.5, 0.5)));
        let (tx, rx) = marker_channel();
        let mut resolver = LocationResolver::new(lookup, rx, &FrameNames::default(), BACKOFF);
        let mut catalog = catalog();
        resolver.begin_scan();
        tx.send_replace(seen(0));
        tx.send_replace(seen(1));

        let outcome = resolver.attempt(Instant::now(), &mut catalog);

        assert!(matches!(outcome, Resolution::Localized(MarkerLocation { marker_id: 1, .. })));
        assert_eq!(catalog.marker_location(0).unwrap(), None);
    }
    fn stamp(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_repeat_sighting_keeps_first_stamp_as_bound() {
        let mut lookup = MockTransformLookup::new();
        lookup
            .expect_lookup_latest()
            .withf(|_, _, not_before| *not_before == stamp(5))
            .times(1)
            .returning(|_, source, not_before| {
                Err(TransformError::Stale {
                    frame: source.to_string(),
                    age: not_before.duration_since(stamp(4)).unwrap_or_default(),
                })
            });
        lookup
            .expect_lookup_latest()
            .withf(|_, _, not_before| *not_before == stamp(5))
            .times(1)
            .returning(|_, _, _| Ok(at(1.1, 1.1)));
        let (tx, rx) = marker_channel();
        let mut resolver = LocationResolver::new(lookup, rx, &FrameNames::default(), BACKOFF);
        let mut catalog = catalog();
        resolver.begin_scan();

        let start = Instant::now();
        tx.send_replace(Some(Sighting::new(0, stamp(5))));
        assert_eq!(resolver.attempt(start, &mut catalog), Resolution::Pending);
        assert_eq!(resolver.failures(), 1);

        // frames from later sightings of the same marker satisfy the first bound
        tx.send_replace(Some(Sighting::new(0, stamp(9))));
        let outcome = resolver.attempt(start + BACKOFF, &mut catalog);

        assert!(matches!(outcome, Resolution::Localized(MarkerLocation { marker_id: 0, .. })));
    }

    #[test]
    fn test_new_marker_resets_the_bound() {
        let mut lookup = MockTransformLookup::new();
        lookup
            .expect_lookup_latest()
            .withf(|_, _, not_before| *not_before == stamp(8))
            .times(1)
            .returning(|_, _, _| Ok(at(2.1, 2.1)));
        let (tx, rx) = marker_channel();
        let mut resolver = LocationResolver::new(lookup, rx, &FrameNames::default(), BACKOFF);
        let mut catalog = catalog();
        resolver.begin_scan();

        tx.send_replace(Some(Sighting::new(0, stamp(5))));
        tx.send_replace(Some(Sighting::new(1, stamp(8))));
        let outcome = resolver.attempt(Instant::now(), &mut catalog);

        assert!(matches!(outcome, Resolution::Localized(MarkerLocation { marker_id: 1, .. })));
    }
}
