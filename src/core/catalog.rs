// core/catalog.rs

// Target catalog: the explorer's fixed waypoint list and the follower's destinations,
// which fill in as markers are localized. Follower slots are addressed by marker
// identifier; the last slot is reserved for the follower's home.

use log::{debug, info};

use super::perception::MarkerId;
use crate::MissionError;

/// Planar target in the map frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waypoint {
    pub x: f64, // meters
    pub y: f64, // meters
}

impl From<[f64; 2]> for Waypoint {
    fn from([x, y]: [f64; 2]) -> Self {
        Waypoint { x, y }
    }
}

/// Localized marker position in the map frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerLocation {
    pub x: f64,
    pub y: f64,
    pub marker_id: MarkerId,
}

/// Explorer waypoints plus follower destinations
#[derive(Debug, Clone)]
pub struct TargetCatalog {
    waypoints: Vec<Waypoint>,
    locations: Vec<Option<MarkerLocation>>,
}

impl TargetCatalog {
    /// Builds the catalog from the search waypoints; `explorer_home` becomes the last
    /// waypoint, and one follower slot is reserved per waypoint.
    pub fn new(search: &[[f64; 2]], explorer_home: [f64; 2]) -> Self {
        let waypoints: Vec<Waypoint> = search
            .iter()
            .copied()
            .chain(std::iter::once(explorer_home))
            .map(Waypoint::from)
            .collect();
        let locations = vec![None; waypoints.len()];
        TargetCatalog {
            waypoints,
            locations,
        }
    }

    /// Number of entries, home included
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Always false; the home entry is always present
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Index of the last waypoint the explorer searches. Zero when there are none.
    pub fn last_search_index(&self) -> usize {
        self.len().saturating_sub(2)
    }

    /// Index of the follower's home slot
    pub fn home_index(&self) -> usize {
        self.len() - 1
    }

    /// The i-th explorer waypoint
    pub fn waypoint(&self, index: usize) -> Result<Waypoint, MissionError> {
        self.waypoints
            .get(index)
            .copied()
            .ok_or(MissionError::OutOfRange {
                index,
                len: self.len(),
            })
    }

    /// The i-th follower destination, `None` while unset
    pub fn marker_location(&self, index: usize) -> Result<Option<MarkerLocation>, MissionError> {
        self.locations
            .get(index)
            .copied()
            .ok_or(MissionError::OutOfRange {
                index,
                len: self.len(),
            })
    }

    /// Records a localized marker. The first write for an identifier wins; the stored
    /// location is returned either way.
    pub fn record_marker(
        &mut self,
        marker_id: MarkerId,
        x: f64,
        y: f64,
    ) -> Result<MarkerLocation, MissionError> {
        let len = self.len();
        // the home slot is not addressable by a marker
        if marker_id >= self.home_index() {
            return Err(MissionError::OutOfRange {
                index: marker_id,
                len: len - 1,
            });
        }
        let slot = &mut self.locations[marker_id];
        if let Some(existing) = *slot {
            if existing.x != x || existing.y != y {
                debug!(
                    "Marker {} already recorded at ({:.3}, {:.3}), ignoring ({:.3}, {:.3})",
                    marker_id, existing.x, existing.y, x, y
                );
            }
            return Ok(existing);
        }
        let location = MarkerLocation { x, y, marker_id };
        *slot = Some(location);
        Ok(location)
    }

    /// Writes the follower home into the final slot
    pub fn set_home(&mut self, home: [f64; 2]) -> MarkerLocation {
        let index = self.home_index();
        let location = MarkerLocation {
            x: home[0],
            y: home[1],
            marker_id: index,
        };
        self.locations[index] = Some(location);
        location
    }

    /// Recorded marker slots in slot order, home excluded
    pub fn recorded_markers(&self) -> impl Iterator<Item = MarkerLocation> + '_ {
        self.locations[..self.home_index()].iter().flatten().copied()
    }

    /// Logs what the explorer found
    pub fn log_summary(&self) {
        info!("=============");
        for (slot, location) in self.locations[..self.home_index()].iter().enumerate() {
            match location {
                Some(l) => info!("follower goal {}: marker {}  x={:.3}  y={:.3}", slot, l.marker_id, l.x, l.y),
                None => info!("follower goal {}: not found", slot),
            }
        }
        info!("=============");
    }
}
