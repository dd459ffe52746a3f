// core/transform.rs

// Stamped coordinate-frame transforms and an in-memory store that resolves a frame's
// pose in another frame by composing the parent chain of each. The store mirrors the
// "latest transform" semantics of a tf buffer: every child frame keeps only its most
// recent parent transform, and an older stamp never replaces a newer one.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use log::debug;
use nalgebra::Isometry3;
use thiserror::Error;

use crate::MissionError;

/// Transform from `parent` to `child`: the pose of `child` expressed in `parent`
#[derive(Debug, Clone, PartialEq)]
pub struct StampedTransform {
    /// Parent frame
    pub parent: String,
    /// Child frame
    pub child: String,
    /// Pose of the child in the parent frame
    pub transform: Isometry3<f64>,
    /// Time the transform was observed
    pub stamp: SystemTime,
}

impl StampedTransform {
    /// Builds a transform stamped with `stamp`
    pub fn new(
        parent: impl Into<String>,
        child: impl Into<String>,
        transform: Isometry3<f64>,
        stamp: SystemTime,
    ) -> Self {
        StampedTransform {
            parent: parent.into(),
            child: child.into(),
            transform,
            stamp,
        }
    }
}

/// Lookup failures. Transient: the chain may complete once more frames arrive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Frame never published
    #[error("frame `{0}` does not exist")]
    FrameNotFound(String),
    /// The source frame was last published before the requested time
    #[error("frame `{frame}` is stale: last published {age:?} before the requested time")]
    Stale {
        /// Frame whose latest transform is too old
        frame: String,
        /// How far the latest transform lags the requested time
        age: Duration,
    },
    /// Both frames exist but share no ancestor
    #[error("`{target_frame}` and `{source_frame}` are not part of the same tree")]
    Disconnected {
        /// Frame the result is expressed in
        target_frame: String,
        /// Frame whose pose was requested
        source_frame: String,
    },
}

/// Publishes transforms into the shared store
#[cfg_attr(test, mockall::automock)]
pub trait TransformBroadcaster {
    /// Publishes one transform
    fn send_transform(&self, transform: StampedTransform) -> Result<(), MissionError>;
}

/// Answers "where is `source` in `target`" using the latest data
#[cfg_attr(test, mockall::automock)]
pub trait TransformLookup {
    /// Pose of `source` expressed in `target`. Fails with [`TransformError::Stale`] when
    /// the latest transform of `source` itself is stamped before `not_before`.
    fn lookup_latest(
        &self,
        target: &str,
        source: &str,
        not_before: SystemTime,
    ) -> Result<Isometry3<f64>, TransformError>;
}

/// Shared transform tree. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct TransformBuffer {
    frames: Arc<RwLock<HashMap<String, StampedTransform>>>,
}

impl TransformBuffer {
    /// Empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `transform`, replacing any earlier parent of the same child. A transform
    /// stamped before the one already stored is dropped.
    pub fn insert(&self, transform: StampedTransform) {
        let mut frames = self.frames.write().unwrap_or_else(PoisonError::into_inner);
        if frames.get(&transform.child).is_some_and(|t| t.stamp > transform.stamp) {
            debug!("tf {} -> {}: dropping out-of-order transform", transform.parent, transform.child);
            return;
        }
        debug!("tf {} -> {}", transform.parent, transform.child);
        frames.insert(transform.child.clone(), transform);
    }

    /// Number of child frames known
    pub fn len(&self) -> usize {
        self.frames.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when nothing was published yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(
        &self,
        target: &str,
        source: &str,
        not_before: SystemTime,
    ) -> Result<Isometry3<f64>, TransformError> {
        let frames = self.frames.read().unwrap_or_else(PoisonError::into_inner);
        let exists = |name: &str| {
            frames.contains_key(name) || frames.values().any(|t| t.parent == name)
        };
        for name in [target, source] {
            if !exists(name) {
                return Err(TransformError::FrameNotFound(name.to_string()));
            }
        }
        if let Some(edge) = frames.get(source) {
            if let Ok(age) = not_before.duration_since(edge.stamp) {
                if !age.is_zero() {
                    return Err(TransformError::Stale {
                        frame: source.to_string(),
                        age,
                    });
                }
            }
        }

        let source_chain = ancestors(&frames, source);
        for (ancestor, ancestor_from_target) in ancestors(&frames, target) {
            if let Some((_, ancestor_from_source)) =
                source_chain.iter().find(|(name, _)| *name == ancestor)
            {
                return Ok(ancestor_from_target.inverse() * ancestor_from_source);
            }
        }

        Err(TransformError::Disconnected {
            target_frame: target.to_string(),
            source_frame: source.to_string(),
        })
    }
}

// Walks from `frame` to its root; each entry is an ancestor with the pose of `frame` in it.
fn ancestors<'a>(
    frames: &'a HashMap<String, StampedTransform>,
    frame: &'a str,
) -> Vec<(&'a str, Isometry3<f64>)> {
    let mut chain = vec![(frame, Isometry3::identity())];
    let mut current = frame;
    let mut pose = Isometry3::identity();
    // A malformed tree could contain a cycle; never walk more edges than exist.
    for _ in 0..frames.len() {
        let Some(edge) = frames.get(current) else {
            break;
        };
        pose = edge.transform * pose;
        current = edge.parent.as_str();
        chain.push((current, pose));
    }
    chain
}

impl TransformBroadcaster for TransformBuffer {
    fn send_transform(&self, transform: StampedTransform) -> Result<(), MissionError> {
        self.insert(transform);
        Ok(())
    }
}

impl TransformLookup for TransformBuffer {
    fn lookup_latest(
        &self,
        target: &str,
        source: &str,
        not_before: SystemTime,
    ) -> Result<Isometry3<f64>, TransformError> {
        self.lookup(target, source, not_before)
    }
}

/// Broadcaster that stores every transform in a local buffer before forwarding it.
///
/// Lookups against `local` see a relayed frame as soon as it is sent, without
/// waiting for the middleware to deliver it back.
pub struct EchoBroadcaster<B> {
    local: TransformBuffer,
    remote: B,
}

impl<B> EchoBroadcaster<B> {
    /// Echoes into `local`, forwards to `remote`
    pub fn new(local: TransformBuffer, remote: B) -> Self {
        EchoBroadcaster { local, remote }
    }
}

impl<B: TransformBroadcaster> TransformBroadcaster for EchoBroadcaster<B> {
    fn send_transform(&self, transform: StampedTransform) -> Result<(), MissionError> {
        self.local.insert(transform.clone());
        self.remote.send_transform(transform)
    }
}
