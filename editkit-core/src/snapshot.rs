//! In-memory state history for an adapter session.
//!
//! A [`SnapshotStore`] maps [`SnapshotId`]s to immutable [`Snapshot`]s. Each
//! session owns exactly one store; snapshots are handed out as `Arc`s and are
//! never mutated after capture.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(Uuid);

impl SnapshotId {
    /// Create a new unique snapshot ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an image source string points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Inline `data:` URI.
    DataUri,
    /// Remote `http(s)` URL.
    Url,
    /// Anything else, treated as a local path.
    Path,
}

impl SourceType {
    /// Detect the source type from the source string.
    #[must_use]
    pub fn detect(src: &str) -> Self {
        let lower = src.trim_start().to_ascii_lowercase();
        if lower.starts_with("data:") {
            Self::DataUri
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url
        } else {
            Self::Path
        }
    }
}

/// The last image loaded into a session, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Source the image was loaded from.
    pub src: String,
    /// Kind of source.
    pub source_type: SourceType,
    /// Load time in milliseconds since epoch.
    pub captured_at_ms: u64,
    /// Canvas width reported by the engine after load.
    pub width: u32,
    /// Canvas height reported by the engine after load.
    pub height: u32,
}

impl ImageRecord {
    /// Build a record for `src` with engine-reported dimensions.
    #[must_use]
    pub fn new(src: impl Into<String>, width: u32, height: u32) -> Self {
        let src = src.into();
        Self {
            source_type: SourceType::detect(&src),
            src,
            captured_at_ms: now_ms(),
            width,
            height,
        }
    }
}

/// An immutable record of a prior image state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot id.
    pub id: SnapshotId,
    /// Source to reload the engine from.
    pub src: String,
    /// Kind of source.
    pub source_type: SourceType,
    /// Capture time in milliseconds since epoch.
    pub captured_at_ms: u64,
    /// Width at capture time.
    pub width: u32,
    /// Height at capture time.
    pub height: u32,
}

/// Map of snapshot ids to snapshots, in capture order.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: HashMap<SnapshotId, Arc<Snapshot>>,
    order: Vec<SnapshotId>,
}

impl SnapshotStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture a snapshot of `record` and return its id.
    ///
    /// With no record the snapshot describes an empty 0x0 image.
    pub fn capture(&mut self, record: Option<&ImageRecord>) -> SnapshotId {
        let id = SnapshotId::new();
        let snapshot = match record {
            Some(r) => Snapshot {
                id,
                src: r.src.clone(),
                source_type: r.source_type,
                captured_at_ms: now_ms(),
                width: r.width,
                height: r.height,
            },
            None => Snapshot {
                id,
                src: String::new(),
                source_type: SourceType::Path,
                captured_at_ms: now_ms(),
                width: 0,
                height: 0,
            },
        };
        self.snapshots.insert(id, Arc::new(snapshot));
        self.order.push(id);
        tracing::trace!("Captured snapshot {id} ({} in history)", self.order.len());
        id
    }

    /// Get a snapshot by id.
    #[must_use]
    pub fn get(&self, id: SnapshotId) -> Option<Arc<Snapshot>> {
        self.snapshots.get(&id).cloned()
    }

    /// Most recently captured snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.order.last().and_then(|id| self.get(*id))
    }

    /// Snapshot ids in capture order.
    #[must_use]
    pub fn ids(&self) -> &[SnapshotId] {
        &self.order
    }

    /// Remove a snapshot, returning it if present.
    pub fn remove(&mut self, id: SnapshotId) -> Option<Arc<Snapshot>> {
        self.order.retain(|other| *other != id);
        self.snapshots.remove(&id)
    }

    /// Number of snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the store holds no snapshots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drop every snapshot.
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.order.clear();
    }
}

/// Current time in milliseconds since epoch.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Timestamps won't exceed u64 for billions of years
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
