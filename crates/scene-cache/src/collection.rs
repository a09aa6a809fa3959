//! Collection change tracking for scene staleness
//!
//! Each collection gets one shared stamp. Scenes built from a collection keep
//! its stamp as a dependency, so reindexing or invalidating the collection
//! marks those scenes stale the next time they are looked up.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tile_render::Dependency;
use tracing::debug;

#[derive(Debug, Default)]
pub struct CollectionStamp {
    id: String,
    indexed_at: Mutex<Option<DateTime<Utc>>>,
    invalidated_at: Mutex<Option<DateTime<Utc>>>,
}

impl CollectionStamp {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mark_indexed(&self, at: DateTime<Utc>) {
        *self.indexed_at.lock() = Some(at);
    }

    pub fn invalidate(&self, at: DateTime<Utc>) {
        *self.invalidated_at.lock() = Some(at);
    }
}

impl Dependency for CollectionStamp {
    /// The later of the last index and the last invalidation
    fn updated_at(&self) -> Option<DateTime<Utc>> {
        let indexed = *self.indexed_at.lock();
        let invalidated = *self.invalidated_at.lock();
        indexed.max(invalidated)
    }
}

/// Stamps by collection id
#[derive(Debug, Default)]
pub struct Collections {
    stamps: RwLock<HashMap<String, Arc<CollectionStamp>>>,
}

impl Collections {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stamp for `id`, created on first use
    pub fn stamp(&self, id: &str) -> Arc<CollectionStamp> {
        if let Some(stamp) = self.stamps.read().get(id) {
            return Arc::clone(stamp);
        }
        let mut stamps = self.stamps.write();
        Arc::clone(
            stamps
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(CollectionStamp::new(id))),
        )
    }

    /// Record a finished index run; scenes built earlier become stale
    pub fn mark_indexed(&self, id: &str) {
        debug!(collection = id, "collection indexed");
        self.stamp(id).mark_indexed(Utc::now());
    }

    /// Force scenes built from `id` to be rebuilt
    pub fn invalidate(&self, id: &str) {
        debug!(collection = id, "collection invalidated");
        self.stamp(id).invalidate(Utc::now());
    }
}
