//! Statistics cache: invalidated on every shown-recording, repopulated
//! under lock from one pass of the database's aggregate queries
//! (spec.md §4.1 step (e), §5 "Shared-resource policy").

use std::sync::Mutex;

use crate::db::{Aggregates, ImageDatabase};
use crate::error::DbError;

/// Snapshot of library-wide statistics, as returned by `get_statistics()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    pub total_images: i64,
    pub total_favorites: i64,
    pub total_with_palettes: i64,
    pub total_shown: i64,
    pub by_lightness: Vec<(String, i64)>,
    pub by_hue_family: Vec<(String, i64)>,
    pub by_saturation: Vec<(String, i64)>,
    pub by_freshness: Vec<(String, i64)>,
}

impl From<Aggregates> for Statistics {
    fn from(a: Aggregates) -> Self {
        Self {
            total_images: a.total_images,
            total_favorites: a.total_favorites,
            total_with_palettes: a.total_with_palettes,
            total_shown: a.total_shown,
            by_lightness: a.by_lightness.buckets,
            by_hue_family: a.by_hue_family.buckets,
            by_saturation: a.by_saturation.buckets,
            by_freshness: a.by_freshness.buckets,
        }
    }
}

pub struct StatisticsCache<'a> {
    db: &'a ImageDatabase,
    cached: Mutex<Option<Statistics>>,
}

impl<'a> StatisticsCache<'a> {
    pub fn new(db: &'a ImageDatabase) -> Self {
        Self {
            db,
            cached: Mutex::new(None),
        }
    }

    /// Clears the cached snapshot; the next `get()` repopulates it.
    pub fn invalidate(&self) {
        let mut guard = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    /// Returns the cached snapshot, computing it first if absent.
    pub fn get(&self) -> Result<Statistics, DbError> {
        let mut guard = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(self.db.aggregates()?.into());
        }
        Ok(guard.as_ref().unwrap().clone())
    }
}
