//! The gazetteer store: records plus spatial index behind one lock.
//!
//! This module defines [`DB`] (exported as [`Gazetteer`]), which composes the
//! record store and the R-tree and keeps them in lock-step.

use crate::builder::DBBuilder;
use crate::compute::validation::{validate_k, validate_radius};
use crate::config::Config;
use crate::error::{GazetteerError, Result};
use crate::types::{BoundingBox, CityId, CityRecord, Coordinate, DbStats, NewCity};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::sync::Arc;

mod batch;
mod state;

pub use batch::AtomicBatch;
pub(crate) use state::StoreState;

/// Main gazetteer store.
///
/// `DB` offers:
/// - Record storage with store-assigned, never reused ids
/// - Automatic spatial indexing of every record's location
/// - Radius, k-nearest and bounding box queries on the sphere
/// - All-or-nothing bulk loads and atomic batches
///
/// # Thread Safety
///
/// `DB` is cheap to clone and every clone shares the same store. Reads
/// (`get_record` and all queries) run in parallel and always see records and
/// index in agreement. Writes are serialized behind a single write lock.
/// Bulk loads and index rebuilds pack the new tree under an upgradable read
/// lock, so readers keep running until the finished tree is swapped in.
///
/// # Examples
///
/// ```rust
/// use gazetteer::{Coordinate, Gazetteer, NewCity};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let db = Gazetteer::memory()?;
///
/// let ids = db.bulk_load(vec![
///     NewCity::new("fr", "paris", "Paris", "A8", Coordinate::new(2.3522, 48.8566)?),
///     NewCity::new("gb", "london", "London", "H9", Coordinate::new(-0.1278, 51.5074)?),
///     NewCity::new("de", "berlin", "Berlin", "16", Coordinate::new(13.4050, 52.5200)?),
/// ])?;
/// assert_eq!(ids, vec![1, 2, 3]);
///
/// // Cities within 400 km of Paris, nearest first
/// let near = db.radius_search(&Coordinate::new(2.3522, 48.8566)?, 400_000.0)?;
/// let names: Vec<_> = near.iter().map(|c| c.city.as_str()).collect();
/// assert_eq!(names, vec!["paris", "london"]);
/// # Ok(())
/// # }
/// ```
///
/// ## Atomic batching
///
/// ```rust
/// use gazetteer::{Coordinate, Gazetteer, NewCity};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let db = Gazetteer::memory()?;
/// let origin = Coordinate::new(0.0, 0.0)?;
///
/// // Either both inserts land or neither does
/// let ids = db.atomic(|batch| {
///     batch.insert(NewCity::new("xx", "a", "A", "01", origin));
///     batch.insert(NewCity::new("xx", "b", "B", "01", origin));
///     Ok(())
/// })?;
/// assert_eq!(ids.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DB {
    inner: Arc<RwLock<StoreState>>,
}

impl DB {
    /// Create an empty store with the default configuration.
    pub fn memory() -> Result<Self> {
        Self::with_config(Config::default())
    }

    /// Create an empty store with a custom configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().map_err(GazetteerError::InvalidConfig)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(StoreState::new(config.index))),
        })
    }

    /// Create a builder for seeding a store at construction.
    pub fn builder() -> DBBuilder {
        DBBuilder::new()
    }

    // ===== Ingestion =====

    /// Insert `cities` with ids assigned in input order.
    ///
    /// If any record is invalid the call fails with `BulkLoadFailed` naming
    /// its position and none of the batch is stored. The index is re-packed
    /// with the bulk builder and swapped in together with the records.
    pub fn bulk_load(&self, cities: Vec<NewCity>) -> Result<Vec<CityId>> {
        if cities.is_empty() {
            return Ok(Vec::new());
        }

        let count = cities.len();
        let state = self.inner.upgradable_read();
        let staged = state.records.stage(cities)?;
        let index = state.packed_index_with(&staged)?;
        let ids: Vec<CityId> = staged.iter().map(|r| r.id).collect();

        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        state.records.commit(staged);
        state.index = index;

        log::debug!(
            "Bulk loaded {} records, store now holds {} (index height {})",
            count,
            state.records.len(),
            state.index.height()
        );
        Ok(ids)
    }

    /// Insert records keeping their own ids.
    ///
    /// Fails with `BulkLoadFailed` if any id is zero, already stored or
    /// repeated in the batch, or any record is invalid. Nothing is stored then.
    pub fn bulk_load_with_ids(&self, records: Vec<CityRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let count = records.len();
        let state = self.inner.upgradable_read();
        state.records.stage_with_ids(&records)?;
        let index = state.packed_index_with(&records)?;

        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        state.records.commit(records);
        state.index = index;

        log::debug!("Bulk loaded {} records with external ids", count);
        Ok(())
    }

    pub fn insert_record(&self, city: NewCity) -> Result<CityId> {
        self.inner.write().insert(city)
    }

    /// Insert a single record under its own id.
    pub fn insert_record_with_id(&self, record: CityRecord) -> Result<()> {
        self.inner.write().insert_with_id(record)
    }

    /// Move a record. Queries see the new location as soon as this returns.
    pub fn update_location(&self, id: CityId, location: Coordinate) -> Result<()> {
        self.inner.write().update_location(id, location)
    }

    /// Replace every non-id field of a record, returning the previous version.
    pub fn update_record(&self, id: CityId, city: NewCity) -> Result<CityRecord> {
        self.inner.write().update(id, city)
    }

    /// Remove a record and its index entry, returning the removed record.
    pub fn delete_record(&self, id: CityId) -> Result<CityRecord> {
        self.inner.write().delete(id)
    }

    /// Run `f` against a batch and commit its queued operations atomically.
    ///
    /// Returns the ids assigned to queued inserts, in queue order. If `f`
    /// fails nothing is applied; if an operation fails the error is a
    /// `BulkLoadFailed` carrying its queue position.
    pub fn atomic<F>(&self, f: F) -> Result<Vec<CityId>>
    where
        F: FnOnce(&mut AtomicBatch) -> Result<()>,
    {
        let mut batch = AtomicBatch::new(&self.inner);
        f(&mut batch)?;
        batch.commit()
    }

    // ===== Lookups =====

    /// Copy of the record stored under `id`.
    pub fn get_record(&self, id: CityId) -> Result<CityRecord> {
        self.inner.read().get(id).cloned()
    }

    pub fn contains(&self, id: CityId) -> bool {
        self.inner.read().records.contains(id)
    }

    /// Records within `radius_meters` of `center`, nearest first; equal
    /// distances are ordered by id.
    pub fn radius_search(&self, center: &Coordinate, radius_meters: f64) -> Result<Vec<CityRecord>> {
        Ok(strip_distances(
            self.radius_search_with_distance(center, radius_meters)?,
        ))
    }

    /// As [`Self::radius_search`], with each record's distance in meters.
    pub fn radius_search_with_distance(
        &self,
        center: &Coordinate,
        radius_meters: f64,
    ) -> Result<Vec<(CityRecord, f64)>> {
        if let Err(e) = validate_radius(radius_meters) {
            log::warn!("Rejected radius query: {}", e);
            return Err(e);
        }

        let state = self.inner.read();
        let hits = state.index.radius_query(center, radius_meters);
        state.materialize(hits)
    }

    /// The `k` records closest to `center`, nearest first; equal distances
    /// are ordered by id. Returns fewer when the store is smaller.
    pub fn nearest_k(&self, center: &Coordinate, k: usize) -> Result<Vec<CityRecord>> {
        Ok(strip_distances(self.nearest_k_with_distance(center, k)?))
    }

    /// As [`Self::nearest_k`], with each record's distance in meters.
    pub fn nearest_k_with_distance(
        &self,
        center: &Coordinate,
        k: usize,
    ) -> Result<Vec<(CityRecord, f64)>> {
        if let Err(e) = validate_k(k) {
            log::warn!("Rejected nearest query: {}", e);
            return Err(e);
        }

        let state = self.inner.read();
        let hits = state.index.nearest(center, k);
        state.materialize(hits)
    }

    /// Records inside `bbox`, edges inclusive, ordered by id.
    pub fn bounding_box_search(&self, bbox: &BoundingBox) -> Result<Vec<CityRecord>> {
        self.inner.read().bounding_box(bbox)
    }

    // ===== Maintenance =====

    /// Re-pack the index from the stored records with the bulk builder.
    ///
    /// Useful after many single inserts and deletes have loosened the tree.
    pub fn rebuild_index(&self) -> Result<()> {
        let state = self.inner.upgradable_read();
        let index = state.packed_index_with(&[])?;
        let before = state.index.stats();

        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        state.index = index;

        log::debug!(
            "Rebuilt index: height {} -> {}, nodes {} -> {}",
            before.height,
            state.index.height(),
            before.node_count,
            state.index.stats().node_count
        );
        Ok(())
    }

    pub fn stats(&self) -> DbStats {
        self.inner.read().stats()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Remove every record and restart id assignment.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Structural check of the index against the records; used by tests.
    #[doc(hidden)]
    pub fn check_consistency(&self) -> std::result::Result<(), String> {
        let state = self.inner.read();
        state.index.check_invariants()?;
        if state.records.len() != state.index.len() {
            return Err(format!(
                "{} records but {} index entries",
                state.records.len(),
                state.index.len()
            ));
        }
        for record in state.records.iter() {
            if state.index.location(record.id) != Some(record.location) {
                return Err(format!("record {} not indexed at its location", record.id));
            }
        }
        Ok(())
    }
}

fn strip_distances(hits: Vec<(CityRecord, f64)>) -> Vec<CityRecord> {
    hits.into_iter().map(|(record, _)| record).collect()
}
