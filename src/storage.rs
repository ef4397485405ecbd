//! Record store: canonical city records keyed by id.
//!
//! The store owns the id counter. It knows nothing about the spatial index;
//! [`crate::DB`] keeps the two in step.

use crate::compute::validation::{validate_city, validate_id};
use crate::error::{GazetteerError, Result};
use crate::types::{CityId, CityRecord, NewCity};
use rustc_hash::{FxHashMap, FxHashSet};

/// First id handed out by a fresh store.
pub const FIRST_ID: CityId = 1;

#[derive(Debug, Clone)]
pub struct RecordStore {
    records: FxHashMap<CityId, CityRecord>,
    next_id: CityId,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            records: FxHashMap::default(),
            next_id: FIRST_ID,
        }
    }

    /// Store `city` under the next unused id.
    pub fn insert(&mut self, city: NewCity) -> Result<CityId> {
        validate_city(&city)?;
        let id = self.next_id;
        validate_id(id)?;
        self.records.insert(id, city.with_id(id));
        self.next_id = id + 1;
        Ok(id)
    }

    /// Store a record under its own id. The counter moves past `record.id`
    /// so later inserts never collide with it.
    pub fn insert_with_id(&mut self, record: CityRecord) -> Result<()> {
        self.check_new_record(&record)?;
        self.next_id = self.next_id.max(record.id.saturating_add(1));
        self.records.insert(record.id, record);
        Ok(())
    }

    pub fn get(&self, id: CityId) -> Result<&CityRecord> {
        self.records.get(&id).ok_or(GazetteerError::NotFound(id))
    }

    pub fn contains(&self, id: CityId) -> bool {
        self.records.contains_key(&id)
    }

    /// Replace every non-id field of `id`, returning the previous record.
    pub fn update(&mut self, id: CityId, city: NewCity) -> Result<CityRecord> {
        validate_city(&city)?;
        let slot = self
            .records
            .get_mut(&id)
            .ok_or(GazetteerError::NotFound(id))?;
        Ok(std::mem::replace(slot, city.with_id(id)))
    }

    pub fn delete(&mut self, id: CityId) -> Result<CityRecord> {
        self.records.remove(&id).ok_or(GazetteerError::NotFound(id))
    }

    /// Insert all of `cities`, assigning ids in input order. Nothing is
    /// stored unless every record is valid.
    pub fn bulk_load(&mut self, cities: Vec<NewCity>) -> Result<Vec<CityId>> {
        let staged = self.stage(cities)?;
        let ids = staged.iter().map(|r| r.id).collect();
        self.commit(staged);
        Ok(ids)
    }

    /// Validate `cities` and attach the ids they would receive, without
    /// touching the store.
    pub fn stage(&self, cities: Vec<NewCity>) -> Result<Vec<CityRecord>> {
        let mut next = self.next_id;
        cities
            .into_iter()
            .enumerate()
            .map(|(index, city)| {
                validate_city(&city)
                    .and_then(|_| validate_id(next))
                    .map_err(|e| e.at_bulk_index(index))?;
                let record = city.with_id(next);
                next += 1;
                Ok(record)
            })
            .collect()
    }

    /// Validate id-carrying records against the store and each other,
    /// without touching the store.
    pub fn stage_with_ids(&self, records: &[CityRecord]) -> Result<()> {
        let mut batch_ids = FxHashSet::default();
        for (index, record) in records.iter().enumerate() {
            self.check_new_record(record)
                .map_err(|e| e.at_bulk_index(index))?;
            if !batch_ids.insert(record.id) {
                return Err(GazetteerError::DuplicateId(record.id).at_bulk_index(index));
            }
        }
        Ok(())
    }

    /// Store records already checked by [`Self::stage`] or
    /// [`Self::stage_with_ids`].
    pub fn commit(&mut self, records: Vec<CityRecord>) {
        self.records.reserve(records.len());
        for record in records {
            self.next_id = self.next_id.max(record.id.saturating_add(1));
            self.records.insert(record.id, record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn next_id(&self) -> CityId {
        self.next_id
    }

    pub fn iter(&self) -> impl Iterator<Item = &CityRecord> {
        self.records.values()
    }

    /// Drop all records and restart the counter.
    pub fn clear(&mut self) {
        self.records.clear();
        self.next_id = FIRST_ID;
    }

    fn check_new_record(&self, record: &CityRecord) -> Result<()> {
        validate_id(record.id)?;
        if self.records.contains_key(&record.id) {
            return Err(GazetteerError::DuplicateId(record.id));
        }
        validate_city(&NewCity::new(
            record.country.as_str(),
            record.city.as_str(),
            record.accent_city.as_str(),
            record.region.as_str(),
            record.location,
        ))
    }
}
