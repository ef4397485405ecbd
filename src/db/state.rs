//! Records and index held together.
//!
//! Every mutation here changes both halves or neither. When the second half
//! rejects a change the first half is restored before the error is returned.

use crate::compute::spatial::{Entry, RTree};
use crate::config::IndexConfig;
use crate::error::Result;
use crate::storage::RecordStore;
use crate::types::{BoundingBox, CityId, CityRecord, Coordinate, DbStats, NewCity};

#[derive(Debug, Clone)]
pub(crate) struct StoreState {
    pub(crate) records: RecordStore,
    pub(crate) index: RTree,
}

impl StoreState {
    pub(crate) fn new(config: IndexConfig) -> Self {
        Self {
            records: RecordStore::new(),
            index: RTree::new(config),
        }
    }

    pub(crate) fn insert(&mut self, city: NewCity) -> Result<CityId> {
        let location = city.location;
        let id = self.records.insert(city)?;
        if let Err(e) = self.index.insert(id, location) {
            self.records.delete(id)?;
            return Err(e);
        }
        Ok(id)
    }

    pub(crate) fn insert_with_id(&mut self, record: CityRecord) -> Result<()> {
        let (id, location) = (record.id, record.location);
        self.records.insert_with_id(record)?;
        if let Err(e) = self.index.insert(id, location) {
            self.records.delete(id)?;
            return Err(e);
        }
        Ok(())
    }

    /// Replace every non-id field of `id`, moving its index entry when the
    /// location changes.
    pub(crate) fn update(&mut self, id: CityId, city: NewCity) -> Result<CityRecord> {
        let location = city.location;
        let previous = self.records.update(id, city)?;

        if previous.location != location
            && let Err(e) = self.index.relocate(id, location)
        {
            let (_, fields) = previous.into_parts();
            self.records.update(id, fields)?;
            return Err(e);
        }

        Ok(previous)
    }

    pub(crate) fn update_location(&mut self, id: CityId, location: Coordinate) -> Result<()> {
        let mut fields = self.records.get(id)?.clone().into_parts().1;
        fields.location = location;
        self.update(id, fields)?;
        Ok(())
    }

    pub(crate) fn delete(&mut self, id: CityId) -> Result<CityRecord> {
        let record = self.records.delete(id)?;
        if let Err(e) = self.index.delete(id) {
            self.records.insert_with_id(record)?;
            return Err(e);
        }
        Ok(record)
    }

    /// Index holding the current entries plus `staged`, packed from scratch.
    pub(crate) fn packed_index_with(&self, staged: &[CityRecord]) -> Result<RTree> {
        let mut entries = self.index.entries();
        entries.extend(staged.iter().map(|r| Entry::new(r.id, r.location)));
        RTree::bulk_build(entries, *self.index.config())
    }

    pub(crate) fn get(&self, id: CityId) -> Result<&CityRecord> {
        self.records.get(id)
    }

    /// Resolve ids from an index result to records, keeping order.
    pub(crate) fn materialize(&self, hits: Vec<(CityId, f64)>) -> Result<Vec<(CityRecord, f64)>> {
        hits.into_iter()
            .map(|(id, distance)| Ok((self.records.get(id)?.clone(), distance)))
            .collect()
    }

    pub(crate) fn bounding_box(&self, bbox: &BoundingBox) -> Result<Vec<CityRecord>> {
        self.index
            .bounding_box_query(bbox)
            .into_iter()
            .map(|id| self.records.get(id).cloned())
            .collect()
    }

    pub(crate) fn stats(&self) -> DbStats {
        let index = self.index.stats();
        DbStats {
            record_count: self.records.len(),
            index_height: index.height,
            node_count: index.node_count,
            next_id: self.records.next_id(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    /// Records and index hold exactly the same ids at the same locations.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        self.records.len() == self.index.len()
            && self
                .records
                .iter()
                .all(|r| self.index.location(r.id) == Some(r.location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(name: &str, lon: f64, lat: f64) -> NewCity {
        NewCity::new("xx", name, name, "01", Coordinate::new(lon, lat).unwrap())
    }

    #[test]
    fn test_mutations_keep_halves_in_step() {
        let mut state = StoreState::new(IndexConfig::default());
        let a = state.insert(city("a", 0.0, 0.0)).unwrap();
        let b = state.insert(city("b", 5.0, 5.0)).unwrap();
        state.insert_with_id(city("c", 9.0, 9.0).with_id(100)).unwrap();
        assert!(state.is_consistent());

        state
            .update_location(a, Coordinate::new(-20.0, 10.0).unwrap())
            .unwrap();
        assert!(state.is_consistent());

        state.delete(b).unwrap();
        assert!(state.is_consistent());
        assert_eq!(state.records.len(), 2);
    }

    #[test]
    fn test_failed_insert_leaves_state_unchanged() {
        let mut state = StoreState::new(IndexConfig::default());
        state.insert_with_id(city("a", 0.0, 0.0).with_id(3)).unwrap();

        assert!(state.insert_with_id(city("dup", 1.0, 1.0).with_id(3)).is_err());
        assert!(state.insert(city("", 1.0, 1.0)).is_err());
        assert!(state.is_consistent());
        assert_eq!(state.records.len(), 1);
        assert_eq!(state.get(3).unwrap().city, "a");
    }

    #[test]
    fn test_update_without_move_keeps_index_entry() {
        let mut state = StoreState::new(IndexConfig::default());
        let id = state.insert(city("a", 1.0, 1.0)).unwrap();
        let previous = state.update(id, city("renamed", 1.0, 1.0)).unwrap();
        assert_eq!(previous.city, "a");
        assert_eq!(state.get(id).unwrap().city, "renamed");
        assert!(state.is_consistent());
    }

    #[test]
    fn test_packed_index_includes_staged() {
        let mut state = StoreState::new(IndexConfig::default());
        state.insert(city("a", 0.0, 0.0)).unwrap();
        let staged = state.records.stage(vec![city("b", 1.0, 1.0)]).unwrap();
        let index = state.packed_index_with(&staged).unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.contains(staged[0].id));
        index.check_invariants().unwrap();
    }
}
