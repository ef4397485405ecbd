//! Atomic batch operations.

use super::state::StoreState;
use crate::error::Result;
use crate::types::{CityId, Coordinate, NewCity};
use parking_lot::RwLock;

/// Atomic batch. All operations succeed or all fail.
///
/// Operations are queued and applied in order to a private copy of the store
/// when the batch commits. The copy replaces the live state only if every
/// operation succeeded, so readers never see part of a batch.
pub struct AtomicBatch<'a> {
    state: &'a RwLock<StoreState>,
    operations: Vec<BatchOperation>,
}

#[derive(Debug, Clone)]
enum BatchOperation {
    Insert { city: NewCity },
    UpdateLocation { id: CityId, location: Coordinate },
    UpdateRecord { id: CityId, city: NewCity },
    Delete { id: CityId },
}

impl<'a> AtomicBatch<'a> {
    pub(crate) fn new(state: &'a RwLock<StoreState>) -> Self {
        Self {
            state,
            operations: Vec::new(),
        }
    }

    /// Queue an insert. Its id is reported by [`crate::DB::atomic`].
    pub fn insert(&mut self, city: NewCity) -> &mut Self {
        self.operations.push(BatchOperation::Insert { city });
        self
    }

    pub fn update_location(&mut self, id: CityId, location: Coordinate) -> &mut Self {
        self.operations
            .push(BatchOperation::UpdateLocation { id, location });
        self
    }

    pub fn update_record(&mut self, id: CityId, city: NewCity) -> &mut Self {
        self.operations.push(BatchOperation::UpdateRecord { id, city });
        self
    }

    pub fn delete(&mut self, id: CityId) -> &mut Self {
        self.operations.push(BatchOperation::Delete { id });
        self
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Apply every queued operation, returning the ids of queued inserts in
    /// queue order. On failure the error names the failing operation's
    /// position and the live state is untouched.
    pub(crate) fn commit(self) -> Result<Vec<CityId>> {
        if self.operations.is_empty() {
            return Ok(Vec::new());
        }

        let mut live = self.state.write();
        let mut staged = live.clone();
        let mut inserted = Vec::new();

        for (index, operation) in self.operations.into_iter().enumerate() {
            let applied = match operation {
                BatchOperation::Insert { city } => staged.insert(city).map(|id| inserted.push(id)),
                BatchOperation::UpdateLocation { id, location } => {
                    staged.update_location(id, location)
                }
                BatchOperation::UpdateRecord { id, city } => staged.update(id, city).map(|_| ()),
                BatchOperation::Delete { id } => staged.delete(id).map(|_| ()),
            };

            if let Err(e) = applied {
                log::warn!("Atomic batch rolled back at operation {}: {}", index, e);
                return Err(e.at_bulk_index(index));
            }
        }

        *live = staged;
        log::debug!("Atomic batch committed, {} inserts", inserted.len());
        Ok(inserted)
    }
}
