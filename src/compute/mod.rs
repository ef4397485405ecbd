//! Compute layer: geometry, indexing and query logic.
//!
//! Nothing in here knows about the record store. The index works on
//! `(CityId, Coordinate)` pairs only and the store keeps it in step with the
//! records.

pub mod spatial;
pub mod validation;
