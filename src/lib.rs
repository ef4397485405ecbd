//! In-memory geospatial reference store for world cities.
//!
//! Records are kept in a record store and indexed by an owned R-tree; the
//! [`Gazetteer`] keeps both in step and answers radius, k-nearest and
//! bounding box queries using great-circle distance.
//!
//! ```rust
//! use gazetteer::{Coordinate, Gazetteer, NewCity};
//!
//! let db = Gazetteer::memory()?;
//! let a = db.insert_record(NewCity::new("xx", "a", "A", "01", Coordinate::new(0.0, 0.0)?))?;
//! let b = db.insert_record(NewCity::new("xx", "b", "B", "01", Coordinate::new(0.0, 1.0)?))?;
//! db.insert_record(NewCity::new("xx", "c", "C", "01", Coordinate::new(0.0, 10.0)?))?;
//!
//! let nearest = db.nearest_k(&Coordinate::new(0.0, 0.0)?, 2)?;
//! assert_eq!(nearest.iter().map(|c| c.id).collect::<Vec<_>>(), vec![a, b]);
//! # Ok::<(), gazetteer::GazetteerError>(())
//! ```

pub mod builder;
pub mod compute;
pub mod config;
pub mod db;
pub mod error;
#[cfg(feature = "csv")]
pub mod loader;
pub mod storage;
pub mod types;

pub use builder::DBBuilder;
pub use db::{AtomicBatch, DB};
pub use error::{GazetteerError, Result};

pub type Gazetteer = DB;

pub use compute::spatial::{
    EARTH_MEAN_RADIUS_METERS, RTree, SpatialIndexStats, bounding_box, haversine_distance,
};

pub use config::{Config, IndexConfig};

pub use storage::RecordStore;

pub use types::{BoundingBox, CityId, CityRecord, Coordinate, DbStats, NewCity};

#[cfg(feature = "csv")]
pub use loader::{read_cities, read_cities_path};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{DBBuilder, Gazetteer, GazetteerError, Result};

    pub use crate::{BoundingBox, CityId, CityRecord, Coordinate, NewCity};

    pub use crate::compute::spatial::{bounding_box, haversine_distance};

    pub use crate::{Config, IndexConfig};
}
