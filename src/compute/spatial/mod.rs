//! Spherical geometry and the owned R-tree index.

pub mod algorithms;
pub use algorithms::{
    EARTH_MEAN_RADIUS_METERS, bounding_box, covering_boxes, haversine_distance,
    min_distance_to_box,
};

pub mod queries;

pub mod rtree;
pub use rtree::{Entry, RTree, SpatialIndexStats};
