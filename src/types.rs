//! Value types shared by the record store, the spatial index and the query engine.

use crate::compute::spatial::algorithms::haversine_distance;
use crate::compute::validation::{validate_bounding_box, validate_coordinate};
use crate::error::{GazetteerError, Result};
use serde::{Deserialize, Serialize};

/// Stable record identifier. Ids start at 1 and are never reused by a store.
pub type CityId = u64;

/// A validated WGS84 (SRID 4326) position in degrees.
///
/// Longitude is in `[-180, 180]`, latitude in `[-90, 90]`, both finite.
/// A `Coordinate` can only be obtained through [`Coordinate::new`] (or
/// deserialization, which runs the same checks), so holding one is proof
/// the values are in range.
///
/// ```rust
/// use gazetteer::Coordinate;
///
/// let paris = Coordinate::new(2.3522, 48.8566).unwrap();
/// assert_eq!(paris.latitude(), 48.8566);
/// assert!(Coordinate::new(181.0, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    longitude: f64,
    latitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    longitude: f64,
    latitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = GazetteerError;

    fn try_from(raw: RawCoordinate) -> Result<Self> {
        Coordinate::new(raw.longitude, raw.latitude)
    }
}

impl Coordinate {
    /// Create a coordinate, failing with `InvalidCoordinate` when either value
    /// is non-finite or out of range.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self> {
        validate_coordinate(longitude, latitude)?;
        Ok(Self {
            longitude,
            latitude,
        })
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Great-circle distance in meters.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine_distance(self, other)
    }
}

/// An axis-aligned longitude/latitude rectangle in degrees.
///
/// Boxes never wrap the antimeridian: `min_lon <= max_lon` always holds.
/// Query regions that cross it are split into two boxes internally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

#[derive(Deserialize)]
struct RawBoundingBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = GazetteerError;

    fn try_from(raw: RawBoundingBox) -> Result<Self> {
        BoundingBox::new(raw.min_lon, raw.min_lat, raw.max_lon, raw.max_lat)
    }
}

impl BoundingBox {
    /// Create a validated bounding box.
    ///
    /// ```rust
    /// use gazetteer::BoundingBox;
    ///
    /// let alps = BoundingBox::new(5.0, 44.0, 16.0, 48.5).unwrap();
    /// assert!(alps.width() > 10.0);
    /// assert!(BoundingBox::new(10.0, 0.0, 5.0, 1.0).is_err());
    /// ```
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self> {
        validate_bounding_box(min_lon, min_lat, max_lon, max_lat)?;
        Ok(Self::from_bounds(min_lon, min_lat, max_lon, max_lat))
    }

    /// Box covering the whole globe.
    pub fn world() -> Self {
        Self::from_bounds(-180.0, -90.0, 180.0, 90.0)
    }

    pub(crate) const fn from_bounds(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Degenerate box holding a single point.
    pub fn from_point(point: &Coordinate) -> Self {
        Self::from_bounds(
            point.longitude,
            point.latitude,
            point.longitude,
            point.latitude,
        )
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Area in square degrees. Only meaningful for comparing boxes.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        Self::from_bounds(
            self.min_lon.min(other.min_lon),
            self.min_lat.min(other.min_lat),
            self.max_lon.max(other.max_lon),
            self.max_lat.max(other.max_lat),
        )
    }

    /// Area growth needed for `self` to also cover `other`.
    pub fn enlargement(&self, other: &BoundingBox) -> f64 {
        self.union(other).area() - self.area()
    }

    /// Closed-interval intersection test; touching edges intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    pub fn contains_point(&self, point: &Coordinate) -> bool {
        point.longitude >= self.min_lon
            && point.longitude <= self.max_lon
            && point.latitude >= self.min_lat
            && point.latitude <= self.max_lat
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.min_lon >= self.min_lon
            && other.max_lon <= self.max_lon
            && other.min_lat >= self.min_lat
            && other.max_lat <= self.max_lat
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }
}

/// City fields without an id, as supplied by ingestion and updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCity {
    pub country: String,
    pub city: String,
    pub accent_city: String,
    pub region: String,
    pub location: Coordinate,
}

impl NewCity {
    pub fn new(
        country: impl Into<String>,
        city: impl Into<String>,
        accent_city: impl Into<String>,
        region: impl Into<String>,
        location: Coordinate,
    ) -> Self {
        Self {
            country: country.into(),
            city: city.into(),
            accent_city: accent_city.into(),
            region: region.into(),
            location,
        }
    }

    /// Attach a store-assigned id.
    pub fn with_id(self, id: CityId) -> CityRecord {
        CityRecord {
            id,
            country: self.country,
            city: self.city,
            accent_city: self.accent_city,
            region: self.region,
            location: self.location,
        }
    }
}

/// A stored city.
///
/// Records handed out by the store are copies; changing one does not touch
/// the store. Use the update operations on [`crate::DB`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    pub id: CityId,
    pub country: String,
    pub city: String,
    pub accent_city: String,
    pub region: String,
    pub location: Coordinate,
}

impl CityRecord {
    /// Split into id and the replaceable fields.
    pub fn into_parts(self) -> (CityId, NewCity) {
        (
            self.id,
            NewCity {
                country: self.country,
                city: self.city,
                accent_city: self.accent_city,
                region: self.region,
                location: self.location,
            },
        )
    }
}

/// Store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DbStats {
    /// Number of stored records
    pub record_count: usize,
    /// Levels in the spatial index, 0 when empty
    pub index_height: usize,
    /// Internal plus leaf nodes in the spatial index
    pub node_count: usize,
    /// Id the next single insert will receive
    pub next_id: CityId,
}
