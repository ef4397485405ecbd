//! Validation for geographic coordinates, records and query arguments.

use crate::error::{GazetteerError, Result};
use crate::types::{CityId, NewCity};

/// Validates a longitude/latitude pair.
///
/// Longitude: [-180.0, 180.0], Latitude: [-90.0, 90.0]
///
/// # Examples
///
/// ```
/// use gazetteer::compute::validation::validate_coordinate;
///
/// assert!(validate_coordinate(-74.0060, 40.7128).is_ok());
/// assert!(validate_coordinate(200.0, 40.0).is_err());
/// assert!(validate_coordinate(-74.0, f64::NAN).is_err());
/// ```
pub fn validate_coordinate(longitude: f64, latitude: f64) -> Result<()> {
    if !longitude.is_finite() {
        return Err(GazetteerError::InvalidCoordinate(format!(
            "Longitude must be finite, got: {}",
            longitude
        )));
    }

    if !latitude.is_finite() {
        return Err(GazetteerError::InvalidCoordinate(format!(
            "Latitude must be finite, got: {}",
            latitude
        )));
    }

    if !(-180.0..=180.0).contains(&longitude) {
        return Err(GazetteerError::InvalidCoordinate(format!(
            "Longitude out of range [-180.0, 180.0]: {}",
            longitude
        )));
    }

    if !(-90.0..=90.0).contains(&latitude) {
        return Err(GazetteerError::InvalidCoordinate(format!(
            "Latitude out of range [-90.0, 90.0]: {}",
            latitude
        )));
    }

    Ok(())
}

/// Validates bounding box corners. Both corners must be valid coordinates
/// and the box must not be inverted.
pub fn validate_bounding_box(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<()> {
    validate_coordinate(min_lon, min_lat)
        .and_then(|_| validate_coordinate(max_lon, max_lat))
        .map_err(|e| GazetteerError::InvalidInput(format!("Bounding box corner: {}", e)))?;

    if min_lon > max_lon {
        return Err(GazetteerError::InvalidInput(format!(
            "min_lon ({}) must be <= max_lon ({})",
            min_lon, max_lon
        )));
    }
    if min_lat > max_lat {
        return Err(GazetteerError::InvalidInput(format!(
            "min_lat ({}) must be <= max_lat ({})",
            min_lat, max_lat
        )));
    }

    Ok(())
}

/// Checks the descriptive fields of a city. The location is already
/// validated by construction of [`crate::Coordinate`].
pub fn validate_city(city: &NewCity) -> Result<()> {
    let fields = [
        ("country", &city.country),
        ("city", &city.city),
        ("accent_city", &city.accent_city),
        ("region", &city.region),
    ];

    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(GazetteerError::InvalidRecord(format!(
                "Field '{}' must not be empty",
                name
            )));
        }
    }

    Ok(())
}

/// Ids run from 1 to `CityId::MAX - 1`; the top value is kept free so the
/// id counter can always move past a stored id.
pub fn validate_id(id: CityId) -> Result<()> {
    if id == 0 {
        return Err(GazetteerError::InvalidRecord(
            "Record id must be a positive integer".to_string(),
        ));
    }
    if id == CityId::MAX {
        return Err(GazetteerError::InvalidRecord(format!(
            "Record id must be below {}",
            CityId::MAX
        )));
    }
    Ok(())
}

pub fn validate_radius(radius_meters: f64) -> Result<()> {
    if !radius_meters.is_finite() || radius_meters <= 0.0 {
        return Err(GazetteerError::InvalidInput(format!(
            "Radius must be a positive finite number of meters, got: {}",
            radius_meters
        )));
    }
    Ok(())
}

pub fn validate_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(GazetteerError::InvalidInput(
            "k must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinate;

    #[test]
    fn test_valid_coordinates() {
        assert!(validate_coordinate(-74.0060, 40.7128).is_ok());
        assert!(validate_coordinate(-0.1278, 51.5074).is_ok());
        assert!(validate_coordinate(139.6917, 35.6895).is_ok());

        // Edge cases
        assert!(validate_coordinate(180.0, 0.0).is_ok());
        assert!(validate_coordinate(-180.0, 0.0).is_ok());
        assert!(validate_coordinate(0.0, 90.0).is_ok());
        assert!(validate_coordinate(0.0, -90.0).is_ok());
    }

    #[test]
    fn test_invalid_longitude() {
        assert!(validate_coordinate(200.0, 40.0).is_err());
        assert!(validate_coordinate(-200.0, 40.0).is_err());
        assert!(validate_coordinate(180.1, 40.0).is_err());
    }

    #[test]
    fn test_invalid_latitude() {
        assert!(validate_coordinate(-74.0, 95.0).is_err());
        assert!(validate_coordinate(-74.0, -95.0).is_err());
        assert!(validate_coordinate(-74.0, 90.1).is_err());
    }

    #[test]
    fn test_non_finite_coordinates() {
        for (lon, lat) in [
            (f64::NAN, 40.0),
            (-74.0, f64::NAN),
            (f64::INFINITY, 40.0),
            (-74.0, f64::NEG_INFINITY),
        ] {
            let err = validate_coordinate(lon, lat).unwrap_err();
            assert!(matches!(err, GazetteerError::InvalidCoordinate(_)));
        }
    }

    #[test]
    fn test_bounding_box_validation() {
        assert!(validate_bounding_box(-10.0, -10.0, 10.0, 10.0).is_ok());
        assert!(validate_bounding_box(5.0, 5.0, 5.0, 5.0).is_ok());
        assert!(validate_bounding_box(10.0, -10.0, -10.0, 10.0).is_err());
        assert!(validate_bounding_box(-10.0, 10.0, 10.0, -10.0).is_err());
        assert!(validate_bounding_box(-190.0, 0.0, 10.0, 10.0).is_err());
    }

    #[test]
    fn test_city_fields_must_be_present() {
        let loc = Coordinate::new(0.0, 0.0).unwrap();
        assert!(validate_city(&NewCity::new("ad", "andorra", "Andorra", "07", loc)).is_ok());

        let err = validate_city(&NewCity::new("ad", "", "Andorra", "07", loc)).unwrap_err();
        assert!(err.to_string().contains("'city'"));

        let err = validate_city(&NewCity::new("ad", "andorra", "Andorra", "   ", loc)).unwrap_err();
        assert!(err.to_string().contains("'region'"));
    }

    #[test]
    fn test_query_arguments() {
        assert!(validate_radius(1.0).is_ok());
        assert!(validate_radius(0.0).is_err());
        assert!(validate_radius(-5.0).is_err());
        assert!(validate_radius(f64::NAN).is_err());
        assert!(validate_radius(f64::INFINITY).is_err());
        assert!(validate_k(1).is_ok());
        assert!(validate_k(0).is_err());
        assert!(validate_id(1).is_ok());
        assert!(validate_id(0).is_err());
        assert!(validate_id(CityId::MAX - 1).is_ok());
        assert!(validate_id(CityId::MAX).is_err());
    }
}
