//! Spherical distance and bounding primitives for WGS84 coordinates.
//!
//! All distances are great-circle distances on a sphere with the mean Earth
//! radius. Bounding boxes are computed in degrees and are conservative: they
//! always contain the whole spherical cap they stand in for, so a box lookup
//! followed by an exact haversine filter never loses a point.

use crate::types::{BoundingBox, Coordinate};
use smallvec::{SmallVec, smallvec};
use std::f64::consts::{FRAC_PI_2, PI};

/// Mean Earth radius in meters (IUGG / GRS80 mean radius).
pub const EARTH_MEAN_RADIUS_METERS: f64 = 6_371_008.8;

/// Padding in degrees added to computed box edges to absorb rounding.
const BOX_PADDING_DEGREES: f64 = 1e-9;

/// Subtracted from point-to-box distances so that rounding never makes the
/// bound exceed the haversine distance of a point inside the box.
const MIN_DISTANCE_SLACK_METERS: f64 = 1.0;

/// Great-circle distance between two coordinates in meters.
///
/// Symmetric, and zero when both coordinates are equal.
///
/// # Examples
///
/// ```rust
/// use gazetteer::Coordinate;
/// use gazetteer::compute::spatial::haversine_distance;
///
/// let nyc = Coordinate::new(-74.0060, 40.7128).unwrap();
/// let la = Coordinate::new(-118.2437, 34.0522).unwrap();
///
/// let dist = haversine_distance(&nyc, &la);
/// assert!(dist > 3_900_000.0 && dist < 4_000_000.0);
/// assert_eq!(haversine_distance(&nyc, &la), haversine_distance(&la, &nyc));
/// ```
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    haversine_degrees(a.longitude(), a.latitude(), b.longitude(), b.latitude())
}

#[inline]
pub(crate) fn haversine_degrees(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

    2.0 * EARTH_MEAN_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Conservative rectangle containing every point within `radius_meters` of
/// `center`.
///
/// The longitude half-width is `asin(sin(d) / cos(lat))` for angular radius
/// `d`, which is the `1/cos(lat)` widening made exact for large radii. When
/// the circle reaches a pole the box spans all longitudes, and when it crosses
/// the antimeridian the box is widened to all longitudes too. Use
/// [`covering_boxes`] for the tighter split form.
///
/// ```rust
/// use gazetteer::Coordinate;
/// use gazetteer::compute::spatial::bounding_box;
///
/// let center = Coordinate::new(0.0, 0.0).unwrap();
/// let bbox = bounding_box(&center, 111_195.0);
/// assert!((bbox.max_lat() - 1.0).abs() < 1e-3);
/// assert!((bbox.min_lon() + 1.0).abs() < 1e-3);
/// ```
pub fn bounding_box(center: &Coordinate, radius_meters: f64) -> BoundingBox {
    let boxes = covering_boxes(center, radius_meters);
    boxes[1..]
        .iter()
        .fold(boxes[0], |acc, bbox| acc.union(bbox))
}

/// One or two non-overlapping boxes that together cover the spherical cap of
/// `radius_meters` around `center`. Two boxes are returned only when the cap
/// crosses the antimeridian.
pub fn covering_boxes(center: &Coordinate, radius_meters: f64) -> SmallVec<[BoundingBox; 2]> {
    let delta = radius_meters.max(0.0) / EARTH_MEAN_RADIUS_METERS;
    if delta >= PI {
        return smallvec![BoundingBox::world()];
    }

    let lat = center.latitude().to_radians();
    let lat_lo = lat - delta;
    let lat_hi = lat + delta;

    let min_lat = (lat_lo.to_degrees() - BOX_PADDING_DEGREES).max(-90.0);
    let max_lat = (lat_hi.to_degrees() + BOX_PADDING_DEGREES).min(90.0);

    // A cap touching a pole contains every meridian.
    if lat_hi >= FRAC_PI_2 || lat_lo <= -FRAC_PI_2 {
        return smallvec![BoundingBox::from_bounds(-180.0, min_lat, 180.0, max_lat)];
    }

    let ratio = delta.sin() / lat.cos().max(f64::MIN_POSITIVE);
    if ratio >= 1.0 {
        return smallvec![BoundingBox::from_bounds(-180.0, min_lat, 180.0, max_lat)];
    }

    let d_lon = ratio.asin().to_degrees() + BOX_PADDING_DEGREES;
    let lon = center.longitude();
    let west = lon - d_lon;
    let east = lon + d_lon;

    if east - west >= 360.0 {
        smallvec![BoundingBox::from_bounds(-180.0, min_lat, 180.0, max_lat)]
    } else if west < -180.0 {
        smallvec![
            BoundingBox::from_bounds(west + 360.0, min_lat, 180.0, max_lat),
            BoundingBox::from_bounds(-180.0, min_lat, east, max_lat),
        ]
    } else if east > 180.0 {
        smallvec![
            BoundingBox::from_bounds(west, min_lat, 180.0, max_lat),
            BoundingBox::from_bounds(-180.0, min_lat, east - 360.0, max_lat),
        ]
    } else {
        smallvec![BoundingBox::from_bounds(west, min_lat, east, max_lat)]
    }
}

/// Lower bound in meters on the great-circle distance from `point` to any
/// point inside `bbox`. Zero when the box contains the point.
///
/// The closest point of a longitude/latitude box lies either on the
/// point's own meridian (when the box spans its longitude) or on one of the
/// two meridian edges. On an edge the distance is minimised at the foot of
/// the perpendicular `atan2(sin(lat), cos(lat) * cos(d_lon))` or at an end.
pub fn min_distance_to_box(point: &Coordinate, bbox: &BoundingBox) -> f64 {
    let lon = point.longitude();
    let lat = point.latitude();

    let exact = if lon >= bbox.min_lon() && lon <= bbox.max_lon() {
        let nearest_lat = lat.clamp(bbox.min_lat(), bbox.max_lat());
        if nearest_lat == lat {
            return 0.0;
        }
        haversine_degrees(lon, lat, lon, nearest_lat)
    } else {
        let west = distance_to_meridian_segment(lon, lat, bbox.min_lon(), bbox);
        let east = distance_to_meridian_segment(lon, lat, bbox.max_lon(), bbox);
        west.min(east)
    };

    (exact - MIN_DISTANCE_SLACK_METERS).max(0.0)
}

fn distance_to_meridian_segment(lon: f64, lat: f64, edge_lon: f64, bbox: &BoundingBox) -> f64 {
    let phi = lat.to_radians();
    let d_lambda = (lon - edge_lon).to_radians();
    let foot = phi.sin().atan2(phi.cos() * d_lambda.cos()).to_degrees();

    let mut best = haversine_degrees(lon, lat, edge_lon, bbox.min_lat())
        .min(haversine_degrees(lon, lat, edge_lon, bbox.max_lat()));

    if foot > bbox.min_lat() && foot < bbox.max_lat() {
        best = best.min(haversine_degrees(lon, lat, edge_lon, foot));
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Distance, Haversine, Point};

    fn coord(lon: f64, lat: f64) -> Coordinate {
        Coordinate::new(lon, lat).unwrap()
    }

    #[test]
    fn test_haversine_matches_geo() {
        let pairs = [
            ((-74.0060, 40.7128), (-118.2437, 34.0522)),
            ((2.3522, 48.8566), (-0.1278, 51.5074)),
            ((139.6917, 35.6895), (151.2093, -33.8688)),
            ((179.9, 0.0), (-179.9, 0.0)),
            ((0.0, 89.0), (180.0, 89.0)),
        ];

        for ((lon1, lat1), (lon2, lat2)) in pairs {
            let ours = haversine_distance(&coord(lon1, lat1), &coord(lon2, lat2));
            let theirs = Haversine.distance(Point::new(lon1, lat1), Point::new(lon2, lat2));
            assert!(
                ((ours - theirs) / theirs).abs() < 1e-9,
                "{} vs {} for {:?}",
                ours,
                theirs,
                ((lon1, lat1), (lon2, lat2))
            );
        }
    }

    #[test]
    fn test_haversine_zero_and_symmetric() {
        let a = coord(12.5, -33.25);
        let b = coord(-77.0, 8.0);
        assert_eq!(haversine_distance(&a, &a), 0.0);
        assert_eq!(haversine_distance(&a, &b), haversine_distance(&b, &a));
        assert!(haversine_distance(&a, &b) > 0.0);
    }

    #[test]
    fn test_one_degree_at_equator() {
        let d = haversine_distance(&coord(0.0, 0.0), &coord(0.0, 1.0));
        assert!((d - 111_195.08).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_bounding_box_contains_circle() {
        let centers = [
            coord(0.0, 0.0),
            coord(10.0, 60.0),
            coord(-120.0, -75.0),
            coord(45.0, 85.0),
        ];
        let radii = [1_000.0, 150_000.0, 900_000.0];

        for center in &centers {
            for &radius in &radii {
                let bbox = bounding_box(center, radius);
                // Sample the circle boundary by bearing.
                for step in 0..360 {
                    let p = destination(center, step as f64, radius * 0.999_999);
                    assert!(
                        bbox.contains_point(&p),
                        "{:?} r={} bearing={} point {:?} not in {:?}",
                        center,
                        radius,
                        step,
                        p,
                        bbox
                    );
                }
            }
        }
    }

    #[test]
    fn test_bounding_box_widens_with_latitude() {
        let equator = bounding_box(&coord(0.0, 0.0), 100_000.0);
        let north = bounding_box(&coord(0.0, 60.0), 100_000.0);
        assert!(north.width() > equator.width() * 1.9);
        assert!((north.height() - equator.height()).abs() < 1e-6);
    }

    #[test]
    fn test_polar_cap_spans_all_longitudes() {
        let bbox = bounding_box(&coord(30.0, 89.5), 200_000.0);
        assert_eq!(bbox.min_lon(), -180.0);
        assert_eq!(bbox.max_lon(), 180.0);
        assert_eq!(bbox.max_lat(), 90.0);
    }

    #[test]
    fn test_antimeridian_split() {
        let boxes = covering_boxes(&coord(179.5, 0.0), 200_000.0);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].max_lon(), 180.0);
        assert_eq!(boxes[1].min_lon(), -180.0);
        assert!(boxes[1].max_lon() > -179.0);
        assert!(!boxes[0].intersects(&boxes[1]));

        let merged = bounding_box(&coord(179.5, 0.0), 200_000.0);
        assert_eq!(merged.min_lon(), -180.0);
        assert_eq!(merged.max_lon(), 180.0);
    }

    #[test]
    fn test_huge_radius_is_world() {
        let boxes = covering_boxes(&coord(0.0, 0.0), 30_000_000.0);
        assert_eq!(boxes.as_slice(), &[BoundingBox::world()]);
    }

    #[test]
    fn test_min_distance_inside_is_zero() {
        let bbox = BoundingBox::new(-1.0, -1.0, 1.0, 1.0).unwrap();
        assert_eq!(min_distance_to_box(&coord(0.5, 0.5), &bbox), 0.0);
        assert_eq!(min_distance_to_box(&coord(1.0, -1.0), &bbox), 0.0);
    }

    #[test]
    fn test_min_distance_is_lower_bound() {
        let boxes = [
            BoundingBox::new(10.0, 40.0, 20.0, 50.0).unwrap(),
            BoundingBox::new(-170.0, -80.0, -160.0, -70.0).unwrap(),
            BoundingBox::new(100.0, -5.0, 101.0, 5.0).unwrap(),
        ];
        let probes = [
            coord(0.0, 0.0),
            coord(15.0, 80.0),
            coord(175.0, -75.0),
            coord(-60.0, 45.0),
            coord(100.5, 30.0),
        ];

        for bbox in &boxes {
            for probe in &probes {
                let bound = min_distance_to_box(probe, bbox);
                let mut nearest = f64::INFINITY;
                for i in 0..=40 {
                    for j in 0..=40 {
                        let lon = bbox.min_lon() + bbox.width() * i as f64 / 40.0;
                        let lat = bbox.min_lat() + bbox.height() * j as f64 / 40.0;
                        nearest = nearest.min(haversine_degrees(
                            probe.longitude(),
                            probe.latitude(),
                            lon,
                            lat,
                        ));
                    }
                }
                assert!(
                    bound <= nearest,
                    "bound {} exceeds sampled {} for {:?} / {:?}",
                    bound,
                    nearest,
                    probe,
                    bbox
                );
                // Not uselessly loose: within 1% of the sampled minimum.
                assert!(bound >= nearest * 0.99 - 2.0, "{} vs {}", bound, nearest);
            }
        }
    }

    #[test]
    fn test_min_distance_across_antimeridian() {
        let bbox = BoundingBox::new(-180.0, -1.0, -179.0, 1.0).unwrap();
        let d = min_distance_to_box(&coord(179.5, 0.0), &bbox);
        let expected = haversine_degrees(179.5, 0.0, 180.0, 0.0);
        assert!((d - expected).abs() < 2.0, "{} vs {}", d, expected);
    }

    /// Point reached by travelling `distance` meters from `start` on `bearing_deg`.
    fn destination(start: &Coordinate, bearing_deg: f64, distance: f64) -> Coordinate {
        let delta = distance / EARTH_MEAN_RADIUS_METERS;
        let theta = bearing_deg.to_radians();
        let phi1 = start.latitude().to_radians();
        let lambda1 = start.longitude().to_radians();

        let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
        let lambda2 = lambda1
            + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

        let mut lon = lambda2.to_degrees();
        if lon > 180.0 {
            lon -= 360.0;
        } else if lon < -180.0 {
            lon += 360.0;
        }
        coord(lon, phi2.to_degrees())
    }
}
