use gazetteer::{BoundingBox, Config, Coordinate, Gazetteer, GazetteerError, NewCity};

fn coord(lon: f64, lat: f64) -> Coordinate {
    Coordinate::new(lon, lat).expect("valid coordinate")
}

fn city(name: &str, lon: f64, lat: f64) -> NewCity {
    NewCity::new("xx", name, name, "01", coord(lon, lat))
}

/// Test 1: Large dataset through single inserts and a bulk load
#[test]
fn test_large_dataset_insertion() {
    let db = Gazetteer::memory().expect("Failed to create store");

    for i in 0..10_000 {
        let lat = 40.0 + (i as f64 * 0.00001);
        let lon = -74.0 + (i as f64 * 0.00001);
        db.insert_record(city("stress", lon, lat))
            .unwrap_or_else(|_| panic!("Failed to insert record {}", i));
    }

    let results = db
        .radius_search(&coord(-74.0, 40.0), 1000.0)
        .expect("Query failed");
    assert!(!results.is_empty());
    db.check_consistency().unwrap();

    db.rebuild_index().unwrap();
    assert!(db.stats().index_height <= 4);
    assert_eq!(
        db.radius_search(&coord(-74.0, 40.0), 1000.0).unwrap(),
        results
    );
}

/// Test 2: Extreme coordinate values
#[test]
fn test_extreme_coordinates() {
    let db = Gazetteer::memory().expect("Failed to create store");

    let north = db.insert_record(city("north pole", 0.0, 90.0)).unwrap();
    let south = db.insert_record(city("south pole", 0.0, -90.0)).unwrap();
    let west = db.insert_record(city("date line west", 180.0, 0.0)).unwrap();
    let east = db.insert_record(city("date line east", -180.0, 0.0)).unwrap();

    // Every meridian meets at the pole.
    let near_north = db.nearest_k(&coord(137.0, 89.9), 1).unwrap();
    assert_eq!(near_north[0].id, north);
    let near_south = db.radius_search(&coord(-45.0, -89.5), 100_000.0).unwrap();
    assert_eq!(near_south.iter().map(|c| c.id).collect::<Vec<_>>(), vec![south]);

    // 180 and -180 are the same meridian.
    let both = db.radius_search(&coord(180.0, 0.0), 1.0).unwrap();
    assert_eq!(both.iter().map(|c| c.id).collect::<Vec<_>>(), vec![west, east]);
}

/// Test 3: Invalid coordinates never reach the store
#[test]
fn test_invalid_coordinates_rejected() {
    for (lon, lat) in [
        (180.0001, 0.0),
        (-180.5, 0.0),
        (0.0, 90.0001),
        (0.0, -91.0),
        (f64::NAN, 0.0),
        (0.0, f64::INFINITY),
    ] {
        let err = Coordinate::new(lon, lat).unwrap_err();
        assert!(matches!(err, GazetteerError::InvalidCoordinate(_)));
    }
}

/// Test 4: Queries on an empty store return nothing rather than failing
#[test]
fn test_empty_store_queries() {
    let db = Gazetteer::memory().expect("Failed to create store");
    let origin = coord(0.0, 0.0);

    assert!(db.nearest_k(&origin, 10).unwrap().is_empty());
    assert!(db.radius_search(&origin, 1_000_000.0).unwrap().is_empty());
    assert!(db.bounding_box_search(&BoundingBox::world()).unwrap().is_empty());
    assert!(db.bulk_load(Vec::new()).unwrap().is_empty());
    db.rebuild_index().unwrap();
    assert_eq!(db.stats().index_height, 0);
}

/// Test 5: Malformed query arguments
#[test]
fn test_malformed_query_arguments() {
    let db = Gazetteer::memory().expect("Failed to create store");
    db.insert_record(city("a", 0.0, 0.0)).unwrap();
    let origin = coord(0.0, 0.0);

    for radius in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            db.radius_search(&origin, radius),
            Err(GazetteerError::InvalidInput(_))
        ));
    }
    assert!(matches!(
        db.nearest_k(&origin, 0),
        Err(GazetteerError::InvalidInput(_))
    ));
    assert!(matches!(
        BoundingBox::new(10.0, 0.0, -10.0, 5.0),
        Err(GazetteerError::InvalidInput(_))
    ));
}

/// Test 6: Empty descriptive fields are rejected
#[test]
fn test_empty_fields_rejected() {
    let db = Gazetteer::memory().expect("Failed to create store");
    let err = db
        .insert_record(NewCity::new("", "x", "X", "01", coord(0.0, 0.0)))
        .unwrap_err();
    assert!(matches!(err, GazetteerError::InvalidRecord(_)));
    assert!(db.is_empty());
    assert_eq!(db.stats().next_id, 1);
}

/// Test 7: Many records at the same position
#[test]
fn test_coincident_points() {
    let db = Gazetteer::with_config(Config::default().with_max_entries(4)).unwrap();
    for i in 0..100 {
        db.insert_record(city(&format!("dup{}", i), 7.0, 7.0)).unwrap();
    }
    db.check_consistency().unwrap();

    let hits = db.nearest_k(&coord(7.0, 7.0), 5).unwrap();
    assert_eq!(
        hits.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );

    for id in 1..=100 {
        db.delete_record(id).unwrap();
    }
    assert!(db.is_empty());
    db.check_consistency().unwrap();
}

/// Test 8: Radius larger than half the Earth's circumference
#[test]
fn test_radius_covering_globe() {
    let db = Gazetteer::memory().expect("Failed to create store");
    db.bulk_load(vec![
        city("a", 0.0, 0.0),
        city("antipode", 180.0, 0.0),
        city("b", 90.0, 45.0),
    ])
    .unwrap();

    let all = db.radius_search(&coord(0.0, 0.0), 25_000_000.0).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all.last().unwrap().city, "antipode");
}

/// Test 9: Ids are never reused after delete or clear-less churn
#[test]
fn test_ids_not_reused() {
    let db = Gazetteer::memory().expect("Failed to create store");
    let first = db.insert_record(city("a", 0.0, 0.0)).unwrap();
    db.delete_record(first).unwrap();
    let second = db.insert_record(city("b", 0.0, 0.0)).unwrap();
    assert!(second > first);

    db.insert_record_with_id(city("c", 1.0, 1.0).with_id(1_000)).unwrap();
    assert_eq!(db.insert_record(city("d", 2.0, 2.0)).unwrap(), 1_001);
    assert!(matches!(
        db.insert_record_with_id(city("e", 3.0, 3.0).with_id(1_000)),
        Err(GazetteerError::DuplicateId(1_000))
    ));
}

/// Test 10: Oversized k returns every record
#[test]
fn test_nearest_with_unbounded_k() {
    let db = Gazetteer::memory().expect("Failed to create store");
    db.bulk_load(vec![
        city("a", 0.0, 0.0),
        city("b", 1.0, 0.0),
        city("c", -2.0, 0.0),
    ])
    .unwrap();
    let origin = coord(0.0, 0.0);

    for k in [usize::MAX, 1usize << 60] {
        let hits = db.nearest_k(&origin, k).unwrap();
        assert_eq!(hits.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
    assert_eq!(db.nearest_k_with_distance(&origin, usize::MAX).unwrap().len(), 3);
}

/// Test 11: The top of the id range is refused without disturbing the store
#[test]
fn test_max_id_rejected() {
    let db = Gazetteer::memory().expect("Failed to create store");
    let err = db
        .insert_record_with_id(city("max", 0.0, 0.0).with_id(u64::MAX))
        .unwrap_err();
    assert!(matches!(err, GazetteerError::InvalidRecord(_)));

    let err = db
        .bulk_load_with_ids(vec![
            city("ok", 1.0, 1.0).with_id(5),
            city("max", 0.0, 0.0).with_id(u64::MAX),
        ])
        .unwrap_err();
    assert!(matches!(err, GazetteerError::BulkLoadFailed { index: 1, .. }));
    assert!(db.is_empty());
    assert_eq!(db.stats().next_id, 1);
    db.check_consistency().unwrap();
}
