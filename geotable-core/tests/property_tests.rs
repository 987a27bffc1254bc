//! Property-based tests for geometry reconstruction and the reference index.
//!
//! # Invariants tested
//!
//! - **Shape rule:** closed rings of more than three points become polygons,
//!   other multi-point ways become line strings in input order, single points
//!   stay points.
//! - **Idempotent registration:** registering an id again never clears a
//!   resolved geometry, for both index strategies.
//! - **Named output:** only elements carrying a `name` tag produce records.

mod support;

use geo::{Coord, Geometry, Point};
use geotable_core::{
    AttributeColumns, ConversionOptions, ElementKind, IndexSet, MemoryIndex, MemorySource, Record,
    RecordBuilder, ReferenceIndex, ScanCoordinator, SqliteIndex, Unclassified,
    geometry::way_geometry,
};
use proptest::prelude::*;

fn coord_strategy() -> impl Strategy<Value = Coord<f64>> {
    (-180_i32..=180, -90_i32..=90).prop_map(|(x, y)| Coord {
        x: f64::from(x),
        y: f64::from(y),
    })
}

fn open_way_strategy() -> impl Strategy<Value = Vec<Coord<f64>>> {
    prop::collection::vec(coord_strategy(), 2..12)
        .prop_filter("first and last point differ", |points| points.first() != points.last())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn closed_rings_become_polygons(mut ring in prop::collection::vec(coord_strategy(), 3..12)) {
        let first = *ring.first().expect("non-empty ring");
        ring.push(first);
        let geometry = way_geometry(&ring);
        match geometry {
            Some(Geometry::Polygon(polygon)) => {
                prop_assert_eq!(&polygon.exterior().0, &ring);
                prop_assert!(polygon.interiors().is_empty());
            }
            other => prop_assert!(false, "expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn open_ways_become_ordered_lines(points in open_way_strategy()) {
        match way_geometry(&points) {
            Some(Geometry::LineString(line)) => prop_assert_eq!(line.0, points),
            other => prop_assert!(false, "expected line string, got {:?}", other),
        }
    }

    #[test]
    fn single_points_stay_points(point in coord_strategy()) {
        prop_assert_eq!(way_geometry(&[point]), Some(Geometry::Point(Point::from(point))));
    }

    #[test]
    fn memory_registration_is_idempotent(ids in prop::collection::vec("[0-9]{1,4}", 1..20)) {
        let mut index = MemoryIndex::default();
        assert_registration_idempotent(&mut index, &ids)?;
    }

    #[test]
    fn only_named_elements_produce_records(named in prop::collection::vec(any::<bool>(), 1..16)) {
        let elements = named
            .iter()
            .enumerate()
            .map(|(position, &has_name)| {
                let id = position.to_string();
                if has_name {
                    support::node(&id, 1.0, 1.0, &[("name", "Named")])
                } else {
                    support::node(&id, 1.0, 1.0, &[("amenity", "bench")])
                }
            })
            .collect();
        let mut source = MemorySource::new(elements);
        let builder = RecordBuilder::new(Box::new(Unclassified), AttributeColumns::default());
        let mut records: Vec<Record> = Vec::new();
        let stats = ScanCoordinator::new(IndexSet::in_memory(), builder, ConversionOptions::default())
            .run(&mut source, &mut records)
            .expect("conversion succeeds");
        let expected = named.iter().filter(|&&has_name| has_name).count();
        prop_assert_eq!(records.len(), expected);
        prop_assert!(records.iter().all(|record| record.name == "Named"));
        prop_assert_eq!(stats.rejected, 0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn sqlite_registration_is_idempotent(ids in prop::collection::vec("[0-9]{1,4}", 1..20)) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut index = SqliteIndex::open(ElementKind::Node, &dir.path().join("nodes.sqlite"))
            .expect("open index");
        assert_registration_idempotent(&mut index, &ids)?;
    }
}

fn assert_registration_idempotent(
    index: &mut dyn ReferenceIndex,
    ids: &[String],
) -> Result<(), TestCaseError> {
    let geometry = Geometry::Point(Point::new(3.0, 4.0));
    for id in ids {
        index.register(id).expect("register");
        index.resolve(id, &geometry).expect("resolve");
    }
    for id in ids {
        index.register(id).expect("register again");
        prop_assert_eq!(index.get(id).expect("get"), Some(geometry.clone()));
    }
    let unique: std::collections::BTreeSet<_> = ids.iter().collect();
    prop_assert_eq!(index.len().expect("len"), unique.len() as u64);
    Ok(())
}
