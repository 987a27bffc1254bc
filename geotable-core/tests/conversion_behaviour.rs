//! Behavioural tests for `ScanCoordinator` using rstest-bdd.

use std::{cell::RefCell, fs, path::PathBuf};

use geotable_core::{
    AttributeColumns, Classifier, ConversionOptions, Element, ElementKind, IndexSet,
    IndexStrategy, JobStats, MemorySource, Record, RecordBuilder, ScanCoordinator, Unclassified,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

mod support;

use support::{PairClassifier, assert_close, mixed_classifier, mixed_dataset, node, relation, way};

type Outcome = (JobStats, Vec<Record>);

/// Shared state for conversion scenarios.
struct ConversionWorld {
    scratch: TempDir,
    elements: RefCell<Vec<Element>>,
    classifier: RefCell<Option<fn() -> PairClassifier>>,
    memory_outcome: RefCell<Option<Outcome>>,
    disk_outcome: RefCell<Option<Outcome>>,
}

impl ConversionWorld {
    fn new() -> Self {
        Self {
            scratch: TempDir::new().expect("create temp dir"),
            elements: RefCell::new(Vec::new()),
            classifier: RefCell::new(None),
            memory_outcome: RefCell::new(None),
            disk_outcome: RefCell::new(None),
        }
    }

    fn run(&self, strategy: IndexStrategy) -> Outcome {
        let indices = IndexSet::open(strategy, self.scratch.path()).expect("open indices");
        let classifier: Box<dyn Classifier> = match *self.classifier.borrow() {
            Some(make) => Box::new(make()),
            None => Box::new(Unclassified),
        };
        let builder = RecordBuilder::new(classifier, AttributeColumns::default());
        let mut source = MemorySource::new(self.elements.borrow().clone());
        let mut records = Vec::new();
        let stats = ScanCoordinator::new(indices, builder, ConversionOptions::default())
            .run(&mut source, &mut records)
            .expect("conversion succeeds");
        (stats, records)
    }

    fn memory_records(&self) -> Vec<Record> {
        self.memory_outcome
            .borrow()
            .as_ref()
            .map(|(_, records)| records.clone())
            .expect("in-memory conversion should have run")
    }

    fn memory_stats(&self) -> JobStats {
        self.memory_outcome
            .borrow()
            .as_ref()
            .map(|(stats, _)| stats.clone())
            .expect("in-memory conversion should have run")
    }
}

#[fixture]
fn world() -> ConversionWorld {
    ConversionWorld::new()
}

#[given("a park way closing a ring of four nodes")]
fn given_park(world: &ConversionWorld) {
    world.elements.replace(vec![
        node("1", 0.0, 0.0, &[]),
        node("2", 2.0, 0.0, &[]),
        node("3", 2.0, 2.0, &[]),
        node("4", 0.0, 2.0, &[]),
        way(
            "1",
            &["1", "2", "3", "4", "1"],
            &[("name", "Park"), ("leisure", "park")],
        ),
    ]);
}

#[given("a classifier mapping leisure=park to a category")]
fn given_park_classifier(world: &ConversionWorld) {
    world.classifier.replace(Some(|| {
        PairClassifier::default().with_rule("leisure", "park", &["Leisure", "Park"])
    }));
}

#[given("a route relation whose member relation appears later")]
fn given_forward_relation(world: &ConversionWorld) {
    world.elements.replace(vec![
        node("1", 5.0, 6.0, &[]),
        relation("1", &[(ElementKind::Relation, "2")], &[("name", "Route")]),
        relation("2", &[(ElementKind::Node, "1")], &[]),
    ]);
}

#[given("a mixed dataset with a tag filter")]
fn given_mixed(world: &ConversionWorld) {
    world.elements.replace(mixed_dataset());
    world.classifier.replace(Some(mixed_classifier));
}

#[when("I run the conversion with in-memory indices")]
fn run_in_memory(world: &ConversionWorld) {
    let outcome = world.run(IndexStrategy::InMemory);
    world.memory_outcome.replace(Some(outcome));
}

#[when("I run the conversion with disk indices")]
fn run_on_disk(world: &ConversionWorld) {
    let outcome = world.run(IndexStrategy::Disk);
    world.disk_outcome.replace(Some(outcome));
}

#[then("one record is produced for the park")]
fn then_one_park(world: &ConversionWorld) {
    let records = world.memory_records();
    assert_eq!(records.len(), 1, "expected exactly one record");
    let record = records.first().expect("record");
    assert_eq!(record.id, "w1");
    assert_eq!(record.name, "Park");
    assert_eq!(record.category, "Leisure");
    assert_eq!(record.subcategory, "Park");
}

#[then("the park record is a polygon centred on the ring")]
fn then_park_polygon(world: &ConversionWorld) {
    let records = world.memory_records();
    let record = records.first().expect("record");
    assert!(
        record.wkt.starts_with("POLYGON"),
        "unexpected geometry {}",
        record.wkt
    );
    assert_close(record.lon, 1.0);
    assert_close(record.lat, 1.0);
    assert_eq!(record.srid, 4326);
}

#[then("one record is produced for the route")]
fn then_one_route(world: &ConversionWorld) {
    let records = world.memory_records();
    assert_eq!(records.len(), 1, "expected exactly one record");
    assert_eq!(records.first().map(|record| record.id.as_str()), Some("r1"));
}

#[then("the route geometry contains the point of the later relation")]
fn then_route_geometry(world: &ConversionWorld) {
    let records = world.memory_records();
    let record = records.first().expect("record");
    assert_eq!(record.wkt, "GEOMETRYCOLLECTION(POINT(5 6))");
    assert_close(record.lon, 5.0);
    assert_close(record.lat, 6.0);
}

#[then("the route was recovered by the retry")]
fn then_route_recovered(world: &ConversionWorld) {
    let stats = world.memory_stats();
    assert_eq!(stats.incomplete_relations, 1);
    assert_eq!(stats.recovered_relations, 1);
    assert_eq!(stats.dropped_relations, 0);
    assert_eq!(stats.traversals, 4, "relation rescan should run once");
}

#[then("both strategies produce identical records")]
fn then_identical(world: &ConversionWorld) {
    let memory = world.memory_records();
    let disk = world
        .disk_outcome
        .borrow()
        .as_ref()
        .map(|(_, records)| records.clone())
        .expect("disk conversion should have run");
    assert_eq!(memory.len(), 5, "unexpected records: {memory:?}");
    assert_eq!(memory, disk);
}

#[then("elements outside the tag filter produce no record")]
fn then_filtered(world: &ConversionWorld) {
    let records = world.memory_records();
    assert!(records.iter().all(|record| record.name != "Bench"));
    let stats = world.memory_stats();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.named_entities, 6);
}

#[test]
fn scenario_indices_follow_feature_order() {
    let feature =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/features/conversion.feature");
    let contents = fs::read_to_string(&feature).unwrap_or_else(|err| {
        panic!("failed to read feature file {feature:?}: {err}");
    });
    let titles: Vec<&str> = contents
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Scenario: "))
        .collect();
    assert_eq!(
        titles,
        vec![
            "building a park polygon from a closed way",
            "resolving a relation defined later in the file",
            "matching records across index strategies",
        ],
        "scenario order changed in feature file"
    );
}

#[scenario(path = "tests/features/conversion.feature", index = 0)]
fn park_polygon(world: ConversionWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/conversion.feature", index = 1)]
fn forward_relation(world: ConversionWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/conversion.feature", index = 2)]
fn strategies_agree(world: ConversionWorld) {
    let _ = world;
}
