//! Shared helpers for geotable-core integration tests.
#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::collections::BTreeSet;

use geotable_core::{
    CategoryPath, Classifier, Element, ElementId, ElementKind, Member, Node, Relation, Tags, Way,
    element::collect_tags,
};

/// Epsilon for floating-point coordinate comparisons in tests
const COORDINATE_EPSILON: f64 = 1.0e-7;

/// Compare floating-point coordinates within a small epsilon.
#[expect(
    clippy::float_arithmetic,
    reason = "test delta computation requires float maths"
)]
pub fn assert_close(actual: f64, expected: f64) {
    let delta = (actual - expected).abs();
    assert!(
        delta <= COORDINATE_EPSILON,
        "expected {expected}, got {actual} (|Δ| = {delta})"
    );
}

pub fn tags(pairs: &[(&str, &str)]) -> Tags {
    collect_tags(pairs.iter().copied())
}

pub fn node(id: &str, lon: f64, lat: f64, pairs: &[(&str, &str)]) -> Element {
    Element::Node(Node {
        id: id.to_owned(),
        lon,
        lat,
        tags: tags(pairs),
    })
}

pub fn way(id: &str, node_refs: &[&str], pairs: &[(&str, &str)]) -> Element {
    Element::Way(Way {
        id: id.to_owned(),
        node_refs: node_refs.iter().map(|&raw| raw.to_owned()).collect(),
        tags: tags(pairs),
    })
}

pub fn relation(id: &str, members: &[(ElementKind, &str)], pairs: &[(&str, &str)]) -> Element {
    Element::Relation(Relation {
        id: id.to_owned(),
        members: members
            .iter()
            .map(|&(kind, raw)| Member {
                id: ElementId::new(kind, raw),
                role: String::new(),
            })
            .collect(),
        tags: tags(pairs),
    })
}

/// Classifier matching exact `key=value` pairs in declaration order.
#[derive(Debug, Default)]
pub struct PairClassifier {
    rules: Vec<(String, String, CategoryPath)>,
    keys: BTreeSet<String>,
}

impl PairClassifier {
    pub fn with_rule(mut self, key: &str, value: &str, path: &[&str]) -> Self {
        self.keys.insert(key.to_owned());
        self.rules.push((
            key.to_owned(),
            value.to_owned(),
            path.iter().copied().collect(),
        ));
        self
    }
}

impl Classifier for PairClassifier {
    fn lookup(&self, tags: &Tags) -> Option<CategoryPath> {
        self.rules
            .iter()
            .find(|(key, value, _)| tags.get(key) == Some(value))
            .map(|(_, _, path)| path.clone())
    }

    fn filter_keys(&self) -> Option<&BTreeSet<String>> {
        Some(&self.keys)
    }
}

/// A small dataset exercising every element kind, a forward relation
/// reference and elements outside the tag filter.
pub fn mixed_dataset() -> Vec<Element> {
    vec![
        node("1", 0.0, 0.0, &[]),
        node("2", 2.0, 0.0, &[]),
        node("3", 2.0, 2.0, &[]),
        node("4", 0.0, 2.0, &[]),
        node("5", 7.0, 7.0, &[("name", "Bakery"), ("shop", "bakery")]),
        node("6", 9.0, 9.0, &[("name", "Bench")]),
        relation(
            "20",
            &[(ElementKind::Relation, "21"), (ElementKind::Way, "10")],
            &[("name", "Tour"), ("route", "hiking")],
        ),
        way("10", &["1", "2", "3", "4", "1"], &[("name", "Park"), ("leisure", "park")]),
        way("11", &["1", "3"], &[("name", "Path"), ("highway", "path")]),
        way("12", &["2", "404"], &[("name", "Lane"), ("highway", "residential")]),
        relation("21", &[(ElementKind::Node, "5")], &[]),
    ]
}

pub fn mixed_classifier() -> PairClassifier {
    PairClassifier::default()
        .with_rule("leisure", "park", &["Leisure", "Park"])
        .with_rule("shop", "bakery", &["Shops", "Food", "Bakery"])
        .with_rule("highway", "path", &["Transport", "Path"])
        .with_rule("highway", "residential", &["Transport", "Street"])
        .with_rule("route", "hiking", &["Leisure", "Route"])
}
