//! Counters accumulated over one conversion job.

use geo::{BoundingRect, Coord, Geometry, Rect};

use crate::index::IndexSizes;

/// Summary of a conversion job, returned by the coordinator.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobStats {
    /// Nodes seen during the full parse.
    pub nodes: u64,
    /// Ways seen during the full parse.
    pub ways: u64,
    /// Relations seen during the full parse.
    pub relations: u64,
    /// Elements carrying a `name` tag.
    pub named_entities: u64,
    /// Records handed to the sink.
    pub records: u64,
    /// Named elements that produced no record.
    pub rejected: u64,
    /// Relations deferred to the retry.
    pub incomplete_relations: u64,
    /// Deferred relations that produced a geometry on retry.
    pub recovered_relations: u64,
    /// Deferred relations without any resolvable member.
    pub dropped_relations: u64,
    /// Complete traversals of the source.
    pub traversals: u32,
    /// Index entry counts once scanning finished.
    pub indexed: IndexSizes,
    /// Bounding box of all output geometries, `x = longitude`,
    /// `y = latitude`.
    pub bounds: Option<Rect<f64>>,
}

impl JobStats {
    /// Fold another job's counters into this one.
    #[must_use]
    pub fn combine(mut self, other: Self) -> Self {
        self.nodes += other.nodes;
        self.ways += other.ways;
        self.relations += other.relations;
        self.named_entities += other.named_entities;
        self.records += other.records;
        self.rejected += other.rejected;
        self.incomplete_relations += other.incomplete_relations;
        self.recovered_relations += other.recovered_relations;
        self.dropped_relations += other.dropped_relations;
        self.traversals += other.traversals;
        self.indexed.nodes += other.indexed.nodes;
        self.indexed.ways += other.indexed.ways;
        self.indexed.relations += other.indexed.relations;
        if let Some(bounds) = other.bounds {
            self.include_bounds(bounds);
        }
        self
    }

    pub(crate) fn record_output(&mut self, geometry: &Geometry<f64>) {
        self.records += 1;
        if let Some(bounds) = geometry.bounding_rect() {
            self.include_bounds(bounds);
        }
    }

    pub(crate) fn record_rejection(&mut self) {
        self.rejected += 1;
    }

    fn include_bounds(&mut self, bounds: Rect<f64>) {
        match &mut self.bounds {
            Some(existing) => {
                let min = Coord {
                    x: existing.min().x.min(bounds.min().x),
                    y: existing.min().y.min(bounds.min().y),
                };
                let max = Coord {
                    x: existing.max().x.max(bounds.max().x),
                    y: existing.max().y.max(bounds.max().y),
                };
                *existing = Rect::new(min, max);
            }
            None => self.bounds = Some(bounds),
        }
    }
}
