//! Multi-pass scan coordinator.
//!
//! Responsibilities:
//! - traverse the element source once per phase, in a fixed phase order;
//! - index the references of retained relations and ways during the scans;
//! - build geometries and records during the full parse;
//! - retry relations whose members were not yet resolved, exactly once.
//!
//! Boundaries:
//! - decoding belongs to [`ElementSource`] implementations;
//! - category lookup belongs to the [`crate::Classifier`] held by the
//!   [`RecordBuilder`];
//! - output formatting belongs to the [`RecordSink`].
//!
//! Invariants:
//! - the relation rescan runs at most once;
//! - the reference buffer never carries references across elements;
//! - the indices are cleared before the job returns.

use std::fmt;
use std::num::NonZeroU64;

use geo::{Coord, Geometry};
use log::{debug, info};
use thiserror::Error;

use crate::builder::RecordBuilder;
use crate::element::{Element, ElementId, ElementKind, Node, Relation, Tags, Way, name};
use crate::geometry::{aggregate, point_coord, way_geometry};
use crate::index::{IndexError, IndexSet};
use crate::queue::IncompleteRelationQueue;
use crate::sink::{RecordSink, SinkError};
use crate::source::{ElementSource, SourceError};

mod buffer;
mod stats;

use buffer::ReferenceBuffer;
pub use buffer::keep_references;
pub use stats::JobStats;

/// Number of records between two progress notifications by default.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1_000;

/// Phases of a conversion job, in execution order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Index the members of retained relations.
    ScanRelations,
    /// Repeat the relation scan once when relations reference relations.
    RescanRelations,
    /// Index the nodes of retained ways.
    ScanWays,
    /// Build geometries and records for every element.
    FullParse,
    /// Retry relations deferred during the full parse.
    ResolveIncomplete,
    /// Clear the indices and report.
    Done,
}

impl Phase {
    /// Whether the phase only populates the reference index.
    #[must_use]
    pub const fn is_scan(self) -> bool {
        matches!(
            self,
            Self::ScanRelations | Self::RescanRelations | Self::ScanWays
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ScanRelations => "relation scan",
            Self::RescanRelations => "relation rescan",
            Self::ScanWays => "way scan",
            Self::FullParse => "full parse",
            Self::ResolveIncomplete => "incomplete relation retry",
            Self::Done => "done",
        })
    }
}

/// Tunables of a conversion job.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Records between two calls of [`RecordSink::progress`].
    pub progress_interval: NonZeroU64,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            progress_interval: NonZeroU64::new(DEFAULT_PROGRESS_INTERVAL)
                .unwrap_or(NonZeroU64::MIN),
        }
    }
}

/// Fatal failures of a conversion job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The element source failed.
    #[error("element source failed during {phase}")]
    Source {
        /// Phase in which the failure occurred.
        phase: Phase,
        /// Underlying source error.
        #[source]
        source: SourceError,
    },
    /// A reference index operation failed.
    #[error("reference index failed during {phase}")]
    Index {
        /// Phase in which the failure occurred.
        phase: Phase,
        /// Underlying index error.
        #[source]
        source: IndexError,
    },
    /// The record sink failed.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

fn in_phase(phase: Phase) -> impl Fn(IndexError) -> JobError {
    move |source| JobError::Index { phase, source }
}

struct MemberGeometries {
    resolved: Vec<Geometry<f64>>,
    missing: usize,
}

/// Drives one conversion job through every [`Phase`].
///
/// # Examples
///
/// ```
/// use geotable_core::{
///     AttributeColumns, ConversionOptions, Element, IndexSet, MemorySource, Node, Record,
///     RecordBuilder, ScanCoordinator, Tags, Unclassified,
/// };
///
/// # fn main() -> Result<(), geotable_core::JobError> {
/// let node = Node {
///     id: "1".into(),
///     lon: 4.0,
///     lat: 52.0,
///     tags: Tags::from([("name".to_owned(), "Dam".to_owned())]),
/// };
/// let mut source = MemorySource::new(vec![Element::Node(node)]);
/// let builder = RecordBuilder::new(Box::new(Unclassified), AttributeColumns::default());
/// let coordinator =
///     ScanCoordinator::new(IndexSet::in_memory(), builder, ConversionOptions::default());
/// let mut records: Vec<Record> = Vec::new();
/// let stats = coordinator.run(&mut source, &mut records)?;
/// assert_eq!(stats.records, 1);
/// assert_eq!(records[0].id, "n1");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ScanCoordinator {
    indices: IndexSet,
    builder: RecordBuilder,
    options: ConversionOptions,
    stats: JobStats,
}

impl ScanCoordinator {
    /// Create a coordinator owning `indices` for the duration of one job.
    #[must_use]
    pub fn new(indices: IndexSet, builder: RecordBuilder, options: ConversionOptions) -> Self {
        Self {
            indices,
            builder,
            options,
            stats: JobStats::default(),
        }
    }

    /// Run every phase against `source`, handing records to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError`] on the first fatal source, index or sink failure.
    pub fn run<S, K>(mut self, source: &mut S, sink: &mut K) -> Result<JobStats, JobError>
    where
        S: ElementSource + ?Sized,
        K: RecordSink + ?Sized,
    {
        info!(
            "Converting {} with {} indices",
            source.describe(),
            self.indices.strategy()
        );
        let mut queue = IncompleteRelationQueue::default();
        let mut phase = Phase::ScanRelations;
        loop {
            info!("Starting {phase}");
            phase = match phase {
                Phase::ScanRelations => {
                    if self.scan(phase, source)? {
                        Phase::RescanRelations
                    } else {
                        Phase::ScanWays
                    }
                }
                Phase::RescanRelations => {
                    self.scan(phase, source)?;
                    Phase::ScanWays
                }
                Phase::ScanWays => {
                    self.scan(phase, source)?;
                    self.stats.indexed = self.indices.sizes().map_err(in_phase(phase))?;
                    Phase::FullParse
                }
                Phase::FullParse => {
                    self.parse(source, sink, &mut queue)?;
                    Phase::ResolveIncomplete
                }
                Phase::ResolveIncomplete => {
                    self.resolve_incomplete(std::mem::take(&mut queue), sink)?;
                    Phase::Done
                }
                Phase::Done => break,
            };
        }
        self.indices.clear_all().map_err(in_phase(Phase::Done))?;
        sink.finish()?;
        let stats = self.stats;
        info!(
            "Converted {} of {} named entities ({} rejected) in {} traversals",
            stats.records, stats.named_entities, stats.rejected, stats.traversals
        );
        Ok(stats)
    }

    fn traverse<S, F>(&mut self, phase: Phase, source: &mut S, mut visit: F) -> Result<(), JobError>
    where
        S: ElementSource + ?Sized,
        F: FnMut(&mut Self, Element) -> Result<(), JobError>,
    {
        let stream = source
            .elements()
            .map_err(|source| JobError::Source { phase, source })?;
        for item in stream {
            let element = item.map_err(|source| JobError::Source { phase, source })?;
            visit(self, element)?;
        }
        self.stats.traversals += 1;
        Ok(())
    }

    fn scan<S>(&mut self, phase: Phase, source: &mut S) -> Result<bool, JobError>
    where
        S: ElementSource + ?Sized,
    {
        let mut buffer = ReferenceBuffer::default();
        let mut rescan = false;
        self.traverse(phase, source, |this, element| {
            rescan |= this
                .scan_element(phase, element, &mut buffer)
                .map_err(in_phase(phase))?;
            Ok(())
        })?;
        let sizes = self.indices.sizes().map_err(in_phase(phase))?;
        info!(
            "Finished {phase}: {} nodes, {} ways and {} relations indexed",
            sizes.nodes, sizes.ways, sizes.relations
        );
        Ok(rescan)
    }

    fn scan_element(
        &mut self,
        phase: Phase,
        element: Element,
        buffer: &mut ReferenceBuffer,
    ) -> Result<bool, IndexError> {
        match (phase, element) {
            (
                Phase::ScanRelations | Phase::RescanRelations,
                Element::Relation(Relation { id, members, tags }),
            ) => {
                for member in members {
                    buffer.push(member.id);
                }
                self.commit_if_kept(ElementKind::Relation, &id, &tags, buffer)
            }
            (Phase::ScanWays, Element::Way(Way { id, node_refs, tags })) => {
                for node_ref in node_refs {
                    buffer.push(ElementId::new(ElementKind::Node, node_ref));
                }
                self.commit_if_kept(ElementKind::Way, &id, &tags, buffer)
            }
            _ => Ok(false),
        }
    }

    fn commit_if_kept(
        &mut self,
        kind: ElementKind,
        id: &str,
        tags: &Tags,
        buffer: &mut ReferenceBuffer,
    ) -> Result<bool, IndexError> {
        let referenced = self.indices.index(kind).contains(id)?;
        if keep_references(referenced, tags, self.builder.classifier().filter_keys()) {
            buffer.commit(&mut self.indices)
        } else {
            buffer.discard();
            Ok(false)
        }
    }

    fn parse<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        queue: &mut IncompleteRelationQueue,
    ) -> Result<(), JobError>
    where
        S: ElementSource + ?Sized,
        K: RecordSink + ?Sized,
    {
        self.traverse(Phase::FullParse, source, |this, element| match element {
            Element::Node(node) => this.parse_node(node, sink),
            Element::Way(way) => this.parse_way(way, sink),
            Element::Relation(relation) => this.parse_relation(relation, sink, queue),
        })?;
        info!(
            "Finished {}: {} nodes, {} ways, {} relations, {} deferred",
            Phase::FullParse,
            self.stats.nodes,
            self.stats.ways,
            self.stats.relations,
            queue.len()
        );
        Ok(())
    }

    fn parse_node<K>(&mut self, node: Node, sink: &mut K) -> Result<(), JobError>
    where
        K: RecordSink + ?Sized,
    {
        self.stats.nodes += 1;
        let geometry = Geometry::Point(node.point());
        self.indices
            .index_mut(ElementKind::Node)
            .resolve(&node.id, &geometry)
            .map_err(in_phase(Phase::FullParse))?;
        self.emit(ElementKind::Node, &node.id, &node.tags, Some(&geometry), sink)
    }

    fn parse_way<K>(&mut self, way: Way, sink: &mut K) -> Result<(), JobError>
    where
        K: RecordSink + ?Sized,
    {
        self.stats.ways += 1;
        let referenced = self
            .indices
            .index(ElementKind::Way)
            .contains(&way.id)
            .map_err(in_phase(Phase::FullParse))?;
        if !referenced && name(&way.tags).is_none() {
            return Ok(());
        }
        let points = self.way_points(&way).map_err(in_phase(Phase::FullParse))?;
        let geometry = way_geometry(&points);
        match &geometry {
            Some(shape) => self
                .indices
                .index_mut(ElementKind::Way)
                .resolve(&way.id, shape)
                .map_err(in_phase(Phase::FullParse))?,
            None => debug!("Way {} has no resolvable node", way.id),
        }
        self.emit(ElementKind::Way, &way.id, &way.tags, geometry.as_ref(), sink)
    }

    fn way_points(&self, way: &Way) -> Result<Vec<Coord<f64>>, IndexError> {
        let nodes = self.indices.index(ElementKind::Node);
        let mut points = Vec::with_capacity(way.node_refs.len());
        for node_ref in &way.node_refs {
            match nodes.get(node_ref)?.as_ref().and_then(point_coord) {
                Some(coord) => points.push(coord),
                None => debug!("Skipped missing node {node_ref} of way {}", way.id),
            }
        }
        Ok(points)
    }

    fn parse_relation<K>(
        &mut self,
        relation: Relation,
        sink: &mut K,
        queue: &mut IncompleteRelationQueue,
    ) -> Result<(), JobError>
    where
        K: RecordSink + ?Sized,
    {
        self.stats.relations += 1;
        let phase = Phase::FullParse;
        let referenced = self
            .indices
            .index(ElementKind::Relation)
            .contains(&relation.id)
            .map_err(in_phase(phase))?;
        if !referenced && name(&relation.tags).is_none() {
            return Ok(());
        }
        let members = self.member_geometries(&relation).map_err(in_phase(phase))?;
        if members.missing > 0 {
            debug!(
                "Deferred relation {}: {} of {} members unresolved",
                relation.id,
                members.missing,
                relation.members.len()
            );
            self.stats.incomplete_relations += 1;
            queue.push(relation);
            return Ok(());
        }
        self.finish_relation(phase, &relation, aggregate(members.resolved), sink)
    }

    fn resolve_incomplete<K>(
        &mut self,
        queue: IncompleteRelationQueue,
        sink: &mut K,
    ) -> Result<(), JobError>
    where
        K: RecordSink + ?Sized,
    {
        let phase = Phase::ResolveIncomplete;
        if queue.is_empty() {
            return Ok(());
        }
        for relation in queue.drain() {
            let members = self.member_geometries(&relation).map_err(in_phase(phase))?;
            let missing = members.missing;
            let geometry = aggregate(members.resolved);
            if geometry.is_some() {
                self.stats.recovered_relations += 1;
                if missing > 0 {
                    debug!("Relation {} kept with {missing} unresolved members", relation.id);
                }
            } else {
                self.stats.dropped_relations += 1;
                debug!("Dropped relation {}: no member could be resolved", relation.id);
            }
            self.finish_relation(phase, &relation, geometry, sink)?;
        }
        info!(
            "Finished {phase}: {} relations recovered, {} dropped",
            self.stats.recovered_relations, self.stats.dropped_relations
        );
        Ok(())
    }

    fn member_geometries(&self, relation: &Relation) -> Result<MemberGeometries, IndexError> {
        let mut resolved = Vec::with_capacity(relation.members.len());
        let mut missing = 0;
        for member in &relation.members {
            match self.indices.index(member.id.kind()).get(member.id.raw())? {
                Some(geometry) => resolved.push(geometry),
                None => missing += 1,
            }
        }
        Ok(MemberGeometries { resolved, missing })
    }

    fn finish_relation<K>(
        &mut self,
        phase: Phase,
        relation: &Relation,
        geometry: Option<Geometry<f64>>,
        sink: &mut K,
    ) -> Result<(), JobError>
    where
        K: RecordSink + ?Sized,
    {
        if let Some(shape) = &geometry {
            self.indices
                .index_mut(ElementKind::Relation)
                .resolve(&relation.id, shape)
                .map_err(in_phase(phase))?;
        }
        self.emit(
            ElementKind::Relation,
            &relation.id,
            &relation.tags,
            geometry.as_ref(),
            sink,
        )
    }

    fn emit<K>(
        &mut self,
        kind: ElementKind,
        raw_id: &str,
        tags: &Tags,
        geometry: Option<&Geometry<f64>>,
        sink: &mut K,
    ) -> Result<(), JobError>
    where
        K: RecordSink + ?Sized,
    {
        if name(tags).is_none() {
            return Ok(());
        }
        self.stats.named_entities += 1;
        let id = ElementId::new(kind, raw_id);
        match (self.builder.build(&id, tags, geometry), geometry) {
            (Ok(record), Some(shape)) => {
                sink.accept(record)?;
                self.stats.record_output(shape);
                if self
                    .stats
                    .records
                    .is_multiple_of(self.options.progress_interval.get())
                {
                    sink.progress(self.stats.records);
                }
            }
            (Ok(_), None) => self.stats.record_rejection(),
            (Err(rejection), _) => {
                self.stats.record_rejection();
                debug!("Rejected {id}: {rejection}");
            }
        }
        Ok(())
    }
}
