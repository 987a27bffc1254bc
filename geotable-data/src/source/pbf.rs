//! OSM PBF decoder built on `osmpbf`.
//!
//! Blobs are read sequentially and decoded one primitive block at a time; the
//! elements of the current block are buffered until the coordinator has
//! consumed them.

use std::collections::VecDeque;
use std::io::{BufReader, Read};

use camino::{Utf8Path, Utf8PathBuf};
use geotable_core::element::{collect_tags, validated_coord};
use geotable_core::{
    Element, ElementId, ElementKind, ElementSource, ElementStream, Member, Node, Relation,
    SourceError, Way,
};
use log::{debug, warn};
use osmpbf::{BlobDecode, BlobReader, PrimitiveBlock, RelMemberType};

use super::{InputFormat, decode_error, open_error};

/// OSM PBF file decoded afresh on every traversal.
#[derive(Clone, Debug)]
pub struct PbfSource {
    path: Utf8PathBuf,
}

impl PbfSource {
    /// Source reading the PBF file at `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl ElementSource for PbfSource {
    fn elements(&mut self) -> Result<ElementStream<'_>, SourceError> {
        let file = geotable_fs::open_utf8_file(&self.path)
            .map_err(|source| open_error(&self.path, source))?;
        Ok(Box::new(PbfElements {
            blobs: BlobReader::new(BufReader::new(file)),
            buffered: VecDeque::new(),
            path: self.path.clone(),
            blocks: 0,
            finished: false,
        }))
    }

    fn describe(&self) -> String {
        format!("{} file {}", InputFormat::Pbf, self.path)
    }
}

struct PbfElements<R: Read + Send> {
    blobs: BlobReader<R>,
    buffered: VecDeque<Element>,
    path: Utf8PathBuf,
    /// Blobs read so far; reported as the offset of decode failures.
    blocks: u64,
    finished: bool,
}

impl<R: Read + Send> Iterator for PbfElements<R> {
    type Item = Result<Element, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(element) = self.buffered.pop_front() {
                return Some(Ok(element));
            }
            if self.finished {
                return None;
            }
            let Some(blob) = self.blobs.next() else {
                self.finished = true;
                return None;
            };
            let decoded = blob.and_then(|blob| match blob.decode()? {
                BlobDecode::OsmData(block) => Ok(Some(buffer_block(&block))),
                BlobDecode::OsmHeader(_) => Ok(None),
                BlobDecode::Unknown(kind) => {
                    debug!("Skipped blob of unknown type {kind}");
                    Ok(None)
                }
            });
            match decoded {
                Ok(Some(elements)) => self.buffered = elements,
                Ok(None) => {}
                Err(err) => {
                    self.finished = true;
                    return Some(Err(decode_error(&self.path, self.blocks, err)));
                }
            }
            self.blocks = self.blocks.saturating_add(1);
        }
    }
}

fn buffer_block(block: &PrimitiveBlock) -> VecDeque<Element> {
    block
        .elements()
        .filter_map(|element| match element {
            osmpbf::Element::Node(node) => {
                convert_node(node.id(), node.lon(), node.lat(), collect_tags(node.tags()))
            }
            osmpbf::Element::DenseNode(node) => {
                convert_node(node.id(), node.lon(), node.lat(), collect_tags(node.tags()))
            }
            osmpbf::Element::Way(way) => Some(Element::Way(Way {
                id: way.id().to_string(),
                node_refs: way.refs().map(|node_ref| node_ref.to_string()).collect(),
                tags: collect_tags(way.tags()),
            })),
            osmpbf::Element::Relation(relation) => Some(convert_relation(&relation)),
        })
        .collect()
}

fn convert_node(id: i64, lon: f64, lat: f64, tags: geotable_core::Tags) -> Option<Element> {
    if validated_coord(lon, lat).is_none() {
        warn!("Skipped node {id}: invalid coordinate ({lon}, {lat})");
        return None;
    }
    Some(Element::Node(Node {
        id: id.to_string(),
        lon,
        lat,
        tags,
    }))
}

fn convert_relation(relation: &osmpbf::Relation<'_>) -> Element {
    let id = relation.id().to_string();
    let members = relation
        .members()
        .map(|member| {
            let role = member.role().map_or_else(
                |err| {
                    warn!("Ignored unreadable member role in relation {id}: {err}");
                    String::new()
                },
                str::to_owned,
            );
            Member {
                id: ElementId::new(member_kind(member.member_type), member.member_id.to_string()),
                role,
            }
        })
        .collect();
    Element::Relation(Relation {
        tags: collect_tags(relation.tags()),
        id,
        members,
    })
}

const fn member_kind(member_type: RelMemberType) -> ElementKind {
    match member_type {
        RelMemberType::Node => ElementKind::Node,
        RelMemberType::Way => ElementKind::Way,
        RelMemberType::Relation => ElementKind::Relation,
    }
}
