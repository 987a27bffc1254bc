//! Streaming OSM XML decoder built on `quick-xml`.

use std::borrow::Cow;
use std::io::{BufRead, BufReader};

use bzip2::read::MultiBzDecoder;
use camino::{Utf8Path, Utf8PathBuf};
use geotable_core::element::{member_kind, validated_coord};
use geotable_core::{
    Element, ElementId, ElementSource, ElementStream, Member, Node, Relation, SourceError, Tags,
    Way,
};
use log::warn;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{InputFormat, decode_error, open_error};

/// OSM XML file, optionally bzip2-compressed, decoded afresh on every
/// traversal.
#[derive(Clone, Debug)]
pub struct XmlSource {
    path: Utf8PathBuf,
    compressed: bool,
}

impl XmlSource {
    /// Plain XML source at `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            compressed: false,
        }
    }

    /// Bzip2-compressed XML source at `path`. Multi-stream archives are
    /// decoded as one document.
    #[must_use]
    pub fn bzip2(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            compressed: true,
        }
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    const fn format(&self) -> InputFormat {
        if self.compressed {
            InputFormat::XmlBzip2
        } else {
            InputFormat::Xml
        }
    }
}

impl ElementSource for XmlSource {
    fn elements(&mut self) -> Result<ElementStream<'_>, SourceError> {
        let file = geotable_fs::open_utf8_file(&self.path)
            .map_err(|source| open_error(&self.path, source))?;
        let input: Box<dyn BufRead> = if self.compressed {
            Box::new(BufReader::new(MultiBzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Box::new(XmlElements::new(input, self.path.clone())))
    }

    fn describe(&self) -> String {
        format!("{} file {}", self.format(), self.path)
    }
}

/// Element under construction between its start and end tags.
enum Pending {
    Node(Node),
    Way(Way),
    Relation(Relation),
    /// A malformed element whose children are ignored.
    Skipped,
}

impl Pending {
    fn finish(self) -> Option<Element> {
        match self {
            Self::Node(node) => Some(Element::Node(node)),
            Self::Way(way) => Some(Element::Way(way)),
            Self::Relation(relation) => Some(Element::Relation(relation)),
            Self::Skipped => None,
        }
    }

    fn tags_mut(&mut self) -> Option<&mut Tags> {
        match self {
            Self::Node(node) => Some(&mut node.tags),
            Self::Way(way) => Some(&mut way.tags),
            Self::Relation(relation) => Some(&mut relation.tags),
            Self::Skipped => None,
        }
    }
}

struct XmlElements<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    path: Utf8PathBuf,
    pending: Option<Pending>,
    finished: bool,
}

impl<R: BufRead> XmlElements<R> {
    fn new(input: R, path: Utf8PathBuf) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            path,
            pending: None,
            finished: false,
        }
    }
}

impl<R: BufRead> Iterator for XmlElements<R> {
    type Item = Result<Element, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(err) => {
                    self.finished = true;
                    let offset = u64::try_from(self.reader.buffer_position()).unwrap_or(u64::MAX);
                    return Some(Err(decode_error(&self.path, offset, err)));
                }
            };
            let complete = match event {
                Event::Start(start) => {
                    match begin(&start) {
                        Some(pending) => self.pending = Some(pending),
                        None => attach_child(self.pending.as_mut(), &start),
                    }
                    None
                }
                Event::Empty(start) => match begin(&start) {
                    Some(pending) => pending.finish(),
                    None => {
                        attach_child(self.pending.as_mut(), &start);
                        None
                    }
                },
                Event::End(end) if is_element(end.name().as_ref()) => {
                    self.pending.take().and_then(Pending::finish)
                }
                Event::Eof => {
                    self.finished = true;
                    None
                }
                _ => None,
            };
            if let Some(element) = complete {
                return Some(Ok(element));
            }
        }
        None
    }
}

fn is_element(name: &[u8]) -> bool {
    matches!(name, b"node" | b"way" | b"relation")
}

fn owned_attribute(start: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(Cow::into_owned))
}

/// Start a node, way or relation; `None` for any other tag.
fn begin(start: &BytesStart<'_>) -> Option<Pending> {
    let name = start.name();
    let tag = name.as_ref();
    if !is_element(tag) {
        return None;
    }
    let Some(id) = owned_attribute(start, b"id") else {
        warn!("Skipped {} without an id", String::from_utf8_lossy(tag));
        return Some(Pending::Skipped);
    };
    let pending = match tag {
        b"node" => begin_node(start, id),
        b"way" => Pending::Way(Way {
            id,
            node_refs: Vec::new(),
            tags: Tags::new(),
        }),
        _ => Pending::Relation(Relation {
            id,
            members: Vec::new(),
            tags: Tags::new(),
        }),
    };
    Some(pending)
}

fn begin_node(start: &BytesStart<'_>, id: String) -> Pending {
    let parse = |key: &[u8]| {
        owned_attribute(start, key).and_then(|value| value.trim().parse::<f64>().ok())
    };
    match (parse(b"lon"), parse(b"lat")) {
        (Some(lon), Some(lat)) if validated_coord(lon, lat).is_some() => Pending::Node(Node {
            id,
            lon,
            lat,
            tags: Tags::new(),
        }),
        _ => {
            warn!("Skipped node {id}: missing or invalid coordinate");
            Pending::Skipped
        }
    }
}

/// Attach an `nd`, `member` or `tag` child to the element being built.
fn attach_child(pending: Option<&mut Pending>, start: &BytesStart<'_>) {
    let Some(pending) = pending else {
        return;
    };
    match (start.name().as_ref(), pending) {
        (b"tag", pending) => {
            let Some(tags) = pending.tags_mut() else {
                return;
            };
            match owned_attribute(start, b"k") {
                Some(key) => {
                    let value = owned_attribute(start, b"v").unwrap_or_default();
                    tags.insert(key, value);
                }
                None => warn!("Skipped tag without a key"),
            }
        }
        (b"nd", Pending::Way(way)) => match owned_attribute(start, b"ref") {
            Some(node_ref) => way.node_refs.push(node_ref),
            None => warn!("Skipped node reference without ref in way {}", way.id),
        },
        (b"member", Pending::Relation(relation)) => {
            let Some(raw) = owned_attribute(start, b"ref") else {
                warn!("Skipped member without ref in relation {}", relation.id);
                return;
            };
            let kind_value = owned_attribute(start, b"type").unwrap_or_default();
            if let Some(kind) = member_kind(&relation.id, &kind_value) {
                relation.members.push(Member {
                    id: ElementId::new(kind, raw),
                    role: owned_attribute(start, b"role").unwrap_or_default(),
                });
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use bzip2::Compression;
    use bzip2::write::BzEncoder;
    use geo::Point;
    use geotable_core::ElementKind;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <bounds minlat="0" minlon="0" maxlat="1" maxlon="1"/>
  <node id="1" lat="41.9" lon="12.5">
    <tag k="name" v="Caf&#233; &amp; Bar"/>
    <tag k="amenity" v="cafe"/>
  </node>
  <node id="2" lat="41.8" lon="12.4"/>
  <node id="3" lat="north" lon="12.4"/>
  <node lat="1" lon="1"/>
  <way id="10">
    <nd ref="1"/>
    <nd ref="2"/>
    <nd/>
    <tag k="highway" v="path"/>
  </way>
  <relation id="20">
    <member type="way" ref="10" role="outer"/>
    <member type="area" ref="11" role=""/>
    <member type="node" ref="2"/>
    <tag k="type" v="route"/>
  </relation>
</osm>
"#;

    struct Scratch {
        _dir: TempDir,
        root: Utf8PathBuf,
    }

    #[fixture]
    fn scratch() -> Scratch {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        Scratch { _dir: dir, root }
    }

    fn collect(source: &mut XmlSource) -> Vec<Element> {
        source
            .elements()
            .expect("open stream")
            .collect::<Result<Vec<_>, _>>()
            .expect("decode stream")
    }

    #[rstest]
    fn decodes_elements_in_file_order(scratch: Scratch) {
        let path = scratch.root.join("sample.osm");
        std::fs::write(&path, DOCUMENT).expect("write fixture");
        let elements = collect(&mut XmlSource::new(path));

        let ids: Vec<String> = elements.iter().map(|element| element.id().to_string()).collect();
        assert_eq!(ids, vec!["n1", "n2", "w10", "r20"]);

        let Some(Element::Node(cafe)) = elements.first() else {
            panic!("expected node first");
        };
        assert_eq!(cafe.tags.get("name").map(String::as_str), Some("Café & Bar"));
        assert_eq!(cafe.point(), Point::new(12.5, 41.9));

        let Some(Element::Way(way)) = elements.get(2) else {
            panic!("expected way third");
        };
        assert_eq!(way.node_refs, vec!["1".to_owned(), "2".to_owned()]);

        let Some(Element::Relation(relation)) = elements.get(3) else {
            panic!("expected relation last");
        };
        let members: Vec<(ElementKind, &str, &str)> = relation
            .members
            .iter()
            .map(|member| (member.id.kind(), member.id.raw(), member.role.as_str()))
            .collect();
        assert_eq!(
            members,
            vec![(ElementKind::Way, "10", "outer"), (ElementKind::Node, "2", "")]
        );
    }

    #[rstest]
    fn every_traversal_restarts_from_the_top(scratch: Scratch) {
        let path = scratch.root.join("sample.xml");
        std::fs::write(&path, DOCUMENT).expect("write fixture");
        let mut source = XmlSource::new(path);
        assert_eq!(collect(&mut source), collect(&mut source));
    }

    #[rstest]
    fn decodes_bzip2_archives(scratch: Scratch) {
        let path = scratch.root.join("sample.osm.bz2");
        let mut encoder = BzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(DOCUMENT.as_bytes()).expect("compress");
        std::fs::write(&path, encoder.finish().expect("finish archive")).expect("write fixture");

        let plain_path = scratch.root.join("sample.osm");
        std::fs::write(&plain_path, DOCUMENT).expect("write fixture");

        assert_eq!(
            collect(&mut XmlSource::bzip2(path)),
            collect(&mut XmlSource::new(plain_path))
        );
    }

    #[rstest]
    fn malformed_documents_fail_the_traversal(scratch: Scratch) {
        let path = scratch.root.join("broken.osm");
        std::fs::write(&path, "<osm><node id=\"1\" lat=\"1\" lon=\"1\"></way></osm>")
            .expect("write fixture");
        let mut source = XmlSource::new(path);
        let results: Vec<_> = source.elements().expect("open stream").collect();
        assert!(matches!(
            results.last(),
            Some(Err(SourceError::Decode { .. }))
        ));
    }

    #[rstest]
    fn missing_files_fail_to_open(scratch: Scratch) {
        let mut source = XmlSource::new(scratch.root.join("absent.osm"));
        assert!(matches!(source.elements().err(), Some(SourceError::Open { .. })));
        assert!(source.describe().contains("absent.osm"));
    }
}
