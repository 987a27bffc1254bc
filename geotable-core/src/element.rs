//! Decoded OpenStreetMap elements.
//!
//! Elements are transient: a source produces them once per traversal and the
//! coordinator drops them after dispatch. Only resolved geometries outlive an
//! element, inside the reference index.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use geo::{Coord, Point};
use log::warn;
use thiserror::Error;

/// Tag key carrying the display name of an entity.
pub const NAME_TAG: &str = "name";

/// Tag map attached to every element. Keys are unique; order is irrelevant.
pub type Tags = BTreeMap<String, String>;

/// The three OpenStreetMap element kinds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ElementKind {
    /// A point with coordinates.
    Node,
    /// An ordered list of node references.
    Way,
    /// An ordered list of typed members.
    Relation,
}

impl ElementKind {
    /// All kinds in dependency order.
    pub const ALL: [Self; 3] = [Self::Node, Self::Way, Self::Relation];

    /// Single-letter prefix used in output record identifiers.
    #[must_use]
    pub const fn prefix(self) -> char {
        match self {
            Self::Node => 'n',
            Self::Way => 'w',
            Self::Relation => 'r',
        }
    }

    /// Lowercase name as it appears in OSM XML member types.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a member type string names no known element kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown element kind `{0}`")]
pub struct UnknownElementKind(pub String);

impl FromStr for ElementKind {
    type Err = UnknownElementKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "node" => Ok(Self::Node),
            "way" => Ok(Self::Way),
            "relation" => Ok(Self::Relation),
            other => Err(UnknownElementKind(other.to_owned())),
        }
    }
}

/// Identifier of an element: its kind plus the opaque identifier from the
/// input. Unique per kind within one dataset.
///
/// # Examples
///
/// ```
/// use geotable_core::{ElementId, ElementKind};
///
/// let id = ElementId::new(ElementKind::Way, "42");
/// assert_eq!(id.to_string(), "w42");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId {
    kind: ElementKind,
    raw: String,
}

impl ElementId {
    /// Create an identifier for `kind` from the raw input identifier.
    pub fn new(kind: ElementKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
        }
    }

    /// Kind of the referenced element.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Raw identifier as it appeared in the input.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.raw)
    }
}

/// A decoded node.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// Raw identifier.
    pub id: String,
    /// WGS84 longitude in degrees.
    pub lon: f64,
    /// WGS84 latitude in degrees.
    pub lat: f64,
    /// Tags attached to the node.
    pub tags: Tags,
}

impl Node {
    /// Typed identifier of this node.
    #[must_use]
    pub fn element_id(&self) -> ElementId {
        ElementId::new(ElementKind::Node, self.id.as_str())
    }

    /// Point geometry with `x = lon`, `y = lat`.
    #[must_use]
    pub const fn point(&self) -> Point<f64> {
        Point(Coord {
            x: self.lon,
            y: self.lat,
        })
    }
}

/// A decoded way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Way {
    /// Raw identifier.
    pub id: String,
    /// Referenced node identifiers in input order.
    pub node_refs: Vec<String>,
    /// Tags attached to the way.
    pub tags: Tags,
}

impl Way {
    /// Typed identifier of this way.
    #[must_use]
    pub fn element_id(&self) -> ElementId {
        ElementId::new(ElementKind::Way, self.id.as_str())
    }
}

/// A relation member: the referenced element and its role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    /// Referenced element.
    pub id: ElementId,
    /// Role label; empty when the input has none.
    pub role: String,
}

/// A decoded relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    /// Raw identifier.
    pub id: String,
    /// Members in input order.
    pub members: Vec<Member>,
    /// Tags attached to the relation.
    pub tags: Tags,
}

impl Relation {
    /// Typed identifier of this relation.
    #[must_use]
    pub fn element_id(&self) -> ElementId {
        ElementId::new(ElementKind::Relation, self.id.as_str())
    }
}

/// One event of an element stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    /// A node event.
    Node(Node),
    /// A way event.
    Way(Way),
    /// A relation event.
    Relation(Relation),
}

impl Element {
    /// Typed identifier of the wrapped element.
    #[must_use]
    pub fn id(&self) -> ElementId {
        match self {
            Self::Node(node) => node.element_id(),
            Self::Way(way) => way.element_id(),
            Self::Relation(relation) => relation.element_id(),
        }
    }

    /// Tags of the wrapped element.
    #[must_use]
    pub const fn tags(&self) -> &Tags {
        match self {
            Self::Node(node) => &node.tags,
            Self::Way(way) => &way.tags,
            Self::Relation(relation) => &relation.tags,
        }
    }
}

/// Return the value of the `name` tag, if present.
#[must_use]
pub fn name(tags: &Tags) -> Option<&str> {
    tags.get(NAME_TAG).map(String::as_str)
}

/// Collect borrowed key/value pairs into an owned tag map.
pub fn collect_tags<'a, T>(tags: T) -> Tags
where
    T: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

/// Validate a WGS84 coordinate pair, returning it as a [`Coord`].
///
/// Out-of-range or non-finite values are rejected so decoders can skip the
/// node instead of poisoning downstream geometry.
#[must_use]
pub fn validated_coord(lon: f64, lat: f64) -> Option<Coord<f64>> {
    (lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat))
    .then_some(Coord { x: lon, y: lat })
}

/// Parse a member type attribute, logging and returning `None` for unknown
/// kinds.
#[must_use]
pub fn member_kind(relation_id: &str, value: &str) -> Option<ElementKind> {
    match value.parse() {
        Ok(kind) => Some(kind),
        Err(err) => {
            warn!("Skipped member of relation {relation_id}: {err}");
            None
        }
    }
}
