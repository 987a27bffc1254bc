//! Conversion of a resolved element into an output [`Record`].

use std::fmt;

use geo::{Centroid, Geometry};
use wkt::ToWkt;

use crate::classify::Classifier;
use crate::element::{ElementId, NAME_TAG, Tags, name};
use crate::record::{AttributeColumns, Record, WGS84_SRID};

/// Reason an element produced no record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// The element carries no `name` tag. Not counted as a rejection.
    Unnamed,
    /// The element has no usable geometry.
    NoGeometry,
    /// The classifier found no category for the element's tags.
    Uncategorized,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unnamed => "no name tag",
            Self::NoGeometry => "no geometry",
            Self::Uncategorized => "no matching category",
        })
    }
}

/// Builds records from named elements.
pub struct RecordBuilder {
    classifier: Box<dyn Classifier>,
    columns: AttributeColumns,
}

impl RecordBuilder {
    /// Create a builder classifying with `classifier` and emitting `columns`.
    pub fn new(classifier: Box<dyn Classifier>, columns: AttributeColumns) -> Self {
        Self {
            classifier,
            columns,
        }
    }

    /// Classifier used for category lookup and the tag filter.
    #[must_use]
    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    /// Attribute columns appended to each record.
    #[must_use]
    pub const fn columns(&self) -> &AttributeColumns {
        &self.columns
    }

    /// Build the record for element `id`.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] explaining why no record exists: a missing
    /// name is checked first, then the geometry, then the category.
    pub fn build(
        &self,
        id: &ElementId,
        tags: &Tags,
        geometry: Option<&Geometry<f64>>,
    ) -> Result<Record, Rejection> {
        let name = name(tags).ok_or(Rejection::Unnamed)?;
        let geometry = geometry.ok_or(Rejection::NoGeometry)?;
        let centroid = geometry.centroid().ok_or(Rejection::NoGeometry)?;
        let path = self
            .classifier
            .lookup(tags)
            .ok_or(Rejection::Uncategorized)?;

        let mut other_tags = tags.clone();
        other_tags.remove(NAME_TAG);
        let attributes = self.columns.extract(&mut other_tags);

        Ok(Record {
            id: id.to_string(),
            name: name.to_owned(),
            category: path.category().to_owned(),
            subcategory: path.subcategory(),
            lon: centroid.x(),
            lat: centroid.y(),
            srid: WGS84_SRID,
            wkt: geometry.wkt_string(),
            attributes,
            other_tags,
        })
    }
}

impl fmt::Debug for RecordBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordBuilder")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}
