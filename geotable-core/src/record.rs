//! Output records and attribute column mapping.

use crate::element::Tags;

/// EPSG code of WGS84, the only supported output reference system.
pub const WGS84_SRID: u32 = 4326;

/// Separator used when several tags feed one attribute column.
pub const ATTRIBUTE_VALUE_SEPARATOR: &str = ";";

/// One row of the output table.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    /// Element id in display form, for example `w42`.
    pub id: String,
    /// Value of the `name` tag.
    pub name: String,
    /// Top-level category.
    pub category: String,
    /// Lower category levels joined with `_`.
    pub subcategory: String,
    /// Centroid longitude.
    pub lon: f64,
    /// Centroid latitude.
    pub lat: f64,
    /// EPSG code of the coordinates.
    pub srid: u32,
    /// Geometry as well-known text.
    pub wkt: String,
    /// Values of the configured attribute columns, in column order.
    pub attributes: Vec<String>,
    /// Tags not consumed by the name or an attribute column.
    pub other_tags: Tags,
}

/// One extra output column fed by a list of tag keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeColumn {
    /// Column header.
    pub column: String,
    /// Tag keys whose values populate the column, in priority order.
    pub tags: Vec<String>,
}

/// Ordered attribute columns appended to every record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeColumns(Vec<AttributeColumn>);

impl AttributeColumns {
    /// Wrap `columns` in output order.
    #[must_use]
    pub const fn new(columns: Vec<AttributeColumn>) -> Self {
        Self(columns)
    }

    /// Column headers in output order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|column| column.column.as_str())
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no column is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Move the mapped tag values out of `tags` into one value per column.
    ///
    /// A key listed by several columns is consumed by the first of them.
    ///
    /// ```
    /// use geotable_core::{AttributeColumn, AttributeColumns, Tags};
    ///
    /// let columns = AttributeColumns::new(vec![AttributeColumn {
    ///     column: "PHONE".into(),
    ///     tags: vec!["phone".into(), "contact:phone".into()],
    /// }]);
    /// let mut tags = Tags::from([
    ///     ("phone".to_owned(), "1".to_owned()),
    ///     ("contact:phone".to_owned(), "2".to_owned()),
    ///     ("shop".to_owned(), "bakery".to_owned()),
    /// ]);
    /// assert_eq!(columns.extract(&mut tags), vec!["1;2".to_owned()]);
    /// assert_eq!(tags.len(), 1);
    /// ```
    #[must_use]
    pub fn extract(&self, tags: &mut Tags) -> Vec<String> {
        self.0
            .iter()
            .map(|column| {
                column
                    .tags
                    .iter()
                    .filter_map(|key| tags.remove(key))
                    .filter(|value| !value.is_empty())
                    .collect::<Vec<_>>()
                    .join(ATTRIBUTE_VALUE_SEPARATOR)
            })
            .collect()
    }
}

impl From<Vec<AttributeColumn>> for AttributeColumns {
    fn from(columns: Vec<AttributeColumn>) -> Self {
        Self::new(columns)
    }
}
