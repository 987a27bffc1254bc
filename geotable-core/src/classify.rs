//! Category lookup seam.
//!
//! A [`Classifier`] maps an element's tags to a category path and exposes the
//! tag keys it can match on. The coordinator uses those keys as the active tag
//! filter when deciding which references to index.

use std::collections::BTreeSet;

use crate::element::Tags;

/// Separator joining the segments below the top-level category.
pub const SUBCATEGORY_SEPARATOR: &str = "_";

/// Path from a root category down to the matched category.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryPath(Vec<String>);

impl CategoryPath {
    /// Create a path from root-first segments.
    #[must_use]
    pub const fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Root-first segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether the path has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The top-level category, or an empty string for an empty path.
    #[must_use]
    pub fn category(&self) -> &str {
        self.0.first().map_or("", String::as_str)
    }

    /// The remaining segments joined with [`SUBCATEGORY_SEPARATOR`].
    ///
    /// ```
    /// use geotable_core::CategoryPath;
    ///
    /// let path = CategoryPath::new(vec!["Leisure".into(), "Parks".into(), "City".into()]);
    /// assert_eq!(path.category(), "Leisure");
    /// assert_eq!(path.subcategory(), "Parks_City");
    /// ```
    #[must_use]
    pub fn subcategory(&self) -> String {
        self.0.get(1..).unwrap_or_default().join(SUBCATEGORY_SEPARATOR)
    }
}

impl<S: Into<String>> FromIterator<S> for CategoryPath {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Maps tags to a category path.
pub trait Classifier {
    /// Category path of the first matching category, or `None` when the
    /// element belongs to no category.
    fn lookup(&self, tags: &Tags) -> Option<CategoryPath>;

    /// Tag keys the classifier matches on, or `None` when every element is
    /// of interest.
    fn filter_keys(&self) -> Option<&BTreeSet<String>>;
}

/// Classifier used when no scheme is configured: no tag filter is active and
/// every element receives an empty category path.
#[derive(Copy, Clone, Debug, Default)]
pub struct Unclassified;

impl Classifier for Unclassified {
    fn lookup(&self, _tags: &Tags) -> Option<CategoryPath> {
        Some(CategoryPath::default())
    }

    fn filter_keys(&self) -> Option<&BTreeSet<String>> {
        None
    }
}
