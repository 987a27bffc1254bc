//! Per-element reference buffering for the scan phases.

use std::collections::BTreeSet;

use crate::element::{ElementId, ElementKind, Tags};
use crate::index::{IndexError, IndexSet};

/// Decide whether the references of an element are indexed.
///
/// References are kept when the element itself is referenced, when no tag
/// filter is active, or when one of its tag keys is part of the filter.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use geotable_core::{Tags, keep_references};
///
/// let filter = BTreeSet::from(["amenity".to_owned()]);
/// let tags = Tags::from([("highway".to_owned(), "primary".to_owned())]);
/// assert!(!keep_references(false, &tags, Some(&filter)));
/// assert!(keep_references(true, &tags, Some(&filter)));
/// assert!(keep_references(false, &tags, None));
/// ```
#[must_use]
pub fn keep_references(referenced: bool, tags: &Tags, filter: Option<&BTreeSet<String>>) -> bool {
    referenced || filter.is_none_or(|keys| tags.keys().any(|key| keys.contains(key)))
}

/// References collected while one element is scanned.
///
/// The buffer is emptied by [`Self::commit`] or [`Self::discard`] before the
/// next element is scanned.
#[derive(Debug, Default)]
pub(crate) struct ReferenceBuffer {
    pending: Vec<ElementId>,
}

impl ReferenceBuffer {
    pub(crate) fn push(&mut self, id: ElementId) {
        self.pending.push(id);
    }

    /// Register every buffered reference in the index of its kind.
    ///
    /// Returns whether any buffered reference was a relation.
    pub(crate) fn commit(&mut self, indices: &mut IndexSet) -> Result<bool, IndexError> {
        let mut saw_relation = false;
        for id in self.pending.drain(..) {
            saw_relation |= id.kind() == ElementKind::Relation;
            indices.index_mut(id.kind()).register(id.raw())?;
        }
        Ok(saw_relation)
    }

    pub(crate) fn discard(&mut self) {
        self.pending.clear();
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
