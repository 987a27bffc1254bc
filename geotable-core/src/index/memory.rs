//! Hash map backed reference index.

use std::collections::HashMap;

use geo::Geometry;

use super::{IndexError, ReferenceIndex};

/// In-memory [`ReferenceIndex`].
///
/// Every operation is infallible; the `Result` signatures exist to share the
/// trait with the disk strategy.
#[derive(Debug, Default, Clone)]
pub struct MemoryIndex {
    entries: HashMap<String, Option<Geometry<f64>>>,
}

impl ReferenceIndex for MemoryIndex {
    fn register(&mut self, id: &str) -> Result<(), IndexError> {
        if !self.entries.contains_key(id) {
            self.entries.insert(id.to_owned(), None);
        }
        Ok(())
    }

    fn contains(&self, id: &str) -> Result<bool, IndexError> {
        Ok(self.entries.contains_key(id))
    }

    fn resolve(&mut self, id: &str, geometry: &Geometry<f64>) -> Result<(), IndexError> {
        if let Some(slot) = self.entries.get_mut(id) {
            *slot = Some(geometry.clone());
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Geometry<f64>>, IndexError> {
        Ok(self.entries.get(id).cloned().flatten())
    }

    fn len(&self) -> Result<u64, IndexError> {
        Ok(self.entries.len() as u64)
    }

    fn clear(&mut self) -> Result<(), IndexError> {
        self.entries.clear();
        Ok(())
    }
}
