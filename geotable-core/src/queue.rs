//! Relations whose members were not all resolved during the full parse.

use std::collections::VecDeque;

use crate::element::Relation;

/// FIFO of relations awaiting the single retry after the full parse.
///
/// Draining consumes the queue, so a relation can be retried at most once.
#[derive(Debug, Default)]
pub struct IncompleteRelationQueue {
    pending: VecDeque<Relation>,
}

impl IncompleteRelationQueue {
    /// Defer `relation` until the retry.
    pub fn push(&mut self, relation: Relation) {
        self.pending.push_back(relation);
    }

    /// Number of deferred relations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no relation is deferred.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Consume the queue, yielding relations in the order they were pushed.
    pub fn drain(self) -> impl Iterator<Item = Relation> {
        self.pending.into_iter()
    }
}
