//! Selective reference index.
//!
//! Responsibilities:
//! - remember which element ids are referenced by retained elements;
//! - store the geometry of referenced elements once it is resolved;
//! - group one index per element kind for the lifetime of a job.
//!
//! Invariants:
//! - an entry is never removed except by [`ReferenceIndex::clear`];
//! - registering an id twice never downgrades a resolved geometry;
//! - resolving an unregistered id is a no-op.
//!
//! Both strategies honour the same contract, so switching between them only
//! trades memory for disk I/O.

use std::fmt;
#[cfg(feature = "store-sqlite")]
use std::path::PathBuf;

use geo::Geometry;
use thiserror::Error;

use crate::element::ElementKind;

mod memory;
#[cfg(feature = "store-sqlite")]
mod sqlite;

pub use memory::MemoryIndex;
#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteIndex;

/// Store mapping element ids of one kind to an optional resolved geometry.
pub trait ReferenceIndex {
    /// Mark `id` as referenced. No-op when already present.
    fn register(&mut self, id: &str) -> Result<(), IndexError>;

    /// Return whether `id` has been registered.
    fn contains(&self, id: &str) -> Result<bool, IndexError>;

    /// Store `geometry` for `id` if it is registered; otherwise do nothing.
    fn resolve(&mut self, id: &str, geometry: &Geometry<f64>) -> Result<(), IndexError>;

    /// Return the resolved geometry of `id`, if any.
    fn get(&self, id: &str) -> Result<Option<Geometry<f64>>, IndexError>;

    /// Number of registered ids.
    fn len(&self) -> Result<u64, IndexError>;

    /// Return whether no id has been registered.
    fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }

    /// Remove every entry.
    fn clear(&mut self) -> Result<(), IndexError>;
}

/// Errors raised by reference index operations. All of them abort the job.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Creating the scratch directory for disk indices failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to create index scratch directory in {path:?}")]
    CreateDirectory {
        /// Directory in which the scratch subdirectory was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening or initialising a disk index failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to open {kind} index at {path:?}")]
    Open {
        /// Element kind served by the index.
        kind: ElementKind,
        /// Database file path.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A statement against a disk index failed.
    #[cfg(feature = "store-sqlite")]
    #[error("{kind} index query failed")]
    Query {
        /// Element kind served by the index.
        kind: ElementKind,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Encoding a geometry for storage failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to encode geometry of {kind} {id}")]
    Encode {
        /// Element kind served by the index.
        kind: ElementKind,
        /// Raw id of the element.
        id: String,
        /// Encoder failure from `bincode`.
        #[source]
        source: bincode::Error,
    },
    /// Decoding a stored geometry failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to decode geometry of {kind} {id}")]
    Decode {
        /// Element kind served by the index.
        kind: ElementKind,
        /// Raw id of the element.
        id: String,
        /// Decoder failure from `bincode`.
        #[source]
        source: bincode::Error,
    },
    /// The disk strategy was requested without SQLite support compiled in.
    #[error("disk-backed indices require the `store-sqlite` feature")]
    DiskUnavailable,
}

/// How the reference indices of a job are stored.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum IndexStrategy {
    /// Hash maps held in process memory.
    #[cfg_attr(feature = "serde", serde(rename = "memory"))]
    InMemory,
    /// One SQLite database per element kind in a scratch directory.
    Disk,
}

impl IndexStrategy {
    /// Choose a strategy from the input size and the memory budget.
    ///
    /// Inputs larger than half of the budget are indexed on disk.
    ///
    /// # Examples
    ///
    /// ```
    /// use geotable_core::IndexStrategy;
    ///
    /// assert_eq!(IndexStrategy::select(100, 1_000), IndexStrategy::InMemory);
    /// assert_eq!(IndexStrategy::select(600, 1_000), IndexStrategy::Disk);
    /// ```
    #[must_use]
    pub const fn select(input_bytes: u64, memory_budget_bytes: u64) -> Self {
        match input_bytes.checked_mul(2) {
            Some(doubled) if doubled <= memory_budget_bytes => Self::InMemory,
            _ => Self::Disk,
        }
    }
}

impl fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InMemory => f.write_str("memory"),
            Self::Disk => f.write_str("disk"),
        }
    }
}

/// Entry counts of the three indices.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexSizes {
    /// Registered node ids.
    pub nodes: u64,
    /// Registered way ids.
    pub ways: u64,
    /// Registered relation ids.
    pub relations: u64,
}

/// The node, way and relation indices exclusively owned by one job.
///
/// For the disk strategy the scratch subdirectory holding the databases is
/// removed when the set is dropped.
pub struct IndexSet {
    nodes: Box<dyn ReferenceIndex>,
    ways: Box<dyn ReferenceIndex>,
    relations: Box<dyn ReferenceIndex>,
    strategy: IndexStrategy,
    // Declared last so the databases close before the directory is removed.
    #[cfg(feature = "store-sqlite")]
    scratch: Option<tempfile::TempDir>,
}

impl IndexSet {
    /// Create three in-memory indices.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            nodes: Box::new(MemoryIndex::default()),
            ways: Box::new(MemoryIndex::default()),
            relations: Box::new(MemoryIndex::default()),
            strategy: IndexStrategy::InMemory,
            #[cfg(feature = "store-sqlite")]
            scratch: None,
        }
    }

    /// Create three SQLite indices inside a fresh subdirectory of
    /// `scratch_root`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::CreateDirectory`] when the subdirectory cannot
    /// be created and [`IndexError::Open`] when a database cannot be
    /// initialised.
    #[cfg(feature = "store-sqlite")]
    pub fn on_disk(scratch_root: &std::path::Path) -> Result<Self, IndexError> {
        let scratch = tempfile::Builder::new()
            .prefix("geotable-index-")
            .tempdir_in(scratch_root)
            .map_err(|source| IndexError::CreateDirectory {
                path: scratch_root.to_path_buf(),
                source,
            })?;
        let open = |kind: ElementKind| -> Result<Box<dyn ReferenceIndex>, IndexError> {
            let path = scratch.path().join(format!("{kind}s.sqlite"));
            Ok(Box::new(SqliteIndex::open(kind, &path)?))
        };
        let nodes = open(ElementKind::Node)?;
        let ways = open(ElementKind::Way)?;
        let relations = open(ElementKind::Relation)?;
        Ok(Self {
            nodes,
            ways,
            relations,
            strategy: IndexStrategy::Disk,
            scratch: Some(scratch),
        })
    }

    /// Open an index set for `strategy`, using `scratch_root` for disk
    /// storage.
    ///
    /// # Errors
    ///
    /// Propagates disk index creation failures; returns
    /// [`IndexError::DiskUnavailable`] when the disk strategy is requested
    /// without SQLite support.
    pub fn open(strategy: IndexStrategy, scratch_root: &std::path::Path) -> Result<Self, IndexError> {
        match strategy {
            IndexStrategy::InMemory => Ok(Self::in_memory()),
            #[cfg(feature = "store-sqlite")]
            IndexStrategy::Disk => Self::on_disk(scratch_root),
            #[cfg(not(feature = "store-sqlite"))]
            IndexStrategy::Disk => {
                let _ = scratch_root;
                Err(IndexError::DiskUnavailable)
            }
        }
    }

    /// Strategy backing this set.
    #[must_use]
    pub const fn strategy(&self) -> IndexStrategy {
        self.strategy
    }

    /// Directory holding the disk databases, if any.
    #[must_use]
    pub fn scratch_path(&self) -> Option<&std::path::Path> {
        #[cfg(feature = "store-sqlite")]
        {
            self.scratch.as_ref().map(tempfile::TempDir::path)
        }
        #[cfg(not(feature = "store-sqlite"))]
        {
            None
        }
    }

    /// Index serving `kind`.
    #[must_use]
    pub fn index(&self, kind: ElementKind) -> &dyn ReferenceIndex {
        match kind {
            ElementKind::Node => self.nodes.as_ref(),
            ElementKind::Way => self.ways.as_ref(),
            ElementKind::Relation => self.relations.as_ref(),
        }
    }

    /// Mutable index serving `kind`.
    pub fn index_mut(&mut self, kind: ElementKind) -> &mut dyn ReferenceIndex {
        match kind {
            ElementKind::Node => self.nodes.as_mut(),
            ElementKind::Way => self.ways.as_mut(),
            ElementKind::Relation => self.relations.as_mut(),
        }
    }

    /// Entry counts of the three indices.
    ///
    /// # Errors
    ///
    /// Propagates index failures.
    pub fn sizes(&self) -> Result<IndexSizes, IndexError> {
        Ok(IndexSizes {
            nodes: self.nodes.len()?,
            ways: self.ways.len()?,
            relations: self.relations.len()?,
        })
    }

    /// Clear the three indices.
    ///
    /// # Errors
    ///
    /// Propagates index failures.
    pub fn clear_all(&mut self) -> Result<(), IndexError> {
        self.nodes.clear()?;
        self.ways.clear()?;
        self.relations.clear()
    }
}

impl fmt::Debug for IndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSet")
            .field("strategy", &self.strategy)
            .field("scratch", &self.scratch_path())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, IndexStrategy::InMemory)]
    #[case(500, 1_000, IndexStrategy::InMemory)]
    #[case(501, 1_000, IndexStrategy::Disk)]
    #[case(u64::MAX, u64::MAX, IndexStrategy::Disk)]
    #[case(u64::MAX >> 1, u64::MAX, IndexStrategy::InMemory)]
    #[case((u64::MAX >> 1) + 1, u64::MAX, IndexStrategy::Disk)]
    fn select_compares_input_with_half_budget(
        #[case] input: u64,
        #[case] budget: u64,
        #[case] expected: IndexStrategy,
    ) {
        assert_eq!(IndexStrategy::select(input, budget), expected);
    }

    #[rstest]
    fn index_set_routes_by_kind() {
        let mut set = IndexSet::in_memory();
        set.index_mut(ElementKind::Way).register("7").expect("register way");
        set.index_mut(ElementKind::Node).register("7").expect("register node");
        set.index_mut(ElementKind::Node)
            .resolve("7", &Geometry::Point(point! { x: 1.0, y: 2.0 }))
            .expect("resolve node");

        assert_eq!(
            set.sizes().expect("sizes"),
            IndexSizes {
                nodes: 1,
                ways: 1,
                relations: 0
            }
        );
        assert!(set.index(ElementKind::Way).get("7").expect("get").is_none());
        assert!(set.index(ElementKind::Node).get("7").expect("get").is_some());
        assert!(!set.index(ElementKind::Relation).contains("7").expect("contains"));
    }

    #[rstest]
    fn clear_all_empties_every_kind() {
        let mut set = IndexSet::in_memory();
        for kind in ElementKind::ALL {
            set.index_mut(kind).register("1").expect("register");
        }
        set.clear_all().expect("clear");
        for kind in ElementKind::ALL {
            assert!(set.index(kind).is_empty().expect("is_empty"));
        }
    }

    #[cfg(feature = "store-sqlite")]
    #[rstest]
    fn disk_scratch_directory_is_removed_on_drop() {
        let root = tempfile::tempdir().expect("tempdir");
        let set = IndexSet::open(IndexStrategy::Disk, root.path()).expect("open disk set");
        let scratch = set.scratch_path().expect("scratch path").to_path_buf();
        assert!(scratch.is_dir());
        assert!(scratch.join("nodes.sqlite").is_file());
        drop(set);
        assert!(!scratch.exists());
    }
}
