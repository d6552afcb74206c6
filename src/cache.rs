//! Session-wide cache of parsed mapping tables.
//!
//! Parsing a table is cheap but not free, and a multi-module build asks for the same
//! table once per module. [`TableCache`] maps a table's on-disk location to its parsed
//! [`MappingTree`] so each distinct location is parsed at most once per session, even
//! under concurrent callers - the check-then-insert is serialized per key, so a second
//! caller for a location already being loaded waits for the first rather than
//! re-parsing.
//!
//! Cross-version staleness is handled where it can occur: persisted artifact names
//! encode the mappings version, so a newer toolchain never reads a table derived by an
//! older one through a stale name. Forced refresh maps to
//! [`TableCache::invalidate_all`].

use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::{mapref::entry::Entry, DashMap};
use memmap2::Mmap;

use crate::{codec, tree::MappingTree, Result};

/// Cache mapping table locations to their parsed trees.
///
/// Readers observe either "absent" or a fully built tree, never a partial value.
/// One instance is owned by the resolution [`Session`](crate::resolve::Session) and
/// shared across all modules of a build when cache-sharing is enabled.
///
/// # Examples
///
/// ```rust,no_run
/// use remapkit::cache::TableCache;
/// use std::path::Path;
///
/// let cache = TableCache::new();
/// let table = cache.get(Path::new("mappings.tiny"))?;
/// let again = cache.get(Path::new("mappings.tiny"))?; // no second parse
/// assert!(std::sync::Arc::ptr_eq(&table, &again));
/// # Ok::<(), remapkit::Error>(())
/// ```
#[derive(Default)]
pub struct TableCache {
    tables: DashMap<PathBuf, Arc<MappingTree>>,
}

impl TableCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> TableCache {
        TableCache {
            tables: DashMap::new(),
        }
    }

    /// Return the cached table for `path`, parsing the file on first access.
    ///
    /// The file is memory-mapped and handed to the codec; the parsed tree is stored
    /// and shared with every later caller.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not parse; failed loads
    /// are not cached.
    pub fn get(&self, path: &Path) -> Result<Arc<MappingTree>> {
        self.get_with(path, || load_file(path))
    }

    /// Like [`TableCache::get`], with a caller-supplied loader.
    ///
    /// At most one loader runs per distinct location; concurrent callers for the same
    /// location block on the in-flight load and then observe its result.
    ///
    /// # Errors
    /// Propagates the loader's error; failed loads are not cached.
    pub fn get_with<F>(&self, path: &Path, loader: F) -> Result<Arc<MappingTree>>
    where
        F: FnOnce() -> Result<MappingTree>,
    {
        match self.tables.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let tree = Arc::new(loader()?);
                entry.insert(tree.clone());
                Ok(tree)
            }
        }
    }

    /// Drop the cached table for one location.
    pub fn invalidate(&self, path: &Path) {
        self.tables.remove(path);
    }

    /// Drop every cached table. Wired to forced refresh.
    pub fn invalidate_all(&self) {
        self.tables.clear();
    }

    /// Number of cached tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn load_file(path: &Path) -> Result<MappingTree> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return codec::parse(&[]);
    }

    let mmap = unsafe { Mmap::map(&file) }?;
    codec::parse(&mmap)
}
