//! Build-run session state.
//!
//! A [`Session`] is the explicit context object shared by every orchestrator call of
//! one build run: it owns the parsed-table cache, the shared remap queue, the forced
//! refresh flag and the per-run mixin-mapping counter. "Shared across modules" means
//! one `Arc<Session>` reused by reference for every module-level call; "unshared"
//! means one session per module. Nothing in this crate reaches for process globals.

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use crate::{cache::TableCache, remap::RemapQueue};

/// Shared state of one build run.
///
/// # Examples
///
/// ```rust
/// use remapkit::resolve::Session;
/// use std::{path::Path, sync::Arc};
///
/// // One session shared by reference across all modules of the build
/// let session = Arc::new(Session::new(Path::new("/home/user/.cache/remapkit")));
/// assert!(!session.refresh());
/// ```
pub struct Session {
    cache_root: PathBuf,
    refresh: bool,
    tables: TableCache,
    remap_queue: RemapQueue,
    mixin_counter: AtomicUsize,
    intermediary_refreshed: AtomicBool,
}

impl Session {
    /// Create a session over the per-user cache root.
    #[must_use]
    pub fn new(cache_root: &Path) -> Session {
        Session {
            cache_root: cache_root.to_path_buf(),
            refresh: false,
            tables: TableCache::new(),
            remap_queue: RemapQueue::new(),
            mixin_counter: AtomicUsize::new(0),
            intermediary_refreshed: AtomicBool::new(false),
        }
    }

    /// Enable forced refresh: persisted artifacts are distrusted and re-derived, and
    /// the parsed-table cache is dropped.
    #[must_use]
    pub fn with_refresh(mut self, refresh: bool) -> Session {
        self.refresh = refresh;
        if refresh {
            self.tables.invalidate_all();
        }
        self
    }

    /// The per-user cache root.
    #[must_use]
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Whether forced refresh is in effect for this run.
    #[must_use]
    pub fn refresh(&self) -> bool {
        self.refresh
    }

    /// The session's parsed-table cache.
    #[must_use]
    pub fn tables(&self) -> &TableCache {
        &self.tables
    }

    /// The session's shared remap job queue.
    #[must_use]
    pub fn remap_queue(&self) -> &RemapQueue {
        &self.remap_queue
    }

    /// Directory holding final mapping tables.
    #[must_use]
    pub fn mappings_dir(&self) -> PathBuf {
        self.cache_root.join("mappings")
    }

    /// Scratch directory for intermediate resolution steps; freely wipeable.
    #[must_use]
    pub fn steps_dir(&self) -> PathBuf {
        self.mappings_dir().join("steps")
    }

    /// Scratch file name for a caller-side mixin mapping table, keyed by the runtime
    /// version, the table version and a monotonically increasing per-run counter.
    ///
    /// Purely a naming scheme; the caller creates the file.
    #[must_use]
    pub fn next_mixin_mappings_path(
        &self,
        runtime_version: &str,
        mappings_version: &str,
    ) -> PathBuf {
        let counter = self.mixin_counter.fetch_add(1, Ordering::SeqCst);
        self.cache_root.join("scratch").join(format!(
            "mixin-map-{runtime_version}-{mappings_version}.{counter}.tiny"
        ))
    }

    /// Whether the companion intermediary table still needs its one forced re-fetch
    /// this run. Returns `true` exactly once per session when refresh is on.
    pub(crate) fn intermediary_needs_refresh(&self) -> bool {
        self.refresh && !self.intermediary_refreshed.swap(true, Ordering::SeqCst)
    }
}
