//! Mapping resolution - from a versioned dependency artifact to the final table.
//!
//! This module hosts the top-level driver of the mapping pipeline. Given a mappings
//! dependency coordinate and a [`Fetcher`] for acquiring artifact bytes, the
//! [`MappingsResolver`] extracts the raw table from its archive, detects its layout,
//! runs the field-name suggestion or merge/reorder steps as the layout demands, and
//! persists both the final table and a packaged archive form for downstream
//! consumption - memoized behind a freshness check so repeated builds reuse the
//! persisted result.
//!
//! # Key Components
//!
//! - [`Session`] - per-run shared state (caches, refresh flag, scratch naming)
//! - [`Coordinate`] / [`Fetcher`] - the narrow dependency-fetch seam
//! - [`MappingsResolver`] - the extract → merge → reorder → package state machine
//! - [`ResolvedMappings`] - the resolved result handed to remapping and packaging
//!
//! # Persisted layout
//!
//! Under the session's cache root:
//!
//! ```text
//! mappings/steps/            intermediate files, wiped wholesale on forced refresh
//! mappings/<...>-base.tiny   the raw extracted table
//! mappings/<...>.tiny        the final table (name encodes versions + layout suffix)
//! <...>-final.jar            the packaged archive form
//! ```

mod resolver;
mod session;

use std::{fmt, io::Write, path::Path};

pub use resolver::{MappingsRequest, MappingsResolver, ResolvedMappings};
pub use session::Session;

use crate::Result;

/// Internal archive path at which a mappings artifact carries its table.
pub const TABLE_ENTRY_PATH: &str = "mappings/mappings.tiny";

/// A versioned dependency identifier, `group:name:version` with an optional
/// classifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    /// Dependency group
    pub group: String,
    /// Artifact name
    pub name: String,
    /// Artifact version
    pub version: String,
    /// Optional classifier
    pub classifier: Option<String>,
}

impl Coordinate {
    /// A coordinate without classifier.
    #[must_use]
    pub fn new(group: &str, name: &str, version: &str) -> Coordinate {
        Coordinate {
            group: group.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            classifier: None,
        }
    }

    /// Attach a classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: &str) -> Coordinate {
        self.classifier = Some(classifier.to_string());
        self
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        Ok(())
    }
}

/// Versioned dependency-fetch capability.
///
/// The single seam through which the resolver acquires artifact bytes. Implementors
/// are expected to be retryable and to cache by freshness on their side; this crate
/// never re-fetches an artifact it has already persisted, except under forced
/// refresh.
pub trait Fetcher {
    /// Fetch the artifact bytes for a coordinate.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotFound`] if the coordinate does not resolve.
    fn fetch(&self, coordinate: &Coordinate) -> Result<Vec<u8>>;
}

/// Write `bytes` to `path` atomically - temp file in the final directory, then rename.
///
/// No partial file is ever visible at the final path, so every persisted artifact is
/// safely retryable after a crash.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        malformed_error!("Cannot persist to a path without a parent - {}", path.display())
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.persist(path).map_err(|error| error.error)?;
    Ok(())
}
