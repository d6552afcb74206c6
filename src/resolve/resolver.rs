//! The resolution state machine.
//!
//! `Uninitialized -> Extracted -> (Merged ->)? Reordered -> Packaged -> Done`, with a
//! freshness check short-circuiting the whole run when the previously persisted final
//! table is still trustworthy. The merge stage is skipped for tables already produced
//! in the multi-namespace layout, and for legacy tables (which never merge - they are
//! complete upstream and only receive the field-name suggestion pass).

use std::{
    io::{Cursor, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{info, warn};
use zip::{write::SimpleFileOptions, ZipArchive, ZipWriter};

use crate::{
    codec::{self, FormatVersion},
    merge::{merge, MergeRequest},
    reorder::reorder,
    resolve::{write_atomic, Coordinate, Fetcher, Session, TABLE_ENTRY_PATH},
    suggest::{suggest, ClassReader},
    tree::MappingTree,
    Error, Result,
};

/// Everything one resolution run needs besides the session.
pub struct MappingsRequest<'a> {
    /// Coordinate of the mappings dependency artifact
    pub mappings: Coordinate,
    /// Coordinate of the companion intermediate-namespace table, fetched only when
    /// the mappings artifact turns out to be an unmerged two-namespace table
    pub intermediary: Coordinate,
    /// The base-runtime version the build targets
    pub runtime_version: String,
    /// Structural reader over the reference compiled binary, for the field-name
    /// suggestion pass on legacy tables; suggestions are skipped when absent
    pub class_reader: Option<&'a dyn ClassReader>,
    /// Final namespace ordering of a merged table; `(X, pivot, Y)` when absent,
    /// where X is the intermediate-side namespace and Y the human-readable one
    pub namespace_order: Option<Vec<String>>,
}

/// The persisted outcome of a resolution run.
#[derive(Debug, Clone)]
pub struct ResolvedMappings {
    /// The final mapping table on disk
    pub table_path: PathBuf,
    /// The packaged archive form, consumable as an ordinary dependency
    pub package_path: PathBuf,
    /// Table version string, usable by callers as a cache key component
    pub mappings_version: String,
    /// The parsed final table
    pub table: Arc<MappingTree>,
}

/// Top-level driver of the mapping resolution pipeline.
///
/// # Examples
///
/// ```rust,ignore
/// use remapkit::resolve::{Coordinate, MappingsRequest, MappingsResolver, Session};
///
/// let session = Session::new(cache_root);
/// let resolver = MappingsResolver::new(&session);
/// let resolved = resolver.resolve(&fetcher, &MappingsRequest {
///     mappings: Coordinate::new("net.example", "yarn", "1.16.5+build.7"),
///     intermediary: Coordinate::new("net.example", "intermediary", "1.16.5"),
///     runtime_version: "1.16.5".to_string(),
///     class_reader: None,
///     namespace_order: None,
/// })?;
/// println!("table version {}", resolved.mappings_version);
/// ```
pub struct MappingsResolver<'a> {
    session: &'a Session,
}

impl<'a> MappingsResolver<'a> {
    /// A resolver bound to the given session.
    #[must_use]
    pub fn new(session: &'a Session) -> MappingsResolver<'a> {
        MappingsResolver { session }
    }

    /// Run the pipeline, returning the persisted final table.
    ///
    /// Memoized: when a previously produced final table exists under the expected
    /// name, parses cleanly and forced refresh is off, it is returned without
    /// re-derivation. An unreadable persisted table is a cache miss, not an error.
    ///
    /// # Errors
    /// Fatal conditions per the pipeline contract: unfetchable artifacts, unknown or
    /// malformed table layouts, a merge without a shared namespace, and a declared
    /// base-runtime version disagreeing with the requested one.
    pub fn resolve(
        &self,
        fetcher: &dyn Fetcher,
        request: &MappingsRequest<'_>,
    ) -> Result<ResolvedMappings> {
        let coordinate = &request.mappings;

        if let Some(declared) = declared_runtime(&coordinate.version) {
            if declared != request.runtime_version {
                return Err(Error::VersionMismatch {
                    requested: request.runtime_version.clone(),
                    declared: declared.to_string(),
                });
            }
        }

        info!(
            ":setting up mappings ({} {})",
            coordinate.name, coordinate.version
        );

        let archive_bytes = fetcher.fetch(coordinate)?;
        let raw_table = read_table_entry(&archive_bytes)?;
        let layout = codec::detect_version(&raw_table)?;

        let mappings_name = format!(
            "{}.{}",
            coordinate.group,
            coordinate
                .name
                .strip_suffix("-unmerged")
                .unwrap_or(&coordinate.name)
        );
        let mappings_version = match layout {
            FormatVersion::TinyV2 => format!("{}-v2", coordinate.version),
            FormatVersion::TinyV1 => coordinate.version.clone(),
        };

        let stem = format!(
            "{mappings_name}-tiny-{}-{mappings_version}",
            request.runtime_version
        );
        let mappings_dir = self.session.mappings_dir();
        let steps_dir = self.session.steps_dir();
        let base_path = mappings_dir.join(format!("{stem}-base.tiny"));
        let table_path = mappings_dir.join(format!("{stem}.tiny"));
        let classifier = request
            .mappings
            .classifier
            .as_deref()
            .map(|classifier| format!("-{classifier}"))
            .unwrap_or_default();
        let package_path = self
            .session
            .cache_root()
            .join(format!("{stem}-final{classifier}.jar"));

        if self.session.refresh() {
            clean(
                &steps_dir,
                &[
                    base_path.as_path(),
                    table_path.as_path(),
                    package_path.as_path(),
                ],
            )?;
        } else if table_path.exists() {
            match self.session.tables().get(&table_path) {
                Ok(table) => {
                    if !package_path.exists() {
                        package(&table_path, &package_path)?;
                    }
                    info!(":using cached mappings {}", table_path.display());
                    return Ok(ResolvedMappings {
                        table_path,
                        package_path,
                        mappings_version,
                        table,
                    });
                }
                Err(error) => {
                    // Corrupt persisted table is a cache miss, re-derive it
                    warn!(
                        "cached mappings at {} are unreadable ({error}), re-deriving",
                        table_path.display()
                    );
                    self.session.tables().invalidate(&table_path);
                }
            }
        }

        std::fs::create_dir_all(&steps_dir)?;

        info!(":extracting {}", coordinate);
        write_atomic(&base_path, &raw_table)?;

        let final_tree = match layout {
            FormatVersion::TinyV1 => {
                // Legacy tables are complete upstream; they only lack field names
                let tree = codec::parse(&raw_table)?;
                let tree = match request.class_reader {
                    Some(reader) => {
                        info!(":populating field names");
                        suggest(&tree, reader).0
                    }
                    None => tree,
                };
                write_atomic(&table_path, &codec::serialize_legacy(&tree)?)?;
                tree
            }
            FormatVersion::TinyV2 => {
                let tree = codec::parse(&raw_table)?;
                let tree = if tree.namespaces().len() > 2 {
                    // Already in the multi-namespace layout, nothing to merge
                    tree
                } else {
                    self.merge_with_intermediary(fetcher, request, &steps_dir, &tree)?
                };
                write_atomic(&table_path, &codec::serialize(&tree))?;
                tree
            }
        };

        package(&table_path, &package_path)?;

        let table = self
            .session
            .tables()
            .get_with(&table_path, || Ok(final_tree))?;

        Ok(ResolvedMappings {
            table_path,
            package_path,
            mappings_version,
            table,
        })
    }

    /// The merge stage: obtain the companion intermediate-namespace table, invert it
    /// onto the shared namespace, merge, and reorder to the canonical column order.
    fn merge_with_intermediary(
        &self,
        fetcher: &dyn Fetcher,
        request: &MappingsRequest<'_>,
        steps_dir: &Path,
        unmerged: &MappingTree,
    ) -> Result<MappingTree> {
        let intermediary_path = self
            .session
            .mappings_dir()
            .join(format!("intermediary-{}-v2.tiny", request.runtime_version));

        if !intermediary_path.exists() || self.session.intermediary_needs_refresh() {
            info!(":extracting {}", request.intermediary);
            let archive_bytes = fetcher.fetch(&request.intermediary)?;
            write_atomic(&intermediary_path, &read_table_entry(&archive_bytes)?)?;
            self.session.tables().invalidate(&intermediary_path);
        }

        let intermediary = self.session.tables().get(&intermediary_path)?;

        let pivot = unmerged
            .namespaces()
            .iter()
            .find(|ns| intermediary.namespace_index(ns).is_some())
            .cloned()
            .ok_or_else(|| {
                Error::IncompatibleTables(
                    "mappings and intermediary tables share no namespace".to_string(),
                )
            })?;
        let x = other_namespace(&intermediary, &pivot)?;
        let y = other_namespace(unmerged, &pivot)?;

        let inverted = reorder(&intermediary, &[&pivot, &x])?;
        write_atomic(
            &steps_dir.join("inverted-intermediary.tiny"),
            &codec::serialize(&inverted),
        )?;

        info!(":merging");
        let merged = merge(&inverted, unmerged, &MergeRequest::new(&pivot))?;
        write_atomic(
            &steps_dir.join("unordered-merged.tiny"),
            &codec::serialize(&merged),
        )?;

        match &request.namespace_order {
            Some(order) => {
                let order: Vec<&str> = order.iter().map(String::as_str).collect();
                reorder(&merged, &order)
            }
            None => reorder(&merged, &[&x, &pivot, &y]),
        }
    }
}

/// The non-pivot namespace of a two-namespace table.
fn other_namespace(tree: &MappingTree, pivot: &str) -> Result<String> {
    tree.namespaces()
        .iter()
        .find(|ns| ns.as_str() != pivot)
        .cloned()
        .ok_or_else(|| {
            Error::IncompatibleTables(format!("table declares only the pivot namespace '{pivot}'"))
        })
}

/// The base-runtime version a mappings version string declares, if any.
///
/// Only the `<runtime>+build.N` convention embeds the runtime version. Plain or
/// merely suffixed versions (`0.5-alpha`, `20200422`) declare nothing and skip the
/// mismatch check; a hyphen alone is no evidence of a runtime prefix.
fn declared_runtime(version: &str) -> Option<&str> {
    let index = version.find("+build.")?;
    Some(&version[..index])
}

/// Pull the table bytes out of a mappings archive.
fn read_table_entry(archive: &[u8]) -> Result<Vec<u8>> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut entry = zip.by_name(TABLE_ENTRY_PATH).map_err(|error| match error {
        zip::result::ZipError::FileNotFound => {
            malformed_error!("Archive carries no table at {}", TABLE_ENTRY_PATH)
        }
        other => Error::ZipError(other),
    })?;

    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Bundle the final table into its archive form, atomically.
fn package(table_path: &Path, package_path: &Path) -> Result<()> {
    let bytes = std::fs::read(table_path)?;
    let parent = package_path.parent().ok_or_else(|| {
        malformed_error!(
            "Cannot persist to a path without a parent - {}",
            package_path.display()
        )
    })?;

    let temp = tempfile::NamedTempFile::new_in(parent)?;
    {
        let mut writer = ZipWriter::new(temp.as_file());
        writer.start_file(TABLE_ENTRY_PATH, SimpleFileOptions::default())?;
        writer.write_all(&bytes)?;
        writer.finish()?;
    }
    temp.persist(package_path).map_err(|error| error.error)?;
    Ok(())
}

/// Wipe the steps directory wholesale plus the named persisted artifacts.
fn clean(steps_dir: &Path, files: &[&Path]) -> Result<()> {
    if steps_dir.exists() {
        std::fs::remove_dir_all(steps_dir)?;
    }

    for file in files {
        match std::fs::remove_file(file) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => return Err(error.into()),
        }
    }

    Ok(())
}
