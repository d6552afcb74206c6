use std::path::PathBuf;

use thiserror::Error;

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers all possible error conditions that can occur during mapping table
/// parsing, merging, resolution and artifact remapping. Each variant provides specific
/// context about the failure mode to enable appropriate error handling.
///
/// # Error Categories
///
/// ## Table Format Errors
/// - [`Error::UnknownFormat`] - Bytes match no known table layout
/// - [`Error::Malformed`] - Corrupted or inconsistent table contents
///
/// ## Namespace Operation Errors
/// - [`Error::IncompatibleTables`] - Merge attempted without a shared pivot namespace
/// - [`Error::UnknownNamespace`] - Reorder target references an absent namespace
///
/// ## Resolution Errors
/// - [`Error::VersionMismatch`] - Declared base-runtime version disagrees with the requested one
/// - [`Error::NotFound`] - A required dependency artifact could not be fetched
///
/// ## Remap Errors
/// - [`Error::RemapJob`] - A specific artifact failed to remap during the shared pass
/// - [`Error::GraphError`] - The job queue contains a dependency cycle or is otherwise unorderable
///
/// ## I/O and Infrastructure Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::ZipError`] - Archive extraction/packaging errors
/// - [`Error::LockError`] - Thread synchronization failure
///
/// # Propagation policy
///
/// Format, namespace and version errors are never recovered locally; they surface to the
/// top-level caller with the offending location. Field-name suggestion failures are not
/// errors at all (the entry keeps its unmapped sentinel). An unreadable previously-persisted
/// table is treated as a cache miss by the resolver, not surfaced through this type.
#[derive(Error, Debug)]
pub enum Error {
    /// The input bytes match none of the known table layouts.
    ///
    /// Version detection inspects only the first (metadata) line of the input;
    /// this error means that line is neither a legacy v1 header nor a versioned
    /// multi-namespace header.
    #[error("Input does not match any known mapping table format")]
    UnknownFormat,

    /// The table is damaged and could not be parsed.
    ///
    /// The table bytes carried a recognizable header but the contents violate the
    /// layout, e.g. an entry naming more or fewer namespaces than declared, a member
    /// line outside of any class, or a duplicated identifier within one namespace.
    /// The error includes the source location where the malformation was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A merge was attempted across tables that do not share the pivot namespace.
    #[error("Tables cannot be merged - {0}")]
    IncompatibleTables(String),

    /// A namespace reorder referenced a namespace absent from the source table.
    #[error("Unknown namespace '{name}'")]
    UnknownNamespace {
        /// The namespace that was requested but not declared by the table
        name: String,
    },

    /// The table's declared base-runtime version disagrees with the requested one.
    ///
    /// This indicates a definitely-wrong table and is never silently coerced.
    #[error("Runtime version ({requested}) does not match the mappings' runtime version ({declared})")]
    VersionMismatch {
        /// The base-runtime version the caller asked to resolve mappings for
        requested: String,
        /// The base-runtime version the mappings artifact declares
        declared: String,
    },

    /// A required dependency artifact could not be fetched.
    #[error("Could not find {0}")]
    NotFound(String),

    /// A specific artifact failed to remap during the shared pass.
    ///
    /// Outputs of jobs that completed before the failure remain valid on disk;
    /// only this job and anything depending on it needs to rerun.
    #[error("Failed to remap {}: {message}", path.display())]
    RemapJob {
        /// The input artifact that failed to remap
        path: PathBuf,
        /// Description of the underlying failure
        message: String,
    },

    /// Job queue ordering error.
    ///
    /// Raised when the remap job queue cannot be brought into dependency order,
    /// typically because two jobs consume each other's outputs.
    #[error("{0}")]
    GraphError(String),

    /// Failed to lock an internal resource.
    #[error("Failed to lock target - {0}")]
    LockError(String),

    /// An error occurred while accessing the filesystem.
    #[error("File operation failed")]
    FileError(#[from] std::io::Error),

    /// An error occurred while reading or writing an archive.
    #[error("Archive operation failed")]
    ZipError(#[from] zip::result::ZipError),
}
