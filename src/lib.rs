#![deny(missing_docs)]
#![allow(dead_code)]

//! # remapkit
//!
//! Resolution, merging and application of multi-namespace symbol mapping tables.
//!
//! Toolchains built around an obfuscated program juggle three coexisting naming
//! namespaces: the obfuscated original names, a stable intermediate namespace, and a
//! human-readable namespace contributed by a third party. `remapkit` resolves the raw
//! mapping tables relating them into one canonical table and orchestrates applying
//! that table to compiled artifacts across a multi-module build.
//!
//! ## Features
//!
//! - **Format detection and codecs** - the legacy single-pair layout and the versioned
//!   multi-namespace layout, with byte-stable round-trips
//! - **Namespace merging** - join two tables over a shared pivot namespace, never
//!   dropping one-sided entries
//! - **Namespace reordering** - permute and rename columns, descriptors rewritten
//! - **Heuristic field naming** - best-effort proposals from a reference binary
//! - **Memoized resolution** - extract, merge, reorder and package once per version,
//!   with forced-refresh support and crash-safe persistence
//! - **Shared remap scheduling** - deduplicated, dependency-ordered single-pass
//!   execution of artifact remap jobs across build modules
//!
//! ## Quick Start
//!
//! ```rust
//! use remapkit::prelude::*;
//!
//! let table = remapkit::codec::parse(
//!     b"tiny\t2\t0\tofficial\tnamed\nc\ta/A\tcom/example/Foo\n",
//! )?;
//! assert_eq!(table.namespaces(), ["official", "named"]);
//!
//! let renamed = remapkit::reorder::reorder(&table, &["named", "official"])?;
//! assert!(renamed.find_class(0, "com/example/Foo").is_some());
//! # Ok::<(), remapkit::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - convenient re-exports of the commonly used types
//! - [`tree`] - the immutable [`tree::MappingTree`] data model
//! - [`codec`] - format detection, parsing and serialization
//! - [`cache`] - the session-wide parsed-table cache
//! - [`merge`] / [`reorder`] - table derivation passes
//! - [`suggest`] - heuristic field naming over a structural binary reader
//! - [`resolve`] - the top-level resolution pipeline and its [`resolve::Session`]
//! - [`remap`] - the shared, dependency-ordered remap job queue
//!
//! The host build system and its collaborators stay behind narrow seams: dependency
//! bytes come through [`resolve::Fetcher`], binary structure through
//! [`suggest::ClassReader`], and the symbol rewriting itself through
//! [`remap::ArtifactRemapper`].

#[macro_use]
pub(crate) mod macros;

pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use remapkit::prelude::*;
///
/// let cache = TableCache::new();
/// assert!(cache.is_empty());
/// ```
pub mod prelude;

pub mod cache;
pub mod codec;
pub mod merge;
pub mod remap;
pub mod reorder;
pub mod resolve;
pub mod suggest;
pub mod tree;

pub use error::Error;

/// The result type used throughout remapkit.
pub type Result<T> = std::result::Result<T, Error>;
