//! # remapkit Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and
//! traits from the remapkit library. Import it to get quick access to the essentials
//! of mapping resolution and remapping.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all remapkit operations
pub use crate::Error;

/// The result type used throughout remapkit
pub use crate::Result;

// ================================================================================================
// Mapping Tree Data Model
// ================================================================================================

/// The mapping table and its entry types
pub use crate::tree::{ClassEntry, MappingTree, MemberEntry, NameSlot, TreeBuilder};

// ================================================================================================
// Codec
// ================================================================================================

/// Wire format tag returned by version detection
pub use crate::codec::FormatVersion;

// ================================================================================================
// Caching
// ================================================================================================

/// The session-wide parsed-table cache
pub use crate::cache::TableCache;

// ================================================================================================
// Table Derivation Passes
// ================================================================================================

/// Pivot-namespace merging
pub use crate::merge::{merge, MergeRequest};

/// Namespace reordering and renaming
pub use crate::reorder::{reorder, reorder_renamed};

/// Heuristic field-name suggestion and its collaborator trait
pub use crate::suggest::{suggest, ClassReader, ClassShape, FieldShape, SuggestionReport};

// ================================================================================================
// Resolution Pipeline
// ================================================================================================

/// The resolution session, request, resolver and outcome
pub use crate::resolve::{
    Coordinate, Fetcher, MappingsRequest, MappingsResolver, ResolvedMappings, Session,
};

// ================================================================================================
// Remap Orchestration
// ================================================================================================

/// The shared remap queue and its job/collaborator types
pub use crate::remap::{ArtifactRemapper, RemapJob, RemapQueue, RunReport};
