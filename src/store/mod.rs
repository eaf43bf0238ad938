//! Boundary to the versioned entity store.
//!
//! Definitions live in semantic records: one record per (pattern, referenced
//! concept) pair, each carrying stamped versions of a definition tree. Reads
//! go through a [`StampCoordinate`]; writes accumulate in a [`Transaction`]
//! that the store commits atomically.

pub mod entities;
pub mod memory;
pub mod repositories;
pub mod snapshot;
pub mod value_objects;

use std::path::PathBuf;

pub use entities::{
    CommitCoordinate, SemanticRecord, SemanticVersion, Stamp, StampCoordinate, State,
};
pub use memory::InMemorySemanticStore;
pub use repositories::{SemanticStore, Transaction};
pub use snapshot::{AtomSpec, ConceptSpec, SetSpec, TerminologySnapshot};
pub use value_objects::{Nid, NidError};

use crate::logic::LogicError;

/// Errors raised by store implementations and snapshot loading.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("semantic store lock poisoned")]
    Poisoned,
    /// No native identifiers are left to allocate.
    #[error("native identifier space exhausted")]
    NidsExhausted,
    /// A committed record disagrees with the stored record's pattern or
    /// referenced component.
    #[error("semantic `{semantic}` does not match the stored record")]
    RecordMismatch { semantic: Nid },
    /// Reading a snapshot file failed.
    #[error("failed to read terminology snapshot `{path}`: {source}")]
    SnapshotIo {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A snapshot document is not valid JSON of the expected shape.
    #[error("invalid terminology snapshot: {0}")]
    SnapshotFormat(#[source] serde_json::Error),
    /// A snapshot definition could not be assembled.
    #[error("invalid definition for concept `{concept}`: {source}")]
    Definition {
        concept: Nid,
        #[source]
        source: LogicError,
    },
    /// A stored definition tree could not be adapted.
    #[error("stored definition of semantic `{semantic}` is invalid: {source}")]
    StoredDefinition {
        semantic: Nid,
        #[source]
        source: LogicError,
    },
}
