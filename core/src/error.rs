//! Error types for engine runs and model maintenance.
//!
//! Only run-aborting conditions are errors. Every other inconsistency is a
//! [`ValidationIssue`](crate::ValidationIssue) attached to its record.

use thiserror::Error;

/// Fatal, run-aborting failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Duplicate hints contradict each other or the do-not-merge registry.
    #[error("{count} conflict(s) in duplicate names: {}", details.join("; "))]
    DuplicateConflicts { count: usize, details: Vec<String> },
    /// A duplicate target had already been absorbed into another record.
    #[error("record \"{name}\" is already a duplicate of \"{primary}\"")]
    AlreadyAbsorbed { name: String, primary: String },
    /// Some duplicates could not be merged.
    #[error("{count} error(s) while merging duplicates: {}", details.join("; "))]
    MergeFailures { count: usize, details: Vec<String> },
}

/// Failures while maintaining the in-memory model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A CRN mask string does not have the expected shape.
    #[error("invalid CRN mask \"{0}\": expected crn:v1 followed by 8 ':'-separated fields")]
    InvalidCrnMask(String),
    /// A catalog resource id is already mapped to another environment.
    #[error("catalog resource id {id} already registered for environment {existing}")]
    DuplicateCatalogId { id: String, existing: String },
}
