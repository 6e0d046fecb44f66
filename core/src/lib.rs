//! Catalog-entry reconciliation engine.
//!
//! This crate merges descriptions of cloud services and environments coming
//! from several upstream sources into one validated, de-duplicated model:
//!
//! - [`make_canonical_name`] / [`make_comparable_name`]: the two levels of
//!   name normalization used for identity and fuzzy matching.
//! - [`DoNotMergeRegistry`]: names exempt from normalization.
//! - [`Model`]: services keyed by comparable name and environments keyed by
//!   comparable [`CrnMask`], with lazy record creation.
//! - [`SourceBundle`] / [`Model::ingest`]: routing of loader output into
//!   records.
//! - [`fold_duplicates`]: absorbs records named as duplicates into their
//!   primaries.
//! - [`validate_composites`]: composite parent/child consistency.
//! - [`ValidationStream`]: the tagged issues attached to every record.
//! - [`run`]: the full phase sequence, producing a [`RunReport`].
//!
//! # Example
//!
//! ```
//! use catalog_merge_core::*;
//!
//! let mut model = Model::new();
//! model.ingest(SourceBundle {
//!     catalog: vec![
//!         CatalogEntry {
//!             name: "is".into(),
//!             kind: "composite".into(),
//!             composite: Some(CompositeDecl {
//!                 composite_kind: "service".into(),
//!                 composite_tag: "is_composite".into(),
//!                 children: vec![CompositeChild {
//!                     name: "is.volume".into(),
//!                     kind: "service".into(),
//!                 }],
//!             }),
//!             ..Default::default()
//!         },
//!         CatalogEntry {
//!             name: "is.volume".into(),
//!             kind: "service".into(),
//!             tags: ["is_composite".to_string()].into(),
//!             ..Default::default()
//!         },
//!     ],
//!     ..Default::default()
//! });
//!
//! let report = run(&mut model, &RunOptions::default()).unwrap();
//! let volume = report.service("isvolume").unwrap();
//! assert_eq!(volume.composite_parent.as_deref(), Some("is"));
//! assert_eq!(report.counts.severe + report.counts.critical, 0);
//! ```

mod composite;
mod crn;
mod engine;
mod error;
mod ingest;
mod issues;
mod merge;
mod model;
mod names;
mod registry;
mod report;
mod run_actions;
mod types;
mod validate;

pub use composite::validate_composites;
pub use crn::{ANY_LOCATION, CrnMask};
pub use engine::{CONFIG_OWNER, RunOptions, run};
pub use error::{EngineError, ModelError};
pub use ingest::SourceBundle;
pub use issues::{IssueHandle, IssueTag, Severity, ValidationIssue, ValidationStream};
pub use merge::{Absorption, FoldSummary, fold_duplicates};
pub use model::Model;
pub use names::{
    COMPARABLE_PREFIXES, COMPARABLE_SUFFIXES, CompositeName, CrnNameError,
    check_valid_crn_service_name, compare_composite_and_canonical, convert_composite_to_canonical,
    is_name_canonical, make_canonical_name, make_comparable_name, parse_composite_name,
};
pub use registry::{DoNotMergeConflict, DoNotMergeRegistry};
pub use report::{EnvironmentSummary, RunReport, ServiceSummary, SeverityCounts, Tombstone};
pub use run_actions::{RunAction, RunActions};
pub use types::*;
pub use validate::{validate_environments, validate_names};
