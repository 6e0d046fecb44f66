//! Snapshot loading, run configuration and run manifests for catalog merging.
//!
//! This crate sits between upstream loaders and the reconciliation engine in
//! `catalog-merge-core`: it reads source snapshots from disk into a
//! [`SourceBundle`](catalog_merge_core::SourceBundle), loads the YAML
//! [`RunConfig`] for a batch run, and records a [`RunManifest`] next to each
//! report.
//!
//! # Quick start
//!
//! ```no_run
//! use catalog_merge_core::{Model, run};
//! use catalog_merge_db::{RunConfig, RunManifest, SourceLoader};
//!
//! let config = RunConfig::load("catalog-merge.yml").unwrap();
//! let loader = SourceLoader::from_dir("snapshots/").unwrap();
//!
//! let options = config.run_options();
//! let mut model = Model::new();
//! model.register_do_not_merge(
//!     catalog_merge_core::CONFIG_OWNER,
//!     options.do_not_merge.iter().map(String::as_str),
//! );
//! model.ingest(loader.into_bundle());
//! let report = run(&mut model, &options).unwrap();
//!
//! let mut manifest = RunManifest::new(env!("CARGO_PKG_VERSION"));
//! manifest.record_report(&report).unwrap();
//! ```

mod config;
mod error;
mod loader;
mod manifest;

pub use config::{ReportConfig, RunConfig};
pub use error::{LoadError, Result};
pub use loader::{LoaderBuilder, LoaderSource, SnapshotFormat, SourceLoader};
pub use manifest::{MANIFEST_VERSION, RunManifest};
