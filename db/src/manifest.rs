//! Run manifests.
//!
//! A manifest is written next to a report and records what the run saw: a
//! SHA-256 checksum per input snapshot, the run actions in effect, a digest
//! of the report itself and its severity counts. Two manifests can be
//! compared to find out which inputs changed between runs, and a manifest can
//! confirm that a report on disk is the one the run produced.
//!
//! # Examples
//!
//! ```no_run
//! use catalog_merge_db::RunManifest;
//!
//! let mut manifest = RunManifest::new("0.1.0");
//! manifest.record_input("snapshots/catalog.json").unwrap();
//! manifest.save("run-manifest.json").unwrap();
//!
//! let loaded = RunManifest::load("run-manifest.json").unwrap();
//! assert_eq!(loaded.inputs.len(), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use catalog_merge_core::{RunAction, RunReport, SeverityCounts};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Manifest format version written by [`RunManifest::new`].
pub const MANIFEST_VERSION: &str = "1.0";

/// Metadata describing one batch run.
///
/// Persisted as pretty-printed JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Manifest format version (e.g., `"1.0"`).
    pub version: String,
    /// Version of the tool that produced the run.
    pub tool_version: String,
    /// RFC 3339 timestamp of when the manifest was created.
    pub generated_at: String,
    /// SHA-256 hex digest of each input snapshot, keyed by path.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    #[serde(default)]
    pub run_actions: BTreeSet<RunAction>,
    /// SHA-256 hex digest of the report's canonical JSON.
    #[serde(default)]
    pub report_digest: String,
    #[serde(default)]
    pub counts: SeverityCounts,
}

impl RunManifest {
    /// Creates an empty manifest stamped with the current time.
    pub fn new(tool_version: impl Into<String>) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            tool_version: tool_version.into(),
            generated_at: Utc::now().to_rfc3339(),
            inputs: BTreeMap::new(),
            run_actions: BTreeSet::new(),
            report_digest: String::new(),
            counts: SeverityCounts::default(),
        }
    }

    /// Loads a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::LoadError::IoError) if the file cannot be
    /// read, or [`JsonError`](crate::LoadError::JsonError) if the content is
    /// not valid manifest JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let manifest = serde_json::from_reader(reader)?;
        Ok(manifest)
    }

    /// Saves the manifest as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::LoadError::IoError) if the file cannot be
    /// written, or [`JsonError`](crate::LoadError::JsonError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Computes the SHA-256 hex digest of a file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::LoadError::IoError) if the file cannot be
    /// read.
    pub fn calculate_checksum(path: impl AsRef<Path>) -> Result<String> {
        let bytes = std::fs::read(path)?;
        let hash = Sha256::digest(&bytes);
        Ok(format!("{:x}", hash))
    }

    /// Computes the SHA-256 hex digest of a report's compact JSON form.
    ///
    /// Reports serialize deterministically, so equal reports always share a
    /// digest.
    ///
    /// # Errors
    ///
    /// Returns [`JsonError`](crate::LoadError::JsonError) if serialization
    /// fails.
    pub fn digest_report(report: &RunReport) -> Result<String> {
        let json = serde_json::to_vec(report)?;
        Ok(format!("{:x}", Sha256::digest(&json)))
    }

    /// Checksums `path` and records it as an input of this run.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::LoadError::IoError) if the file cannot be
    /// read.
    pub fn record_input(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let checksum = Self::calculate_checksum(path)?;
        self.inputs.insert(path.display().to_string(), checksum);
        Ok(())
    }

    /// Records the report's digest and severity counts.
    ///
    /// # Errors
    ///
    /// See [`digest_report`](Self::digest_report).
    pub fn record_report(&mut self, report: &RunReport) -> Result<()> {
        self.report_digest = Self::digest_report(report)?;
        self.counts = report.counts;
        Ok(())
    }

    /// Returns `true` if `report` is the one this manifest was written for.
    pub fn matches_report(&self, report: &RunReport) -> bool {
        Self::digest_report(report).is_ok_and(|digest| digest == self.report_digest)
    }

    /// Returns the input paths that differ between `self` and `other`.
    ///
    /// An input has changed if it appears in only one manifest or its
    /// checksum differs. The result is sorted.
    ///
    /// # Examples
    ///
    /// ```
    /// use catalog_merge_db::RunManifest;
    ///
    /// let mut old = RunManifest::new("0.1.0");
    /// old.inputs.insert("catalog.json".into(), "abc".into());
    /// old.inputs.insert("rmc.json".into(), "def".into());
    ///
    /// let mut new = RunManifest::new("0.1.0");
    /// new.inputs.insert("catalog.json".into(), "abc".into());
    /// new.inputs.insert("rmc.json".into(), "123".into());
    /// new.inputs.insert("scorecard.json".into(), "456".into());
    ///
    /// assert_eq!(old.changed_inputs(&new), vec!["rmc.json", "scorecard.json"]);
    /// ```
    pub fn changed_inputs(&self, other: &RunManifest) -> Vec<String> {
        let paths: BTreeSet<&String> = self.inputs.keys().chain(other.inputs.keys()).collect();
        paths
            .into_iter()
            .filter(|path| self.inputs.get(*path) != other.inputs.get(*path))
            .cloned()
            .collect()
    }
}
