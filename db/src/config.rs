//! Run configuration for catalog merge batches.
//!
//! Defines the YAML-serializable configuration that selects run actions,
//! extra do-not-merge names and report verbosity.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! run_actions:
//!   - rmc
//! do_not_merge:
//!   - ibm-cloud-foo
//! report:
//!   min_severity: warning
//! ```

use std::collections::BTreeSet;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use catalog_merge_core::{RunAction, RunActions, RunOptions, Severity};
use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};

/// Config format versions this crate understands.
const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Settings for the written report.
///
/// # Examples
///
/// ```
/// # use catalog_merge_db::ReportConfig;
/// # use catalog_merge_core::Severity;
/// let report = ReportConfig::default();
/// assert_eq!(report.min_severity, Severity::Info);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Lowest severity listed per record. Counts always cover every issue.
    pub min_severity: Severity,
}

/// Top-level run configuration.
///
/// Loaded from a YAML file (typically `catalog-merge.yml`) to control a
/// batch run.
///
/// # Examples
///
/// ```no_run
/// use catalog_merge_db::RunConfig;
///
/// let config = RunConfig::load("catalog-merge.yml").unwrap();
/// let options = config.run_options();
/// println!("{} extra do-not-merge names", options.do_not_merge.len());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    /// Run actions enabled for every run using this config.
    #[serde(default)]
    pub run_actions: BTreeSet<RunAction>,
    /// Names exempt from comparable-name folding.
    #[serde(default)]
    pub do_not_merge: Vec<String>,
    #[serde(default)]
    pub report: ReportConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            run_actions: BTreeSet::new(),
            do_not_merge: Vec::new(),
            report: ReportConfig::default(),
        }
    }
}

impl RunConfig {
    /// Loads and validates configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::LoadError::IoError) if the file cannot be
    /// read, [`YamlError`](crate::LoadError::YamlError) if parsing fails, or
    /// [`InvalidConfig`](crate::LoadError::InvalidConfig) if
    /// [`validate`](Self::validate) rejects it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config: RunConfig = serde_yaml::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::LoadError::IoError) if the file cannot be
    /// written, or [`YamlError`](crate::LoadError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Checks the version and the do-not-merge list.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`](crate::LoadError::InvalidConfig) for an
    /// unsupported version, a blank name, or a name listed twice.
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            return Err(LoadError::InvalidConfig(format!(
                "unsupported version \"{}\" (supported: {})",
                self.version,
                SUPPORTED_VERSIONS.join(", ")
            )));
        }
        let mut seen = BTreeSet::new();
        for name in &self.do_not_merge {
            if name.trim().is_empty() {
                return Err(LoadError::InvalidConfig(
                    "do_not_merge contains a blank name".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(LoadError::InvalidConfig(format!(
                    "do_not_merge lists \"{name}\" more than once"
                )));
            }
        }
        Ok(())
    }

    /// Returns `true` if `action` is enabled by this config.
    pub fn is_enabled(&self, action: RunAction) -> bool {
        self.run_actions.contains(&action)
    }

    /// Resolves the engine options for a run.
    ///
    /// `extra_actions` come from the command line and are added to the ones
    /// the config enables.
    ///
    /// # Examples
    ///
    /// ```
    /// # use catalog_merge_db::RunConfig;
    /// # use catalog_merge_core::RunAction;
    /// let yaml = "version: \"1.0\"\nrun_actions: [doctor-disabled]\n";
    /// let config: RunConfig = serde_yaml::from_str(yaml).unwrap();
    /// let options = config.run_options_with([RunAction::Rmc]);
    /// assert!(options.run_actions.is_enabled(RunAction::Rmc));
    /// assert!(options.run_actions.is_enabled(RunAction::DoctorDisabled));
    /// ```
    pub fn run_options_with(
        &self,
        extra_actions: impl IntoIterator<Item = RunAction>,
    ) -> RunOptions {
        let run_actions: RunActions = self
            .run_actions
            .iter()
            .copied()
            .chain(extra_actions)
            .collect();
        RunOptions {
            run_actions,
            do_not_merge: self.do_not_merge.clone(),
            min_severity: self.report.min_severity,
        }
    }

    pub fn run_options(&self) -> RunOptions {
        self.run_options_with(std::iter::empty::<RunAction>())
    }
}
