//! Phase runner.
//!
//! [`run`] drives a populated [`Model`] through every phase in a fixed
//! order and snapshots the result. Phases never overlap: each one sees the
//! complete output of the previous one.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::composite::validate_composites;
use crate::error::EngineError;
use crate::merge::fold_duplicates;
use crate::validate::{validate_environments, validate_names};
use crate::{Model, RunActions, RunReport, Severity};

/// Registry owner recorded for do-not-merge names that come from run
/// configuration rather than a merge-control record.
pub const CONFIG_OWNER: &str = "config";

/// Settings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub run_actions: RunActions,
    /// Extra exempt names. Register them with
    /// [`Model::register_do_not_merge`] before ingesting so that records are
    /// keyed by them.
    pub do_not_merge: Vec<String>,
    /// Lowest severity listed in the report.
    pub min_severity: Severity,
}

/// Runs every phase over `model` and returns the report.
///
/// # Errors
///
/// Returns the [`EngineError`] of duplicate folding. Validation never fails;
/// it only records issues.
///
/// # Examples
///
/// ```
/// use catalog_merge_core::*;
///
/// let mut model = Model::new();
/// model.ingest(SourceBundle {
///     catalog: vec![CatalogEntry {
///         name: "Object Storage".into(),
///         kind: "service".into(),
///         ..Default::default()
///     }],
///     ..Default::default()
/// });
///
/// let report = run(&mut model, &RunOptions::default()).unwrap();
/// assert_eq!(report.services.len(), 1);
/// assert_eq!(report.counts.warning, 1);
/// ```
pub fn run(model: &mut Model, options: &RunOptions) -> Result<RunReport, EngineError> {
    model.reset_work_areas();

    let mut conflicts = model.register_do_not_merge(
        CONFIG_OWNER,
        options.do_not_merge.iter().map(String::as_str),
    );
    let controls: Vec<(String, Vec<String>)> = model
        .list_all_services(None)
        .filter_map(|record| record.merge_control.as_ref())
        .map(|control| {
            (
                control.canonical_name.clone(),
                control.do_not_merge_names.clone(),
            )
        })
        .collect();
    for (owner, names) in &controls {
        conflicts.extend(model.register_do_not_merge(owner, names.iter().map(String::as_str)));
    }

    let fold = fold_duplicates(model)?;
    let name_issues = validate_names(model);
    validate_composites(model);
    let environment_issues = validate_environments(model);

    let mut report = RunReport::build(model, &fold, &options.run_actions, options.min_severity);
    report.registry_conflicts = conflicts.iter().map(ToString::to_string).collect();

    info!(
        services = report.services.len(),
        environments = report.environments.len(),
        absorbed = fold.absorbed.len(),
        name_issues,
        environment_issues,
        critical = report.counts.critical,
        severe = report.counts.severe,
        "run complete"
    );
    Ok(report)
}
