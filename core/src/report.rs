//! Aggregated run report.
//!
//! The report is a plain serializable snapshot of the model after a run:
//! per-severity counts plus one summary per live service and environment.
//! Everything is sorted by key and carries no timestamps, so two runs over
//! the same input produce byte-identical reports.

use serde::{Deserialize, Serialize};

use crate::{
    Absorption, CrnMask, FoldSummary, Model, RunActions, Severity, SourceKind, ValidationIssue,
};

/// Issue counts by severity.
///
/// Issues gated on a run action that is not enabled are counted as
/// `suppressed` instead of under their severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub info: usize,
    pub warning: usize,
    pub severe: usize,
    pub critical: usize,
    pub suppressed: usize,
}

impl SeverityCounts {
    fn record(&mut self, issue: &ValidationIssue, actions: &RunActions) {
        if issue.run_actions().any(|action| !actions.is_enabled(action)) {
            self.suppressed += 1;
            return;
        }
        match issue.severity {
            Severity::Info => self.info += 1,
            Severity::Warning => self.warning += 1,
            Severity::Severe => self.severe += 1,
            Severity::Critical => self.critical += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Info => self.info,
            Severity::Warning => self.warning,
            Severity::Severe => self.severe,
            Severity::Critical => self.critical,
        }
    }

    /// Total counted issues, excluding suppressed ones.
    pub fn total(&self) -> usize {
        self.info + self.warning + self.severe + self.critical
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub comparable_name: String,
    pub reference_resource_name: String,
    pub display_name: String,
    pub sources: Vec<SourceKind>,
    #[serde(default)]
    pub additional_sources: usize,
    /// Comparable names of the records folded into this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite_parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSummary {
    pub crn_mask: CrnMask,
    pub display_name: String,
    pub sources: Vec<SourceKind>,
    #[serde(default)]
    pub deletable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}

/// A record folded into another one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub comparable_name: String,
    pub reference_resource_name: String,
    pub duplicate_of: String,
}

/// Outcome of a complete run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub counts: SeverityCounts,
    pub services: Vec<ServiceSummary>,
    pub environments: Vec<EnvironmentSummary>,
    #[serde(default)]
    pub tombstones: Vec<Tombstone>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registry_conflicts: Vec<String>,
}

impl RunReport {
    /// Snapshots `model`, listing only issues at or above `min_severity`.
    pub fn build(
        model: &Model,
        fold: &FoldSummary,
        actions: &RunActions,
        min_severity: Severity,
    ) -> Self {
        let mut report = RunReport::default();
        let shown = |issues: &[ValidationIssue]| -> Vec<ValidationIssue> {
            issues
                .iter()
                .filter(|issue| issue.severity >= min_severity)
                .cloned()
                .collect()
        };

        for record in model.list_all_services(None) {
            if let Some(primary) = &record.duplicate_of {
                report.tombstones.push(Tombstone {
                    comparable_name: record.comparable_name.clone(),
                    reference_resource_name: record.reference_resource_name.clone(),
                    duplicate_of: primary.clone(),
                });
                continue;
            }
            for issue in record.validation.issues() {
                report.counts.record(issue, actions);
            }
            report.services.push(ServiceSummary {
                comparable_name: record.comparable_name.clone(),
                reference_resource_name: record.reference_resource_name.clone(),
                display_name: record.display_name.clone(),
                sources: record.source_kinds(),
                additional_sources: record.additional_source_count(),
                duplicates: absorbed_into(&fold.absorbed, &record.comparable_name),
                composite_parent: record.work_area.composite_parent.clone(),
                issues: shown(record.validation.issues()),
            });
        }

        for record in model.list_all_environments() {
            for issue in record.validation.issues() {
                report.counts.record(issue, actions);
            }
            report.environments.push(EnvironmentSummary {
                crn_mask: record.comparable_crn_mask.clone(),
                display_name: record.display_name.clone(),
                sources: record.source_kinds(),
                deletable: record.is_deletable(actions),
                issues: shown(record.validation.issues()),
            });
        }

        report
    }

    /// Highest severity counted in the report.
    pub fn max_severity(&self) -> Option<Severity> {
        Severity::ALL
            .into_iter()
            .rev()
            .find(|severity| self.counts.get(*severity) > 0)
    }

    pub fn service(&self, comparable_name: &str) -> Option<&ServiceSummary> {
        self.services
            .iter()
            .find(|summary| summary.comparable_name == comparable_name)
    }
}

fn absorbed_into(absorbed: &[Absorption], primary: &str) -> Vec<String> {
    let mut names: Vec<String> = absorbed
        .iter()
        .filter(|a| a.primary == primary)
        .map(|a| a.duplicate.clone())
        .collect();
    names.sort_unstable();
    names
}
