//! Per-entity validation issue streams.
//!
//! Every phase of a run attaches its findings to the record they concern.
//! Issues are values: they are appended, tagged once at construction time
//! through an [`IssueHandle`], and never rewritten afterwards.
//!
//! # Example
//!
//! ```
//! use catalog_merge_core::{IssueTag, RunAction, Severity, ValidationStream};
//!
//! let mut stream = ValidationStream::default();
//! stream
//!     .add_issue(Severity::Severe, "Composite child not found", format_args!("child {}", "is.volume"))
//!     .tag_crn()
//!     .tag_run_action(RunAction::Rmc);
//!
//! let issue = &stream.issues()[0];
//! assert_eq!(issue.detail, "child is.volume");
//! assert!(issue.has_tag(IssueTag::Crn));
//! assert_eq!(stream.count(Severity::Severe), 1);
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RunAction;

/// Severity of a validation issue, ordered from least to most serious.
///
/// `Severe` means data correctness is suspected, `Critical` means it is
/// known to be damaged. `Info` records that a check passed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Severe,
    Critical,
}

impl Severity {
    /// All severities in ascending order.
    pub const ALL: [Severity; 4] = [
        Severity::Info,
        Severity::Warning,
        Severity::Severe,
        Severity::Critical,
    ];
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Severe => "SEVERE",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "severe" => Ok(Severity::Severe),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Content tag attached to an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueTag {
    /// Concerns CRN naming or identity.
    Crn,
    /// Concerns composite catalog entries and their children.
    CatalogComposite,
    /// Raised while folding duplicate records.
    DuplicateNames,
    /// Concerns an environment record.
    Environment,
    /// Only meaningful when the given run action is enabled.
    RunAction(RunAction),
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub title: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<IssueTag>,
}

impl ValidationIssue {
    pub fn has_tag(&self, tag: IssueTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Run actions this issue is gated on.
    pub fn run_actions(&self) -> impl Iterator<Item = RunAction> + '_ {
        self.tags.iter().filter_map(|tag| match tag {
            IssueTag::RunAction(action) => Some(*action),
            _ => None,
        })
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.severity, self.title, self.detail)
    }
}

/// Append-only list of issues attached to one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationStream {
    issues: Vec<ValidationIssue>,
}

impl ValidationStream {
    /// Formats `detail` and appends a new issue, returning a handle for tagging.
    pub fn add_issue(
        &mut self,
        severity: Severity,
        title: &str,
        detail: fmt::Arguments<'_>,
    ) -> IssueHandle<'_> {
        self.push(ValidationIssue {
            severity,
            title: title.to_string(),
            detail: detail.to_string(),
            tags: BTreeSet::new(),
        })
    }

    /// Like [`add_issue`](Self::add_issue), but skips the issue when one with
    /// the same title and detail is already present.
    pub fn add_issue_ignore_dup(
        &mut self,
        severity: Severity,
        title: &str,
        detail: fmt::Arguments<'_>,
    ) -> Option<IssueHandle<'_>> {
        let detail = detail.to_string();
        if self
            .issues
            .iter()
            .any(|issue| issue.title == title && issue.detail == detail)
        {
            return None;
        }
        Some(self.push(ValidationIssue {
            severity,
            title: title.to_string(),
            detail,
            tags: BTreeSet::new(),
        }))
    }

    fn push(&mut self, issue: ValidationIssue) -> IssueHandle<'_> {
        self.issues.push(issue);
        let last = self.issues.len() - 1;
        IssueHandle {
            issue: &mut self.issues[last],
        }
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Number of issues at exactly `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .count()
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|issue| issue.severity).max()
    }

    pub fn with_title<'a>(&'a self, title: &'a str) -> impl Iterator<Item = &'a ValidationIssue> {
        self.issues.iter().filter(move |issue| issue.title == title)
    }
}

/// Fluent tagging handle for a freshly appended issue.
pub struct IssueHandle<'a> {
    issue: &'a mut ValidationIssue,
}

impl<'a> IssueHandle<'a> {
    pub fn tag(self, tag: IssueTag) -> Self {
        self.issue.tags.insert(tag);
        self
    }

    pub fn tag_crn(self) -> Self {
        self.tag(IssueTag::Crn)
    }

    pub fn tag_catalog_composite(self) -> Self {
        self.tag(IssueTag::CatalogComposite)
    }

    pub fn tag_duplicate_names(self) -> Self {
        self.tag(IssueTag::DuplicateNames)
    }

    pub fn tag_environment(self) -> Self {
        self.tag(IssueTag::Environment)
    }

    pub fn tag_run_action(self, action: RunAction) -> Self {
        self.tag(IssueTag::RunAction(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_issue_formats_detail_eagerly() {
        let mut stream = ValidationStream::default();
        let name = String::from("is.volume");
        stream.add_issue(Severity::Info, "ok", format_args!("child {name} has no issues"));
        drop(name);

        assert_eq!(stream.issues()[0].detail, "child is.volume has no issues");
        assert_eq!(stream.len(), 1);
    }

    #[test]
    fn test_fluent_tagging() {
        let mut stream = ValidationStream::default();
        stream
            .add_issue(Severity::Critical, "t", format_args!("d"))
            .tag_crn()
            .tag_catalog_composite()
            .tag_run_action(RunAction::Rmc);

        let issue = &stream.issues()[0];
        assert!(issue.has_tag(IssueTag::Crn));
        assert!(issue.has_tag(IssueTag::CatalogComposite));
        assert_eq!(issue.run_actions().collect::<Vec<_>>(), vec![RunAction::Rmc]);
    }

    #[test]
    fn test_add_issue_ignore_dup() {
        let mut stream = ValidationStream::default();
        assert!(
            stream
                .add_issue_ignore_dup(Severity::Warning, "t", format_args!("d"))
                .is_some()
        );
        assert!(
            stream
                .add_issue_ignore_dup(Severity::Severe, "t", format_args!("d"))
                .is_none()
        );
        assert!(
            stream
                .add_issue_ignore_dup(Severity::Warning, "t", format_args!("other"))
                .is_some()
        );
        assert_eq!(stream.len(), 2);
    }

    #[test]
    fn test_counts_and_max_severity() {
        let mut stream = ValidationStream::default();
        assert_eq!(stream.max_severity(), None);
        stream.add_issue(Severity::Info, "a", format_args!(""));
        stream.add_issue(Severity::Severe, "b", format_args!(""));
        stream.add_issue(Severity::Severe, "c", format_args!(""));

        assert_eq!(stream.count(Severity::Severe), 2);
        assert_eq!(stream.count(Severity::Critical), 0);
        assert_eq!(stream.max_severity(), Some(Severity::Severe));
    }

    #[test]
    fn test_severity_parse_and_order() {
        assert_eq!("warn".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("CRITICAL".parse::<Severity>(), Ok(Severity::Critical));
        assert!("fatal".parse::<Severity>().is_err());
        assert!(Severity::Info < Severity::Critical);
        assert_eq!(Severity::Severe.to_string(), "SEVERE");
    }
}
