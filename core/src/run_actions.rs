//! Run-action toggles supplied by the surrounding tool.
//!
//! The engine never changes what it validates based on these toggles. They
//! gate which tagged issues count toward a run's totals and whether an
//! environment may be considered deletable.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single run-action toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunAction {
    /// RMC data is authoritative for this run.
    Rmc,
    /// Doctor data was not loaded for this run.
    DoctorDisabled,
}

impl fmt::Display for RunAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunAction::Rmc => f.write_str("rmc"),
            RunAction::DoctorDisabled => f.write_str("doctor-disabled"),
        }
    }
}

impl FromStr for RunAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rmc" => Ok(RunAction::Rmc),
            "doctor-disabled" | "doctor_disabled" => Ok(RunAction::DoctorDisabled),
            other => Err(format!("unknown run action: {other}")),
        }
    }
}

/// The set of run actions enabled for one run.
///
/// # Examples
///
/// ```
/// use catalog_merge_core::{RunAction, RunActions};
///
/// let actions = RunActions::default().with(RunAction::Rmc);
/// assert!(actions.is_enabled(RunAction::Rmc));
/// assert!(!actions.is_enabled(RunAction::DoctorDisabled));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunActions {
    enabled: BTreeSet<RunAction>,
}

impl RunActions {
    pub fn with(mut self, action: RunAction) -> Self {
        self.enabled.insert(action);
        self
    }

    pub fn enable(&mut self, action: RunAction) {
        self.enabled.insert(action);
    }

    pub fn is_enabled(&self, action: RunAction) -> bool {
        self.enabled.contains(&action)
    }

    pub fn iter(&self) -> impl Iterator<Item = RunAction> + '_ {
        self.enabled.iter().copied()
    }
}

impl FromIterator<RunAction> for RunActions {
    fn from_iter<I: IntoIterator<Item = RunAction>>(iter: I) -> Self {
        Self {
            enabled: iter.into_iter().collect(),
        }
    }
}
