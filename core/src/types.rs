//! Record type definitions for services, environments and their sources.
//!
//! Source records are produced by the upstream loaders and routed into
//! [`ServiceRecord`]s and [`EnvironmentRecord`]s by the ingestion phase.
//! All types round-trip through serde so snapshots can be stored as JSON or
//! YAML.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CrnMask, RunAction, RunActions, ValidationStream};

/// Catalog kind of a composite parent entry.
pub const COMPOSITE_KIND: &str = "composite";

/// Upstream system a source record came from.
///
/// # Examples
///
/// ```
/// use catalog_merge_core::SourceKind;
///
/// assert_eq!(SourceKind::MainCatalog.to_string(), "catalog");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    #[serde(rename = "catalog")]
    MainCatalog,
    IgnoredMainCatalog,
    Scorecard,
    #[serde(rename = "servicenow")]
    ServiceNow,
    Rmc,
    Doctor,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SourceKind::MainCatalog => "catalog",
            SourceKind::IgnoredMainCatalog => "ignored-catalog",
            SourceKind::Scorecard => "scorecard",
            SourceKind::ServiceNow => "servicenow",
            SourceKind::Rmc => "rmc",
            SourceKind::Doctor => "doctor",
        };
        f.write_str(label)
    }
}

/// A child declared by a composite catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeChild {
    /// Exact catalog name of the child (e.g. `is.volume`).
    pub name: String,
    /// Expected catalog kind of the child.
    pub kind: String,
}

/// Composite declaration carried by a catalog entry of kind `composite`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeDecl {
    /// Kind every child must have.
    pub composite_kind: String,
    /// Tag every child must carry.
    pub composite_tag: String,
    #[serde(default)]
    pub children: Vec<CompositeChild>,
}

/// A main-catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Catalog resource id.
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<CompositeDecl>,
    /// Entry exists in the catalog but is excluded from publication.
    #[serde(default)]
    pub ignored: bool,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub plans: Vec<String>,
    /// Free-form metadata not interpreted by the engine.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Catalog metadata aggregated over every catalog entry folded into a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogExtra {
    pub locations: BTreeSet<String>,
    pub plans: BTreeSet<String>,
}

impl CatalogExtra {
    pub fn from_entry(entry: &CatalogEntry) -> Self {
        Self {
            locations: entry.locations.iter().cloned().collect(),
            plans: entry.plans.iter().cloned().collect(),
        }
    }

    pub fn merge(&mut self, other: CatalogExtra) {
        self.locations.extend(other.locations);
        self.plans.extend(other.plans);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorecardEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tribe: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNowEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_tier: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RmcEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Reference name of the composite parent according to RMC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_composite_service: Option<String>,
}

impl RmcEntry {
    /// Declared parent, treating an empty string as absent.
    pub fn declared_parent(&self) -> Option<&str> {
        self.parent_composite_service
            .as_deref()
            .filter(|parent| !parent.is_empty())
    }
}

/// Per-service merge configuration.
///
/// # Examples
///
/// ```
/// use catalog_merge_core::MergeControl;
///
/// let mut control = MergeControl {
///     canonical_name: "object-storage".into(),
///     ..Default::default()
/// };
/// assert!(control.is_empty());
/// control.notes = "kept for history".into();
/// assert!(control.is_empty_except_notes());
/// assert!(!control.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeControl {
    #[serde(default)]
    pub canonical_name: String,
    /// Names of other records that should fold into this one.
    #[serde(default)]
    pub raw_duplicate_names: Vec<String>,
    /// Names that must never fold by comparable name.
    #[serde(default)]
    pub do_not_merge_names: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl MergeControl {
    /// No merge configuration and no notes. The name the control is filed
    /// under is not configuration.
    pub fn is_empty(&self) -> bool {
        self.is_empty_except_notes() && self.notes.is_empty()
    }

    /// No duplicate names and no do-not-merge names.
    pub fn is_empty_except_notes(&self) -> bool {
        self.raw_duplicate_names.is_empty() && self.do_not_merge_names.is_empty()
    }
}

/// Product information published with a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    #[serde(default)]
    pub part_numbers: Vec<String>,
    /// Timestamp of the last part-number refresh; empty forces a refresh.
    #[serde(default)]
    pub part_numbers_refreshed: String,
    #[serde(default)]
    pub product_ids: Vec<String>,
    #[serde(default)]
    pub clearing_house_references: Vec<String>,
}

impl ProductInfo {
    /// Clears everything so it is recomputed on the next publication.
    pub fn reset(&mut self) {
        self.part_numbers_refreshed.clear();
        self.part_numbers.clear();
        self.product_ids.clear();
        self.clearing_house_references.clear();
    }
}

/// A service record as published by a previous run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorOss {
    pub reference_resource_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub product_info: ProductInfo,
}

/// Scratch state recomputed on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkArea {
    /// Reference name of the composite parent that lists this record.
    pub composite_parent: Option<String>,
}

/// One logical service, merged from every source that describes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Map key, derived from the reference resource name.
    pub comparable_name: String,
    pub reference_resource_name: String,
    pub display_name: String,

    pub source_main_catalog: Option<CatalogEntry>,
    #[serde(default)]
    pub additional_main_catalog: Vec<CatalogEntry>,
    pub catalog_extra: Option<CatalogExtra>,
    pub ignored_main_catalog: Option<CatalogEntry>,

    pub source_scorecard: Option<ScorecardEntry>,
    #[serde(default)]
    pub additional_scorecard: Vec<ScorecardEntry>,

    pub source_servicenow: Option<ServiceNowEntry>,
    #[serde(default)]
    pub additional_servicenow: Vec<ServiceNowEntry>,

    pub source_rmc: Option<RmcEntry>,

    pub prior_oss: Option<PriorOss>,
    pub merge_control: Option<MergeControl>,

    #[serde(default)]
    pub validation: ValidationStream,
    #[serde(default)]
    pub work_area: WorkArea,

    /// Comparable name of the surviving record once this one was folded.
    pub duplicate_of: Option<String>,
}

impl ServiceRecord {
    pub fn new(comparable_name: impl Into<String>) -> Self {
        Self {
            comparable_name: comparable_name.into(),
            ..Default::default()
        }
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }

    /// Returns `true` if any live upstream source describes this service.
    ///
    /// Merge control, prior state and ignored catalog entries do not count.
    pub fn has_real_sources(&self) -> bool {
        self.source_main_catalog.is_some()
            || self.source_scorecard.is_some()
            || self.source_servicenow.is_some()
            || self.source_rmc.is_some()
    }

    /// Kinds of the direct sources present, in a fixed order.
    pub fn source_kinds(&self) -> Vec<SourceKind> {
        let mut kinds = Vec::new();
        if self.source_main_catalog.is_some() {
            kinds.push(SourceKind::MainCatalog);
        }
        if self.ignored_main_catalog.is_some() {
            kinds.push(SourceKind::IgnoredMainCatalog);
        }
        if self.source_scorecard.is_some() {
            kinds.push(SourceKind::Scorecard);
        }
        if self.source_servicenow.is_some() {
            kinds.push(SourceKind::ServiceNow);
        }
        if self.source_rmc.is_some() {
            kinds.push(SourceKind::Rmc);
        }
        kinds
    }

    /// Number of sources folded in beyond the direct ones.
    pub fn additional_source_count(&self) -> usize {
        self.additional_main_catalog.len()
            + self.additional_scorecard.len()
            + self.additional_servicenow.len()
    }

    /// The name this record's own sources use for it.
    pub fn own_service_name(&self) -> &str {
        self.source_main_catalog
            .as_ref()
            .map(|s| s.name.as_str())
            .or_else(|| self.source_scorecard.as_ref().map(|s| s.name.as_str()))
            .or_else(|| self.source_servicenow.as_ref().map(|s| s.name.as_str()))
            .or_else(|| self.source_rmc.as_ref().map(|s| s.name.as_str()))
            .or_else(|| self.ignored_main_catalog.as_ref().map(|s| s.name.as_str()))
            .unwrap_or(&self.reference_resource_name)
    }
}

/// An environment entry from the main catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEnvironment {
    pub id: String,
    pub crn_mask: CrnMask,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_mccp_id: Option<String>,
}

/// An environment entry from Doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorEnvironment {
    pub name: String,
    pub crn_mask: CrnMask,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_mccp_id: Option<String>,
}

/// An environment record as published by a previous run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorEnvironment {
    pub crn_mask: CrnMask,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// One environment, keyed by its comparable CRN mask.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub comparable_crn_mask: CrnMask,
    pub display_name: String,

    pub source_main_catalog: Option<CatalogEnvironment>,
    #[serde(default)]
    pub additional_main_catalog: Vec<CatalogEnvironment>,

    pub source_doctor: Option<DoctorEnvironment>,
    #[serde(default)]
    pub additional_doctor: Vec<DoctorEnvironment>,

    pub prior_oss: Option<PriorEnvironment>,

    #[serde(default)]
    pub validation: ValidationStream,
}

impl EnvironmentRecord {
    pub fn new(comparable_crn_mask: CrnMask) -> Self {
        Self {
            comparable_crn_mask,
            ..Default::default()
        }
    }

    pub fn source_kinds(&self) -> Vec<SourceKind> {
        let mut kinds = Vec::new();
        if self.source_main_catalog.is_some() {
            kinds.push(SourceKind::MainCatalog);
        }
        if self.source_doctor.is_some() {
            kinds.push(SourceKind::Doctor);
        }
        kinds
    }

    /// Returns `true` if a previously published environment has vanished
    /// from every live source.
    ///
    /// When Doctor was not loaded its absence proves nothing, so nothing is
    /// deletable.
    ///
    /// # Examples
    ///
    /// ```
    /// use catalog_merge_core::*;
    ///
    /// let mask: CrnMask = "crn:v1:bluemix:public::us-south::::".parse().unwrap();
    /// let mut env = EnvironmentRecord::new(mask.clone());
    /// env.prior_oss = Some(PriorEnvironment { crn_mask: mask, display_name: None });
    ///
    /// assert!(env.is_deletable(&RunActions::default()));
    /// assert!(!env.is_deletable(&RunActions::default().with(RunAction::DoctorDisabled)));
    /// ```
    pub fn is_deletable(&self, actions: &RunActions) -> bool {
        self.prior_oss.is_some()
            && self.source_main_catalog.is_none()
            && self.source_doctor.is_none()
            && !actions.is_enabled(RunAction::DoctorDisabled)
    }
}
