//! Routing of loader output into the model.
//!
//! Upstream loaders are opaque producers; whatever they fetched is handed to
//! the engine as a [`SourceBundle`]. [`Model::ingest`] files every source
//! record under the service or environment its name resolves to.
//!
//! Merge-control records are routed first because they populate the
//! do-not-merge registry, which changes how every later name is keyed.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::names::convert_composite_to_canonical;
use crate::{
    CatalogEntry, CatalogEnvironment, CatalogExtra, DoNotMergeConflict, DoctorEnvironment,
    MergeControl, Model, PriorEnvironment, PriorOss, RmcEntry, ScorecardEntry, ServiceNowEntry,
    ServiceRecord, Severity,
};

const TITLE_EXTRA_SOURCE: &str = "Multiple source records for one service";
const TITLE_EXTRA_IGNORED: &str = "Multiple ignored catalog entries";
const TITLE_EXTRA_RMC: &str = "Multiple RMC records for one service";
const TITLE_EXTRA_ENV_SOURCE: &str = "Multiple source records for one environment";
const TITLE_DUPLICATE_CATALOG_ID: &str = "Duplicate catalog resource id";

/// Everything the upstream loaders produced for one run.
///
/// # Examples
///
/// ```
/// use catalog_merge_core::*;
///
/// let bundle: SourceBundle = serde_json::from_str(r#"{
///     "catalog": [{"name": "Cloud Object Storage", "kind": "service"}],
///     "scorecard": [{"name": "cloud-object-storage"}]
/// }"#).unwrap();
///
/// let mut model = Model::new();
/// model.ingest(bundle);
///
/// let record = model.service("cloudobjectstorage").unwrap();
/// assert_eq!(record.reference_resource_name, "cloud-object-storage");
/// assert!(record.source_main_catalog.is_some());
/// assert!(record.source_scorecard.is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceBundle {
    pub catalog: Vec<CatalogEntry>,
    pub scorecard: Vec<ScorecardEntry>,
    pub servicenow: Vec<ServiceNowEntry>,
    pub rmc: Vec<RmcEntry>,
    pub merge_control: Vec<MergeControl>,
    pub prior_oss: Vec<PriorOss>,
    pub catalog_environments: Vec<CatalogEnvironment>,
    pub doctor_environments: Vec<DoctorEnvironment>,
    pub prior_environments: Vec<PriorEnvironment>,
}

impl SourceBundle {
    /// Appends every record of `other`, keeping order.
    pub fn extend(&mut self, other: SourceBundle) {
        self.catalog.extend(other.catalog);
        self.scorecard.extend(other.scorecard);
        self.servicenow.extend(other.servicenow);
        self.rmc.extend(other.rmc);
        self.merge_control.extend(other.merge_control);
        self.prior_oss.extend(other.prior_oss);
        self.catalog_environments.extend(other.catalog_environments);
        self.doctor_environments.extend(other.doctor_environments);
        self.prior_environments.extend(other.prior_environments);
    }

    /// Total number of records across all sources.
    pub fn len(&self) -> usize {
        self.catalog.len()
            + self.scorecard.len()
            + self.servicenow.len()
            + self.rmc.len()
            + self.merge_control.len()
            + self.prior_oss.len()
            + self.catalog_environments.len()
            + self.doctor_environments.len()
            + self.prior_environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Puts `entry` in the direct slot, or in the overflow list when taken.
///
/// Returns `true` when the entry overflowed.
fn fill_slot<T>(slot: &mut Option<T>, additional: &mut Vec<T>, entry: T) -> bool {
    if slot.is_some() {
        additional.push(entry);
        true
    } else {
        *slot = Some(entry);
        false
    }
}

impl Model {
    /// Routes every record of `bundle` into the model.
    ///
    /// Returns the do-not-merge conflicts raised by merge-control records.
    pub fn ingest(&mut self, bundle: SourceBundle) -> Vec<DoNotMergeConflict> {
        let total = bundle.len();
        let mut conflicts = Vec::new();

        for control in &bundle.merge_control {
            conflicts.extend(self.register_do_not_merge(
                &control.canonical_name,
                control.do_not_merge_names.iter().map(String::as_str),
            ));
        }
        for control in bundle.merge_control {
            self.ingest_merge_control(control);
        }
        for entry in bundle.catalog {
            self.ingest_catalog(entry);
        }
        for entry in bundle.scorecard {
            self.ingest_scorecard(entry);
        }
        for entry in bundle.servicenow {
            self.ingest_servicenow(entry);
        }
        for entry in bundle.rmc {
            self.ingest_rmc(entry);
        }
        for prior in bundle.prior_oss {
            self.ingest_prior_oss(prior);
        }
        for entry in bundle.catalog_environments {
            self.ingest_catalog_environment(entry);
        }
        for entry in bundle.doctor_environments {
            self.ingest_doctor_environment(entry);
        }
        for prior in bundle.prior_environments {
            self.ingest_prior_environment(prior);
        }

        info!(
            records = total,
            services = self.services_len(),
            environments = self.environments_len(),
            "ingested source bundle"
        );
        conflicts
    }

    /// Finds or creates the record for a raw source name.
    fn service_for_name(&mut self, raw_name: &str) -> &mut ServiceRecord {
        let key = self.comparable_name(raw_name);
        let canonical = if self.do_not_merge().is_exempt(raw_name) {
            self.canonical_name(raw_name)
        } else {
            convert_composite_to_canonical(raw_name).0
        };
        let record = self.service_or_insert(&key);
        if record.reference_resource_name.is_empty() {
            record.reference_resource_name = canonical;
        }
        record
    }

    fn ingest_merge_control(&mut self, control: MergeControl) {
        let record = self.service_for_name(&control.canonical_name);
        debug!(key = %record.comparable_name, "routed merge control");
        match record.merge_control.as_mut() {
            Some(existing) => {
                existing.raw_duplicate_names.extend(control.raw_duplicate_names);
                existing.do_not_merge_names.extend(control.do_not_merge_names);
                if !control.notes.is_empty() {
                    if !existing.notes.is_empty() {
                        existing.notes.push('\n');
                    }
                    existing.notes.push_str(&control.notes);
                }
            }
            None => record.merge_control = Some(control),
        }
    }

    fn ingest_catalog(&mut self, entry: CatalogEntry) {
        let record = self.service_for_name(&entry.name);
        if record.display_name.is_empty() {
            record.display_name = entry
                .display_name
                .clone()
                .unwrap_or_else(|| entry.name.clone());
        }

        if entry.ignored {
            if record.ignored_main_catalog.is_some() {
                record
                    .validation
                    .add_issue(
                        Severity::Warning,
                        TITLE_EXTRA_IGNORED,
                        format_args!("ignored catalog entry {} ({}) dropped", entry.name, entry.id),
                    )
                    .tag_crn();
            } else {
                record.ignored_main_catalog = Some(entry);
            }
            return;
        }

        let extra = CatalogExtra::from_entry(&entry);
        match record.catalog_extra.as_mut() {
            Some(existing) => existing.merge(extra),
            None => record.catalog_extra = Some(extra),
        }

        let (name, id) = (entry.name.clone(), entry.id.clone());
        if fill_slot(
            &mut record.source_main_catalog,
            &mut record.additional_main_catalog,
            entry,
        ) {
            record
                .validation
                .add_issue(
                    Severity::Warning,
                    TITLE_EXTRA_SOURCE,
                    format_args!("additional catalog entry {name} ({id})"),
                )
                .tag_crn();
        }
    }

    fn ingest_scorecard(&mut self, entry: ScorecardEntry) {
        let record = self.service_for_name(&entry.name);
        if record.display_name.is_empty() {
            if let Some(display) = &entry.display_name {
                record.display_name = display.clone();
            }
        }
        let name = entry.name.clone();
        if fill_slot(
            &mut record.source_scorecard,
            &mut record.additional_scorecard,
            entry,
        ) {
            record.validation.add_issue(
                Severity::Warning,
                TITLE_EXTRA_SOURCE,
                format_args!("additional scorecard entry {name}"),
            );
        }
    }

    fn ingest_servicenow(&mut self, entry: ServiceNowEntry) {
        let record = self.service_for_name(&entry.name);
        if record.display_name.is_empty() {
            if let Some(display) = &entry.display_name {
                record.display_name = display.clone();
            }
        }
        let name = entry.name.clone();
        if fill_slot(
            &mut record.source_servicenow,
            &mut record.additional_servicenow,
            entry,
        ) {
            record.validation.add_issue(
                Severity::Warning,
                TITLE_EXTRA_SOURCE,
                format_args!("additional ServiceNow entry {name}"),
            );
        }
    }

    fn ingest_rmc(&mut self, entry: RmcEntry) {
        let record = self.service_for_name(&entry.name);
        if record.display_name.is_empty() {
            if let Some(display) = &entry.display_name {
                record.display_name = display.clone();
            }
        }
        if record.source_rmc.is_some() {
            record.validation.add_issue(
                Severity::Severe,
                TITLE_EXTRA_RMC,
                format_args!("RMC entry {} dropped", entry.name),
            );
            return;
        }
        record.source_rmc = Some(entry);
    }

    fn ingest_prior_oss(&mut self, prior: PriorOss) {
        let record = self.service_for_name(&prior.reference_resource_name);
        record.prior_oss = Some(prior);
    }

    fn ingest_catalog_environment(&mut self, entry: CatalogEnvironment) {
        let mask = entry.crn_mask.clone();
        if let Some(id) = &entry.legacy_mccp_id {
            self.register_legacy_mccp_id(id, &mask);
        }
        let duplicate_id = self.register_catalog_id(&entry.id, &mask).err();

        let record = self.environment_or_insert(&mask);
        if let Some(err) = duplicate_id {
            record
                .validation
                .add_issue(
                    Severity::Severe,
                    TITLE_DUPLICATE_CATALOG_ID,
                    format_args!("{err}"),
                )
                .tag_environment();
        }
        if record.display_name.is_empty() {
            record.display_name = entry
                .display_name
                .clone()
                .unwrap_or_else(|| entry.crn_mask.to_string());
        }
        let id = entry.id.clone();
        if fill_slot(
            &mut record.source_main_catalog,
            &mut record.additional_main_catalog,
            entry,
        ) {
            record
                .validation
                .add_issue(
                    Severity::Warning,
                    TITLE_EXTRA_ENV_SOURCE,
                    format_args!("additional catalog environment {id}"),
                )
                .tag_environment();
        }
    }

    fn ingest_doctor_environment(&mut self, entry: DoctorEnvironment) {
        let mask = entry.crn_mask.clone();
        if let Some(id) = &entry.legacy_mccp_id {
            self.register_legacy_mccp_id(id, &mask);
        }
        let record = self.environment_or_insert(&mask);
        if record.display_name.is_empty() {
            record.display_name = entry.name.clone();
        }
        let name = entry.name.clone();
        if fill_slot(
            &mut record.source_doctor,
            &mut record.additional_doctor,
            entry,
        ) {
            record
                .validation
                .add_issue(
                    Severity::Warning,
                    TITLE_EXTRA_ENV_SOURCE,
                    format_args!("additional Doctor environment {name}"),
                )
                .tag_environment();
        }
    }

    fn ingest_prior_environment(&mut self, prior: PriorEnvironment) {
        let mask = prior.crn_mask.clone();
        let record = self.environment_or_insert(&mask);
        if record.display_name.is_empty() {
            if let Some(display) = &prior.display_name {
                record.display_name = display.clone();
            }
        }
        record.prior_oss = Some(prior);
    }
}
