//! Duplicate folding.
//!
//! Merge-control records name other records that describe the same service
//! under a different name. [`fold_duplicates`] absorbs the sources of each
//! such duplicate into the record that claimed it and leaves the duplicate
//! behind as a tombstone pointing at its primary.
//!
//! Folding runs in two passes. The first builds the duplicate index and
//! aborts on contradictory claims; the second merges. Duplicate keys are
//! merged in lexicographic order so `additional_*` lists come out the same
//! on every run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::names::convert_composite_to_canonical;
use crate::{Model, ServiceRecord, Severity};

const TITLE_MERGED: &str = "Merged duplicate record";
const TITLE_PRIOR_RESET: &str = "Product info reset after merge";

/// One duplicate absorbed into its primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Absorption {
    /// Comparable name of the tombstoned record.
    pub duplicate: String,
    /// Comparable name of the surviving record.
    pub primary: String,
}

/// Outcome of a successful fold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSummary {
    pub absorbed: Vec<Absorption>,
}

/// Builds the duplicate index: comparable duplicate name to the primary
/// that claimed it.
fn collect_duplicate_claims(model: &Model) -> Result<BTreeMap<String, String>, EngineError> {
    let mut claims: BTreeMap<String, String> = BTreeMap::new();
    let mut conflicts = Vec::new();

    for key in model.service_keys() {
        let Some(control) = model.service(&key).and_then(|r| r.merge_control.as_ref()) else {
            continue;
        };
        for name in &control.raw_duplicate_names {
            if model.do_not_merge().is_exempt(name) {
                conflicts.push(format!(
                    "\"{name}\" is listed as a duplicate by {key} but is also a do-not-merge name"
                ));
                continue;
            }
            let comparable = model.comparable_name(name);
            if comparable == key {
                debug!(%key, name = %name, "record lists itself as a duplicate");
                continue;
            }
            match claims.get(&comparable) {
                Some(prior) if *prior == key => {}
                Some(prior) => conflicts.push(format!(
                    "\"{name}\" ({comparable}) is claimed as a duplicate by both {prior} and {key}"
                )),
                None => {
                    claims.insert(comparable, key.clone());
                }
            }
        }
    }

    if conflicts.is_empty() {
        Ok(claims)
    } else {
        for conflict in &conflicts {
            warn!(%conflict, "duplicate name conflict");
        }
        Err(EngineError::DuplicateConflicts {
            count: conflicts.len(),
            details: conflicts,
        })
    }
}

/// Moves a duplicate's direct source and its overflow into the primary.
fn absorb_slot<T>(
    from_slot: &mut Option<T>,
    from_additional: &mut Vec<T>,
    into_slot: &mut Option<T>,
    into_additional: &mut Vec<T>,
) {
    if let Some(source) = from_slot.take() {
        if into_slot.is_some() {
            into_additional.push(source);
        } else {
            *into_slot = Some(source);
        }
    }
    into_additional.append(from_additional);
}

fn absorb(primary: &mut ServiceRecord, dup: &mut ServiceRecord) {
    if let (Some(prior), Some(_)) = (primary.prior_oss.as_mut(), dup.prior_oss.as_ref()) {
        prior.product_info.reset();
        primary
            .validation
            .add_issue(
                Severity::Info,
                TITLE_PRIOR_RESET,
                format_args!(
                    "{} and its duplicate {} were both published; product info will be recomputed",
                    primary.reference_resource_name, dup.comparable_name
                ),
            )
            .tag_duplicate_names();
    }

    absorb_slot(
        &mut dup.source_main_catalog,
        &mut dup.additional_main_catalog,
        &mut primary.source_main_catalog,
        &mut primary.additional_main_catalog,
    );
    if let Some(extra) = dup.catalog_extra.take() {
        match primary.catalog_extra.as_mut() {
            Some(existing) => existing.merge(extra),
            None => primary.catalog_extra = Some(extra),
        }
    }
    absorb_slot(
        &mut dup.source_scorecard,
        &mut dup.additional_scorecard,
        &mut primary.source_scorecard,
        &mut primary.additional_scorecard,
    );
    absorb_slot(
        &mut dup.source_servicenow,
        &mut dup.additional_servicenow,
        &mut primary.source_servicenow,
        &mut primary.additional_servicenow,
    );

    if primary.ignored_main_catalog.is_none() {
        primary.ignored_main_catalog = dup.ignored_main_catalog.take();
    } else if let Some(ignored) = &dup.ignored_main_catalog {
        debug!(
            primary = %primary.comparable_name,
            duplicate = %dup.comparable_name,
            entry = %ignored.name,
            "primary already has an ignored catalog entry; leaving it on the duplicate"
        );
    }
}

/// Folds every claimed duplicate into its primary.
///
/// # Errors
///
/// - [`EngineError::DuplicateConflicts`] when two records claim the same
///   duplicate, or a claimed name is on the do-not-merge list. Nothing is
///   merged in that case.
/// - [`EngineError::AlreadyAbsorbed`] when a claimed record is already a
///   tombstone.
/// - [`EngineError::MergeFailures`] when some duplicates carry their own
///   merge control. The others are still merged.
///
/// # Examples
///
/// ```
/// use catalog_merge_core::*;
///
/// let mut model = Model::new();
/// model.ingest(SourceBundle {
///     catalog: vec![
///         CatalogEntry { name: "old-name".into(), kind: "service".into(), ..Default::default() },
///         CatalogEntry { name: "new-name".into(), kind: "service".into(), ..Default::default() },
///     ],
///     merge_control: vec![MergeControl {
///         canonical_name: "new-name".into(),
///         raw_duplicate_names: vec!["old-name".into()],
///         ..Default::default()
///     }],
///     ..Default::default()
/// });
///
/// let summary = fold_duplicates(&mut model).unwrap();
/// assert_eq!(summary.absorbed.len(), 1);
/// assert_eq!(model.service("oldname").unwrap().duplicate_of.as_deref(), Some("newname"));
/// ```
pub fn fold_duplicates(model: &mut Model) -> Result<FoldSummary, EngineError> {
    let claims = collect_duplicate_claims(model)?;
    let mut summary = FoldSummary::default();
    let mut failures = Vec::new();

    for (dup_key, primary_key) in &claims {
        let Some(mut dup) = model.take_service(dup_key) else {
            debug!(duplicate = %dup_key, "claimed duplicate has no record");
            continue;
        };
        if let Some(existing) = dup.duplicate_of.clone() {
            model.restore_service(dup);
            return Err(EngineError::AlreadyAbsorbed {
                name: dup_key.clone(),
                primary: existing,
            });
        }
        if dup
            .merge_control
            .as_ref()
            .is_some_and(|control| !control.is_empty_except_notes())
        {
            failures.push(format!(
                "{dup_key} is claimed as a duplicate by {primary_key} but has its own merge control"
            ));
            model.restore_service(dup);
            continue;
        }
        let Some(primary) = model.service_mut(primary_key) else {
            model.restore_service(dup);
            continue;
        };

        let own_name = dup.own_service_name().to_string();
        absorb(primary, &mut dup);
        primary
            .validation
            .add_issue(
                Severity::Info,
                TITLE_MERGED,
                format_args!("absorbed {own_name} ({dup_key})"),
            )
            .tag_duplicate_names();

        dup.duplicate_of = Some(primary_key.clone());
        dup.reference_resource_name = convert_composite_to_canonical(&own_name).0;
        debug!(duplicate = %dup_key, primary = %primary_key, "folded duplicate");
        model.restore_service(dup);

        summary.absorbed.push(Absorption {
            duplicate: dup_key.clone(),
            primary: primary_key.clone(),
        });
    }

    info!(
        claims = claims.len(),
        absorbed = summary.absorbed.len(),
        failures = failures.len(),
        "folded duplicates"
    );

    if failures.is_empty() {
        Ok(summary)
    } else {
        Err(EngineError::MergeFailures {
            count: failures.len(),
            details: failures,
        })
    }
}
