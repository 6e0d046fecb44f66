//! Name and environment validation passes.
//!
//! Both passes only append issues; they never change how records are keyed.

use tracing::info;

use crate::names::{check_valid_crn_service_name, is_name_canonical, parse_composite_name};
use crate::{Model, Severity};

const TITLE_NON_CANONICAL: &str = "Catalog name is not canonical";
const TITLE_INVALID_CRN_NAME: &str = "Invalid CRN service name";
const TITLE_SHARED_MCCP_ID: &str = "Legacy MCCP id shared by several environments";

/// Checks catalog names and reference names of every live record with a
/// catalog source.
///
/// Returns the number of issues added.
pub fn validate_names(model: &mut Model) -> usize {
    let mut added = 0;
    for key in model.service_keys() {
        let Some(record) = model.service_mut(&key).filter(|r| !r.is_duplicate()) else {
            continue;
        };
        let Some(catalog_name) = record.source_main_catalog.as_ref().map(|s| s.name.clone())
        else {
            continue;
        };

        if !is_name_canonical(&catalog_name) && parse_composite_name(&catalog_name).is_none() {
            record
                .validation
                .add_issue(
                    Severity::Warning,
                    TITLE_NON_CANONICAL,
                    format_args!("catalog name \"{catalog_name}\" is neither canonical nor a composite name"),
                )
                .tag_crn();
            added += 1;
        }
        if let Err(err) = check_valid_crn_service_name(&record.reference_resource_name) {
            record
                .validation
                .add_issue(Severity::Warning, TITLE_INVALID_CRN_NAME, format_args!("{err}"))
                .tag_crn();
            added += 1;
        }
    }
    info!(issues = added, "validated service names");
    added
}

/// Flags every legacy MCCP id that more than one environment claims.
///
/// Returns the number of issues added.
pub fn validate_environments(model: &mut Model) -> usize {
    let shared: Vec<(String, Vec<_>)> = model
        .legacy_mccp_ids()
        .into_iter()
        .filter(|(_, masks)| masks.len() > 1)
        .map(|(id, masks)| (id.to_string(), masks.to_vec()))
        .collect();

    let mut added = 0;
    for (id, masks) in &shared {
        let others = masks
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        for mask in masks {
            if let Some(record) = model.environment_mut(mask) {
                record
                    .validation
                    .add_issue(
                        Severity::Warning,
                        TITLE_SHARED_MCCP_ID,
                        format_args!("legacy MCCP id {id} is used by {others}"),
                    )
                    .tag_environment();
                added += 1;
            }
        }
    }
    info!(shared_ids = shared.len(), issues = added, "validated environments");
    added
}
