//! Composite parent/child consistency checks.
//!
//! A composite catalog entry (kind `composite`) declares its children by
//! exact catalog name. Children are named `<parent>.<suffix>`. Both sides
//! are checked here: parents against the children they declare, and
//! child-looking records against the parent their name points at.
//!
//! Every child that a parent successfully resolves gets its
//! `work_area.composite_parent` set to the parent's reference name.
//!
//! Parent-to-child lookups and child-to-parent lookups both go through the
//! comparable name, but the checks on each side are not mirror images: a
//! child only verifies that the parent lists it, not the declared kind.

use std::fmt;

use tracing::{debug, info};

use crate::names::parse_composite_name;
use crate::{
    COMPOSITE_KIND, CatalogEntry, CompositeDecl, IssueHandle, Model, RunAction, Severity,
};

const TITLE_PARENT_NAME: &str = "Composite parent has a child-style name";
const TITLE_NO_DECL: &str = "Composite parent has no composite declaration";
const TITLE_NESTED: &str = "Nested composites are not supported";
const TITLE_CHILD_NAME: &str = "Composite child name does not match parent";
const TITLE_CHILD_KIND: &str = "Composite child kind does not match composite kind";
const TITLE_CHILD_MISSING: &str = "Composite child not found";
const TITLE_LISTED_TWICE: &str = "Composite child listed twice by the same parent";
const TITLE_MULTIPLE_PARENTS: &str = "Composite child has multiple parents";
const TITLE_CHILD_NOT_IN_CATALOG: &str = "Composite child has no catalog entry";
const TITLE_MISMATCH: &str = "Composite child does not match its declaration";
const TITLE_CHILD_OK: &str = "Composite child consistent with parent";
const TITLE_BAD_PARENT: &str = "Composite child has no valid parent";
const TITLE_NOT_LISTED: &str = "Composite child not listed by parent";
const TITLE_INEXACT_PARENT: &str = "Composite parent name matches only approximately";
const TITLE_DUPLICATE_LISTING: &str = "Composite parent lists child more than once";
const TITLE_RMC_PARENT: &str = "RMC composite parent mismatch";

/// Appends an issue tagged as a composite CRN finding.
fn report<'m>(
    model: &'m mut Model,
    key: &str,
    severity: Severity,
    title: &str,
    detail: fmt::Arguments<'_>,
) -> Option<IssueHandle<'m>> {
    model.service_mut(key).map(|record| {
        record
            .validation
            .add_issue(severity, title, detail)
            .tag_crn()
            .tag_catalog_composite()
    })
}

/// Runs the composite checks over every live record with a catalog source.
pub fn validate_composites(model: &mut Model) {
    let mut parents = 0usize;
    let mut children = 0usize;

    for key in model.service_keys() {
        let Some(record) = model.service(&key).filter(|r| !r.is_duplicate()) else {
            continue;
        };
        let Some(source) = record.source_main_catalog.clone() else {
            continue;
        };
        let rmc_parent = record
            .source_rmc
            .as_ref()
            .and_then(|rmc| rmc.declared_parent())
            .map(str::to_string);

        if source.kind == COMPOSITE_KIND {
            parents += 1;
            check_parent(model, &key, &source);
        } else if let Some(composite) = parse_composite_name(&source.name) {
            children += 1;
            check_child(model, &key, &source, composite.base);
        } else if let Some(declared) = rmc_parent {
            if let Some(issue) = report(
                model,
                &key,
                Severity::Critical,
                TITLE_RMC_PARENT,
                format_args!(
                    "{} is not a composite child but RMC declares parent {declared}",
                    source.name
                ),
            ) {
                issue.tag_run_action(RunAction::Rmc);
            }
        }
    }

    info!(parents, children, "validated composites");
}

fn check_parent(model: &mut Model, key: &str, source: &CatalogEntry) {
    let parent_name = source.name.as_str();
    let Some(parent_ref) = model
        .service(key)
        .map(|record| record.reference_resource_name.clone())
    else {
        return;
    };

    if parse_composite_name(parent_name).is_some() {
        report(
            model,
            key,
            Severity::Severe,
            TITLE_PARENT_NAME,
            format_args!("composite {parent_name} is named like a composite child"),
        );
    }
    let Some(decl) = source.composite.as_ref() else {
        report(
            model,
            key,
            Severity::Severe,
            TITLE_NO_DECL,
            format_args!("composite {parent_name} does not declare its children"),
        );
        return;
    };
    if decl.composite_kind == COMPOSITE_KIND {
        report(
            model,
            key,
            Severity::Critical,
            TITLE_NESTED,
            format_args!("composite {parent_name} declares composite children"),
        );
    }

    for child in &decl.children {
        let child_key = model.comparable_name(&child.name);

        if parse_composite_name(&child.name).map(|c| c.base) != Some(parent_name) {
            report(
                model,
                key,
                Severity::Severe,
                TITLE_CHILD_NAME,
                format_args!("child {} is not named {parent_name}.<name>", child.name),
            );
        }
        if child.kind != decl.composite_kind {
            report(
                model,
                key,
                Severity::Severe,
                TITLE_CHILD_KIND,
                format_args!(
                    "child {} is declared with kind {} but the composite kind is {}",
                    child.name, child.kind, decl.composite_kind
                ),
            );
        }

        let Some(record) = model
            .service_mut(&child_key)
            .filter(|record| record.has_real_sources())
        else {
            report(
                model,
                key,
                Severity::Severe,
                TITLE_CHILD_MISSING,
                format_args!("child {} of {parent_name} has no sources", child.name),
            );
            continue;
        };

        let linked = record.work_area.composite_parent.clone();
        if linked.is_none() {
            record.work_area.composite_parent = Some(parent_ref.clone());
        }
        let actual = record.source_main_catalog.clone();

        match linked {
            Some(existing) if existing == parent_ref => {
                report(
                    model,
                    &child_key,
                    Severity::Critical,
                    TITLE_LISTED_TWICE,
                    format_args!("{parent_name} lists {} more than once", child.name),
                );
            }
            Some(existing) => {
                report(
                    model,
                    &child_key,
                    Severity::Critical,
                    TITLE_MULTIPLE_PARENTS,
                    format_args!(
                        "{} is listed by {parent_ref} but already belongs to {existing}",
                        child.name
                    ),
                );
            }
            None => debug!(child = %child_key, parent = %parent_ref, "linked composite child"),
        }

        let Some(actual) = actual else {
            for target in [key, child_key.as_str()] {
                report(
                    model,
                    target,
                    Severity::Severe,
                    TITLE_CHILD_NOT_IN_CATALOG,
                    format_args!(
                        "child {} of {parent_name} has no catalog entry",
                        child.name
                    ),
                );
            }
            continue;
        };

        let mismatches =
            declaration_mismatches(parent_name, decl, &child.name, &child.kind, &actual);
        for mismatch in &mismatches {
            for target in [key, child_key.as_str()] {
                report(
                    model,
                    target,
                    Severity::Severe,
                    TITLE_MISMATCH,
                    format_args!("{mismatch}"),
                );
            }
        }
        if mismatches.is_empty() {
            report(
                model,
                &child_key,
                Severity::Info,
                TITLE_CHILD_OK,
                format_args!("{} matches its declaration in {parent_name}: no issues", actual.name),
            );
        }
    }
}

/// Exact-match checks between a child's declaration and its catalog entry.
fn declaration_mismatches(
    parent_name: &str,
    decl: &CompositeDecl,
    declared_name: &str,
    declared_kind: &str,
    actual: &CatalogEntry,
) -> Vec<String> {
    let mut mismatches = Vec::new();
    if actual.name != declared_name {
        mismatches.push(format!(
            "child declared as {declared_name} in {parent_name} is named {} in the catalog",
            actual.name
        ));
    }
    if parse_composite_name(&actual.name).map(|c| c.base) != Some(parent_name) {
        mismatches.push(format!(
            "catalog name {} does not start with {parent_name}.",
            actual.name
        ));
    }
    if actual.kind != declared_kind {
        mismatches.push(format!(
            "{} has kind {} but {parent_name} declares kind {declared_kind}",
            actual.name, actual.kind
        ));
    }
    if !actual.tags.contains(&decl.composite_tag) {
        mismatches.push(format!(
            "{} is missing tag {} required by {parent_name}",
            actual.name, decl.composite_tag
        ));
    }
    mismatches
}

fn check_child(model: &mut Model, key: &str, source: &CatalogEntry, base: &str) {
    let child_name = source.name.as_str();
    let parent_key = model.comparable_name(base);

    let parent = model.service(&parent_key).and_then(|parent| {
        let catalog = parent.source_main_catalog.as_ref()?;
        if catalog.kind != COMPOSITE_KIND {
            return None;
        }
        let decl = catalog.composite.as_ref()?;
        Some((
            catalog.name.clone(),
            parent.reference_resource_name.clone(),
            decl.children
                .iter()
                .filter(|child| child.name == child_name)
                .count(),
        ))
    });
    let Some((parent_name, parent_ref, listed)) = parent else {
        report(
            model,
            key,
            Severity::Severe,
            TITLE_BAD_PARENT,
            format_args!("{child_name} has no composite parent named {base} in the catalog"),
        );
        return;
    };

    match listed {
        0 => {
            report(
                model,
                key,
                Severity::Severe,
                TITLE_NOT_LISTED,
                format_args!("{parent_name} does not list {child_name} as a child"),
            );
            if parent_name != base {
                report(
                    model,
                    key,
                    Severity::Severe,
                    TITLE_INEXACT_PARENT,
                    format_args!("{child_name} refers to {base} but the parent is named {parent_name}"),
                );
            }
        }
        1 => {}
        n => {
            report(
                model,
                key,
                Severity::Critical,
                TITLE_DUPLICATE_LISTING,
                format_args!("{parent_name} lists {child_name} {n} times"),
            );
        }
    }

    let rmc_parent = model.service(key).and_then(|record| {
        record
            .source_rmc
            .as_ref()
            .map(|rmc| rmc.declared_parent().unwrap_or_default().to_string())
    });
    if let Some(declared) = rmc_parent.filter(|declared| *declared != parent_ref) {
        if let Some(issue) = report(
            model,
            key,
            Severity::Critical,
            TITLE_RMC_PARENT,
            format_args!(
                "RMC declares parent \"{declared}\" for {child_name}, catalog parent is {parent_ref}"
            ),
        ) {
            issue.tag_run_action(RunAction::Rmc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompositeChild, RmcEntry, ScorecardEntry, SourceBundle};

    fn parent(children: &[(&str, &str)]) -> CatalogEntry {
        CatalogEntry {
            id: "is-id".into(),
            name: "is".into(),
            kind: COMPOSITE_KIND.into(),
            composite: Some(CompositeDecl {
                composite_kind: "service".into(),
                composite_tag: "is_composite".into(),
                children: children
                    .iter()
                    .map(|(name, kind)| CompositeChild {
                        name: name.to_string(),
                        kind: kind.to_string(),
                    })
                    .collect(),
            }),
            ..Default::default()
        }
    }

    fn child(name: &str, kind: &str) -> CatalogEntry {
        CatalogEntry {
            id: format!("{name}-id"),
            name: name.into(),
            kind: kind.into(),
            tags: ["is_composite".to_string()].into(),
            ..Default::default()
        }
    }

    fn model_with(catalog: Vec<CatalogEntry>, rmc: Vec<RmcEntry>) -> Model {
        let mut model = Model::new();
        model.ingest(SourceBundle {
            catalog,
            rmc,
            ..Default::default()
        });
        model
    }

    fn count(model: &Model, key: &str, severity: Severity) -> usize {
        model.service(key).unwrap().validation.count(severity)
    }

    #[test]
    fn test_happy_path_links_child() {
        let mut model = model_with(
            vec![parent(&[("is.volume", "service")]), child("is.volume", "service")],
            vec![],
        );
        validate_composites(&mut model);

        let volume = model.service("isvolume").unwrap();
        assert_eq!(volume.work_area.composite_parent.as_deref(), Some("is"));
        assert_eq!(volume.validation.count(Severity::Info), 1);
        assert_eq!(volume.validation.len(), 1);
        assert!(model.service("is").unwrap().validation.is_empty());
    }

    #[test]
    fn test_kind_mismatch_reported_on_both_sides() {
        let mut model = model_with(
            vec![parent(&[("is.volume", "service")]), child("is.volume", "resource")],
            vec![],
        );
        validate_composites(&mut model);

        assert_eq!(count(&model, "is", Severity::Severe), 1);
        assert_eq!(count(&model, "isvolume", Severity::Severe), 1);
        assert_eq!(count(&model, "isvolume", Severity::Info), 0);
        assert_eq!(
            model.service("isvolume").unwrap().work_area.composite_parent.as_deref(),
            Some("is")
        );
    }

    #[test]
    fn test_missing_child_is_severe_on_parent() {
        let mut model = model_with(vec![parent(&[("is.subnet", "service")])], vec![]);
        validate_composites(&mut model);

        let issues = model.service("is").unwrap().validation.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].title, TITLE_CHILD_MISSING);
        assert!(issues[0].has_tag(crate::IssueTag::Crn));
        assert!(issues[0].has_tag(crate::IssueTag::CatalogComposite));
    }

    #[test]
    fn test_parent_without_declaration() {
        let mut entry = parent(&[]);
        entry.composite = None;
        let mut model = model_with(vec![entry], vec![]);
        validate_composites(&mut model);

        assert_eq!(count(&model, "is", Severity::Severe), 1);
    }

    #[test]
    fn test_nested_composite_is_critical() {
        let mut entry = parent(&[]);
        entry.composite.as_mut().unwrap().composite_kind = COMPOSITE_KIND.into();
        let mut model = model_with(vec![entry], vec![]);
        validate_composites(&mut model);

        assert_eq!(count(&model, "is", Severity::Critical), 1);
    }

    #[test]
    fn test_child_listed_twice() {
        let mut model = model_with(
            vec![
                parent(&[("is.volume", "service"), ("is.volume", "service")]),
                child("is.volume", "service"),
            ],
            vec![],
        );
        validate_composites(&mut model);

        let volume = model.service("isvolume").unwrap();
        assert_eq!(volume.validation.with_title(TITLE_LISTED_TWICE).count(), 1);
        assert_eq!(volume.validation.with_title(TITLE_DUPLICATE_LISTING).count(), 1);
    }

    #[test]
    fn test_orphan_child() {
        let mut model = model_with(vec![child("is.volume", "service")], vec![]);
        validate_composites(&mut model);

        let volume = model.service("isvolume").unwrap();
        assert_eq!(volume.validation.with_title(TITLE_BAD_PARENT).count(), 1);
        assert_eq!(volume.work_area.composite_parent, None);
    }

    #[test]
    fn test_child_not_listed_by_parent() {
        let mut model = model_with(
            vec![parent(&[]), child("is.volume", "service")],
            vec![],
        );
        validate_composites(&mut model);

        let volume = model.service("isvolume").unwrap();
        assert_eq!(volume.validation.with_title(TITLE_NOT_LISTED).count(), 1);
        assert_eq!(volume.validation.with_title(TITLE_INEXACT_PARENT).count(), 0);
    }

    #[test]
    fn test_second_parent_does_not_relink_child() {
        let mut vpc = parent(&[("is.volume", "service")]);
        vpc.id = "vpc-id".into();
        vpc.name = "vpc".into();
        let mut model = model_with(
            vec![
                parent(&[("is.volume", "service")]),
                vpc,
                child("is.volume", "service"),
            ],
            vec![],
        );
        validate_composites(&mut model);

        let volume = model.service("isvolume").unwrap();
        assert_eq!(volume.work_area.composite_parent.as_deref(), Some("is"));
        assert_eq!(volume.validation.count(Severity::Critical), 1);
        let issue = volume.validation.with_title(TITLE_MULTIPLE_PARENTS).next().unwrap();
        assert_eq!(issue.severity, Severity::Critical);

        // vpc also flags the child name that does not start with "vpc."
        let vpc = model.service("vpc").unwrap();
        assert_eq!(vpc.validation.with_title(TITLE_CHILD_NAME).count(), 1);
    }

    #[test]
    fn test_child_without_catalog_entry() {
        let mut model = Model::new();
        model.ingest(SourceBundle {
            catalog: vec![parent(&[("is.volume", "service")])],
            scorecard: vec![ScorecardEntry {
                name: "is.volume".into(),
                ..Default::default()
            }],
            ..Default::default()
        });
        validate_composites(&mut model);

        for key in ["is", "isvolume"] {
            let record = model.service(key).unwrap();
            let issues: Vec<_> = record.validation.with_title(TITLE_CHILD_NOT_IN_CATALOG).collect();
            assert_eq!(issues.len(), 1, "{key}");
            assert_eq!(issues[0].severity, Severity::Severe);
        }
        assert_eq!(
            model.service("isvolume").unwrap().work_area.composite_parent.as_deref(),
            Some("is")
        );
    }

    #[test]
    fn test_parent_matched_only_approximately() {
        let mut ibm_is = parent(&[]);
        ibm_is.name = "ibm-is".into();
        let mut model = model_with(vec![ibm_is, child("is.volume", "service")], vec![]);
        validate_composites(&mut model);

        let volume = model.service("isvolume").unwrap();
        assert_eq!(volume.validation.count(Severity::Severe), 2);
        assert_eq!(volume.validation.with_title(TITLE_NOT_LISTED).count(), 1);
        assert_eq!(volume.validation.with_title(TITLE_INEXACT_PARENT).count(), 1);
    }

    #[test]
    fn test_parent_with_child_style_name() {
        let mut entry = parent(&[]);
        entry.name = "is.core".into();
        let mut model = model_with(vec![entry], vec![]);
        validate_composites(&mut model);

        let core = model.service("iscore").unwrap();
        assert_eq!(core.validation.count(Severity::Severe), 1);
        assert_eq!(core.validation.with_title(TITLE_PARENT_NAME).count(), 1);
        assert_eq!(core.validation.with_title(TITLE_BAD_PARENT).count(), 0);
    }

    #[test]
    fn test_declared_child_under_other_base() {
        let mut model = model_with(vec![parent(&[("vpc.volume", "service")])], vec![]);
        validate_composites(&mut model);

        let is = model.service("is").unwrap();
        assert_eq!(is.validation.with_title(TITLE_CHILD_NAME).count(), 1);
        assert_eq!(is.validation.with_title(TITLE_CHILD_MISSING).count(), 1);
        assert_eq!(is.validation.count(Severity::Severe), 2);
    }

    #[test]
    fn test_missing_composite_tag() {
        let mut volume = child("is.volume", "service");
        volume.tags.clear();
        let mut model = model_with(vec![parent(&[("is.volume", "service")]), volume], vec![]);
        validate_composites(&mut model);

        for key in ["is", "isvolume"] {
            let record = model.service(key).unwrap();
            let issue = record.validation.with_title(TITLE_MISMATCH).next().unwrap();
            assert_eq!(issue.severity, Severity::Severe);
            assert!(issue.detail.contains("is_composite"), "{}", issue.detail);
        }
        assert_eq!(count(&model, "isvolume", Severity::Info), 0);
    }

    #[test]
    fn test_rmc_parent_mismatch_is_tagged() {
        let mut model = model_with(
            vec![parent(&[("is.volume", "service")]), child("is.volume", "service")],
            vec![RmcEntry {
                name: "is.volume".into(),
                parent_composite_service: Some("vpc".into()),
                ..Default::default()
            }],
        );
        validate_composites(&mut model);

        let volume = model.service("isvolume").unwrap();
        let issue = volume.validation.with_title(TITLE_RMC_PARENT).next().unwrap();
        assert_eq!(issue.severity, Severity::Critical);
        assert!(issue.has_tag(crate::IssueTag::RunAction(RunAction::Rmc)));
    }

    #[test]
    fn test_rmc_parent_on_plain_service() {
        let mut model = model_with(
            vec![child("plain-service", "service")],
            vec![RmcEntry {
                name: "plain-service".into(),
                parent_composite_service: Some("is".into()),
                ..Default::default()
            }],
        );
        validate_composites(&mut model);

        assert_eq!(count(&model, "plainservice", Severity::Critical), 1);
    }
}
