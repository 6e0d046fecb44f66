use catalog_merge_core::*;

fn catalog(name: &str, kind: &str) -> CatalogEntry {
    CatalogEntry {
        id: format!("{name}-id"),
        name: name.to_string(),
        kind: kind.to_string(),
        ..Default::default()
    }
}

fn composite_parent(name: &str, children: &[(&str, &str)]) -> CatalogEntry {
    CatalogEntry {
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
        ..catalog(name, COMPOSITE_KIND)
    }
}

fn composite_child(name: &str, kind: &str) -> CatalogEntry {
    CatalogEntry {
        tags: ["is_composite".to_string()].into(),
        ..catalog(name, kind)
    }
}

fn run_bundle(bundle: SourceBundle) -> (Model, Result<RunReport, EngineError>) {
    let mut model = Model::new();
    model.ingest(bundle);
    let result = run(&mut model, &RunOptions::default());
    (model, result)
}

fn assert_model_invariants(model: &Model) {
    for record in model.list_all_services(None) {
        if let Some(primary) = &record.duplicate_of {
            let primary = model
                .service(primary)
                .unwrap_or_else(|| panic!("{} points at a missing record", record.comparable_name));
            assert!(!primary.is_duplicate());
        }
        if let Some(parent_ref) = &record.work_area.composite_parent {
            let parent = model
                .list_all_services(None)
                .find(|p| &p.reference_resource_name == parent_ref && !p.is_duplicate())
                .expect("composite parent exists");
            let decl = parent
                .source_main_catalog
                .as_ref()
                .and_then(|s| s.composite.as_ref())
                .expect("composite parent declares children");
            assert!(
                decl.children
                    .iter()
                    .any(|child| make_comparable_name(&child.name) == record.comparable_name)
            );
        }
    }
}

// ----------------------------------------------------------------------------
// Name folding
// ----------------------------------------------------------------------------

#[test]
fn test_name_folding_scenarios() {
    assert_eq!(
        make_comparable_name("ibm-some-service-name-for-ibm-cloud"),
        "someservicename"
    );
    assert_eq!(
        make_comparable_name("testxyz some-service-name testzyx"),
        "xxyyzzsomeservicenamezzyyxx"
    );
    assert_eq!(make_comparable_name("is.some-service-name"), "issomeservicename");
    assert_eq!(make_canonical_name("Some Service Name"), "some-service-name");
    assert_eq!(make_canonical_name("is.Some Service Name"), "is-some-service-name");
    assert_eq!(make_canonical_name(""), "");
}

#[test]
fn test_normalization_laws() {
    for raw in [
        "",
        "  IBM Cloud Object Storage  ",
        "argonauts-ibm-cloud-thing",
        "is.floating-ip",
        "billing-subscription",
        "Some__Weird--Name!!",
        "testxyz-foo",
    ] {
        let canonical = make_canonical_name(raw);
        assert_eq!(make_canonical_name(&canonical), canonical, "{raw}");
        assert!(is_name_canonical(&canonical), "{raw}");

        let comparable = make_comparable_name(raw);
        assert_eq!(make_comparable_name(&comparable), comparable, "{raw}");

        let (converted, is_composite) = convert_composite_to_canonical(raw);
        if is_composite {
            assert!(compare_composite_and_canonical(raw, &converted));
        }
    }
}

// ----------------------------------------------------------------------------
// Duplicate folding
// ----------------------------------------------------------------------------

#[test]
fn test_duplicate_folding_scenario() {
    let (model, result) = run_bundle(SourceBundle {
        catalog: vec![
            catalog("service-1", "service"),
            catalog("service-2", "service"),
            catalog("service-3", "service"),
        ],
        merge_control: vec![
            MergeControl {
                canonical_name: "service-2".into(),
                raw_duplicate_names: vec!["service-1".into(), "service-4".into()],
                ..Default::default()
            },
            MergeControl {
                canonical_name: "service-3".into(),
                raw_duplicate_names: vec!["service-5".into()],
                ..Default::default()
            },
        ],
        ..Default::default()
    });
    let report = result.unwrap();

    let s1 = model.service("service1").unwrap();
    let s2 = model.service("service2").unwrap();
    let s3 = model.service("service3").unwrap();

    assert_eq!(s1.duplicate_of.as_deref(), Some(s2.comparable_name.as_str()));
    assert_eq!(s2.source_main_catalog.as_ref().unwrap().name, "service-2");
    assert_eq!(s2.additional_main_catalog.len(), 1);
    assert_eq!(s2.additional_main_catalog[0].name, "service-1");
    assert!(!s3.is_duplicate());
    assert_eq!(s3.source_main_catalog.as_ref().unwrap().name, "service-3");
    assert!(s3.additional_main_catalog.is_empty());

    assert_eq!(report.tombstones.len(), 1);
    assert_eq!(report.service("service2").unwrap().duplicates, vec!["service1"]);
    assert_model_invariants(&model);
}

#[test]
fn test_conflicting_duplicate_claims_abort_run() {
    let (_, result) = run_bundle(SourceBundle {
        catalog: vec![catalog("a", "service"), catalog("b", "service"), catalog("c", "service")],
        merge_control: vec![
            MergeControl {
                canonical_name: "a".into(),
                raw_duplicate_names: vec!["ibm-c".into()],
                ..Default::default()
            },
            MergeControl {
                canonical_name: "b".into(),
                raw_duplicate_names: vec!["c".into()],
                ..Default::default()
            },
        ],
        ..Default::default()
    });

    match result {
        Err(EngineError::DuplicateConflicts { count, .. }) => assert_eq!(count, 1),
        other => panic!("expected duplicate conflicts, got {other:?}"),
    }
}

#[test]
fn test_do_not_merge_keeps_similar_names_apart() {
    let mut model = Model::new();
    model.register_do_not_merge(CONFIG_OWNER, ["ibm-foo"]);
    model.ingest(SourceBundle {
        catalog: vec![catalog("foo", "service"), catalog("ibm-foo", "service")],
        ..Default::default()
    });
    let options = RunOptions {
        do_not_merge: vec!["ibm-foo".into()],
        ..Default::default()
    };
    let report = run(&mut model, &options).unwrap();

    assert_eq!(report.services.len(), 2);
    assert!(report.service("ibm-foo").is_some());
    assert!(report.registry_conflicts.is_empty());
}

// ----------------------------------------------------------------------------
// Composite validation
// ----------------------------------------------------------------------------

#[test]
fn test_composite_happy_path() {
    let (model, result) = run_bundle(SourceBundle {
        catalog: vec![
            composite_parent("is", &[("is.volume", "service")]),
            composite_child("is.volume", "service"),
        ],
        ..Default::default()
    });
    result.unwrap();

    let parent = model.service("is").unwrap();
    let child = model.service("isvolume").unwrap();
    assert_eq!(child.validation.count(Severity::Info), 1);
    for record in [parent, child] {
        assert_eq!(record.validation.count(Severity::Severe), 0);
        assert_eq!(record.validation.count(Severity::Critical), 0);
    }
    assert_eq!(child.work_area.composite_parent.as_deref(), Some("is"));
    assert_model_invariants(&model);
}

#[test]
fn test_composite_kind_mismatch() {
    let (model, result) = run_bundle(SourceBundle {
        catalog: vec![
            composite_parent("is", &[("is.volume", "service")]),
            composite_child("is.volume", "resource"),
        ],
        ..Default::default()
    });
    result.unwrap();

    let parent = model.service("is").unwrap();
    let child = model.service("isvolume").unwrap();
    assert_eq!(parent.validation.count(Severity::Severe), 1);
    assert_eq!(child.validation.count(Severity::Severe), 1);
    assert_eq!(child.work_area.composite_parent.as_deref(), Some("is"));

    for issue in parent.validation.issues().iter().chain(child.validation.issues()) {
        assert!(issue.has_tag(IssueTag::Crn));
        assert!(issue.has_tag(IssueTag::CatalogComposite));
    }
}

#[test]
fn test_rmc_issues_counted_only_when_enabled() {
    let bundle = SourceBundle {
        catalog: vec![catalog("plain", "service")],
        rmc: vec![RmcEntry {
            name: "plain".into(),
            parent_composite_service: Some("is".into()),
            ..Default::default()
        }],
        ..Default::default()
    };

    let (_, result) = run_bundle(bundle.clone());
    let report = result.unwrap();
    assert_eq!(report.counts.critical, 0);
    assert_eq!(report.counts.suppressed, 1);

    let mut model = Model::new();
    model.ingest(bundle);
    let options = RunOptions {
        run_actions: RunActions::default().with(RunAction::Rmc),
        ..Default::default()
    };
    let report = run(&mut model, &options).unwrap();
    assert_eq!(report.counts.critical, 1);
}

// ----------------------------------------------------------------------------
// Environments and determinism
// ----------------------------------------------------------------------------

#[test]
fn test_environment_deletable_and_shared_mccp_ids() {
    let mask = |raw: &str| CrnMask::parse(raw).unwrap();
    let bundle = SourceBundle {
        catalog_environments: vec![
            CatalogEnvironment {
                id: "a".into(),
                crn_mask: mask("crn:v1:bluemix:public::us-south::::"),
                display_name: Some("Dallas".into()),
                legacy_mccp_id: Some("ibm:yp:us-south".into()),
            },
            CatalogEnvironment {
                id: "b".into(),
                crn_mask: mask("crn:v1:bluemix:public::us-east::::"),
                display_name: Some("Washington".into()),
                legacy_mccp_id: Some("ibm:yp:us-south".into()),
            },
        ],
        prior_environments: vec![PriorEnvironment {
            crn_mask: mask("crn:v1:bluemix:public::au-syd::::"),
            display_name: Some("Sydney".into()),
        }],
        ..Default::default()
    };

    let (_, result) = run_bundle(bundle.clone());
    let report = result.unwrap();
    assert_eq!(report.environments.len(), 3);
    assert_eq!(report.counts.warning, 2);
    let deletable: Vec<&str> = report
        .environments
        .iter()
        .filter(|env| env.deletable)
        .map(|env| env.display_name.as_str())
        .collect();
    assert_eq!(deletable, vec!["Sydney"]);

    let mut model = Model::new();
    model.ingest(bundle);
    let options = RunOptions {
        run_actions: RunActions::default().with(RunAction::DoctorDisabled),
        ..Default::default()
    };
    let report = run(&mut model, &options).unwrap();
    assert!(report.environments.iter().all(|env| !env.deletable));
}

#[test]
fn test_reports_are_byte_stable() {
    let bundle = SourceBundle {
        catalog: (0..20)
            .map(|i| catalog(&format!("service-{i}"), "service"))
            .collect(),
        merge_control: vec![MergeControl {
            canonical_name: "service-0".into(),
            raw_duplicate_names: (1..10).map(|i| format!("service-{i}")).collect(),
            ..Default::default()
        }],
        ..Default::default()
    };

    let (_, first) = run_bundle(bundle.clone());
    let (_, second) = run_bundle(bundle);
    let first = serde_json::to_string(&first.unwrap()).unwrap();
    let second = serde_json::to_string(&second.unwrap()).unwrap();
    assert_eq!(first, second);
}
