mod common;

use std::{fs, sync::Arc};

use reconciliation_service::{
    config::ColumnsConfig,
    pipeline::{PipelineError, Reconciler, ReferenceOutcome, RowSetKind},
    sinks::{csv_export, dashboard},
    sources::{FileSource, TableCache},
};
use tagging_core::{KpiOptions, Scope, SchemaError};

#[test]
fn registered_scope_produces_full_report() {
    let (_dir, cfg) = common::fixture();
    let reconciler = Reconciler::from_config(&cfg);

    let report = reconciler.run_scope(&cfg, Scope::new(7088, 57)).unwrap();
    let k = &report.kpis;

    assert_eq!(k.master_tagged, 3);
    assert_eq!(k.master_tagged_rows, 4);
    assert_eq!(k.live_connections, 4);
    assert_eq!(k.correctly_tagged, 2);
    assert_eq!(k.untagged_count, 1);
    assert_eq!(k.wrongly_mapped_count, 1);
    assert_eq!(k.total_after_correction, 3);
    assert!((k.loss_percent.unwrap() - 100.0 / 3.0).abs() < 1e-9);
    assert_eq!(k.other_dtr_on_feeder, Some(1));
    assert_eq!(report.classification.diagnostics.invalid_master_identifiers, 1);

    let untagged = report.row_set(RowSetKind::Untagged).unwrap();
    assert_eq!(
        csv_export::table_to_csv(untagged).unwrap(),
        "Meter_Serial_Number,dtrcode,Feedercode,Consumer_Name\na3,57,7088,Chitra\n"
    );
    let wrongly = report.row_set(RowSetKind::WronglyMapped).unwrap();
    assert_eq!(wrongly.rows, vec![vec!["x9", "32", "7088", "Dev"]]);

    let check = report.reference.as_ref().unwrap();
    assert_eq!(check.untagged.as_ref().unwrap().agrees(), Some(true));
    let Some(ReferenceOutcome::Compared(wm)) = &check.wrongly_mapped else {
        panic!("expected identifier comparison, got {:?}", check.wrongly_mapped);
    };
    assert!(!wm.agrees());
    assert_eq!(wm.reference_rows, 2);
    assert_eq!(
        wm.missing_from_engine.iter().map(|i| i.as_str()).collect::<Vec<_>>(),
        vec!["Q1"]
    );
}

#[test]
fn repeated_runs_are_identical() {
    let (_dir, cfg) = common::fixture();
    let cache = Arc::new(TableCache::new());
    let cached = Reconciler::from_config(&cfg).with_cache(cache.clone());
    let uncached = Reconciler::from_config(&cfg);

    let a = cached.run_scope(&cfg, Scope::new(7088, 57)).unwrap();
    let b = cached.run_scope(&cfg, Scope::new(7088, 57)).unwrap();
    let c = uncached.run_scope(&cfg, Scope::new(7088, 57)).unwrap();

    assert_eq!(a.fingerprint, b.fingerprint);
    assert_eq!(a.fingerprint, c.fingerprint);
    assert_eq!(a.classification, c.classification);
    assert_eq!(a.kpis, c.kpis);
    // master, observed and both reference sheets
    assert_eq!(cache.len(), 4);
}

#[test]
fn export_writes_one_file_per_row_set() {
    let (dir, cfg) = common::fixture();
    let report = Reconciler::from_config(&cfg)
        .run_scope(&cfg, Scope::new(7088, 57))
        .unwrap();

    let out = dir.path().join("export");
    let written = csv_export::export_report(&report, &out).unwrap();
    assert_eq!(written.len(), 6);
    let observed = fs::read_to_string(out.join("7088-57_live_connections.csv")).unwrap();
    assert!(observed.starts_with("msn,kwh\n"));
    assert_eq!(observed.lines().count(), 5);
}

#[test]
fn text_rendering_lists_cards() {
    let (_dir, cfg) = common::fixture();
    let report = Reconciler::from_config(&cfg)
        .run_scope(&cfg, Scope::new(7088, 57))
        .unwrap();

    let text = dashboard::render_text(&report);
    assert!(text.contains("Live Connections on DTR"));
    assert!(text.contains("33.33%"));
    assert!(text.contains("reference wrongly_mapped: DISAGREES"));
}

#[test]
fn missing_source_is_a_load_error() {
    let (_dir, cfg) = common::fixture();
    let err = Reconciler::from_config(&cfg)
        .run_scope(&cfg, Scope::new(7088, 32))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Load(_)));
}

#[test]
fn unregistered_scope_is_rejected() {
    let (_dir, cfg) = common::fixture();
    let err = Reconciler::from_config(&cfg)
        .run_scope(&cfg, Scope::new(1, 1))
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnknownScope(s) if s == Scope::new(1, 1)));
}

#[test]
fn wrong_identifier_column_is_a_schema_error() {
    let (_dir, cfg) = common::fixture();
    // Default observed column map expects Meter_Serial_Number, the extract has msn.
    let reconciler = Reconciler::new(FileSource, ColumnsConfig::default(), KpiOptions::default());
    let entry = cfg.find(Scope::new(7088, 57)).unwrap();

    let err = reconciler.run(entry).unwrap_err();
    match err {
        PipelineError::Schema { location, source } => {
            assert!(location.ends_with("7088-57.csv"));
            assert!(matches!(source, SchemaError::MissingColumn { .. }));
        }
        other => panic!("expected schema error, got {other:?}"),
    }
}

#[test]
fn reference_sheet_without_identifier_column_compares_row_counts() {
    let (dir, cfg) = common::fixture();
    fs::write(dir.path().join("untagged.csv"), "Serial No\nA3\n").unwrap();
    fs::remove_file(dir.path().join("wrongly.csv")).unwrap();

    let report = Reconciler::from_config(&cfg)
        .run_scope(&cfg, Scope::new(7088, 57))
        .unwrap();
    assert_eq!(report.kpis.correctly_tagged, 2);
    assert_eq!(report.kpis.untagged_count, 1);

    let check = report.reference.as_ref().unwrap();
    assert_eq!(
        check.untagged,
        Some(ReferenceOutcome::RowsOnly {
            kind: RowSetKind::Untagged,
            reference_rows: 1,
            engine_count: 1,
        })
    );
    match &check.wrongly_mapped {
        Some(ReferenceOutcome::Unavailable { kind, reason }) => {
            assert_eq!(*kind, RowSetKind::WronglyMapped);
            assert!(reason.contains("wrongly.csv"));
        }
        other => panic!("expected unavailable reference, got {other:?}"),
    }

    let text = dashboard::render_text(&report);
    assert!(text.contains("reference untagged: agrees by row count"));
    assert!(text.contains("reference wrongly_mapped: unavailable"));
}
