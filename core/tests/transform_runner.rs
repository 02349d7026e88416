//! Transformation runner: ordering, failure isolation, idempotence.

use chrono::NaiveDate;
use shopsim_core::{
    clock::SimClock,
    error::SimError,
    pipeline::Pipeline,
    store::SimStore,
    transform::{FailurePolicy, Layer, Manifest, TransformRunner, Unit, UnitStatus},
};

fn seeded_store() -> SimStore {
    let mut store = SimStore::in_memory().expect("in-memory store");
    Pipeline::new(&mut store)
        .expect("pipeline")
        .with_clock(SimClock::at_date(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()))
        .run(40, Some(2024))
        .expect("run");
    store
}

fn unit(name: &str, select: &str) -> Unit {
    Unit::new(name, format!("DROP TABLE IF EXISTS {name}; CREATE TABLE {name} AS {select};"))
}

/// One broken staging unit between two good ones, and a mart that only
/// depends on a good staging table.
fn manifest_with_broken_staging() -> Manifest {
    Manifest::new(vec![
        Layer::new(
            "staging",
            vec![
                unit("stg_first", "SELECT customer_id FROM raw_customers ORDER BY customer_id"),
                unit("stg_broken", "SELECT * FROM raw_table_that_does_not_exist"),
                unit("stg_last", "SELECT product_id FROM raw_products ORDER BY product_id"),
            ],
        ),
        Layer::new(
            "marts",
            vec![unit("dim_first", "SELECT COUNT(*) AS n FROM stg_first")],
        ),
    ])
    .expect("valid manifest")
}

#[test]
fn failing_unit_is_isolated_and_later_layers_still_run() {
    let mut store = seeded_store();
    let manifest = manifest_with_broken_staging();
    let report = TransformRunner::new(&manifest).run(&mut store);

    let staging = report.layer("staging").unwrap();
    assert_eq!((staging.ok, staging.errored, staging.skipped), (2, 1, 0));
    match &report.outcome("stg_broken").unwrap().status {
        UnitStatus::Errored { message } => {
            assert!(message.contains("raw_table_that_does_not_exist"), "{message}")
        }
        other => panic!("expected errored, got {other:?}"),
    }
    let marts = report.layer("marts").unwrap();
    assert_eq!((marts.ok, marts.errored), (1, 0));

    assert!(store.table_exists("stg_first").unwrap());
    assert!(store.table_exists("stg_last").unwrap());
    assert!(!store.table_exists("stg_broken").unwrap());
    assert_eq!(store.dump_table("dim_first").unwrap(), vec!["40".to_string()]);
    assert_eq!(report.failures().count(), 1);
    assert!(!report.is_clean());
}

#[test]
fn halt_policy_skips_layers_after_a_failure() {
    let mut store = seeded_store();
    let manifest = manifest_with_broken_staging();
    let report = TransformRunner::new(&manifest)
        .with_policy(FailurePolicy::HaltAfterFailedLayer)
        .run(&mut store);

    let staging = report.layer("staging").unwrap();
    assert_eq!((staging.ok, staging.errored), (2, 1));
    let marts = report.layer("marts").unwrap();
    assert_eq!((marts.ok, marts.errored, marts.skipped), (0, 0, 1));
    assert_eq!(report.outcome("dim_first").unwrap().status, UnitStatus::Skipped);
    assert!(!store.table_exists("dim_first").unwrap());
}

#[test]
fn units_run_in_declared_order() {
    let mut store = SimStore::in_memory().unwrap();
    store.migrate().unwrap();
    // The second unit reads the first; reversed, it would fail.
    let manifest = Manifest::new(vec![Layer::new(
        "staging",
        vec![unit("stg_a", "SELECT 1 AS v"), unit("stg_b", "SELECT v + 1 AS v FROM stg_a")],
    )])
    .unwrap();
    let report = TransformRunner::new(&manifest).run(&mut store);
    assert!(report.is_clean());
    assert_eq!(store.dump_table("stg_b").unwrap(), vec!["2".to_string()]);
}

#[test]
fn builtin_manifest_builds_every_table_cleanly() {
    let mut store = seeded_store();
    let manifest = Manifest::builtin().unwrap();
    let report = TransformRunner::new(&manifest).run(&mut store);
    assert!(report.is_clean(), "failures: {:?}", report.failures().collect::<Vec<_>>());
    for name in manifest.unit_names() {
        assert!(store.table_exists(name).unwrap(), "{name} missing");
    }
    assert_eq!(store.row_count("dim_customers").unwrap(), 40);
    assert_eq!(store.row_count("dim_products").unwrap(), 25);
    assert_eq!(store.row_count("analytics_funnel").unwrap(), 5);
    assert_eq!(
        store.row_count("fact_orders").unwrap(),
        store.row_count("raw_orders").unwrap()
    );
}

#[test]
fn rerunning_against_unchanged_raw_data_is_byte_identical() {
    let mut store = seeded_store();
    let manifest = Manifest::builtin().unwrap();
    let tables: Vec<String> = manifest.unit_names().map(String::from).collect();

    TransformRunner::new(&manifest).run(&mut store);
    let first: Vec<_> = tables.iter().map(|t| store.dump_table(t).unwrap()).collect();
    TransformRunner::new(&manifest).run(&mut store);
    let second: Vec<_> = tables.iter().map(|t| store.dump_table(t).unwrap()).collect();

    for (i, table) in tables.iter().enumerate() {
        assert_eq!(first[i], second[i], "{table} changed between runs");
    }
}

#[test]
fn malformed_manifests_are_invalid_arguments() {
    let dup = Manifest::new(vec![
        Layer::new("staging", vec![unit("stg_a", "SELECT 1 AS v")]),
        Layer::new("staging", vec![unit("stg_b", "SELECT 1 AS v")]),
    ]);
    assert!(matches!(dup, Err(SimError::InvalidArgument(_))));

    let empty_sql = Manifest::new(vec![Layer::new("staging", vec![Unit::new("stg_a", "  ")])]);
    assert!(matches!(empty_sql, Err(SimError::InvalidArgument(_))));

    assert!(matches!(
        Manifest::load("/definitely/not/here/manifest.json"),
        Err(SimError::InvalidArgument(_))
    ));
}
