//! End-to-end runs: argument checks, run bookkeeping, the report.

use chrono::NaiveDate;
use shopsim_core::{
    clock::SimClock,
    config::{SimConfig, Span},
    error::SimError,
    pipeline::{run_pipeline, Pipeline, RunReport},
    store::SimStore,
    transform::FailurePolicy,
};

fn clock() -> SimClock {
    SimClock::at_date(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap())
}

#[test]
fn zero_customers_is_rejected_before_any_write() {
    let mut store = SimStore::in_memory().unwrap();
    let err = run_pipeline(&mut store, 0, Some(1)).unwrap_err();
    assert!(matches!(err, SimError::InvalidArgument(_)));
    assert!(!store.table_exists("raw_customers").unwrap());
    assert!(!store.table_exists("pipeline_run").unwrap());
}

#[test]
fn invalid_config_is_rejected_before_any_write() {
    let mut config = SimConfig::default();
    config.funnel.checkout_probability = 1.5;
    let mut store = SimStore::in_memory().unwrap();
    let err = Pipeline::new(&mut store).unwrap().with_config(config).run(10, Some(1)).unwrap_err();
    assert!(matches!(err, SimError::InvalidArgument(_)));
    assert!(!store.table_exists("pipeline_run").unwrap());
}

#[test]
fn generate_rejects_unrepresentable_config_before_writing() {
    let mut store = SimStore::in_memory().unwrap();
    Pipeline::new(&mut store).unwrap().with_clock(clock()).run(20, Some(5)).unwrap();
    let before = store.dump_table("raw_customers").unwrap();

    let mut wide_quantity = SimConfig::default();
    wide_quantity.funnel.quantity = Span::new(1 << 32, 1 << 32);
    let mut inverted = SimConfig::default();
    inverted.funnel.complete_delay_secs = Span::new(600, 60);
    let mut long_history = SimConfig::default();
    long_history.customers.signup_window_days = 1_000_000_000;

    for config in [wide_quantity, inverted, long_history] {
        let err = Pipeline::new(&mut store)
            .unwrap()
            .with_clock(clock())
            .with_config(config)
            .generate(20, 5)
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidArgument(_)), "{err}");
        assert_eq!(store.dump_table("raw_customers").unwrap(), before);
    }
}

#[test]
fn failed_checkpoint_marks_the_run_failed_and_stays_unapplied() {
    let mut store = SimStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
        .execute_unit(
            "CREATE TRIGGER reject_items BEFORE INSERT ON raw_order_items
             BEGIN SELECT RAISE(ABORT, 'order items rejected'); END;",
        )
        .unwrap();

    let err = Pipeline::new(&mut store)
        .unwrap()
        .with_clock(clock())
        .run(30, Some(9))
        .unwrap_err();
    assert!(matches!(err, SimError::Database(_)), "{err}");

    let row = store.latest_run().unwrap().expect("run row");
    assert_eq!(row.status, "failed");
    assert!(row.report_json.is_none());
    // Checkpoint 1 committed; checkpoint 2 rolled back whole; checkpoint 3 never ran.
    assert_eq!(store.row_count("raw_customers").unwrap(), 30);
    assert_eq!(store.row_count("raw_events").unwrap(), 0);
    assert_eq!(store.row_count("raw_orders").unwrap(), 0);
    assert_eq!(store.row_count("raw_order_items").unwrap(), 0);
    assert_eq!(store.row_count("raw_ab_tests").unwrap(), 0);
    assert!(!store.table_exists("analytics_funnel").unwrap());
}

#[test]
fn run_is_recorded_with_its_report() {
    let mut store = SimStore::in_memory().unwrap();
    let report = Pipeline::new(&mut store)
        .unwrap()
        .with_clock(clock())
        .run(25, Some(77))
        .unwrap();

    assert!(report.run_id.starts_with("run-"));
    assert_eq!(report.seed, 77);
    assert_eq!(report.as_of, "2024-06-30T00:00:00");
    assert!(report.transform.is_clean());
    assert_eq!(report.transform.layers.len(), 3);

    let row = store.latest_run().unwrap().expect("run row");
    assert_eq!(row.run_id, report.run_id);
    assert_eq!(row.seed, 77);
    assert_eq!(row.customer_count, 25);
    assert_eq!(row.status, "complete");
    let stored: RunReport = serde_json::from_str(row.report_json.as_deref().unwrap()).unwrap();
    assert_eq!(stored, report);
}

#[test]
fn missing_seed_is_generated_and_reported() {
    let mut store = SimStore::in_memory().unwrap();
    let report = Pipeline::new(&mut store).unwrap().with_clock(clock()).run(5, None).unwrap();
    let row = store.latest_run().unwrap().unwrap();
    assert_eq!(row.seed, report.seed);
}

#[test]
fn downstream_tables_exist_after_a_run() {
    let mut store = SimStore::in_memory().unwrap();
    Pipeline::new(&mut store)
        .unwrap()
        .with_clock(clock())
        .with_policy(FailurePolicy::HaltAfterFailedLayer)
        .run(30, Some(3))
        .unwrap();
    for table in [
        "analytics_attribution",
        "analytics_funnel",
        "analytics_cohort_retention",
        "analytics_rfm",
        "analytics_customer_ltv",
        "analytics_revenue_trends",
        "analytics_channel_device",
        "analytics_ab_results",
        "dim_customers",
        "dim_products",
        "fact_orders",
        "fact_sessions",
    ] {
        assert!(store.table_exists(table).unwrap(), "{table} missing");
    }
    // Six channels at most, one row each.
    let attribution = store.row_count("analytics_attribution").unwrap();
    assert!((1..=6).contains(&attribution));
    // Two arms per test.
    assert_eq!(store.row_count("analytics_ab_results").unwrap(), 8);
}
