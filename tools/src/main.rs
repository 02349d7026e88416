//! pipeline-runner: headless generate-then-transform runner.
//!
//! Usage:
//!   pipeline-runner --customers 200 --seed 42 --db warehouse.db
//!   pipeline-runner --customers 50 --as-of 2024-06-30 --manifest models/manifest.json --report-json
//!
//! Flags:
//!   --customers N             customers to generate (default 200)
//!   --seed N                  master seed (default: derived from the clock and reported)
//!   --db PATH                 SQLite warehouse (default :memory:)
//!   --as-of YYYY-MM-DD        end of the simulated history (default: today)
//!   --config PATH             SimConfig JSON
//!   --manifest PATH           transformation manifest JSON (default: built-in)
//!   --halt-on-failed-layer    skip later layers once a layer has a failed unit
//!   --report-json             print the run report as JSON instead of a summary

use anyhow::{Context, Result};
use chrono::NaiveDate;
use shopsim_core::{
    clock::SimClock,
    config::SimConfig,
    pipeline::{Pipeline, RunReport},
    store::SimStore,
    transform::{FailurePolicy, Manifest, UnitStatus},
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let customers = parse_arg(&args, "--customers", 200usize);
    let seed = parse_opt::<u64>(&args, "--seed");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let halt = args.iter().any(|a| a == "--halt-on-failed-layer");
    let report_json = args.iter().any(|a| a == "--report-json");

    let clock = match flag_value(&args, "--as-of") {
        Some(s) => SimClock::at_date(
            NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("--as-of {s} is not YYYY-MM-DD"))?,
        ),
        None => SimClock::today(),
    };
    let config = match flag_value(&args, "--config") {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    let manifest = match flag_value(&args, "--manifest") {
        Some(path) => Manifest::load(path)?,
        None => Manifest::builtin()?,
    };
    let policy = if halt { FailurePolicy::HaltAfterFailedLayer } else { FailurePolicy::Continue };

    if !report_json {
        println!("shopsim pipeline-runner");
        println!("  customers: {customers}");
        println!("  seed:      {}", seed.map(|s| s.to_string()).unwrap_or_else(|| "(from clock)".into()));
        println!("  db:        {db}");
        println!("  as_of:     {}", clock.as_of.date());
        println!("  policy:    {policy:?}");
        println!();
    }

    let mut store = SimStore::open(db)?;
    let report = Pipeline::new(&mut store)?
        .with_config(config)
        .with_manifest(manifest)
        .with_clock(clock)
        .with_policy(policy)
        .run(customers, seed)?;
    log_outcome(&report);

    if report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn log_outcome(report: &RunReport) {
    for (unit, message) in report.transform.failures() {
        log::warn!("{}: unit {unit} errored: {message}", report.run_id);
    }
    if report.transform.skipped() > 0 {
        log::warn!("{}: {} units skipped after a failed layer", report.run_id, report.transform.skipped());
    }
    let total: usize = report.transform.layers.iter().map(|l| l.units.len()).sum();
    log::info!("{}: {} of {total} units ok", report.run_id, report.transform.ok());
}

fn print_summary(report: &RunReport) {
    let c = &report.counts;
    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {}", report.run_id);
    println!("  seed:           {}", report.seed);
    println!("  as_of:          {}", report.as_of);
    println!("  products:       {}", c.products);
    println!("  customers:      {}", c.customers);
    println!("  sessions:       {}", report.sessions.sessions);
    println!("  events:         {}", c.events);
    println!("  orders:         {}", c.orders);
    println!("  order items:    {}", c.order_items);
    println!("  abandoned:      {}", report.sessions.checkout_abandoned);
    println!("  ab tests:       {}", c.ab_tests);
    println!("  assignments:    {}", c.ab_assignments);

    println!();
    println!("=== TRANSFORMATIONS ===");
    for layer in &report.transform.layers {
        println!(
            "  {:<10} {:>3} ok  {:>3} errored  {:>3} skipped",
            layer.layer, layer.ok, layer.errored, layer.skipped
        );
        for unit in &layer.units {
            if let UnitStatus::Errored { message } = &unit.status {
                println!("    ERR {}: {message}", unit.unit);
            }
        }
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    parse_opt(args, flag).unwrap_or(default)
}

fn parse_opt<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    flag_value(args, flag).and_then(|v| v.parse().ok())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}
