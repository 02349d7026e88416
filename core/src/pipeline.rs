//! The generate-then-transform pipeline.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   1. Catalog + customers     → checkpoint 1 (raw tables reset first)
//!   2. Behavioural funnel      → checkpoint 2
//!   3. Experiments             → checkpoint 3
//!   4. Transformation runner   → one transaction per unit
//!
//! RULES:
//!   - Data flows strictly forward; the runner never calls a generator.
//!   - All randomness flows through the RngBank, one stream per generator.
//!   - Every checkpoint is verified in memory before it is committed.
//!   - Arguments are validated before anything touches the store.

use crate::{
    catalog::generate_catalog,
    clock::{format_ts, SimClock},
    config::SimConfig,
    customer::generate_customers,
    error::{SimError, SimResult},
    experiment::ExperimentSimulator,
    funnel::{FunnelSimulator, SessionTally},
    integrity,
    rng::{RngBank, StreamSlot},
    store::SimStore,
    transform::{FailurePolicy, Manifest, TransformReport, TransformRunner},
    types::{EntityId, RunId},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Rows written per raw table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCounts {
    pub products: usize,
    pub customers: usize,
    pub events: usize,
    pub orders: usize,
    pub order_items: usize,
    pub ab_tests: usize,
    pub ab_assignments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub seed: u64,
    pub as_of: String,
    pub counts: GeneratedCounts,
    pub sessions: SessionTally,
    pub transform: TransformReport,
}

pub struct Pipeline<'a> {
    store: &'a mut SimStore,
    config: SimConfig,
    manifest: Manifest,
    clock: SimClock,
    policy: FailurePolicy,
}

impl<'a> Pipeline<'a> {
    /// Default config, built-in manifest, `as_of` = start of today.
    pub fn new(store: &'a mut SimStore) -> SimResult<Self> {
        Ok(Self {
            store,
            config: SimConfig::default(),
            manifest: Manifest::builtin()?,
            clock: SimClock::today(),
            policy: FailurePolicy::default(),
        })
    }

    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_clock(mut self, clock: SimClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Generate a fresh raw population, then rebuild every derived table.
    /// Without a seed one is taken from the system time and reported.
    pub fn run(&mut self, customer_count: usize, seed: Option<u64>) -> SimResult<RunReport> {
        self.check_generation_args(customer_count)?;
        self.manifest.validate()?;

        let seed = seed.unwrap_or_else(|| {
            let seed = seed_from_time();
            log::info!("no seed given, using {seed}");
            seed
        });
        let run_id = format!("run-{}", uuid::Uuid::new_v4());
        let as_of = format_ts(self.clock.as_of);

        self.store.migrate()?;
        self.store
            .insert_run(&run_id, seed, customer_count, &as_of, env!("CARGO_PKG_VERSION"))?;
        log::info!("{run_id}: seed {seed}, {customer_count} customers, as of {as_of}");

        let (counts, sessions) = match self.generate(customer_count, seed) {
            Ok(generated) => generated,
            Err(e) => {
                log::error!("{run_id}: generation aborted: {e}");
                self.store.set_run_status(&run_id, "failed")?;
                return Err(e);
            }
        };

        self.store.set_run_status(&run_id, "transforming")?;
        let transform = self.transform();

        let report = RunReport { run_id, seed, as_of, counts, sessions, transform };
        let json = serde_json::to_string(&report)?;
        self.store.finish_run(&report.run_id, "complete", &json)?;
        log::info!(
            "{}: complete, {} units ok, {} errored, {} skipped",
            report.run_id,
            report.transform.ok(),
            report.transform.errored(),
            report.transform.skipped()
        );
        Ok(report)
    }

    /// Run the three generators and commit their checkpoints.
    /// Rejects bad arguments before the first checkpoint touches the store.
    pub fn generate(&mut self, customer_count: usize, seed: u64) -> SimResult<(GeneratedCounts, SessionTally)> {
        self.check_generation_args(customer_count)?;
        let bank = RngBank::new(seed);
        let clock = &self.clock;

        let products = generate_catalog(clock)?;
        let mut rng = bank.for_stream(StreamSlot::Customer);
        let customers = generate_customers(customer_count, &self.config.customers, clock, &mut rng)?;
        integrity::verify_customers(&customers)?;
        self.store.write_catalog_checkpoint(&products, &customers)?;

        let mut rng = bank.for_stream(StreamSlot::Funnel);
        let funnel = FunnelSimulator::new(&self.config.funnel, &self.config.pricing, clock, &products)
            .run(&customers, &mut rng)?;
        integrity::verify_funnel(&customers, &products, &funnel, &self.config.pricing)?;
        self.store.write_funnel_checkpoint(&funnel)?;

        let buyers: HashSet<EntityId> = funnel.orders.iter().map(|o| o.customer_id).collect();
        let mut rng = bank.for_stream(StreamSlot::Experiment);
        let experiments =
            ExperimentSimulator::new(&self.config.experiments, clock).run(&customers, &buyers, &mut rng)?;
        integrity::verify_experiments(&customers, &experiments)?;
        self.store.write_experiment_checkpoint(&experiments)?;

        let counts = GeneratedCounts {
            products: products.len(),
            customers: customers.len(),
            events: funnel.events.len(),
            orders: funnel.orders.len(),
            order_items: funnel.items.len(),
            ab_tests: experiments.tests.len(),
            ab_assignments: experiments.assignments.len(),
        };
        Ok((counts, funnel.tally))
    }

    fn check_generation_args(&self, customer_count: usize) -> SimResult<()> {
        if customer_count == 0 {
            return Err(SimError::InvalidArgument("customer count must be at least 1".into()));
        }
        self.config.validate()
    }

    /// Rebuild derived tables from whatever raw data the store holds.
    pub fn transform(&mut self) -> TransformReport {
        TransformRunner::new(&self.manifest)
            .with_policy(self.policy)
            .run(self.store)
    }
}

/// Default config, built-in manifest, today's clock.
pub fn run_pipeline(store: &mut SimStore, customer_count: usize, seed: Option<u64>) -> SimResult<RunReport> {
    Pipeline::new(store)?.run(customer_count, seed)
}

fn seed_from_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
