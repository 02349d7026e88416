//! Controlled-experiment simulator.
//!
//! The experiment catalog is hand-authored and fixed; only pools,
//! variants, and outcomes are drawn. Conversion-rate tests draw values
//! from one flat distribution for both arms. Average-order-value tests
//! use a separate model where treatment values are scaled up.

use crate::{
    clock::SimClock,
    config::ExperimentConfig,
    customer::Customer,
    error::{SimError, SimResult},
    rng::StreamRng,
    types::{round2, EntityId, MetricKind, TestStatus, Variant},
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbTest {
    pub test_id: EntityId,
    pub name: String,
    pub description: String,
    pub metric: MetricKind,
    pub start_date: NaiveDate,
    /// Absent while the test is still running.
    pub end_date: Option<NaiveDate>,
    pub status: TestStatus,
}

/// A test plus the true effect the simulator plants in it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentDef {
    pub test: AbTest,
    pub base_rate: f64,
    pub lift: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbAssignment {
    pub assignment_id: EntityId,
    pub test_id: EntityId,
    pub customer_id: EntityId,
    pub variant: Variant,
    pub assigned_at: NaiveDateTime,
    pub converted: bool,
    pub conversion_value: f64,
}

impl AbAssignment {
    pub fn new(
        assignment_id: EntityId,
        test_id: EntityId,
        customer_id: EntityId,
        variant: Variant,
        assigned_at: NaiveDateTime,
        converted: bool,
        conversion_value: f64,
    ) -> SimResult<Self> {
        if !converted && conversion_value != 0.0 {
            return Err(SimError::invalid_record(
                "ab_assignment",
                format!("#{assignment_id} did not convert but carries value {conversion_value}"),
            ));
        }
        if !(conversion_value.is_finite() && conversion_value >= 0.0) {
            return Err(SimError::invalid_record(
                "ab_assignment",
                format!("#{assignment_id} conversion value {conversion_value}"),
            ));
        }
        Ok(Self {
            assignment_id,
            test_id,
            customer_id,
            variant,
            assigned_at,
            converted,
            conversion_value,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExperimentOutput {
    pub tests: Vec<AbTest>,
    pub assignments: Vec<AbAssignment>,
}

/// The four experiments, dated relative to `as_of`.
pub fn experiment_catalog(clock: &SimClock) -> Vec<ExperimentDef> {
    let day = |days: i64| clock.days_before(days).date();
    let def = |test_id, name: &str, description: &str, metric, window: (i64, Option<i64>), rates: (f64, f64)| {
        let (start, end) = window;
        ExperimentDef {
            test: AbTest {
                test_id,
                name: name.into(),
                description: description.into(),
                metric,
                start_date: day(start),
                end_date: end.map(day),
                status: if end.is_some() { TestStatus::Completed } else { TestStatus::Running },
            },
            base_rate: rates.0,
            lift: rates.1,
        }
    };

    vec![
        def(
            1,
            "Checkout Flow Redesign",
            "Simplified single-page checkout vs multi-step",
            MetricKind::ConversionRate,
            (90, Some(30)),
            (0.12, 0.035),
        ),
        def(
            2,
            "Homepage Hero Banner",
            "Product carousel vs lifestyle image hero",
            MetricKind::ConversionRate,
            (60, Some(15)),
            (0.08, 0.012),
        ),
        def(
            3,
            "Free Shipping Threshold",
            "$50 free shipping vs $35 free shipping threshold",
            MetricKind::AvgOrderValue,
            (45, Some(5)),
            (0.15, 0.045),
        ),
        def(
            4,
            "Product Page Layout",
            "Larger images with sticky add-to-cart vs standard layout",
            MetricKind::ConversionRate,
            (20, None),
            (0.10, 0.018),
        ),
    ]
}

pub struct ExperimentSimulator<'a> {
    config: &'a ExperimentConfig,
    clock: &'a SimClock,
    catalog: Vec<ExperimentDef>,
}

impl<'a> ExperimentSimulator<'a> {
    pub fn new(config: &'a ExperimentConfig, clock: &'a SimClock) -> Self {
        Self { config, clock, catalog: experiment_catalog(clock) }
    }

    /// `buyers` holds every customer with at least one order.
    pub fn run(
        &self,
        customers: &[Customer],
        buyers: &HashSet<EntityId>,
        rng: &mut StreamRng,
    ) -> SimResult<ExperimentOutput> {
        let mut out = ExperimentOutput::default();
        let mut next_id: EntityId = 0;

        for def in &self.catalog {
            let window_start = def.test.start_date.and_time(chrono::NaiveTime::MIN);
            let window_end = def
                .test
                .end_date
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
                .unwrap_or(self.clock.as_of);

            let fraction = self.config.pool_fraction_min
                + rng.next_f64() * (self.config.pool_fraction_max - self.config.pool_fraction_min);
            let pool_size = (customers.len() as f64 * fraction) as usize;
            let pool = rng.sample_indices(customers.len(), pool_size);

            let mut conversions = 0usize;
            for idx in pool {
                let customer = &customers[idx];
                let variant = if rng.chance(0.5) { Variant::Control } else { Variant::Treatment };
                let assigned_at = SimClock::uniform_between(rng, window_start, window_end);

                let mut rate = match variant {
                    Variant::Control => def.base_rate,
                    Variant::Treatment => def.base_rate + def.lift,
                };
                if buyers.contains(&customer.customer_id) {
                    rate += self.config.buyer_uplift;
                }
                let converted = rng.chance(rate.min(1.0));
                let value = if converted { self.conversion_value(def, variant, rng) } else { 0.0 };

                next_id += 1;
                out.assignments.push(AbAssignment::new(
                    next_id,
                    def.test.test_id,
                    customer.customer_id,
                    variant,
                    assigned_at,
                    converted,
                    value,
                )?);
                conversions += converted as usize;
            }
            log::debug!(
                "{}: test {} '{}' pooled {pool_size} customers, {conversions} converted",
                rng.name,
                def.test.test_id,
                def.test.name
            );
            out.tests.push(def.test.clone());
        }

        log::info!(
            "{}: {} experiments, {} assignments",
            rng.name,
            out.tests.len(),
            out.assignments.len()
        );
        Ok(out)
    }

    fn conversion_value(&self, def: &ExperimentDef, variant: Variant, rng: &mut StreamRng) -> f64 {
        let raw = match def.test.metric {
            MetricKind::AvgOrderValue => {
                let base = 60.0 + rng.next_f64() * 80.0;
                match variant {
                    Variant::Control => base,
                    Variant::Treatment => base * self.config.aov_treatment_multiplier,
                }
            }
            MetricKind::ConversionRate => 40.0 + rng.next_f64() * 120.0,
        };
        round2(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustomerConfig;
    use crate::customer::generate_customers;
    use crate::rng::{RngBank, StreamSlot};

    fn clock() -> SimClock {
        SimClock::at_date(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap())
    }

    fn population(n: usize) -> Vec<Customer> {
        let mut rng = RngBank::new(21).for_stream(StreamSlot::Customer);
        generate_customers(n, &CustomerConfig::default(), &clock(), &mut rng).unwrap()
    }

    #[test]
    fn conversion_values_follow_each_metric_model() {
        let c = clock();
        let config = ExperimentConfig::default();
        let mut sim = ExperimentSimulator::new(&config, &c);
        for def in &mut sim.catalog {
            def.base_rate = 0.5;
        }
        let mut rng = RngBank::new(8).for_stream(StreamSlot::Experiment);
        let out = sim.run(&population(2_000), &HashSet::new(), &mut rng).unwrap();

        let metric = |test_id: EntityId| out.tests.iter().find(|t| t.test_id == test_id).map(|t| t.metric).unwrap();
        let (mut aov_control, mut aov_treatment) = (Vec::new(), Vec::new());
        for a in out.assignments.iter().filter(|a| a.converted) {
            let v = a.conversion_value;
            match (metric(a.test_id), a.variant) {
                (MetricKind::AvgOrderValue, Variant::Control) => {
                    assert!((60.0..=140.0).contains(&v), "aov control {v}");
                    aov_control.push(v);
                }
                (MetricKind::AvgOrderValue, Variant::Treatment) => {
                    assert!((67.2..=156.8).contains(&v), "aov treatment {v}");
                    aov_treatment.push(v);
                }
                (MetricKind::ConversionRate, variant) => {
                    assert!((40.0..=160.0).contains(&v), "{variant:?} conversion value {v}");
                }
            }
        }
        // Both ends of each AOV arm are actually reached.
        assert!(aov_control.iter().any(|v| *v < 67.2));
        assert!(aov_treatment.iter().any(|v| *v > 140.0));
    }

    #[test]
    fn large_lift_favours_treatment() {
        let c = clock();
        let config = ExperimentConfig::default();
        let mut sim = ExperimentSimulator::new(&config, &c);
        for def in &mut sim.catalog {
            def.base_rate = 0.1;
            def.lift = 0.4;
        }
        let mut rng = RngBank::new(13).for_stream(StreamSlot::Experiment);
        let out = sim.run(&population(1_000), &HashSet::new(), &mut rng).unwrap();

        for test in &out.tests {
            let rate = |variant: Variant| {
                let arm: Vec<_> = out
                    .assignments
                    .iter()
                    .filter(|a| a.test_id == test.test_id && a.variant == variant)
                    .collect();
                arm.iter().filter(|a| a.converted).count() as f64 / arm.len() as f64
            };
            let (control, treatment) = (rate(Variant::Control), rate(Variant::Treatment));
            assert!(treatment > control + 0.2, "test {}: control {control}, treatment {treatment}", test.test_id);
        }
    }

    #[test]
    fn catalog_is_fixed_with_one_running_test() {
        let c = clock();
        let tests = experiment_catalog(&c);
        assert_eq!(tests.len(), 4);
        assert_eq!(tests, experiment_catalog(&c));

        let running: Vec<_> = tests.iter().filter(|d| d.test.status == TestStatus::Running).collect();
        assert_eq!(running.len(), 1);
        assert!(running[0].test.end_date.is_none());
        for d in &tests {
            if let Some(end) = d.test.end_date {
                assert!(d.test.start_date < end);
            }
            assert!(d.lift > 0.0);
        }
    }

    #[test]
    fn non_converted_assignment_cannot_carry_value() {
        let t = clock().as_of;
        assert!(AbAssignment::new(1, 1, 1, Variant::Control, t, false, 12.5).is_err());
        assert!(AbAssignment::new(1, 1, 1, Variant::Control, t, false, 0.0).is_ok());
        assert!(AbAssignment::new(1, 1, 1, Variant::Treatment, t, true, 80.0).is_ok());
    }
}
