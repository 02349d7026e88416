//! Generation parameters.
//!
//! Every field has a default matching the documented model, so a config
//! file only needs to list what it overrides.

use crate::{
    error::{SimError, SimResult},
    types::{Channel, Label},
};
use serde::{Deserialize, Serialize};

/// Longest signup history a config may ask for (ten years).
pub const MAX_SIGNUP_WINDOW_DAYS: u64 = 3_650;
/// Ceiling for every in-session offset or delay: one day.
pub const MAX_SESSION_OFFSET_SECS: u64 = 86_400;

/// Inclusive integer range `[lo, hi]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    pub lo: u64,
    pub hi: u64,
}

impl Span {
    pub const fn new(lo: u64, hi: u64) -> Self {
        Self { lo, hi }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerConfig {
    /// Upper bound of days-since-signup; the lower bound is 1.
    pub signup_window_days: u64,
    /// Acquisition channel weights. Equal weights give a uniform draw.
    pub channel_weights: Vec<(Channel, f64)>,
}

impl Default for CustomerConfig {
    fn default() -> Self {
        Self {
            signup_window_days: 350,
            channel_weights: Channel::ALL.iter().map(|c| (*c, 1.0)).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelConfig {
    pub sessions_per_customer: Span,
    /// Probability a session keeps the customer's acquisition channel.
    pub original_channel_probability: f64,
    pub products_browsed: Span,
    /// Seconds between consecutive product views.
    pub view_spacing_secs: u64,
    pub time_on_page_secs: Span,
    pub add_to_cart_probability: f64,
    pub add_to_cart_offset_secs: Span,
    pub checkout_probability: f64,
    pub checkout_offset_secs: Span,
    pub abandon_probability: f64,
    pub abandon_delay_secs: Span,
    pub complete_delay_secs: Span,
    pub quantity: Span,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            sessions_per_customer: Span::new(1, 12),
            original_channel_probability: 0.6,
            products_browsed: Span::new(1, 6),
            view_spacing_secs: 30,
            time_on_page_secs: Span::new(5, 180),
            add_to_cart_probability: 0.35,
            add_to_cart_offset_secs: Span::new(120, 300),
            checkout_probability: 0.55,
            checkout_offset_secs: Span::new(300, 600),
            abandon_probability: 0.25,
            abandon_delay_secs: Span::new(30, 300),
            complete_delay_secs: Span::new(60, 600),
            quantity: Span::new(1, 3),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub tax_rate: f64,
    /// Orders with a subtotal strictly above this ship free.
    pub free_shipping_threshold: f64,
    pub shipping_fee: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate: 0.08,
            free_shipping_threshold: 50.0,
            shipping_fee: 9.99,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub pool_fraction_min: f64,
    pub pool_fraction_max: f64,
    /// Treatment multiplier on conversion value for average-order-value tests.
    pub aov_treatment_multiplier: f64,
    /// Extra conversion probability for customers with at least one order.
    pub buyer_uplift: f64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            pool_fraction_min: 0.6,
            pool_fraction_max: 0.8,
            aov_treatment_multiplier: 1.12,
            buyer_uplift: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub customers: CustomerConfig,
    pub funnel: FunnelConfig,
    pub pricing: PricingConfig,
    pub experiments: ExperimentConfig,
}

impl SimConfig {
    /// Load overrides from a JSON file. Missing sections keep defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SimConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        let f = &self.funnel;
        for (name, p) in [
            ("funnel.original_channel_probability", f.original_channel_probability),
            ("funnel.add_to_cart_probability", f.add_to_cart_probability),
            ("funnel.checkout_probability", f.checkout_probability),
            ("funnel.abandon_probability", f.abandon_probability),
            ("experiments.buyer_uplift", self.experiments.buyer_uplift),
            ("pricing.tax_rate", self.pricing.tax_rate),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(SimError::InvalidArgument(format!("{name} must be in [0, 1], got {p}")));
            }
        }

        let per_row = u64::from(u32::MAX);
        for (name, span, max) in [
            ("funnel.sessions_per_customer", f.sessions_per_customer, u64::MAX),
            ("funnel.products_browsed", f.products_browsed, u64::MAX),
            ("funnel.time_on_page_secs", f.time_on_page_secs, per_row),
            ("funnel.add_to_cart_offset_secs", f.add_to_cart_offset_secs, MAX_SESSION_OFFSET_SECS),
            ("funnel.checkout_offset_secs", f.checkout_offset_secs, MAX_SESSION_OFFSET_SECS),
            ("funnel.abandon_delay_secs", f.abandon_delay_secs, MAX_SESSION_OFFSET_SECS),
            ("funnel.complete_delay_secs", f.complete_delay_secs, MAX_SESSION_OFFSET_SECS),
            ("funnel.quantity", f.quantity, per_row),
        ] {
            if span.lo > span.hi {
                return Err(SimError::InvalidArgument(format!(
                    "{name} is empty: lo {} > hi {}",
                    span.lo, span.hi
                )));
            }
            if span.hi > max {
                return Err(SimError::InvalidArgument(format!("{name} ends at {}, above {max}", span.hi)));
            }
        }
        if f.view_spacing_secs > MAX_SESSION_OFFSET_SECS {
            return Err(SimError::InvalidArgument(format!(
                "funnel.view_spacing_secs must be at most {MAX_SESSION_OFFSET_SECS}"
            )));
        }
        if f.quantity.lo == 0 {
            return Err(SimError::InvalidArgument("funnel.quantity must start at 1".into()));
        }
        if f.sessions_per_customer.lo == 0 || f.products_browsed.lo == 0 {
            return Err(SimError::InvalidArgument(
                "every session needs at least one visit and one product view".into(),
            ));
        }
        // Cart events must land at or before checkout start.
        if f.add_to_cart_offset_secs.hi > f.checkout_offset_secs.lo {
            return Err(SimError::InvalidArgument(
                "funnel.add_to_cart_offset_secs must end before checkout_offset_secs starts".into(),
            ));
        }
        if f.products_browsed.hi.saturating_mul(f.view_spacing_secs) > f.checkout_offset_secs.lo {
            return Err(SimError::InvalidArgument(
                "product views must finish before checkout_offset_secs starts".into(),
            ));
        }

        let c = &self.customers;
        if !(1..=MAX_SIGNUP_WINDOW_DAYS).contains(&c.signup_window_days) {
            return Err(SimError::InvalidArgument(format!(
                "customers.signup_window_days must be in [1, {MAX_SIGNUP_WINDOW_DAYS}], got {}",
                c.signup_window_days
            )));
        }
        if c.channel_weights.is_empty() || c.channel_weights.iter().any(|(_, w)| !(w.is_finite() && *w >= 0.0)) {
            return Err(SimError::InvalidArgument(
                "customers.channel_weights must be non-empty and non-negative".into(),
            ));
        }

        let e = &self.experiments;
        if !(0.0..=1.0).contains(&e.pool_fraction_min)
            || !(0.0..=1.0).contains(&e.pool_fraction_max)
            || e.pool_fraction_min > e.pool_fraction_max
        {
            return Err(SimError::InvalidArgument(format!(
                "experiments pool fraction range [{}, {}] is invalid",
                e.pool_fraction_min, e.pool_fraction_max
            )));
        }
        if !(e.aov_treatment_multiplier.is_finite() && e.aov_treatment_multiplier > 0.0) {
            return Err(SimError::InvalidArgument(format!(
                "experiments.aov_treatment_multiplier must be positive, got {}",
                e.aov_treatment_multiplier
            )));
        }

        let p = &self.pricing;
        for (name, amount) in [
            ("pricing.free_shipping_threshold", p.free_shipping_threshold),
            ("pricing.shipping_fee", p.shipping_fee),
        ] {
            if !(amount.is_finite() && amount >= 0.0) {
                return Err(SimError::InvalidArgument(format!("{name} must be a non-negative amount, got {amount}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg: SimConfig =
            serde_json::from_str(r#"{ "funnel": { "checkout_probability": 0.9 } }"#).unwrap();
        assert_eq!(cfg.funnel.checkout_probability, 0.9);
        assert_eq!(cfg.funnel.abandon_probability, 0.25);
        assert_eq!(cfg.pricing.shipping_fee, 9.99);
        assert_eq!(cfg.customers.channel_weights.len(), Channel::ALL.len());
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let mut cfg = SimConfig::default();
        cfg.funnel.abandon_probability = 1.5;
        assert!(matches!(cfg.validate(), Err(SimError::InvalidArgument(_))));
    }

    #[test]
    fn rejects_cart_window_overlapping_checkout() {
        let mut cfg = SimConfig::default();
        cfg.funnel.add_to_cart_offset_secs = Span::new(120, 900);
        assert!(matches!(cfg.validate(), Err(SimError::InvalidArgument(_))));
    }

    #[test]
    fn rejects_values_generation_cannot_represent() {
        let cases: [fn(&mut SimConfig); 6] = [
            |c| c.customers.signup_window_days = 1_000_000_000,
            |c| c.funnel.complete_delay_secs = Span::new(60, u64::MAX / 4),
            |c| c.funnel.abandon_delay_secs = Span::new(30, MAX_SESSION_OFFSET_SECS + 1),
            |c| c.funnel.quantity = Span::new(1 << 32, 1 << 32),
            |c| c.funnel.time_on_page_secs = Span::new(5, u64::from(u32::MAX) + 1),
            |c| c.funnel.view_spacing_secs = u64::MAX,
        ];
        for (i, tweak) in cases.iter().enumerate() {
            let mut cfg = SimConfig::default();
            tweak(&mut cfg);
            assert!(matches!(cfg.validate(), Err(SimError::InvalidArgument(_))), "case {i} passed validation");
        }
    }

    #[test]
    fn upper_bounds_themselves_are_accepted() {
        let mut cfg = SimConfig::default();
        cfg.customers.signup_window_days = MAX_SIGNUP_WINDOW_DAYS;
        cfg.funnel.complete_delay_secs = Span::new(60, MAX_SESSION_OFFSET_SECS);
        cfg.funnel.quantity = Span::new(1, u64::from(u32::MAX));
        cfg.validate().unwrap();
    }
}
