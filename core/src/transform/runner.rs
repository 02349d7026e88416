//! Executes a manifest against the store.
//!
//! RULES:
//!   - Layers run strictly in manifest order, units in declared order.
//!   - Each unit is one transaction; a failing unit changes nothing.
//!   - A failing unit is data in the report, never an error of the run.
//!   - No dependency inference: order is whatever the manifest says.

use super::manifest::{Layer, Manifest};
use crate::store::SimStore;
use serde::{Deserialize, Serialize};

/// What happens to later layers once a layer has an errored unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Run every remaining layer anyway.
    #[default]
    Continue,
    /// Mark every unit of every later layer as skipped.
    HaltAfterFailedLayer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    Ok,
    Errored { message: String },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOutcome {
    pub unit: String,
    #[serde(flatten)]
    pub status: UnitStatus,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerReport {
    pub layer: String,
    pub ok: usize,
    pub errored: usize,
    pub skipped: usize,
    pub units: Vec<UnitOutcome>,
}

impl LayerReport {
    fn new(layer: &Layer) -> Self {
        Self { layer: layer.name.clone(), ..Default::default() }
    }

    fn record(&mut self, unit: &str, status: UnitStatus) {
        match status {
            UnitStatus::Ok => self.ok += 1,
            UnitStatus::Errored { .. } => self.errored += 1,
            UnitStatus::Skipped => self.skipped += 1,
        }
        self.units.push(UnitOutcome { unit: unit.to_string(), status });
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformReport {
    pub policy: FailurePolicy,
    pub layers: Vec<LayerReport>,
}

impl TransformReport {
    pub fn ok(&self) -> usize {
        self.layers.iter().map(|l| l.ok).sum()
    }

    pub fn errored(&self) -> usize {
        self.layers.iter().map(|l| l.errored).sum()
    }

    pub fn skipped(&self) -> usize {
        self.layers.iter().map(|l| l.skipped).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.errored() == 0 && self.skipped() == 0
    }

    pub fn layer(&self, name: &str) -> Option<&LayerReport> {
        self.layers.iter().find(|l| l.layer == name)
    }

    pub fn outcome(&self, unit: &str) -> Option<&UnitOutcome> {
        self.layers.iter().flat_map(|l| &l.units).find(|u| u.unit == unit)
    }

    /// (unit, message) for every errored unit, in execution order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.layers.iter().flat_map(|l| &l.units).filter_map(|u| match &u.status {
            UnitStatus::Errored { message } => Some((u.unit.as_str(), message.as_str())),
            _ => None,
        })
    }
}

pub struct TransformRunner<'a> {
    manifest: &'a Manifest,
    policy: FailurePolicy,
}

impl<'a> TransformRunner<'a> {
    pub fn new(manifest: &'a Manifest) -> Self {
        Self { manifest, policy: FailurePolicy::default() }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn run(&self, store: &mut SimStore) -> TransformReport {
        let mut report = TransformReport { policy: self.policy, layers: Vec::with_capacity(self.manifest.layers.len()) };
        let mut halted_by: Option<&str> = None;

        for layer in &self.manifest.layers {
            let mut layer_report = LayerReport::new(layer);

            if let Some(failed) = halted_by {
                log::warn!("layer {}: skipped, layer {failed} had failures", layer.name);
                for unit in &layer.units {
                    layer_report.record(&unit.name, UnitStatus::Skipped);
                }
                report.layers.push(layer_report);
                continue;
            }

            for unit in &layer.units {
                let status = match store.execute_unit(&unit.sql) {
                    Ok(()) => {
                        log::debug!("{}/{}: ok", layer.name, unit.name);
                        UnitStatus::Ok
                    }
                    Err(e) => {
                        log::warn!("{}/{}: failed: {e}", layer.name, unit.name);
                        UnitStatus::Errored { message: e.to_string() }
                    }
                };
                layer_report.record(&unit.name, status);
            }

            log::info!(
                "layer {}: {} ok, {} errored",
                layer.name,
                layer_report.ok,
                layer_report.errored
            );
            if layer_report.errored > 0 && self.policy == FailurePolicy::HaltAfterFailedLayer {
                halted_by = Some(layer.name.as_str());
            }
            report.layers.push(layer_report);
        }
        report
    }
}
