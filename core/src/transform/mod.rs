//! Layered transformation runner: raw tables in, derived tables out.

pub mod manifest;
pub mod runner;

pub use manifest::{Layer, Manifest, Unit, MANIFEST_VERSION};
pub use runner::{FailurePolicy, LayerReport, TransformReport, TransformRunner, UnitOutcome, UnitStatus};
