//! shopsim-core: a seeded commerce-data simulator feeding a layered
//! SQL transformation pipeline.
//!
//! Generators build the raw tables (catalog, customers, funnel,
//! experiments); the transformation runner derives staging, marts and
//! analytics tables from them. `pipeline::run_pipeline` wires both.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod customer;
pub mod error;
pub mod experiment;
pub mod funnel;
pub mod integrity;
pub mod name_generator;
pub mod order;
pub mod pipeline;
pub mod rng;
pub mod store;
pub mod transform;
pub mod types;

pub use error::{SimError, SimResult};
pub use pipeline::{run_pipeline, Pipeline, RunReport};
pub use store::SimStore;
