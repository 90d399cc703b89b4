//! Pipeline definitions
//!
//! A pipeline is a named DAG of [`StepConfig`]s plus run-wide budgets
//! (request rate, concurrency, timeout). Definitions are loaded from YAML or
//! JSON and validated before anything runs.

mod config;
mod step;

pub use config::PipelineConfig;
pub use step::{Params, StepConfig};
