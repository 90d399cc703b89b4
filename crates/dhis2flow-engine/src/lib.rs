//! dhis2flow Engine Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Declarative extraction pipelines against DHIS2 instances.
//!
//! # Overview
//!
//! - **Pipelines**: [`pipeline::PipelineConfig`] describes a DAG of steps loaded from YAML/JSON
//! - **Steps**: analytics, data value sets, tracker, data-quality review, transform, export and
//!   metadata variants behind the [`steps::Step`] trait
//! - **Executor**: [`executor::PipelineExecutor`] runs the DAG with bounded concurrency,
//!   per-step retries and timeouts, a shared rate limit and cancellation
//! - **Schemas**: [`schema::SchemaManager`] resolves field mappings per remote version with
//!   fallback to the closest older release
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dhis2flow_engine::client::OfflineClient;
//! use dhis2flow_engine::executor::PipelineExecutor;
//! use dhis2flow_engine::pipeline::PipelineConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::from_path("pipeline.yaml")?;
//!     let report = PipelineExecutor::new(config, Arc::new(OfflineClient)).run().await?;
//!     println!("{}: {}", report.pipeline, report.status);
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod client;
pub mod dqr;
pub mod error;
pub mod events;
pub mod executor;
pub mod pipeline;
pub mod schema;
pub mod steps;
pub mod table;

pub use error::{PipelineError, StepError};
pub use executor::{PipelineExecutor, RunReport};
pub use pipeline::{PipelineConfig, StepConfig};
pub use schema::{RemoteVersion, SchemaManager};
