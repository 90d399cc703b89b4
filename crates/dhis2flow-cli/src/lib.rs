//! dhis2flow CLI Library
//!
//! Command-line interface for extracting, transforming and reviewing data
//! from a DHIS2 instance.
//!
//! # Overview
//!
//! - **Connection**: store server URL and credentials (`dhis2flow config`)
//! - **Single endpoints**: `analytics pull`, `datavaluesets pull|push`,
//!   `tracker events`, `metadata export|import`
//! - **Data quality**: `dqr analyze` over a CSV or JSON table
//! - **Pipelines**: `pipeline run|validate` for declarative step graphs
//! - **Demo**: `demo quick` runs a local pipeline over sample data
//!
//! Every endpoint command is a one-step pipeline, so retries, rate limiting
//! and reporting behave the same as in `pipeline run`.
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod progress;
pub mod render;

// Re-export commonly used types
pub use config::ConnectionConfig;
pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dhis2flow - DHIS2 data pipelines
#[derive(Parser, Debug)]
#[command(name = "dhis2flow")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// DHIS2 server URL (overrides DHIS2_URL and the config file)
    #[arg(long, global = true)]
    pub url: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version {
        /// Also query the configured server's version
        #[arg(long)]
        remote: bool,
    },

    /// Configure the DHIS2 connection
    Config {
        /// Username (defaults to DHIS2_USERNAME)
        #[arg(long, env = "DHIS2_USERNAME")]
        username: Option<String>,

        /// Password (defaults to DHIS2_PASSWORD)
        #[arg(long, env = "DHIS2_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Request rate budget per second
        #[arg(long)]
        rps: Option<f64>,

        /// Print the current configuration instead of changing it
        #[arg(long)]
        show: bool,
    },

    /// Analytics queries
    Analytics {
        #[command(subcommand)]
        command: AnalyticsCommand,
    },

    /// Data value sets
    #[command(name = "datavaluesets")]
    DataValueSets {
        #[command(subcommand)]
        command: DataValueSetsCommand,
    },

    /// Tracker data
    Tracker {
        #[command(subcommand)]
        command: TrackerCommand,
    },

    /// Data quality review
    Dqr {
        #[command(subcommand)]
        command: DqrCommand,
    },

    /// Declarative pipelines
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommand,
    },

    /// Metadata export and import
    Metadata {
        #[command(subcommand)]
        command: MetadataCommand,
    },

    /// Try the engine on sample data
    Demo {
        #[command(subcommand)]
        command: DemoCommand,
    },
}

/// Analytics subcommands
#[derive(Subcommand, Debug)]
pub enum AnalyticsCommand {
    /// Pull an analytics table
    Pull {
        /// Data dimension items (data elements, indicators), `;`-separated
        #[arg(long)]
        dx: String,

        /// Organisation units, `;`-separated
        #[arg(long)]
        ou: String,

        /// Periods, `;`-separated
        #[arg(long)]
        pe: String,

        /// Write the table to this file (.csv or .json)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Keep the server's column names
        #[arg(long)]
        raw: bool,

        /// Retries after a failed attempt
        #[arg(long, default_value = "2")]
        retries: u32,
    },
}

/// Data value set subcommands
#[derive(Subcommand, Debug)]
pub enum DataValueSetsCommand {
    /// Pull data values for a data set
    Pull {
        /// Data set UID
        #[arg(long)]
        data_set: String,

        /// Organisation unit UID
        #[arg(long)]
        org_unit: Option<String>,

        /// Period (e.g. 202301)
        #[arg(long)]
        period: Option<String>,

        /// Start date (YYYY-MM-DD), instead of a period
        #[arg(long)]
        start_date: Option<String>,

        /// End date (YYYY-MM-DD), instead of a period
        #[arg(long)]
        end_date: Option<String>,

        /// Include descendants of the organisation unit
        #[arg(long)]
        children: bool,

        /// Write the table to this file (.csv or .json)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Retries after a failed attempt
        #[arg(long, default_value = "2")]
        retries: u32,
    },

    /// Push data values from a file
    Push {
        /// Table of data values (.csv or .json)
        #[arg(long)]
        input: PathBuf,

        /// Import strategy (CREATE, UPDATE, CREATE_AND_UPDATE, DELETE)
        #[arg(long)]
        import_strategy: Option<String>,

        /// Validate on the server without saving
        #[arg(long)]
        dry_run: bool,
    },
}

/// Tracker subcommands
#[derive(Subcommand, Debug)]
pub enum TrackerCommand {
    /// Pull tracker events for a program
    Events {
        /// Program UID
        #[arg(long)]
        program: String,

        /// Organisation unit UID
        #[arg(long)]
        org_unit: Option<String>,

        /// Event status filter (ACTIVE, COMPLETED, ...)
        #[arg(long)]
        status: Option<String>,

        /// Events per page
        #[arg(long, default_value = "50")]
        page_size: u64,

        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<u64>,

        /// Write the table to this file (.csv or .json)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Retries after a failed attempt
        #[arg(long, default_value = "2")]
        retries: u32,
    },
}

/// Data quality subcommands
#[derive(Subcommand, Debug)]
pub enum DqrCommand {
    /// Compute quality metrics for a table
    Analyze {
        /// Table to review (.csv or .json)
        #[arg(long)]
        input: PathBuf,

        /// Metrics to compute
        #[arg(long, value_delimiter = ',', default_value = "completeness,uniqueness")]
        metrics: Vec<String>,

        /// Minimum passing score
        #[arg(long)]
        threshold: Option<f64>,

        /// Write the JSON report to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit non-zero when a metric is below the threshold
        #[arg(long)]
        fail_below_threshold: bool,
    },
}

/// Pipeline subcommands
#[derive(Subcommand, Debug)]
pub enum PipelineCommand {
    /// Run a pipeline definition
    Run {
        /// Pipeline definition (.yaml, .yml or .json)
        #[arg(long)]
        config: PathBuf,

        /// Write the JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Run without a server connection; remote steps fail
        #[arg(long)]
        offline: bool,

        /// Override the definition's concurrency
        #[arg(long)]
        concurrency: Option<usize>,

        /// Override the definition's request rate budget
        #[arg(long)]
        rps: Option<f64>,
    },

    /// Check a pipeline definition without running it
    Validate {
        /// Pipeline definition (.yaml, .yml or .json)
        #[arg(long)]
        config: PathBuf,
    },
}

/// Metadata subcommands
#[derive(Subcommand, Debug)]
pub enum MetadataCommand {
    /// Export one metadata collection
    Export {
        /// Collection name (dataElements, organisationUnits, ...)
        #[arg(long = "type")]
        collection: String,

        /// Fields to export
        #[arg(long)]
        fields: Option<String>,

        /// Server-side filter (e.g. `name:like:ANC`)
        #[arg(long)]
        filter: Option<String>,

        /// Write the collection to this file (.csv or .json)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Import one metadata collection from a file
    Import {
        /// Collection name (dataElements, organisationUnits, ...)
        #[arg(long = "type")]
        collection: String,

        /// Table of objects (.csv or .json)
        #[arg(long)]
        input: PathBuf,

        /// Import strategy (CREATE, UPDATE, CREATE_AND_UPDATE, DELETE)
        #[arg(long)]
        import_strategy: Option<String>,
    },
}

/// Demo subcommands
#[derive(Subcommand, Debug)]
pub enum DemoCommand {
    /// Run a local pipeline over generated sample data
    Quick {
        /// Directory for the sample data, pipeline and outputs
        #[arg(long, default_value = "dhis2flow-demo")]
        dir: PathBuf,
    },
}
