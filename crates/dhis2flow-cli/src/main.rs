//! dhis2flow CLI - Main entry point

use clap::Parser;
use dhis2flow_cli::commands::{
    analytics, config::ConfigArgs, datavaluesets, demo, dqr, metadata, pipeline, tracker,
};
use dhis2flow_cli::{
    AnalyticsCommand, Cli, Commands, DataValueSetsCommand, DemoCommand, DqrCommand, MetadataCommand,
    PipelineCommand, TrackerCommand,
};
use dhis2flow_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Values from a local .env file behave like exported variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let defaults = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("dhis2flow".to_string())
        .build();

    // LOG_* environment variables take precedence over the flag
    let log_config = defaults
        .clone()
        .with_env_overrides()
        .unwrap_or(defaults);

    // The CLI works without logging; keep the guard alive for file output
    let _guard = init_logging(&log_config).ok();

    if let Err(e) = execute_command(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: Cli) -> dhis2flow_cli::Result<()> {
    let url = cli.url.as_deref();

    match cli.command {
        Commands::Version { remote } => dhis2flow_cli::commands::version::run(url, remote).await,

        Commands::Config {
            username,
            password,
            timeout,
            rps,
            show,
        } => {
            dhis2flow_cli::commands::config::run(ConfigArgs {
                url: cli.url.clone(),
                username,
                password,
                timeout,
                rps,
                show,
            })
            .await
        },

        Commands::Analytics { command } => match command {
            AnalyticsCommand::Pull {
                dx,
                ou,
                pe,
                out,
                raw,
                retries,
            } => {
                analytics::pull(
                    url,
                    analytics::PullArgs {
                        dx,
                        ou,
                        pe,
                        out,
                        raw,
                        retries,
                    },
                )
                .await
            },
        },

        Commands::DataValueSets { command } => match command {
            DataValueSetsCommand::Pull {
                data_set,
                org_unit,
                period,
                start_date,
                end_date,
                children,
                out,
                retries,
            } => {
                datavaluesets::pull(
                    url,
                    datavaluesets::PullArgs {
                        data_set,
                        org_unit,
                        period,
                        start_date,
                        end_date,
                        children,
                        out,
                        retries,
                    },
                )
                .await
            },
            DataValueSetsCommand::Push {
                input,
                import_strategy,
                dry_run,
            } => {
                datavaluesets::push(
                    url,
                    datavaluesets::PushArgs {
                        input,
                        import_strategy,
                        dry_run,
                    },
                )
                .await
            },
        },

        Commands::Tracker { command } => match command {
            TrackerCommand::Events {
                program,
                org_unit,
                status,
                page_size,
                max_pages,
                out,
                retries,
            } => {
                tracker::events(
                    url,
                    tracker::EventsArgs {
                        program,
                        org_unit,
                        status,
                        page_size,
                        max_pages,
                        out,
                        retries,
                    },
                )
                .await
            },
        },

        Commands::Dqr { command } => match command {
            DqrCommand::Analyze {
                input,
                metrics,
                threshold,
                output,
                fail_below_threshold,
            } => {
                dqr::analyze(dqr::AnalyzeArgs {
                    input,
                    metrics,
                    threshold,
                    output,
                    fail_below_threshold,
                })
                .await
            },
        },

        Commands::Pipeline { command } => match command {
            PipelineCommand::Run {
                config,
                report,
                offline,
                concurrency,
                rps,
            } => {
                pipeline::run(
                    url,
                    pipeline::RunArgs {
                        config,
                        report,
                        offline,
                        concurrency,
                        rps,
                    },
                )
                .await
            },
            PipelineCommand::Validate { config } => pipeline::validate(config).await,
        },

        Commands::Metadata { command } => match command {
            MetadataCommand::Export {
                collection,
                fields,
                filter,
                out,
            } => {
                metadata::export(
                    url,
                    metadata::ExportArgs {
                        collection,
                        fields,
                        filter,
                        out,
                    },
                )
                .await
            },
            MetadataCommand::Import {
                collection,
                input,
                import_strategy,
            } => {
                metadata::import(
                    url,
                    metadata::ImportArgs {
                        collection,
                        input,
                        import_strategy,
                    },
                )
                .await
            },
        },

        Commands::Demo { command } => match command {
            DemoCommand::Quick { dir } => demo::quick(dir).await,
        },
    }
}
