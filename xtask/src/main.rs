//! Build automation tasks for dhis2flow
//!
//! - Generating the CLI reference from the clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for dhis2flow", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<dhis2flow_cli::Cli>();

    let content = format!(
        r#"# dhis2flow CLI Reference

Generated from the CLI source on {}.

## Quick Start

```bash
# Store the connection (the password file is readable only by you)
dhis2flow config --url https://play.dhis2.org/40 --username admin --password district

# Pull one analytics table
dhis2flow analytics pull --dx fbfJHSPpUQD --ou ImspTQPwCqd --pe LAST_12_MONTHS --out anc.csv

# Review its quality
dhis2flow dqr analyze --input anc.csv --threshold 0.95

# Run a declarative pipeline
dhis2flow pipeline validate --config pipeline.yaml
dhis2flow pipeline run --config pipeline.yaml --report report.json
```

## Commands

{}

## Environment Variables

- `DHIS2_URL`, `DHIS2_USERNAME`, `DHIS2_PASSWORD` - connection, overriding the config file
- `DHIS2_TIMEOUT_SECS` - per-request timeout (default 30)
- `DHIS2_RPS` - request budget per second for endpoint commands (default 8)
- `DHIS2FLOW_CONFIG` - alternative config file location
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILTER` - logging

---

*To update, run `cargo run -p xtask -- generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());
    Ok(())
}
