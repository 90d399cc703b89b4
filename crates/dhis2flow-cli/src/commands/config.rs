//! `dhis2flow config` command implementation
//!
//! Writes connection settings to the config file, or prints them.

use crate::config::ConnectionConfig;
use crate::error::{CliError, Result};
use colored::Colorize;

/// Values given on the command line
#[derive(Debug, Default, Clone)]
pub struct ConfigArgs {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<u64>,
    pub rps: Option<f64>,
    pub show: bool,
}

impl ConfigArgs {
    fn has_changes(&self) -> bool {
        self.url.is_some()
            || self.username.is_some()
            || self.password.is_some()
            || self.timeout.is_some()
            || self.rps.is_some()
    }
}

/// Merge `args` into the saved settings
fn apply(mut config: ConnectionConfig, args: &ConfigArgs) -> Result<ConnectionConfig> {
    if let Some(url) = &args.url {
        config.url = Some(url.clone());
        config.base_url()?;
    }
    if let Some(username) = &args.username {
        config.username = Some(username.clone());
    }
    if let Some(password) = &args.password {
        config.password = Some(password.clone());
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err(CliError::config("timeout must be at least 1 second"));
        }
        config.timeout_secs = timeout;
    }
    if let Some(rps) = args.rps {
        if !rps.is_finite() || rps <= 0.0 {
            return Err(CliError::config(format!("rps must be positive, got {rps}")));
        }
        config.rps = rps;
    }
    Ok(config)
}

pub async fn run(args: ConfigArgs) -> Result<()> {
    let path = ConnectionConfig::path()?;
    let saved = ConnectionConfig::load_file(&path)?;

    if args.show || !args.has_changes() {
        return show(&saved.with_env_overrides()?, &path);
    }

    let updated = apply(saved, &args)?;
    updated.save(&path)?;
    println!(
        "{} Configured connection in {}",
        "✓".green(),
        path.display()
    );
    Ok(())
}

fn show(config: &ConnectionConfig, path: &std::path::Path) -> Result<()> {
    println!("{}", "dhis2flow connection:".cyan().bold());
    println!();
    for (key, value) in config.display_pairs() {
        println!("{:<15} {}", format!("{key}:"), value);
    }
    println!();
    println!("{:<15} {}", "config file:", path.display());
    Ok(())
}
