//! `dhis2flow version` command implementation

use crate::commands::{connect, connection};
use crate::error::Result;
use colored::Colorize;
use dhis2flow_engine::schema::RemoteVersion;

/// Print the CLI version, and the server's when `remote` is set
pub async fn run(url: Option<&str>, remote: bool) -> Result<()> {
    println!("dhis2flow {}", env!("CARGO_PKG_VERSION"));
    if !remote {
        return Ok(());
    }

    let client = connect(&connection(url)?)?;
    let info = client.system_info().await?;
    let resolved: RemoteVersion = info.version.parse().unwrap_or(RemoteVersion::Unknown);
    println!(
        "{} Server {} reports {} (schemas resolve as {})",
        "✓".green(),
        client.base_url(),
        info.version.bold(),
        resolved
    );
    Ok(())
}
