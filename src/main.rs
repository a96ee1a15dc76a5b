//! Liquidation trigger-price scanner.
//!
//! Walks every borrower of a lending-protocol deployment, folds each
//! account's reserves into settlement-currency risk totals, and reports the
//! collateral price at which each position becomes eligible for liquidation.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liqscan_api::SubgraphClient;
use liqscan_core::{AdapterConfig, Chain, Scanner};

/// Environment variable names.
mod env {
    pub const CHAIN: &str = "CHAIN";
    pub const ADAPTER_CONFIG: &str = "ADAPTER_CONFIG";
    pub const SUBGRAPH_URL: &str = "SUBGRAPH_URL";
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,liqscan_core=debug,liqscan_api=debug")),
        )
        .init();

    let adapter = load_adapter()?;

    info!(
        protocol = %adapter.protocol,
        chain = %adapter.chain,
        subgraph = %adapter.subgraph_url,
        "Starting liquidation scan"
    );

    let client = SubgraphClient::new(adapter.subgraph_url.clone());
    let scanner = Scanner::new(client, adapter);

    let report = scanner.scan().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    info!(
        positions = report.positions.len(),
        skipped = report.borrowers_skipped,
        "Report written"
    );

    Ok(())
}

/// Resolve the deployment: explicit TOML file, else built-in by chain name.
fn load_adapter() -> Result<AdapterConfig> {
    let mut adapter = match std::env::var(env::ADAPTER_CONFIG) {
        Ok(path) => AdapterConfig::from_file(&path)?,
        Err(_) => {
            let chain: Chain = std::env::var(env::CHAIN)
                .unwrap_or_else(|_| "ethereum".to_string())
                .parse()?;
            AdapterConfig::for_chain(chain)
        }
    };

    // Point at a private gateway or mirror without editing config files
    if let Ok(url) = std::env::var(env::SUBGRAPH_URL) {
        adapter.subgraph_url = url;
    }

    Ok(adapter)
}
