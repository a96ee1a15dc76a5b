//! Deployment configuration for supported chains and protocols.

use alloy::primitives::{address, Address};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Chains with a known deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
}

impl Chain {
    /// Lowercase chain name as used in qualified asset ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ethereum" | "mainnet" => Ok(Self::Ethereum),
            other => anyhow::bail!("unsupported chain `{}`", other),
        }
    }
}

/// One protocol deployment: where to read positions and how to label output.
///
/// Constructed once and handed to the data source and scanner; nothing here
/// is global or mutated at runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    /// Protocol name for report labeling (e.g., "aave")
    pub protocol: String,
    /// Chain the deployment lives on
    pub chain: Chain,
    /// Reference asset used as the settlement-currency pivot (a major stablecoin)
    #[serde(deserialize_with = "deserialize_address")]
    pub reference_asset: Address,
    /// Subgraph endpoint serving borrower accounts and oracle prices
    pub subgraph_url: String,
    /// Explorer prefix for the passthrough position link
    pub explorer_base_url: String,
    /// Scale of the protocol pricing unit (wei per whole unit of the base asset)
    #[serde(default = "default_pricing_unit_scale")]
    pub pricing_unit_scale: f64,
}

fn default_pricing_unit_scale() -> f64 {
    1e18
}

impl AdapterConfig {
    /// Aave v2 on ethereum mainnet, priced against USDC.
    pub fn ethereum() -> Self {
        Self {
            protocol: "aave".to_string(),
            chain: Chain::Ethereum,
            reference_asset: address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            subgraph_url: "https://api.thegraph.com/subgraphs/name/aave/protocol-v2".to_string(),
            explorer_base_url: "https://etherscan.io/address/".to_string(),
            pricing_unit_scale: 1e18,
        }
    }

    /// Built-in deployment for a chain.
    pub fn for_chain(chain: Chain) -> Self {
        match chain {
            Chain::Ethereum => Self::ethereum(),
        }
    }

    /// Load a deployment from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: AdapterConfig = toml::from_str(&content)?;
        config.expand_env_vars();
        Ok(config)
    }

    /// Expand environment variables in endpoint URLs.
    pub fn expand_env_vars(&mut self) {
        self.subgraph_url = expand_env(&self.subgraph_url);
        self.explorer_base_url = expand_env(&self.explorer_base_url);
    }

    /// Explorer link for one borrower, passed through into emitted records.
    pub fn explorer_url(&self, owner: &str) -> String {
        format!("{}{}", self.explorer_base_url, owner)
    }
}

fn deserialize_address<'de, D>(deserializer: D) -> Result<Address, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

/// Expand ${VAR_NAME} patterns with environment variable values.
fn expand_env(s: &str) -> String {
    let mut result = s.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}").unwrap();

    for cap in re.captures_iter(s) {
        if let (Some(full_match), Some(var_match)) = (cap.get(0), cap.get(1)) {
            let var_name = var_match.as_str();
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(full_match.as_str(), &value);
            }
        }
    }

    result
}
