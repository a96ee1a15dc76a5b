//! GraphQL subgraph client for borrower discovery and oracle prices.

use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};

/// Entities per page for cursor pagination. Hosted subgraphs cap `first` at 1000.
pub const PAGE_SIZE: usize = 1000;

const BORROWERS_QUERY: &str = r#"
query Borrowers($lastId: ID!) {
  users(first: 1000, orderBy: id, where: { id_gt: $lastId, borrowedReservesCount_gt: 0 }) {
    id
    reserves {
      usageAsCollateralEnabledOnUser
      currentATokenBalance
      currentTotalDebt
      reserve {
        symbol
        underlyingAsset
        usageAsCollateralEnabled
        decimals
        reserveLiquidationThreshold
        price {
          priceInEth
        }
      }
    }
  }
}"#;

const REFERENCE_PRICE_QUERY: &str = r#"
query ReferencePrice($asset: ID!) {
  priceOracleAsset(id: $asset) {
    priceInEth
  }
}"#;

/// Source of borrower accounts and the reference-asset price.
///
/// The scan orchestration is generic over this trait so evaluation can be
/// exercised against canned data without a network.
#[async_trait]
pub trait LendingDataSource: Send + Sync {
    /// All accounts with outstanding debt, fully paginated.
    async fn fetch_borrowers(&self) -> Result<Vec<UserAccount>>;

    /// Native oracle price of the reference asset, in the protocol pricing unit.
    async fn fetch_reference_asset_price(&self, asset: Address) -> Result<f64>;
}

/// GraphQL-over-HTTP client for a protocol subgraph.
#[derive(Debug, Clone)]
pub struct SubgraphClient {
    client: reqwest::Client,
    url: String,
}

impl SubgraphClient {
    /// Create a client for the given subgraph endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Endpoint this client queries.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Execute one GraphQL query and unwrap the `data` payload.
    async fn execute<V, T>(&self, query: &str, variables: V) -> Result<T>
    where
        V: Serialize + Send,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(&self.url)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?
            .error_for_status()?;

        let body: GraphQlResponse<T> = response.json().await?;

        if !body.errors.is_empty() {
            let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
            bail!("subgraph returned errors: {}", messages.join("; "));
        }

        body.data.context("subgraph response carried no data")
    }
}

#[async_trait]
impl LendingDataSource for SubgraphClient {
    #[instrument(skip(self))]
    async fn fetch_borrowers(&self) -> Result<Vec<UserAccount>> {
        let mut all_users = Vec::new();
        let mut last_id = String::new();

        loop {
            let page: UsersPage = self
                .execute(BORROWERS_QUERY, json!({ "lastId": last_id }))
                .await?;

            let fetched = page.users.len();
            all_users.extend(page.users);

            debug!(
                fetched = fetched,
                total_so_far = all_users.len(),
                "Fetched borrower page"
            );

            if fetched < PAGE_SIZE {
                break;
            }

            match all_users.last() {
                Some(user) => last_id = user.id.clone(),
                None => break,
            }
        }

        info!(total = all_users.len(), "Fetched borrower accounts");

        Ok(all_users)
    }

    #[instrument(skip(self), fields(asset = %asset))]
    async fn fetch_reference_asset_price(&self, asset: Address) -> Result<f64> {
        // Subgraph entity ids are lowercase hex.
        let data: ReferencePriceData = self
            .execute(REFERENCE_PRICE_QUERY, json!({ "asset": format!("{asset:#x}") }))
            .await?;

        let oracle = data
            .price_oracle_asset
            .with_context(|| format!("reference asset {asset:#x} has no oracle entry"))?;

        let price = oracle
            .price_in_eth
            .parse::<f64>()
            .with_context(|| format!("unparseable reference price `{}`", oracle.price_in_eth))?;

        debug!(price = price, "Fetched reference asset price");

        Ok(price)
    }
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a, V> {
    query: &'a str,
    variables: V,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct UsersPage {
    users: Vec<UserAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferencePriceData {
    price_oracle_asset: Option<OracleAssetPrice>,
}

/// Oracle price entry for a single asset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleAssetPrice {
    /// Price in the protocol pricing unit, as reported (decimal string).
    pub price_in_eth: String,
}

/// One borrower account as reported by the subgraph.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    /// Wallet address (subgraph entity id, lowercase hex)
    pub id: String,
    /// Reserve positions, in subgraph order
    #[serde(default)]
    pub reserves: Vec<UserReserve>,
}

/// A borrower's stake in one reserve.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReserve {
    /// Whether the borrower flagged this holding as collateral
    pub usage_as_collateral_enabled_on_user: bool,
    /// Reserve-level data shared by all holders
    pub reserve: Reserve,
    /// Raw interest-bearing collateral balance (undecimalized)
    pub current_a_token_balance: String,
    /// Raw outstanding debt (undecimalized)
    pub current_total_debt: String,
}

/// Reserve-level market data.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reserve {
    /// Token symbol
    pub symbol: String,
    /// Underlying token address
    pub underlying_asset: String,
    /// Whether the reserve can back debt at all
    pub usage_as_collateral_enabled: bool,
    /// Fractional digits of the underlying token
    #[serde(deserialize_with = "deserialize_numeric_string")]
    pub decimals: String,
    /// Collateral factor in basis points
    #[serde(deserialize_with = "deserialize_numeric_string")]
    pub reserve_liquidation_threshold: String,
    /// Oracle price of the underlying
    pub price: ReservePrice,
}

/// Reserve oracle price wrapper.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservePrice {
    /// Price of one whole token in the protocol pricing unit
    pub price_in_eth: String,
}

/// Accept a JSON string or integer and carry it as a string.
/// Subgraph deployments disagree on the wire type of small integer fields.
fn deserialize_numeric_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        String(String),
        Int(i64),
    }

    match StringOrInt::deserialize(deserializer)? {
        StringOrInt::String(s) => Ok(s),
        StringOrInt::Int(n) => Ok(n.to_string()),
    }
}
