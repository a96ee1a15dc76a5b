//! Scan orchestration: fetch, validate, evaluate, report.
//!
//! One scan walks every borrower of a deployment in the order the data
//! source returns them. Borrowers are independent (each evaluation owns its
//! accumulators), so a validation failure skips exactly one account, and
//! nothing carries over between scans.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::AdapterConfig;
use crate::evaluator;
use crate::position::{BorrowerAccount, LiquidatablePosition, PositionExtra};
use crate::pricing::{self, PriceTable};
use liqscan_api::{LendingDataSource, UserAccount};

/// Outcome of one full scan over a deployment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Protocol the deployment belongs to
    pub protocol: String,
    /// Chain name
    pub chain: String,
    /// When the report was assembled
    pub generated_at: DateTime<Utc>,
    /// Borrowers evaluated successfully
    pub borrowers_scanned: usize,
    /// Borrowers skipped on validation errors
    pub borrowers_skipped: usize,
    /// Every liquidatable position found, in borrower order
    pub positions: Vec<LiquidatablePosition>,
}

/// Scanner for one protocol deployment.
pub struct Scanner<S> {
    source: S,
    adapter: AdapterConfig,
}

impl<S: LendingDataSource> Scanner<S> {
    /// Create a scanner over a data source.
    pub fn new(source: S, adapter: AdapterConfig) -> Self {
        Self { source, adapter }
    }

    /// Deployment this scanner reads.
    pub fn adapter(&self) -> &AdapterConfig {
        &self.adapter
    }

    /// Run one scan: resolve the reference price, fetch all borrowers,
    /// evaluate each.
    ///
    /// A zero or missing reference price aborts the scan; per-borrower
    /// failures are logged and skipped.
    #[instrument(skip(self), fields(chain = %self.adapter.chain))]
    pub async fn scan(&self) -> Result<ScanReport> {
        let native_price = self
            .source
            .fetch_reference_asset_price(self.adapter.reference_asset)
            .await?;
        let reference_price =
            pricing::reference_price(self.adapter.pricing_unit_scale, native_price)?;

        let borrowers = self.source.fetch_borrowers().await?;
        let report = self.evaluate_all(&borrowers, reference_price);

        info!(
            borrowers = report.borrowers_scanned,
            skipped = report.borrowers_skipped,
            positions = report.positions.len(),
            "Scan complete"
        );

        Ok(report)
    }

    /// Evaluate already-fetched borrowers against one reference price.
    pub fn evaluate_all(&self, borrowers: &[UserAccount], reference_price: f64) -> ScanReport {
        let mut positions = Vec::new();
        let mut skipped = 0usize;

        for account in borrowers {
            let extra = PositionExtra {
                url: self.adapter.explorer_url(&account.id),
            };

            let outcome = BorrowerAccount::from_subgraph(account, self.adapter.chain, extra)
                .and_then(|borrower| {
                    let prices = PriceTable::from_reserves(
                        &borrower.reserves,
                        self.adapter.pricing_unit_scale,
                        reference_price,
                    );
                    evaluator::evaluate(&borrower, &prices)
                });

            match outcome {
                Ok(records) => positions.extend(records),
                Err(e) => {
                    warn!(borrower = %account.id, error = %e, "Skipping borrower");
                    skipped += 1;
                }
            }
        }

        ScanReport {
            protocol: self.adapter.protocol.clone(),
            chain: self.adapter.chain.to_string(),
            generated_at: Utc::now(),
            borrowers_scanned: borrowers.len() - skipped,
            borrowers_skipped: skipped,
            positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Chain;
    use crate::error::EvaluationError;
    use alloy::primitives::Address;
    use liqscan_api::{Reserve, ReservePrice, UserReserve};

    fn test_adapter() -> AdapterConfig {
        AdapterConfig {
            protocol: "aave".to_string(),
            chain: Chain::Ethereum,
            reference_asset: Address::repeat_byte(0xAA),
            subgraph_url: "http://localhost/subgraphs/test".to_string(),
            explorer_base_url: "https://etherscan.io/address/".to_string(),
            pricing_unit_scale: 1.0,
        }
    }

    fn raw_reserve(
        asset: &str,
        price: &str,
        decimals: &str,
        threshold: &str,
        user_collateral: bool,
        atokens: &str,
        debt: &str,
    ) -> UserReserve {
        UserReserve {
            usage_as_collateral_enabled_on_user: user_collateral,
            current_a_token_balance: atokens.to_string(),
            current_total_debt: debt.to_string(),
            reserve: Reserve {
                symbol: "TOK".to_string(),
                underlying_asset: asset.to_string(),
                usage_as_collateral_enabled: threshold != "0",
                decimals: decimals.to_string(),
                reserve_liquidation_threshold: threshold.to_string(),
                price: ReservePrice {
                    price_in_eth: price.to_string(),
                },
            },
        }
    }

    fn liquidatable_user() -> UserAccount {
        UserAccount {
            id: "0x1111111111111111111111111111111111111111".to_string(),
            reserves: vec![
                raw_reserve(
                    "0x0101010101010101010101010101010101010101",
                    "1",
                    "0",
                    "0",
                    false,
                    "0",
                    "100",
                ),
                raw_reserve(
                    "0x0202020202020202020202020202020202020202",
                    "4",
                    "0",
                    "10000",
                    true,
                    "50",
                    "0",
                ),
            ],
        }
    }

    fn malformed_user() -> UserAccount {
        UserAccount {
            id: "0x2222222222222222222222222222222222222222".to_string(),
            reserves: vec![raw_reserve(
                "0x0303030303030303030303030303030303030303",
                "1",
                "many",
                "8000",
                true,
                "10",
                "0",
            )],
        }
    }

    #[test]
    fn test_evaluate_all_skips_malformed_borrowers() {
        let scanner = Scanner::new(NullSource, test_adapter());

        let users = vec![liquidatable_user(), malformed_user()];
        let report = scanner.evaluate_all(&users, 1.0);

        assert_eq!(report.borrowers_scanned, 1);
        assert_eq!(report.borrowers_skipped, 1);
        assert_eq!(report.positions.len(), 1);

        let record = &report.positions[0];
        assert_eq!(record.liq_price, 2.0);
        assert_eq!(
            record.extra.url,
            "https://etherscan.io/address/0x1111111111111111111111111111111111111111"
        );
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let scanner = Scanner::new(NullSource, test_adapter());
        let report = scanner.evaluate_all(&[liquidatable_user()], 1.0);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"liqPrice\":2.0"));
        assert!(json.contains("\"collateralAmount\":\"50\""));
        assert!(json.contains("\"borrowersScanned\":1"));
        assert!(json.contains("ethereum:0x0202020202020202020202020202020202020202"));
    }

    #[tokio::test]
    async fn test_scan_against_static_source() {
        let source = StaticSource {
            users: vec![liquidatable_user()],
            reference_price: 1.0,
        };
        let scanner = Scanner::new(source, test_adapter());

        let report = scanner.scan().await.unwrap();
        assert_eq!(report.positions.len(), 1);
        assert_eq!(report.positions[0].liq_price, 2.0);
    }

    #[tokio::test]
    async fn test_scan_aborts_on_zero_reference_price() {
        let source = StaticSource {
            users: vec![liquidatable_user()],
            reference_price: 0.0,
        };
        let scanner = Scanner::new(source, test_adapter());

        let err = scanner.scan().await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<EvaluationError>(),
            Some(&EvaluationError::ZeroReferencePrice)
        );
    }

    struct NullSource;

    #[async_trait::async_trait]
    impl LendingDataSource for NullSource {
        async fn fetch_borrowers(&self) -> Result<Vec<UserAccount>> {
            Ok(Vec::new())
        }

        async fn fetch_reference_asset_price(&self, _asset: Address) -> Result<f64> {
            Ok(1.0)
        }
    }

    struct StaticSource {
        users: Vec<UserAccount>,
        reference_price: f64,
    }

    #[async_trait::async_trait]
    impl LendingDataSource for StaticSource {
        async fn fetch_borrowers(&self) -> Result<Vec<UserAccount>> {
            Ok(self.users.clone())
        }

        async fn fetch_reference_asset_price(&self, _asset: Address) -> Result<f64> {
            Ok(self.reference_price)
        }
    }
}
