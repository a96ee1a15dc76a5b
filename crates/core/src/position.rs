//! Borrower accounts and reserve positions.
//!
//! Subgraph accounts arrive stringly typed; conversion into these domain
//! types is where per-borrower validation happens. A single malformed
//! reserve rejects the whole account so no borrower is ever half-evaluated.

use alloy::primitives::Address;
use serde::Serialize;

use crate::config::Chain;
use crate::error::EvaluationError;
use liqscan_api::{UserAccount, UserReserve};

/// Opaque payload attached to emitted records, carried through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionExtra {
    /// Reference link for the position owner
    pub url: String,
}

/// A position eligible for liquidation below its trigger price.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidatablePosition {
    /// Borrower wallet id
    pub owner: String,
    /// Collateral price (settlement currency per whole token) at which the
    /// already-accumulated debt is exactly covered; below it the position
    /// is undercollateralized
    pub liq_price: f64,
    /// Qualified collateral asset id, `chain:address`
    pub collateral: String,
    /// Raw collateral balance, verbatim from the data source
    pub collateral_amount: String,
    /// Passthrough payload
    pub extra: PositionExtra,
}

/// One borrower's stake in one reserve, validated.
#[derive(Debug, Clone)]
pub struct ReservePosition {
    /// Underlying token address
    pub asset: Address,
    /// Token symbol, for diagnostics
    pub symbol: String,
    /// Native price of one whole token in the protocol pricing unit
    pub price_in_reference_unit: f64,
    /// Fractional digits used to scale raw balances to whole tokens
    pub decimals: u32,
    /// Collateral factor in basis points
    pub liquidation_threshold_bps: u32,
    /// Whether the reserve can back debt at all
    pub collateral_enabled: bool,
    /// Whether this borrower flagged the holding as collateral
    pub collateral_enabled_for_user: bool,
    /// Raw interest-bearing collateral balance
    pub collateral_balance: f64,
    /// Raw outstanding debt
    pub debt_balance: f64,
    /// Collateral balance as reported, preserved for output
    pub raw_collateral_balance: String,
}

impl ReservePosition {
    /// Validate one subgraph reserve entry.
    pub fn from_subgraph(raw: &UserReserve) -> Result<Self, EvaluationError> {
        let reserve = &raw.reserve;
        let symbol = reserve.symbol.as_str();

        let asset: Address = reserve
            .underlying_asset
            .parse()
            .map_err(|_| invalid(symbol, "underlying asset", &reserve.underlying_asset))?;

        Ok(Self {
            asset,
            symbol: reserve.symbol.clone(),
            price_in_reference_unit: parse_decimal(symbol, "price", &reserve.price.price_in_eth)?,
            decimals: parse_integer(symbol, "decimals", &reserve.decimals)?,
            liquidation_threshold_bps: parse_integer(
                symbol,
                "liquidation threshold",
                &reserve.reserve_liquidation_threshold,
            )?,
            collateral_enabled: reserve.usage_as_collateral_enabled,
            collateral_enabled_for_user: raw.usage_as_collateral_enabled_on_user,
            collateral_balance: parse_decimal(
                symbol,
                "collateral balance",
                &raw.current_a_token_balance,
            )?,
            debt_balance: parse_decimal(symbol, "debt balance", &raw.current_total_debt)?,
            raw_collateral_balance: raw.current_a_token_balance.clone(),
        })
    }

    /// Collateral factor as a fraction. Zero when the reserve cannot back
    /// debt, whatever threshold the data source reports.
    pub fn liquidation_threshold(&self) -> f64 {
        if self.collateral_enabled {
            self.liquidation_threshold_bps as f64 / 10_000.0
        } else {
            0.0
        }
    }

    /// 10^decimals, the divisor scaling raw balances to whole tokens.
    pub fn decimals_scale(&self) -> f64 {
        10f64.powi(self.decimals as i32)
    }
}

/// A borrower with an ordered list of reserve positions.
#[derive(Debug, Clone)]
pub struct BorrowerAccount {
    /// Wallet id as reported by the data source
    pub id: String,
    /// Chain the account was observed on
    pub chain: Chain,
    /// Reserve positions, evaluation order
    pub reserves: Vec<ReservePosition>,
    /// Payload forwarded into every emitted record
    pub extra: PositionExtra,
}

impl BorrowerAccount {
    /// Validate one subgraph account.
    pub fn from_subgraph(
        account: &UserAccount,
        chain: Chain,
        extra: PositionExtra,
    ) -> Result<Self, EvaluationError> {
        let reserves = account
            .reserves
            .iter()
            .map(ReservePosition::from_subgraph)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: account.id.clone(),
            chain,
            reserves,
            extra,
        })
    }
}

fn invalid(symbol: &str, field: &'static str, value: &str) -> EvaluationError {
    EvaluationError::InvalidReserve {
        symbol: symbol.to_string(),
        field,
        value: value.to_string(),
    }
}

fn parse_decimal(symbol: &str, field: &'static str, value: &str) -> Result<f64, EvaluationError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(symbol, field, value))
}

fn parse_integer(symbol: &str, field: &'static str, value: &str) -> Result<u32, EvaluationError> {
    value.parse::<u32>().map_err(|_| invalid(symbol, field, value))
}
