//! Per-borrower risk fold deriving liquidation trigger prices.
//!
//! One left-to-right pass over a borrower's reserves. Each reserve first
//! nets its own risk-adjusted collateral against its own debt, producing a
//! single signed settlement-currency value; positive values accumulate as
//! debt, negative as collateral. Whenever a net-collateral reserve cannot
//! be covered by the *other* collateral seen so far, that reserve is the
//! binding constraint and the pass emits the collateral price at which its
//! current balance exactly covers the shortfall.
//!
//! The pass is order-sensitive: a reserve's shortfall check sees totals from
//! reserves before it (plus its own contribution), never from later ones.
//! Trigger prices are therefore an approximation tied to the reserve order
//! reported upstream, not a portfolio-wide health factor, and the fold must
//! keep that shape.

use smallvec::SmallVec;

use crate::error::EvaluationError;
use crate::position::{BorrowerAccount, LiquidatablePosition};
use crate::pricing::PriceTable;

/// Running settlement-currency totals for one borrower's pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RiskTotals {
    /// Sum of positive net risk values
    pub total_debt: f64,
    /// Sum of magnitudes of non-positive net risk values
    pub total_collateral: f64,
}

impl RiskTotals {
    /// Fold one reserve's signed net risk value into the totals.
    pub fn fold(&mut self, net_value: f64) {
        if net_value > 0.0 {
            self.total_debt += net_value;
        } else {
            self.total_collateral -= net_value;
        }
    }

    /// Debt left uncovered once this reserve's own collateral is set aside.
    pub fn shortfall_without(&self, net_collateral: f64) -> f64 {
        self.total_debt - (self.total_collateral - net_collateral)
    }
}

/// Evaluate one borrower, emitting a record per binding collateral reserve.
///
/// Pure over its inputs: the accumulators live on the stack, so evaluating
/// borrowers concurrently or repeatedly yields identical results.
pub fn evaluate(
    borrower: &BorrowerAccount,
    prices: &PriceTable,
) -> Result<Vec<LiquidatablePosition>, EvaluationError> {
    let mut totals = RiskTotals::default();
    let mut records: SmallVec<[LiquidatablePosition; 2]> = SmallVec::new();

    for position in &borrower.reserves {
        let price = prices
            .get(position.asset)
            .ok_or(EvaluationError::MissingPrice {
                asset: position.asset,
            })?;

        // Net the reserve's own risk-adjusted collateral against its own
        // debt before scaling; a reserve that is both collateral and debt
        // source contributes one signed value, not two.
        let mut net_value = position.debt_balance;
        if position.collateral_enabled_for_user {
            net_value -= position.collateral_balance * position.liquidation_threshold();
        }
        net_value *= price / position.decimals_scale();

        totals.fold(net_value);

        if net_value < 0.0 {
            let net_collateral = -net_value;
            let shortfall = totals.shortfall_without(net_collateral);

            if shortfall > 0.0 {
                // Price per whole token at which this reserve's balance
                // exactly covers the debt accumulated so far.
                let collateral_units = net_collateral / price;
                records.push(LiquidatablePosition {
                    owner: borrower.id.clone(),
                    liq_price: shortfall / collateral_units,
                    collateral: format!("{}:{:#x}", borrower.chain, position.asset),
                    collateral_amount: position.raw_collateral_balance.clone(),
                    extra: borrower.extra.clone(),
                });
            }
        }
    }

    Ok(records.into_vec())
}
