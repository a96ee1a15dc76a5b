//! Price normalization into settlement currency.
//!
//! The upstream oracle quotes every asset in a protocol-internal pricing
//! unit (wei of the base asset per whole token) rather than in settlement
//! currency. A major stablecoin serves as the pivot: inverting its native
//! price gives the settlement value of one whole base-asset unit, and every
//! reserve price is rebased through that.

use alloy::primitives::Address;
use std::collections::HashMap;

use crate::error::EvaluationError;
use crate::position::ReservePosition;

/// Settlement-currency value of one whole base-asset unit.
///
/// `unit_scale / reference_asset_native_price`. A zero or non-finite native
/// price is a hard failure for the whole run; letting the division through
/// would turn every normalized price into `inf`.
pub fn reference_price(
    unit_scale: f64,
    reference_asset_native_price: f64,
) -> Result<f64, EvaluationError> {
    if reference_asset_native_price == 0.0 || !reference_asset_native_price.is_finite() {
        return Err(EvaluationError::ZeroReferencePrice);
    }

    Ok(unit_scale / reference_asset_native_price)
}

/// Settlement-currency price of one whole token.
pub fn settlement_price(native_price: f64, unit_scale: f64, reference_price: f64) -> f64 {
    native_price / unit_scale * reference_price
}

/// Normalized prices for the assets of one borrower's reserves.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: HashMap<Address, f64>,
}

impl PriceTable {
    /// Normalize every reserve's native price into the table.
    pub fn from_reserves(
        reserves: &[ReservePosition],
        unit_scale: f64,
        reference_price: f64,
    ) -> Self {
        let prices = reserves
            .iter()
            .map(|r| {
                (
                    r.asset,
                    settlement_price(r.price_in_reference_unit, unit_scale, reference_price),
                )
            })
            .collect();

        Self { prices }
    }

    /// Insert or replace one asset price.
    pub fn insert(&mut self, asset: Address, price: f64) {
        self.prices.insert(asset, price);
    }

    /// Settlement price for an asset, if known.
    pub fn get(&self, asset: Address) -> Option<f64> {
        self.prices.get(&asset).copied()
    }

    /// Number of priced assets.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Whether the table holds no prices.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
