//! Error taxonomy for price normalization and borrower evaluation.

use alloy::primitives::Address;
use thiserror::Error;

/// Failure while normalizing prices or evaluating a borrower.
///
/// `InvalidReserve` and `MissingPrice` are scoped to a single borrower: the
/// scanner logs them and skips that account without emitting partial results.
/// `ZeroReferencePrice` makes every price in the run unusable and aborts the
/// scan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// A reserve field could not be parsed into a usable value.
    #[error("reserve {symbol}: invalid {field} `{value}`")]
    InvalidReserve {
        symbol: String,
        field: &'static str,
        value: String,
    },

    /// A position references an asset with no settlement price.
    #[error("no settlement price for asset {asset}")]
    MissingPrice { asset: Address },

    /// The reference asset priced at zero (or not at all); inverting it
    /// would poison every normalized price with infinities.
    #[error("reference asset price is zero or not finite")]
    ZeroReferencePrice,
}
