//! Subgraph clients for lending-protocol position data.
//!
//! This crate provides the data-retrieval side of the scanner:
//! - Paginated borrower accounts from a protocol subgraph
//! - Reference-asset oracle price lookup
//! - The [`LendingDataSource`] seam the scan orchestration is generic over

mod subgraph;

pub use subgraph::{
    LendingDataSource, OracleAssetPrice, Reserve, ReservePrice, SubgraphClient, UserAccount,
    UserReserve, PAGE_SIZE,
};
