pub mod claimtrie;
pub mod db;
pub mod indexer;
pub mod url;

pub use claimtrie::{ClaimtrieEngine, TakeoverResult};
pub use db::IndexDb;
pub use indexer::{BlockStats, ClaimIndexer, ResolvedClaim};
