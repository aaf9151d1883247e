pub mod claim;
pub mod constants;
pub mod error;
pub mod payload;
pub mod transaction;
pub mod types;

pub use claim::{normalize_name, Claim, Support};
pub use constants::*;
pub use error::LbryError;
pub use payload::{ClaimPayload, ClaimPayloadBuilder};
pub use transaction::{OutputScript, Transaction, TransactionBody, TxInput, TxOutput};
pub use types::{Address, ClaimId, Ledger, TxId};
