use thiserror::Error;

/// The single error type shared across the wallet and indexer crates.
///
/// Variants map directly onto the error kinds a caller needs to
/// distinguish: user-recoverable conditions (wrong password), programmer
/// errors that should fail fast (malformed claim id, lock discipline), and
/// operational conditions the sync driver retries around (upstream node
/// unavailable, database conflict). `InvalidSignature` deliberately has no
/// variant here — a bad signature on a claim or support is not fatal, it is
/// absorbed into indexed state as `signature_valid = false`.
#[derive(Debug, Error)]
pub enum LbryError {
    // ── Wallet / key errors ──────────────────────────────────────────────────
    #[error("invalid password")]
    InvalidPassword,

    #[error("account is already encrypted")]
    AlreadyEncrypted,

    #[error("account is not encrypted")]
    NotEncrypted,

    #[error("cannot get private key on watch-only or encrypted account")]
    NoPrivateKey,

    #[error("address generation lock discipline violated")]
    LockDisciplineViolation,

    #[error("invalid extended key string: {0}")]
    InvalidExtendedKey(String),

    #[error("derivation of hardened child requires a private key")]
    HardenedDerivationRequiresPrivateKey,

    #[error("child key derivation produced an invalid point, retry with index+1")]
    InvalidChildDerivation,

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    // ── Claim / transaction errors ───────────────────────────────────────────
    #[error("invalid claim id: must be {} hex characters", crate::constants::CLAIM_ID_HEX_LEN)]
    InvalidClaimId,

    #[error("output script is not a claim, update, or support output")]
    NotAClaimOutput,

    #[error("update output does not spend a claim output")]
    UpdateWithoutPriorClaim,

    // ── Sync / index errors ──────────────────────────────────────────────────
    #[error("upstream node unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("database conflict, retrying from last committed height")]
    DatabaseConflict,

    #[error("sync cancelled")]
    Cancelled,

    // ── Storage / serialization ──────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sled::Error> for LbryError {
    fn from(e: sled::Error) -> Self {
        LbryError::Storage(e.to_string())
    }
}

impl From<bincode::Error> for LbryError {
    fn from(e: bincode::Error) -> Self {
        LbryError::Serialization(e.to_string())
    }
}
