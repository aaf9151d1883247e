use serde::{Deserialize, Serialize};
use std::fmt;

/// A transaction id — the double-SHA256 of the serialised transaction body.
///
/// Stored in natural (little-endian) byte order; `to_hex`/`from_hex` use the
/// reversed-byte-order hex form conventional for block explorers and the
/// upstream node's RPC (e.g. `get_raw_transaction`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId([u8; 32]);

impl TxId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    pub fn from_hex(s: &str) -> Result<Self, crate::error::LbryError> {
        let mut bytes = hex::decode(s).map_err(|_| crate::error::LbryError::InvalidClaimId)?;
        if bytes.len() != 32 {
            return Err(crate::error::LbryError::InvalidClaimId);
        }
        bytes.reverse();
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", self.to_hex())
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A claim's identity, stable across `update` outputs.
///
/// Derived as `reverse(sha256(sha256(txid ∥ vout)))`, truncated to the
/// leading 20 bytes — see `lbry_crypto::hash::claim_id_for_output`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimId([u8; 20]);

impl ClaimId {
    pub const LEN_HEX: usize = 40;

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Validates that `s` is exactly 40 hex characters — anything else is a
    /// programmer error (§7 "Invalid claim id"), not a recoverable condition.
    pub fn from_hex(s: &str) -> Result<Self, crate::error::LbryError> {
        if s.len() != Self::LEN_HEX || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(crate::error::LbryError::InvalidClaimId);
        }
        let bytes = hex::decode(s).map_err(|_| crate::error::LbryError::InvalidClaimId)?;
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Shortest unique hex prefix of a given length, used by short-URL assignment.
    pub fn hex_prefix(&self, len: usize) -> String {
        let full = self.to_hex();
        full[..len.min(full.len())].to_string()
    }
}

impl fmt::Debug for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClaimId({})", self.to_hex())
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A Base58Check-encoded P2PKH address string. Construction is left to
/// `lbry_crypto::hash::address_from_pubkey` — this type just carries the
/// validated string form around the rest of the workspace.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn from_encoded(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which LBRY network a wallet or key belongs to — governs version bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ledger {
    #[serde(rename = "lbc_mainnet")]
    LbcMainnet,
    #[serde(rename = "lbc_regtest")]
    LbcRegtest,
}

impl Ledger {
    pub fn pubkey_hash_version(&self) -> u8 {
        match self {
            Ledger::LbcMainnet => crate::constants::MAINNET_PUBKEY_HASH_VERSION,
            Ledger::LbcRegtest => crate::constants::REGTEST_PUBKEY_HASH_VERSION,
        }
    }

    pub fn extended_private_key_version(&self) -> [u8; 4] {
        match self {
            Ledger::LbcMainnet => crate::constants::MAINNET_EXTENDED_PRIVATE_KEY_VERSION,
            Ledger::LbcRegtest => crate::constants::REGTEST_EXTENDED_PRIVATE_KEY_VERSION,
        }
    }

    pub fn extended_public_key_version(&self) -> [u8; 4] {
        match self {
            Ledger::LbcMainnet => crate::constants::MAINNET_EXTENDED_PUBLIC_KEY_VERSION,
            Ledger::LbcRegtest => crate::constants::REGTEST_EXTENDED_PUBLIC_KEY_VERSION,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Ledger::LbcMainnet => "lbc_mainnet",
            Ledger::LbcRegtest => "lbc_regtest",
        }
    }
}
