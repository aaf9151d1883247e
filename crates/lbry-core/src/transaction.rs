use serde::{Deserialize, Serialize};

use crate::types::TxId;

// ── Output scripts ────────────────────────────────────────────────────────────

/// Output scripts recognised by the core. Anything else observed on-chain is
/// carried as `Other` and treated as an abandon when it spends a prior
/// claim or support output.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputScript {
    /// Plain value transfer to a P2PKH address.
    PayPubkeyHash { pubkey_hash: [u8; 20] },

    /// Create a claim. `claim_id` is not stored here — it is derived from
    /// the containing output's `(txid, vout)` by
    /// `lbry_crypto::hash::claim_id_for_output`.
    ClaimName {
        name: String,
        claim_payload: Vec<u8>,
        pubkey_hash: [u8; 20],
    },

    /// Update an existing claim. Must spend a prior claim (or update) output
    /// and carries the same `claim_id` forward.
    UpdateClaim {
        name: String,
        claim_id: crate::types::ClaimId,
        claim_payload: Vec<u8>,
        pubkey_hash: [u8; 20],
    },

    /// Support an existing claim with no attached payload.
    SupportClaim {
        name: String,
        claim_id: crate::types::ClaimId,
        pubkey_hash: [u8; 20],
    },

    /// Support an existing claim with an attached data payload (e.g. a
    /// comment or tip message).
    SupportClaimData {
        name: String,
        claim_id: crate::types::ClaimId,
        payload: Vec<u8>,
        pubkey_hash: [u8; 20],
    },

    /// Anything not recognised above. Spending a claim/support output with
    /// one of these is an abandon.
    Other(Vec<u8>),
}

impl OutputScript {
    pub fn is_claim_or_update(&self) -> bool {
        matches!(self, OutputScript::ClaimName { .. } | OutputScript::UpdateClaim { .. })
    }

    pub fn is_support(&self) -> bool {
        matches!(
            self,
            OutputScript::SupportClaim { .. } | OutputScript::SupportClaimData { .. }
        )
    }

    pub fn claim_id(&self) -> Option<crate::types::ClaimId> {
        match self {
            OutputScript::UpdateClaim { claim_id, .. }
            | OutputScript::SupportClaim { claim_id, .. }
            | OutputScript::SupportClaimData { claim_id, .. } => Some(*claim_id),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            OutputScript::ClaimName { name, .. }
            | OutputScript::UpdateClaim { name, .. }
            | OutputScript::SupportClaim { name, .. }
            | OutputScript::SupportClaimData { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn claim_payload(&self) -> Option<&[u8]> {
        match self {
            OutputScript::ClaimName { claim_payload, .. }
            | OutputScript::UpdateClaim { claim_payload, .. } => Some(claim_payload),
            _ => None,
        }
    }
}

// ── Inputs / outputs ──────────────────────────────────────────────────────────

/// An outpoint reference plus the spending script.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_tx: TxId,
    pub prev_vout: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

/// An amount (in dewies) locked under a recognised script.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub script: OutputScript,
}

// ── Transaction ───────────────────────────────────────────────────────────────

/// The standard UTxO transaction shape.
///
/// `tx_id` is populated once the transaction is hashed by
/// `lbry_crypto::hash::tx_id_for_body` — it is not computable from within
/// this crate, which has no hashing dependency.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_id: Option<TxId>,
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub locktime: u32,
}

/// The body bytes that are hashed to produce `tx_id` and covered by a
/// channel's claim signature. Excludes `tx_id` itself — hashing the body
/// must not depend on its own output.
#[derive(Serialize)]
pub struct TransactionBody<'a> {
    pub version: i32,
    pub inputs: &'a Vec<TxInput>,
    pub outputs: &'a Vec<TxOutput>,
    pub locktime: u32,
}

impl Transaction {
    pub fn body(&self) -> TransactionBody<'_> {
        TransactionBody {
            version: self.version,
            inputs: &self.inputs,
            outputs: &self.outputs,
            locktime: self.locktime,
        }
    }

    /// Serialize the body to canonical bytes (bincode) for hashing.
    pub fn body_bytes(&self) -> Vec<u8> {
        bincode::serialize(&self.body()).expect("transaction body serialization is infallible")
    }

    /// `true` if this transaction has a first input to reverse-hash for a
    /// channel signature's digest (§4.5) — coinbase/genesis transactions do not.
    pub fn first_input_txid_reversed(&self) -> Option<[u8; 32]> {
        let input = self.inputs.first()?;
        let mut reversed = *input.prev_tx.as_bytes();
        reversed.reverse();
        Some(reversed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coinbase_like_transaction_has_no_first_input_digest() {
        let tx = Transaction {
            tx_id: None,
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            locktime: 0,
        };
        assert!(tx.first_input_txid_reversed().is_none());
    }

    #[test]
    fn first_input_txid_is_byte_reversed() {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let tx = Transaction {
            tx_id: None,
            version: 1,
            inputs: vec![TxInput {
                prev_tx: TxId::from_bytes(bytes),
                prev_vout: 0,
                script_sig: Vec::new(),
                sequence: 0,
            }],
            outputs: Vec::new(),
            locktime: 0,
        };
        let mut expected = bytes;
        expected.reverse();
        assert_eq!(tx.first_input_txid_reversed().unwrap(), expected);
    }

    #[test]
    fn output_script_helpers_classify_variants() {
        let claim = OutputScript::ClaimName {
            name: "foo".into(),
            claim_payload: Vec::new(),
            pubkey_hash: [0u8; 20],
        };
        assert!(claim.is_claim_or_update());
        assert!(!claim.is_support());
        assert_eq!(claim.name(), Some("foo"));
        assert!(claim.claim_id().is_none());

        let support = OutputScript::SupportClaim {
            name: "foo".into(),
            claim_id: crate::types::ClaimId::from_bytes([1u8; 20]),
            pubkey_hash: [0u8; 20],
        };
        assert!(support.is_support());
        assert!(!support.is_claim_or_update());
        assert!(support.claim_id().is_some());
    }

    #[test]
    fn body_bytes_excludes_tx_id_and_is_deterministic() {
        let tx = Transaction {
            tx_id: Some(TxId::from_bytes([7u8; 32])),
            version: 1,
            inputs: Vec::new(),
            outputs: vec![TxOutput {
                amount: 500,
                script: OutputScript::PayPubkeyHash { pubkey_hash: [9u8; 20] },
            }],
            locktime: 0,
        };
        let mut other = tx.clone();
        other.tx_id = Some(TxId::from_bytes([0xaa; 32]));
        assert_eq!(tx.body_bytes(), other.body_bytes());
    }
}
