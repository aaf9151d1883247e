use serde::{Deserialize, Serialize};

use crate::types::{ClaimId, TxId};

/// A claim as materialised by the indexer (C7/C8) — not the wire shape, a
/// read model assembled from one or more on-chain outputs over the claim's
/// lifetime.
///
/// `claim_id` is stable across `update` outputs; `height` is the height at
/// which this claim (in its current form) was confirmed, which for an
/// updated claim is the update's height, not the original claim's.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claim {
    pub claim_id: ClaimId,
    pub name: String,
    pub normalized_name: String,
    pub amount: u64,
    pub height: i64,
    pub activation_height: i64,
    pub expiration_height: i64,
    pub is_controlling: bool,
    pub takeover_height: Option<i64>,

    /// Location of the output that currently represents this claim.
    pub tx_id: TxId,
    pub vout: u32,

    /// Position of the confirming transaction within its block — the
    /// tie-break the claimtrie engine falls back to when two claims on the
    /// same name share both effective amount and height (§4.8).
    pub tx_order: u32,

    pub signing_channel_id: Option<ClaimId>,
    pub signature_valid: bool,

    /// Inputs to the channel-signature digest (§4.5), retained so a later
    /// re-validation pass (triggered by the signing channel re-keying) can
    /// recompute the check without re-reading the original transaction.
    pub claim_hash: [u8; 32],
    pub first_input_txid_reversed: [u8; 32],
    pub signed_payload: Vec<u8>,
    pub signature: Option<Vec<u8>>,

    pub staked_amount: u64,
    pub staked_support_amount: u64,

    pub short_url: Option<String>,
    pub canonical_url: Option<String>,

    /// Aggregate counts for channel claims — how many claims/supports are
    /// currently validly signed by this claim acting as a channel.
    pub signed_claim_count: u64,
    pub signed_support_count: u64,

    /// `true` once an `abandon` output has spent this claim's output
    /// without a recognised claim/update script. History is retained.
    pub is_abandoned: bool,
}

impl Claim {
    /// Effective amount at height `h`: own amount plus every non-abandoned
    /// support for this claim that is active (`activation_height <= h`).
    /// Supports are summed by the caller (§4.8) — this just recomputes the
    /// cached `staked_amount + staked_support_amount` shortcut when both
    /// are already known to be current for `h`.
    pub fn effective_amount(&self) -> u64 {
        self.staked_amount.saturating_add(self.staked_support_amount)
    }

    pub fn is_active_at(&self, height: i64) -> bool {
        !self.is_abandoned && self.activation_height <= height && height < self.expiration_height
    }
}

/// A support attached to an existing claim.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Support {
    pub claim_id: ClaimId,
    pub amount: u64,
    pub height: i64,
    pub activation_height: i64,

    pub tx_id: TxId,
    pub vout: u32,
    pub tx_order: u32,

    pub signing_channel_id: Option<ClaimId>,
    pub signature_valid: bool,
    pub claim_hash: [u8; 32],
    pub first_input_txid_reversed: [u8; 32],
    pub signed_payload: Vec<u8>,
    pub signature: Option<Vec<u8>>,

    pub is_abandoned: bool,
}

impl Support {
    pub fn is_active_at(&self, height: i64) -> bool {
        !self.is_abandoned && self.activation_height <= height
    }
}

/// Unicode-normalised form of a claim name used for takeover arbitration —
/// case-folded and NFC-normalised so visually identical names compete for
/// the same slot in the claimtrie.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .collect::<String>()
}
