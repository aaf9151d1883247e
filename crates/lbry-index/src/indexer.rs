use std::collections::BTreeSet;

use lbry_core::transaction::OutputScript;
use lbry_core::{normalize_name, Claim, ClaimId, ClaimPayload, LbryError, Support, Transaction};
use lbry_crypto::hash::claim_hash_for_id;
use lbry_crypto::signing::verify_claim_signature;
use tracing::{debug, info, warn};

use crate::claimtrie::ClaimtrieEngine;
use crate::db::IndexDb;
use crate::url;

/// The claim indexer (C7): turns decoded transactions into indexed
/// claim/support state, one block at a time.
///
/// Holds no state beyond the `IndexDb` handle — like `ClaimtrieEngine`, a
/// fresh indexer picks up wherever the database's persisted tip left off.
pub struct ClaimIndexer<'a> {
    db: &'a IndexDb,
}

/// A fully resolved claim, as returned by `resolve()` — the claim plus the
/// canonical/short URLs it was last assigned.
#[derive(Debug, Clone)]
pub struct ResolvedClaim {
    pub claim: Claim,
}

/// Per-block counts from one `apply_block` call. `lbry-sync` turns these
/// into the `claims.*`/`supports.*` progress stream (§4.6) — this crate
/// reports only the raw counts since it has no dependency on the event
/// types themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockStats {
    pub changed_names: Vec<String>,
    pub claims_written: u64,
    pub takeovers: u64,
    pub stakes_changed: u64,
    pub supports_written: u64,
}

impl<'a> ClaimIndexer<'a> {
    pub fn new(db: &'a IndexDb) -> Self {
        Self { db }
    }

    /// Apply one block's transactions at `height`, in their on-chain order
    /// (§5: "within a block, transactions are applied in their on-chain
    /// order"). Returns the set of normalized names whose controlling claim
    /// changed as a result.
    pub fn apply_block(&self, height: i64, transactions: &[Transaction]) -> Result<BlockStats, LbryError> {
        let mut touched_names: BTreeSet<String> = BTreeSet::new();
        let mut touched_channels: BTreeSet<ClaimId> = BTreeSet::new();
        let mut stake_touched_claims: BTreeSet<ClaimId> = BTreeSet::new();
        let mut claims_written = 0u64;
        let mut supports_written = 0u64;

        for (tx_order, tx) in transactions.iter().enumerate() {
            self.apply_transaction_outputs(
                height,
                tx_order as u32,
                tx,
                &mut touched_names,
                &mut touched_channels,
                &mut stake_touched_claims,
                &mut claims_written,
                &mut supports_written,
            )?;
        }

        // Abandon detection: after every create/update/support in this block
        // has been written, any outpoint that used to hold a claim or
        // support but was just spent without a recognised claim/update
        // output is an abandon. An update moves the secondary-index entry
        // to the new outpoint as it's applied, so a genuinely-updated claim
        // is invisible to this pass — only a true abandon (or a claim
        // created and spent within the same block) is caught here, which is
        // exactly how same-block collapse falls out for free (§4.8).
        for tx in transactions {
            for input in &tx.inputs {
                if let Some(mut claim) = self.db.claim_by_outpoint(&input.prev_tx, input.prev_vout)? {
                    if !claim.is_abandoned && claim.tx_id == input.prev_tx && claim.vout == input.prev_vout {
                        info!(claim_id = %claim.claim_id, name = %claim.normalized_name, "claim abandoned");
                        claim.is_abandoned = true;
                        claim.is_controlling = false;
                        self.db.put_claim(&claim)?;
                        self.db.watch_name(&claim.normalized_name)?;
                        touched_names.insert(claim.normalized_name.clone());
                        if let Some(channel_id) = claim.signing_channel_id {
                            touched_channels.insert(channel_id);
                        }
                    }
                }
                if let Some(mut support) = self.db.support_by_outpoint(&input.prev_tx, input.prev_vout)? {
                    if !support.is_abandoned && support.tx_id == input.prev_tx && support.vout == input.prev_vout {
                        support.is_abandoned = true;
                        self.db.put_support(&support)?;
                        stake_touched_claims.insert(support.claim_id);
                        if let Some(parent) = self.db.get_claim(&support.claim_id)? {
                            touched_names.insert(parent.normalized_name.clone());
                        }
                        if let Some(channel_id) = support.signing_channel_id {
                            touched_channels.insert(channel_id);
                        }
                    }
                }
            }
        }

        let engine = ClaimtrieEngine::new(self.db);
        let changed = engine.advance_to_height(height)?;
        let takeovers = changed.len() as u64;
        for name in &changed {
            touched_names.insert(name.clone());
        }

        for name in &touched_names {
            url::assign_urls_for_name(self.db, name)?;
        }

        for channel_id in &touched_channels {
            self.recompute_channel_counts(channel_id)?;
        }

        self.db.set_tip_height(height)?;
        self.db.flush()?;

        Ok(BlockStats {
            changed_names: changed,
            claims_written,
            takeovers,
            stakes_changed: stake_touched_claims.len() as u64,
            supports_written,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_transaction_outputs(
        &self,
        height: i64,
        tx_order: u32,
        tx: &Transaction,
        touched_names: &mut BTreeSet<String>,
        touched_channels: &mut BTreeSet<ClaimId>,
        stake_touched_claims: &mut BTreeSet<ClaimId>,
        claims_written: &mut u64,
        supports_written: &mut u64,
    ) -> Result<(), LbryError> {
        let tx_id = tx.tx_id.ok_or(LbryError::NotAClaimOutput)?;
        let first_input_txid_reversed = tx.first_input_txid_reversed().unwrap_or([0u8; 32]);

        for (vout, output) in tx.outputs.iter().enumerate() {
            let vout = vout as u32;
            match &output.script {
                OutputScript::ClaimName { name, claim_payload, .. } => {
                    let claim_id = lbry_crypto::hash::claim_id_for_output(&tx_id, vout);
                    let normalized_name = normalize_name(name);
                    let controlling = self.db.controlling_claim_for_name(&normalized_name)?;
                    let controlling_since = controlling.as_ref().and_then(|c| c.takeover_height.or(Some(c.height)));
                    let activation_height = height + ClaimtrieEngine::activation_delay(height, controlling_since);

                    let payload = ClaimPayload::from_bytes(claim_payload.clone());
                    let signing_channel_id = payload.signing_channel_id();
                    let signature = payload.signature().map(|s| s.to_vec());
                    let signed_payload = payload.without_signature();
                    let claim_hash = claim_hash_for_id(&claim_id);

                    let mut claim = Claim {
                        claim_id,
                        name: name.clone(),
                        normalized_name: normalized_name.clone(),
                        amount: output.amount,
                        height,
                        activation_height,
                        expiration_height: height + lbry_core::constants::EXPIRATION_BLOCKS,
                        is_controlling: false,
                        takeover_height: None,
                        tx_id,
                        vout,
                        tx_order,
                        signing_channel_id,
                        signature_valid: false,
                        claim_hash,
                        first_input_txid_reversed,
                        signed_payload,
                        signature,
                        staked_amount: output.amount,
                        staked_support_amount: 0,
                        short_url: None,
                        canonical_url: None,
                        signed_claim_count: 0,
                        signed_support_count: 0,
                        is_abandoned: false,
                    };
                    claim.signature_valid = self.validate_signature(&claim)?;
                    debug!(claim_id = %claim.claim_id, name = %name, height, "claim inserted");
                    self.db.put_claim(&claim)?;
                    self.db.watch_name(&normalized_name)?;
                    touched_names.insert(normalized_name);
                    *claims_written += 1;
                    if let Some(channel_id) = signing_channel_id {
                        touched_channels.insert(channel_id);
                    }
                }
                OutputScript::UpdateClaim { name, claim_id, claim_payload, .. } => {
                    let Some(mut claim) = self.db.get_claim(claim_id)? else {
                        warn!(claim_id = %claim_id, "update references unknown claim, ignoring");
                        continue;
                    };
                    let normalized_name = normalize_name(name);
                    let payload = ClaimPayload::from_bytes(claim_payload.clone());

                    claim.name = name.clone();
                    claim.normalized_name = normalized_name.clone();
                    claim.amount = output.amount;
                    claim.staked_amount = output.amount;
                    claim.height = height;
                    claim.expiration_height = height + lbry_core::constants::EXPIRATION_BLOCKS;
                    claim.tx_id = tx_id;
                    claim.vout = vout;
                    claim.tx_order = tx_order;
                    claim.signing_channel_id = payload.signing_channel_id();
                    claim.signature = payload.signature().map(|s| s.to_vec());
                    claim.signed_payload = payload.without_signature();
                    claim.claim_hash = claim_hash_for_id(claim_id);
                    claim.first_input_txid_reversed = first_input_txid_reversed;
                    claim.signature_valid = self.validate_signature(&claim)?;

                    debug!(claim_id = %claim_id, name = %name, height, "claim updated");
                    self.db.put_claim(&claim)?;
                    self.db.watch_name(&normalized_name)?;
                    touched_names.insert(normalized_name);
                    *claims_written += 1;
                    if let Some(channel_id) = claim.signing_channel_id {
                        touched_channels.insert(channel_id);
                    }
                }
                OutputScript::SupportClaim { claim_id, .. } => {
                    self.apply_support(
                        height,
                        tx_order,
                        tx_id,
                        vout,
                        output.amount,
                        *claim_id,
                        None,
                        touched_names,
                        touched_channels,
                        stake_touched_claims,
                        supports_written,
                    )?;
                }
                OutputScript::SupportClaimData { claim_id, payload, .. } => {
                    self.apply_support(
                        height,
                        tx_order,
                        tx_id,
                        vout,
                        output.amount,
                        *claim_id,
                        Some(payload.clone()),
                        touched_names,
                        touched_channels,
                        stake_touched_claims,
                        supports_written,
                    )?;
                }
                OutputScript::PayPubkeyHash { .. } | OutputScript::Other(_) => {}
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_support(
        &self,
        height: i64,
        tx_order: u32,
        tx_id: lbry_core::types::TxId,
        vout: u32,
        amount: u64,
        claim_id: ClaimId,
        data_payload: Option<Vec<u8>>,
        touched_names: &mut BTreeSet<String>,
        touched_channels: &mut BTreeSet<ClaimId>,
        stake_touched_claims: &mut BTreeSet<ClaimId>,
        supports_written: &mut u64,
    ) -> Result<(), LbryError> {
        let Some(parent) = self.db.get_claim(&claim_id)? else {
            warn!(claim_id = %claim_id, "support references unknown claim, ignoring");
            return Ok(());
        };
        let controlling = self.db.controlling_claim_for_name(&parent.normalized_name)?;
        // A support for the claim that already controls the name cannot
        // itself trigger a takeover, so it activates immediately rather
        // than racing the usual delay against its own controlling height.
        let activation_height = if controlling.as_ref().is_some_and(|c| c.claim_id == parent.claim_id) {
            height
        } else {
            let controlling_since = controlling.as_ref().and_then(|c| c.takeover_height.or(Some(c.height)));
            height + ClaimtrieEngine::activation_delay(height, controlling_since)
        };

        let (signing_channel_id, signature, signed_payload, claim_hash) = match &data_payload {
            Some(bytes) => {
                let payload = ClaimPayload::from_bytes(bytes.clone());
                (
                    payload.signing_channel_id(),
                    payload.signature().map(|s| s.to_vec()),
                    payload.without_signature(),
                    claim_hash_for_id(&claim_id),
                )
            }
            None => (None, None, Vec::new(), [0u8; 32]),
        };

        let mut support = Support {
            claim_id,
            amount,
            height,
            activation_height,
            tx_id,
            vout,
            tx_order,
            signing_channel_id,
            signature_valid: false,
            claim_hash,
            first_input_txid_reversed: [0u8; 32],
            signed_payload,
            signature,
            is_abandoned: false,
        };
        support.signature_valid = self.validate_support_signature(&support)?;

        debug!(claim_id = %claim_id, amount, height, "support inserted");
        self.db.put_support(&support)?;
        self.db.watch_name(&parent.normalized_name)?;
        touched_names.insert(parent.normalized_name);
        *supports_written += 1;
        stake_touched_claims.insert(claim_id);
        if let Some(channel_id) = support.signing_channel_id {
            touched_channels.insert(channel_id);
        }
        Ok(())
    }

    /// Recompute `signature_valid` against the signing channel's *current*
    /// public key (§4.7 step 4). Channel public keys are carried in the
    /// channel's own (unsigned) claim payload.
    fn validate_signature(&self, claim: &Claim) -> Result<bool, LbryError> {
        self.validate_against_channel(
            claim.signing_channel_id,
            &claim.claim_hash,
            &claim.first_input_txid_reversed,
            &claim.signed_payload,
            claim.signature.as_deref(),
        )
    }

    fn validate_support_signature(&self, support: &Support) -> Result<bool, LbryError> {
        self.validate_against_channel(
            support.signing_channel_id,
            &support.claim_hash,
            &support.first_input_txid_reversed,
            &support.signed_payload,
            support.signature.as_deref(),
        )
    }

    fn validate_against_channel(
        &self,
        signing_channel_id: Option<ClaimId>,
        claim_hash: &[u8; 32],
        first_input_txid_reversed: &[u8; 32],
        signed_payload: &[u8],
        signature: Option<&[u8]>,
    ) -> Result<bool, LbryError> {
        let Some(channel_id) = signing_channel_id else {
            return Ok(false);
        };
        let Some(signature) = signature else {
            return Ok(false);
        };
        let Some(channel) = self.db.get_claim(&channel_id)? else {
            return Ok(false);
        };
        if channel.is_abandoned {
            return Ok(false);
        }
        let channel_payload = ClaimPayload::from_bytes(channel.signed_payload.clone());
        let Some(channel_public_key) = channel_payload.channel_public_key() else {
            return Ok(false);
        };
        Ok(verify_claim_signature(
            channel_public_key,
            signature,
            first_input_txid_reversed,
            claim_hash,
            signed_payload,
        ))
    }

    /// Recompute `signed_claim_count`/`signed_support_count` on `channel_id`
    /// by scanning the index — O(n), the same tradeoff `IndexDb::all_claims`
    /// documents, acceptable at this implementation's scale.
    fn recompute_channel_counts(&self, channel_id: &ClaimId) -> Result<(), LbryError> {
        let Some(mut channel) = self.db.get_claim(channel_id)? else {
            return Ok(());
        };
        let claim_count = self
            .db
            .all_claims()?
            .iter()
            .filter(|c| !c.is_abandoned && c.signature_valid && c.signing_channel_id == Some(*channel_id))
            .count() as u64;
        let support_count = self
            .db
            .all_supports()?
            .iter()
            .filter(|s| !s.is_abandoned && s.signature_valid && s.signing_channel_id == Some(*channel_id))
            .count() as u64;

        channel.signed_claim_count = claim_count;
        channel.signed_support_count = support_count;
        self.db.put_claim(&channel)?;
        Ok(())
    }

    /// Resolve a `name#prefix` or bare `name` URL to its claim, per the
    /// current indexed state. Bare names resolve to the controlling claim.
    pub fn resolve(&self, url: &str) -> Result<Option<ResolvedClaim>, LbryError> {
        let (name, prefix) = match url.split_once('#') {
            Some((name, prefix)) => (name, Some(prefix)),
            None => (url, None),
        };
        let normalized_name = normalize_name(name);
        let claims = self.db.claims_for_name(&normalized_name)?;

        let found = match prefix {
            Some(prefix) => claims.into_iter().find(|c| {
                !c.is_abandoned && c.claim_id.to_hex().starts_with(prefix)
            }),
            None => claims.into_iter().find(|c| c.is_controlling),
        };

        Ok(found.map(|claim| ResolvedClaim { claim }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbry_core::transaction::{TxInput, TxOutput};
    use lbry_core::types::TxId;
    use lbry_core::ClaimPayloadBuilder;

    fn temp_db(name: &str) -> IndexDb {
        let dir = std::env::temp_dir().join(format!("lbry_indexer_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        IndexDb::open(&dir).expect("open temp db")
    }

    fn claim_tx(tx_id: [u8; 32], name: &str, amount: u64, payload: Vec<u8>) -> Transaction {
        Transaction {
            tx_id: Some(TxId::from_bytes(tx_id)),
            version: 1,
            inputs: vec![TxInput {
                prev_tx: TxId::from_bytes([0xff; 32]),
                prev_vout: 0,
                script_sig: Vec::new(),
                sequence: 0,
            }],
            outputs: vec![TxOutput {
                amount,
                script: OutputScript::ClaimName {
                    name: name.to_string(),
                    claim_payload: payload,
                    pubkey_hash: [0u8; 20],
                },
            }],
            locktime: 0,
        }
    }

    #[test]
    fn first_claim_on_a_name_activates_and_controls_immediately() {
        let db = temp_db("first_claim_controls");
        let indexer = ClaimIndexer::new(&db);
        let tx = claim_tx([1u8; 32], "foo", 10_00000000, Vec::new());

        let stats = indexer.apply_block(113, &[tx]).unwrap();
        assert_eq!(stats.changed_names, vec!["foo".to_string()]);
        assert_eq!(stats.claims_written, 1);
        assert_eq!(stats.takeovers, 1);

        let resolved = indexer.resolve("foo").unwrap().unwrap();
        assert!(resolved.claim.is_controlling);
        assert_eq!(resolved.claim.short_url.as_deref(), Some("foo#d"));
    }

    #[test]
    fn abandoning_the_only_claim_in_the_same_block_leaves_nothing_controlling() {
        let db = temp_db("same_block_abandon");
        let indexer = ClaimIndexer::new(&db);
        let create = claim_tx([2u8; 32], "foo", 1_00000000, Vec::new());
        let claim_id = lbry_crypto::hash::claim_id_for_output(&TxId::from_bytes([2u8; 32]), 0);

        let abandon = Transaction {
            tx_id: Some(TxId::from_bytes([3u8; 32])),
            version: 1,
            inputs: vec![TxInput {
                prev_tx: TxId::from_bytes([2u8; 32]),
                prev_vout: 0,
                script_sig: Vec::new(),
                sequence: 0,
            }],
            outputs: vec![TxOutput {
                amount: 1_00000000,
                script: OutputScript::PayPubkeyHash { pubkey_hash: [0u8; 20] },
            }],
            locktime: 0,
        };

        indexer.apply_block(113, &[create, abandon]).unwrap();
        assert!(indexer.resolve("foo").unwrap().is_none());
        let stored = db.get_claim(&claim_id).unwrap().unwrap();
        assert!(stored.is_abandoned);
    }

    #[test]
    fn a_claim_signed_by_a_channel_validates_against_its_current_public_key() {
        let db = temp_db("signature_validation");
        let indexer = ClaimIndexer::new(&db);

        let secp = secp256k1::Secp256k1::new();
        let secret_key = secp256k1::SecretKey::from_slice(&[7u8; 32]).unwrap();
        let public_key = secp256k1::PublicKey::from_secret_key(&secp, &secret_key);

        let channel_payload = ClaimPayloadBuilder::new()
            .channel_public_key(&public_key.serialize())
            .build();
        let channel_tx = claim_tx([10u8; 32], "@chan", 1_00000000, channel_payload.as_bytes().to_vec());
        indexer.apply_block(100, &[channel_tx]).unwrap();
        let channel_id = lbry_crypto::hash::claim_id_for_output(&TxId::from_bytes([10u8; 32]), 0);

        let claim_hash = claim_hash_for_id(&channel_id);
        // Build the would-be claim id for the stream before constructing its
        // signature, since signing covers a digest keyed on the eventual
        // claim_id-derived claim_hash.
        let stream_claim_id = lbry_crypto::hash::claim_id_for_output(&TxId::from_bytes([11u8; 32]), 0);
        let stream_claim_hash = claim_hash_for_id(&stream_claim_id);
        let unsigned = ClaimPayloadBuilder::new()
            .signing_channel_id(&channel_id)
            .title("a stream")
            .build();
        let first_input_txid_reversed = {
            let mut bytes = [0xff; 32];
            bytes.reverse();
            bytes
        };
        let digest = lbry_crypto::signing::claim_signing_digest(
            &first_input_txid_reversed,
            &stream_claim_hash,
            &unsigned.without_signature(),
        );
        let message = secp256k1::Message::from_digest(digest);
        let signature = secp.sign_ecdsa(&message, &secret_key).serialize_der().to_vec();

        let signed_payload = ClaimPayloadBuilder::new()
            .signing_channel_id(&channel_id)
            .title("a stream")
            .signature(&signature)
            .build();
        let stream_tx = claim_tx([11u8; 32], "a-stream", 1_00000000, signed_payload.as_bytes().to_vec());

        indexer.apply_block(101, &[stream_tx]).unwrap();
        let stream = db.get_claim(&stream_claim_id).unwrap().unwrap();
        assert!(stream.signature_valid);
        let _ = claim_hash;

        let channel = db.get_claim(&channel_id).unwrap().unwrap();
        assert_eq!(channel.signed_claim_count, 1);
    }

    fn support_tx(tx_id: [u8; 32], prev_tx: [u8; 32], name: &str, claim_id: ClaimId, amount: u64) -> Transaction {
        Transaction {
            tx_id: Some(TxId::from_bytes(tx_id)),
            version: 1,
            inputs: vec![TxInput {
                prev_tx: TxId::from_bytes(prev_tx),
                prev_vout: 0,
                script_sig: Vec::new(),
                sequence: 0,
            }],
            outputs: vec![TxOutput {
                amount,
                script: OutputScript::SupportClaim {
                    name: name.to_string(),
                    claim_id,
                    pubkey_hash: [0u8; 20],
                },
            }],
            locktime: 0,
        }
    }

    /// Walks through the worked activation example almost verbatim: A takes
    /// the name immediately, B pends against A's takeover height, a support
    /// for the still-controlling A activates without delay, and D's much
    /// larger stake overtakes both A and the still-pending C the moment C
    /// would have activated.
    #[test]
    fn spec_activation_walkthrough() {
        const COIN: u64 = 100_000_000;
        let db = temp_db("activation_walkthrough");
        let indexer = ClaimIndexer::new(&db);

        let a = claim_tx([1u8; 32], "foo", 10 * COIN, Vec::new());
        indexer.apply_block(113, &[a]).unwrap();
        let a_id = lbry_crypto::hash::claim_id_for_output(&TxId::from_bytes([1u8; 32]), 0);
        assert!(db.get_claim(&a_id).unwrap().unwrap().is_controlling);

        let b = claim_tx([2u8; 32], "foo", 20 * COIN, Vec::new());
        indexer.apply_block(501, &[b]).unwrap();
        let b_id = lbry_crypto::hash::claim_id_for_output(&TxId::from_bytes([2u8; 32]), 0);
        assert_eq!(db.get_claim(&b_id).unwrap().unwrap().activation_height, 513);
        assert!(db.get_claim(&a_id).unwrap().unwrap().is_controlling);

        let support = support_tx([3u8; 32], [1u8; 32], "foo", a_id, 14 * COIN);
        let support_stats = indexer.apply_block(510, &[support]).unwrap();
        assert_eq!(support_stats.supports_written, 1);
        assert_eq!(support_stats.stakes_changed, 1);
        let a_at_510 = db.get_claim(&a_id).unwrap().unwrap();
        assert!(a_at_510.is_controlling);
        let engine = ClaimtrieEngine::new(&db);
        assert_eq!(engine.effective_amount(&a_at_510, 510).unwrap(), 24 * COIN);

        let c = claim_tx([4u8; 32], "foo", 50 * COIN, Vec::new());
        indexer.apply_block(512, &[c]).unwrap();
        let c_id = lbry_crypto::hash::claim_id_for_output(&TxId::from_bytes([4u8; 32]), 0);
        assert_eq!(db.get_claim(&c_id).unwrap().unwrap().activation_height, 524);
        assert!(db.get_claim(&a_id).unwrap().unwrap().is_controlling);

        let d = claim_tx([5u8; 32], "foo", 60 * COIN, Vec::new());
        let stats = indexer.apply_block(524, &[d]).unwrap();
        assert_eq!(stats.changed_names, vec!["foo".to_string()]);
        let d_id = lbry_crypto::hash::claim_id_for_output(&TxId::from_bytes([5u8; 32]), 0);
        let d_after = db.get_claim(&d_id).unwrap().unwrap();
        assert!(d_after.is_controlling);
        assert_eq!(d_after.takeover_height, Some(524));
        assert!(!db.get_claim(&a_id).unwrap().unwrap().is_controlling);
    }

    /// Block 113 settles a tiebreak between A and B; block 115 abandons the
    /// winner and introduces a third claim that immediately outstakes the
    /// sole survivor — the name ends up controlled by the brand-new entrant,
    /// not handed back to A.
    #[test]
    fn winner_abandoned_then_retaken_by_a_new_claim() {
        const COIN: u64 = 100_000_000;
        let db = temp_db("winner_abandoned_retaken");
        let indexer = ClaimIndexer::new(&db);

        let a = claim_tx([1u8; 32], "foo", COIN, Vec::new());
        let b = claim_tx([2u8; 32], "foo", 2 * COIN, Vec::new());
        indexer.apply_block(113, &[a, b]).unwrap();
        let a_id = lbry_crypto::hash::claim_id_for_output(&TxId::from_bytes([1u8; 32]), 0);
        let b_id = lbry_crypto::hash::claim_id_for_output(&TxId::from_bytes([2u8; 32]), 0);
        assert!(db.get_claim(&b_id).unwrap().unwrap().is_controlling);

        let abandon_b = Transaction {
            tx_id: Some(TxId::from_bytes([3u8; 32])),
            version: 1,
            inputs: vec![TxInput {
                prev_tx: TxId::from_bytes([2u8; 32]),
                prev_vout: 0,
                script_sig: Vec::new(),
                sequence: 0,
            }],
            outputs: vec![TxOutput {
                amount: 2 * COIN,
                script: OutputScript::PayPubkeyHash { pubkey_hash: [0u8; 20] },
            }],
            locktime: 0,
        };
        let c = claim_tx([4u8; 32], "foo", 3 * COIN, Vec::new());
        let stats = indexer.apply_block(115, &[abandon_b, c]).unwrap();
        assert_eq!(stats.changed_names, vec!["foo".to_string()]);

        let c_id = lbry_crypto::hash::claim_id_for_output(&TxId::from_bytes([4u8; 32]), 0);
        let a_after = db.get_claim(&a_id).unwrap().unwrap();
        let b_after = db.get_claim(&b_id).unwrap().unwrap();
        let c_after = db.get_claim(&c_id).unwrap().unwrap();
        assert!(c_after.is_controlling);
        assert_eq!(c_after.takeover_height, Some(115));
        assert!(b_after.is_abandoned);
        assert!(!a_after.is_controlling);
        assert!(!a_after.is_abandoned);
    }

    /// A channel re-keys before re-publishing a stream it previously signed;
    /// the republished version is invalid under the new key, but returning
    /// to the original key makes it valid again — re-validation always
    /// checks the channel's *current* key, with no memory of past results.
    #[test]
    fn signature_validity_flips_with_channel_rekeying_and_reverts() {
        let db = temp_db("signature_rekey_roundtrip");
        let indexer = ClaimIndexer::new(&db);
        let secp = secp256k1::Secp256k1::new();

        let original_key = secp256k1::SecretKey::from_slice(&[9u8; 32]).unwrap();
        let original_pub = secp256k1::PublicKey::from_secret_key(&secp, &original_key);
        let new_key = secp256k1::SecretKey::from_slice(&[11u8; 32]).unwrap();

        let channel_payload = ClaimPayloadBuilder::new()
            .channel_public_key(&original_pub.serialize())
            .build();
        let channel_tx = claim_tx([20u8; 32], "@chan", 100_000_000, channel_payload.as_bytes().to_vec());
        indexer.apply_block(200, &[channel_tx]).unwrap();
        let channel_id = lbry_crypto::hash::claim_id_for_output(&TxId::from_bytes([20u8; 32]), 0);

        let stream_claim_id = lbry_crypto::hash::claim_id_for_output(&TxId::from_bytes([21u8; 32]), 0);
        let stream_claim_hash = claim_hash_for_id(&stream_claim_id);

        // Each update spends the claim's previous outpoint as its first
        // input, so the signing digest's `first_input_txid_reversed` must
        // track whichever outpoint that particular transaction spends —
        // it is not fixed across the claim's history the way `claim_hash`
        // is (§4.5).
        let reversed = |tx_id: [u8; 32]| {
            let mut bytes = tx_id;
            bytes.reverse();
            bytes
        };

        let sign_with = |key: &secp256k1::SecretKey, spent_tx_id: [u8; 32]| {
            let unsigned = ClaimPayloadBuilder::new()
                .signing_channel_id(&channel_id)
                .title("a stream")
                .build();
            let digest = lbry_crypto::signing::claim_signing_digest(
                &reversed(spent_tx_id),
                &stream_claim_hash,
                &unsigned.without_signature(),
            );
            let message = secp256k1::Message::from_digest(digest);
            let signature = secp.sign_ecdsa(&message, key).serialize_der().to_vec();
            ClaimPayloadBuilder::new()
                .signing_channel_id(&channel_id)
                .title("a stream")
                .signature(&signature)
                .build()
        };

        // Publish S1 signed under the original key — valid. `claim_tx`
        // always spends a fixed placeholder outpoint ([0xff; 32]).
        let publish = claim_tx(
            [21u8; 32],
            "a-stream",
            100_000_000,
            sign_with(&original_key, [0xff; 32]).as_bytes().to_vec(),
        );
        indexer.apply_block(201, &[publish]).unwrap();
        assert!(db.get_claim(&stream_claim_id).unwrap().unwrap().signature_valid);

        // Re-key the channel without broadcasting the new key yet, then
        // update S1 re-signed under that new key: invalid, since the
        // channel's current on-chain key is still the original.
        let update_with_new_signature = Transaction {
            tx_id: Some(TxId::from_bytes([22u8; 32])),
            version: 1,
            inputs: vec![TxInput {
                prev_tx: TxId::from_bytes([21u8; 32]),
                prev_vout: 0,
                script_sig: Vec::new(),
                sequence: 0,
            }],
            outputs: vec![TxOutput {
                amount: 100_000_000,
                script: OutputScript::UpdateClaim {
                    name: "a-stream".to_string(),
                    claim_id: stream_claim_id,
                    claim_payload: sign_with(&new_key, [21u8; 32]).as_bytes().to_vec(),
                    pubkey_hash: [0u8; 20],
                },
            }],
            locktime: 0,
        };
        indexer.apply_block(202, &[update_with_new_signature]).unwrap();
        assert!(!db.get_claim(&stream_claim_id).unwrap().unwrap().signature_valid);

        // Re-publish signed under the original key again: valid once more.
        let revert_signature = Transaction {
            tx_id: Some(TxId::from_bytes([23u8; 32])),
            version: 1,
            inputs: vec![TxInput {
                prev_tx: TxId::from_bytes([22u8; 32]),
                prev_vout: 0,
                script_sig: Vec::new(),
                sequence: 0,
            }],
            outputs: vec![TxOutput {
                amount: 100_000_000,
                script: OutputScript::UpdateClaim {
                    name: "a-stream".to_string(),
                    claim_id: stream_claim_id,
                    claim_payload: sign_with(&original_key, [22u8; 32]).as_bytes().to_vec(),
                    pubkey_hash: [0u8; 20],
                },
            }],
            locktime: 0,
        };
        indexer.apply_block(203, &[revert_signature]).unwrap();
        assert!(db.get_claim(&stream_claim_id).unwrap().unwrap().signature_valid);
    }
}
