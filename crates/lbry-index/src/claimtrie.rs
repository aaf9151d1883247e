use lbry_core::constants::{ACTIVATION_DELAY_FACTOR, MAX_ACTIVATION_DELAY};
use lbry_core::{Claim, LbryError};
use tracing::{debug, info};

use crate::db::IndexDb;

/// The claimtrie engine (C8): activation delay, takeover arbitration,
/// expiration, effective-amount tallying. Operates on one `IndexDb` — it
/// has no state of its own beyond what is persisted there, so a fresh
/// engine can resume from any committed height.
pub struct ClaimtrieEngine<'a> {
    db: &'a IndexDb,
}

/// Outcome of re-evaluating a single name at a height — used by the
/// indexer (C7) to recompute canonical URLs after a controlling-claim
/// change propagates to channels that depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TakeoverResult {
    pub name_changed_controller: bool,
}

impl<'a> ClaimtrieEngine<'a> {
    pub fn new(db: &'a IndexDb) -> Self {
        Self { db }
    }

    /// Activation delay for an entry confirmed at `entry_height`, given the
    /// height at which the name's current controlling claim took over (or
    /// `None` if the name has no controlling claim yet) — §4.8's formula:
    /// `min(floor((h_c - h_ctrl) / 32), 4032)`, or immediate (`0`) if there
    /// is no controlling claim to race against.
    pub fn activation_delay(entry_height: i64, controlling_since: Option<i64>) -> i64 {
        match controlling_since {
            None => 0,
            Some(h_ctrl) => {
                let delay = (entry_height - h_ctrl) / ACTIVATION_DELAY_FACTOR;
                delay.clamp(0, MAX_ACTIVATION_DELAY)
            }
        }
    }

    /// Effective amount of `claim` at `height`: its own amount plus every
    /// non-abandoned, activated support attached to it.
    pub fn effective_amount(&self, claim: &Claim, height: i64) -> Result<u64, LbryError> {
        let supports = self.db.supports_for_claim(&claim.claim_id)?;
        let support_total: u64 = supports
            .iter()
            .filter(|s| s.is_active_at(height))
            .map(|s| s.amount)
            .sum();
        Ok(claim.amount.saturating_add(support_total))
    }

    /// Expire every claim whose `expiration_height` equals `height`. The
    /// controlling claim on a name, if it is among them, loses its slot
    /// with no activation delay for whoever replaces it — the caller is
    /// expected to immediately re-run `process_name_at_height` for every
    /// name returned here.
    pub fn expire_at_height(&self, height: i64) -> Result<Vec<String>, LbryError> {
        let mut touched_names = Vec::new();
        for mut claim in self.db.all_claims()? {
            if claim.is_abandoned || claim.expiration_height != height {
                continue;
            }
            info!(claim_id = %claim.claim_id, name = %claim.name, "claim expired");
            claim.is_abandoned = true;
            claim.is_controlling = false;
            self.db.put_claim(&claim)?;
            self.db.watch_name(&claim.normalized_name)?;
            touched_names.push(claim.normalized_name);
        }
        touched_names.sort();
        touched_names.dedup();
        Ok(touched_names)
    }

    /// Re-evaluate takeover for `normalized_name` at `height`: select the
    /// candidate with the greatest effective amount among claims already
    /// activated by this height, tie-broken by earliest confirming height
    /// then transaction order within a block (§4.8 step 2). If the winner
    /// differs from the current controlling claim, record the takeover and
    /// recompute every still-pending claim's activation height against the
    /// new takeover height.
    ///
    /// A takeover can pull a still-pending claim's recomputed activation
    /// height back to `<= height` (a pending claim confirmed at the same
    /// height the takeover lands on has zero delay against it). That claim
    /// must be allowed to contest the name within this same call rather
    /// than waiting for the next height to be evaluated, so candidate
    /// selection repeats until a height's outcome is stable.
    pub fn process_name_at_height(&self, normalized_name: &str, height: i64) -> Result<TakeoverResult, LbryError> {
        let mut any_takeover = false;

        loop {
            let mut claims = self.db.claims_for_name(normalized_name)?;
            claims.retain(|c| !c.is_abandoned && height < c.expiration_height);

            if claims.is_empty() {
                self.db.unwatch_name(normalized_name)?;
                return Ok(TakeoverResult { name_changed_controller: any_takeover });
            }

            let current_controlling = claims.iter().find(|c| c.is_controlling).cloned();

            let mut candidates = Vec::with_capacity(claims.len());
            for claim in &claims {
                if claim.activation_height <= height {
                    let amount = self.effective_amount(claim, height)?;
                    candidates.push((claim.clone(), amount));
                }
            }

            if candidates.is_empty() {
                break;
            }

            candidates.sort_by(|(a_claim, a_amount), (b_claim, b_amount)| {
                b_amount
                    .cmp(a_amount)
                    .then(a_claim.height.cmp(&b_claim.height))
                    .then(a_claim.tx_order.cmp(&b_claim.tx_order))
            });
            let winner = candidates[0].0.clone();

            let takeover = match &current_controlling {
                Some(current) => current.claim_id != winner.claim_id,
                None => true,
            };

            if !takeover {
                break;
            }

            info!(name = %normalized_name, claim_id = %winner.claim_id, height, "takeover");
            if let Some(mut previous) = current_controlling {
                previous.is_controlling = false;
                self.db.put_claim(&previous)?;
            }

            let mut new_controller = winner.clone();
            new_controller.is_controlling = true;
            new_controller.takeover_height = Some(height);
            self.db.put_claim(&new_controller)?;

            let mut newly_eligible = false;
            for claim in &claims {
                if claim.claim_id == new_controller.claim_id {
                    continue;
                }
                if claim.activation_height > height {
                    let mut pending = claim.clone();
                    pending.activation_height =
                        height + Self::activation_delay(claim.height, Some(height));
                    debug!(
                        name = %normalized_name,
                        claim_id = %pending.claim_id,
                        new_activation = pending.activation_height,
                        "pending claim rescheduled after takeover"
                    );
                    if pending.activation_height <= height {
                        newly_eligible = true;
                    }
                    self.db.put_claim(&pending)?;
                }
            }

            any_takeover = true;
            if !newly_eligible {
                break;
            }
        }

        let claims = self.db.claims_for_name(normalized_name)?;
        let still_pending = claims
            .iter()
            .any(|c| !c.is_abandoned && height < c.expiration_height && c.activation_height > height);
        if !still_pending {
            self.db.unwatch_name(normalized_name)?;
        }

        Ok(TakeoverResult { name_changed_controller: any_takeover })
    }

    /// Run takeover arbitration for every watched name, then expiration, at
    /// `height`. This is the entry point the indexer calls once per block
    /// after applying that block's claim/support mutations.
    pub fn advance_to_height(&self, height: i64) -> Result<Vec<String>, LbryError> {
        let mut changed = Vec::new();
        for name in self.db.watched_names()? {
            let result = self.process_name_at_height(&name, height)?;
            if result.name_changed_controller {
                changed.push(name);
            }
        }
        let expired_names = self.expire_at_height(height)?;
        for name in expired_names {
            let result = self.process_name_at_height(&name, height)?;
            if result.name_changed_controller && !changed.contains(&name) {
                changed.push(name);
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbry_core::types::TxId;
    use lbry_core::ClaimId;

    fn temp_db(name: &str) -> IndexDb {
        let dir = std::env::temp_dir().join(format!("lbry_claimtrie_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        IndexDb::open(&dir).expect("open temp db")
    }

    fn claim(id: u8, name: &str, height: i64, amount: u64, tx_order: u32) -> Claim {
        Claim {
            claim_id: ClaimId::from_bytes([id; 20]),
            name: name.to_string(),
            normalized_name: name.to_string(),
            amount,
            height,
            activation_height: height,
            expiration_height: height + lbry_core::constants::EXPIRATION_BLOCKS,
            is_controlling: false,
            takeover_height: None,
            tx_id: TxId::from_bytes([id; 32]),
            vout: 0,
            tx_order,
            signing_channel_id: None,
            signature_valid: false,
            claim_hash: [0u8; 32],
            first_input_txid_reversed: [0u8; 32],
            signed_payload: Vec::new(),
            signature: None,
            staked_amount: amount,
            staked_support_amount: 0,
            short_url: None,
            canonical_url: None,
            signed_claim_count: 0,
            signed_support_count: 0,
            is_abandoned: false,
        }
    }

    #[test]
    fn activation_delay_is_immediate_with_no_controlling_claim() {
        assert_eq!(ClaimtrieEngine::activation_delay(500, None), 0);
    }

    #[test]
    fn activation_delay_is_capped() {
        // (100_000 - 0) / 32 = 3125, under the cap.
        assert_eq!(ClaimtrieEngine::activation_delay(100_000, Some(0)), 3125);
        // A huge gap clamps to the 4032 cap.
        assert_eq!(ClaimtrieEngine::activation_delay(1_000_000, Some(0)), MAX_ACTIVATION_DELAY);
    }

    #[test]
    fn first_claim_on_a_name_activates_and_takes_over_immediately() {
        let db = temp_db("first_claim");
        let engine = ClaimtrieEngine::new(&db);
        let a = claim(1, "foo", 113, 10_00000000, 0);
        db.put_claim(&a).unwrap();
        db.watch_name("foo").unwrap();

        let result = engine.process_name_at_height("foo", 113).unwrap();
        assert!(result.name_changed_controller);
        let stored = db.get_claim(&a.claim_id).unwrap().unwrap();
        assert!(stored.is_controlling);
        assert_eq!(stored.takeover_height, Some(113));
    }

    #[test]
    fn same_height_tie_breaks_by_transaction_order() {
        let db = temp_db("same_height_tie");
        let engine = ClaimtrieEngine::new(&db);
        let a = claim(1, "foo", 113, 1_00000000, 1);
        let b = claim(2, "foo", 113, 1_00000000, 0);
        db.put_claim(&a).unwrap();
        db.put_claim(&b).unwrap();
        db.watch_name("foo").unwrap();

        engine.process_name_at_height("foo", 113).unwrap();
        let winner = db.get_claim(&b.claim_id).unwrap().unwrap();
        let loser = db.get_claim(&a.claim_id).unwrap().unwrap();
        assert!(winner.is_controlling);
        assert!(!loser.is_controlling);
    }

    #[test]
    fn higher_amount_wins_same_height() {
        let db = temp_db("same_height_amount");
        let engine = ClaimtrieEngine::new(&db);
        let a = claim(1, "foo", 113, 1_00000000, 0);
        let b = claim(2, "foo", 113, 2_00000000, 1);
        db.put_claim(&a).unwrap();
        db.put_claim(&b).unwrap();
        db.watch_name("foo").unwrap();

        engine.process_name_at_height("foo", 113).unwrap();
        assert!(db.get_claim(&b.claim_id).unwrap().unwrap().is_controlling);
    }

    #[test]
    fn expiration_hands_control_to_the_runner_up_with_no_delay() {
        let db = temp_db("expiration_turnover");
        let engine = ClaimtrieEngine::new(&db);
        let mut a = claim(1, "foo", 110, 2_00000000, 0);
        a.is_controlling = true;
        a.takeover_height = Some(110);
        let b = claim(2, "foo", 120, 1_00000000, 0);
        db.put_claim(&a).unwrap();
        db.put_claim(&b).unwrap();

        let expire_height = 110 + lbry_core::constants::EXPIRATION_BLOCKS;
        let names = engine.expire_at_height(expire_height).unwrap();
        assert_eq!(names, vec!["foo".to_string()]);
        engine.process_name_at_height("foo", expire_height).unwrap();

        let a_after = db.get_claim(&a.claim_id).unwrap().unwrap();
        let b_after = db.get_claim(&b.claim_id).unwrap().unwrap();
        assert!(a_after.is_abandoned);
        assert!(!a_after.is_controlling);
        assert!(b_after.is_controlling);
        assert_eq!(b_after.takeover_height, Some(expire_height));
    }
}
