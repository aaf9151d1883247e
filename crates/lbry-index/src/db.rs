use std::path::Path;

use lbry_core::types::{ClaimId, TxId};
use lbry_core::{Claim, LbryError, Support};

/// Persistent claimtrie index, backed by sled (pure-Rust, no C dependencies
/// — same choice the wallet/indexer workspace makes everywhere else).
///
/// Named trees:
///   claims             — claim_id (20 bytes)              → bincode(Claim)
///   claim_by_outpoint   — tx_id(32) ∥ vout(be4)            → claim_id (20 bytes)
///   supports            — claim_id(20) ∥ tx_id(32) ∥ vout  → bincode(Support)
///   support_by_outpoint — tx_id(32) ∥ vout(be4)            → claim_id(20) ∥ tx_id(32) ∥ vout
///   name_claims         — len(be4) ∥ name ∥ claim_id(20)   → [] (membership set)
///   watched_names       — name bytes                       → [] (pending activation/takeover)
///   meta                — utf8 key                         → raw bytes
pub struct IndexDb {
    _db: sled::Db,
    claims: sled::Tree,
    claim_by_outpoint: sled::Tree,
    supports: sled::Tree,
    support_by_outpoint: sled::Tree,
    name_claims: sled::Tree,
    watched_names: sled::Tree,
    meta: sled::Tree,
}

fn outpoint_key(tx_id: &TxId, vout: u32) -> [u8; 36] {
    let mut key = [0u8; 36];
    key[..32].copy_from_slice(tx_id.as_bytes());
    key[32..].copy_from_slice(&vout.to_be_bytes());
    key
}

fn support_key(claim_id: &ClaimId, tx_id: &TxId, vout: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(56);
    key.extend_from_slice(claim_id.as_bytes());
    key.extend_from_slice(tx_id.as_bytes());
    key.extend_from_slice(&vout.to_be_bytes());
    key
}

fn name_claim_key(normalized_name: &str, claim_id: &ClaimId) -> Vec<u8> {
    let name_bytes = normalized_name.as_bytes();
    let mut key = Vec::with_capacity(4 + name_bytes.len() + 20);
    key.extend_from_slice(&(name_bytes.len() as u32).to_be_bytes());
    key.extend_from_slice(name_bytes);
    key.extend_from_slice(claim_id.as_bytes());
    key
}

fn name_prefix(normalized_name: &str) -> Vec<u8> {
    let name_bytes = normalized_name.as_bytes();
    let mut key = Vec::with_capacity(4 + name_bytes.len());
    key.extend_from_slice(&(name_bytes.len() as u32).to_be_bytes());
    key.extend_from_slice(name_bytes);
    key
}

impl IndexDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LbryError> {
        let db = sled::open(path)?;
        Ok(Self {
            claims: db.open_tree("claims")?,
            claim_by_outpoint: db.open_tree("claim_by_outpoint")?,
            supports: db.open_tree("supports")?,
            support_by_outpoint: db.open_tree("support_by_outpoint")?,
            name_claims: db.open_tree("name_claims")?,
            watched_names: db.open_tree("watched_names")?,
            meta: db.open_tree("meta")?,
            _db: db,
        })
    }

    // ── Claims ────────────────────────────────────────────────────────────────

    pub fn get_claim(&self, id: &ClaimId) -> Result<Option<Claim>, LbryError> {
        match self.claims.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert or overwrite a claim, keeping the `name_claims` and
    /// `claim_by_outpoint` secondary indices in sync. If the claim already
    /// existed at a different outpoint (an update moved it), the old
    /// outpoint mapping is removed so abandon-detection doesn't see a
    /// phantom spend.
    pub fn put_claim(&self, claim: &Claim) -> Result<(), LbryError> {
        if let Some(previous) = self.get_claim(&claim.claim_id)? {
            if previous.tx_id != claim.tx_id || previous.vout != claim.vout {
                self.claim_by_outpoint
                    .remove(outpoint_key(&previous.tx_id, previous.vout))?;
            }
        }
        let bytes = bincode::serialize(claim)?;
        self.claims.insert(claim.claim_id.as_bytes(), bytes)?;
        self.claim_by_outpoint
            .insert(outpoint_key(&claim.tx_id, claim.vout), claim.claim_id.as_bytes())?;
        self.name_claims
            .insert(name_claim_key(&claim.normalized_name, &claim.claim_id), &[])?;
        Ok(())
    }

    pub fn claim_by_outpoint(&self, tx_id: &TxId, vout: u32) -> Result<Option<Claim>, LbryError> {
        match self.claim_by_outpoint.get(outpoint_key(tx_id, vout))? {
            Some(id_bytes) => {
                let mut arr = [0u8; 20];
                arr.copy_from_slice(&id_bytes);
                self.get_claim(&ClaimId::from_bytes(arr))
            }
            None => Ok(None),
        }
    }

    /// Every claim (including abandoned ones — callers filter) currently
    /// indexed under a normalized name.
    pub fn claims_for_name(&self, normalized_name: &str) -> Result<Vec<Claim>, LbryError> {
        let mut out = Vec::new();
        for item in self.name_claims.scan_prefix(name_prefix(normalized_name)) {
            let (key, _) = item?;
            let claim_id_bytes = &key[key.len() - 20..];
            let mut arr = [0u8; 20];
            arr.copy_from_slice(claim_id_bytes);
            if let Some(claim) = self.get_claim(&ClaimId::from_bytes(arr))? {
                out.push(claim);
            }
        }
        Ok(out)
    }

    /// All claims in the index (used only by expiration sweeps — O(n), fine
    /// at this implementation's scale; a production index would maintain
    /// an expiration-height secondary tree instead).
    pub fn all_claims(&self) -> Result<Vec<Claim>, LbryError> {
        let mut out = Vec::with_capacity(self.claims.len());
        for item in self.claims.iter() {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    pub fn controlling_claim_for_name(&self, normalized_name: &str) -> Result<Option<Claim>, LbryError> {
        Ok(self
            .claims_for_name(normalized_name)?
            .into_iter()
            .find(|c| c.is_controlling))
    }

    // ── Supports ──────────────────────────────────────────────────────────────

    pub fn put_support(&self, support: &Support) -> Result<(), LbryError> {
        if let Some(previous) = self.get_support(&support.claim_id, &support.tx_id, support.vout)? {
            if previous.tx_id != support.tx_id || previous.vout != support.vout {
                self.support_by_outpoint
                    .remove(outpoint_key(&previous.tx_id, previous.vout))?;
            }
        }
        let key = support_key(&support.claim_id, &support.tx_id, support.vout);
        let bytes = bincode::serialize(support)?;
        self.supports.insert(&key, bytes)?;
        self.support_by_outpoint.insert(outpoint_key(&support.tx_id, support.vout), key)?;
        Ok(())
    }

    fn get_support(&self, claim_id: &ClaimId, tx_id: &TxId, vout: u32) -> Result<Option<Support>, LbryError> {
        match self.supports.get(support_key(claim_id, tx_id, vout))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn support_by_outpoint(&self, tx_id: &TxId, vout: u32) -> Result<Option<Support>, LbryError> {
        match self.support_by_outpoint.get(outpoint_key(tx_id, vout))? {
            Some(key) => match self.supports.get(&key)? {
                Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    pub fn supports_for_claim(&self, claim_id: &ClaimId) -> Result<Vec<Support>, LbryError> {
        let mut out = Vec::new();
        for item in self.supports.scan_prefix(claim_id.as_bytes()) {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    /// All supports in the index — used only by per-channel count aggregation
    /// (O(n), the same tradeoff `all_claims` makes).
    pub fn all_supports(&self) -> Result<Vec<Support>, LbryError> {
        let mut out = Vec::with_capacity(self.supports.len());
        for item in self.supports.iter() {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    // ── Watched names (pending activation / takeover re-check) ──────────────

    pub fn watch_name(&self, normalized_name: &str) -> Result<(), LbryError> {
        self.watched_names.insert(normalized_name.as_bytes(), &[])?;
        Ok(())
    }

    pub fn unwatch_name(&self, normalized_name: &str) -> Result<(), LbryError> {
        self.watched_names.remove(normalized_name.as_bytes())?;
        Ok(())
    }

    pub fn watched_names(&self) -> Result<Vec<String>, LbryError> {
        let mut out = Vec::new();
        for item in self.watched_names.iter() {
            let (key, _) = item?;
            out.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(out)
    }

    // ── Meta ──────────────────────────────────────────────────────────────────

    pub fn tip_height(&self) -> Result<i64, LbryError> {
        match self.meta.get("tip_height")? {
            Some(bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes);
                Ok(i64::from_be_bytes(arr))
            }
            None => Ok(-1),
        }
    }

    pub fn set_tip_height(&self, height: i64) -> Result<(), LbryError> {
        self.meta.insert("tip_height", &height.to_be_bytes())?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), LbryError> {
        self._db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbry_core::types::Ledger;

    fn temp_db(name: &str) -> IndexDb {
        let dir = std::env::temp_dir().join(format!("lbry_index_db_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        IndexDb::open(&dir).expect("open temp db")
    }

    fn sample_claim(claim_id: [u8; 20], name: &str, tx_id: [u8; 32], vout: u32) -> Claim {
        Claim {
            claim_id: ClaimId::from_bytes(claim_id),
            name: name.to_string(),
            normalized_name: name.to_lowercase(),
            amount: 100,
            height: 10,
            activation_height: 10,
            expiration_height: 10 + lbry_core::constants::EXPIRATION_BLOCKS,
            is_controlling: false,
            takeover_height: None,
            tx_id: TxId::from_bytes(tx_id),
            vout,
            tx_order: 0,
            signing_channel_id: None,
            signature_valid: false,
            claim_hash: [0u8; 32],
            first_input_txid_reversed: [0u8; 32],
            signed_payload: Vec::new(),
            signature: None,
            staked_amount: 100,
            staked_support_amount: 0,
            short_url: None,
            canonical_url: None,
            signed_claim_count: 0,
            signed_support_count: 0,
            is_abandoned: false,
        }
    }

    #[test]
    fn put_and_get_claim_round_trips() {
        let db = temp_db("put_get");
        let claim = sample_claim([1u8; 20], "foo", [2u8; 32], 0);
        db.put_claim(&claim).unwrap();
        let fetched = db.get_claim(&claim.claim_id).unwrap().unwrap();
        assert_eq!(fetched.name, "foo");
    }

    #[test]
    fn moving_a_claim_clears_the_old_outpoint_mapping() {
        let db = temp_db("move_outpoint");
        let mut claim = sample_claim([3u8; 20], "bar", [4u8; 32], 0);
        db.put_claim(&claim).unwrap();
        assert!(db.claim_by_outpoint(&claim.tx_id, 0).unwrap().is_some());

        claim.tx_id = TxId::from_bytes([5u8; 32]);
        claim.vout = 1;
        db.put_claim(&claim).unwrap();

        assert!(db
            .claim_by_outpoint(&TxId::from_bytes([4u8; 32]), 0)
            .unwrap()
            .is_none());
        assert!(db.claim_by_outpoint(&claim.tx_id, 1).unwrap().is_some());
    }

    #[test]
    fn claims_for_name_returns_all_claims_sharing_the_name() {
        let db = temp_db("claims_for_name");
        db.put_claim(&sample_claim([6u8; 20], "same", [7u8; 32], 0)).unwrap();
        db.put_claim(&sample_claim([8u8; 20], "same", [9u8; 32], 0)).unwrap();
        db.put_claim(&sample_claim([10u8; 20], "other", [11u8; 32], 0)).unwrap();

        let claims = db.claims_for_name("same").unwrap();
        assert_eq!(claims.len(), 2);
        let _ = Ledger::LbcRegtest;
    }
}
