use lbry_core::{Claim, LbryError};
use tracing::debug;

use crate::db::IndexDb;

/// Recompute `short_url` for every non-abandoned claim on `normalized_name`,
/// then `canonical_url` for each — §4.7's URL assignment rules.
///
/// Short URLs are assigned earliest-height-first: once a claim has a prefix
/// it keeps it (earlier-block claims "already occupy shorter prefixes" and
/// never get displaced), later claims extend their prefix only as far as
/// needed to stay distinct from what came before and from same-block peers.
pub fn assign_urls_for_name(db: &IndexDb, normalized_name: &str) -> Result<(), LbryError> {
    let mut claims: Vec<Claim> = db
        .claims_for_name(normalized_name)?
        .into_iter()
        .filter(|c| !c.is_abandoned)
        .collect();
    if claims.is_empty() {
        return Ok(());
    }
    claims.sort_by(|a, b| a.height.cmp(&b.height).then(a.tx_order.cmp(&b.tx_order)));

    let mut cohort_start = 0;
    while cohort_start < claims.len() {
        let cohort_height = claims[cohort_start].height;
        let mut cohort_end = cohort_start + 1;
        while cohort_end < claims.len() && claims[cohort_end].height == cohort_height {
            cohort_end += 1;
        }

        // Every claim confirmed at an earlier height than this cohort —
        // a candidate prefix must not be a prefix of any of their full
        // claim ids, or `resolve()`'s `starts_with` match would become
        // ambiguous between this cohort and one already confirmed (§4.7b).
        let earlier_claim_ids: Vec<String> =
            claims[..cohort_start].iter().map(|c| c.claim_id.to_hex()).collect();

        let cohort = &mut claims[cohort_start..cohort_end];

        let mut len = 1usize;
        loop {
            let prefixes: Vec<String> = cohort.iter().map(|c| c.claim_id.hex_prefix(len)).collect();
            let cohort_is_distinct = {
                let mut sorted = prefixes.clone();
                sorted.sort();
                sorted.windows(2).all(|w| w[0] != w[1])
            };
            let collides_with_earlier = prefixes
                .iter()
                .any(|p| earlier_claim_ids.iter().any(|full| full.starts_with(p.as_str())));
            if cohort_is_distinct && !collides_with_earlier {
                break;
            }
            if len >= lbry_core::constants::CLAIM_ID_HEX_LEN {
                break;
            }
            len += 1;
        }

        for claim in cohort.iter_mut() {
            let prefix = claim.claim_id.hex_prefix(len);
            claim.short_url = Some(format!("{}#{}", claim.normalized_name, prefix));
        }
        cohort_start = cohort_end;
    }

    for claim in &claims {
        db.put_claim(claim)?;
    }

    for claim in &mut claims {
        claim.canonical_url = canonical_url_for(db, claim)?;
    }
    for claim in &claims {
        db.put_claim(claim)?;
    }

    Ok(())
}

/// `@channel#prefix/name#prefix`, only when the claim's signature validates
/// and the signing channel itself already has a short URL assigned.
fn canonical_url_for(db: &IndexDb, claim: &Claim) -> Result<Option<String>, LbryError> {
    if !claim.signature_valid {
        return Ok(None);
    }
    let Some(channel_id) = claim.signing_channel_id else {
        return Ok(None);
    };
    let Some(channel) = db.get_claim(&channel_id)? else {
        return Ok(None);
    };
    let Some(channel_short_url) = channel.short_url else {
        return Ok(None);
    };
    let Some(claim_short_url) = &claim.short_url else {
        return Ok(None);
    };
    debug!(claim_id = %claim.claim_id, channel_id = %channel_id, "canonical url assigned");
    Ok(Some(format!("{}/{}", channel_short_url, claim_short_url)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbry_core::types::TxId;
    use lbry_core::ClaimId;

    fn temp_db(name: &str) -> IndexDb {
        let dir = std::env::temp_dir().join(format!("lbry_url_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        IndexDb::open(&dir).expect("open temp db")
    }

    fn claim(id: u8, name: &str, height: i64, tx_order: u32) -> Claim {
        Claim {
            claim_id: ClaimId::from_bytes([id; 20]),
            name: name.to_string(),
            normalized_name: name.to_string(),
            amount: 100,
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
    fn a_single_claim_gets_a_one_character_prefix() {
        let db = temp_db("single");
        db.put_claim(&claim(0xab, "foo", 10, 0)).unwrap();
        assign_urls_for_name(&db, "foo").unwrap();
        let stored = db.get_claim(&ClaimId::from_bytes([0xab; 20])).unwrap().unwrap();
        assert_eq!(stored.short_url.as_deref(), Some("foo#a"));
    }

    #[test]
    fn same_block_claims_extend_to_the_minimum_disambiguating_length() {
        let db = temp_db("same_block");
        db.put_claim(&claim(0xa1, "foo", 10, 0)).unwrap();
        db.put_claim(&claim(0xa2, "foo", 10, 1)).unwrap();
        assign_urls_for_name(&db, "foo").unwrap();

        let a = db.get_claim(&ClaimId::from_bytes([0xa1; 20])).unwrap().unwrap();
        let b = db.get_claim(&ClaimId::from_bytes([0xa2; 20])).unwrap().unwrap();
        assert_eq!(a.short_url.as_deref(), Some("foo#a1"));
        assert_eq!(b.short_url.as_deref(), Some("foo#a2"));
    }

    #[test]
    fn an_earlier_claim_keeps_its_short_prefix_when_a_later_one_extends() {
        let db = temp_db("earlier_keeps");
        db.put_claim(&claim(0xa1, "foo", 10, 0)).unwrap();
        assign_urls_for_name(&db, "foo").unwrap();
        db.put_claim(&claim(0xa2, "foo", 20, 0)).unwrap();
        assign_urls_for_name(&db, "foo").unwrap();

        let a = db.get_claim(&ClaimId::from_bytes([0xa1; 20])).unwrap().unwrap();
        let b = db.get_claim(&ClaimId::from_bytes([0xa2; 20])).unwrap().unwrap();
        assert_eq!(a.short_url.as_deref(), Some("foo#a"));
        assert_eq!(b.short_url.as_deref(), Some("foo#a2"));
    }

    /// A later claim must not be assigned a prefix of an earlier claim's
    /// full claim id just because that prefix doesn't match either earlier
    /// claim's own (longer) *assigned* prefix — it has to be checked against
    /// their full ids, or `resolve()` can no longer tell the three apart.
    #[test]
    fn a_later_claim_cannot_reuse_a_prefix_of_an_earlier_full_claim_id() {
        let db = temp_db("no_collision_with_earlier_full_id");
        db.put_claim(&claim(0xa1, "foo", 10, 0)).unwrap();
        db.put_claim(&claim(0xa2, "foo", 10, 1)).unwrap();
        assign_urls_for_name(&db, "foo").unwrap();

        db.put_claim(&claim(0xa3, "foo", 20, 0)).unwrap();
        assign_urls_for_name(&db, "foo").unwrap();

        let c = db.get_claim(&ClaimId::from_bytes([0xa3; 20])).unwrap().unwrap();
        assert_eq!(c.short_url.as_deref(), Some("foo#a3"));
    }
}
