use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use lbry_core::types::{Address, ClaimId, Ledger, TxId};

/// SHA-256 applied twice — the standard Bitcoin-family transaction digest.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// SHA-256 followed by RIPEMD-160 — used to derive P2PKH pubkey hashes.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    ripemd.into()
}

/// Transaction id: double-SHA256 of the canonical body bytes.
pub fn tx_id_for_body(body_bytes: &[u8]) -> TxId {
    TxId::from_bytes(sha256d(body_bytes))
}

/// `claim_id = reverse(sha256(sha256(txid ∥ vout)))`, truncated to 20 bytes —
/// the exact rule the upstream source uses (§4.5).
pub fn claim_id_for_output(tx_id: &TxId, vout: u32) -> ClaimId {
    let mut data = tx_id.as_bytes().to_vec();
    data.extend_from_slice(&vout.to_le_bytes());
    let mut digest = sha256d(&data);
    digest.reverse();
    let mut claim_bytes = [0u8; 20];
    claim_bytes.copy_from_slice(&digest[..20]);
    ClaimId::from_bytes(claim_bytes)
}

/// `claim_hash` input to the channel-signature digest (§4.5) — binds a
/// signature to the specific claim it was issued for.
pub fn claim_hash_for_id(claim_id: &ClaimId) -> [u8; 32] {
    sha256d(claim_id.as_bytes())
}

/// Base58Check-encoded P2PKH address for a compressed public key.
pub fn address_from_pubkey(pubkey_bytes: &[u8], ledger: Ledger) -> Address {
    address_from_pubkey_hash(&hash160(pubkey_bytes), ledger)
}

/// Base58Check-encoded P2PKH address for an already-hashed pubkey hash.
pub fn address_from_pubkey_hash(pubkey_hash: &[u8; 20], ledger: Ledger) -> Address {
    let mut payload = vec![ledger.pubkey_hash_version()];
    payload.extend_from_slice(pubkey_hash);
    Address::from_encoded(bs58::encode(payload).with_check().into_string())
}

/// Decode a Base58Check P2PKH address back into its 20-byte pubkey hash.
pub fn pubkey_hash_from_address(address: &str) -> Result<[u8; 20], lbry_core::LbryError> {
    let decoded = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| lbry_core::LbryError::InvalidExtendedKey(e.to_string()))?;
    if decoded.len() != 21 {
        return Err(lbry_core::LbryError::InvalidExtendedKey(
            "unexpected address payload length".into(),
        ));
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&decoded[1..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256d_is_not_single_sha256() {
        let single = {
            let digest = Sha256::digest(b"lbry");
            let bytes: [u8; 32] = digest.into();
            bytes
        };
        assert_ne!(sha256d(b"lbry"), single);
    }

    #[test]
    fn claim_id_for_output_is_deterministic_and_reversed() {
        let tx_id = TxId::from_bytes([9u8; 32]);
        let a = claim_id_for_output(&tx_id, 0);
        let b = claim_id_for_output(&tx_id, 0);
        let c = claim_id_for_output(&tx_id, 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn address_round_trips_through_pubkey_hash() {
        let pubkey_hash = hash160(b"some compressed pubkey bytes");
        let address = address_from_pubkey_hash(&pubkey_hash, Ledger::LbcMainnet);
        let decoded = pubkey_hash_from_address(address.as_str()).unwrap();
        assert_eq!(decoded, pubkey_hash);
    }

    #[test]
    fn mainnet_and_regtest_addresses_differ_for_the_same_hash() {
        let pubkey_hash = hash160(b"another pubkey");
        let mainnet = address_from_pubkey_hash(&pubkey_hash, Ledger::LbcMainnet);
        let regtest = address_from_pubkey_hash(&pubkey_hash, Ledger::LbcRegtest);
        assert_ne!(mainnet.as_str(), regtest.as_str());
    }
}
