use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::keys::ExtendedPrivateKey;

/// Digest a channel signs over: `sha256(first_input_txid_reversed ∥
/// claim_hash ∥ serialised_claim_without_signature)` — §4.5.
pub fn claim_signing_digest(
    first_input_txid_reversed: &[u8; 32],
    claim_hash: &[u8; 32],
    claim_without_signature: &[u8],
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(first_input_txid_reversed);
    hasher.update(claim_hash);
    hasher.update(claim_without_signature);
    hasher.finalize().into()
}

/// Sign a claim with a channel's deterministic or imported private key.
pub fn sign_claim(
    channel_key: &ExtendedPrivateKey,
    first_input_txid_reversed: &[u8; 32],
    claim_hash: &[u8; 32],
    claim_without_signature: &[u8],
) -> Vec<u8> {
    let digest = claim_signing_digest(first_input_txid_reversed, claim_hash, claim_without_signature);
    let secp = Secp256k1::signing_only();
    let secret_bytes = channel_key.secret_key_bytes();
    let secret_key = SecretKey::from_slice(&*secret_bytes).expect("valid secret key bytes");
    let message = Message::from_digest(digest);
    secp.sign_ecdsa(&message, &secret_key).serialize_der().to_vec()
}

/// Verify a claim's channel signature. A malformed signature or public key
/// is reported as `false`, not an error — per §7, invalid signatures are
/// absorbed into index state, not surfaced as failures.
pub fn verify_claim_signature(
    channel_public_key_bytes: &[u8],
    signature_der: &[u8],
    first_input_txid_reversed: &[u8; 32],
    claim_hash: &[u8; 32],
    claim_without_signature: &[u8],
) -> bool {
    let Ok(public_key) = PublicKey::from_slice(channel_public_key_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_der(signature_der) else {
        return false;
    };
    let digest = claim_signing_digest(first_input_txid_reversed, claim_hash, claim_without_signature);
    let message = Message::from_digest(digest);
    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&message, &signature, &public_key).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ExtendedPrivateKey;
    use lbry_core::types::Ledger;

    #[test]
    fn a_signature_verifies_against_the_signing_key_and_not_another() {
        let channel = ExtendedPrivateKey::from_seed(b"channel seed", Ledger::LbcMainnet).unwrap();
        let other = ExtendedPrivateKey::from_seed(b"a different channel", Ledger::LbcMainnet).unwrap();

        let first_input_txid_reversed = [1u8; 32];
        let claim_hash = [2u8; 32];
        let payload = b"claim body without its signature field";

        let signature = sign_claim(&channel, &first_input_txid_reversed, &claim_hash, payload);

        assert!(verify_claim_signature(
            &channel.public_key().serialize(),
            &signature,
            &first_input_txid_reversed,
            &claim_hash,
            payload,
        ));
        assert!(!verify_claim_signature(
            &other.public_key().serialize(),
            &signature,
            &first_input_txid_reversed,
            &claim_hash,
            payload,
        ));
    }

    #[test]
    fn tampering_with_the_payload_invalidates_the_signature() {
        let channel = ExtendedPrivateKey::from_seed(b"tamper test", Ledger::LbcMainnet).unwrap();
        let first_input_txid_reversed = [3u8; 32];
        let claim_hash = [4u8; 32];
        let signature = sign_claim(&channel, &first_input_txid_reversed, &claim_hash, b"original");

        assert!(!verify_claim_signature(
            &channel.public_key().serialize(),
            &signature,
            &first_input_txid_reversed,
            &claim_hash,
            b"tampered",
        ));
    }

    #[test]
    fn malformed_signature_bytes_are_rejected_not_panicked_on() {
        let channel = ExtendedPrivateKey::from_seed(b"malformed sig", Ledger::LbcMainnet).unwrap();
        assert!(!verify_claim_signature(
            &channel.public_key().serialize(),
            b"not a der signature",
            &[0u8; 32],
            &[0u8; 32],
            b"",
        ));
    }
}
