pub mod cipher;
pub mod hash;
pub mod keys;
pub mod mnemonic;
pub mod signing;

pub use cipher::{aes_decrypt, aes_encrypt, random_iv};
pub use hash::{
    address_from_pubkey, address_from_pubkey_hash, claim_id_for_output, hash160,
    pubkey_hash_from_address, sha256d, tx_id_for_body,
};
pub use keys::{ChainCode, ExtendedPrivateKey, ExtendedPublicKey};
pub use mnemonic::Mnemonic;
pub use signing::{claim_signing_digest, sign_claim, verify_claim_signature};
