use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey};
use sha2::Sha512;
use zeroize::Zeroizing;

use lbry_core::constants::{BIP32_SEED_SALT, HARDENED_BIT};
use lbry_core::types::{Address, Ledger};
use lbry_core::LbryError;

use crate::hash::{address_from_pubkey, hash160};

type HmacSha512 = Hmac<Sha512>;

static SECP: Lazy<Secp256k1<secp256k1::All>> = Lazy::new(Secp256k1::new);

/// 32 bytes of entropy mixed into every child derivation alongside the key.
pub type ChainCode = [u8; 32];

/// An extended private key: a secp256k1 scalar plus the BIP32 derivation
/// metadata (depth, parent fingerprint, child index, chain code).
///
/// Mirrors `ExtendedPrivateKey<K: PrivateKey>` from the reference BIP32
/// crates, specialised to a concrete secp256k1 key since this workspace has
/// exactly one curve to support.
#[derive(Clone)]
pub struct ExtendedPrivateKey {
    secret_key: Zeroizing<SecretKey>,
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
    chain_code: ChainCode,
    ledger: Ledger,
}

impl ExtendedPrivateKey {
    /// Derive the master key from a BIP39 seed via `HMAC-SHA512("Bitcoin
    /// seed", seed)`. The left 32 bytes are the master scalar, the right 32
    /// are the master chain code.
    pub fn from_seed(seed: &[u8], ledger: Ledger) -> Result<Self, LbryError> {
        let mut mac = HmacSha512::new_from_slice(BIP32_SEED_SALT)
            .expect("HMAC accepts keys of any length");
        mac.update(seed);
        let i = mac.finalize().into_bytes();

        let secret_key = SecretKey::from_slice(&i[..32])
            .map_err(|e| LbryError::InvalidExtendedKey(e.to_string()))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&i[32..]);

        Ok(Self {
            secret_key: Zeroizing::new(secret_key),
            depth: 0,
            parent_fingerprint: [0; 4],
            child_number: 0,
            chain_code,
            ledger,
        })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(&SECP, &self.secret_key)
    }

    pub fn to_extended_public_key(&self) -> ExtendedPublicKey {
        ExtendedPublicKey {
            public_key: self.public_key(),
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            chain_code: self.chain_code,
            ledger: self.ledger,
        }
    }

    /// Derive the child at `index`. Indices at or above `HARDENED_BIT` use
    /// hardened derivation (`0x00 ∥ parent_privkey`); below it, non-hardened
    /// derivation uses the parent's compressed public key, letting a
    /// watch-only `ExtendedPublicKey` derive the identical child address.
    ///
    /// On the astronomically unlikely event the HMAC output does not map to
    /// a valid scalar, BIP32 says to retry with `index + 1` — this returns
    /// `LbryError::InvalidChildDerivation` so the caller can do exactly that.
    pub fn derive_child(&self, index: u32) -> Result<Self, LbryError> {
        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .expect("HMAC accepts keys of any length");

        if index >= HARDENED_BIT {
            mac.update(&[0u8]);
            mac.update(&self.secret_key[..]);
        } else {
            mac.update(&self.public_key().serialize());
        }
        mac.update(&index.to_be_bytes());

        let i = mac.finalize().into_bytes();
        let tweak = Scalar::from_be_bytes(i[..32].try_into().unwrap())
            .map_err(|_| LbryError::InvalidChildDerivation)?;
        let child_secret = self
            .secret_key
            .add_tweak(&tweak)
            .map_err(|_| LbryError::InvalidChildDerivation)?;

        let mut child_chain_code = [0u8; 32];
        child_chain_code.copy_from_slice(&i[32..]);

        Ok(Self {
            secret_key: Zeroizing::new(child_secret),
            depth: self.depth.saturating_add(1),
            parent_fingerprint: fingerprint(&self.public_key()),
            child_number: index,
            chain_code: child_chain_code,
            ledger: self.ledger,
        })
    }

    /// Derive a grandchild by walking a fixed path, e.g. `child(CHANNEL).child(0)`.
    pub fn child(&self, index: u32) -> Result<Self, LbryError> {
        self.derive_child(index)
    }

    pub fn secret_key_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret_key.secret_bytes())
    }

    pub fn address(&self) -> Address {
        address_from_pubkey(&self.public_key().serialize(), self.ledger)
    }

    pub fn extended_key_string(&self) -> String {
        let version = self.ledger.extended_private_key_version();
        let payload = self.serialize_payload(version, &{
            let mut key_data = [0u8; 33];
            key_data[1..].copy_from_slice(&self.secret_key[..]);
            key_data
        });
        bs58::encode(payload).with_check().into_string()
    }

    pub fn from_extended_key_string(s: &str, ledger: Ledger) -> Result<Self, LbryError> {
        let data = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|e| LbryError::InvalidExtendedKey(e.to_string()))?;
        if data.len() != 78 || data[45] != 0 {
            return Err(LbryError::InvalidExtendedKey(
                "malformed extended private key".into(),
            ));
        }
        let secret_key = SecretKey::from_slice(&data[46..78])
            .map_err(|e| LbryError::InvalidExtendedKey(e.to_string()))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);
        Ok(Self {
            secret_key: Zeroizing::new(secret_key),
            depth: data[4],
            parent_fingerprint: data[5..9].try_into().unwrap(),
            child_number: u32::from_be_bytes(data[9..13].try_into().unwrap()),
            chain_code,
            ledger,
        })
    }

    fn serialize_payload(&self, version: [u8; 4], key_data: &[u8; 33]) -> Vec<u8> {
        let mut out = Vec::with_capacity(78);
        out.extend_from_slice(&version);
        out.push(self.depth);
        out.extend_from_slice(&self.parent_fingerprint);
        out.extend_from_slice(&self.child_number.to_be_bytes());
        out.extend_from_slice(&self.chain_code);
        out.extend_from_slice(key_data);
        out
    }
}

impl std::fmt::Debug for ExtendedPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtendedPrivateKey")
            .field("depth", &self.depth)
            .field("child_number", &self.child_number)
            .field("public_key", &hex::encode(self.public_key().serialize()))
            .finish()
    }
}

/// Extended public key — derives non-hardened children only, since that is
/// all that is possible without the private scalar.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtendedPublicKey {
    public_key: PublicKey,
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
    chain_code: ChainCode,
    ledger: Ledger,
}

impl ExtendedPublicKey {
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn address(&self) -> Address {
        address_from_pubkey(&self.public_key.serialize(), self.ledger)
    }

    /// Derive the non-hardened child at `index`. Attempting a hardened
    /// index (>= `HARDENED_BIT`) is a programmer error — callers with
    /// watch-only keys must never construct one.
    pub fn derive_child(&self, index: u32) -> Result<Self, LbryError> {
        if index >= HARDENED_BIT {
            return Err(LbryError::HardenedDerivationRequiresPrivateKey);
        }
        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .expect("HMAC accepts keys of any length");
        mac.update(&self.public_key.serialize());
        mac.update(&index.to_be_bytes());
        let i = mac.finalize().into_bytes();

        let tweak = Scalar::from_be_bytes(i[..32].try_into().unwrap())
            .map_err(|_| LbryError::InvalidChildDerivation)?;
        let child_public = self
            .public_key
            .add_exp_tweak(&SECP, &tweak)
            .map_err(|_| LbryError::InvalidChildDerivation)?;

        let mut child_chain_code = [0u8; 32];
        child_chain_code.copy_from_slice(&i[32..]);

        Ok(Self {
            public_key: child_public,
            depth: self.depth.saturating_add(1),
            parent_fingerprint: fingerprint(&self.public_key),
            child_number: index,
            chain_code: child_chain_code,
            ledger: self.ledger,
        })
    }

    pub fn child(&self, index: u32) -> Result<Self, LbryError> {
        self.derive_child(index)
    }

    pub fn extended_key_string(&self) -> String {
        let version = self.ledger.extended_public_key_version();
        let mut out = Vec::with_capacity(78);
        out.extend_from_slice(&version);
        out.push(self.depth);
        out.extend_from_slice(&self.parent_fingerprint);
        out.extend_from_slice(&self.child_number.to_be_bytes());
        out.extend_from_slice(&self.chain_code);
        out.extend_from_slice(&self.public_key.serialize());
        bs58::encode(out).with_check().into_string()
    }

    pub fn from_extended_key_string(s: &str, ledger: Ledger) -> Result<Self, LbryError> {
        let data = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|e| LbryError::InvalidExtendedKey(e.to_string()))?;
        if data.len() != 78 {
            return Err(LbryError::InvalidExtendedKey(
                "malformed extended public key".into(),
            ));
        }
        let public_key = PublicKey::from_slice(&data[45..78])
            .map_err(|e| LbryError::InvalidExtendedKey(e.to_string()))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);
        Ok(Self {
            public_key,
            depth: data[4],
            parent_fingerprint: data[5..9].try_into().unwrap(),
            child_number: u32::from_be_bytes(data[9..13].try_into().unwrap()),
            chain_code,
            ledger,
        })
    }
}

impl std::fmt::Debug for ExtendedPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtendedPublicKey")
            .field("depth", &self.depth)
            .field("child_number", &self.child_number)
            .field("chain_code", &hex::encode(self.chain_code))
            .field("public_key", &hex::encode(self.public_key.serialize()))
            .finish()
    }
}

fn fingerprint(public_key: &PublicKey) -> [u8; 4] {
    let h = hash160(&public_key.serialize());
    [h[0], h[1], h[2], h[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_hardened_child_public_key_matches_private_derivation() {
        let master = ExtendedPrivateKey::from_seed(b"correct horse battery staple", Ledger::LbcMainnet).unwrap();
        let child_priv = master.derive_child(0).unwrap();
        let child_pub = master.to_extended_public_key().derive_child(0).unwrap();
        assert_eq!(child_priv.public_key(), *child_pub.public_key());
        assert_eq!(child_priv.address(), child_pub.address());
    }

    #[test]
    fn hardened_child_cannot_be_derived_from_the_public_key() {
        let master = ExtendedPrivateKey::from_seed(b"some seed bytes", Ledger::LbcMainnet).unwrap();
        let err = master
            .to_extended_public_key()
            .derive_child(HARDENED_BIT)
            .unwrap_err();
        assert!(matches!(err, LbryError::HardenedDerivationRequiresPrivateKey));
    }

    #[test]
    fn extended_private_key_round_trips_through_its_string_form() {
        let master = ExtendedPrivateKey::from_seed(b"round trip seed", Ledger::LbcMainnet).unwrap();
        let child = master.derive_child(7).unwrap();
        let encoded = child.extended_key_string();
        let decoded = ExtendedPrivateKey::from_extended_key_string(&encoded, Ledger::LbcMainnet).unwrap();
        assert_eq!(*child.secret_key_bytes(), *decoded.secret_key_bytes());
        assert_eq!(child.chain_code, decoded.chain_code);
        assert_eq!(child.child_number, decoded.child_number);
    }

    #[test]
    fn extended_public_key_round_trips_through_its_string_form() {
        let master = ExtendedPrivateKey::from_seed(b"round trip seed 2", Ledger::LbcMainnet).unwrap();
        let xpub = master.derive_child(3).unwrap().to_extended_public_key();
        let encoded = xpub.extended_key_string();
        let decoded = ExtendedPublicKey::from_extended_key_string(&encoded, Ledger::LbcMainnet).unwrap();
        assert_eq!(xpub.public_key(), decoded.public_key());
        assert_eq!(xpub.address(), decoded.address());
    }

    #[test]
    fn deriving_from_the_same_seed_is_deterministic() {
        let a = ExtendedPrivateKey::from_seed(b"deterministic", Ledger::LbcMainnet).unwrap();
        let b = ExtendedPrivateKey::from_seed(b"deterministic", Ledger::LbcMainnet).unwrap();
        assert_eq!(*a.secret_key_bytes(), *b.secret_key_bytes());
        assert_eq!(a.chain_code, b.chain_code);
    }
}
