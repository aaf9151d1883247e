use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use lbry_core::types::{Address, Ledger};
use lbry_core::LbryError;
use lbry_crypto::keys::{ExtendedPrivateKey, ExtendedPublicKey};
use lbry_crypto::mnemonic::Mnemonic;
use lbry_crypto::{aes_decrypt, aes_encrypt, random_iv};

use crate::address_manager::{AddressManager, HdChainManager, SingleAddressManager};
use crate::channel_keys::ChannelKeyManager;

const DEFAULT_SEED_PASSPHRASE: &str = "lbryum";

/// `address_generator.name` values recognised in the wallet file (§6).
const GENERATOR_DETERMINISTIC: &str = "deterministic-chain";
const GENERATOR_SINGLE: &str = "single-address";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_gap")]
    pub gap: u32,
    #[serde(default = "default_max_uses")]
    pub maximum_uses_per_address: u32,
}

fn default_gap() -> u32 {
    lbry_core::constants::DEFAULT_RECEIVING_GAP
}
fn default_max_uses() -> u32 {
    lbry_core::constants::DEFAULT_MAX_USES_PER_ADDRESS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressGeneratorConfig {
    #[serde(default = "default_generator_name")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiving: Option<ChainConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<ChainConfig>,
}

fn default_generator_name() -> String {
    GENERATOR_DETERMINISTIC.to_string()
}

impl Default for AddressGeneratorConfig {
    fn default() -> Self {
        Self {
            name: default_generator_name(),
            receiving: None,
            change: None,
        }
    }
}

/// The on-disk wallet-file shape of a single account entry (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub ledger: Ledger,
    pub name: String,
    #[serde(default)]
    pub seed: String,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub private_key: String,
    pub public_key: String,
    #[serde(default)]
    pub address_generator: AddressGeneratorConfig,
    #[serde(default)]
    pub modified_on: i64,
    #[serde(default)]
    pub certificates: HashMap<String, String>,
}

/// A wallet account: composition of the key primitives (C1), the two
/// address managers (C2), and the channel key manager (C3).
pub struct Account {
    pub id: Address,
    pub name: String,
    pub ledger: Ledger,
    seed: String,
    private_key_string: String,
    encrypted: bool,
    private_key: Option<ExtendedPrivateKey>,
    public_key: ExtendedPublicKey,
    pub receiving: Box<dyn AddressManager>,
    pub change: Box<dyn AddressManager>,
    pub channel_keys: ChannelKeyManager,
    modified_on: i64,
    init_vectors: HashMap<String, [u8; 16]>,
    address_generator_name: String,
    receiving_gap: u32,
    receiving_max_uses: u32,
    change_gap: u32,
    change_max_uses: u32,
}

impl Account {
    /// Generate a brand-new account from fresh entropy.
    pub fn generate(ledger: Ledger, name: impl Into<String>) -> Result<Self, LbryError> {
        let mnemonic = Mnemonic::generate();
        Self::from_seed(ledger, name.into(), mnemonic.phrase(), "")
    }

    fn from_seed(
        ledger: Ledger,
        name: String,
        seed: String,
        passphrase: &str,
    ) -> Result<Self, LbryError> {
        let mnemonic = Mnemonic::parse(&seed)?;
        let seed_bytes = mnemonic.to_seed(if passphrase.is_empty() {
            DEFAULT_SEED_PASSPHRASE
        } else {
            passphrase
        });
        let private_key = ExtendedPrivateKey::from_seed(&seed_bytes, ledger)?;
        let public_key = private_key.to_extended_public_key();
        Ok(Self::new(
            ledger,
            name,
            seed,
            String::new(),
            false,
            Some(private_key),
            public_key,
            AddressGeneratorConfig::default(),
            0,
            HashMap::new(),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        ledger: Ledger,
        name: String,
        seed: String,
        private_key_string: String,
        encrypted: bool,
        private_key: Option<ExtendedPrivateKey>,
        public_key: ExtendedPublicKey,
        generator: AddressGeneratorConfig,
        modified_on: i64,
        certificates: HashMap<String, String>,
    ) -> Self {
        let id = public_key.address();

        let receiving_cfg = generator.receiving.clone().unwrap_or(ChainConfig {
            gap: lbry_core::constants::DEFAULT_RECEIVING_GAP,
            maximum_uses_per_address: lbry_core::constants::DEFAULT_MAX_USES_PER_ADDRESS,
        });
        let change_cfg = generator.change.clone().unwrap_or(ChainConfig {
            gap: lbry_core::constants::DEFAULT_CHANGE_GAP,
            maximum_uses_per_address: lbry_core::constants::DEFAULT_MAX_USES_PER_ADDRESS,
        });

        let receive_pub = public_key
            .derive_child(lbry_core::constants::RECEIVE)
            .expect("deriving the receive chain public key cannot fail");
        let receive_priv = private_key
            .as_ref()
            .map(|k| k.child(lbry_core::constants::RECEIVE))
            .transpose()
            .expect("deriving the receive chain private key cannot fail");

        let (receiving, change): (Box<dyn AddressManager>, Box<dyn AddressManager>) =
            if generator.name == GENERATOR_SINGLE {
                // Degenerate manager: one address serves both chains, so the
                // two managers share the same derived key material and
                // differ only in which chain number they report as.
                (
                    Box::new(SingleAddressManager::new(
                        lbry_core::constants::RECEIVE,
                        receive_pub.clone(),
                        receive_priv.clone(),
                    )),
                    Box::new(SingleAddressManager::new(
                        lbry_core::constants::CHANGE,
                        receive_pub,
                        receive_priv,
                    )),
                )
            } else {
                let change_pub = public_key
                    .derive_child(lbry_core::constants::CHANGE)
                    .expect("deriving the change chain public key cannot fail");
                let change_priv = private_key
                    .as_ref()
                    .map(|k| k.child(lbry_core::constants::CHANGE))
                    .transpose()
                    .expect("deriving the change chain private key cannot fail");
                (
                    Box::new(HdChainManager::new(
                        lbry_core::constants::RECEIVE,
                        receive_pub,
                        receive_priv,
                        receiving_cfg.gap,
                        receiving_cfg.maximum_uses_per_address,
                    )),
                    Box::new(HdChainManager::new(
                        lbry_core::constants::CHANGE,
                        change_pub,
                        change_priv,
                        change_cfg.gap,
                        change_cfg.maximum_uses_per_address,
                    )),
                )
            };

        let channel_root = private_key.clone();
        let mut channel_keys = ChannelKeyManager::new(channel_root.as_ref());
        for (address, pem) in &certificates {
            channel_keys.import_pem(pem, Address::from_encoded(address.clone()));
        }

        Self {
            id,
            name,
            ledger,
            seed,
            private_key_string,
            encrypted,
            private_key,
            public_key,
            receiving,
            change,
            channel_keys,
            modified_on,
            init_vectors: HashMap::new(),
            address_generator_name: generator.name,
            receiving_gap: receiving_cfg.gap,
            receiving_max_uses: receiving_cfg.maximum_uses_per_address,
            change_gap: change_cfg.gap,
            change_max_uses: change_cfg.maximum_uses_per_address,
        }
    }

    pub fn from_record(record: AccountRecord) -> Result<Self, LbryError> {
        let public_key =
            ExtendedPublicKey::from_extended_key_string(&record.public_key, record.ledger)?;

        let (private_key, seed) = if record.encrypted {
            (None, record.seed.clone())
        } else if !record.seed.is_empty() {
            let mnemonic = Mnemonic::parse(&record.seed)?;
            let seed_bytes = mnemonic.to_seed(DEFAULT_SEED_PASSPHRASE);
            (
                Some(ExtendedPrivateKey::from_seed(&seed_bytes, record.ledger)?),
                record.seed.clone(),
            )
        } else if !record.private_key.is_empty() {
            (
                Some(ExtendedPrivateKey::from_extended_key_string(
                    &record.private_key,
                    record.ledger,
                )?),
                String::new(),
            )
        } else {
            (None, String::new())
        };

        Ok(Self::new(
            record.ledger,
            record.name,
            seed,
            record.private_key,
            record.encrypted,
            private_key,
            public_key,
            record.address_generator,
            record.modified_on,
            record.certificates,
        ))
    }

    pub fn to_record(&mut self, encrypt_password: Option<&str>) -> AccountRecord {
        let mut private_key_string = self.private_key_string.clone();
        let mut seed = self.seed.clone();

        if !self.encrypted {
            if let Some(private_key) = &self.private_key {
                private_key_string = private_key.extended_key_string();
            }
            if let Some(password) = encrypt_password {
                if !private_key_string.is_empty() {
                    let iv = self.get_init_vector("private_key");
                    private_key_string = aes_encrypt(password, &private_key_string, iv);
                }
                if !seed.is_empty() {
                    let iv = self.get_init_vector("seed");
                    seed = aes_encrypt(password, &seed, iv);
                }
            }
        }

        AccountRecord {
            ledger: self.ledger,
            name: self.name.clone(),
            seed,
            encrypted: self.encrypted || encrypt_password.is_some(),
            private_key: private_key_string,
            public_key: self.public_key.extended_key_string(),
            address_generator: AddressGeneratorConfig {
                name: self.address_generator_name.clone(),
                receiving: Some(ChainConfig {
                    gap: self.receiving_gap,
                    maximum_uses_per_address: self.receiving_max_uses,
                }),
                change: Some(ChainConfig {
                    gap: self.change_gap,
                    maximum_uses_per_address: self.change_max_uses,
                }),
            },
            modified_on: self.modified_on,
            certificates: self
                .channel_keys
                .certificates()
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), v.clone()))
                .collect(),
        }
    }

    /// Fetch (generating on first use) the per-field IV that repeated saves
    /// under the same password must reuse so that `hash()` stays stable.
    fn get_init_vector(&mut self, field: &str) -> [u8; 16] {
        *self
            .init_vectors
            .entry(field.to_string())
            .or_insert_with(random_iv)
    }

    /// `plain --encrypt(pw)--> encrypted`. Atomic: either both fields move
    /// to ciphertext or neither does.
    pub fn encrypt(&mut self, password: &str) -> Result<(), LbryError> {
        if self.encrypted {
            return Err(LbryError::AlreadyEncrypted);
        }
        let mut new_seed = self.seed.clone();
        let mut new_private_key_string = self.private_key_string.clone();

        if !self.seed.is_empty() {
            let iv = self.get_init_vector("seed");
            new_seed = aes_encrypt(password, &self.seed, iv);
        }
        if let Some(private_key) = &self.private_key {
            let iv = self.get_init_vector("private_key");
            new_private_key_string = aes_encrypt(password, &private_key.extended_key_string(), iv);
        }

        self.seed = new_seed;
        self.private_key_string = new_private_key_string;
        self.private_key = None;
        self.encrypted = true;
        Ok(())
    }

    /// `encrypted --decrypt(pw)--> plain`. Validates by re-parsing the
    /// mnemonic, rejecting the rare false-positive decryption caused by an
    /// AES padding collision (§4.4). Nothing is mutated unless both the
    /// seed and private key decrypt and validate successfully.
    pub fn decrypt(&mut self, password: &str) -> Result<(), LbryError> {
        if !self.encrypted {
            return Err(LbryError::NotEncrypted);
        }

        let decrypted_seed = if self.seed.is_empty() {
            String::new()
        } else {
            let (seed, iv) = aes_decrypt(password, &self.seed)?;
            Mnemonic::parse(&seed).map_err(|_| LbryError::InvalidPassword)?;
            self.init_vectors.insert("seed".to_string(), iv);
            seed
        };

        let decrypted_private_key = if self.private_key_string.is_empty() {
            None
        } else {
            let (key_string, iv) = aes_decrypt(password, &self.private_key_string)?;
            let key = ExtendedPrivateKey::from_extended_key_string(&key_string, self.ledger)
                .map_err(|_| LbryError::InvalidPassword)?;
            self.init_vectors.insert("private_key".to_string(), iv);
            Some(key)
        };

        self.seed = decrypted_seed;
        self.private_key = decrypted_private_key;
        // Clear the stale ciphertext eagerly rather than leaving it to the
        // next save, to avoid an accidental re-use of a stale IV (§9 open
        // question resolved in DESIGN.md).
        self.private_key_string.clear();
        self.encrypted = false;
        Ok(())
    }

    /// `SHA-256(canonical_json(to_dict without channel_keys) ∥ sorted
    /// channel-key addresses)`. Two accounts have equal hashes iff
    /// observable state matches.
    pub fn hash(&mut self) -> Result<[u8; 32], LbryError> {
        if self.encrypted {
            return Err(LbryError::AlreadyEncrypted);
        }
        let mut record = self.to_record(None);
        record.certificates.clear();
        let json = serde_json::to_vec(&record).map_err(|e| LbryError::Serialization(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&json);
        let mut addresses: Vec<&str> = self
            .channel_keys
            .certificates()
            .keys()
            .map(|a| a.as_str())
            .collect();
        addresses.sort_unstable();
        for address in addresses {
            hasher.update(address.as_bytes());
        }
        Ok(hasher.finalize().into())
    }

    /// Recompute each chain's gap parameter as `max(default, observed_max_gap
    /// + 1)`. The manager objects themselves own `gap`, so this only
    /// matters for the serialized `AddressGeneratorConfig` — call before
    /// `to_record`.
    pub fn save_max_gap(&mut self) {
        let observed_receiving = self.receiving.get_max_gap();
        let new_receiving = (observed_receiving + 1).max(lbry_core::constants::DEFAULT_RECEIVING_GAP);
        if new_receiving != self.receiving_gap {
            self.receiving_gap = new_receiving;
        }

        let observed_change = self.change.get_max_gap();
        let new_change = (observed_change + 1).max(lbry_core::constants::DEFAULT_CHANGE_GAP);
        if new_change != self.change_gap {
            self.change_gap = new_change;
        }
    }

    pub fn get_private_key(&self, chain: u32, index: u32) -> Result<ExtendedPrivateKey, LbryError> {
        if self.encrypted {
            return Err(LbryError::NoPrivateKey);
        }
        if chain == lbry_core::constants::RECEIVE {
            self.receiving.get_private_key(index)
        } else {
            self.change.get_private_key(index)
        }
    }

    pub fn get_public_key(&self, chain: u32, index: u32) -> ExtendedPublicKey {
        if chain == lbry_core::constants::RECEIVE {
            self.receiving.get_public_key(index)
        } else {
            self.change.get_public_key(index)
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn public_key(&self) -> &ExtendedPublicKey {
        &self.public_key
    }

    /// The plaintext seed phrase, if this account is decrypted and was
    /// created from a mnemonic (watch-only accounts have none). Meant for
    /// one-time display right after `generate()` — callers should not hold
    /// onto the returned string longer than necessary.
    pub fn seed_phrase(&self) -> Option<&str> {
        if self.encrypted || self.seed.is_empty() {
            None
        } else {
            Some(&self.seed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_creates_a_decrypted_account_with_stable_id() {
        let account = Account::generate(Ledger::LbcRegtest, "main").unwrap();
        let id_before = account.id.clone();
        assert!(!account.is_encrypted());
        assert_eq!(id_before, account.id);
    }

    #[test]
    fn encrypt_then_decrypt_is_the_identity() {
        let mut account = Account::generate(Ledger::LbcRegtest, "main").unwrap();
        let seed_before = account.seed.clone();
        let id_before = account.id.clone();

        account.encrypt("hunter2").unwrap();
        assert!(account.is_encrypted());
        assert!(account.private_key.is_none());

        account.decrypt("hunter2").unwrap();
        assert!(!account.is_encrypted());
        assert_eq!(account.seed, seed_before);
        assert_eq!(account.id, id_before);
    }

    #[test]
    fn decrypt_with_wrong_password_fails_without_mutating_state() {
        let mut account = Account::generate(Ledger::LbcRegtest, "main").unwrap();
        account.encrypt("hunter2").unwrap();
        let encrypted_seed = account.seed.clone();

        let result = account.decrypt("wrong password");
        assert!(result.is_err());
        assert!(account.is_encrypted());
        assert_eq!(account.seed, encrypted_seed);
    }

    #[test]
    fn record_round_trips() {
        let mut account = Account::generate(Ledger::LbcRegtest, "main").unwrap();
        let record = account.to_record(None);
        let reloaded = Account::from_record(record).unwrap();
        assert_eq!(account.id, reloaded.id);
    }
}
