use std::sync::Mutex;

use rand::seq::SliceRandom;

use lbry_core::types::{Address, Ledger};
use lbry_core::LbryError;
use lbry_crypto::keys::{ExtendedPrivateKey, ExtendedPublicKey};

use lbry_core::constants::{
    DEFAULT_CHANGE_GAP, DEFAULT_MAX_USES_PER_ADDRESS, DEFAULT_RECEIVING_GAP,
    USABLE_ADDRESS_SAMPLE_LIMIT,
};

/// One allocated address and how many times it has received funds.
#[derive(Clone, Debug)]
pub struct AddressRecord {
    pub index: u32,
    pub address: Address,
    pub used_times: u32,
}

/// Interface shared by the two address manager variants (§9 — a plain
/// trait suffices, no inheritance needed).
pub trait AddressManager: Send {
    fn chain_number(&self) -> u32;

    /// Generate addresses until the look-ahead gap is satisfied again.
    /// Must only be called while holding the manager's generation lock.
    fn ensure_address_gap(&self) -> Result<Vec<Address>, LbryError>;

    fn get_or_create_usable_address(&self) -> Result<Address, LbryError>;

    fn get_max_gap(&self) -> u32;

    fn get_private_key(&self, index: u32) -> Result<ExtendedPrivateKey, LbryError>;

    fn get_public_key(&self, index: u32) -> ExtendedPublicKey;

    /// Mark an address as having received a payment — called by the sync
    /// driver (C6) when it observes a spend to one of this manager's
    /// addresses.
    fn record_use(&self, address: &Address);

    fn addresses(&self) -> Vec<AddressRecord>;
}

/// Bitcoin-style HD chain manager: a deterministic sequence of child public
/// keys indexed by `n`, each tracked with a use count.
pub struct HdChainManager {
    chain_number: u32,
    public_key: ExtendedPublicKey,
    private_key: Option<ExtendedPrivateKey>,
    gap: u32,
    maximum_uses_per_address: u32,
    records: Mutex<Vec<AddressRecord>>,
}

impl HdChainManager {
    pub fn new(
        chain_number: u32,
        public_key: ExtendedPublicKey,
        private_key: Option<ExtendedPrivateKey>,
        gap: u32,
        maximum_uses_per_address: u32,
    ) -> Self {
        Self {
            chain_number,
            public_key,
            private_key,
            gap,
            maximum_uses_per_address,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn receiving_default(
        public_key: ExtendedPublicKey,
        private_key: Option<ExtendedPrivateKey>,
    ) -> Self {
        Self::new(
            lbry_core::constants::RECEIVE,
            public_key,
            private_key,
            DEFAULT_RECEIVING_GAP,
            DEFAULT_MAX_USES_PER_ADDRESS,
        )
    }

    pub fn change_default(
        public_key: ExtendedPublicKey,
        private_key: Option<ExtendedPrivateKey>,
    ) -> Self {
        Self::new(
            lbry_core::constants::CHANGE,
            public_key,
            private_key,
            DEFAULT_CHANGE_GAP,
            DEFAULT_MAX_USES_PER_ADDRESS,
        )
    }

    fn generate_keys(&self, start: u32, end: u32) -> Result<Vec<AddressRecord>, LbryError> {
        let mut generated = Vec::new();
        for index in start..=end {
            let child = self.public_key.derive_child(index)?;
            generated.push(AddressRecord {
                index,
                address: child.address(),
                used_times: 0,
            });
        }
        Ok(generated)
    }
}

impl AddressManager for HdChainManager {
    fn chain_number(&self) -> u32 {
        self.chain_number
    }

    fn ensure_address_gap(&self) -> Result<Vec<Address>, LbryError> {
        let mut records = self.records.lock().expect("address manager mutex poisoned");

        let mut existing_gap = 0u32;
        for record in records.iter().rev() {
            if record.used_times == 0 {
                existing_gap += 1;
            } else {
                break;
            }
        }
        if existing_gap >= self.gap {
            return Ok(Vec::new());
        }

        let start = records.last().map(|r| r.index + 1).unwrap_or(0);
        let end = start + (self.gap - existing_gap) - 1;
        let new_records = self.generate_keys(start, end)?;
        let new_addresses: Vec<Address> = new_records.iter().map(|r| r.address.clone()).collect();
        records.extend(new_records);
        Ok(new_addresses)
    }

    fn get_or_create_usable_address(&self) -> Result<Address, LbryError> {
        {
            let records = self.records.lock().expect("address manager mutex poisoned");
            let usable: Vec<&AddressRecord> = records
                .iter()
                .filter(|r| r.used_times < self.maximum_uses_per_address)
                .take(USABLE_ADDRESS_SAMPLE_LIMIT)
                .collect();
            if let Some(chosen) = usable.choose(&mut rand::thread_rng()) {
                return Ok(chosen.address.clone());
            }
        }
        let new_addresses = self.ensure_address_gap()?;
        new_addresses
            .into_iter()
            .next()
            .ok_or(LbryError::LockDisciplineViolation)
    }

    fn get_max_gap(&self) -> u32 {
        let records = self.records.lock().expect("address manager mutex poisoned");
        let mut max_gap = 0u32;
        let mut current_gap = 0u32;
        for record in records.iter() {
            if record.used_times == 0 {
                current_gap += 1;
            } else {
                max_gap = max_gap.max(current_gap);
                current_gap = 0;
            }
        }
        max_gap.max(current_gap)
    }

    fn get_private_key(&self, index: u32) -> Result<ExtendedPrivateKey, LbryError> {
        let private_key = self.private_key.as_ref().ok_or(LbryError::NoPrivateKey)?;
        private_key.derive_child(index)
    }

    fn get_public_key(&self, index: u32) -> ExtendedPublicKey {
        self.public_key
            .derive_child(index)
            .expect("non-hardened public derivation cannot fail for a valid index")
    }

    fn record_use(&self, address: &Address) {
        let mut records = self.records.lock().expect("address manager mutex poisoned");
        if let Some(record) = records.iter_mut().find(|r| &r.address == address) {
            record.used_times += 1;
        }
    }

    fn addresses(&self) -> Vec<AddressRecord> {
        self.records.lock().expect("address manager mutex poisoned").clone()
    }
}

/// Degenerate manager: the same address serves both the receiving and
/// change chains. `gap` and per-index derivation are irrelevant.
pub struct SingleAddressManager {
    chain_number: u32,
    public_key: ExtendedPublicKey,
    private_key: Option<ExtendedPrivateKey>,
    record: Mutex<Option<AddressRecord>>,
}

impl SingleAddressManager {
    pub fn new(
        chain_number: u32,
        public_key: ExtendedPublicKey,
        private_key: Option<ExtendedPrivateKey>,
    ) -> Self {
        Self {
            chain_number,
            public_key,
            private_key,
            record: Mutex::new(None),
        }
    }
}

impl AddressManager for SingleAddressManager {
    fn chain_number(&self) -> u32 {
        self.chain_number
    }

    fn ensure_address_gap(&self) -> Result<Vec<Address>, LbryError> {
        let mut record = self.record.lock().expect("address manager mutex poisoned");
        if record.is_some() {
            return Ok(Vec::new());
        }
        let address = self.public_key.address();
        *record = Some(AddressRecord {
            index: 0,
            address: address.clone(),
            used_times: 0,
        });
        Ok(vec![address])
    }

    fn get_or_create_usable_address(&self) -> Result<Address, LbryError> {
        self.ensure_address_gap()?;
        Ok(self.public_key.address())
    }

    fn get_max_gap(&self) -> u32 {
        0
    }

    fn get_private_key(&self, _index: u32) -> Result<ExtendedPrivateKey, LbryError> {
        // Single-key accounts share one key regardless of index.
        self.private_key.clone().ok_or(LbryError::NoPrivateKey)
    }

    fn get_public_key(&self, _index: u32) -> ExtendedPublicKey {
        self.public_key.clone()
    }

    fn record_use(&self, address: &Address) {
        let mut record = self.record.lock().expect("address manager mutex poisoned");
        if let Some(r) = record.as_mut() {
            if &r.address == address {
                r.used_times += 1;
            }
        }
    }

    fn addresses(&self) -> Vec<AddressRecord> {
        self.record
            .lock()
            .expect("address manager mutex poisoned")
            .clone()
            .into_iter()
            .collect()
    }
}
