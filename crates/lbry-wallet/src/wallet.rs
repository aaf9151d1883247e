use std::path::Path;

use serde::{Deserialize, Serialize};

use lbry_core::types::Ledger;
use lbry_core::LbryError;

use crate::account::{Account, AccountRecord};

const WALLET_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WalletFile {
    version: u32,
    name: String,
    accounts: Vec<AccountRecord>,
    #[serde(default)]
    preferences: serde_json::Value,
}

/// A named collection of accounts sharing a wallet file (§9: the wallet is
/// a registry the rest of the system resolves through by address, not a
/// shared-ownership graph of account references).
pub struct Wallet {
    pub name: String,
    pub ledger: Ledger,
    accounts: Vec<Account>,
    preferences: serde_json::Value,
}

impl Wallet {
    pub fn new(name: impl Into<String>, ledger: Ledger) -> Self {
        Self {
            name: name.into(),
            ledger,
            accounts: Vec::new(),
            preferences: serde_json::json!({}),
        }
    }

    pub fn load(path: impl AsRef<Path>, ledger: Ledger) -> Result<Self, LbryError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| LbryError::Storage(e.to_string()))?;
        let file: WalletFile =
            serde_json::from_str(&contents).map_err(|e| LbryError::Serialization(e.to_string()))?;

        let accounts = file
            .accounts
            .into_iter()
            .map(Account::from_record)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: file.name,
            ledger,
            accounts,
            preferences: file.preferences,
        })
    }

    pub fn save(&mut self, path: impl AsRef<Path>, encrypt_password: Option<&str>) -> Result<(), LbryError> {
        let accounts = self
            .accounts
            .iter_mut()
            .map(|a| a.to_record(encrypt_password))
            .collect();

        let file = WalletFile {
            version: WALLET_FILE_VERSION,
            name: self.name.clone(),
            accounts,
            preferences: self.preferences.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| LbryError::Serialization(e.to_string()))?;
        std::fs::write(path.as_ref(), json).map_err(|e| LbryError::Storage(e.to_string()))
    }

    /// Add a freshly-generated account and return its index.
    pub fn generate_account(&mut self, name: impl Into<String>) -> Result<usize, LbryError> {
        let account = Account::generate(self.ledger, name)?;
        self.accounts.push(account);
        Ok(self.accounts.len() - 1)
    }

    pub fn add_account(&mut self, account: Account) -> usize {
        self.accounts.push(account);
        self.accounts.len() - 1
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn accounts_mut(&mut self) -> &mut [Account] {
        &mut self.accounts
    }

    pub fn default_account(&self) -> Option<&Account> {
        self.accounts.first()
    }

    pub fn default_account_mut(&mut self) -> Option<&mut Account> {
        self.accounts.first_mut()
    }

    pub fn account_by_id(&self, address: &lbry_core::types::Address) -> Option<&Account> {
        self.accounts.iter().find(|a| &a.id == address)
    }

    pub fn is_encrypted(&self) -> bool {
        self.accounts.iter().any(|a| a.is_encrypted())
    }

    pub fn encrypt(&mut self, password: &str) -> Result<(), LbryError> {
        for account in &mut self.accounts {
            if !account.is_encrypted() {
                account.encrypt(password)?;
            }
        }
        Ok(())
    }

    pub fn decrypt(&mut self, password: &str) -> Result<(), LbryError> {
        for account in &mut self.accounts {
            if account.is_encrypted() {
                account.decrypt(password)?;
            }
        }
        Ok(())
    }
}
