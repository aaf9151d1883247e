use lbry_core::LbryError;

/// Number of words in an LBRY wallet seed phrase — 128 bits of entropy plus
/// a 4-bit checksum, split into 11-bit word indices against the BIP39
/// English wordlist.
pub const WORD_COUNT: usize = 12;

/// A 12-word wallet seed phrase.
///
/// Wraps the `bip39` crate's `Mnemonic` rather than re-deriving the
/// wordlist/checksum logic by hand — the wordlist is exactly the fixed list
/// the wire format (§6) and every other LBRY wallet implementation share.
#[derive(Clone)]
pub struct Mnemonic(bip39::Mnemonic);

impl Mnemonic {
    /// Generate a fresh 12-word phrase from OS randomness.
    pub fn generate() -> Self {
        Self(
            bip39::Mnemonic::generate_in(bip39::Language::English, WORD_COUNT)
                .expect("12 is a valid BIP39 word count"),
        )
    }

    /// Parse and validate an existing phrase, checking its checksum.
    pub fn parse(phrase: &str) -> Result<Self, LbryError> {
        bip39::Mnemonic::parse_in_normalized(bip39::Language::English, phrase)
            .map(Self)
            .map_err(|e| LbryError::InvalidMnemonic(e.to_string()))
    }

    pub fn phrase(&self) -> String {
        self.0.to_string()
    }

    /// Derive the 64-byte seed via PBKDF2-HMAC-SHA512 (2048 rounds), salted
    /// with `"mnemonic" || passphrase` — standard BIP39 seed stretching.
    /// LBRY wallets that don't set an explicit passphrase use `"lbryum"`.
    pub fn to_seed(&self, passphrase: &str) -> [u8; 64] {
        self.0.to_seed(passphrase)
    }
}

impl std::fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Mnemonic(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_round_trips_through_parse() {
        let m = Mnemonic::generate();
        let parsed = Mnemonic::parse(&m.phrase()).expect("freshly generated phrase must validate");
        assert_eq!(m.phrase(), parsed.phrase());
    }

    #[test]
    fn bad_checksum_is_rejected() {
        let words = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon";
        assert!(Mnemonic::parse(words).is_err());
    }
}
