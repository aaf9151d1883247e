//! ─── LBRY Wallet/Indexer Constants ──────────────────────────────────────────
//!
//! Values mirror the upstream `lbrycrd`/`lbry-sdk` protocol so that a wallet
//! or index built against this crate interoperates with an unmodified
//! full node.

// ── Units ────────────────────────────────────────────────────────────────────

/// Smallest unit of LBC. 1 LBC = 100_000_000 dewies.
pub const DEWIES_PER_LBC: u64 = 100_000_000;

// ── Network version bytes ────────────────────────────────────────────────────

/// Mainnet P2PKH address version byte.
pub const MAINNET_PUBKEY_HASH_VERSION: u8 = 0x55;

/// Regtest P2PKH address version byte.
pub const REGTEST_PUBKEY_HASH_VERSION: u8 = 0x6f;

/// Mainnet extended-private-key ("xprv"-equivalent) 4-byte version prefix.
pub const MAINNET_EXTENDED_PRIVATE_KEY_VERSION: [u8; 4] = [0x02, 0x8a, 0xb3, 0x42];

/// Mainnet extended-public-key ("xpub"-equivalent) 4-byte version prefix.
pub const MAINNET_EXTENDED_PUBLIC_KEY_VERSION: [u8; 4] = [0x02, 0x8a, 0xb7, 0xcf];

/// Regtest extended-private-key version prefix.
pub const REGTEST_EXTENDED_PRIVATE_KEY_VERSION: [u8; 4] = [0x04, 0x35, 0x83, 0x94];

/// Regtest extended-public-key version prefix.
pub const REGTEST_EXTENDED_PUBLIC_KEY_VERSION: [u8; 4] = [0x04, 0x35, 0x87, 0xcf];

// ── BIP32 derivation ─────────────────────────────────────────────────────────

/// Index at or above which a child derivation is "hardened".
pub const HARDENED_BIT: u32 = 0x8000_0000;

/// Fixed HMAC-SHA512 salt used to derive the master extended key from a seed.
pub const BIP32_SEED_SALT: &[u8] = b"Bitcoin seed";

// ── KeyPath child indices ────────────────────────────────────────────────────

/// Receiving-chain child index under an account's root key.
pub const RECEIVE: u32 = 0;

/// Change-chain child index under an account's root key.
pub const CHANGE: u32 = 1;

/// Channel-key chain index under an account's root key.
pub const CHANNEL: u32 = 2;

// ── Address manager defaults ─────────────────────────────────────────────────

/// Default look-ahead gap for the receiving chain.
pub const DEFAULT_RECEIVING_GAP: u32 = 20;

/// Default look-ahead gap for the change chain.
pub const DEFAULT_CHANGE_GAP: u32 = 6;

/// Default number of times an address may receive funds before it is
/// skipped by `get_or_create_usable_address`.
pub const DEFAULT_MAX_USES_PER_ADDRESS: u32 = 1;

/// Cap on how many usable addresses `get_or_create_usable_address` samples from.
pub const USABLE_ADDRESS_SAMPLE_LIMIT: usize = 10;

// ── Claimtrie ─────────────────────────────────────────────────────────────────

/// Divisor applied to the gap between a claim's height and the controlling
/// claim's height when computing activation delay.
pub const ACTIVATION_DELAY_FACTOR: i64 = 32;

/// Upper bound on activation delay, in blocks.
pub const MAX_ACTIVATION_DELAY: i64 = 4032;

/// Blocks after which a claim or support expires and leaves the trie.
pub const EXPIRATION_BLOCKS: i64 = 2_102_400;

// ── Claim id ──────────────────────────────────────────────────────────────────

/// Length in bytes of a claim id (before hex-encoding).
pub const CLAIM_ID_LEN: usize = 20;

/// Length in hex characters of a claim id's canonical string form.
pub const CLAIM_ID_HEX_LEN: usize = 40;
