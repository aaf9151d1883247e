//! lbry-wallet
//!
//! CLI wallet for LBRY. Manages HD accounts and channel keys, builds claim
//! payloads, and submits them to a running `lbrycrd`-compatible node via
//! JSON-RPC.
//!
//! Usage:
//!   lbry-wallet create          --name <account> [--wallet <path>]
//!   lbry-wallet info            [--wallet <path>]
//!   lbry-wallet address         [--account <index>] [--wallet <path>]
//!   lbry-wallet encrypt         --password <pw> [--wallet <path>]
//!   lbry-wallet decrypt         --password <pw> [--wallet <path>]
//!   lbry-wallet channel-new     --label <name> [--account <index>] [--wallet <path>]
//!   lbry-wallet channel-import  --pem <path> --address <addr> [--account <index>] [--wallet <path>]
//!   lbry-wallet claim-new       --name <name> --amount <lbc> [--title <t>] [--rpc <url>]
//!   lbry-wallet claim-update    --txid <hex> --amount <lbc> [--rpc <url>]
//!   lbry-wallet claim-abandon   --txid <hex> [--rpc <url>]
//!   lbry-wallet support         --name <name> --claim-id <hex> --amount <lbc> [--rpc <url>]
//!   lbry-wallet support-abandon --txid <hex> [--rpc <url>]
//!   lbry-wallet generate        --blocks <n> [--rpc <url>]

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use lbry_core::payload::ClaimPayloadBuilder;
use lbry_core::types::{Address, Ledger};

mod account;
mod address_manager;
mod channel_keys;
mod rpc_client;
mod wallet;

use channel_keys::ClaimLookup;
use rpc_client::LbrycrdRpcClient;
use wallet::Wallet;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "lbry-wallet", version, about = "LBRY wallet — accounts, channels, claims")]
struct Args {
    /// Path to the wallet file (JSON).
    #[arg(long, global = true, default_value = "~/.lbry/wallet.json")]
    wallet: PathBuf,

    /// Ledger to operate on.
    #[arg(long, global = true, default_value = "regtest")]
    ledger: String,

    /// Upstream node RPC endpoint.
    #[arg(long, global = true, default_value = "http://127.0.0.1:9245")]
    rpc: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new wallet file with a single generated account.
    Create {
        /// Name of the initial account.
        #[arg(long, default_value = "Primary Account")]
        name: String,
    },

    /// Print a summary of the wallet's accounts.
    Info,

    /// Get (or generate) a usable receiving address for an account.
    Address {
        #[arg(long, default_value_t = 0)]
        account: usize,
    },

    /// Encrypt every unencrypted account in the wallet.
    Encrypt {
        #[arg(long)]
        password: String,
    },

    /// Decrypt every encrypted account in the wallet.
    Decrypt {
        #[arg(long)]
        password: String,
    },

    /// Derive the next unused channel signing key for an account.
    ChannelNew {
        #[arg(long, default_value_t = 0)]
        account: usize,
        /// Friendly label, recorded only in the printed output.
        #[arg(long)]
        label: Option<String>,
    },

    /// Import a legacy PEM-encoded channel private key.
    ChannelImport {
        #[arg(long, default_value_t = 0)]
        account: usize,
        /// Path to a PEM file.
        #[arg(long)]
        pem: PathBuf,
        /// Address to index the imported key under.
        #[arg(long)]
        address: String,
    },

    /// Create a new claim, submitting the whole flow to the node.
    ClaimNew {
        /// Claim name (the part before `#` in the URL).
        #[arg(long)]
        name: String,
        /// Stake amount in LBC.
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Update an existing claim by its creating transaction id.
    ClaimUpdate {
        #[arg(long)]
        txid: String,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Abandon a claim, returning its stake to the wallet.
    ClaimAbandon {
        #[arg(long)]
        txid: String,
    },

    /// Support an existing claim.
    Support {
        #[arg(long)]
        name: String,
        #[arg(long)]
        claim_id: String,
        #[arg(long)]
        amount: f64,
    },

    /// Abandon a support, returning its stake to the wallet.
    SupportAbandon {
        #[arg(long)]
        txid: String,
    },

    /// Mine blocks (regtest only) — convenience wrapper over the node's
    /// `generate` RPC, used to advance activation/expiration heights in
    /// manual testing.
    Generate {
        #[arg(long, default_value_t = 1)]
        blocks: u32,
    },
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,lbry_wallet=info")
        .init();

    let args = Args::parse();
    let wallet_path = expand_tilde(&args.wallet);
    let ledger = parse_ledger(&args.ledger)?;
    let client = LbrycrdRpcClient::new(&args.rpc);

    match args.command {
        Command::Create { name } => cmd_create(&wallet_path, ledger, &name),
        Command::Info => cmd_info(&wallet_path, ledger),
        Command::Address { account } => cmd_address(&wallet_path, ledger, account),
        Command::Encrypt { password } => cmd_encrypt(&wallet_path, ledger, &password),
        Command::Decrypt { password } => cmd_decrypt(&wallet_path, ledger, &password),
        Command::ChannelNew { account, label } => cmd_channel_new(&wallet_path, ledger, account, label),
        Command::ChannelImport { account, pem, address } => {
            cmd_channel_import(&wallet_path, ledger, account, &pem, &address)
        }

        Command::ClaimNew { name, amount, title, description } => {
            let payload = build_payload(title, description);
            let value_hex = hex::encode(payload.as_bytes());
            let tx_id = client.claim_name(&name, &value_hex, amount).await?;
            println!("Claim submitted: {}", tx_id);
            Ok(())
        }

        Command::ClaimUpdate { txid, amount, title, description } => {
            let payload = build_payload(title, description);
            let value_hex = hex::encode(payload.as_bytes());
            let tx_id = client.update_claim(&txid, &value_hex, amount).await?;
            println!("Claim updated: {}", tx_id);
            Ok(())
        }

        Command::ClaimAbandon { txid } => {
            let tx_id = client.abandon_claim(&txid).await?;
            println!("Claim abandoned: {}", tx_id);
            Ok(())
        }

        Command::Support { name, claim_id, amount } => {
            let tx_id = client.support_claim(&name, &claim_id, amount).await?;
            println!("Support submitted: {}", tx_id);
            Ok(())
        }

        Command::SupportAbandon { txid } => {
            let tx_id = client.abandon_support(&txid).await?;
            println!("Support abandoned: {}", tx_id);
            Ok(())
        }

        Command::Generate { blocks } => {
            let hashes = client.generate(blocks).await?;
            println!("Mined {} block(s):", hashes.len());
            for hash in hashes {
                println!("  {}", hash);
            }
            Ok(())
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_create(wallet_path: &PathBuf, ledger: Ledger, account_name: &str) -> anyhow::Result<()> {
    if wallet_path.exists() {
        bail!(
            "Wallet file {} already exists. Delete it first to generate a new wallet.",
            wallet_path.display()
        );
    }
    if let Some(parent) = wallet_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut wallet = Wallet::new("default_wallet", ledger);
    let index = wallet.generate_account(account_name)?;
    let mnemonic = wallet.accounts()[index]
        .seed_phrase()
        .map(|s| s.to_string())
        .context("freshly generated account has no seed phrase")?;

    wallet.save(wallet_path, None).context("saving wallet file")?;

    println!("Created wallet: {}", wallet_path.display());
    println!("Account:        {}", wallet.accounts()[index].id);
    println!();
    println!("Recovery seed (write this down, it will not be shown again):");
    println!("  {}", mnemonic);
    Ok(())
}

fn cmd_info(wallet_path: &PathBuf, ledger: Ledger) -> anyhow::Result<()> {
    let wallet = Wallet::load(wallet_path, ledger).context("loading wallet")?;
    println!("Wallet:  {}", wallet.name);
    println!("Ledger:  {}", wallet.ledger.id());
    println!("Encrypted: {}", wallet.is_encrypted());
    for (i, account) in wallet.accounts().iter().enumerate() {
        println!();
        println!("Account #{}: {}", i, account.name);
        println!("  Id:          {}", account.id);
        println!("  Channels:    {}", account.channel_keys.certificates().len());
    }
    Ok(())
}

fn cmd_address(wallet_path: &PathBuf, ledger: Ledger, account_index: usize) -> anyhow::Result<()> {
    let mut wallet = Wallet::load(wallet_path, ledger).context("loading wallet")?;
    let account = wallet
        .accounts_mut()
        .get_mut(account_index)
        .with_context(|| format!("no account at index {}", account_index))?;
    let address = account.receiving.get_or_create_usable_address()?;
    wallet.save(wallet_path, None).context("saving wallet")?;
    println!("{}", address);
    Ok(())
}

fn cmd_encrypt(wallet_path: &PathBuf, ledger: Ledger, password: &str) -> anyhow::Result<()> {
    let mut wallet = Wallet::load(wallet_path, ledger).context("loading wallet")?;
    wallet.encrypt(password)?;
    wallet.save(wallet_path, None).context("saving wallet")?;
    println!("Wallet encrypted.");
    Ok(())
}

fn cmd_decrypt(wallet_path: &PathBuf, ledger: Ledger, password: &str) -> anyhow::Result<()> {
    let mut wallet = Wallet::load(wallet_path, ledger).context("loading wallet")?;
    wallet.decrypt(password)?;
    wallet.save(wallet_path, None).context("saving wallet")?;
    println!("Wallet decrypted.");
    Ok(())
}

/// No index is available to this CLI, so every candidate key is treated as
/// unused — a wallet wired into the sync driver would inject an
/// index-backed `ClaimLookup` instead (§4.3).
struct NoClaimIndex;
impl ClaimLookup for NoClaimIndex {
    fn has_public_key_on_chain(&self, _pubkey_bytes: &[u8]) -> bool {
        false
    }
}

fn cmd_channel_new(
    wallet_path: &PathBuf,
    ledger: Ledger,
    account_index: usize,
    label: Option<String>,
) -> anyhow::Result<()> {
    let mut wallet = Wallet::load(wallet_path, ledger).context("loading wallet")?;
    let account = wallet
        .accounts_mut()
        .get_mut(account_index)
        .with_context(|| format!("no account at index {}", account_index))?;

    let lookup = NoClaimIndex;
    let key = account.channel_keys.generate_next_key(&lookup)?;
    let address = key.address();
    wallet.save(wallet_path, None).context("saving wallet")?;

    if let Some(label) = label {
        info!("generated channel key for label '{}'", label);
    }
    println!("Channel address: {}", address);
    println!("Public key:      {}", hex::encode(key.public_key().serialize()));
    Ok(())
}

fn cmd_channel_import(
    wallet_path: &PathBuf,
    ledger: Ledger,
    account_index: usize,
    pem_path: &PathBuf,
    address: &str,
) -> anyhow::Result<()> {
    let pem = std::fs::read_to_string(pem_path)
        .with_context(|| format!("reading PEM file {}", pem_path.display()))?;

    let mut wallet = Wallet::load(wallet_path, ledger).context("loading wallet")?;
    let account = wallet
        .accounts_mut()
        .get_mut(account_index)
        .with_context(|| format!("no account at index {}", account_index))?;

    if !account.channel_keys.import_pem(&pem, Address::from_encoded(address.to_string())) {
        bail!("file does not look like a PEM-encoded private key");
    }
    wallet.save(wallet_path, None).context("saving wallet")?;
    println!("Imported channel key for {}", address);
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn build_payload(title: Option<String>, description: Option<String>) -> lbry_core::payload::ClaimPayload {
    let mut builder = ClaimPayloadBuilder::new();
    if let Some(title) = &title {
        builder = builder.title(title);
    }
    if let Some(description) = &description {
        builder = builder.description(description);
    }
    builder.build()
}

fn parse_ledger(s: &str) -> anyhow::Result<Ledger> {
    match s {
        "mainnet" | "lbc_mainnet" => Ok(Ledger::LbcMainnet),
        "regtest" | "lbc_regtest" => Ok(Ledger::LbcRegtest),
        other => bail!("unknown ledger '{}' (expected 'mainnet' or 'regtest')", other),
    }
}

fn expand_tilde(path: &PathBuf) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.clone()
}
