//! lbry-node
//!
//! Thin process wiring sled storage, the block sync driver and the claim
//! index together into a runnable daemon. Connects to an upstream
//! `lbrycrd`-compatible node over JSON-RPC, replays its block files into the
//! claimtrie index, and keeps the index caught up as new blocks arrive.
//!
//! Usage:
//!   lbry-node --data-dir <path> --blocks-dir <path> --rpc <url>

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use lbry_index::IndexDb;
use lbry_sync::{BlockSyncDriver, JsonRpcUpstreamNode, ProgressEvent};

#[derive(Parser, Debug)]
#[command(name = "lbry-node", version, about = "LBRY claim index daemon")]
struct Args {
    /// Directory the claimtrie index (sled) is stored in.
    #[arg(long, default_value = "~/.lbry/index")]
    data_dir: PathBuf,

    /// Directory the upstream node's `blkNNNNN.dat` block files live in.
    #[arg(long, default_value = "~/.lbry/blocks")]
    blocks_dir: PathBuf,

    /// Upstream node RPC endpoint.
    #[arg(long, default_value = "http://127.0.0.1:9245")]
    rpc: String,

    /// Run the initial file-granular sync once, then exit instead of
    /// continuing into incremental mode.
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,lbry_node=info,lbry_sync=info,lbry_index=info")
        .init();

    let args = Args::parse();
    let data_dir = expand_tilde(&args.data_dir);
    let blocks_dir = expand_tilde(&args.blocks_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    std::fs::create_dir_all(&blocks_dir)
        .with_context(|| format!("creating blocks directory {}", blocks_dir.display()))?;

    let db = Arc::new(IndexDb::open(&data_dir).context("opening claim index")?);
    let upstream = Arc::new(JsonRpcUpstreamNode::new(&args.rpc));
    let driver = BlockSyncDriver::new(blocks_dir, Arc::clone(&db), upstream);

    info!(tip = db.tip_height()?, "starting initial sync");
    let (tx, mut rx) = tokio::sync::mpsc::channel::<ProgressEvent>(256);
    let progress_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            log_progress(&event);
        }
    });
    driver.start(tx).await.context("initial sync failed")?;
    let _ = progress_task.await;

    info!(tip = db.tip_height()?, "initial sync complete");

    if args.once {
        return Ok(());
    }

    info!("entering incremental sync");
    let (tx, mut rx) = tokio::sync::mpsc::channel::<ProgressEvent>(256);
    let progress_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            log_progress(&event);
        }
    });
    driver.run_incremental(tx).await.context("incremental sync failed")?;
    let _ = progress_task.await;

    Ok(())
}

fn log_progress(event: &ProgressEvent) {
    if event.is_terminal() {
        info!(event = ?event.event, "stream complete");
    } else {
        info!(event = ?event.event, done = ?event.data.done, total = ?event.data.total, label = ?event.data.label, "progress");
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
