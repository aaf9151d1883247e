use anyhow::{bail, Context};
use serde::Deserialize;

/// JSON-RPC 2.0 client for the upstream `lbrycrd`-compatible node (§6).
///
/// Uses raw HTTP POST with serde_json rather than a full JSON-RPC client
/// crate, keeping the wallet binary's dependency footprint small.
pub struct LbrycrdRpcClient {
    url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
pub struct FundedTransaction {
    pub hex: String,
    pub fee: f64,
    #[serde(rename = "changepos")]
    pub change_position: i32,
}

#[derive(Debug, Deserialize)]
pub struct SignedTransaction {
    pub hex: String,
    pub complete: bool,
}

impl LbrycrdRpcClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Call a JSON-RPC method and return the `result` field.
    async fn call(&self, method: &str, params: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("connecting to upstream node at {}", self.url))?;

        let json: serde_json::Value = resp.json().await.context("parsing RPC response")?;

        if let Some(err) = json.get("error") {
            if !err.is_null() {
                bail!("RPC error: {}", err);
            }
        }

        Ok(json["result"].clone())
    }

    /// Mine `n` blocks (regtest only) — used by integration tests.
    pub async fn generate(&self, n: u32) -> anyhow::Result<Vec<String>> {
        let result = self.call("generate", serde_json::json!([n])).await?;
        serde_json::from_value(result).context("parsing generate response")
    }

    pub async fn get_block_count(&self) -> anyhow::Result<u64> {
        let result = self.call("getblockcount", serde_json::json!([])).await?;
        result.as_u64().context("expected numeric block count")
    }

    pub async fn get_best_block_hash(&self) -> anyhow::Result<String> {
        let result = self.call("getbestblockhash", serde_json::json!([])).await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .context("expected a block hash string")
    }

    pub async fn get_block_hash(&self, height: u64) -> anyhow::Result<String> {
        let result = self.call("getblockhash", serde_json::json!([height])).await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .context("expected a block hash string")
    }

    /// Fetch a full block with verbosity 2 (transactions inlined).
    pub async fn get_block(&self, hash: &str) -> anyhow::Result<serde_json::Value> {
        self.call("getblock", serde_json::json!([hash, 2])).await
    }

    pub async fn get_new_address(&self) -> anyhow::Result<String> {
        let result = self.call("getnewaddress", serde_json::json!([])).await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .context("expected an address string")
    }

    pub async fn get_raw_transaction(&self, txid: &str) -> anyhow::Result<String> {
        let result = self
            .call("getrawtransaction", serde_json::json!([txid]))
            .await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .context("expected a raw transaction hex string")
    }

    /// Build an unsigned `claimName` output and have the node fund the rest
    /// of the transaction (adds inputs and a change output).
    pub async fn fund_raw_transaction(&self, hex: &str) -> anyhow::Result<FundedTransaction> {
        let result = self
            .call("fundrawtransaction", serde_json::json!([hex]))
            .await?;
        serde_json::from_value(result).context("parsing fundrawtransaction response")
    }

    pub async fn sign_raw_transaction_with_wallet(
        &self,
        hex: &str,
    ) -> anyhow::Result<SignedTransaction> {
        let result = self
            .call("signrawtransactionwithwallet", serde_json::json!([hex]))
            .await?;
        serde_json::from_value(result).context("parsing signrawtransactionwithwallet response")
    }

    pub async fn send_raw_transaction(&self, hex: &str) -> anyhow::Result<String> {
        let result = self
            .call("sendrawtransaction", serde_json::json!([hex]))
            .await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .context("expected a transaction id string")
    }

    /// `claimname <name> <value-hex> <amount>` — low-level upstream op. The
    /// wallet builds the claim output itself (§4.4/§4.5); this is used only
    /// when delegating the whole flow to the node in integration tests.
    pub async fn claim_name(&self, name: &str, value_hex: &str, amount: f64) -> anyhow::Result<String> {
        let result = self
            .call("claimname", serde_json::json!([name, value_hex, amount]))
            .await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .context("expected a transaction id string")
    }

    pub async fn update_claim(
        &self,
        txid: &str,
        value_hex: &str,
        amount: f64,
    ) -> anyhow::Result<String> {
        let result = self
            .call("updateclaim", serde_json::json!([txid, value_hex, amount]))
            .await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .context("expected a transaction id string")
    }

    pub async fn abandon_claim(&self, txid: &str) -> anyhow::Result<String> {
        let result = self.call("abandonclaim", serde_json::json!([txid])).await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .context("expected a transaction id string")
    }

    pub async fn support_claim(
        &self,
        name: &str,
        claim_id: &str,
        amount: f64,
    ) -> anyhow::Result<String> {
        let result = self
            .call("supportclaim", serde_json::json!([name, claim_id, amount]))
            .await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .context("expected a transaction id string")
    }

    pub async fn abandon_support(&self, txid: &str) -> anyhow::Result<String> {
        let result = self
            .call("abandonsupport", serde_json::json!([txid]))
            .await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .context("expected a transaction id string")
    }
}
