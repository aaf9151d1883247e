use async_trait::async_trait;
use lbry_core::LbryError;
use serde::Deserialize;

/// A notification from the upstream node's block subscription: `{msg:
/// height}` per §6.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockNotification {
    pub height: i64,
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

/// Capabilities required of the upstream full node (§6). Not a specific
/// wire format — `JsonRpcUpstreamNode` is one implementation, tests use an
/// in-memory mock.
#[async_trait]
pub trait UpstreamNode: Send + Sync {
    async fn generate(&self, n: u32) -> Result<Vec<String>, LbryError>;
    async fn get_new_address(&self) -> Result<String, LbryError>;
    async fn get_raw_transaction(&self, txid: &str) -> Result<String, LbryError>;
    async fn claim_name(&self, name: &str, value_hex: &str, amount: f64) -> Result<String, LbryError>;
    async fn update_claim(&self, txid: &str, value_hex: &str, amount: f64) -> Result<String, LbryError>;
    async fn abandon_claim(&self, txid: &str) -> Result<String, LbryError>;
    async fn support_claim(&self, name: &str, claim_id: &str, amount: f64) -> Result<String, LbryError>;
    async fn abandon_support(&self, txid: &str) -> Result<String, LbryError>;
    async fn fund_raw_transaction(&self, hex: &str) -> Result<FundedTransaction, LbryError>;
    async fn sign_raw_transaction_with_wallet(&self, hex: &str) -> Result<SignedTransaction, LbryError>;
    async fn send_raw_transaction(&self, hex: &str) -> Result<String, LbryError>;

    /// Subscribe to new-block notifications; each arrival means the driver
    /// should re-scan the block files for anything newer than its tip.
    async fn subscribe_blocks(&self) -> Result<tokio::sync::mpsc::Receiver<BlockNotification>, LbryError>;
}

/// JSON-RPC 2.0 client for the upstream `lbrycrd`-compatible node, grounded
/// on the wallet's own raw-HTTP RPC client style (§6).
pub struct JsonRpcUpstreamNode {
    url: String,
    client: reqwest::Client,
}

impl JsonRpcUpstreamNode {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, LbryError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LbryError::UpstreamUnavailable(e.to_string()))?;

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| LbryError::UpstreamUnavailable(e.to_string()))?;

        if let Some(err) = json.get("error") {
            if !err.is_null() {
                return Err(LbryError::UpstreamUnavailable(err.to_string()));
            }
        }
        Ok(json["result"].clone())
    }

    fn expect_string(value: serde_json::Value) -> Result<String, LbryError> {
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| LbryError::UpstreamUnavailable("expected a string result".into()))
    }
}

#[async_trait]
impl UpstreamNode for JsonRpcUpstreamNode {
    async fn generate(&self, n: u32) -> Result<Vec<String>, LbryError> {
        let result = self.call("generate", serde_json::json!([n])).await?;
        serde_json::from_value(result).map_err(|e| LbryError::Serialization(e.to_string()))
    }

    async fn get_new_address(&self) -> Result<String, LbryError> {
        let result = self.call("getnewaddress", serde_json::json!([])).await?;
        Self::expect_string(result)
    }

    async fn get_raw_transaction(&self, txid: &str) -> Result<String, LbryError> {
        let result = self.call("getrawtransaction", serde_json::json!([txid])).await?;
        Self::expect_string(result)
    }

    async fn claim_name(&self, name: &str, value_hex: &str, amount: f64) -> Result<String, LbryError> {
        let result = self
            .call("claimname", serde_json::json!([name, value_hex, amount]))
            .await?;
        Self::expect_string(result)
    }

    async fn update_claim(&self, txid: &str, value_hex: &str, amount: f64) -> Result<String, LbryError> {
        let result = self
            .call("updateclaim", serde_json::json!([txid, value_hex, amount]))
            .await?;
        Self::expect_string(result)
    }

    async fn abandon_claim(&self, txid: &str) -> Result<String, LbryError> {
        let result = self.call("abandonclaim", serde_json::json!([txid])).await?;
        Self::expect_string(result)
    }

    async fn support_claim(&self, name: &str, claim_id: &str, amount: f64) -> Result<String, LbryError> {
        let result = self
            .call("supportclaim", serde_json::json!([name, claim_id, amount]))
            .await?;
        Self::expect_string(result)
    }

    async fn abandon_support(&self, txid: &str) -> Result<String, LbryError> {
        let result = self.call("abandonsupport", serde_json::json!([txid])).await?;
        Self::expect_string(result)
    }

    async fn fund_raw_transaction(&self, hex: &str) -> Result<FundedTransaction, LbryError> {
        let result = self.call("fundrawtransaction", serde_json::json!([hex])).await?;
        serde_json::from_value(result).map_err(|e| LbryError::Serialization(e.to_string()))
    }

    async fn sign_raw_transaction_with_wallet(&self, hex: &str) -> Result<SignedTransaction, LbryError> {
        let result = self
            .call("signrawtransactionwithwallet", serde_json::json!([hex]))
            .await?;
        serde_json::from_value(result).map_err(|e| LbryError::Serialization(e.to_string()))
    }

    async fn send_raw_transaction(&self, hex: &str) -> Result<String, LbryError> {
        let result = self.call("sendrawtransaction", serde_json::json!([hex])).await?;
        Self::expect_string(result)
    }

    /// Polls `getblockcount` on an interval and emits a notification each
    /// time it increases — a long-poll/ZMQ subscription would replace this
    /// in a real deployment, but every capability this trait exposes is
    /// reqwest-JSON-RPC, and this keeps the node side of that symmetric.
    async fn subscribe_blocks(&self) -> Result<tokio::sync::mpsc::Receiver<BlockNotification>, LbryError> {
        let (tx, rx) = tokio::sync::mpsc::channel(32);
        let url = self.url.clone();
        tokio::spawn(async move {
            let node = JsonRpcUpstreamNode::new(url);
            let mut last_height: Option<i64> = None;
            loop {
                let count = node.call("getblockcount", serde_json::json!([])).await.ok().and_then(|v| v.as_i64());
                if let Some(height) = count {
                    if last_height != Some(height) {
                        last_height = Some(height);
                        if tx.send(BlockNotification { height }).await.is_err() {
                            break;
                        }
                    }
                }
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
        });
        Ok(rx)
    }
}

/// In-memory stand-in for tests that never touches the network.
#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockUpstreamNode {
        pub sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UpstreamNode for MockUpstreamNode {
        async fn generate(&self, n: u32) -> Result<Vec<String>, LbryError> {
            Ok((0..n).map(|i| format!("block{i}")).collect())
        }
        async fn get_new_address(&self) -> Result<String, LbryError> {
            Ok("mock-address".into())
        }
        async fn get_raw_transaction(&self, txid: &str) -> Result<String, LbryError> {
            Ok(format!("raw-{txid}"))
        }
        async fn claim_name(&self, _name: &str, _value_hex: &str, _amount: f64) -> Result<String, LbryError> {
            Ok("mock-txid".into())
        }
        async fn update_claim(&self, txid: &str, _value_hex: &str, _amount: f64) -> Result<String, LbryError> {
            Ok(txid.to_string())
        }
        async fn abandon_claim(&self, txid: &str) -> Result<String, LbryError> {
            Ok(txid.to_string())
        }
        async fn support_claim(&self, _name: &str, _claim_id: &str, _amount: f64) -> Result<String, LbryError> {
            Ok("mock-support-txid".into())
        }
        async fn abandon_support(&self, txid: &str) -> Result<String, LbryError> {
            Ok(txid.to_string())
        }
        async fn fund_raw_transaction(&self, hex: &str) -> Result<FundedTransaction, LbryError> {
            Ok(FundedTransaction { hex: hex.to_string(), fee: 0.0, change_position: -1 })
        }
        async fn sign_raw_transaction_with_wallet(&self, hex: &str) -> Result<SignedTransaction, LbryError> {
            Ok(SignedTransaction { hex: hex.to_string(), complete: true })
        }
        async fn send_raw_transaction(&self, hex: &str) -> Result<String, LbryError> {
            self.sent.lock().unwrap().push(hex.to_string());
            Ok("mock-sent-txid".into())
        }
        async fn subscribe_blocks(&self) -> Result<tokio::sync::mpsc::Receiver<BlockNotification>, LbryError> {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(rx)
        }
    }
}
