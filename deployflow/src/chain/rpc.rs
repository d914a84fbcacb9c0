//! Ethereum JSON-RPC chain client.
//!
//! Sends contract creations with `eth_sendTransaction`, so the node must
//! manage the deployer key (hardhat/anvil nodes, or a signing proxy).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::{abi, ChainClient, DeployRequest, SubmittedTransaction};
use crate::core::TransactionReceipt;
use crate::errors::ChainError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl JsonRpcError {
    fn into_chain_error(self) -> ChainError {
        let detail = match &self.data {
            Some(Value::String(data)) => format!("{} ({data})", self.message),
            _ => self.message.clone(),
        };
        let lower = detail.to_lowercase();

        if lower.contains("insufficient funds") {
            ChainError::InsufficientFunds(detail)
        } else if lower.contains("revert") {
            ChainError::Reverted {
                tx_hash: None,
                reason: detail,
            }
        } else {
            ChainError::Rpc {
                code: self.code,
                message: detail,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    #[serde(default)]
    contract_address: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Chain client over HTTP JSON-RPC.
#[derive(Debug)]
pub struct JsonRpcChainClient {
    http: reqwest::Client,
    url: String,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl JsonRpcChainClient {
    /// Creates a client for the node at `url`.
    pub fn new(url: impl Into<String>, poll_interval: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            url: url.into(),
            poll_interval,
            next_id: AtomicU64::new(1),
        })
    }

    /// Returns the node URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::Transport(format!("{method}: {e}")))?;

        let status = response.status();
        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Transport(format!("{method}: HTTP {status}: {e}")))?;

        if let Some(error) = body.error {
            return Err(error.into_chain_error());
        }
        Ok(body.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn submit(&self, request: &DeployRequest) -> Result<SubmittedTransaction, ChainError> {
        let data = abi::deploy_data(&request.artifact, &request.args)?;

        let result = self
            .call(
                "eth_sendTransaction",
                json!([{ "from": request.from, "data": data }]),
            )
            .await?;
        let tx_hash = result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChainError::Rpc {
                code: 0,
                message: format!("eth_sendTransaction returned {result}"),
            })?;

        debug!(
            contract = %request.artifact.contract_name,
            tx_hash = %tx_hash,
            "Deployment transaction sent"
        );

        if request.options.auto_mine {
            // The transaction is already out; a failed mine only delays it.
            if let Err(e) = self.call("evm_mine", json!([])).await {
                warn!(tx_hash = %tx_hash, error = %e, "evm_mine failed");
            }
        }

        Ok(SubmittedTransaction { tx_hash })
    }

    async fn confirm(&self, tx_hash: &str) -> Result<TransactionReceipt, ChainError> {
        loop {
            let result = self
                .call("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if result.is_null() {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let receipt: RpcReceipt = serde_json::from_value(result).map_err(|e| ChainError::Rpc {
                code: 0,
                message: format!("malformed receipt for {tx_hash}: {e}"),
            })?;
            return parse_receipt(receipt);
        }
    }
}

fn parse_receipt(receipt: RpcReceipt) -> Result<TransactionReceipt, ChainError> {
    if receipt.status.as_deref() == Some("0x0") {
        return Err(ChainError::Reverted {
            tx_hash: Some(receipt.transaction_hash),
            reason: "constructor reverted (receipt status 0x0)".to_string(),
        });
    }

    let Some(contract_address) = receipt.contract_address else {
        return Err(ChainError::Reverted {
            tx_hash: Some(receipt.transaction_hash),
            reason: "receipt has no contract address".to_string(),
        });
    };

    let block_number = receipt
        .block_number
        .as_deref()
        .and_then(|b| u64::from_str_radix(b.trim_start_matches("0x"), 16).ok());

    Ok(TransactionReceipt {
        tx_hash: receipt.transaction_hash,
        contract_address,
        block_number,
    })
}
