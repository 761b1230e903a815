//! Chain client: JSON-RPC access to an Ethereum-compatible node.
//!
//! The [`ChainClient`] trait is the seam the deployment pipeline talks
//! through; [`HttpChainClient`] is the production implementation over plain
//! HTTP JSON-RPC. No retries and no polling happen here: a rejected call is
//! surfaced immediately to the task that made it.

use std::time::Duration;

use alloy_core::primitives::{Address, Bytes, U256};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::DeployError;

/// Timeout for a single RPC request.
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Block header information from an RPC response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BlockInfo {
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    pub number: u64,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    pub timestamp: u64,
}

/// Deserialize a u64 from a hex string (with 0x prefix).
fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(serde::de::Error::custom)
}

/// The bundle of arguments needed to estimate or submit a contract-creation
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploySpec {
    /// Sending account. Absent for a bare estimate.
    pub from: Option<Address>,
    /// Contract init code: compiled bytecode followed by the ABI-encoded
    /// constructor arguments.
    pub data: Bytes,
    /// Gas limit. Absent until estimation has run.
    pub gas: Option<U256>,
    /// Gas price. Absent until resolved from the network.
    pub gas_price: Option<U256>,
}

impl DeploySpec {
    /// Build the JSON call object accepted by `eth_estimateGas` and
    /// `eth_sendTransaction`.
    pub fn to_call_object(&self) -> Value {
        let mut obj = serde_json::Map::new();
        if let Some(from) = &self.from {
            obj.insert("from".to_string(), Value::String(from.to_string()));
        }
        obj.insert("data".to_string(), Value::String(self.data.to_string()));
        if let Some(gas) = &self.gas {
            obj.insert("gas".to_string(), Value::String(to_hex_quantity(gas)));
        }
        if let Some(gas_price) = &self.gas_price {
            obj.insert(
                "gasPrice".to_string(),
                Value::String(to_hex_quantity(gas_price)),
            );
        }
        Value::Object(obj)
    }
}

/// Format a quantity as the 0x-prefixed minimal hex string the RPC expects.
fn to_hex_quantity(value: &U256) -> String {
    format!("{value:#x}")
}

/// Parse a 0x-prefixed hex quantity returned by the node.
fn parse_hex_quantity(value: &Value, what: &str) -> Result<U256, DeployError> {
    let s = value
        .as_str()
        .ok_or_else(|| DeployError::Rpc(format!("{what}: expected hex string, got {value}")))?;
    U256::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| DeployError::Rpc(format!("{what}: invalid hex quantity '{s}': {e}")))
}

/// Read-and-submit operations the deployment pipeline needs from a node.
pub trait ChainClient: Send + Sync {
    /// Fetch the latest block header.
    fn latest_block(&self) -> impl Future<Output = Result<BlockInfo, DeployError>> + Send;

    /// Resolve the node's default account (coinbase).
    fn default_account(&self) -> impl Future<Output = Result<Address, DeployError>> + Send;

    /// Query the current network gas price.
    fn gas_price(&self) -> impl Future<Output = Result<U256, DeployError>> + Send;

    /// Dry-run the deployment and return its gas cost. Fails with
    /// [`DeployError::Estimation`] when the node rejects the estimate.
    fn estimate_gas(
        &self,
        spec: &DeploySpec,
    ) -> impl Future<Output = Result<U256, DeployError>> + Send;

    /// Submit the deployment transaction and return its hash. Fails with
    /// [`DeployError::Submission`] when the node rejects it.
    fn send_transaction(
        &self,
        spec: &DeploySpec,
    ) -> impl Future<Output = Result<String, DeployError>> + Send;
}

/// Why a JSON-RPC call failed: the node answered with an error object, or the
/// call never produced a usable answer at all.
enum CallFailure {
    Node(String),
    Transport(String),
}

/// JSON-RPC chain client over HTTP.
pub struct HttpChainClient {
    client: reqwest::Client,
    url: Url,
}

impl HttpChainClient {
    pub fn new(url: &str) -> Result<Self, DeployError> {
        let url =
            Url::parse(url).map_err(|e| DeployError::Rpc(format!("invalid rpc url '{url}': {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|e| DeployError::Rpc(format!("failed to create http client: {e}")))?;
        Ok(Self { client, url })
    }

    /// Make a JSON-RPC call and return the raw `result` value.
    async fn call_raw(&self, method: &str, params: Vec<Value>) -> Result<Value, CallFailure> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .map_err(|e| CallFailure::Transport(format!("failed to send {method} request: {e}")))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| CallFailure::Transport(format!("failed to parse {method} response: {e}")))?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown rpc error");
            return Err(CallFailure::Node(message.to_string()));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| CallFailure::Transport(format!("no result in {method} response")))
    }

    /// Call and deserialize, folding node errors into [`DeployError::Rpc`].
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, DeployError> {
        let result = self.call_raw(method, params).await.map_err(|f| match f {
            CallFailure::Node(msg) | CallFailure::Transport(msg) => {
                DeployError::Rpc(format!("{method}: {msg}"))
            }
        })?;
        serde_json::from_value(result)
            .map_err(|e| DeployError::Rpc(format!("failed to deserialize {method} result: {e}")))
    }
}

impl ChainClient for HttpChainClient {
    async fn latest_block(&self) -> Result<BlockInfo, DeployError> {
        self.call(
            "eth_getBlockByNumber",
            vec![Value::String("latest".to_string()), Value::Bool(false)],
        )
        .await
    }

    async fn default_account(&self) -> Result<Address, DeployError> {
        let account: String = self.call("eth_coinbase", vec![]).await?;
        account
            .parse()
            .map_err(|e| DeployError::Rpc(format!("eth_coinbase returned invalid address: {e}")))
    }

    async fn gas_price(&self) -> Result<U256, DeployError> {
        let raw = self
            .call_raw("eth_gasPrice", vec![])
            .await
            .map_err(|f| match f {
                CallFailure::Node(msg) | CallFailure::Transport(msg) => {
                    DeployError::Rpc(format!("eth_gasPrice: {msg}"))
                }
            })?;
        parse_hex_quantity(&raw, "eth_gasPrice")
    }

    async fn estimate_gas(&self, spec: &DeploySpec) -> Result<U256, DeployError> {
        let raw = self
            .call_raw("eth_estimateGas", vec![spec.to_call_object()])
            .await
            .map_err(|f| match f {
                CallFailure::Node(msg) => DeployError::Estimation(msg),
                CallFailure::Transport(msg) => {
                    DeployError::Rpc(format!("eth_estimateGas: {msg}"))
                }
            })?;
        parse_hex_quantity(&raw, "eth_estimateGas")
    }

    async fn send_transaction(&self, spec: &DeploySpec) -> Result<String, DeployError> {
        let raw = self
            .call_raw("eth_sendTransaction", vec![spec.to_call_object()])
            .await
            .map_err(|f| match f {
                CallFailure::Node(msg) => DeployError::Submission(msg),
                CallFailure::Transport(msg) => {
                    DeployError::Rpc(format!("eth_sendTransaction: {msg}"))
                }
            })?;
        raw.as_str()
            .map(String::from)
            .ok_or_else(|| DeployError::Rpc(format!("eth_sendTransaction: expected hash, got {raw}")))
    }
}
