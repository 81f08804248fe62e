//! JSON-RPC payload types and per-call options.

use std::fmt;

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use chainclient_abi::AbiValue;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Block selector for state queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockNumber {
    #[default]
    Latest,
    Pending,
    Earliest,
    Number(u64),
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Pending => f.write_str("pending"),
            Self::Earliest => f.write_str("earliest"),
            Self::Number(n) => write!(f, "0x{n:x}"),
        }
    }
}

impl Serialize for BlockNumber {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl From<u64> for BlockNumber {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl std::str::FromStr for BlockNumber {
    type Err = String;

    /// `latest`, `pending`, `earliest`, a decimal or a `0x` number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "latest" => Ok(Self::Latest),
            "pending" => Ok(Self::Pending),
            "earliest" => Ok(Self::Earliest),
            other => {
                let parsed = match other.strip_prefix("0x") {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => other.parse(),
                };
                parsed
                    .map(Self::Number)
                    .map_err(|e| format!("invalid block number {other:?}: {e}"))
            }
        }
    }
}

/// Message call object for `eth_call` and `eth_estimateGas`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
}

impl CallRequest {
    pub fn to(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            data: Some(data.into()),
            ..Default::default()
        }
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<U64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<U64>,
    #[serde(default)]
    pub removed: bool,
}

/// Confirmation record of a mined transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: B256,
    pub transaction_index: Option<U64>,
    pub block_hash: Option<B256>,
    pub block_number: Option<U64>,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub contract_address: Option<Address>,
    pub gas_used: Option<U64>,
    pub cumulative_gas_used: Option<U64>,
    /// `1` success, `0` failure; absent on pre-Byzantium chains.
    pub status: Option<U64>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status.map_or(true, |s| s == U64::from(1))
    }

    pub fn block(&self) -> Option<u64> {
        self.block_number.map(|n| n.to::<u64>())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub number: Option<U64>,
    pub hash: Option<B256>,
    pub parent_hash: B256,
    pub timestamp: U64,
    pub gas_limit: U64,
    pub gas_used: U64,
    pub miner: Option<Address>,
    /// Hashes, or full objects when requested with `full = true`.
    #[serde(default)]
    pub transactions: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: B256,
    pub nonce: U64,
    pub block_hash: Option<B256>,
    pub block_number: Option<U64>,
    pub transaction_index: Option<U64>,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub gas_price: Option<U256>,
    pub gas: U64,
    pub input: Bytes,
}

/// Output of a compiler run: one entry per contract, same index in each list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompileResult {
    #[serde(alias = "Abi")]
    pub abi: Vec<String>,
    #[serde(alias = "Bin")]
    pub bin: Vec<String>,
    #[serde(alias = "Names", alias = "Types", alias = "types")]
    pub names: Vec<String>,
}

impl CompileResult {
    pub fn is_empty(&self) -> bool {
        self.abi.is_empty() || self.bin.is_empty() || self.names.is_empty()
    }

    /// `(name, abi, bin)` triples.
    pub fn artifacts(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.names
            .iter()
            .zip(&self.abi)
            .zip(&self.bin)
            .map(|((n, a), b)| (n.as_str(), a.as_str(), b.as_str()))
    }
}

/// Per-call overrides. Unset fields fall back to the node's gas price, the
/// account's pending nonce and the operation's default gas limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    pub gas_limit: Option<u64>,
    pub gas_price: Option<U256>,
    pub nonce: Option<u64>,
    pub value: U256,
}

impl TransactionOptions {
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn with_gas_price(mut self, price: U256) -> Self {
        self.gas_price = Some(price);
        self
    }

    pub fn with_gas_limit(mut self, limit: u64) -> Self {
        self.gas_limit = Some(limit);
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Result of [`EthClient::invoke`](crate::EthClient::invoke).
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutcome {
    /// A read-only method answered through `eth_call`.
    Returned(Vec<AbiValue>),
    /// A state-changing method was submitted; the transaction hash.
    Submitted(B256),
}

impl InvokeOutcome {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Returned(values) => Value::Array(values.iter().map(AbiValue::to_json).collect()),
            Self::Submitted(hash) => Value::String(hash.to_string()),
        }
    }
}

/// One contract created on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployedContract {
    /// Qualified compiler name, when deployed from a compile result.
    pub name: Option<String>,
    pub address: Address,
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
}

/// Result of deploying every artifact of a compile run.
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub compiled: CompileResult,
    pub contracts: Vec<DeployedContract>,
}

impl Deployment {
    /// Address of the contract deployed last.
    pub fn address(&self) -> Option<Address> {
        self.contracts.last().map(|c| c.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_number_params() {
        assert_eq!(serde_json::to_value(BlockNumber::Latest).unwrap(), "latest");
        assert_eq!(serde_json::to_value(BlockNumber::Number(255)).unwrap(), "0xff");
        assert_eq!("pending".parse::<BlockNumber>().unwrap(), BlockNumber::Pending);
        assert_eq!("0x10".parse::<BlockNumber>().unwrap(), BlockNumber::Number(16));
        assert_eq!("12".parse::<BlockNumber>().unwrap(), BlockNumber::Number(12));
        assert!("soon".parse::<BlockNumber>().is_err());
    }

    #[test]
    fn call_request_skips_unset_fields() {
        let req = CallRequest::to(Address::ZERO, vec![0xde, 0xad]);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["data"], "0xdead");
        assert!(json.get("from").is_none());
        assert!(json.get("gasPrice").is_none());

        let sender = Address::repeat_byte(0x11);
        let json = serde_json::to_value(req.with_from(sender)).unwrap();
        assert_eq!(json["from"], serde_json::json!(sender));
    }

    #[test]
    fn receipt_status() {
        let raw = serde_json::json!({
            "transactionHash": format!("{}", B256::repeat_byte(1)),
            "blockNumber": "0x2a",
            "status": "0x0",
            "logs": []
        });
        let receipt: Receipt = serde_json::from_value(raw).unwrap();
        assert!(!receipt.succeeded());
        assert_eq!(receipt.block(), Some(42));
        assert!(receipt.contract_address.is_none());
    }

    #[test]
    fn compile_result_accepts_node_field_names() {
        let raw = r#"{"Abi":["[]"],"Bin":["0x00"],"Types":["Token"]}"#;
        let result: CompileResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.names, vec!["Token"]);
        assert_eq!(result.artifacts().count(), 1);
        assert!(!result.is_empty());
    }
}
