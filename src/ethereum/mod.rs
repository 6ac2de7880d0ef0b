pub mod abi;
pub mod client;
pub mod contract;
#[cfg(test)]
pub mod mock;
pub mod provider;
pub mod units;
pub mod utils;

use alloy::primitives::{Address, Bytes, TxHash, B256};
use alloy::rpc::types::TransactionRequest;
use serde_json::Value;
use std::time::SystemTime;

/// A log entry as it appears in a receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// The parts of a transaction receipt the client acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub status: bool,
    pub gas_used: u64,
    pub logs: Vec<LogEntry>,
}

/// A submitted transaction that has not been observed in a block yet
#[derive(Debug)]
pub struct PendingTransaction {
    pub hash: TxHash,
    pub submitted_at: SystemTime,
    /// The signed request, replayed as a call when the receipt reports failure
    pub(crate) request: Option<TransactionRequest>,
}

#[derive(Debug, Clone)]
pub struct Confirmed {
    pub hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failed {
    /// Absent when the node rejected the transaction before accepting it
    pub hash: Option<TxHash>,
    pub reason: String,
}

/// Terminal state of one submission
#[derive(Debug, Clone)]
pub enum TxOutcome {
    Confirmed(Confirmed),
    Failed(Failed),
}

impl TxOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TxOutcome::Confirmed(_))
    }

    pub fn hash(&self) -> Option<TxHash> {
        match self {
            TxOutcome::Confirmed(confirmed) => Some(confirmed.hash),
            TxOutcome::Failed(failed) => failed.hash,
        }
    }
}

/// An event decoded from receipt logs, fields in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub name: String,
    pub fields: Vec<(String, Value)>,
}

impl DecodedEvent {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Field rendered as plain text, without JSON quoting
    pub fn get_str(&self, field: &str) -> Option<String> {
        self.get(field).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}
