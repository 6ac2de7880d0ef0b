//! Scripted in-memory `RpcBackend` for unit tests

use crate::error::{ClientError, ClientResult};
use crate::ethereum::provider::RpcBackend;
use crate::ethereum::{LogEntry, TxReceipt};
use alloy::{
    dyn_abi::DynSolValue,
    json_abi::JsonAbi,
    primitives::{keccak256, Address, Bytes, TxHash, B256, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

pub const MOCK_BLOCK: u64 = 100;

#[derive(Debug, Default)]
struct MockState {
    sent: Vec<TransactionRequest>,
    calls: Vec<(TransactionRequest, Option<u64>)>,
    receipt_polls: usize,
}

#[derive(Debug)]
pub struct MockRpc {
    chain_id: u64,
    balance: U256,
    gas_price: u128,
    gas_estimate: u64,
    call_results: HashMap<Bytes, Bytes>,
    selector_results: HashMap<[u8; 4], Bytes>,
    call_errors: HashMap<[u8; 4], ClientError>,
    estimate_errors: HashMap<[u8; 4], ClientError>,
    send_error: Option<ClientError>,
    receipt_status: bool,
    receipt_logs: Vec<LogEntry>,
    pending_polls: usize,
    unreachable: bool,
    state: Mutex<MockState>,
}

fn selector(tx: &TransactionRequest) -> Option<[u8; 4]> {
    let input = tx.input.input()?;
    input.get(..4)?.try_into().ok()
}

impl MockRpc {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            balance: U256::from(10u128.pow(21)),
            gas_price: 1_000_000_000,
            gas_estimate: 100_000,
            call_results: HashMap::new(),
            selector_results: HashMap::new(),
            call_errors: HashMap::new(),
            estimate_errors: HashMap::new(),
            send_error: None,
            receipt_status: true,
            receipt_logs: Vec::new(),
            pending_polls: 0,
            unreachable: false,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_balance(mut self, balance: U256) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_gas(mut self, estimate: u64, price: u128) -> Self {
        self.gas_estimate = estimate;
        self.gas_price = price;
        self
    }

    /// Answer every `eth_call` to the function with this selector
    pub fn with_call(mut self, selector: [u8; 4], output: Bytes) -> Self {
        self.selector_results.insert(selector, output);
        self
    }

    /// Answer `eth_call` with exactly this calldata, taking precedence over selector answers
    pub fn with_call_data(mut self, calldata: Bytes, output: Bytes) -> Self {
        self.call_results.insert(calldata, output);
        self
    }

    pub fn with_call_error(mut self, selector: [u8; 4], error: ClientError) -> Self {
        self.call_errors.insert(selector, error);
        self
    }

    pub fn with_estimate_error(mut self, selector: [u8; 4], error: ClientError) -> Self {
        self.estimate_errors.insert(selector, error);
        self
    }

    pub fn with_send_error(mut self, error: ClientError) -> Self {
        self.send_error = Some(error);
        self
    }

    pub fn with_receipt(mut self, status: bool, logs: Vec<LogEntry>) -> Self {
        self.receipt_status = status;
        self.receipt_logs = logs;
        self
    }

    /// Number of receipt polls answered with "not mined yet"
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn calls(&self) -> Vec<(TransactionRequest, Option<u64>)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn receipt_polls(&self) -> usize {
        self.state.lock().unwrap().receipt_polls
    }

    fn reachable(&self) -> ClientResult<()> {
        if self.unreachable {
            return Err(ClientError::Connection(
                "error sending request: connection refused".to_string(),
            ));
        }
        Ok(())
    }

    fn hash_for(index: usize) -> TxHash {
        keccak256((index as u64).to_be_bytes())
    }
}

#[async_trait]
impl RpcBackend for MockRpc {
    async fn chain_id(&self) -> ClientResult<u64> {
        self.reachable()?;
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> ClientResult<u64> {
        self.reachable()?;
        Ok(MOCK_BLOCK)
    }

    async fn balance(&self, _address: Address) -> ClientResult<U256> {
        self.reachable()?;
        Ok(self.balance)
    }

    async fn gas_price(&self) -> ClientResult<u128> {
        self.reachable()?;
        Ok(self.gas_price)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> ClientResult<u64> {
        self.reachable()?;
        if let Some(error) = selector(tx).and_then(|s| self.estimate_errors.get(&s)) {
            return Err(error.clone());
        }
        Ok(self.gas_estimate)
    }

    async fn call(&self, tx: &TransactionRequest, block: Option<u64>) -> ClientResult<Bytes> {
        self.reachable()?;
        self.state.lock().unwrap().calls.push((tx.clone(), block));

        if let Some(output) = tx.input.input().and_then(|data| self.call_results.get(data)) {
            return Ok(output.clone());
        }
        let selector = selector(tx).unwrap_or_default();
        if let Some(error) = self.call_errors.get(&selector) {
            return Err(error.clone());
        }
        Ok(self
            .selector_results
            .get(&selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> ClientResult<TxHash> {
        self.reachable()?;
        if let Some(error) = &self.send_error {
            return Err(error.clone());
        }
        let mut state = self.state.lock().unwrap();
        state.sent.push(tx);
        Ok(Self::hash_for(state.sent.len()))
    }

    async fn transaction_receipt(&self, hash: TxHash) -> ClientResult<Option<TxReceipt>> {
        self.reachable()?;
        let mut state = self.state.lock().unwrap();
        state.receipt_polls += 1;
        if state.receipt_polls <= self.pending_polls {
            return Ok(None);
        }
        Ok(Some(TxReceipt {
            transaction_hash: hash,
            block_number: MOCK_BLOCK + 1,
            status: self.receipt_status,
            gas_used: self.gas_estimate / 2,
            logs: self.receipt_logs.clone(),
        }))
    }
}

/// ABI-encode return values the way a contract would
pub fn encode_output(values: Vec<DynSolValue>) -> Bytes {
    DynSolValue::Tuple(values).abi_encode_params().into()
}

/// Build a receipt log for `event`, indexed values become topics
pub fn event_log(
    abi: &JsonAbi,
    address: Address,
    event: &str,
    indexed: Vec<DynSolValue>,
    body: Vec<DynSolValue>,
) -> LogEntry {
    let event = &abi.event(event).expect("event in ABI")[0];
    let mut topics = vec![event.selector()];
    topics.extend(
        indexed
            .iter()
            .map(|value| value.as_word().unwrap_or(B256::ZERO)),
    );

    LogEntry {
        address,
        topics,
        data: DynSolValue::Tuple(body).abi_encode_params().into(),
    }
}

pub fn selector_of(abi: &JsonAbi, function: &str) -> [u8; 4] {
    abi.function(function).expect("function in ABI")[0]
        .selector()
        .0
}
