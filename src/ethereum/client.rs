use alloy::{
    dyn_abi::DynSolValue,
    network::TransactionBuilder,
    primitives::{Address, U256},
    rpc::types::TransactionRequest,
};
use serde_json::Value;
use std::time::SystemTime;

use super::contract::ContractBinding;
use super::provider::Connection;
use super::units::format_ether;
use super::{Confirmed, DecodedEvent, Failed, PendingTransaction, TxOutcome};
use crate::error::{ClientError, ClientResult};

/// Per-submission knobs; unset gas fields are estimated or fetched from the node
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub value: Option<U256>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
    /// Refuse to submit when the balance cannot cover value plus fee
    pub check_balance: bool,
}

impl SubmitOptions {
    pub fn with_value(value: U256) -> Self {
        Self {
            value: Some(value),
            check_balance: true,
            ..Self::default()
        }
    }
}

/// Submits calls to bound contracts and reports their outcome
#[derive(Debug)]
pub struct TransactionClient {
    connection: Connection,
    defaults: SubmitOptions,
}

impl TransactionClient {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            defaults: SubmitOptions::default(),
        }
    }

    /// Gas settings applied when a submission leaves them unset
    pub fn with_gas_defaults(mut self, gas_limit: Option<u64>, gas_price: Option<u128>) -> Self {
        self.defaults.gas_limit = gas_limit;
        self.defaults.gas_price = gas_price;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Sign and broadcast a call; the result has not been mined yet
    pub async fn submit(
        &self,
        binding: &ContractBinding,
        function: &str,
        args: &[Value],
        options: SubmitOptions,
    ) -> ClientResult<PendingTransaction> {
        let from = self.connection.require_account()?;
        let backend = self.connection.backend()?;

        let calldata = binding.encode_call(function, args)?;
        let mut tx = TransactionRequest::default()
            .from(from)
            .to(binding.address())
            .input(calldata.into());
        if let Some(value) = options.value {
            tx = tx.value(value);
        }

        let gas_limit = match options.gas_limit.or(self.defaults.gas_limit) {
            Some(gas_limit) => gas_limit,
            None => backend.estimate_gas(&tx).await?,
        };
        tx = tx.with_gas_limit(gas_limit);

        let explicit_price = options.gas_price.or(self.defaults.gas_price);
        if let Some(gas_price) = explicit_price {
            tx = tx.with_gas_price(gas_price);
        }

        if options.check_balance {
            let gas_price = match explicit_price {
                Some(gas_price) => gas_price,
                None => backend.gas_price().await?,
            };
            let need = options.value.unwrap_or_default()
                + U256::from(gas_limit) * U256::from(gas_price);
            self.ensure_balance(from, need).await?;
        }

        tracing::info!(
            "Submitting {}.{} to {} from {}",
            binding.label(),
            function,
            binding.address(),
            from
        );

        let hash = backend.send_transaction(tx.clone()).await?;
        tracing::info!("Transaction sent with hash: {}", hash);

        Ok(PendingTransaction {
            hash,
            submitted_at: SystemTime::now(),
            request: Some(tx),
        })
    }

    async fn ensure_balance(&self, account: Address, need: U256) -> ClientResult<()> {
        let have = self.balance(account).await?;
        if have < need {
            return Err(ClientError::InsufficientFunds {
                have: format_ether(have),
                need: format_ether(need),
            });
        }
        Ok(())
    }

    /// Poll until the transaction is included, then classify it
    pub async fn await_confirmation(&self, pending: PendingTransaction) -> ClientResult<TxOutcome> {
        let backend = self.connection.backend()?;
        let interval = self.connection.poll_interval();

        let receipt = loop {
            if let Some(receipt) = backend.transaction_receipt(pending.hash).await? {
                break receipt;
            }
            tracing::debug!("Transaction {} not mined yet", pending.hash);
            tokio::time::sleep(interval).await;
        };

        let elapsed = pending.submitted_at.elapsed().unwrap_or_default();
        if receipt.status {
            tracing::info!(
                "Transaction {} confirmed in block {} after {:.1}s",
                pending.hash,
                receipt.block_number,
                elapsed.as_secs_f64()
            );
            return Ok(TxOutcome::Confirmed(Confirmed {
                hash: receipt.transaction_hash,
                block_number: receipt.block_number,
                gas_used: receipt.gas_used,
                logs: receipt.logs,
            }));
        }

        let reason = self.replay_revert_reason(&pending, receipt.block_number).await;
        tracing::warn!(
            "Transaction {} reverted in block {}: {}",
            pending.hash,
            receipt.block_number,
            reason
        );
        Ok(TxOutcome::Failed(Failed {
            hash: Some(pending.hash),
            reason,
        }))
    }

    /// Re-run a reverted transaction as `eth_call` against its parent state to recover the reason
    async fn replay_revert_reason(&self, pending: &PendingTransaction, block: u64) -> String {
        const NO_REASON: &str = "transaction reverted without a reason";

        let Some(request) = pending.request.clone() else {
            return NO_REASON.to_string();
        };
        let Ok(backend) = self.connection.backend() else {
            return NO_REASON.to_string();
        };

        match backend.call(&request, Some(block.saturating_sub(1))).await {
            Err(ClientError::Revert(reason)) => reason,
            Err(e) => {
                tracing::debug!("Revert replay failed: {}", e);
                NO_REASON.to_string()
            }
            Ok(_) => NO_REASON.to_string(),
        }
    }

    /// Best-effort event lookup in a confirmed receipt
    pub fn decode_event(
        &self,
        binding: &ContractBinding,
        confirmed: &Confirmed,
        event_name: &str,
    ) -> Option<DecodedEvent> {
        let event = binding.decode_event(&confirmed.logs, event_name);
        if event.is_none() {
            tracing::warn!(
                "{} event not found in transaction {}",
                event_name,
                confirmed.hash
            );
        }
        event
    }

    /// Submit and wait; a revert rejected at submission becomes `Failed` without a hash
    pub async fn execute(
        &self,
        binding: &ContractBinding,
        function: &str,
        args: &[Value],
        options: SubmitOptions,
    ) -> ClientResult<TxOutcome> {
        match self.submit(binding, function, args, options).await {
            Ok(pending) => self.await_confirmation(pending).await,
            Err(ClientError::Revert(reason)) => {
                tracing::warn!("{}.{} rejected: {}", binding.label(), function, reason);
                Ok(TxOutcome::Failed(Failed { hash: None, reason }))
            }
            Err(e) => Err(e),
        }
    }

    /// Read-only `eth_call` with decoded outputs
    pub async fn call(
        &self,
        binding: &ContractBinding,
        function: &str,
        args: &[Value],
    ) -> ClientResult<Vec<DynSolValue>> {
        let backend = self.connection.backend()?;
        let calldata = binding.encode_call(function, args)?;

        let mut tx = TransactionRequest::default()
            .to(binding.address())
            .input(calldata.into());
        if let Some(account) = self.connection.account() {
            tx = tx.from(account);
        }

        tracing::debug!("Calling {}.{}", binding.label(), function);
        let output = backend.call(&tx, None).await?;
        binding.decode_output(function, args.len(), &output)
    }

    pub async fn balance(&self, address: Address) -> ClientResult<U256> {
        self.connection.backend()?.balance(address).await
    }

    pub async fn block_number(&self) -> ClientResult<u64> {
        self.connection.backend()?.block_number().await
    }

    /// Explorer link for a transaction, if the network has one
    pub fn explorer_url(&self, outcome: &TxOutcome) -> Option<String> {
        outcome
            .hash()
            .and_then(|hash| self.connection.explorer_tx_url(&hash))
    }
}
