use crate::config::NetworkConfig;
use crate::error::{ClientError, ClientResult};
use crate::ethereum::{utils, LogEntry, TxReceipt};
use alloy::{
    eips::BlockId,
    network::{EthereumWallet, ReceiptResponse},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The JSON-RPC surface the client needs
#[async_trait]
pub trait RpcBackend: Send + Sync + fmt::Debug {
    async fn chain_id(&self) -> ClientResult<u64>;

    async fn block_number(&self) -> ClientResult<u64>;

    async fn balance(&self, address: Address) -> ClientResult<U256>;

    async fn gas_price(&self) -> ClientResult<u128>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> ClientResult<u64>;

    /// `eth_call`, at the latest block unless `block` is given
    async fn call(&self, tx: &TransactionRequest, block: Option<u64>) -> ClientResult<Bytes>;

    /// Fill, sign with the backend's wallet and broadcast
    async fn send_transaction(&self, tx: TransactionRequest) -> ClientResult<TxHash>;

    async fn transaction_receipt(&self, hash: TxHash) -> ClientResult<Option<TxReceipt>>;
}

/// Alloy HTTP provider, optionally carrying a local signing wallet
pub struct AlloyBackend {
    provider: RootProvider<Http<Client>>,
    rpc_url: String,
    wallet: Option<EthereumWallet>,
}

impl fmt::Debug for AlloyBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlloyBackend")
            .field("rpc_url", &self.rpc_url)
            .field("has_wallet", &self.wallet.is_some())
            .finish()
    }
}

impl AlloyBackend {
    pub fn new(rpc_url: &str, signer: Option<PrivateKeySigner>) -> ClientResult<Self> {
        let url = rpc_url.parse().map_err(|e| {
            ClientError::Configuration(format!("Invalid RPC URL '{}': {}", rpc_url, e))
        })?;
        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self {
            provider,
            rpc_url: rpc_url.to_string(),
            wallet: signer.map(EthereumWallet::from),
        })
    }
}

fn rpc_error(e: impl fmt::Display) -> ClientError {
    let message = e.to_string();
    tracing::debug!("RPC error details: {}", message);
    utils::classify_rpc_error(&message)
}

#[async_trait]
impl RpcBackend for AlloyBackend {
    async fn chain_id(&self) -> ClientResult<u64> {
        self.provider.get_chain_id().await.map_err(rpc_error)
    }

    async fn block_number(&self) -> ClientResult<u64> {
        self.provider.get_block_number().await.map_err(rpc_error)
    }

    async fn balance(&self, address: Address) -> ClientResult<U256> {
        self.provider.get_balance(address).await.map_err(rpc_error)
    }

    async fn gas_price(&self) -> ClientResult<u128> {
        self.provider.get_gas_price().await.map_err(rpc_error)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> ClientResult<u64> {
        self.provider.estimate_gas(tx).await.map_err(rpc_error)
    }

    async fn call(&self, tx: &TransactionRequest, block: Option<u64>) -> ClientResult<Bytes> {
        let call = self.provider.call(tx);
        let result = match block {
            Some(number) => call.block(BlockId::number(number)).await,
            None => call.await,
        };
        result.map_err(rpc_error)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> ClientResult<TxHash> {
        let wallet = self.wallet.clone().ok_or_else(|| {
            ClientError::Connection("No signer configured for this connection".to_string())
        })?;

        let url = self.rpc_url.parse().map_err(|e| {
            ClientError::Configuration(format!("Invalid RPC URL '{}': {}", self.rpc_url, e))
        })?;

        // Nonce, chain id, gas and fee fields are filled by the node-facing fillers
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(url);

        let pending_tx = provider.send_transaction(tx).await.map_err(rpc_error)?;
        Ok(*pending_tx.tx_hash())
    }

    async fn transaction_receipt(&self, hash: TxHash) -> ClientResult<Option<TxReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(rpc_error)?;

        Ok(receipt.map(|receipt| TxReceipt {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            status: receipt.status(),
            gas_used: receipt.gas_used() as u64,
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| LogEntry {
                    address: log.address(),
                    topics: log.topics().to_vec(),
                    data: log.data().data.clone(),
                })
                .collect(),
        }))
    }
}

/// An explicit, caller-owned link to one network, optionally with a signing account.
#[derive(Debug, Clone)]
pub struct Connection {
    network: String,
    rpc_url: String,
    chain_id: u64,
    explorer_url: Option<String>,
    poll_interval: Duration,
    account: Option<Address>,
    backend: Option<Arc<dyn RpcBackend>>,
}

impl Connection {
    /// Connect over HTTP and verify the endpoint serves the configured chain
    pub async fn connect(
        network: &str,
        config: &NetworkConfig,
        signer: Option<PrivateKeySigner>,
    ) -> ClientResult<Self> {
        let account = signer.as_ref().map(|signer| signer.address());
        let backend = AlloyBackend::new(&config.rpc_url, signer)?;
        let connection = Self::with_backend(network, config, account, Arc::new(backend));

        connection.verify_chain().await?;

        match account {
            Some(account) => tracing::info!(
                "Connected to {} (chain {}) as {}",
                network,
                config.chain_id,
                account
            ),
            None => tracing::info!(
                "Connected to {} (chain {}) without a signer, read-only",
                network,
                config.chain_id
            ),
        }

        Ok(connection)
    }

    /// Wrap an existing backend without touching the network
    pub fn with_backend(
        network: &str,
        config: &NetworkConfig,
        account: Option<Address>,
        backend: Arc<dyn RpcBackend>,
    ) -> Self {
        Self {
            network: network.to_string(),
            rpc_url: config.rpc_url.clone(),
            chain_id: config.chain_id,
            explorer_url: config.explorer_url.clone(),
            poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
            account,
            backend: Some(backend),
        }
    }

    /// Validates network connectivity and the reported chain id
    pub async fn verify_chain(&self) -> ClientResult<()> {
        let backend = self.backend()?;
        let remote = backend.chain_id().await.map_err(|e| match e {
            ClientError::Unknown(message) => ClientError::Connection(format!(
                "Cannot connect to network '{}' at {}: {}",
                self.network, self.rpc_url, message
            )),
            other => other,
        })?;

        if remote != self.chain_id {
            return Err(ClientError::Connection(format!(
                "Endpoint {} reports chain id {}, but network '{}' is configured with {}",
                self.rpc_url, remote, self.network, self.chain_id
            )));
        }

        Ok(())
    }

    /// Drop the backend and the account; later operations fail with a connection error
    pub fn disconnect(&mut self) {
        if self.backend.take().is_some() {
            tracing::info!("Disconnected from {}", self.network);
        }
        self.account = None;
    }

    pub fn backend(&self) -> ClientResult<&Arc<dyn RpcBackend>> {
        self.backend.as_ref().ok_or_else(|| {
            ClientError::Connection(format!("Not connected to network '{}'", self.network))
        })
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    /// The signing account, required for anything that submits a transaction
    pub fn require_account(&self) -> ClientResult<Address> {
        self.backend()?;
        self.account.ok_or_else(|| {
            ClientError::Connection(
                "No signer available: set a private key to submit transactions".to_string(),
            )
        })
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Block explorer link for a transaction, when the network has an explorer
    pub fn explorer_tx_url(&self, hash: &TxHash) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/tx/{}", base.trim_end_matches('/'), hash))
    }
}
