use alloy::primitives::{Address, B256, U256};
use serde_json::{json, Value};

use super::{bind, HubReceipt};
use crate::config::{ContractsConfig, NetworkConfig};
use crate::error::{ClientError, ClientResult};
use crate::ethereum::abi::{AbiResolver, AbiSource, ACCOUNT_REGISTRY_ABI, CLONE_ACCOUNT_ABI};
use crate::ethereum::client::{SubmitOptions, TransactionClient};
use crate::ethereum::contract::{as_address, as_u256, single, ContractBinding};
use crate::ethereum::units::parse_ether;
use crate::ethereum::utils;

/// Inputs that determine a clone account's CREATE2 address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneParams {
    pub implementation: Address,
    pub salt: B256,
    pub chain_id: u64,
    pub token_contract: Address,
    pub token_id: U256,
}

impl CloneParams {
    /// `salt` is either short text or 32 raw bytes in hex
    pub fn new(
        implementation: Address,
        salt: &str,
        chain_id: u64,
        token_contract: Address,
        token_id: U256,
    ) -> ClientResult<Self> {
        Ok(Self {
            implementation,
            salt: utils::parse_salt(salt)?,
            chain_id,
            token_contract,
            token_id,
        })
    }

    fn args(&self) -> [Value; 5] {
        [
            json!(self.implementation.to_string()),
            json!(format!("0x{}", hex::encode(self.salt))),
            json!(self.chain_id),
            json!(self.token_contract.to_string()),
            json!(self.token_id.to_string()),
        ]
    }
}

/// What a deployed clone account reports about the token it is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneAccountInfo {
    pub chain_id: U256,
    pub token_contract: Address,
    pub token_id: U256,
}

#[derive(Debug, Clone)]
pub struct CloneCreation {
    pub receipt: HubReceipt,
    pub predicted: Address,
    /// Address the registry reports for the parameters after the transaction
    pub actual: Option<Address>,
}

impl CloneCreation {
    pub fn matches_prediction(&self) -> bool {
        self.actual == Some(self.predicted)
    }
}

/// The clone-account registry
#[derive(Debug, Clone)]
pub struct AccountRegistry {
    binding: ContractBinding,
    clone_account: ContractBinding,
    deposit: U256,
}

impl AccountRegistry {
    /// `deposit` is attached as value to every account creation
    pub fn new(binding: ContractBinding, clone_account: ContractBinding, deposit: U256) -> Self {
        Self {
            binding,
            clone_account,
            deposit,
        }
    }

    pub async fn from_config(
        contracts: &ContractsConfig,
        network: &NetworkConfig,
        resolver: &mut AbiResolver,
    ) -> ClientResult<Self> {
        let binding = bind(
            "account registry",
            "REGISTRY_ADDRESS",
            contracts.account_registry.as_ref(),
            ACCOUNT_REGISTRY_ABI,
            resolver,
        )
        .await?;

        let clone_abi = resolver
            .get_abi(&AbiSource::Builtin(CLONE_ACCOUNT_ABI))
            .await
            .map_err(|e| ClientError::Configuration(format!("clone account ABI: {}", e)))?;
        let clone_account = ContractBinding::new("clone account", Address::ZERO, clone_abi);

        let deposit = match &network.existential_deposit {
            Some(amount) => parse_ether(amount).map_err(|e| {
                ClientError::Configuration(format!("Invalid existential_deposit: {}", e))
            })?,
            None => U256::ZERO,
        };

        Ok(Self::new(binding, clone_account, deposit))
    }

    pub fn binding(&self) -> &ContractBinding {
        &self.binding
    }

    pub fn deposit(&self) -> U256 {
        self.deposit
    }

    pub async fn predict_next_clone(&self, client: &TransactionClient) -> ClientResult<Address> {
        as_address(&single(
            client.call(&self.binding, "predictNextClone", &[]).await?,
        )?)
    }

    /// Address the registry assigns to these parameters
    pub async fn account(
        &self,
        client: &TransactionClient,
        params: &CloneParams,
    ) -> ClientResult<Address> {
        as_address(&single(
            client.call(&self.binding, "account", &params.args()).await?,
        )?)
    }

    /// Deploy a clone account and compare its address with the prediction made beforehand
    pub async fn create_account(
        &self,
        client: &TransactionClient,
        params: &CloneParams,
    ) -> ClientResult<CloneCreation> {
        let predicted = self.predict_next_clone(client).await?;
        tracing::info!("Predicted clone address: {}", predicted);

        let outcome = client
            .execute(
                &self.binding,
                "createAccount",
                &params.args(),
                SubmitOptions::with_value(self.deposit),
            )
            .await?;

        let actual = if outcome.is_confirmed() {
            Some(self.account(client, params).await?)
        } else {
            None
        };
        let receipt = HubReceipt::from_outcome(client, &self.binding, outcome, "AccountCreated");

        let creation = CloneCreation {
            receipt,
            predicted,
            actual,
        };
        if let Some(actual) = creation.actual {
            if creation.matches_prediction() {
                tracing::info!("Clone deployed at predicted address {}", actual);
            } else {
                tracing::warn!(
                    "Prediction mismatch: predicted {}, registry reports {}",
                    predicted,
                    actual
                );
            }
        }
        Ok(creation)
    }

    /// Read `token()` from a deployed clone account
    pub async fn clone_token(
        &self,
        client: &TransactionClient,
        account: Address,
    ) -> ClientResult<CloneAccountInfo> {
        let values = client.call(&self.clone_account.at(account), "token", &[]).await?;
        if values.len() != 3 {
            return Err(ClientError::Unknown(format!(
                "token() returned {} values, expected 3",
                values.len()
            )));
        }

        Ok(CloneAccountInfo {
            chain_id: as_u256(&values[0])?,
            token_contract: as_address(&values[1])?,
            token_id: as_u256(&values[2])?,
        })
    }
}
