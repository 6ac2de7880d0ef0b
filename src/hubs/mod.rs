//! Typed wrappers over the three deployed contracts

pub mod nft;
pub mod registry;
pub mod token;

use crate::config::ContractConfig;
use crate::error::{ClientError, ClientResult};
use crate::ethereum::abi::{AbiResolver, AbiSource};
use crate::ethereum::client::TransactionClient;
use crate::ethereum::contract::ContractBinding;
use crate::ethereum::{utils, DecodedEvent, TxOutcome};

/// Outcome of a hub transaction plus the event it was expected to emit
#[derive(Debug, Clone)]
pub struct HubReceipt {
    pub outcome: TxOutcome,
    pub event: Option<DecodedEvent>,
}

impl HubReceipt {
    pub(crate) fn from_outcome(
        client: &TransactionClient,
        binding: &ContractBinding,
        outcome: TxOutcome,
        event_name: &str,
    ) -> Self {
        let event = match &outcome {
            TxOutcome::Confirmed(confirmed) => client.decode_event(binding, confirmed, event_name),
            TxOutcome::Failed(_) => None,
        };
        Self { outcome, event }
    }
}

/// Build a binding from configuration; `env_var` names the override shown in the error
pub async fn bind(
    label: &str,
    env_var: &str,
    contract: Option<&ContractConfig>,
    builtin: &'static [&'static str],
    resolver: &mut AbiResolver,
) -> ClientResult<ContractBinding> {
    let contract = contract.ok_or_else(|| {
        ClientError::Configuration(format!(
            "No {} address configured. Set {} or add it to the config file.",
            label, env_var
        ))
    })?;

    let address = utils::validate_address(&contract.address).map_err(|e| {
        ClientError::Configuration(format!("Invalid {} address: {}", label, e))
    })?;

    let source = match &contract.abi_path {
        Some(path) => AbiSource::File(path.clone()),
        None => AbiSource::Builtin(builtin),
    };
    let abi = resolver
        .get_abi(&source)
        .await
        .map_err(|e| ClientError::Configuration(format!("{} ABI: {}", label, e)))?;

    tracing::debug!("Bound {} at {}", label, address);
    Ok(ContractBinding::new(label, address, abi))
}
