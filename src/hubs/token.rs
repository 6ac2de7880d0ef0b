use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, U256},
};
use serde_json::{json, Value};

use super::{bind, HubReceipt};
use crate::config::ContractsConfig;
use crate::error::{ClientError, ClientResult};
use crate::ethereum::abi::{AbiResolver, TOKEN_HUB_ABI};
use crate::ethereum::client::{SubmitOptions, TransactionClient};
use crate::ethereum::contract::{as_address, as_array, as_string, as_tuple, as_u256, single, ContractBinding};
use crate::ethereum::units::{format_units, parse_units};

/// One fungible token registered in the hub; supplies are in base units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub id: U256,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
    pub max_supply: U256,
    pub creator: Address,
}

impl TokenInfo {
    fn from_value(id: U256, value: &DynSolValue) -> ClientResult<Self> {
        let fields = as_tuple(value)?;
        if fields.len() < 6 {
            return Err(ClientError::Unknown(format!(
                "Token record has {} fields, expected 6",
                fields.len()
            )));
        }

        let decimals = as_u256(&fields[2])?;
        if decimals > U256::from(u8::MAX) {
            return Err(ClientError::Unknown(format!(
                "Token {} reports {} decimals",
                id, decimals
            )));
        }

        Ok(Self {
            id,
            name: as_string(&fields[0])?,
            symbol: as_string(&fields[1])?,
            decimals: decimals.saturating_to::<u8>(),
            total_supply: as_u256(&fields[3])?,
            max_supply: as_u256(&fields[4])?,
            creator: as_address(&fields[5])?,
        })
    }

    pub fn display_total_supply(&self) -> String {
        format_units(self.total_supply, self.decimals)
    }

    pub fn display_max_supply(&self) -> String {
        format_units(self.max_supply, self.decimals)
    }

    /// API representation, supplies in human units
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id.to_string(),
            "name": self.name,
            "symbol": self.symbol,
            "decimals": self.decimals,
            "totalSupply": self.display_total_supply(),
            "maxSupply": self.display_max_supply(),
            "creator": self.creator.to_string(),
        })
    }
}

/// The fungible token hub contract
#[derive(Debug, Clone)]
pub struct TokenHub {
    binding: ContractBinding,
}

impl TokenHub {
    pub fn new(binding: ContractBinding) -> Self {
        Self { binding }
    }

    pub async fn from_config(
        contracts: &ContractsConfig,
        resolver: &mut AbiResolver,
    ) -> ClientResult<Self> {
        let binding = bind(
            "token hub",
            "TOKEN_HUB_ADDRESS",
            contracts.token_hub.as_ref(),
            TOKEN_HUB_ABI,
            resolver,
        )
        .await?;
        Ok(Self::new(binding))
    }

    pub fn binding(&self) -> &ContractBinding {
        &self.binding
    }

    /// Create a token; supplies are human amounts scaled by `decimals`
    pub async fn create_token(
        &self,
        client: &TransactionClient,
        name: &str,
        symbol: &str,
        decimals: u8,
        initial_supply: &str,
        max_supply: &str,
    ) -> ClientResult<HubReceipt> {
        let initial = parse_units(initial_supply, decimals)?;
        let max = parse_units(max_supply, decimals)?;

        tracing::info!("Creating token {} ({})", name, symbol);
        let outcome = client
            .execute(
                &self.binding,
                "createToken",
                &[
                    json!(name),
                    json!(symbol),
                    json!(decimals),
                    json!(initial.to_string()),
                    json!(max.to_string()),
                ],
                SubmitOptions::default(),
            )
            .await?;

        Ok(HubReceipt::from_outcome(client, &self.binding, outcome, "TokenCreated"))
    }

    /// All tokens, ids are positions in the hub's registry
    pub async fn all_tokens(&self, client: &TransactionClient) -> ClientResult<Vec<TokenInfo>> {
        let output = single(client.call(&self.binding, "getAllTokens", &[]).await?)?;
        as_array(&output)?
            .iter()
            .enumerate()
            .map(|(index, value)| TokenInfo::from_value(U256::from(index), value))
            .collect()
    }

    pub async fn token(&self, client: &TransactionClient, id: U256) -> ClientResult<TokenInfo> {
        let output = single(
            client
                .call(&self.binding, "getToken", &[json!(id.to_string())])
                .await?,
        )?;
        TokenInfo::from_value(id, &output)
    }

    pub async fn tokens_created_by(
        &self,
        client: &TransactionClient,
        creator: Address,
    ) -> ClientResult<Vec<TokenInfo>> {
        // Address equality is byte equality, so checksum casing never matters here
        Ok(self
            .all_tokens(client)
            .await?
            .into_iter()
            .filter(|token| token.creator == creator)
            .collect())
    }

    /// Mint `amount` (human units of the token) to `to`
    pub async fn mint(
        &self,
        client: &TransactionClient,
        token_id: U256,
        to: Address,
        amount: &str,
    ) -> ClientResult<HubReceipt> {
        let token = self.token(client, token_id).await?;
        let amount_wei = parse_units(amount, token.decimals)?;

        tracing::info!("Minting {} {} to {}", amount, token.symbol, to);
        let outcome = client
            .execute(
                &self.binding,
                "mint",
                &[
                    json!(token_id.to_string()),
                    json!(to.to_string()),
                    json!(amount_wei.to_string()),
                ],
                SubmitOptions::default(),
            )
            .await?;

        Ok(HubReceipt::from_outcome(client, &self.binding, outcome, "TokensMinted"))
    }

    /// Burn `amount` (human units) from the signer's balance
    pub async fn burn(
        &self,
        client: &TransactionClient,
        token_id: U256,
        amount: &str,
    ) -> ClientResult<HubReceipt> {
        let token = self.token(client, token_id).await?;
        let amount_wei = parse_units(amount, token.decimals)?;

        tracing::info!("Burning {} {}", amount, token.symbol);
        let outcome = client
            .execute(
                &self.binding,
                "burn",
                &[json!(token_id.to_string()), json!(amount_wei.to_string())],
                SubmitOptions::default(),
            )
            .await?;

        Ok(HubReceipt::from_outcome(client, &self.binding, outcome, "TokensBurned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ethereum::abi::parse_signatures;
    use crate::ethereum::mock::{encode_output, event_log, selector_of, MockRpc, MOCK_BLOCK};
    use crate::ethereum::provider::{Connection, RpcBackend};
    use crate::ethereum::utils::classify_rpc_error;
    use crate::ethereum::TxOutcome;
    use std::sync::Arc;

    const SIGNER: Address = Address::repeat_byte(0x11);

    fn hub() -> TokenHub {
        TokenHub::new(ContractBinding::new(
            "token hub",
            Address::repeat_byte(0x42),
            Arc::new(parse_signatures(TOKEN_HUB_ABI).unwrap()),
        ))
    }

    fn client(mock: Arc<MockRpc>) -> TransactionClient {
        let mut network = Config::default().networks["asset-hub-westend"].clone();
        network.receipt_poll_interval_ms = 1;
        let backend: Arc<dyn RpcBackend> = mock;
        TransactionClient::new(Connection::with_backend(
            "asset-hub-westend",
            &network,
            Some(SIGNER),
            backend,
        ))
    }

    fn token_record(name: &str, symbol: &str, decimals: u8, total: U256, max: U256, creator: Address) -> DynSolValue {
        DynSolValue::Tuple(vec![
            DynSolValue::String(name.to_string()),
            DynSolValue::String(symbol.to_string()),
            DynSolValue::Uint(U256::from(decimals), 8),
            DynSolValue::Uint(total, 256),
            DynSolValue::Uint(max, 256),
            DynSolValue::Address(creator),
        ])
    }

    fn ether(amount: &str) -> U256 {
        parse_units(amount, 18).unwrap()
    }

    #[tokio::test]
    async fn test_create_token_confirms_with_event() {
        let hub = hub();
        let log = event_log(
            hub.binding().abi(),
            hub.binding().address(),
            "TokenCreated",
            vec![DynSolValue::Uint(U256::ZERO, 256), DynSolValue::Address(SIGNER)],
            vec![],
        );
        let mock = Arc::new(MockRpc::new(420420421).with_receipt(true, vec![log]));
        let client = client(mock.clone());

        let receipt = hub
            .create_token(&client, "Demo", "DEMO", 18, "1000", "5000")
            .await
            .unwrap();

        match &receipt.outcome {
            TxOutcome::Confirmed(confirmed) => assert_eq!(confirmed.block_number, MOCK_BLOCK + 1),
            other => panic!("unexpected outcome {:?}", other),
        }
        let event = receipt.event.unwrap();
        assert_eq!(event.get_str("tokenId").unwrap(), "0");

        // Supplies were scaled by 18 decimals before encoding
        let expected = hub
            .binding()
            .encode_call(
                "createToken",
                &[
                    json!("Demo"),
                    json!("DEMO"),
                    json!(18),
                    json!(ether("1000").to_string()),
                    json!(ether("5000").to_string()),
                ],
            )
            .unwrap();
        let sent = mock.sent_transactions();
        assert_eq!(sent[0].input.input(), Some(&expected));
    }

    #[tokio::test]
    async fn test_create_token_rejects_excess_precision() {
        let mock = Arc::new(MockRpc::new(420420421));
        let client = client(mock.clone());
        assert!(matches!(
            hub().create_token(&client, "Demo", "DEMO", 2, "1.001", "5000").await,
            Err(ClientError::Argument(_))
        ));
        assert!(mock.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_mint_beyond_max_supply_fails_with_reason() {
        let hub = hub();
        let abi = hub.binding().abi();
        let mock = Arc::new(
            MockRpc::new(420420421)
                .with_call(
                    selector_of(abi, "getToken"),
                    encode_output(vec![token_record(
                        "Demo",
                        "DEMO",
                        18,
                        ether("1000"),
                        ether("5000"),
                        SIGNER,
                    )]),
                )
                .with_estimate_error(
                    selector_of(abi, "mint"),
                    classify_rpc_error("execution reverted: Exceeds max supply"),
                ),
        );
        let client = client(mock);

        let receipt = hub
            .mint(&client, U256::ZERO, SIGNER, "4001")
            .await
            .unwrap();
        match receipt.outcome {
            TxOutcome::Failed(failed) => assert!(failed.reason.contains("Exceeds max supply")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(receipt.event.is_none());
    }

    #[tokio::test]
    async fn test_burn_scales_by_token_decimals() {
        let hub = hub();
        let abi = hub.binding().abi();
        let mock = Arc::new(MockRpc::new(420420421).with_call(
            selector_of(abi, "getToken"),
            encode_output(vec![token_record(
                "Cents",
                "CNT",
                2,
                U256::from(100_000),
                U256::from(500_000),
                SIGNER,
            )]),
        ));
        let client = client(mock.clone());

        hub.burn(&client, U256::from(3), "12.5").await.unwrap();

        let expected = hub
            .binding()
            .encode_call("burn", &[json!("3"), json!("1250")])
            .unwrap();
        assert_eq!(mock.sent_transactions()[0].input.input(), Some(&expected));
    }

    #[tokio::test]
    async fn test_query_and_filter_by_creator() {
        let hub = hub();
        let other = Address::repeat_byte(0x22);
        let mock = Arc::new(MockRpc::new(420420421).with_call(
            selector_of(hub.binding().abi(), "getAllTokens"),
            encode_output(vec![DynSolValue::Array(vec![
                token_record("Demo", "DEMO", 18, ether("1000"), ether("5000"), SIGNER),
                token_record("Other", "OTH", 6, U256::from(1_500_000), U256::from(2_000_000), other),
                token_record("Again", "AGN", 18, U256::ZERO, ether("1"), SIGNER),
            ])]),
        ));
        let client = client(mock);

        let tokens = hub.all_tokens(&client).await.unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].id, U256::from(1));
        assert_eq!(tokens[1].display_total_supply(), "1.5");
        assert_eq!(tokens[0].to_json()["maxSupply"], "5000.0");

        let mine = hub.tokens_created_by(&client, SIGNER).await.unwrap();
        let ids: Vec<U256> = mine.iter().map(|token| token.id).collect();
        assert_eq!(ids, vec![U256::ZERO, U256::from(2)]);
    }
}
