use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, U256},
};
use serde_json::{json, Value};

use super::{bind, HubReceipt};
use crate::config::ContractsConfig;
use crate::error::{ClientError, ClientResult};
use crate::ethereum::abi::{AbiResolver, NFT_HUB_ABI};
use crate::ethereum::client::{SubmitOptions, TransactionClient};
use crate::ethereum::contract::{
    as_address, as_array, as_string, as_tuple, as_u256, single, ContractBinding,
};
use crate::ethereum::units::{format_ether, parse_ether};
use crate::ethereum::utils;

/// Royalties are expressed in basis points of the sale price
pub const MAX_ROYALTY_BP: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub id: U256,
    pub name: String,
    pub creator: Address,
    /// Wei
    pub mint_price: U256,
    pub max_supply: U256,
    pub minted: U256,
    pub royalty_receiver: Address,
    pub royalty_bp: U256,
}

impl CollectionInfo {
    fn from_value(id: U256, value: &DynSolValue) -> ClientResult<Self> {
        let fields = as_tuple(value)?;
        if fields.len() < 7 {
            return Err(ClientError::Unknown(format!(
                "Collection record has {} fields, expected 7",
                fields.len()
            )));
        }

        Ok(Self {
            id,
            name: as_string(&fields[0])?,
            creator: as_address(&fields[1])?,
            mint_price: as_u256(&fields[2])?,
            max_supply: as_u256(&fields[3])?,
            minted: as_u256(&fields[4])?,
            royalty_receiver: as_address(&fields[5])?,
            royalty_bp: as_u256(&fields[6])?,
        })
    }

    pub fn to_json(&self, currency: &str) -> Value {
        json!({
            "id": self.id.saturating_to::<u64>(),
            "name": self.name,
            "creator": self.creator.to_string(),
            "price": format_ether(self.mint_price),
            "currency": currency,
            "minted": self.minted.saturating_to::<u64>(),
            "maxSupply": self.max_supply.saturating_to::<u64>(),
            "royaltyBP": self.royalty_bp.saturating_to::<u64>(),
            "royaltyReceiver": self.royalty_receiver.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftInfo {
    pub id: U256,
    pub name: String,
    pub owner: Address,
    pub uri: String,
}

impl NftInfo {
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id.saturating_to::<u64>(),
            "name": self.name,
            "owner": self.owner.to_string(),
            "uri": self.uri,
        })
    }
}

/// A token held by some account, as enumerated through the owner index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedToken {
    pub id: U256,
    pub uri: String,
}

/// A collection with every token that could be read
#[derive(Debug, Clone)]
pub struct CollectionDetail {
    pub info: CollectionInfo,
    pub tokens: Vec<NftInfo>,
}

/// The NFT hub contract
#[derive(Debug, Clone)]
pub struct NftHub {
    binding: ContractBinding,
    ipfs_gateway: String,
}

impl NftHub {
    pub fn new(binding: ContractBinding, ipfs_gateway: impl Into<String>) -> Self {
        Self {
            binding,
            ipfs_gateway: ipfs_gateway.into(),
        }
    }

    pub async fn from_config(
        contracts: &ContractsConfig,
        resolver: &mut AbiResolver,
    ) -> ClientResult<Self> {
        let binding = bind(
            "NFT hub",
            "NFT_HUB_ADDRESS",
            contracts.nft_hub.as_ref(),
            NFT_HUB_ABI,
            resolver,
        )
        .await?;
        Ok(Self::new(binding, contracts.ipfs_gateway.clone()))
    }

    pub fn binding(&self) -> &ContractBinding {
        &self.binding
    }

    async fn read(
        &self,
        client: &TransactionClient,
        function: &str,
        args: &[Value],
    ) -> ClientResult<DynSolValue> {
        single(client.call(&self.binding, function, args).await?)
    }

    /// Create a collection; `mint_price` is in native units
    pub async fn create_collection(
        &self,
        client: &TransactionClient,
        name: &str,
        mint_price: &str,
        max_supply: U256,
        royalty_receiver: Address,
        royalty_bp: u32,
    ) -> ClientResult<HubReceipt> {
        if royalty_bp > MAX_ROYALTY_BP {
            return Err(ClientError::Argument(format!(
                "Royalty of {} basis points exceeds the maximum of {}",
                royalty_bp, MAX_ROYALTY_BP
            )));
        }
        let price = parse_ether(mint_price)?;

        tracing::info!("Creating collection {} (mint price {})", name, mint_price);
        let outcome = client
            .execute(
                &self.binding,
                "createCollection",
                &[
                    json!(name),
                    json!(price.to_string()),
                    json!(max_supply.to_string()),
                    json!(royalty_receiver.to_string()),
                    json!(royalty_bp),
                ],
                SubmitOptions::default(),
            )
            .await?;

        Ok(HubReceipt::from_outcome(
            client,
            &self.binding,
            outcome,
            "CollectionCreated",
        ))
    }

    pub async fn collection_count(&self, client: &TransactionClient) -> ClientResult<U256> {
        as_u256(&self.read(client, "collectionCount", &[]).await?)
    }

    pub async fn collection(
        &self,
        client: &TransactionClient,
        id: U256,
    ) -> ClientResult<CollectionInfo> {
        let value = self
            .read(client, "getCollection", &[json!(id.to_string())])
            .await?;
        CollectionInfo::from_value(id, &value)
    }

    /// Every collection; any failed read fails the whole listing
    pub async fn collections(&self, client: &TransactionClient) -> ClientResult<Vec<CollectionInfo>> {
        let count = self.collection_count(client).await?.saturating_to::<u64>();
        let mut collections = Vec::new();
        for id in 0..count {
            collections.push(self.collection(client, U256::from(id)).await?);
        }
        Ok(collections)
    }

    /// Collections created by `creator`; unreadable collections are skipped
    pub async fn collections_created_by(
        &self,
        client: &TransactionClient,
        creator: Address,
    ) -> ClientResult<Vec<CollectionInfo>> {
        let count = self.collection_count(client).await?.saturating_to::<u64>();
        let mut collections = Vec::new();
        for id in 0..count {
            match self.collection(client, U256::from(id)).await {
                Ok(collection) if collection.creator == creator => collections.push(collection),
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping collection {}: {}", id, e),
            }
        }
        Ok(collections)
    }

    pub async fn tokens_in_collection(
        &self,
        client: &TransactionClient,
        id: U256,
    ) -> ClientResult<Vec<U256>> {
        let value = self
            .read(client, "getTokensInCollection", &[json!(id.to_string())])
            .await?;
        as_array(&value)?.iter().map(as_u256).collect()
    }

    pub async fn token_uri(&self, client: &TransactionClient, token_id: U256) -> ClientResult<String> {
        as_string(
            &self
                .read(client, "tokenURI", &[json!(token_id.to_string())])
                .await?,
        )
    }

    pub async fn nft(&self, client: &TransactionClient, token_id: U256) -> ClientResult<NftInfo> {
        let arg = [json!(token_id.to_string())];
        let owner = as_address(&self.read(client, "ownerOf", &arg).await?)?;
        let name = as_string(&self.read(client, "getTokenName", &arg).await?)?;
        let uri = as_string(&self.read(client, "tokenURI", &arg).await?)?;

        Ok(NftInfo {
            id: token_id,
            name,
            owner,
            uri,
        })
    }

    /// URI of the first token minted in the collection, if any
    pub async fn collection_thumbnail(
        &self,
        client: &TransactionClient,
        id: U256,
    ) -> Option<String> {
        match self.first_token_uri(client, id).await {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!("Error fetching thumbnail for collection {}: {}", id, e);
                None
            }
        }
    }

    async fn first_token_uri(
        &self,
        client: &TransactionClient,
        id: U256,
    ) -> ClientResult<Option<String>> {
        match self.tokens_in_collection(client, id).await?.first() {
            Some(first) => self.token_uri(client, *first).await.map(Some),
            None => Ok(None),
        }
    }

    /// Collection with its tokens; tokens that fail to load are skipped
    pub async fn collection_detail(
        &self,
        client: &TransactionClient,
        id: U256,
    ) -> ClientResult<CollectionDetail> {
        let info = self.collection(client, id).await?;
        let token_ids = self.tokens_in_collection(client, id).await?;

        let mut tokens = Vec::with_capacity(token_ids.len());
        for token_id in token_ids {
            match self.nft(client, token_id).await {
                Ok(nft) => tokens.push(nft),
                Err(e) => tracing::warn!("Error fetching token {}: {}", token_id, e),
            }
        }

        Ok(CollectionDetail { info, tokens })
    }

    /// Paid mint: attaches the collection's mint price and checks the balance first
    pub async fn mint(
        &self,
        client: &TransactionClient,
        collection_id: U256,
        to: Address,
        name: &str,
        uri_or_hash: &str,
    ) -> ClientResult<HubReceipt> {
        let collection = self.collection(client, collection_id).await?;
        let uri = utils::resolve_token_uri(uri_or_hash, &self.ipfs_gateway);

        tracing::info!(
            "Minting '{}' into collection {} for {} wei",
            name,
            collection.name,
            collection.mint_price
        );
        let outcome = client
            .execute(
                &self.binding,
                "mint",
                &[
                    json!(collection_id.to_string()),
                    json!(to.to_string()),
                    json!(name),
                    json!(uri),
                ],
                SubmitOptions::with_value(collection.mint_price),
            )
            .await?;

        Ok(HubReceipt::from_outcome(client, &self.binding, outcome, "Transfer"))
    }

    /// Tokens held by `owner`, enumerated through `tokenOfOwnerByIndex`
    pub async fn owned_by(
        &self,
        client: &TransactionClient,
        owner: Address,
    ) -> ClientResult<Vec<OwnedToken>> {
        let balance = as_u256(
            &self
                .read(client, "balanceOf", &[json!(owner.to_string())])
                .await?,
        )?
        .saturating_to::<u64>();

        let mut tokens = Vec::new();
        for index in 0..balance {
            let id = as_u256(
                &self
                    .read(
                        client,
                        "tokenOfOwnerByIndex",
                        &[json!(owner.to_string()), json!(index)],
                    )
                    .await?,
            )?;
            let uri = self.token_uri(client, id).await?;
            tokens.push(OwnedToken { id, uri });
        }
        Ok(tokens)
    }

    /// Owner of the hub contract itself
    pub async fn owner(&self, client: &TransactionClient) -> ClientResult<Address> {
        as_address(&self.read(client, "owner", &[]).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ethereum::abi::parse_signatures;
    use crate::ethereum::mock::{encode_output, event_log, selector_of, MockRpc};
    use crate::ethereum::provider::{Connection, RpcBackend};
    use crate::ethereum::TxOutcome;
    use alloy::primitives::Bytes;
    use std::sync::Arc;

    const SIGNER: Address = Address::repeat_byte(0x11);
    const GATEWAY: &str = "https://gateway.pinata.cloud/ipfs/";

    fn hub() -> NftHub {
        NftHub::new(
            ContractBinding::new(
                "NFT hub",
                Address::repeat_byte(0x43),
                Arc::new(parse_signatures(NFT_HUB_ABI).unwrap()),
            ),
            GATEWAY,
        )
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

    fn uint(value: u64) -> DynSolValue {
        DynSolValue::Uint(U256::from(value), 256)
    }

    fn collection_record(name: &str, creator: Address, price: U256) -> Bytes {
        encode_output(vec![DynSolValue::Tuple(vec![
            DynSolValue::String(name.to_string()),
            DynSolValue::Address(creator),
            DynSolValue::Uint(price, 256),
            uint(100),
            uint(2),
            DynSolValue::Address(creator),
            DynSolValue::Uint(U256::from(500), 96),
        ])])
    }

    fn call_data(hub: &NftHub, function: &str, args: &[Value]) -> Bytes {
        hub.binding().encode_call(function, args).unwrap()
    }

    #[tokio::test]
    async fn test_royalty_above_maximum_is_rejected() {
        let mock = Arc::new(MockRpc::new(420420421));
        let client = client(mock.clone());

        let err = hub()
            .create_collection(&client, "Art", "0.1", U256::from(100), SIGNER, 10_001)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Argument(_)));
        assert!(mock.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_create_collection_decodes_event() {
        let hub = hub();
        let log = event_log(
            hub.binding().abi(),
            hub.binding().address(),
            "CollectionCreated",
            vec![uint(4), DynSolValue::Address(SIGNER)],
            vec![
                DynSolValue::Uint(parse_ether("0.1").unwrap(), 256),
                uint(100),
                DynSolValue::Address(SIGNER),
                DynSolValue::Uint(U256::from(500), 96),
            ],
        );
        let client = client(Arc::new(MockRpc::new(420420421).with_receipt(true, vec![log])));

        let receipt = hub
            .create_collection(&client, "Art", "0.1", U256::from(100), SIGNER, 500)
            .await
            .unwrap();
        assert!(receipt.outcome.is_confirmed());
        assert_eq!(receipt.event.unwrap().get_str("collectionId").unwrap(), "4");
    }

    #[tokio::test]
    async fn test_mint_attaches_price_and_expands_ipfs_hash() {
        let hub = hub();
        let price = parse_ether("0.25").unwrap();
        let mock = Arc::new(MockRpc::new(420420421).with_call(
            selector_of(hub.binding().abi(), "getCollection"),
            collection_record("Art", SIGNER, price),
        ));
        let client = client(mock.clone());

        hub.mint(&client, U256::ZERO, SIGNER, "First", "QmHash")
            .await
            .unwrap();

        let sent = mock.sent_transactions();
        assert_eq!(sent[0].value, Some(price));
        let expected = call_data(
            &hub,
            "mint",
            &[
                json!("0"),
                json!(SIGNER.to_string()),
                json!("First"),
                json!("https://gateway.pinata.cloud/ipfs/QmHash"),
            ],
        );
        assert_eq!(sent[0].input.input(), Some(&expected));
    }

    #[tokio::test]
    async fn test_mint_without_funds_is_refused() {
        let hub = hub();
        let mock = Arc::new(
            MockRpc::new(420420421)
                .with_balance(parse_ether("0.1").unwrap())
                .with_call(
                    selector_of(hub.binding().abi(), "getCollection"),
                    collection_record("Art", SIGNER, parse_ether("1").unwrap()),
                ),
        );
        let client = client(mock.clone());

        let err = hub
            .mint(&client, U256::ZERO, SIGNER, "First", "ipfs://QmHash")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InsufficientFunds { .. }));
        assert!(mock.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_collection_detail_skips_unreadable_tokens() {
        let hub = hub();
        let abi = hub.binding().abi();
        let mock = MockRpc::new(420420421)
            .with_call(
                selector_of(abi, "getCollection"),
                collection_record("Art", SIGNER, U256::ZERO),
            )
            .with_call(
                selector_of(abi, "getTokensInCollection"),
                encode_output(vec![DynSolValue::Array(vec![uint(1), uint(2)])]),
            )
            .with_call(
                selector_of(abi, "getTokenName"),
                encode_output(vec![DynSolValue::String("Piece".into())]),
            )
            .with_call(
                selector_of(abi, "tokenURI"),
                encode_output(vec![DynSolValue::String("ipfs://piece".into())]),
            )
            .with_call_data(
                call_data(&hub, "ownerOf", &[json!("1")]),
                encode_output(vec![DynSolValue::Address(SIGNER)]),
            )
            .with_call_error(
                selector_of(abi, "ownerOf"),
                ClientError::Revert("ERC721: invalid token ID".to_string()),
            );
        let client = client(Arc::new(mock));

        let detail = hub.collection_detail(&client, U256::ZERO).await.unwrap();
        assert_eq!(detail.info.name, "Art");
        assert_eq!(detail.tokens.len(), 1);
        assert_eq!(detail.tokens[0].id, U256::from(1));
        assert_eq!(detail.tokens[0].owner, SIGNER);

        assert_eq!(
            hub.collection_thumbnail(&client, U256::ZERO).await.as_deref(),
            Some("ipfs://piece")
        );
    }

    #[tokio::test]
    async fn test_listing_and_creator_filter() {
        let hub = hub();
        let other = Address::repeat_byte(0x22);
        let mock = MockRpc::new(420420421)
            .with_call(
                selector_of(hub.binding().abi(), "collectionCount"),
                encode_output(vec![uint(3)]),
            )
            .with_call_data(
                call_data(&hub, "getCollection", &[json!("0")]),
                collection_record("Mine", SIGNER, U256::ZERO),
            )
            .with_call_data(
                call_data(&hub, "getCollection", &[json!("1")]),
                collection_record("Theirs", other, U256::ZERO),
            )
            .with_call_error(
                selector_of(hub.binding().abi(), "getCollection"),
                ClientError::Revert("Collection does not exist".to_string()),
            );
        let client = client(Arc::new(mock));

        // Collection 2 cannot be read: the full listing fails, the filtered one skips it
        assert!(hub.collections(&client).await.is_err());

        let mine = hub.collections_created_by(&client, SIGNER).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "Mine");
        assert_eq!(mine[0].to_json("WND")["price"], "0.0");
    }

    #[tokio::test]
    async fn test_owned_by_enumerates_owner_index() {
        let hub = hub();
        let abi = hub.binding().abi();
        let mock = MockRpc::new(420420421)
            .with_call(selector_of(abi, "balanceOf"), encode_output(vec![uint(2)]))
            .with_call_data(
                call_data(&hub, "tokenOfOwnerByIndex", &[json!(SIGNER.to_string()), json!(0)]),
                encode_output(vec![uint(7)]),
            )
            .with_call_data(
                call_data(&hub, "tokenOfOwnerByIndex", &[json!(SIGNER.to_string()), json!(1)]),
                encode_output(vec![uint(9)]),
            )
            .with_call(
                selector_of(abi, "tokenURI"),
                encode_output(vec![DynSolValue::String("ipfs://x".into())]),
            );
        let client = client(Arc::new(mock));

        let owned = hub.owned_by(&client, SIGNER).await.unwrap();
        let ids: Vec<U256> = owned.iter().map(|token| token.id).collect();
        assert_eq!(ids, vec![U256::from(7), U256::from(9)]);
    }

    #[tokio::test]
    async fn test_huge_counts_fail_on_first_read() {
        let hub = hub();
        let abi = hub.binding().abi();
        let mock = MockRpc::new(420420421)
            .with_call(
                selector_of(abi, "collectionCount"),
                encode_output(vec![DynSolValue::Uint(U256::MAX, 256)]),
            )
            .with_call_error(
                selector_of(abi, "getCollection"),
                ClientError::Revert("Collection does not exist".to_string()),
            )
            .with_call(
                selector_of(abi, "balanceOf"),
                encode_output(vec![DynSolValue::Uint(U256::MAX, 256)]),
            )
            .with_call_error(
                selector_of(abi, "tokenOfOwnerByIndex"),
                ClientError::Revert("Owner index out of bounds".to_string()),
            );
        let client = client(Arc::new(mock));

        assert!(matches!(
            hub.collections(&client).await,
            Err(ClientError::Revert(_))
        ));
        assert!(matches!(
            hub.owned_by(&client, SIGNER).await,
            Err(ClientError::Revert(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_mint_reports_reason() {
        let hub = hub();
        let abi = hub.binding().abi();
        let mock = MockRpc::new(420420421)
            .with_call(
                selector_of(abi, "getCollection"),
                collection_record("Art", SIGNER, U256::ZERO),
            )
            .with_receipt(false, vec![])
            .with_call_error(
                selector_of(abi, "mint"),
                ClientError::Revert("Max supply reached".to_string()),
            );
        let client = client(Arc::new(mock));

        let receipt = hub
            .mint(&client, U256::ZERO, SIGNER, "Late", "ipfs://late")
            .await
            .unwrap();
        match receipt.outcome {
            TxOutcome::Failed(failed) => assert_eq!(failed.reason, "Max supply reached"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
