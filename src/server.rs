//! Read-only JSON API over the token and NFT hubs

use alloy::primitives::{Address, U256};
use anyhow::{anyhow, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::{ClientError, ClientResult};
use crate::ethereum::client::TransactionClient;
use crate::ethereum::utils;
use crate::hubs::nft::NftHub;
use crate::hubs::token::TokenHub;

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub client: Arc<TransactionClient>,
    pub tokens: Option<Arc<TokenHub>>,
    pub nfts: Option<Arc<NftHub>>,
    /// Ticker reported next to collection prices
    pub currency: String,
}

impl AppState {
    fn token_hub(&self) -> ClientResult<&TokenHub> {
        self.tokens.as_deref().ok_or_else(|| {
            ClientError::Configuration("No token hub address configured".to_string())
        })
    }

    fn nft_hub(&self) -> ClientResult<&NftHub> {
        self.nfts.as_deref().ok_or_else(|| {
            ClientError::Configuration("No NFT hub address configured".to_string())
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    address: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/tokens", get(list_tokens))
        .route("/api/tokens/:id", get(get_token))
        .route("/api/user/tokens", get(user_tokens))
        .route("/api/collections", get(list_collections))
        .route("/api/collections/:id", get(get_collection))
        .route("/api/user/collections", get(user_collections))
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: &ServerConfig, state: AppState) -> Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow!("Failed to bind {}: {}", addr, e))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow!("API server error: {}", e))?;

    Ok(())
}

fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message })))
}

fn parse_id(id: &str, what: &str) -> Result<U256, (StatusCode, Json<Value>)> {
    id.trim()
        .parse::<u64>()
        .map(U256::from)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, &format!("Invalid {} ID", what)))
}

fn parse_address_query(query: &AddressQuery) -> Result<Address, (StatusCode, Json<Value>)> {
    let address = query
        .address
        .as_deref()
        .filter(|address| !address.trim().is_empty())
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Wallet address is required"))?;

    utils::validate_address(address)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, &e.to_string()))
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let connection = state.client.connection();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "network": connection.network(),
        "chainId": connection.chain_id(),
    }))
}

async fn list_tokens(State(state): State<AppState>) -> impl IntoResponse {
    let result = async {
        let hub = state.token_hub()?;
        hub.all_tokens(&state.client).await
    };

    let tokens: Vec<Value> = match result.await {
        Ok(tokens) => tokens.iter().map(|token| token.to_json()).collect(),
        Err(e) => {
            error!("Error fetching tokens: {}", e);
            Vec::new()
        }
    };
    Json(json!({ "tokens": tokens }))
}

async fn get_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let id = parse_id(&id, "token")?;

    let result = async {
        let hub = state.token_hub()?;
        hub.token(&state.client, id).await
    };

    match result.await {
        Ok(token) => Ok(Json(json!({ "token": token.to_json() }))),
        Err(e) => {
            error!("Error fetching token {}: {}", id, e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch token data",
            ))
        }
    }
}

async fn user_tokens(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let address = parse_address_query(&query)?;

    let result = async {
        let hub = state.token_hub()?;
        hub.tokens_created_by(&state.client, address).await
    };

    let tokens: Vec<Value> = match result.await {
        Ok(tokens) => tokens.iter().map(|token| token.to_json()).collect(),
        Err(e) => {
            error!("Error fetching tokens for {}: {}", address, e);
            Vec::new()
        }
    };
    Ok(Json(json!({ "tokens": tokens })))
}

async fn list_collections(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let result = async {
        let hub = state.nft_hub()?;
        let collections = hub.collections(&state.client).await?;

        let mut entries = Vec::with_capacity(collections.len());
        for collection in collections {
            let thumbnail = hub.collection_thumbnail(&state.client, collection.id).await;
            let mut entry = collection.to_json(&state.currency);
            entry["thumbnailUri"] = json!(thumbnail);
            entries.push(entry);
        }
        Ok::<_, ClientError>(entries)
    };

    match result.await {
        Ok(collections) => Ok(Json(json!({ "collections": collections }))),
        Err(e) => {
            error!("Error fetching collections: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch collections",
            ))
        }
    }
}

async fn get_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let id = parse_id(&id, "collection")?;

    let result = async {
        let hub = state.nft_hub()?;
        hub.collection_detail(&state.client, id).await
    };

    match result.await {
        Ok(detail) => {
            let mut collection = detail.info.to_json(&state.currency);
            collection["tokens"] =
                Value::Array(detail.tokens.iter().map(|token| token.to_json()).collect());
            collection["thumbnailUri"] = json!(detail.tokens.first().map(|token| &token.uri));
            Ok(Json(json!({ "collection": collection })))
        }
        Err(e) => {
            error!("Error fetching collection {}: {}", id, e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch collection",
            ))
        }
    }
}

async fn user_collections(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let address = parse_address_query(&query)?;

    let result = async {
        let hub = state.nft_hub()?;
        hub.collections_created_by(&state.client, address).await
    };

    let collections: Vec<Value> = match result.await {
        Ok(collections) => collections
            .iter()
            .map(|collection| collection.to_json(&state.currency))
            .collect(),
        Err(e) => {
            warn!("Error fetching collections for {}: {}", address, e);
            Vec::new()
        }
    };
    Ok(Json(json!({ "collections": collections })))
}
