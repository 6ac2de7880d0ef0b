use alloy::json_abi::JsonAbi;
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Call signatures of the token hub
pub const TOKEN_HUB_ABI: &[&str] = &[
    "function createToken(string name, string symbol, uint8 decimals, uint256 initialSupply, uint256 maxSupply) returns (uint256)",
    "function getAllTokens() view returns ((string,string,uint8,uint256,uint256,address)[])",
    "function getToken(uint256 tokenId) view returns ((string,string,uint8,uint256,uint256,address))",
    "function mint(uint256 tokenId, address to, uint256 amount)",
    "function burn(uint256 tokenId, uint256 amount)",
    "event TokenCreated(uint256 indexed tokenId, address indexed creator)",
    "event TokensMinted(uint256 indexed tokenId, address indexed to, uint256 amount)",
    "event TokensBurned(uint256 indexed tokenId, address indexed from, uint256 amount)",
];

/// Call signatures of the NFT hub (named collections and named tokens)
pub const NFT_HUB_ABI: &[&str] = &[
    "function owner() view returns (address)",
    "function collectionCount() view returns (uint256)",
    "function getCollection(uint256 collectionId) view returns ((string,address,uint256,uint256,uint256,address,uint96))",
    "function getTokensInCollection(uint256 collectionId) view returns (uint256[])",
    "function ownerOf(uint256 tokenId) view returns (address)",
    "function getTokenName(uint256 tokenId) view returns (string)",
    "function tokenURI(uint256 tokenId) view returns (string)",
    "function balanceOf(address owner) view returns (uint256)",
    "function tokenOfOwnerByIndex(address owner, uint256 index) view returns (uint256)",
    "function createCollection(string name, uint256 mintPrice, uint256 maxSupply, address royaltyReceiver, uint96 royaltyBP) returns (uint256)",
    "function mint(uint256 collectionId, address to, string name, string uri) payable returns (uint256)",
    "event CollectionCreated(uint256 indexed collectionId, address indexed creator, uint256 mintPrice, uint256 maxSupply, address royaltyReceiver, uint96 royaltyBP)",
    "event Transfer(address indexed from, address indexed to, uint256 indexed tokenId)",
];

/// Call signatures of the clone-account registry
pub const ACCOUNT_REGISTRY_ABI: &[&str] = &[
    "function predictNextClone() view returns (address)",
    "function account(address implementation, bytes32 salt, uint256 chainId, address tokenContract, uint256 tokenId) view returns (address)",
    "function createAccount(address implementation, bytes32 salt, uint256 chainId, address tokenContract, uint256 tokenId) returns (address)",
    "event AccountCreated(address account, address indexed implementation, bytes32 salt, uint256 chainId, address indexed tokenContract, uint256 indexed tokenId)",
];

/// Call signatures of a deployed clone account
pub const CLONE_ACCOUNT_ABI: &[&str] =
    &["function token() view returns (uint256 chainId, address tokenContract, uint256 tokenId)"];

/// Where a contract's ABI comes from
#[derive(Debug, Clone)]
pub enum AbiSource {
    /// Human-readable signatures compiled into the binary
    Builtin(&'static [&'static str]),
    /// JSON ABI on disk, either a bare array or an artifact with an `abi` field
    File(PathBuf),
}

/// Resolves contract ABIs and keeps parsed copies in memory
#[derive(Debug, Default)]
pub struct AbiResolver {
    memory_cache: HashMap<String, Arc<JsonAbi>>,
}

impl AbiResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the ABI for a source, parsing it on first use
    pub async fn get_abi(&mut self, source: &AbiSource) -> Result<Arc<JsonAbi>> {
        let cache_key = Self::cache_key(source);

        if let Some(abi) = self.memory_cache.get(&cache_key) {
            debug!("ABI cache hit for {}", cache_key);
            return Ok(abi.clone());
        }

        let abi = match source {
            AbiSource::Builtin(signatures) => parse_signatures(signatures)?,
            AbiSource::File(path) => {
                info!("Loading ABI from {:?}", path);
                load_abi_file(path).await?
            }
        };

        let abi = Arc::new(abi);
        self.memory_cache.insert(cache_key, abi.clone());
        Ok(abi)
    }

    fn cache_key(source: &AbiSource) -> String {
        match source {
            AbiSource::Builtin(signatures) => format!("builtin:{}", signatures.join(";")),
            AbiSource::File(path) => format!("file:{}", path.display()),
        }
    }
}

/// Parse human-readable signatures into a JSON ABI
pub fn parse_signatures(signatures: &[&str]) -> Result<JsonAbi> {
    JsonAbi::parse(signatures.iter().copied())
        .map_err(|e| anyhow!("Failed to parse ABI signatures: {}", e))
}

/// Load a JSON ABI file, accepting compiler artifacts that wrap it in `abi`
pub async fn load_abi_file(path: &Path) -> Result<JsonAbi> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| anyhow!("Failed to read ABI file {:?}: {}", path, e))?;

    let value: Value = serde_json::from_str(&content)
        .map_err(|e| anyhow!("Failed to parse ABI file {:?}: {}", path, e))?;

    let abi_value = match value {
        Value::Object(mut artifact) => artifact
            .remove("abi")
            .ok_or_else(|| anyhow!("ABI file {:?} is an object without an 'abi' field", path))?,
        other => other,
    };

    let abi: JsonAbi = serde_json::from_value(abi_value)
        .map_err(|e| anyhow!("Failed to parse ABI JSON in {:?}: {}", path, e))?;

    Ok(abi)
}
