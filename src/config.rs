use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub networks: HashMap<String, NetworkConfig>,
    pub default_network: String,
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub signer: SignerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub explorer_url: Option<String>,
    /// Ticker shown next to native amounts
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
    /// Deposit attached to clone-account creation, in native units
    pub existential_deposit: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default)]
    pub gas: GasConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GasConfig {
    /// Fixed gas limit; estimated by the node when unset
    pub gas_limit: Option<u64>,
    /// Fixed legacy gas price in wei; fetched from the node when unset
    pub gas_price: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractsConfig {
    pub token_hub: Option<ContractConfig>,
    pub nft_hub: Option<ContractConfig>,
    pub account_registry: Option<ContractConfig>,
    #[serde(default = "default_ipfs_gateway")]
    pub ipfs_gateway: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    pub address: String,
    /// JSON ABI replacing the built-in call signatures
    pub abi_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Environment variable holding the signing key
    pub private_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

fn default_native_symbol() -> String {
    "WND".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_ipfs_gateway() -> String {
    "https://gateway.pinata.cloud/ipfs/".to_string()
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            private_key_env: "PRIVATE_KEY".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut networks = HashMap::new();

        networks.insert(
            "asset-hub-westend".to_string(),
            NetworkConfig {
                rpc_url: "https://westend-asset-hub-eth-rpc.polkadot.io".to_string(),
                chain_id: 420420421,
                explorer_url: Some("https://assethub-westend.subscan.io".to_string()),
                native_symbol: default_native_symbol(),
                existential_deposit: Some("0.1".to_string()),
                receipt_poll_interval_ms: default_poll_interval_ms(),
                gas: GasConfig::default(),
            },
        );

        networks.insert(
            "local".to_string(),
            NetworkConfig {
                rpc_url: "http://127.0.0.1:8545".to_string(),
                chain_id: 420420420,
                explorer_url: None,
                native_symbol: "DEV".to_string(),
                existential_deposit: None,
                receipt_poll_interval_ms: 500,
                gas: GasConfig::default(),
            },
        );

        Self {
            networks,
            default_network: "asset-hub-westend".to_string(),
            contracts: ContractsConfig {
                ipfs_gateway: default_ipfs_gateway(),
                ..ContractsConfig::default()
            },
            signer: SignerConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))?;

        Ok(config)
    }

    /// Load configuration with fallback to default. `network` replaces the
    /// default network before environment overrides are applied.
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>, network: Option<&str>) -> Self {
        let path = match path {
            Some(path) => Some(path.as_ref().to_path_buf()),
            None => Self::default_config_path().ok().filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(path) => match Self::load_from_file(&path).await {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file, using defaults: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        if let Some(network) = network {
            config.default_network = network.to_string();
        }
        config.apply_env_vars();
        config
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_vars(&mut self) {
        self.apply_overrides(|var| std::env::var(var).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(rpc_url) = lookup("RPC_URL") {
            if let Some(network) = self.networks.get_mut(&self.default_network) {
                tracing::info!("Using RPC_URL environment variable for {}", self.default_network);
                network.rpc_url = rpc_url;
            }
        }

        let overrides = [
            ("TOKEN_HUB_ADDRESS", &mut self.contracts.token_hub),
            ("NFT_HUB_ADDRESS", &mut self.contracts.nft_hub),
            ("REGISTRY_ADDRESS", &mut self.contracts.account_registry),
        ];

        for (var, slot) in overrides {
            if let Some(address) = lookup(var) {
                tracing::debug!("{} set, overriding configured address", var);
                slot.get_or_insert_with(|| ContractConfig {
                    address: String::new(),
                    abi_path: None,
                })
                .address = address;
            }
        }
    }

    /// Settings of the named network, or of the default one
    pub fn network(&self, network: Option<&str>) -> ClientResult<(&str, &NetworkConfig)> {
        let name = network.unwrap_or(&self.default_network);
        self.networks
            .get_key_value(name)
            .map(|(name, config)| (name.as_str(), config))
            .ok_or_else(|| {
                let mut available: Vec<&str> = self.networks.keys().map(String::as_str).collect();
                available.sort_unstable();
                ClientError::Configuration(format!(
                    "Network '{}' not configured. Available networks: {}",
                    name,
                    available.join(", ")
                ))
            })
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("hub-client").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# Hub client configuration file
# Networks, contract addresses, signer and API server settings

# Network used when --network is not given
default_network = "asset-hub-westend"

[networks.asset-hub-westend]
rpc_url = "https://westend-asset-hub-eth-rpc.polkadot.io"
chain_id = 420420421
explorer_url = "https://assethub-westend.subscan.io"
native_symbol = "WND"
existential_deposit = "0.1"      # attached to createAccount, in WND
receipt_poll_interval_ms = 2000

[networks.asset-hub-westend.gas]
# gas_limit = 3000000            # estimated by the node when unset
# gas_price = 1000000000000      # fetched from the node when unset

[networks.local]
rpc_url = "http://127.0.0.1:8545"
chain_id = 420420420
native_symbol = "DEV"
receipt_poll_interval_ms = 500

# Contract addresses are deployment specific and have no defaults
[contracts]
ipfs_gateway = "https://gateway.pinata.cloud/ipfs/"

[contracts.token_hub]
address = "0x0000000000000000000000000000000000000000"
# abi_path = "abi/PolkaTokenHub.json"

[contracts.nft_hub]
address = "0x0000000000000000000000000000000000000000"
# abi_path = "abi/PolkaNFTHub.json"

[contracts.account_registry]
address = "0x0000000000000000000000000000000000000000"

[signer]
private_key_env = "PRIVATE_KEY"

[server]
host = "127.0.0.1"
port = 3000

# Environment variables that can be used:
# RPC_URL           - overrides rpc_url of the default network
# TOKEN_HUB_ADDRESS - overrides contracts.token_hub.address
# NFT_HUB_ADDRESS   - overrides contracts.nft_hub.address
# REGISTRY_ADDRESS  - overrides contracts.account_registry.address
# PRIVATE_KEY       - signing key (name configurable via signer.private_key_env)
"#;
        sample_config.to_string()
    }
}
