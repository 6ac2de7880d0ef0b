//! Command table for the `hub-client` binary

use alloy::{
    primitives::{Address, U256},
    signers::local::PrivateKeySigner,
};
use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, NetworkConfig};
use crate::error::ClientError;
use crate::ethereum::abi::AbiResolver;
use crate::ethereum::client::TransactionClient;
use crate::ethereum::provider::Connection;
use crate::ethereum::units::format_ether;
use crate::ethereum::{utils, TxOutcome};
use crate::hubs::nft::NftHub;
use crate::hubs::registry::{AccountRegistry, CloneParams};
use crate::hubs::token::TokenHub;
use crate::hubs::HubReceipt;
use crate::server::{self, AppState};

fn address_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).value_name("ADDRESS").help(help)
}

fn clone_args(command: Command) -> Command {
    command
        .arg(Arg::new("salt").required(true).help("Salt text (max 31 bytes) or 0x-prefixed 32-byte hex"))
        .arg(address_arg("token-contract", "Token contract the account is bound to").required(true))
        .arg(Arg::new("token-id").required(true).help("Token id the account is bound to"))
        .arg(
            Arg::new("implementation")
                .long("implementation")
                .value_name("ADDRESS")
                .help("Account implementation (defaults to the zero address)"),
        )
}

/// The full command line definition
pub fn cli() -> Command {
    Command::new("hub-client")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Client for the token hub, NFT hub and clone-account registry contracts")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Path to configuration file"),
        )
        .arg(
            Arg::new("network")
                .short('n')
                .long("network")
                .value_name("NETWORK")
                .global(true)
                .help("Network to use (asset-hub-westend, local)"),
        )
        .arg(
            Arg::new("rpc-url")
                .short('r')
                .long("rpc-url")
                .value_name("URL")
                .global(true)
                .help("RPC endpoint URL"),
        )
        .arg(
            Arg::new("private-key")
                .short('k')
                .long("private-key")
                .value_name("KEY_OR_ENV_VAR")
                .global(true)
                .help("Signing key, or the name of an environment variable holding it"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a sample configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-path")
                .long("config-path")
                .help("Print the default configuration file path and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("create")
                .about("Create a fungible token")
                .arg(Arg::new("name").required(true))
                .arg(Arg::new("symbol").required(true))
                .arg(Arg::new("decimals").required(true).value_parser(value_parser!(u8)))
                .arg(Arg::new("initial-supply").required(true))
                .arg(Arg::new("max-supply").required(true)),
        )
        .subcommand(Command::new("query").about("List all tokens"))
        .subcommand(
            Command::new("token")
                .about("Show one token")
                .arg(Arg::new("id").required(true)),
        )
        .subcommand(
            Command::new("mint")
                .about("Mint tokens to an address")
                .arg(Arg::new("token-id").required(true))
                .arg(address_arg("to", "Recipient").required(true))
                .arg(Arg::new("amount").required(true)),
        )
        .subcommand(
            Command::new("burn")
                .about("Burn tokens from the signer's balance")
                .arg(Arg::new("token-id").required(true))
                .arg(Arg::new("amount").required(true)),
        )
        .subcommand(
            Command::new("created-by")
                .about("List tokens created by an address")
                .arg(address_arg("address", "Creator").required(true)),
        )
        .subcommand(
            Command::new("create-collection")
                .about("Create an NFT collection")
                .arg(Arg::new("name").required(true))
                .arg(Arg::new("price").required(true).help("Mint price in native units"))
                .arg(Arg::new("max-supply").required(true))
                .arg(address_arg("royalty-receiver", "Royalty receiver").required(true))
                .arg(
                    Arg::new("royalty-bp")
                        .required(true)
                        .value_parser(value_parser!(u32))
                        .help("Royalty in basis points (max 10000)"),
                ),
        )
        .subcommand(Command::new("collections").about("List all NFT collections"))
        .subcommand(
            Command::new("collection")
                .about("Show a collection and its tokens")
                .arg(Arg::new("id").required(true)),
        )
        .subcommand(
            Command::new("mint-nft")
                .about("Mint an NFT into a collection, paying its mint price")
                .arg(Arg::new("collection-id").required(true))
                .arg(address_arg("to", "Recipient").required(true))
                .arg(Arg::new("name").required(true))
                .arg(Arg::new("uri").required(true).help("Token URI or bare IPFS hash")),
        )
        .subcommand(
            Command::new("owned")
                .about("List NFTs owned by an address (defaults to the signer)")
                .arg(address_arg("address", "Owner")),
        )
        .subcommand(
            Command::new("balance")
                .about("Show the native balance of an address (defaults to the signer)")
                .arg(address_arg("address", "Account")),
        )
        .subcommand(Command::new("predict-clone").about("Predict the next clone account address"))
        .subcommand(clone_args(
            Command::new("clone-account").about("Look up the clone account for a token"),
        ))
        .subcommand(clone_args(
            Command::new("create-clone").about("Deploy a clone account for a token"),
        ))
        .subcommand(
            Command::new("serve")
                .about("Serve the read-only JSON API")
                .arg(Arg::new("host").long("host").value_name("HOST"))
                .arg(
                    Arg::new("port")
                        .long("port")
                        .value_name("PORT")
                        .value_parser(value_parser!(u16)),
                ),
        )
}

/// Signer from `--private-key`, else from the configured environment variable
pub fn resolve_signer(
    matches: &ArgMatches,
    config: &Config,
) -> Result<Option<PrivateKeySigner>, ClientError> {
    if let Some(key_or_env) = matches.get_one::<String>("private-key") {
        return utils::resolve_private_key(key_or_env).map(Some);
    }

    let env_var = &config.signer.private_key_env;
    if std::env::var(env_var).is_ok() {
        return utils::resolve_private_key(env_var).map(Some);
    }

    info!("{} not set, running without a signer", env_var);
    Ok(None)
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing argument <{}>", name))
}

fn uint(matches: &ArgMatches, name: &str) -> Result<U256> {
    Ok(utils::parse_uint(required(matches, name)?)?)
}

fn address(matches: &ArgMatches, name: &str) -> Result<Address> {
    Ok(utils::validate_address(required(matches, name)?)?)
}

/// Explicit address argument, or the signer's own account
fn address_or_signer(matches: &ArgMatches, client: &TransactionClient) -> Result<Address> {
    match matches.get_one::<String>("address") {
        Some(address) => Ok(utils::validate_address(address)?),
        None => client.connection().account().ok_or_else(|| {
            ClientError::Argument("No address given and no signer configured".to_string()).into()
        }),
    }
}

fn clone_params(matches: &ArgMatches, chain_id: u64) -> Result<CloneParams> {
    let implementation = match matches.get_one::<String>("implementation") {
        Some(implementation) => utils::validate_address(implementation)?,
        None => Address::ZERO,
    };
    Ok(CloneParams::new(
        implementation,
        required(matches, "salt")?,
        chain_id,
        address(matches, "token-contract")?,
        uint(matches, "token-id")?,
    )?)
}

/// Print where a transaction ended up; a failed one becomes an error
fn report(client: &TransactionClient, receipt: &HubReceipt) -> Result<()> {
    if let Some(hash) = receipt.outcome.hash() {
        println!("Transaction hash: {}", hash);
    }
    if let Some(url) = client.explorer_url(&receipt.outcome) {
        println!("Explorer: {}", url);
    }

    match &receipt.outcome {
        TxOutcome::Confirmed(confirmed) => {
            println!(
                "Confirmed in block {} (gas used {})",
                confirmed.block_number, confirmed.gas_used
            );
            Ok(())
        }
        TxOutcome::Failed(failed) => Err(ClientError::Revert(failed.reason.clone()).into()),
    }
}

fn event_field(receipt: &HubReceipt, field: &str) -> String {
    receipt
        .event
        .as_ref()
        .and_then(|event| event.get_str(field))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Connect and run the selected subcommand
pub async fn dispatch(
    matches: &ArgMatches,
    config: Config,
    signer: Option<PrivateKeySigner>,
) -> Result<()> {
    let Some((name, sub)) = matches.subcommand() else {
        cli().print_help()?;
        return Ok(());
    };

    let (network_name, network) = config.network(None)?;
    let network: NetworkConfig = network.clone();
    let connection = Connection::connect(network_name, &network, signer).await?;
    let mut client = TransactionClient::new(connection).with_gas_defaults(
        network.gas.gas_limit,
        network.gas.gas_price.map(u128::from),
    );
    let mut resolver = AbiResolver::new();
    let symbol = network.native_symbol.as_str();

    match name {
        "create" => {
            let hub = TokenHub::from_config(&config.contracts, &mut resolver).await?;
            let decimals = *sub
                .get_one::<u8>("decimals")
                .ok_or_else(|| anyhow!("Missing argument <decimals>"))?;
            let receipt = hub
                .create_token(
                    &client,
                    required(sub, "name")?,
                    required(sub, "symbol")?,
                    decimals,
                    required(sub, "initial-supply")?,
                    required(sub, "max-supply")?,
                )
                .await?;
            report(&client, &receipt)?;
            println!(
                "Token created: id {} (creator {})",
                event_field(&receipt, "tokenId"),
                event_field(&receipt, "creator")
            );
        }
        "query" | "created-by" => {
            let hub = TokenHub::from_config(&config.contracts, &mut resolver).await?;
            let tokens = if name == "query" {
                hub.all_tokens(&client).await?
            } else {
                hub.tokens_created_by(&client, address(sub, "address")?).await?
            };

            println!("{} token(s)", tokens.len());
            for token in tokens {
                println!(
                    "#{} {} ({}) supply {} / {} decimals {} creator {}",
                    token.id,
                    token.name,
                    token.symbol,
                    token.display_total_supply(),
                    token.display_max_supply(),
                    token.decimals,
                    token.creator
                );
            }
        }
        "token" => {
            let hub = TokenHub::from_config(&config.contracts, &mut resolver).await?;
            let token = hub.token(&client, uint(sub, "id")?).await?;
            println!("{}", serde_json::to_string_pretty(&token.to_json())?);
        }
        "mint" => {
            let hub = TokenHub::from_config(&config.contracts, &mut resolver).await?;
            let receipt = hub
                .mint(
                    &client,
                    uint(sub, "token-id")?,
                    address(sub, "to")?,
                    required(sub, "amount")?,
                )
                .await?;
            report(&client, &receipt)?;
        }
        "burn" => {
            let hub = TokenHub::from_config(&config.contracts, &mut resolver).await?;
            let receipt = hub
                .burn(&client, uint(sub, "token-id")?, required(sub, "amount")?)
                .await?;
            report(&client, &receipt)?;
        }
        "create-collection" => {
            let hub = NftHub::from_config(&config.contracts, &mut resolver).await?;
            let royalty_bp = *sub
                .get_one::<u32>("royalty-bp")
                .ok_or_else(|| anyhow!("Missing argument <royalty-bp>"))?;
            let receipt = hub
                .create_collection(
                    &client,
                    required(sub, "name")?,
                    required(sub, "price")?,
                    uint(sub, "max-supply")?,
                    address(sub, "royalty-receiver")?,
                    royalty_bp,
                )
                .await?;
            report(&client, &receipt)?;
            println!("Collection created: id {}", event_field(&receipt, "collectionId"));
        }
        "collections" => {
            let hub = NftHub::from_config(&config.contracts, &mut resolver).await?;
            match hub.owner(&client).await {
                Ok(owner) => println!("Hub owner: {}", owner),
                Err(e) => warn!("Could not read hub owner: {}", e),
            }

            let collections = hub.collections(&client).await?;
            println!("{} collection(s)", collections.len());
            for collection in collections {
                println!(
                    "#{} {} by {}: {} {} per mint, {} / {} minted, royalty {} bp to {}",
                    collection.id,
                    collection.name,
                    collection.creator,
                    format_ether(collection.mint_price),
                    symbol,
                    collection.minted,
                    collection.max_supply,
                    collection.royalty_bp,
                    collection.royalty_receiver
                );
            }
        }
        "collection" => {
            let hub = NftHub::from_config(&config.contracts, &mut resolver).await?;
            let detail = hub.collection_detail(&client, uint(sub, "id")?).await?;
            let mut collection = detail.info.to_json(symbol);
            collection["tokens"] = detail.tokens.iter().map(|token| token.to_json()).collect();
            println!("{}", serde_json::to_string_pretty(&collection)?);
        }
        "mint-nft" => {
            let hub = NftHub::from_config(&config.contracts, &mut resolver).await?;
            let receipt = hub
                .mint(
                    &client,
                    uint(sub, "collection-id")?,
                    address(sub, "to")?,
                    required(sub, "name")?,
                    required(sub, "uri")?,
                )
                .await?;
            report(&client, &receipt)?;
            println!("Minted token id {}", event_field(&receipt, "tokenId"));
        }
        "owned" => {
            let hub = NftHub::from_config(&config.contracts, &mut resolver).await?;
            let owner = address_or_signer(sub, &client)?;
            let tokens = hub.owned_by(&client, owner).await?;
            println!("{} owns {} token(s)", owner, tokens.len());
            for token in tokens {
                println!("#{} {}", token.id, token.uri);
            }
        }
        "balance" => {
            let account = address_or_signer(sub, &client)?;
            let balance = client.balance(account).await?;
            let block = client.block_number().await?;
            println!("{} {} (block {})", format_ether(balance), symbol, block);
        }
        "predict-clone" => {
            let registry =
                AccountRegistry::from_config(&config.contracts, &network, &mut resolver).await?;
            info!("Using account registry at {}", registry.binding().address());
            println!("{}", registry.predict_next_clone(&client).await?);
        }
        "clone-account" => {
            let registry =
                AccountRegistry::from_config(&config.contracts, &network, &mut resolver).await?;
            info!("Using account registry at {}", registry.binding().address());
            let params = clone_params(sub, network.chain_id)?;
            let account = registry.account(&client, &params).await?;
            println!("Account: {}", account);
            match registry.clone_token(&client, account).await {
                Ok(token) => println!(
                    "Bound to token {} of {} on chain {}",
                    token.token_id, token.token_contract, token.chain_id
                ),
                Err(e) => info!("Account {} not readable yet: {}", account, e),
            }
        }
        "create-clone" => {
            let registry =
                AccountRegistry::from_config(&config.contracts, &network, &mut resolver).await?;
            info!("Using account registry at {}", registry.binding().address());
            let params = clone_params(sub, network.chain_id)?;
            println!("Deposit: {} {}", format_ether(registry.deposit()), symbol);
            let creation = registry.create_account(&client, &params).await?;
            println!("Predicted: {}", creation.predicted);
            report(&client, &creation.receipt)?;

            if let Some(actual) = creation.actual {
                println!("Registry reports: {}", actual);
                if creation.matches_prediction() {
                    println!("Prediction confirmed");
                } else {
                    println!("Prediction mismatch");
                }
                match registry.clone_token(&client, actual).await {
                    Ok(token) => println!(
                        "Bound to token {} of {} on chain {}",
                        token.token_id, token.token_contract, token.chain_id
                    ),
                    Err(e) => warn!("Could not read token() from {}: {}", actual, e),
                }
            }
        }
        "serve" => {
            let mut server_config = config.server.clone();
            if let Some(host) = sub.get_one::<String>("host") {
                server_config.host = host.clone();
            }
            if let Some(port) = sub.get_one::<u16>("port") {
                server_config.port = *port;
            }

            let tokens = match TokenHub::from_config(&config.contracts, &mut resolver).await {
                Ok(hub) => {
                    info!("Serving token hub at {}", hub.binding().address());
                    Some(Arc::new(hub))
                }
                Err(e) => {
                    warn!("Token routes disabled: {}", e);
                    None
                }
            };
            let nfts = match NftHub::from_config(&config.contracts, &mut resolver).await {
                Ok(hub) => {
                    info!("Serving NFT hub at {}", hub.binding().address());
                    Some(Arc::new(hub))
                }
                Err(e) => {
                    warn!("Collection routes disabled: {}", e);
                    None
                }
            };

            let state = AppState {
                client: Arc::new(client),
                tokens,
                nfts,
                currency: network.native_symbol.clone(),
            };
            return server::run_server(&server_config, state).await;
        }
        other => return Err(anyhow!("Unknown command '{}'", other)),
    }

    client.disconnect();
    Ok(())
}
