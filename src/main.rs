mod commands;
mod config;
mod error;
mod ethereum;
mod hubs;
mod server;

use anyhow::Result;
use config::Config;
use error::ClientError;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let matches = commands::cli().get_matches();

    // Handle special commands first
    if matches.get_flag("generate-config") {
        println!("{}", Config::generate_sample());
        return Ok(());
    }

    if matches.get_flag("config-path") {
        match Config::default_config_path() {
            Ok(path) => {
                println!("{}", path.display());
                return Ok(());
            }
            Err(e) => {
                error!("Could not determine default config path: {}", e);
                return Err(e);
            }
        }
    }

    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let network = matches.get_one::<String>("network").map(|s| s.as_str());
    let mut config = Config::load_or_default(config_path, network).await;

    // --rpc-url wins over file and environment

    if let Some(rpc_url) = matches.get_one::<String>("rpc-url") {
        if let Some(network_config) = config.networks.get_mut(&config.default_network) {
            network_config.rpc_url = rpc_url.clone();
        }
    }

    info!("Network: {}", config.default_network);

    let signer = match commands::resolve_signer(&matches, &config) {
        Ok(signer) => signer,
        Err(e) => {
            error!(kind = e.kind(), "{}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = commands::dispatch(&matches, config, signer).await {
        match e.downcast_ref::<ClientError>() {
            Some(client_error) => error!(kind = client_error.kind(), "{}", client_error),
            None => error!("{}", e),
        }
        return Err(e);
    }

    Ok(())
}
