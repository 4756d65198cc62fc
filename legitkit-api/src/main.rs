//! Binary entry point: configures the issuer and registry client from the
//! environment and serves the API.

use std::str::FromStr;
use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::Address;
use secrecy::SecretString;
use url::Url;

use legitkit_api::auth::AuthConfig;
use legitkit_api::AppState;
use legitkit_core::issuer::{IssuerConfig, IssuerService};
use legitkit_core::registry::RegistryClient;
use legitkit_core::{Environment, Error};

struct Config {
    port: u16,
    auth_token: Option<String>,
    app_name: String,
    chain_id: u64,
    rpc_url: Url,
    registry_address: Address,
    admin_key: String,
    pepper: SecretString,
}

fn required_var(name: &str) -> Result<String, Error> {
    std::env::var(name).map_err(|_| Error::Configuration {
        error: format!("{name} is not set"),
    })
}

impl Config {
    fn from_env() -> Result<Self, Error> {
        let environment = std::env::var("ENVIRONMENT")
            .ok()
            .map(|raw| {
                Environment::from_str(&raw).map_err(|_| Error::Configuration {
                    error: format!("unknown ENVIRONMENT '{raw}'"),
                })
            })
            .transpose()?
            .unwrap_or(Environment::Sepolia);

        let chain_id = match std::env::var("CHAIN_ID") {
            Ok(raw) => raw.parse().map_err(|_| Error::Configuration {
                error: format!("CHAIN_ID '{raw}' is not a number"),
            })?,
            Err(_) => environment.chain_id(),
        };

        let rpc_url = std::env::var("RPC_URL")
            .unwrap_or_else(|_| environment.default_rpc_url().to_string());
        let rpc_url = Url::parse(&rpc_url).map_err(|err| Error::Configuration {
            error: format!("RPC_URL unusable: {err}"),
        })?;

        let registry_address = required_var("REGISTRY_ADDRESS")?
            .parse()
            .map_err(|err| Error::Configuration {
                error: format!("REGISTRY_ADDRESS unusable: {err}"),
            })?;

        Ok(Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(8080),
            auth_token: std::env::var("AUTH_TOKEN").ok(),
            app_name: required_var("APP_NAME")?,
            chain_id,
            rpc_url,
            registry_address,
            admin_key: required_var("ADMIN_PRIVATE_KEY")?,
            pepper: SecretString::from(required_var("USER_HASH_PEPPER")?),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().map_err(|err| {
        tracing::error!(%err, "configuration invalid");
        err
    })?;

    let submitter: PrivateKeySigner = config.admin_key.trim().parse().map_err(|err| {
        tracing::error!("ADMIN_PRIVATE_KEY unusable: {err}");
        Error::Configuration {
            error: "ADMIN_PRIVATE_KEY unusable".to_string(),
        }
    })?;

    let ledger = Arc::new(RegistryClient::with_submitter(
        config.registry_address,
        config.rpc_url.clone(),
        submitter,
    ));
    let issuer = IssuerService::new(
        IssuerConfig::new(config.app_name, config.chain_id, config.registry_address),
        &config.admin_key,
        config.pepper,
        Arc::clone(&ledger),
    )?;

    if config.auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN is not set; the API will accept unauthenticated requests");
    }

    let state = AppState {
        issuer: Arc::new(issuer),
        ledger,
    };
    let app = legitkit_api::app(
        state,
        AuthConfig {
            token: config.auth_token,
        },
    );

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("legitkit API listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
