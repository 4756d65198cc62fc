//! Developer CLI for the LegitRegistry attestation protocol.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, B256};
use clap::{Args, Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};
use secrecy::SecretString;
use url::Url;

use legitkit_core::issuer::{IssueOutcome, IssuerConfig, IssuerService};
use legitkit_core::registry::{AttestationLedger, RegistryClient};
use legitkit_core::storage::{HttpUserDirectory, HttpWalletStore, LocalWalletCache, WalletStore};
use legitkit_core::workflow::{AttestationFlow, FlowState};
use legitkit_core::Environment;

#[derive(Parser)]
#[command(name = "legitkit", about = "LegitRegistry attestation tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RegistryArgs {
    /// Registry deployment address.
    #[arg(long, env = "REGISTRY_ADDRESS")]
    registry: Address,

    /// JSON-RPC endpoint; defaults to the environment's public node.
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<Url>,

    /// Target network (sepolia or mainnet).
    #[arg(long, env = "ENVIRONMENT", default_value = "sepolia")]
    environment: String,
}

impl RegistryArgs {
    fn environment(&self) -> Result<Environment> {
        Environment::from_str(&self.environment)
            .map_err(|_| eyre!("unknown environment '{}'", self.environment))
    }

    fn rpc_url(&self) -> Result<Url> {
        match &self.rpc_url {
            Some(url) => Ok(url.clone()),
            None => Url::parse(self.environment()?.default_rpc_url())
                .wrap_err("default RPC URL unusable"),
        }
    }

    fn client(&self) -> Result<RegistryClient> {
        Ok(RegistryClient::new(self.registry, self.rpc_url()?))
    }
}

#[derive(Args)]
struct IssuerArgs {
    /// Admin signing key, hex encoded.
    #[arg(long, env = "ADMIN_PRIVATE_KEY", hide_env_values = true)]
    admin_key: String,

    /// Server-side pepper mixed into identity hashes.
    #[arg(long, env = "USER_HASH_PEPPER", hide_env_values = true)]
    pepper: String,

    /// Application name whose hash tags every claim.
    #[arg(long, env = "APP_NAME")]
    app: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the attestation status of an account.
    Status {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Account to look up.
        #[arg(long)]
        account: Address,
    },

    /// Check whether a claim nonce has been consumed.
    Nonce {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Nonce to look up, 32 bytes hex.
        #[arg(long)]
        nonce: B256,
    },

    /// Sign a claim locally and print it without submitting.
    Issue {
        #[command(flatten)]
        registry: RegistryArgs,

        #[command(flatten)]
        issuer: IssuerArgs,

        /// Identity to bind the claim to.
        #[arg(long)]
        identity: String,

        /// Account the claim vouches for.
        #[arg(long)]
        account: Address,
    },

    /// Run the full attestation flow: persist records, sign, submit.
    Attest {
        #[command(flatten)]
        registry: RegistryArgs,

        #[command(flatten)]
        issuer: IssuerArgs,

        /// Identity to bind the claim to.
        #[arg(long)]
        identity: String,

        /// Account the claim vouches for.
        #[arg(long)]
        account: Address,

        /// Base URL of the remote record store.
        #[arg(long, env = "STORE_URL")]
        store_url: String,
    },

    /// List wallet records in the local cache.
    Wallets {
        /// Only records owned by this identity.
        #[arg(long)]
        owner: Option<String>,
    },
}

fn cache_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("legitkit")
        .join("wallets.json")
}

fn issuer_service(
    registry: &RegistryArgs,
    issuer: &IssuerArgs,
    ledger: Arc<RegistryClient>,
) -> Result<IssuerService<RegistryClient>> {
    let config = IssuerConfig::new(
        issuer.app.clone(),
        registry.environment()?.chain_id(),
        registry.registry,
    );
    IssuerService::new(
        config,
        &issuer.admin_key,
        SecretString::from(issuer.pepper.clone()),
        ledger,
    )
    .wrap_err("issuer setup failed")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Status { registry, account } => {
            let status = registry.client()?.status(account).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Nonce { registry, nonce } => {
            let used = registry.client()?.nonce_used(nonce).await?;
            println!("{}", serde_json::json!({ "nonce": nonce, "used": used }));
        }
        Commands::Issue {
            registry,
            issuer,
            identity,
            account,
        } => {
            let ledger = Arc::new(registry.client()?);
            let service = issuer_service(&registry, &issuer, ledger)?;
            match service.issue(&identity, account).await? {
                IssueOutcome::Issued(signed) => {
                    println!("{}", serde_json::to_string_pretty(&signed)?);
                }
                IssueOutcome::AlreadyAttested => {
                    println!(r#"{{"alreadyAttested":true}}"#);
                }
            }
        }
        Commands::Attest {
            registry,
            issuer,
            identity,
            account,
            store_url,
        } => {
            let ledger = Arc::new(registry.client()?);
            let service = issuer_service(&registry, &issuer, Arc::clone(&ledger))?;
            let wallets = WalletStore::new(
                LocalWalletCache::open(cache_path()),
                Arc::new(HttpWalletStore::new(&store_url)),
            );
            let flow = AttestationFlow::new(
                Arc::new(service),
                ledger,
                Arc::new(wallets),
                Arc::new(HttpUserDirectory::new(&store_url)),
            );

            let state = flow.run(&identity, account, None).await?;
            match state {
                FlowState::Success { record_id, tx_ref } => {
                    println!(
                        "{}",
                        serde_json::json!({
                            "result": "attested",
                            "recordId": record_id,
                            "txRef": tx_ref,
                        })
                    );
                }
                FlowState::AlreadyAttested => {
                    println!(r#"{{"result":"alreadyAttested"}}"#);
                }
                FlowState::Failed {
                    message,
                    verify_before_retry,
                } => {
                    return Err(eyre!(
                        "attestation failed: {message} (verify before retry: {verify_before_retry})"
                    ));
                }
                other => return Err(eyre!("flow ended in unexpected state {other:?}")),
            }
        }
        Commands::Wallets { owner } => {
            let cache = LocalWalletCache::open(cache_path());
            let records = cache.list(owner.as_deref());
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}
