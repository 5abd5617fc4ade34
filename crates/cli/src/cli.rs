use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ctxpack_core::cache::LocalCacheStore;
use ctxpack_core::coordinator::Coordinator;
use ctxpack_core::oci::{RegistryCredentials, ReqwestClient};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Content-addressed artifact cache and OCI distribution tool"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the cached manifest for a URI as pretty JSON.
    Inspect { uri: String },
    /// Read a contract JSON file and seed a folder as its cached artifact.
    Seed {
        folder: PathBuf,
        #[arg(long)]
        contract: PathBuf,
    },
    /// Ensure a URI is present locally, pulling it from the registry if not.
    Pull { uri: String },
    /// Push a locally cached URI to the registry.
    Push { uri: String },
}

struct RegistryConfig {
    registry_url: String,
    repo: String,
    creds: RegistryCredentials,
    user: String,
}

impl RegistryConfig {
    fn from_env() -> Self {
        let registry_url =
            std::env::var("CTXP_REGISTRY_URL").unwrap_or_else(|_| "ghcr.io".to_string());
        let repo = std::env::var("CTXP_REPO").unwrap_or_default();
        let user = std::env::var("CTXP_USER").unwrap_or_else(|_| "rozetyp".to_string());
        let creds = RegistryCredentials::from_env();
        Self {
            registry_url,
            repo,
            creds,
            user,
        }
    }

    fn require_repo(&self) -> Result<()> {
        if self.repo.is_empty() {
            bail!("CTXP_REPO must be set");
        }
        Ok(())
    }
}

fn cache_dir() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".cache").join("ctxpack"),
        Err(_) => std::env::temp_dir().join("ctxpack-cache"),
    }
}

impl Cli {
    pub async fn dispatch(self) -> Result<()> {
        let cache = LocalCacheStore::new(cache_dir())?;
        let config = RegistryConfig::from_env();
        let client = ReqwestClient::new()?;
        let coordinator = Coordinator::new(
            cache,
            &client,
            config.registry_url.clone(),
            config.repo.clone(),
            config.creds.clone(),
            config.user.clone(),
        );

        match self.command {
            Command::Inspect { uri } => {
                let manifest = coordinator
                    .inspect(&uri)
                    .map_err(|err| anyhow::anyhow!("{err}"))?;
                println!("{}", serde_json::to_string_pretty(&manifest)?);
            }
            Command::Seed { folder, contract } => {
                let bytes = std::fs::read(&contract)
                    .with_context(|| format!("reading contract {}", contract.display()))?;
                let contract_value: serde_json::Value = serde_json::from_slice(&bytes)?;
                let uri = coordinator.seed(&contract_value, &folder)?;
                println!("Seeded: {uri}");
            }
            Command::Pull { uri } => {
                config.require_repo()?;
                let path = coordinator.pull(&uri).await?;
                println!("Artifact available at: {}", path.display());
            }
            Command::Push { uri } => {
                config.require_repo()?;
                let digest = coordinator.push(&uri).await?;
                println!("Pushed: {digest}");
            }
        }

        Ok(())
    }
}
