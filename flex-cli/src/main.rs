//! flex-cli: marketplace asset management for the Build API.
//!
//! # Usage
//!
//! ```bash
//! # Store an API key
//! flex-cli login --api-key <KEY>
//!
//! # Pull the latest assets into a directory
//! flex-cli assets pull -m my-marketplace --path ./assets
//!
//! # Push local changes, deleting remote assets missing locally
//! flex-cli assets push -m my-marketplace --path ./assets --prune
//! ```

mod auth;
mod output;

use anyhow::{Context, Result};
use auth::{resolve_api_key, AuthStore, API_KEY_ENV};
use clap::{Parser, Subcommand};
use flex_client::{AssetClient, ClientConfig};
use flex_core::{AssetPull, AssetPush};
use std::path::PathBuf;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flex-cli")]
#[command(author = "Flex CLI Contributors")]
#[command(version)]
#[command(about = "Manage marketplace assets through the Build API")]
struct Cli {
    /// Build API base URL
    #[arg(long, env = "FLEX_API_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store an API key for subsequent commands
    Login {
        /// Marketplace API key
        #[arg(long)]
        api_key: String,
    },

    /// Remove the stored API key
    Logout,

    /// Pull and push marketplace assets
    #[command(subcommand)]
    Assets(AssetsCommand),
}

#[derive(Subcommand, Debug)]
enum AssetsCommand {
    /// Pull assets into a local directory
    Pull {
        /// Marketplace identifier
        #[arg(short, long)]
        marketplace: String,
        /// Local asset directory (created if missing)
        #[arg(long)]
        path: PathBuf,
        /// Version to pull (default: latest)
        #[arg(long)]
        version: Option<String>,
        /// Delete local files that are not in the pulled version
        #[arg(long)]
        prune: bool,
    },

    /// Push local changes as a new version
    Push {
        /// Marketplace identifier
        #[arg(short, long)]
        marketplace: String,
        /// Local asset directory
        #[arg(long)]
        path: PathBuf,
        /// Delete remote assets that are missing locally
        #[arg(long)]
        prune: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose)?;

    let store = AuthStore::default_location()?;

    match cli.command {
        Commands::Login { api_key } => cmd_login(&store, &api_key),
        Commands::Logout => cmd_logout(&store),
        Commands::Assets(command) => {
            let client = asset_client(cli.base_url.as_deref(), &store)?;
            match command {
                AssetsCommand::Pull {
                    marketplace,
                    path,
                    version,
                    prune,
                } => cmd_pull(client, marketplace, path, version, prune).await,
                AssetsCommand::Push {
                    marketplace,
                    path,
                    prune,
                } => cmd_push(client, marketplace, path, prune).await,
            }
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let default = if verbose {
        "flex_cli=debug,flex_core=debug,flex_client=debug"
    } else {
        "flex_cli=info"
    };
    let mut filter = EnvFilter::from_default_env();
    for directive in default.split(',') {
        filter = filter.add_directive(directive.parse::<Directive>().context("Invalid log directive")?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn asset_client(base_url: Option<&str>, store: &AuthStore) -> Result<AssetClient> {
    let mut config = ClientConfig::from_env().context("Invalid API configuration")?;
    if let Some(url) = base_url {
        config.base_url = ClientConfig::new(url)
            .context("Invalid --base-url")?
            .base_url;
    }
    config.api_key = resolve_api_key(std::env::var(API_KEY_ENV).ok(), store)?;
    tracing::debug!("Using {:?}", config);
    Ok(AssetClient::new(config)?)
}

fn cmd_login(store: &AuthStore, api_key: &str) -> Result<()> {
    store.save(api_key)?;
    tracing::debug!("Stored API key in {}", store.path().display());
    println!("Successfully logged in.");
    Ok(())
}

fn cmd_logout(store: &AuthStore) -> Result<()> {
    store.clear()?;
    println!("Successfully logged out.");
    Ok(())
}

async fn cmd_pull(
    client: AssetClient,
    marketplace: String,
    path: PathBuf,
    version: Option<String>,
    prune: bool,
) -> Result<()> {
    let (bar, progress) = output::download_progress();
    let client = client.with_progress(progress);

    let result = AssetPull::new(&client, marketplace, path)
        .version(version)
        .prune(prune)
        .pull()
        .await;
    bar.finish_and_clear();

    println!("{}", output::render_outcome(&result?));
    Ok(())
}

async fn cmd_push(client: AssetClient, marketplace: String, path: PathBuf, prune: bool) -> Result<()> {
    let outcome = AssetPush::new(&client, marketplace, path)
        .prune(prune)
        .push()
        .await?;
    println!("{}", output::render_outcome(&outcome));
    Ok(())
}
