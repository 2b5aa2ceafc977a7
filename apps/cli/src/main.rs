//! TunnelGate CLI
//!
//! Runs the tunnel relay and issues/inspects tokens with the same
//! `SECRET`/`SALT` the relay uses.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use tunnelgate_core::DestinationAddress;
use tunnelgate_daemon::{raise_fd_limit, TunnelServer};
use tunnelgate_settings::{Secrets, Settings};

/// TunnelGate - encrypted-destination TCP tunnel relay
#[derive(Parser)]
#[command(name = "tunnelgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay (reads SECRET and SALT from the environment)
    Serve {
        /// Settings file (JSON); defaults are used when absent
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Listen address, overriding settings and environment
        #[arg(short, long)]
        listen: Option<SocketAddr>,
    },

    /// Issue a token for a backend address (host:port)
    Token {
        address: String,
    },

    /// Decode a token and print the backend it names
    Decode {
        token: String,
    },

    /// Write a settings file with default values
    InitConfig {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tunnelgate_logging::init(cli.verbose);

    match cli.command {
        Commands::Serve { config, listen } => serve(config.as_deref(), listen).await,
        Commands::Token { address } => issue_token(&address),
        Commands::Decode { token } => decode_token(&token),
        Commands::InitConfig { path } => init_config(&path),
    }
}

async fn serve(config: Option<&Path>, listen: Option<SocketAddr>) -> Result<()> {
    let mut settings = Settings::load(config).context("Failed to load settings")?;
    if let Some(listen) = listen {
        settings.listen_addr = listen;
    }

    let secrets = Secrets::from_env().context("Failed to load SECRET/SALT")?;
    info!("Using {:?}", secrets.secret);
    let codec = secrets.into_codec();

    match raise_fd_limit(settings.max_open_files) {
        Ok(Some(limit)) => info!("Open file limit: {}", limit),
        Ok(None) => {}
        Err(e) => warn!("Failed to raise open file limit: {}", e),
    }

    let server = TunnelServer::from_settings(&settings, codec).await?;
    let stats = server.stats();

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Relay stopped: {:?}", stats.snapshot());
    Ok(())
}

fn issue_token(address: &str) -> Result<()> {
    let address: DestinationAddress = address
        .parse()
        .with_context(|| format!("Invalid address {:?}", address))?;
    let codec = Secrets::from_env()
        .context("Failed to load SECRET/SALT")?
        .into_codec();

    println!("{}", codec.encode(&address));
    Ok(())
}

fn decode_token(token: &str) -> Result<()> {
    let codec = Secrets::from_env()
        .context("Failed to load SECRET/SALT")?
        .into_codec();
    let address = codec
        .decode(token.trim().as_bytes())
        .context("Token rejected")?;

    println!("{}", address);
    Ok(())
}

fn init_config(path: &Path) -> Result<()> {
    Settings::default()
        .save_to(path)
        .with_context(|| format!("Failed to write {:?}", path))?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}
