//! Tessera node daemon.
//!
//! Builds a TLS context for every enabled endpoint, then serves gated
//! connections on the node and client ports.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tessera_node::config::trust_anchor_dir_from_env;
use tessera_node::tls::{
    accept_gated, accept_with_backoff, connect_gated, load_certs, TlsContext,
};
use tessera_node::{logging, provision_all, Config, Endpoint, NodeContexts};
use tessera_trust::Fingerprint;
use tokio::net::TcpListener;
use tokio::signal;

/// Tessera node - TLS trust establishment between nodes
#[derive(Parser)]
#[command(name = "tessera-node", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short, env = "TESSERA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start serving (default if no command given)
    Serve,

    /// Generate missing certificates for every enabled endpoint and exit
    Provision,

    /// Print the ledger fingerprint of a PEM certificate
    Fingerprint {
        /// Certificate file; the first certificate is used
        cert: PathBuf,
    },

    /// Connect once through the node-client endpoint and report the outcome
    Probe {
        /// Remote node as host:port
        target: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    logging::init(config.verbosity);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => cmd_serve(&config).await,
        Commands::Provision => cmd_provision(&config),
        Commands::Fingerprint { cert } => cmd_fingerprint(&cert),
        Commands::Probe { target } => cmd_probe(&config, &target).await,
    }
}

async fn cmd_serve(config: &Config) -> Result<()> {
    let endpoints = config.enabled_endpoints(trust_anchor_dir_from_env());
    if endpoints.is_empty() {
        tracing::warn!("TLS is off on every endpoint; nothing to serve");
        return Ok(());
    }
    let contexts = NodeContexts::build(&endpoints)?;

    if let Some(context) = contexts.node_server.clone() {
        let addr = format!("{}:{}", config.nodenetworkinterface, config.nodeport);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind node port {addr}"))?;
        tracing::info!(%addr, "Node endpoint listening");
        tokio::spawn(accept_loop(listener, context));
    }

    if let Some(context) = contexts.client_connection.clone() {
        let addr = format!("{}:{}", config.clientnetworkinterface, config.clientport);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind client port {addr}"))?;
        tracing::info!(%addr, "Client-connection endpoint listening");
        tokio::spawn(accept_loop(listener, context));
    }

    signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");
    Ok(())
}

async fn accept_loop(listener: TcpListener, context: Arc<TlsContext>) {
    loop {
        let (stream, peer) = accept_with_backoff(&context, || listener.accept()).await;

        let context = context.clone();
        tokio::spawn(async move {
            match accept_gated(&context, stream).await {
                Ok(mut tls) => {
                    tracing::debug!(endpoint = %context.endpoint(), %peer, "Connection established");
                    // The application protocol is served elsewhere; drain until close.
                    let _ = tokio::io::copy(&mut tls, &mut tokio::io::sink()).await;
                }
                Err(e) => {
                    tracing::debug!(endpoint = %context.endpoint(), %peer, error = %e, "Handshake failed");
                }
            }
        });
    }
}

fn cmd_provision(config: &Config) -> Result<()> {
    let endpoints = config.enabled_endpoints(None);
    if endpoints.is_empty() {
        println!("TLS is off on every endpoint; nothing to provision");
        return Ok(());
    }
    for (endpoint, identity) in provision_all(&endpoints)? {
        let state = if identity.generated { "generated" } else { "existing" };
        println!("{endpoint}: {} ({state})", identity.fingerprint);
    }
    Ok(())
}

fn cmd_fingerprint(cert: &std::path::Path) -> Result<()> {
    let certs = load_certs(cert)?;
    let fingerprint = Fingerprint::from_leaf(&certs)
        .with_context(|| format!("invalid certificate in {}", cert.display()))?;
    println!("{fingerprint}");
    Ok(())
}

async fn cmd_probe(config: &Config, target: &str) -> Result<()> {
    let (host, port) = target
        .rsplit_once(':')
        .context("target must be host:port")?;
    let port: u16 = port.parse().context("invalid port")?;

    let endpoint = config.endpoint(Endpoint::NodeClient, trust_anchor_dir_from_env());
    let context = Arc::new(TlsContext::build(&endpoint)?);

    match connect_gated(&context, host, port).await {
        Ok(_) => {
            println!("accepted: {target}");
            Ok(())
        }
        Err(e) => anyhow::bail!("connection to {target} failed: {e}"),
    }
}
