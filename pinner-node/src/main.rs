//! Pinner Node Main Program
//!
//! Implements the complete task-node process:
//! 1. Load configuration and identity keys
//! 2. Optionally download and supervise the Kubo storage daemon
//! 3. Execute proof-generation rounds (single-shot or periodic)
//! 4. Audit peer submissions on demand
//! 5. Expose the manual pin/add/get HTTP routes

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use pinner_node::audit::AuditVerifier;
use pinner_node::config::{load_config, validate_config};
use pinner_node::identity::KeystoreIdentity;
use pinner_node::ipfs_client::IpfsClient;
use pinner_node::keystore::Keystore;
use pinner_node::kubo::KuboSupervisor;
use pinner_node::proof::ProofBuilder;
use pinner_node::round_store::{FileRoundStore, RoundStore};
use pinner_node::routes::{router, AppState};
use pinner_node::types::NodeConfig;

/// Key under which the periodic round counter is persisted
const ROUND_COUNTER_KEY: &str = "round";

/// Decentralized pinning task node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Execute a single proof-generation round with this round number
    #[arg(short, long)]
    round: Option<u64>,

    /// Audit the submission stored in this file (requires --round and --submitter)
    #[arg(long)]
    audit_file: Option<PathBuf>,

    /// Submitter public key for audit mode
    #[arg(long)]
    submitter: Option<String>,

    /// Run in serve mode (HTTP routes + periodic rounds)
    #[arg(short, long, default_value_t = false)]
    serve: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Initialize logging
    init_logging(&args.log_level)?;

    info!("🚀 Starting Pinner Node v{}", env!("CARGO_PKG_VERSION"));
    info!("──────────────────────────────────────────────");

    // 2. Load and validate configuration
    let config = load_configuration(&args.config)?;
    validate_config(&config).context("Invalid configuration")?;

    info!("   - IPFS API: {}", config.ipfs_api_url);
    info!("   - IPFS Gateway: {}", config.ipfs_gateway_url);
    info!("   - Round interval: {} seconds", config.round_interval_secs);

    // 3. Load or generate identity keys
    let keystore = Keystore::load_or_generate(Path::new(&config.keystore_path))
        .context("Failed to initialize keystore")?;
    info!("✅ Identity keystore ready");

    // 4. Wire up collaborators
    let ipfs = Arc::new(IpfsClient::with_config(
        config.ipfs_api_url.clone(),
        config.ipfs_gateway_url.clone(),
        config.api_timeout_secs,
        config.gateway_timeout_secs,
    ));
    let identity = Arc::new(KeystoreIdentity::new(&keystore));
    let store = Arc::new(FileRoundStore::new(config.store_path.clone()));

    // 5. Run based on mode
    if let Some(audit_file) = args.audit_file {
        let round = args
            .round
            .context("--audit-file requires --round <N>")?;
        let submitter = args
            .submitter
            .context("--audit-file requires --submitter <KEY>")?;

        run_audit(ipfs, identity, store, &config, &audit_file, round, &submitter).await?;
    } else if let Some(round) = args.round {
        let builder = ProofBuilder::new(ipfs, identity, store);
        builder.execute(round).await;
    } else if args.serve {
        run_serve_mode(config, ipfs, identity, store).await?;
    } else {
        error!("❌ No operation mode specified");
        error!("   Use --round <N> for a single proof-generation round");
        error!("   Use --audit-file <F> --round <N> --submitter <KEY> to audit");
        error!("   Use --serve to start serve mode");
        std::process::exit(1);
    }

    info!("👋 Pinner node shutting down gracefully");
    Ok(())
}

/// Initialize logging system
fn init_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("⚠️  Unknown log level: {}, using INFO", log_level);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    Ok(())
}

/// Load configuration file, falling back to defaults when absent
fn load_configuration(config_path: &Path) -> Result<NodeConfig> {
    info!("📋 Loading configuration: {}", config_path.display());

    if !config_path.exists() {
        warn!("Configuration file does not exist, using defaults");
        return Ok(NodeConfig::default());
    }

    load_config(config_path).context("Failed to load configuration")
}

/// Audit a submission read from disk
async fn run_audit(
    ipfs: Arc<IpfsClient>,
    identity: Arc<KeystoreIdentity>,
    store: Arc<FileRoundStore>,
    config: &NodeConfig,
    audit_file: &Path,
    round: u64,
    submitter: &str,
) -> Result<()> {
    info!("──────────────────────────────────────────────");
    info!("🔍 Audit Mode");
    info!("   Submission: {}", audit_file.display());
    info!("   Round: {}, Submitter: {}", round, submitter);
    info!("──────────────────────────────────────────────");

    let submission = tokio::fs::read_to_string(audit_file)
        .await
        .with_context(|| format!("Failed to read {}", audit_file.display()))?;

    let verifier = AuditVerifier::new(ipfs, identity, store, config.peer_timeout_secs);
    let verdict = verifier.audit(&submission, round, submitter).await;

    info!(
        "   Verdict: {}",
        if verdict { "✅ ACCEPT" } else { "❌ REJECT" }
    );

    if !verdict {
        std::process::exit(1);
    }

    Ok(())
}

/// Serve mode: HTTP routes + periodic rounds + optional Kubo supervision
async fn run_serve_mode(
    config: NodeConfig,
    ipfs: Arc<IpfsClient>,
    identity: Arc<KeystoreIdentity>,
    store: Arc<FileRoundStore>,
) -> Result<()> {
    info!("──────────────────────────────────────────────");
    info!("🔄 Serve Mode");
    info!("   Listening on: {}", config.listen_addr);
    info!("──────────────────────────────────────────────");

    // Optionally bring up the storage daemon under supervision
    let mut kubo = if config.manage_daemon {
        let mut supervisor = KuboSupervisor::ensure_binary(
            Path::new(&config.kubo_binary_dir),
            &config.kubo_release_base,
        )
        .await
        .context("Failed to prepare Kubo binary")?;
        supervisor.start().context("Failed to start Kubo daemon")?;
        info!("✅ Kubo daemon supervised");
        Some(supervisor)
    } else {
        info!("ℹ️  Expecting an externally managed storage daemon");
        None
    };

    // Structured shutdown signal
    let shutdown = setup_shutdown_handler();

    // HTTP route layer
    let state = AppState {
        ipfs: ipfs.clone(),
        store: store.clone(),
    };
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router(state))
            .with_graceful_shutdown(async move { server_shutdown.notified().await })
            .await;
        if let Err(e) = result {
            error!("HTTP server error: {}", e);
        }
    });

    // Periodic proof-generation rounds
    let builder = ProofBuilder::new(ipfs, identity, store.clone());
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_secs(config.round_interval_secs));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let round = next_round(store.as_ref()).await;
                info!("⏰ Executing periodic round {}", round);
                builder.execute(round).await;

                if let Err(e) = store.set(ROUND_COUNTER_KEY, &round.to_string()).await {
                    error!("Failed to persist round counter: {}", e);
                }
            }

            _ = shutdown.notified() => {
                info!("Received shutdown signal, stopping serve mode");
                break;
            }
        }
    }

    server.await.ok();

    if let Some(supervisor) = kubo.as_mut() {
        supervisor.shutdown().await;
    }

    Ok(())
}

/// Next round number, continuing from the persisted counter
async fn next_round(store: &FileRoundStore) -> u64 {
    let last = match store.get(ROUND_COUNTER_KEY).await {
        Ok(Some(text)) => text.trim().parse().unwrap_or(0),
        Ok(None) => 0,
        Err(e) => {
            warn!("Failed to read round counter, restarting from 0: {}", e);
            0
        }
    };
    last + 1
}

/// Setup graceful shutdown handler
fn setup_shutdown_handler() -> Arc<tokio::sync::Notify> {
    let shutdown = Arc::new(tokio::sync::Notify::new());
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("🛑 Received Ctrl+C signal, preparing to shutdown...");
                shutdown_clone.notify_waiters();
            }
            Err(err) => {
                error!("❌ Cannot listen to shutdown signal: {}", err);
            }
        }
    });

    shutdown
}
