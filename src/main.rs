//! Secure Cache - HTTP front end for the cache policy layer
//!
//! Serves the cache operations and API key verification over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use secure_cache::api::{create_router, AppState};
use secure_cache::auth::{
    CredentialVerifier, MemoryCredentialStore, Revocations, SecretHasher, ServerSecret,
    CREDENTIALS_ENV,
};
use secure_cache::cache::bounds::MAX_TTL;
use secure_cache::cache::{CacheClient, KvStore, MemoryStore};
use secure_cache::config::Config;
use secure_cache::spawn_cleanup_task;

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration and the server secret
/// 3. Connect the backing store (Redis when configured, else in-process)
/// 4. Build the cache client and the credential verifier, loading
///    provisioned credentials from `API_KEY_CREDENTIALS`
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "secure_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Secure Cache Server");

    let config = Config::from_env();
    config.validate().context("invalid cache configuration")?;
    info!(
        "Configuration loaded: prefix={}, default_ttl={}s, max_value={}B, max_total={}B, scan_batch={}, port={}",
        config.key_prefix,
        config.default_ttl,
        config.max_value_size,
        config.max_total_size,
        config.scan_batch_size,
        config.server_port
    );

    let secret = ServerSecret::from_env().context("server secret rejected")?;
    let hasher = Arc::new(SecretHasher::new(&secret)?);
    drop(secret);

    let (store, cleanup_handle) = connect_store(&config).await?;
    let cache = CacheClient::new(store, &config)?;

    let credentials =
        MemoryCredentialStore::from_env().context("invalid provisioned credentials")?;
    if credentials.is_empty().await {
        warn!(
            "{} is not set; /auth/verify will reject every request",
            CREDENTIALS_ENV
        );
    } else {
        info!("Loaded {} provisioned credential(s)", credentials.len().await);
    }

    let verifier = CredentialVerifier::new(hasher, Arc::new(credentials))
        .with_revocations(Revocations::new(cache.clone(), MAX_TTL));

    let app = create_router(AppState::new(cache, verifier));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Picks the backing store. The in-process store gets a sweeper task.
async fn connect_store(
    config: &Config,
) -> anyhow::Result<(Arc<dyn KvStore>, Option<JoinHandle<()>>)> {
    if let Some(url) = &config.redis_url {
        #[cfg(feature = "redis")]
        {
            let store = secure_cache::cache::RedisStore::connect(url)
                .await
                .context("failed to connect to Redis")?;
            let store: Arc<dyn KvStore> = Arc::new(store);
            return Ok((store, None));
        }
        #[cfg(not(feature = "redis"))]
        {
            warn!(
                "REDIS_URL is set ({} chars) but the `redis` feature is disabled; using in-process store",
                url.len()
            );
        }
    }

    let memory = Arc::new(MemoryStore::new());
    let handle = spawn_cleanup_task(memory.clone(), config.cleanup_interval);
    info!("In-process store initialized; cleanup task started");
    let store: Arc<dyn KvStore> = memory;
    Ok((store, Some(handle)))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
}
