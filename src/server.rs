//! HTTP server bootstrap.
//!
//! This module wires together:
//! - configuration
//! - key custody (fatal if the master key is absent or malformed)
//! - the database connection pool and migrations
//! - the chain gateway and core services
//! - the Axum router and the optional background indexer

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use crate::accounts::AccountService;
use crate::chain::{ChainConfig, ChainGateway, RpcChainGateway};
use crate::crypto::KeyCustody;
use crate::indexer::{EventIndexer, DEFAULT_CHUNK_SIZE};
use crate::infra::{PgEventStore, PgListingStore, PgTicketStore};
use crate::issuance::TicketIssuanceService;
use crate::marketplace::MarketplaceService;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Maximum database connections.
    pub max_connections: u32,
    /// Indexer scan chunk size in blocks.
    pub indexer_chunk_size: i64,
    /// Block to scan from when the listings cache is empty.
    pub indexer_genesis_block: i64,
    /// Background indexer interval; None disables the periodic run.
    pub indexer_poll_interval: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/ticketchain".to_string());

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .expect("Invalid listen address");

        let max_connections: u32 = std::env::var("MAX_DB_CONNECTIONS")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(10);

        let indexer_chunk_size: i64 = std::env::var("INDEXER_CHUNK_SIZE")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_CHUNK_SIZE);

        let indexer_genesis_block: i64 = std::env::var("INDEXER_GENESIS_BLOCK")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(0);

        let indexer_poll_interval = std::env::var("INDEXER_POLL_SECS")
            .ok()
            .and_then(|p| p.parse().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            database_url,
            listen_addr,
            max_connections,
            indexer_chunk_size,
            indexer_genesis_block,
            indexer_poll_interval,
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub issuance: Arc<TicketIssuanceService>,
    pub marketplace: Arc<MarketplaceService>,
    pub indexer: Arc<EventIndexer>,
    pub events: PgEventStore,
    pub tickets: PgTicketStore,
    pub listings: PgListingStore,
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting ticketchain backend v{}", env!("CARGO_PKG_VERSION"));

    // Custody must be intact before anything else starts: running without
    // a working master key would strand every signing operation.
    let custody = Arc::new(
        KeyCustody::from_env().map_err(|e| anyhow::anyhow!("key custody: {e}"))?,
    );
    info!("Key custody initialized");

    let chain_config = ChainConfig::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;
    let gateway: Arc<dyn ChainGateway> = Arc::new(
        RpcChainGateway::new(chain_config).map_err(|e| anyhow::anyhow!("{e}"))?,
    );
    info!("  Minter identity: {}", gateway.minter_address());

    let config = Config::from_env();
    info!("Configuration loaded");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Max connections: {}", config.max_connections);

    info!("Connecting to PostgreSQL...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Connected to PostgreSQL");

    info!("Running database migrations...");
    crate::migrations::run_postgres(&pool).await?;
    info!("Database migrations applied");

    let accounts = Arc::new(AccountService::new(pool.clone(), custody.clone()));
    let issuance = Arc::new(TicketIssuanceService::new(
        pool.clone(),
        gateway.clone(),
        custody.clone(),
    ));
    let marketplace = Arc::new(MarketplaceService::new(
        pool.clone(),
        gateway.clone(),
        custody,
    ));
    let indexer = Arc::new(EventIndexer::new(
        pool.clone(),
        gateway,
        config.indexer_chunk_size,
        config.indexer_genesis_block,
    ));

    if let Some(interval) = config.indexer_poll_interval {
        let background = indexer.clone();
        info!("Background indexer enabled every {interval:?}");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match background.sync().await {
                    Ok(report) => info!(
                        scanned_to_block = report.scanned_to_block,
                        events_processed = report.events_processed,
                        "periodic sync complete"
                    ),
                    Err(err) => error!(error = %err, "periodic sync failed"),
                }
            }
        });
    }

    let state = AppState {
        accounts,
        issuance,
        marketplace,
        indexer,
        events: PgEventStore::new(pool.clone()),
        tickets: PgTicketStore::new(pool.clone()),
        listings: PgListingStore::new(pool),
    };

    let app = build_router()?.with_state(state);

    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    info!("Ticketchain backend is ready to accept connections");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

/// Assemble the router; state is attached by the caller.
pub fn build_router() -> anyhow::Result<Router<AppState>> {
    let mut router = Router::new()
        .nest("/api", crate::api::router())
        .nest("/internal", crate::api::internal_router())
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors_layer_from_env()? {
        router = router.layer(cors_layer);
    }

    Ok(router)
}

fn cors_layer_from_env() -> anyhow::Result<Option<CorsLayer>> {
    let origins = match std::env::var("CORS_ALLOW_ORIGINS") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let origins = origins.trim();
    if origins.is_empty() {
        return Ok(None);
    }

    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {s:?}: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ]),
    ))
}

/// Health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "service": "ticketchain",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check endpoint.
async fn readiness_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<serde_json::Value>, (axum::http::StatusCode, String)> {
    match state.events.list().await {
        Ok(_) => Ok(axum::Json(serde_json::json!({
            "status": "ready",
            "database": "connected",
        }))),
        Err(e) => Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            format!("Database unavailable: {e}"),
        )),
    }
}
