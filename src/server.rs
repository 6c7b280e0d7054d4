//! HTTP server bootstrap for Box Office.
//!
//! This module wires together:
//! - configuration
//! - database connection pool and migrations
//! - the stores, the payment gateway, and the finalizer
//! - the Axum router

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use crate::checkout::{Finalizer, PaymentGateway, RestGateway};
use crate::infra::{
    BookingLedger, InventoryStore, OrderLedger, PgBookingLedger, PgInventoryStore, PgOrderLedger,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Maximum database connections.
    pub max_connections: u32,
    /// Bounded total timeout for provider calls.
    pub provider_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/boxoffice".to_string());

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

        let provider_timeout = std::env::var("PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|p| p.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Self {
            database_url,
            listen_addr,
            max_connections,
            provider_timeout,
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<dyn InventoryStore>,
    pub orders: Arc<dyn OrderLedger>,
    pub bookings: Arc<dyn BookingLedger>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub finalizer: Arc<Finalizer>,
    pub webhook_secret: String,
}

impl AppState {
    /// Assemble the state; the finalizer shares the same store handles the
    /// handlers use, so every mutation funnels through one set of
    /// primitives.
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        orders: Arc<dyn OrderLedger>,
        bookings: Arc<dyn BookingLedger>,
        gateway: Arc<dyn PaymentGateway>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        let finalizer = Arc::new(Finalizer::new(
            inventory.clone(),
            orders.clone(),
            bookings.clone(),
        ));
        Self {
            inventory,
            orders,
            bookings,
            gateway,
            finalizer,
            webhook_secret: webhook_secret.into(),
        }
    }
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Box Office v{}", env!("CARGO_PKG_VERSION"));

    // Provider configuration: without these the service cannot reconcile
    // payments, so refuse to start rather than limp.
    let provider_base_url = std::env::var("PROVIDER_BASE_URL")
        .map_err(|_| anyhow::anyhow!("PROVIDER_BASE_URL is not set"))?;
    let provider_api_key = std::env::var("PROVIDER_API_KEY")
        .map_err(|_| anyhow::anyhow!("PROVIDER_API_KEY is not set"))?;
    let webhook_secret = std::env::var("PROVIDER_WEBHOOK_SECRET")
        .map_err(|_| anyhow::anyhow!("PROVIDER_WEBHOOK_SECRET is not set"))?;

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

    let migrate_on_startup = std::env::var("DB_MIGRATE_ON_STARTUP")
        .ok()
        .map(|v| {
            !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off"
            )
        })
        .unwrap_or(true);
    if migrate_on_startup {
        info!("Running database migrations...");
        crate::migrations::run_postgres(&pool).await?;
        info!("Database migrations applied");
    } else {
        info!("DB migrations skipped (DB_MIGRATE_ON_STARTUP=0)");
    }

    let gateway = RestGateway::new(provider_base_url, provider_api_key, config.provider_timeout)
        .map_err(|e| anyhow::anyhow!("could not build provider client: {e}"))?;

    let state = AppState::new(
        Arc::new(PgInventoryStore::new(pool.clone())),
        Arc::new(PgOrderLedger::new(pool.clone())),
        Arc::new(PgBookingLedger::new(pool)),
        Arc::new(gateway),
        webhook_secret,
    );

    let app = build_router()?.with_state(state);

    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    info!("Box Office is ready to accept connections");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not install shutdown handler");
        return;
    }
    info!("Shutdown signal received, draining connections");
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

/// Build the router; state is attached by the caller.
pub fn build_router() -> anyhow::Result<Router<AppState>> {
    let mut router = Router::new()
        .nest("/api/v1", crate::api::router())
        .route("/health", get(crate::api::handlers::health::health_check))
        .route("/ready", get(crate::api::handlers::health::readiness_check))
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
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ]),
    ))
}
