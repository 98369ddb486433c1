use std::net::SocketAddr;
use std::sync::Arc;

use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lead_qualification_api::api;
use lead_qualification_api::config::{Config, StorageBackend};
use lead_qualification_api::db::Database;
use lead_qualification_api::db_storage::PgStorage;
use lead_qualification_api::handlers::AppState;
use lead_qualification_api::storage::MemoryStorage;

/// Main entry point for the application.
///
/// Initializes logging, loads configuration, connects the selected storage
/// backend, and serves the API with CORS, tracing and per-IP rate limiting.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_qualification_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let app_state = match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for postgres storage"))?;
            let db = Database::new(url, config.db_max_connections).await?;
            tracing::info!("Database connection pool established");

            let storage = Arc::new(PgStorage::new(db.pool.clone()));
            AppState::new(config.clone(), storage.clone(), storage)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            let storage = Arc::new(MemoryStorage::new());
            AppState::new(config.clone(), storage.clone(), storage)
        }
    };
    tracing::info!(
        "Analytics cache initialized ({}s TTL)",
        config.analytics_cache_ttl_secs
    );

    // Per-IP rate limiter for the API group
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );

    let protected_routes = api::api_routes().layer(GovernorLayer {
        config: governor_conf,
    });

    // Health check bypasses rate limiting
    let app = api::app(Arc::new(app_state), protected_routes);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
