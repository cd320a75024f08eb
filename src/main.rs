use axum::{
    routing::{get, post},
    Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sales_intel_api::config::Config;
use sales_intel_api::db::Database;
use sales_intel_api::enrichment::Providers;
use sales_intel_api::handlers::{self, AppState};

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool, the response
/// caches and the provider clients, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sales_intel_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // ReceitaWS response cache (24 hour TTL) - registry data is stable
    let receita_cache = Cache::builder()
        .time_to_live(Duration::from_secs(86400))
        .max_capacity(50_000)
        .build();
    tracing::info!("ReceitaWS cache initialized (24h TTL, 50k capacity)");

    // Website scan cache (1 hour TTL) - avoids refetching recently scanned domains
    let scan_cache = Cache::builder()
        .time_to_live(Duration::from_secs(3600))
        .max_capacity(10_000)
        .build();
    tracing::info!("Website scan cache initialized (1h TTL, 10k capacity)");

    let providers = Arc::new(Providers::new(&config));
    tracing::info!("✓ Provider clients initialized");

    let app_state = AppState {
        pool: db.pool.clone(),
        config: Arc::new(config.clone()),
        providers,
        http: reqwest::Client::new(),
        receita_cache,
        scan_cache,
    };

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/companies/smart-search", post(handlers::smart_search))
        .route("/api/v1/companies/:id", get(handlers::get_company))
        .route(
            "/api/v1/companies/:id/scan-website",
            post(handlers::scan_website),
        )
        .route("/api/v1/companies/:id/enrich", post(handlers::enrich))
        .route(
            "/api/v1/companies/:id/maturity-score",
            post(handlers::maturity_score),
        )
        .route("/api/v1/outreach/message", post(handlers::outreach_message))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting for the platform prober
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
