//! FollowRank Gateway
//!
//! The main entry point for the service.
//! Handles:
//! - Job triggers (ranking, last-post collection, discovery)
//! - Rank and participant queries
//! - The recurring scheduler
//! - Observability (logging, metrics)

mod handlers;
mod scheduler;

use axum::{http::StatusCode, routing::get, Router};
use followrank_common::{
    config::AppConfig,
    db::{DbPool, RankStore, Repository},
    metrics as app_metrics,
    nostr::{RelayGateway, WebSocketGateway},
};
use followrank_ranker::Jobs;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub repo: Repository,
    pub jobs: Jobs,
    pub metrics: Option<PrometheusHandle>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Initialize tracing
    init_tracing(&config);

    info!("Starting FollowRank Gateway v{}", followrank_common::VERSION);

    // Initialize metrics
    let metrics_handle = install_metrics_recorder()?;
    app_metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    db.ensure_schema().await?;
    let repo = Repository::new(db.clone());

    if let Some(seed_file) = &config.database.seed_file {
        repo.import_seed_file(seed_file, chrono::Utc::now().date_naive()).await?;
    }

    // Relay gateway and background jobs
    let relay: Arc<dyn RelayGateway> = Arc::new(WebSocketGateway::new(&config.relay)?);
    let store: Arc<dyn RankStore> = Arc::new(repo.clone());
    let jobs = Jobs::new(store, relay, &config);

    // Scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = scheduler::spawn(jobs.clone(), &config.schedule, shutdown_rx);

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        repo,
        jobs,
        metrics: Some(metrics_handle),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the scheduler; a run in progress gets the shutdown timeout to finish
    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler {
        if tokio::time::timeout(config.shutdown_timeout(), handle).await.is_err() {
            tracing::warn!("Scheduler did not stop within the shutdown timeout");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Install the Prometheus recorder with histogram buckets
fn install_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("relay_request_duration_seconds".to_string()),
            app_metrics::RELAY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("job_duration_seconds".to_string()),
            app_metrics::RUN_BUCKETS,
        )?
        .install_recorder()
}

/// Requests running past `limit` are answered with 408
fn request_timeout_layer(limit: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, limit)
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = request_timeout_layer(state.config.request_timeout());

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        // Job triggers
        .route("/calculate-pagerank", get(handlers::jobs::calculate_pagerank))
        .route("/collect-last-posts", get(handlers::jobs::collect_last_posts))
        .route("/collect-japanese-users", get(handlers::jobs::collect_japanese_users))
        .route("/runs/status", get(handlers::jobs::run_status))
        // Rank queries
        .route("/popular-users", get(handlers::ranks::popular_users))
        .route("/popular-users-pubkey", get(handlers::ranks::popular_users_pubkey))
        .route("/isolated-users", get(handlers::ranks::isolated_users))
        .route("/isolated-users-pubkey", get(handlers::ranks::isolated_users_pubkey))
        // Participant queries
        .route("/new-users", get(handlers::participants::new_users))
        .route("/new-users-pubkey", get(handlers::participants::new_users_pubkey))
        // Activity queries
        .route("/last-posts", get(handlers::posts::last_posts))
        .route("/recent-isolated-users", get(handlers::posts::recent_isolated_users))
        .route("/recent-isolated-users-pubkey", get(handlers::posts::recent_isolated_users_pubkey))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(request_id)
                .layer(propagate_id)
                .layer(timeout),
        )
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use followrank_common::config::DatabaseConfig;
    use followrank_common::errors::Result;
    use followrank_common::nostr::{Event, EventStream, Filter};
    use tower::ServiceExt;

    /// Relay that knows no events
    pub struct EmptyRelay;

    #[async_trait]
    impl RelayGateway for EmptyRelay {
        async fn fetch_latest(&self, _filter: Filter, _limit: usize) -> Result<Vec<Event>> {
            Ok(Vec::new())
        }

        async fn fetch_stream(&self, _filter: Filter) -> Result<EventStream> {
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    /// Relay that never answers
    pub struct StalledRelay;

    #[async_trait]
    impl RelayGateway for StalledRelay {
        async fn fetch_latest(&self, _filter: Filter, _limit: usize) -> Result<Vec<Event>> {
            std::future::pending().await
        }

        async fn fetch_stream(&self, _filter: Filter) -> Result<EventStream> {
            std::future::pending().await
        }
    }

    /// A valid encoded key
    pub const SAMPLE_NPUB: &str = "npub10elfcs4fr0l0r8af98jlmgdh9c8tcxjvz9qkw038js35mp4dma8qzvjptg";

    pub async fn test_state() -> AppState {
        test_state_with_relay(Arc::new(EmptyRelay)).await
    }

    pub async fn test_state_with_relay(relay: Arc<dyn RelayGateway>) -> AppState {
        let config = AppConfig::default();
        let db = DbPool::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            read_url: None,
            max_connections: 1,
            min_connections: 1,
            connect_timeout_secs: 5,
            idle_timeout_secs: 600,
            seed_file: None,
        })
        .await
        .unwrap();
        db.ensure_schema().await.unwrap();

        let repo = Repository::new(db.clone());
        let store: Arc<dyn RankStore> = Arc::new(repo.clone());
        let jobs = Jobs::new(store, relay, &config);

        AppState {
            config: Arc::new(config),
            db,
            repo,
            jobs,
            metrics: None,
        }
    }

    /// Wait until no background run is active
    pub async fn wait_for_jobs(state: &AppState) {
        for _ in 0..400 {
            let busy = state.jobs.ranking.status().await.running.is_some()
                || state.jobs.last_posts.status().await.running.is_some()
                || state.jobs.discovery.status().await.running.is_some();
            if !busy {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("background jobs did not finish");
    }

    /// Send a GET and return the status and JSON body
    pub async fn get_json(state: &AppState, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = create_router(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}
