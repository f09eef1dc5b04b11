use std::net::SocketAddr;
use std::sync::Arc;

use leakgate::config::AppConfig;
use leakgate::platform::slack::SlackClient;
use leakgate::services::queue::TaskQueue;
use leakgate::services::registry::PatternRegistry;
use leakgate::services::worker;
use leakgate::AppState;
use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leakgate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration");

    let pool = leakgate::db::create_pool(&config.database_url, config.database_max_connections)
        .await?;
    leakgate::db::run_migrations(&pool).await?;

    let registry = Arc::new(PatternRegistry::load(pool.clone()).await?);
    let queue = TaskQueue::connect(
        &config.redis_url,
        config.visibility_timeout_secs,
        config.max_task_attempts,
    )
    .await?;
    let platform = Arc::new(SlackClient::new(
        &config.platform_api_base,
        &config.platform_token,
    )?);

    let state = AppState {
        db: pool,
        config: config.clone(),
        registry,
        queue,
        platform,
    };

    for worker_id in 0..config.worker_count {
        tokio::spawn(worker::run(state.clone(), worker_id));
    }
    tokio::spawn(worker::run_reaper(state.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(host = %addr, workers = config.worker_count, "Starting Leakgate server");

    let app = leakgate::routes::router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
