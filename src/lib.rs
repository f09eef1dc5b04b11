pub mod config;
pub mod db;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod platform;
pub mod routes;
pub mod services;

use std::sync::Arc;

use sqlx::PgPool;

use crate::platform::ChatPlatform;
use crate::services::queue::TaskQueue;
use crate::services::registry::PatternRegistry;

/// Shared application state passed to Axum handlers and scan workers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: config::AppConfig,
    pub registry: Arc<PatternRegistry>,
    pub queue: TaskQueue,
    pub platform: Arc<dyn ChatPlatform>,
}
