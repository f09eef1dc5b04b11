use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub host: String,
    pub port: u16,
    /// Shared secret used to verify inbound event signatures.
    pub signing_secret: String,
    /// Bearer token for outbound platform API calls.
    pub platform_token: String,
    /// Base URL of the platform Web API (overridable for tests).
    pub platform_api_base: String,
    /// Static bearer token guarding the admin surface.
    pub admin_token: String,
    /// Maximum number of bytes scanned per item; larger content is truncated.
    pub max_scan_bytes: usize,
    /// Per-pattern evaluation time budget in milliseconds.
    pub pattern_budget_ms: u64,
    /// Accepted clock skew for inbound event timestamps, in seconds.
    pub replay_window_secs: i64,
    /// Number of concurrent scan workers.
    pub worker_count: usize,
    /// Queue visibility timeout: unacked tasks are redelivered after this.
    pub visibility_timeout_secs: u64,
    /// Maximum delivery attempts before a task is dead-lettered.
    pub max_task_attempts: u32,
    /// Maximum attempts for the outbound block action.
    pub action_max_attempts: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("BACKEND_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            signing_secret: env::var("SLACK_SIGNING_SECRET")?,
            platform_token: env::var("SLACK_BOT_TOKEN")?,
            platform_api_base: env::var("SLACK_API_BASE")
                .unwrap_or_else(|_| "https://slack.com/api".to_string()),
            admin_token: env::var("ADMIN_TOKEN")?,
            max_scan_bytes: env::var("MAX_SCAN_BYTES")
                .unwrap_or_else(|_| "1048576".to_string())
                .parse()
                .unwrap_or(1_048_576),
            pattern_budget_ms: env::var("PATTERN_BUDGET_MS")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .unwrap_or(50),
            replay_window_secs: env::var("REPLAY_WINDOW_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            worker_count: env::var("WORKER_COUNT")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
            visibility_timeout_secs: env::var("VISIBILITY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            max_task_attempts: env::var("MAX_TASK_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            action_max_attempts: env::var("ACTION_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
        })
    }
}
