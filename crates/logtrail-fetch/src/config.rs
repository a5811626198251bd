use std::time::Duration;

/// Request timeout for a single fetch attempt
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transient failures are retried this many times beyond the first attempt
pub const DEFAULT_RETRIES: u32 = 2;

/// First backoff delay; doubles on each further attempt
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// How long a cached record set stays valid
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// How often the background sweep evicts expired entries
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Endpoint identity and retry/cache tuning for the fetch coordinator
#[derive(Clone, Debug)]
pub struct FetchConfig {
    /// Base URL of the logs service
    pub base_url: String,

    /// Path of the logs listing endpoint
    pub logs_path: String,

    /// Path of the health probe endpoint
    pub health_path: String,

    /// Client identity sent with every request
    pub client_code: String,

    /// Access key sent with every request
    pub api_key: String,

    /// Gateway used when the caller does not name one
    pub default_gateway: String,

    pub timeout: Duration,
    pub retries: u32,
    pub retry_base_delay: Duration,

    pub enable_cache: bool,
    pub cache_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            logs_path: "/v2/logs".to_string(),
            health_path: "/health".to_string(),
            client_code: String::new(),
            api_key: String::new(),
            default_gateway: String::new(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            enable_cache: true,
            cache_ttl: DEFAULT_CACHE_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl FetchConfig {
    /// Full URL of the logs listing endpoint
    pub fn logs_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.logs_path)
    }

    /// Full URL of the health probe endpoint
    pub fn health_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.health_path)
    }
}
