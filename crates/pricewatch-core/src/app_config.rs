/// Runtime configuration for the harvest pipeline, loaded from the
/// environment. Credentials are validated at startup so a bad deploy fails
/// before any store is touched.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub kroger_client_id: String,
    pub kroger_client_secret: String,
    /// API root, e.g. `https://api.kroger.com/v1`. The token endpoint is
    /// derived from it (`{base}/connect/oauth2/token`).
    pub kroger_api_base: String,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Retries after the first attempt; 4 retries means 5 attempts total.
    pub http_max_retries: u32,
    pub backoff_base_ms: u64,
    /// Tokens are refreshed this many seconds before their expiry.
    pub token_refresh_buffer_secs: u64,
    pub token_max_retries: u32,
    /// Products per API call; the API caps pages at 49.
    pub product_batch_size: usize,
    /// Catalog shards; one shard is harvested per day.
    pub shard_buckets: u32,
    /// 0 = no limit.
    pub store_limit: usize,
    /// Cap on logical API calls per run; 0 = no limit.
    pub max_requests: u64,
    pub inter_store_delay_ms: u64,
    /// Wall-clock budget for a run; 0 = none.
    pub run_deadline_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("kroger_client_id", &"[redacted]")
            .field("kroger_client_secret", &"[redacted]")
            .field("kroger_api_base", &self.kroger_api_base)
            .field("log_level", &self.log_level)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("http_max_retries", &self.http_max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field(
                "token_refresh_buffer_secs",
                &self.token_refresh_buffer_secs,
            )
            .field("token_max_retries", &self.token_max_retries)
            .field("product_batch_size", &self.product_batch_size)
            .field("shard_buckets", &self.shard_buckets)
            .field("store_limit", &self.store_limit)
            .field("max_requests", &self.max_requests)
            .field("inter_store_delay_ms", &self.inter_store_delay_ms)
            .field("run_deadline_secs", &self.run_deadline_secs)
            .finish()
    }
}
