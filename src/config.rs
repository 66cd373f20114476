// Indexer configuration, read from the environment (and `.env` if present):
// - database connection strings (relational + optional analytics mirror)
// - chain endpoints and starting master seqno
// - worker count, save tick and per-batch deadline
// - catalog cache settings
// - rescan paging and idle polling
// - chain client retry and rate limiting

use dotenv::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub analytics_database_url: Option<String>,
    pub chain_endpoints: Vec<String>,
    pub from_block: u32,
    pub workers: usize,
    pub save_interval: Duration,
    pub batch_deadline: Duration,
    pub cache_ttl: Duration,
    pub cache_max_capacity: u64,
    pub source_grace_master_blocks: i64,
    pub rescan_select_limit: usize,
    pub rescan_idle_interval: Duration,
    pub rpc_retry_attempts: usize,
    pub rpc_retry_delay: Duration,
    pub rpc_rate_limit: Option<u32>,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:indexer.db".to_string());
        let analytics_database_url = env::var("ANALYTICS_DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let chain_endpoints = env::var("CHAIN_ENDPOINTS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            database_url,
            analytics_database_url,
            chain_endpoints,
            from_block: env_or("FROM_BLOCK", 1),
            workers: env_or("WORKERS", num_cpus::get()).max(1),
            save_interval: Duration::from_millis(env_or("SAVE_INTERVAL_MS", 100)),
            batch_deadline: Duration::from_secs(env_or("BATCH_DEADLINE_SECS", 60)),
            cache_ttl: Duration::from_secs(env_or("CACHE_TTL", 300)),
            cache_max_capacity: env_or("CACHE_MAX_CAPACITY", 1000),
            source_grace_master_blocks: env_or("SOURCE_GRACE_MASTER_BLOCKS", 1000),
            rescan_select_limit: env_or("RESCAN_SELECT_LIMIT", 1000).max(1),
            rescan_idle_interval: Duration::from_secs(env_or("RESCAN_IDLE_SECS", 5)),
            rpc_retry_attempts: env_or("RPC_RETRY_ATTEMPTS", 5),
            rpc_retry_delay: Duration::from_millis(env_or("RPC_RETRY_DELAY_MS", 500)),
            rpc_rate_limit: env::var("RPC_RATE_LIMIT").ok().and_then(|v| v.parse().ok()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            analytics_database_url: None,
            chain_endpoints: Vec::new(),
            from_block: 1,
            workers: 4,
            save_interval: Duration::from_millis(100),
            batch_deadline: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(300),
            cache_max_capacity: 1000,
            source_grace_master_blocks: 1000,
            rescan_select_limit: 1000,
            rescan_idle_interval: Duration::from_secs(5),
            rpc_retry_attempts: 5,
            rpc_retry_delay: Duration::from_millis(500),
            rpc_rate_limit: None,
        }
    }
}
