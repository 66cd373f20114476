use crate::config::Config;
use crate::models::{AccountState, Address, Block, BlockId, VmValue};
use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// The master block has not been produced yet.
    #[error("block {0} is not ready")]
    NotReady(u32),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}

impl ClientError {
    /// Connectivity failures worth repeating the same request for.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Access to chain history.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Master block with its shard blocks and the transactions of all of them.
    async fn get_master_block(&self, seq_no: u32) -> Result<Block, ClientError>;

    /// State of the account at the end of `block`.
    async fn get_account_state(&self, address: &Address, block: &BlockId) -> Result<AccountState, ClientError>;

    async fn run_get_method(
        &self,
        address: &Address,
        block: &BlockId,
        method: &str,
        args: &[VmValue],
    ) -> Result<Vec<VmValue>, ClientError>;
}

type RpcRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Repeats transient failures with a fixed delay and optionally limits the
/// request rate.
pub struct RetryClient {
    inner: Arc<dyn ChainClient>,
    attempts: usize,
    delay: Duration,
    rate_limiter: Option<RpcRateLimiter>,
}

impl RetryClient {
    pub fn new(inner: Arc<dyn ChainClient>, config: &Config) -> Self {
        let rate_limiter = config
            .rpc_rate_limit
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        info!(
            "Initializing chain client with {} retries every {:?}, rate limit {:?}",
            config.rpc_retry_attempts, config.rpc_retry_delay, config.rpc_rate_limit
        );

        Self {
            inner,
            attempts: config.rpc_retry_attempts,
            delay: config.rpc_retry_delay,
            rate_limiter,
        }
    }

    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.attempts)
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
    }
}

fn log_retry(request: &str) -> impl Fn(&ClientError, Duration) + '_ {
    move |e, delay| warn!("Retrying {} in {:?} after error: {}", request, delay, e)
}

#[async_trait]
impl ChainClient for RetryClient {
    async fn get_master_block(&self, seq_no: u32) -> Result<Block, ClientError> {
        (|| async {
            self.throttle().await;
            self.inner.get_master_block(seq_no).await
        })
        .retry(self.backoff())
        .when(ClientError::is_transient)
        .notify(log_retry("get_master_block"))
        .await
    }

    async fn get_account_state(&self, address: &Address, block: &BlockId) -> Result<AccountState, ClientError> {
        (|| async {
            self.throttle().await;
            self.inner.get_account_state(address, block).await
        })
        .retry(self.backoff())
        .when(ClientError::is_transient)
        .notify(log_retry("get_account_state"))
        .await
    }

    async fn run_get_method(
        &self,
        address: &Address,
        block: &BlockId,
        method: &str,
        args: &[VmValue],
    ) -> Result<Vec<VmValue>, ClientError> {
        (|| async {
            self.throttle().await;
            self.inner.run_get_method(address, block, method, args).await
        })
        .retry(self.backoff())
        .when(ClientError::is_transient)
        .notify(log_retry("run_get_method"))
        .await
    }
}
