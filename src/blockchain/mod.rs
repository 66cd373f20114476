pub mod client;
pub mod fetcher;

// Re-exports for convenience
pub use client::{ChainClient, ClientError, RetryClient};
pub use fetcher::{Fetcher, FetcherHandle};
