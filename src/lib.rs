pub mod app;
pub mod blockchain;
pub mod catalog;
pub mod config;
pub mod db;
pub mod decoder;
pub mod indexer;
pub mod logging;
pub mod models;
pub mod rescan;
pub mod state;

#[cfg(test)]
pub mod tests;

// Re-export specific items for convenience
pub use blockchain::client::{ChainClient, ClientError, RetryClient};
pub use catalog::{CatalogError, ContractCatalog};
pub use config::Config;
pub use db::connection;
pub use db::mirror::{AnalyticsMirror, SqliteMirror};
pub use decoder::{CellCodec, CodecError, ParseError};
pub use indexer::{Indexer, IndexerError};
pub use rescan::{RescanEngine, RescanError};
