use crate::blockchain::client::{ChainClient, RetryClient};
use crate::catalog::ContractCatalog;
use crate::config::Config;
use crate::db::connection::{establish_connection, establish_mirror_connection};
use crate::db::mirror::{AnalyticsMirror, SqliteMirror};
use crate::decoder::{AccountParser, CellCodec, MessageParser};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// Components shared by the fetcher, the save loop and the rescan engine.
pub struct AppState {
    pub config: Config,
    pub db_pool: SqlitePool,
    pub catalog: Arc<ContractCatalog>,
    pub client: Arc<dyn ChainClient>,
    pub mirror: Option<Arc<dyn AnalyticsMirror>>,
}

impl AppState {
    pub async fn new(
        config: Config,
        client: Arc<dyn ChainClient>,
        codec: Arc<dyn CellCodec>,
    ) -> Result<Self, sqlx::Error> {
        let db_pool = establish_connection(&config.database_url).await?;
        info!("Database connection established");

        let mirror: Option<Arc<dyn AnalyticsMirror>> = match &config.analytics_database_url {
            Some(url) => {
                let pool = establish_mirror_connection(url).await?;
                info!("Analytics mirror connection established");
                Some(Arc::new(SqliteMirror::new(pool)))
            }
            None => None,
        };

        let catalog = Arc::new(ContractCatalog::new(
            db_pool.clone(),
            codec,
            config.cache_max_capacity,
            config.cache_ttl,
        ));
        info!(
            "Catalog cache initialized with TTL: {:?} and capacity: {}",
            config.cache_ttl, config.cache_max_capacity
        );

        let client: Arc<dyn ChainClient> = Arc::new(RetryClient::new(client, &config));

        Ok(Self {
            config,
            db_pool,
            catalog,
            client,
            mirror,
        })
    }

    pub fn account_parser(&self) -> AccountParser {
        AccountParser::new(self.catalog.clone(), self.client.clone())
    }

    pub fn message_parser(&self) -> MessageParser {
        MessageParser::new(self.catalog.clone())
    }
}
