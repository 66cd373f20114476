//! Read-through cache of catalog tables using Moka

use super::keys::CatalogKey;
use crate::models::{ContractInterface, ContractOperation};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub enum CatalogEntry {
    Interfaces(Arc<Vec<ContractInterface>>),
    Operations(Arc<Vec<ContractOperation>>),
}

/// Holds the loaded catalog tables until they expire or get invalidated.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CatalogKey, CatalogEntry>,
}

impl CatalogCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub async fn interfaces(&self) -> Option<Arc<Vec<ContractInterface>>> {
        match self.get(CatalogKey::Interfaces).await {
            Some(CatalogEntry::Interfaces(interfaces)) => Some(interfaces),
            _ => None,
        }
    }

    pub async fn operations(&self) -> Option<Arc<Vec<ContractOperation>>> {
        match self.get(CatalogKey::Operations).await {
            Some(CatalogEntry::Operations(operations)) => Some(operations),
            _ => None,
        }
    }

    pub async fn insert(&self, entry: CatalogEntry) {
        let key = match &entry {
            CatalogEntry::Interfaces(_) => CatalogKey::Interfaces,
            CatalogEntry::Operations(_) => CatalogKey::Operations,
        };
        self.cache.insert(key, entry).await;
        debug!("Cached {}", key);
    }

    /// Drops every table, the next read goes to the database.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
        debug!("Invalidated catalog cache");
    }

    async fn get(&self, key: CatalogKey) -> Option<CatalogEntry> {
        let result = self.cache.get(&key).await;
        if result.is_some() {
            debug!("Cache hit for key: {}", key);
        } else {
            debug!("Cache miss for key: {}", key);
        }
        result
    }
}
