//! Turns fetched master blocks into committed rows: deduplication, message
//! decoding, the atomic batch write and the checkpoint.

pub mod dedup;
pub mod save;
pub mod writer;

use crate::blockchain::client::ClientError;
use crate::catalog::CatalogError;
use crate::config::Config;
use crate::db;
use crate::db::mirror::AnalyticsMirror;
use crate::decoder::MessageParser;
use crate::models::{AccountState, Block, Message, Transaction};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data would become corrupt. The process must stop.
    #[error("data consistency violation: {0}")]
    Consistency(String),

    #[error("batch was not committed within {0:?}")]
    Deadline(Duration),

    #[error("chain client error: {0}")]
    Client(#[from] ClientError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("no contract interfaces")]
    NoInterfaces,
}

/// Canonical rows of a group of master blocks, ready to be written.
#[derive(Debug, Default)]
pub struct Batch {
    pub masters: Vec<Block>,
    pub accounts: Vec<AccountState>,
    pub messages: Vec<Message>,
}

impl Batch {
    /// Master blocks followed by their shards.
    pub fn blocks(&self) -> Vec<&Block> {
        self.masters.iter().flat_map(|m| m.with_shards()).collect()
    }

    pub fn transactions(&self) -> Vec<&Transaction> {
        self.masters
            .iter()
            .flat_map(|m| m.with_shards())
            .flat_map(|b| b.transactions.iter())
            .collect()
    }

    pub fn last_seq_no(&self) -> Option<u32> {
        self.masters.iter().map(|m| m.id.seq_no).max()
    }
}

pub struct Indexer {
    pool: SqlitePool,
    parser: MessageParser,
    mirror: Option<Arc<dyn AnalyticsMirror>>,
    save_interval: Duration,
    batch_deadline: Duration,
    source_grace_master_blocks: i64,
}

impl Indexer {
    pub fn new(
        pool: SqlitePool,
        parser: MessageParser,
        mirror: Option<Arc<dyn AnalyticsMirror>>,
        config: &Config,
    ) -> Self {
        Self {
            pool,
            parser,
            mirror,
            save_interval: config.save_interval,
            batch_deadline: config.batch_deadline,
            source_grace_master_blocks: config.source_grace_master_blocks,
        }
    }

    /// First master sequence number not persisted yet.
    pub async fn start_seq_no(&self, from_block: u32) -> Result<u32, IndexerError> {
        let last = db::block::last_master_seq_no(&self.pool).await?;
        Ok(last.map_or(from_block, |seq_no| seq_no + 1))
    }

    /// Deduplicates, decodes and commits `masters` as one batch.
    pub async fn save_blocks(&self, masters: Vec<Block>) -> Result<Batch, IndexerError> {
        let accounts = dedup::unique_accounts(&masters);
        let mut messages = dedup::unique_messages(&masters);
        dedup::resolve_sources(&self.pool, &mut messages, self.source_grace_master_blocks).await?;

        self.parse_messages(&mut messages).await;

        let batch = Batch {
            masters,
            accounts,
            messages,
        };

        match tokio::time::timeout(self.batch_deadline, writer::insert_data(&self.pool, &batch)).await {
            Ok(ret) => ret?,
            Err(_) => return Err(IndexerError::Deadline(self.batch_deadline)),
        }

        if let Some(mirror) = &self.mirror {
            writer::mirror_data(mirror.as_ref(), &batch).await;
        }

        Ok(batch)
    }

    async fn parse_messages(&self, messages: &mut [Message]) {
        for msg in messages.iter_mut() {
            let src = msg.src.state.clone();
            let dst = msg.dst.state.clone();

            match self
                .parser
                .parse_message_payload(src.as_deref(), dst.as_deref(), msg)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_benign() => {}
                Err(e) => error!(
                    "Parse message {} from {:?} to {:?} with op {:#x}: {}",
                    msg.hash_hex(),
                    msg.src_address,
                    msg.dst_address,
                    msg.operation_id,
                    e
                ),
            }
        }
    }
}
