//! Background reconciliation of stored rows after catalog edits.
//!
//! Tasks run one at a time, oldest first. Each page of rows is patched in the
//! same database transaction that moves the task checkpoint, so a restarted
//! engine continues strictly after the last committed page.

mod interface;
mod operation;

use crate::catalog::{CatalogError, ContractCatalog};
use crate::config::Config;
use crate::db;
use crate::decoder::{AccountParser, MessageParser};
use crate::models::RescanTask;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum RescanError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

pub struct RescanEngine {
    pool: SqlitePool,
    catalog: Arc<ContractCatalog>,
    accounts: AccountParser,
    messages: MessageParser,
    select_limit: usize,
    idle_interval: Duration,
}

impl RescanEngine {
    pub fn new(
        pool: SqlitePool,
        catalog: Arc<ContractCatalog>,
        accounts: AccountParser,
        messages: MessageParser,
        config: &Config,
    ) -> Self {
        Self {
            pool,
            catalog,
            accounts,
            messages,
            select_limit: config.rescan_select_limit.max(1),
            idle_interval: config.rescan_idle_interval,
        }
    }

    /// Processes tasks until `shutdown`. The page in flight is finished first.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Starting rescan engine");
        let mut current: Option<i64> = None;

        while !shutdown.is_cancelled() {
            let idle = match self.process_next(&mut current).await {
                Ok(worked) => !worked,
                Err(e) => {
                    error!("Rescan page failed: {}", e);
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.idle_interval) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
        }

        info!("Rescan engine stopped");
    }

    /// Runs one page of the oldest unfinished task. Returns false when there
    /// is nothing to do.
    pub async fn process_next(&self, current: &mut Option<i64>) -> Result<bool, RescanError> {
        let Some(mut task) = db::rescan::get_unfinished_task(&self.pool).await? else {
            *current = None;
            return Ok(false);
        };

        if *current != Some(task.id) {
            info!(
                "Picked up rescan task {} ({}) for {} at checkpoint {:?}",
                task.id,
                task.task_type,
                task.contract_name,
                task.checkpoint()
            );
            self.catalog.invalidate().await;
            *current = Some(task.id);
        }

        self.process_page(&mut task).await?;

        if task.finished {
            info!("Finished rescan task {} ({}) for {}", task.id, task.task_type, task.contract_name);
        } else {
            debug!("Rescan task {} moved to {:?}", task.id, task.checkpoint());
        }
        Ok(true)
    }

    /// Applies the task to the next page and commits the page with the
    /// advanced checkpoint.
    pub async fn process_page(&self, task: &mut RescanTask) -> Result<(), RescanError> {
        if task.task_type.is_operation_task() {
            self.rescan_operation_page(task).await
        } else {
            self.rescan_interface_page(task).await
        }
    }

    /// Marks a task without remaining work as finished.
    async fn finish(&self, task: &mut RescanTask) -> Result<(), RescanError> {
        task.finished = true;
        let mut tx = self.pool.begin().await?;
        db::rescan::set_task(&mut tx, task).await?;
        tx.commit().await?;
        Ok(())
    }
}
