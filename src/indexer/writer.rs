use super::{Batch, IndexerError};
use crate::db;
use crate::db::mirror::AnalyticsMirror;
use sqlx::SqlitePool;
use std::time::Instant;
use tracing::{debug, warn};

/// Writes a batch atomically. Code and data blobs go first, outside the
/// transaction, everything else commits together or not at all.
pub async fn insert_data(pool: &SqlitePool, batch: &Batch) -> Result<(), IndexerError> {
    let started = Instant::now();

    db::account::add_code_data(pool, &batch.accounts).await?;

    let mut tx = pool.begin().await?;

    db::account::add_account_states(&mut tx, &batch.accounts).await?;
    debug!("AddAccountStates({}) took {:?}", batch.accounts.len(), started.elapsed());

    let mut messages: Vec<_> = batch.messages.iter().collect();
    messages.sort_by_key(|m| m.created_lt);
    db::message::add_messages(&mut tx, &messages).await?;
    debug!("AddMessages({}) took {:?}", messages.len(), started.elapsed());

    let transactions = batch.transactions();
    db::transaction::add_transactions(&mut tx, &transactions).await?;
    debug!("AddTransactions({}) took {:?}", transactions.len(), started.elapsed());

    let blocks = batch.blocks();
    db::block::add_blocks(&mut tx, &blocks).await?;
    db::account::update_latest_states(&mut tx, &batch.accounts).await?;

    tx.commit().await?;
    debug!("Committed batch in {:?}", started.elapsed());

    Ok(())
}

/// Copies a committed batch to the analytics store. Failures are logged only.
pub async fn mirror_data(mirror: &dyn AnalyticsMirror, batch: &Batch) {
    if let Err(e) = mirror.mirror_account_states(&batch.accounts).await {
        warn!("Failed to mirror {} account states: {}", batch.accounts.len(), e);
    }
    if let Err(e) = mirror.mirror_messages(&batch.messages).await {
        warn!("Failed to mirror {} messages: {}", batch.messages.len(), e);
    }
}
