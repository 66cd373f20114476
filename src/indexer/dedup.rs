use super::IndexerError;
use crate::db;
use crate::models::{AccountState, AccountStateId, Block, Message, MessageType};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// One state per (address, LT), ordered by that key.
pub fn unique_accounts(masters: &[Block]) -> Vec<AccountState> {
    let mut unique: BTreeMap<AccountStateId, &AccountState> = BTreeMap::new();

    for block in masters.iter().flat_map(|m| m.with_shards()) {
        for tx in &block.transactions {
            if let Some(state) = &tx.account {
                unique.entry(state.id()).or_insert(state.as_ref());
            }
        }
    }

    unique.into_values().cloned().collect()
}

/// One message per hash with both observed sides merged in.
pub fn unique_messages(masters: &[Block]) -> Vec<Message> {
    let mut unique: HashMap<&[u8], Message> = HashMap::new();

    for block in masters.iter().flat_map(|m| m.with_shards()) {
        for msg in block.transactions.iter().flat_map(|tx| tx.messages()) {
            unique
                .entry(msg.hash.as_slice())
                .and_modify(|canonical| canonical.merge(msg))
                .or_insert_with(|| msg.clone());
        }
    }

    let mut messages: Vec<Message> = unique.into_values().collect();
    sort_messages(&mut messages);
    messages
}

/// Persisted order: creation LT, then hash.
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by(|a, b| (a.created_lt, &a.hash).cmp(&(b.created_lt, &b.hash)));
}

fn needs_source(msg: &Message) -> bool {
    msg.msg_type == MessageType::Internal && !msg.src.is_observed() && msg.dst.is_observed()
}

/// Completes internal messages whose source transaction was committed by an
/// earlier batch. Masterchain-only messages still lacking a source are kept
/// as they are. Others are dropped while fewer than `grace_master_blocks`
/// master blocks are stored and fail the batch afterwards.
pub async fn resolve_sources(
    pool: &SqlitePool,
    messages: &mut Vec<Message>,
    grace_master_blocks: i64,
) -> Result<(), IndexerError> {
    let hashes: Vec<Vec<u8>> = messages
        .iter()
        .filter(|m| needs_source(m))
        .map(|m| m.hash.clone())
        .collect();
    if hashes.is_empty() {
        return Ok(());
    }

    let stored: HashMap<Vec<u8>, Message> = db::message::get_messages(pool, &hashes)
        .await?
        .into_iter()
        .map(|m| (m.hash.clone(), m))
        .collect();

    for msg in messages.iter_mut().filter(|m| needs_source(m)) {
        let Some(source) = stored.get(&msg.hash) else {
            continue;
        };
        let mut src = source.src.clone();
        if let (Some(address), true) = (msg.src_address, src.is_observed()) {
            src.state = db::account::get_state_at(pool, &address, src.tx_lt)
                .await?
                .map(Arc::new);
        }
        msg.src.absorb(&src);
    }

    // Masterchain-only messages may lack their source for good
    let unresolved = |m: &Message| needs_source(m) && !m.is_masterchain_only();

    let missing = messages.iter().filter(|m| unresolved(m)).count();
    if missing == 0 {
        return Ok(());
    }

    let master_blocks = db::block::count_master_blocks(pool).await?;
    if master_blocks >= grace_master_blocks {
        let msg = messages.iter().find(|m| unresolved(m));
        return Err(IndexerError::Consistency(match msg {
            Some(m) => format!(
                "unknown source of message {} with dst tx {} on block ({}, {:x}, {}) from {:?} to {:?}",
                m.hash_hex(),
                hex::encode(&m.dst.tx_hash),
                m.dst.workchain,
                m.dst.shard,
                m.dst.block_seq_no,
                m.src_address,
                m.dst_address
            ),
            None => format!("{missing} messages without source"),
        }));
    }

    messages.retain(|m| {
        if !unresolved(m) {
            return true;
        }
        debug!(
            "Cannot find source of message {} from {:?} to {:?}, dropping it",
            m.hash_hex(),
            m.src_address,
            m.dst_address
        );
        false
    });

    Ok(())
}
