//! tests/persistence_tests.rs - Batch writes, latest state pointers, checkpoint and mirror

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::db;
    use crate::db::connection::establish_mirror_connection;
    use crate::db::mirror::{AnalyticsMirror, SqliteMirror};
    use crate::decoder::MessageParser;
    use crate::indexer::{Indexer, IndexerError};
    use crate::tests::fixtures::{address, block_id, master_block, setup, state, test_config, transfer_pair};
    use sqlx::SqlitePool;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn setup_indexer() -> (SqlitePool, Indexer) {
        let (pool, catalog) = setup().await;
        let indexer = Indexer::new(pool.clone(), MessageParser::new(catalog), None, &test_config());
        (pool, indexer)
    }

    #[tokio::test]
    async fn test_latest_state_keeps_highest_lt() {
        let (pool, _catalog) = setup().await;

        // Commits arrive out of LT order
        for lt in [5, 3, 9] {
            let mut tx = pool.begin().await.unwrap();
            db::account::update_latest_states(&mut tx, &[state(address(1), lt, block_id(1))])
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        let latest = db::account::get_latest_state(&pool, &address(1)).await.unwrap().unwrap();
        assert_eq!(latest.last_tx_lt, 9);
    }

    #[tokio::test]
    async fn test_batch_persists_one_row_per_message() {
        let (pool, indexer) = setup_indexer().await;

        let (sender, receiver) = transfer_pair(7, (address(1), 10, 1), (address(2), 20, 1));
        let batch = indexer.save_blocks(vec![master_block(1, vec![sender, receiver])]).await.unwrap();
        assert_eq!(batch.messages.len(), 1);
        assert_eq!(batch.accounts.len(), 2);

        let stored = db::message::get_messages(&pool, &[vec![7; 32]]).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].src.tx_lt, 10);
        assert_eq!(stored[0].dst.tx_lt, 20);
        assert_eq!(stored[0].dst.block_seq_no, 1);

        assert_eq!(db::transaction::count_transactions(&pool).await.unwrap(), 2);
        let history = db::transaction::get_transactions(&pool, &address(2), 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].lt, 20);
        assert_eq!(history[0].block, block_id(1));
        assert_eq!(db::block::last_master_seq_no(&pool).await.unwrap(), Some(1));
        assert_eq!(
            db::account::get_latest_state(&pool, &address(2)).await.unwrap().unwrap().last_tx_lt,
            20
        );
    }

    #[tokio::test]
    async fn test_batch_past_deadline_is_not_committed() {
        let (pool, catalog) = setup().await;
        let config = Config {
            batch_deadline: Duration::from_millis(100),
            ..test_config()
        };
        let indexer = Indexer::new(pool.clone(), MessageParser::new(catalog), None, &config);

        // The only connection stays busy past the deadline
        let held = pool.begin().await.unwrap();
        let err = indexer.save_blocks(vec![master_block(1, vec![])]).await.unwrap_err();
        assert!(matches!(err, IndexerError::Deadline(d) if d == Duration::from_millis(100)));
        held.rollback().await.unwrap();

        assert_eq!(db::block::last_master_seq_no(&pool).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_later_side_never_resets_stored_side() {
        let (pool, indexer) = setup_indexer().await;

        let (sender, receiver) = transfer_pair(7, (address(1), 10, 1), (address(2), 20, 2));
        indexer.save_blocks(vec![master_block(1, vec![sender])]).await.unwrap();
        indexer.save_blocks(vec![master_block(2, vec![receiver])]).await.unwrap();

        let stored = db::message::get_messages(&pool, &[vec![7; 32]]).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].src.tx_lt, 10);
        assert_eq!(stored[0].src.block_seq_no, 1);
        assert_eq!(stored[0].dst.tx_lt, 20);
        assert_eq!(stored[0].dst.block_seq_no, 2);
    }

    #[tokio::test]
    async fn test_save_loop_commits_and_returns_checkpoint() {
        let (pool, indexer) = setup_indexer().await;
        let (sender, receiver) = mpsc::channel(4);

        let (out_tx, in_tx) = transfer_pair(7, (address(1), 10, 1), (address(2), 20, 2));
        sender.send(master_block(1, vec![out_tx])).await.unwrap();
        sender.send(master_block(2, vec![in_tx])).await.unwrap();
        drop(sender);

        let checkpoint = indexer.save_loop(receiver, None).await.unwrap();

        assert_eq!(checkpoint, Some(2));
        assert_eq!(db::block::count_master_blocks(&pool).await.unwrap(), 2);
        assert_eq!(indexer.start_seq_no(1).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_save_loop_rejects_gap() {
        let (pool, indexer) = setup_indexer().await;
        let (sender, receiver) = mpsc::channel(4);

        sender.send(master_block(7, vec![])).await.unwrap();
        drop(sender);

        let err = indexer.save_loop(receiver, Some(5)).await.unwrap_err();
        assert!(matches!(err, IndexerError::Consistency(_)));

        // Nothing of the rejected batch was written
        assert_eq!(db::block::count_master_blocks(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_committed_batch_is_mirrored() {
        let (pool, catalog) = setup().await;
        let mirror_pool = establish_mirror_connection("sqlite::memory:").await.unwrap();
        let mirror: Arc<dyn AnalyticsMirror> = Arc::new(SqliteMirror::new(mirror_pool.clone()));
        let indexer = Indexer::new(pool, MessageParser::new(catalog), Some(mirror), &test_config());

        let (sender, receiver) = transfer_pair(7, (address(1), 10, 1), (address(2), 20, 1));
        indexer.save_blocks(vec![master_block(1, vec![sender, receiver])]).await.unwrap();

        let (states,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM mirror_account_states")
            .fetch_one(&mirror_pool)
            .await
            .unwrap();
        let (messages,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM mirror_messages")
            .fetch_one(&mirror_pool)
            .await
            .unwrap();
        assert_eq!(states, 2);
        assert_eq!(messages, 1);
    }
}
