use crate::db::{parse_address, parse_enum};
use crate::models::{Address, BlockId, Transaction};
use sqlx::{Row, SqliteConnection, SqlitePool};

pub async fn add_transactions(
    conn: &mut SqliteConnection,
    transactions: &[&Transaction],
) -> Result<(), sqlx::Error> {
    for transaction in transactions {
        let in_msg_hash = transaction.in_msg.as_ref().map(|m| m.hash.clone());

        sqlx::query(
            r#"
            INSERT INTO transactions
            (hash, address, lt, workchain, shard, block_seq_no, prev_tx_hash, prev_tx_lt,
             in_msg_hash, out_msg_count, total_fees, orig_status, end_status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.hash)
        .bind(transaction.address.to_string())
        .bind(transaction.lt as i64)
        .bind(transaction.block.workchain)
        .bind(transaction.block.shard)
        .bind(transaction.block.seq_no as i64)
        .bind(&transaction.prev_tx_hash)
        .bind(transaction.prev_tx_lt as i64)
        .bind(in_msg_hash)
        .bind(transaction.out_msgs.len() as i64)
        .bind(transaction.total_fees as i64)
        .bind(transaction.orig_status.as_str())
        .bind(transaction.end_status.as_str())
        .bind(transaction.created_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Transactions of an address, newest first. Messages and account state are
/// not loaded.
pub async fn get_transactions(
    pool: &SqlitePool,
    address: &Address,
    limit: i64,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT hash, address, lt, workchain, shard, block_seq_no, prev_tx_hash, prev_tx_lt,
                  total_fees, orig_status, end_status, created_at
           FROM transactions
           WHERE address = ?
           ORDER BY lt DESC
           LIMIT ?"#,
    )
    .bind(address.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(Transaction {
                hash: row.try_get("hash")?,
                address: parse_address(row.try_get("address")?)?,
                lt: row.try_get::<i64, _>("lt")? as u64,
                block: BlockId::new(
                    row.try_get("workchain")?,
                    row.try_get("shard")?,
                    row.try_get::<i64, _>("block_seq_no")? as u32,
                ),
                prev_tx_hash: row.try_get::<Option<Vec<u8>>, _>("prev_tx_hash")?.unwrap_or_default(),
                prev_tx_lt: row.try_get::<i64, _>("prev_tx_lt")? as u64,
                total_fees: row.try_get::<i64, _>("total_fees")? as u64,
                orig_status: parse_enum(row.try_get("orig_status")?)?,
                end_status: parse_enum(row.try_get("end_status")?)?,
                created_at: row.try_get("created_at")?,
                ..Default::default()
            })
        })
        .collect()
}

pub async fn count_transactions(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
        .fetch_one(pool)
        .await
}
