use crate::db::to_json;
use crate::models::{Block, MASTERCHAIN};
use sqlx::{SqliteConnection, SqlitePool};

pub async fn add_blocks(conn: &mut SqliteConnection, blocks: &[&Block]) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now().timestamp();

    for b in blocks {
        sqlx::query(
            r#"
            INSERT INTO blocks
            (workchain, shard, seq_no, root_hash, file_hash, master_workchain, master_shard,
             master_seq_no, parents, transactions_count, gen_utime, scanned_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(b.id.workchain)
        .bind(b.id.shard)
        .bind(b.id.seq_no as i64)
        .bind(&b.root_hash)
        .bind(&b.file_hash)
        .bind(b.master.map(|m| m.workchain))
        .bind(b.master.map(|m| m.shard))
        .bind(b.master.map(|m| m.seq_no as i64))
        .bind(to_json(&b.parents)?)
        .bind(b.transactions.len() as i64)
        .bind(b.gen_utime)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn count_master_blocks(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM blocks WHERE workchain = ?")
        .bind(MASTERCHAIN)
        .fetch_one(pool)
        .await
}

/// Highest persisted master sequence number, the indexing checkpoint.
pub async fn last_master_seq_no(pool: &SqlitePool) -> Result<Option<u32>, sqlx::Error> {
    let seq_no: Option<i64> = sqlx::query_scalar("SELECT MAX(seq_no) FROM blocks WHERE workchain = ?")
        .bind(MASTERCHAIN)
        .fetch_one(pool)
        .await?;

    Ok(seq_no.map(|s| s as u32))
}
