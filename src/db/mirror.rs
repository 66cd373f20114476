use crate::db::to_json;
use crate::models::{AccountState, Message};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Append-only copies of committed rows for analytical queries.
pub const MIRROR_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS mirror_account_states (
    address TEXT NOT NULL,
    last_tx_lt INTEGER NOT NULL,
    workchain INTEGER NOT NULL,
    block_seq_no INTEGER NOT NULL,
    status TEXT NOT NULL,
    balance INTEGER NOT NULL,
    types TEXT NOT NULL,
    owner_address TEXT,
    minter_address TEXT,
    jetton_balance TEXT,
    mirrored_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS mirror_messages (
    hash BLOB NOT NULL,
    type TEXT NOT NULL,
    src_address TEXT,
    src_tx_lt INTEGER NOT NULL,
    dst_address TEXT,
    dst_tx_lt INTEGER NOT NULL,
    amount INTEGER NOT NULL,
    operation_id INTEGER NOT NULL,
    operation_name TEXT,
    src_contract TEXT,
    dst_contract TEXT,
    created_lt INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    data_json TEXT,
    mirrored_at INTEGER NOT NULL
);
"#;

/// Secondary store receiving every committed batch. Writes are best effort:
/// the relational store stays the source of truth.
#[async_trait]
pub trait AnalyticsMirror: Send + Sync {
    async fn mirror_account_states(&self, accounts: &[AccountState]) -> Result<(), sqlx::Error>;

    async fn mirror_messages(&self, messages: &[Message]) -> Result<(), sqlx::Error>;
}

pub struct SqliteMirror {
    pool: SqlitePool,
}

impl SqliteMirror {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalyticsMirror for SqliteMirror {
    async fn mirror_account_states(&self, accounts: &[AccountState]) -> Result<(), sqlx::Error> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for a in accounts {
            sqlx::query(
                r#"
                INSERT INTO mirror_account_states
                (address, last_tx_lt, workchain, block_seq_no, status, balance, types,
                 owner_address, minter_address, jetton_balance, mirrored_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(a.address.to_string())
            .bind(a.last_tx_lt as i64)
            .bind(a.block.workchain)
            .bind(a.block.seq_no as i64)
            .bind(a.status.as_str())
            .bind(a.balance as i64)
            .bind(to_json(&a.types)?)
            .bind(a.owner_address.map(|x| x.to_string()))
            .bind(a.minter_address.map(|x| x.to_string()))
            .bind(&a.jetton_balance)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    async fn mirror_messages(&self, messages: &[Message]) -> Result<(), sqlx::Error> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for m in messages {
            let data_json = m.data_json.as_ref().map(to_json).transpose()?;

            sqlx::query(
                r#"
                INSERT INTO mirror_messages
                (hash, type, src_address, src_tx_lt, dst_address, dst_tx_lt, amount, operation_id,
                 operation_name, src_contract, dst_contract, created_lt, created_at, data_json, mirrored_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&m.hash)
            .bind(m.msg_type.as_str())
            .bind(m.src_address.map(|a| a.to_string()))
            .bind(m.src.tx_lt as i64)
            .bind(m.dst_address.map(|a| a.to_string()))
            .bind(m.dst.tx_lt as i64)
            .bind(m.amount as i64)
            .bind(m.operation_id as i64)
            .bind(&m.operation_name)
            .bind(&m.src_contract)
            .bind(&m.dst_contract)
            .bind(m.created_lt as i64)
            .bind(m.created_at)
            .bind(data_json)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}
