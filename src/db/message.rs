use crate::db::{from_json, parse_enum, parse_opt_address, to_json};
use crate::models::{Address, Message, MessageSide, MessageType};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};

const MESSAGE_COLUMNS: &str = "hash, type, src_address, src_tx_lt, src_tx_hash, src_workchain, \
    src_shard, src_block_seq_no, dst_address, dst_tx_lt, dst_tx_hash, dst_workchain, dst_shard, \
    dst_block_seq_no, bounce, bounced, amount, body, operation_id, created_lt, created_at, \
    src_contract, dst_contract, operation_name, minter_address, data_json";

/// Selects messages of one operation on the contract side of the message.
#[derive(Debug, Clone)]
pub struct OperationFilter {
    pub message_type: MessageType,
    pub operation_id: u32,
    /// Contract side is the source when set, the destination otherwise.
    pub outgoing: bool,
    /// Only messages already decoded for this contract.
    pub decoded_for: Option<String>,
}

fn side_from_row(row: &SqliteRow, prefix: &str) -> Result<MessageSide, sqlx::Error> {
    Ok(MessageSide {
        tx_lt: row.try_get::<i64, _>(format!("{prefix}_tx_lt").as_str())? as u64,
        tx_hash: row
            .try_get::<Option<Vec<u8>>, _>(format!("{prefix}_tx_hash").as_str())?
            .unwrap_or_default(),
        workchain: row.try_get(format!("{prefix}_workchain").as_str())?,
        shard: row.try_get(format!("{prefix}_shard").as_str())?,
        block_seq_no: row.try_get::<i64, _>(format!("{prefix}_block_seq_no").as_str())? as u32,
        state: None,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<Message, sqlx::Error> {
    let data_json: Option<String> = row.try_get("data_json")?;

    Ok(Message {
        hash: row.try_get("hash")?,
        msg_type: parse_enum(row.try_get("type")?)?,
        src_address: parse_opt_address(row.try_get("src_address")?)?,
        dst_address: parse_opt_address(row.try_get("dst_address")?)?,
        src: side_from_row(row, "src")?,
        dst: side_from_row(row, "dst")?,
        bounce: row.try_get("bounce")?,
        bounced: row.try_get("bounced")?,
        amount: row.try_get::<i64, _>("amount")? as u64,
        body: row.try_get::<Option<Vec<u8>>, _>("body")?.unwrap_or_default(),
        operation_id: row.try_get::<i64, _>("operation_id")? as u32,
        created_lt: row.try_get::<i64, _>("created_lt")? as u64,
        created_at: row.try_get("created_at")?,
        src_contract: row.try_get("src_contract")?,
        dst_contract: row.try_get("dst_contract")?,
        operation_name: row.try_get("operation_name")?,
        minter_address: parse_opt_address(row.try_get("minter_address")?)?,
        data_json: data_json.as_deref().map(from_json).transpose()?,
    })
}

/// Inserts messages in the given order. A message first stored by an earlier
/// batch gets its newly observed side merged in; a stored side is never reset.
pub async fn add_messages(conn: &mut SqliteConnection, messages: &[&Message]) -> Result<(), sqlx::Error> {
    for m in messages {
        let data_json = m.data_json.as_ref().map(to_json).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO messages
            (hash, type, src_address, src_tx_lt, src_tx_hash, src_workchain, src_shard, src_block_seq_no,
             dst_address, dst_tx_lt, dst_tx_hash, dst_workchain, dst_shard, dst_block_seq_no,
             bounce, bounced, amount, body, operation_id, created_lt, created_at,
             src_contract, dst_contract, operation_name, minter_address, data_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(hash) DO UPDATE SET
                src_tx_hash = CASE WHEN excluded.src_tx_lt != 0 THEN excluded.src_tx_hash ELSE messages.src_tx_hash END,
                src_workchain = CASE WHEN excluded.src_tx_lt != 0 THEN excluded.src_workchain ELSE messages.src_workchain END,
                src_shard = CASE WHEN excluded.src_tx_lt != 0 THEN excluded.src_shard ELSE messages.src_shard END,
                src_block_seq_no = CASE WHEN excluded.src_tx_lt != 0 THEN excluded.src_block_seq_no ELSE messages.src_block_seq_no END,
                src_tx_lt = CASE WHEN excluded.src_tx_lt != 0 THEN excluded.src_tx_lt ELSE messages.src_tx_lt END,
                dst_tx_hash = CASE WHEN excluded.dst_tx_lt != 0 THEN excluded.dst_tx_hash ELSE messages.dst_tx_hash END,
                dst_workchain = CASE WHEN excluded.dst_tx_lt != 0 THEN excluded.dst_workchain ELSE messages.dst_workchain END,
                dst_shard = CASE WHEN excluded.dst_tx_lt != 0 THEN excluded.dst_shard ELSE messages.dst_shard END,
                dst_block_seq_no = CASE WHEN excluded.dst_tx_lt != 0 THEN excluded.dst_block_seq_no ELSE messages.dst_block_seq_no END,
                dst_tx_lt = CASE WHEN excluded.dst_tx_lt != 0 THEN excluded.dst_tx_lt ELSE messages.dst_tx_lt END,
                src_contract = COALESCE(excluded.src_contract, messages.src_contract),
                dst_contract = COALESCE(excluded.dst_contract, messages.dst_contract),
                operation_name = COALESCE(excluded.operation_name, messages.operation_name),
                minter_address = COALESCE(excluded.minter_address, messages.minter_address),
                data_json = COALESCE(excluded.data_json, messages.data_json)
            "#,
        )
        .bind(&m.hash)
        .bind(m.msg_type.as_str())
        .bind(m.src_address.map(|a| a.to_string()))
        .bind(m.src.tx_lt as i64)
        .bind(&m.src.tx_hash)
        .bind(m.src.workchain)
        .bind(m.src.shard)
        .bind(m.src.block_seq_no as i64)
        .bind(m.dst_address.map(|a| a.to_string()))
        .bind(m.dst.tx_lt as i64)
        .bind(&m.dst.tx_hash)
        .bind(m.dst.workchain)
        .bind(m.dst.shard)
        .bind(m.dst.block_seq_no as i64)
        .bind(m.bounce)
        .bind(m.bounced)
        .bind(m.amount as i64)
        .bind(&m.body)
        .bind(m.operation_id as i64)
        .bind(m.created_lt as i64)
        .bind(m.created_at)
        .bind(&m.src_contract)
        .bind(&m.dst_contract)
        .bind(&m.operation_name)
        .bind(m.minter_address.map(|a| a.to_string()))
        .bind(data_json)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn get_messages(pool: &SqlitePool, hashes: &[Vec<u8>]) -> Result<Vec<Message>, sqlx::Error> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE hash = ?");
    let mut messages = Vec::with_capacity(hashes.len());

    for hash in hashes {
        if let Some(row) = sqlx::query(&sql).bind(hash).fetch_optional(pool).await? {
            messages.push(message_from_row(&row)?);
        }
    }

    Ok(messages)
}

/// Pages through messages of an operation ordered by the contract side
/// (address, tx LT) and the message hash, strictly after `after`.
pub async fn get_operation_messages(
    pool: &SqlitePool,
    filter: &OperationFilter,
    after: Option<(Address, u64, &[u8])>,
    limit: usize,
) -> Result<Vec<Message>, sqlx::Error> {
    let side = if filter.outgoing { "src" } else { "dst" };

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE type = "));
    qb.push_bind(filter.message_type.as_str())
        .push(" AND operation_id = ")
        .push_bind(filter.operation_id as i64)
        .push(format!(" AND {side}_address IS NOT NULL AND {side}_tx_lt != 0"));

    if let Some(contract) = &filter.decoded_for {
        qb.push(format!(" AND operation_name IS NOT NULL AND {side}_contract = "))
            .push_bind(contract.clone());
    }

    if let Some((address, lt, hash)) = after {
        qb.push(format!(" AND ({side}_address, {side}_tx_lt, hash) > ("))
            .push_bind(address.to_string())
            .push(", ")
            .push_bind(lt as i64)
            .push(", ")
            .push_bind(hash.to_vec())
            .push(")");
    }

    qb.push(format!(" ORDER BY {side}_address ASC, {side}_tx_lt ASC, hash ASC LIMIT "))
        .push_bind(limit as i64);

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(message_from_row).collect()
}

/// Rewrites the decoded payload of already stored messages.
pub async fn update_message_payloads(
    conn: &mut SqliteConnection,
    messages: &[Message],
) -> Result<(), sqlx::Error> {
    for m in messages {
        let data_json = m.data_json.as_ref().map(to_json).transpose()?;

        sqlx::query(
            r#"
            UPDATE messages SET
                src_contract = ?, dst_contract = ?, operation_name = ?, minter_address = ?, data_json = ?
            WHERE hash = ?
            "#,
        )
        .bind(&m.src_contract)
        .bind(&m.dst_contract)
        .bind(&m.operation_name)
        .bind(m.minter_address.map(|a| a.to_string()))
        .bind(data_json)
        .bind(&m.hash)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
