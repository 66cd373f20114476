use crate::db::{from_json, parse_enum, parse_opt_address, to_json};
use crate::models::RescanTask;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

fn task_from_row(row: &SqliteRow) -> Result<RescanTask, sqlx::Error> {
    let message_type: Option<String> = row.try_get("message_type")?;

    Ok(RescanTask {
        id: row.try_get("id")?,
        task_type: parse_enum(row.try_get("type")?)?,
        finished: row.try_get("finished")?,
        contract_name: row.try_get("contract_name")?,
        changed_get_methods: from_json(row.try_get("changed_get_methods")?)?,
        message_type: message_type.as_deref().map(parse_enum).transpose()?,
        outgoing: row.try_get("outgoing")?,
        operation_id: row.try_get::<Option<i64>, _>("operation_id")?.map(|id| id as u32),
        last_address: parse_opt_address(row.try_get("last_address")?)?,
        last_tx_lt: row.try_get::<i64, _>("last_tx_lt")? as u64,
        last_hash: row.try_get("last_hash")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Stores a new task and returns its id.
pub async fn add_task(conn: &mut SqliteConnection, task: &RescanTask) -> Result<i64, sqlx::Error> {
    let ret = sqlx::query(
        r#"
        INSERT INTO rescan_tasks
        (type, finished, contract_name, changed_get_methods, message_type, outgoing, operation_id,
         last_address, last_tx_lt, last_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(task.task_type.as_str())
    .bind(task.finished)
    .bind(&task.contract_name)
    .bind(to_json(&task.changed_get_methods)?)
    .bind(task.message_type.map(|t| t.as_str()))
    .bind(task.outgoing)
    .bind(task.operation_id.map(|id| id as i64))
    .bind(task.last_address.map(|a| a.to_string()))
    .bind(task.last_tx_lt as i64)
    .bind(&task.last_hash)
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(ret.last_insert_rowid())
}

/// Oldest task that still has work left.
pub async fn get_unfinished_task(pool: &SqlitePool) -> Result<Option<RescanTask>, sqlx::Error> {
    sqlx::query("SELECT * FROM rescan_tasks WHERE finished = 0 ORDER BY id ASC LIMIT 1")
        .fetch_optional(pool)
        .await?
        .map(|row| task_from_row(&row))
        .transpose()
}

pub async fn get_tasks(pool: &SqlitePool) -> Result<Vec<RescanTask>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM rescan_tasks ORDER BY id ASC")
        .fetch_all(pool)
        .await?;

    rows.iter().map(task_from_row).collect()
}

/// Persists progress of a task: its checkpoint and the finished flag.
pub async fn set_task(conn: &mut SqliteConnection, task: &RescanTask) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE rescan_tasks SET finished = ?, last_address = ?, last_tx_lt = ?, last_hash = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(task.finished)
    .bind(task.last_address.map(|a| a.to_string()))
    .bind(task.last_tx_lt as i64)
    .bind(&task.last_hash)
    .bind(chrono::Utc::now().timestamp())
    .bind(task.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
