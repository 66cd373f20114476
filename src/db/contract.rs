use crate::db::{from_json, parse_enum, to_json};
use crate::models::{ContractDefinition, ContractInterface, ContractOperation, Schema};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

fn interface_from_row(row: &SqliteRow) -> Result<ContractInterface, sqlx::Error> {
    Ok(ContractInterface {
        name: row.try_get("name")?,
        addresses: from_json(row.try_get("addresses")?)?,
        code: row.try_get("code")?,
        code_hash: row.try_get("code_hash")?,
        get_method_hashes: from_json(row.try_get("get_method_hashes")?)?,
        get_methods: from_json(row.try_get("get_methods")?)?,
    })
}

fn operation_from_row(row: &SqliteRow) -> Result<ContractOperation, sqlx::Error> {
    Ok(ContractOperation {
        operation_name: row.try_get("operation_name")?,
        contract_name: row.try_get("contract_name")?,
        message_type: parse_enum(row.try_get("message_type")?)?,
        outgoing: row.try_get("outgoing")?,
        operation_id: row.try_get::<i64, _>("operation_id")? as u32,
        schema: Schema(from_json(row.try_get("schema")?)?),
    })
}

pub async fn get_interfaces(pool: &SqlitePool) -> Result<Vec<ContractInterface>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT name, addresses, code, code_hash, get_method_hashes, get_methods \
         FROM contract_interfaces ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(interface_from_row).collect()
}

pub async fn get_interface(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<ContractInterface>, sqlx::Error> {
    sqlx::query(
        "SELECT name, addresses, code, code_hash, get_method_hashes, get_methods \
         FROM contract_interfaces WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?
    .map(|row| interface_from_row(&row))
    .transpose()
}

pub async fn insert_interface(conn: &mut SqliteConnection, i: &ContractInterface) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO contract_interfaces (name, addresses, code, code_hash, get_method_hashes, get_methods) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&i.name)
    .bind(to_json(&i.addresses)?)
    .bind(&i.code)
    .bind(&i.code_hash)
    .bind(to_json(&i.get_method_hashes)?)
    .bind(to_json(&i.get_methods)?)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Returns the number of updated rows.
pub async fn update_interface(conn: &mut SqliteConnection, i: &ContractInterface) -> Result<u64, sqlx::Error> {
    let ret = sqlx::query(
        "UPDATE contract_interfaces SET addresses = ?, code = ?, code_hash = ?, get_method_hashes = ?, \
         get_methods = ? WHERE name = ?",
    )
    .bind(to_json(&i.addresses)?)
    .bind(&i.code)
    .bind(&i.code_hash)
    .bind(to_json(&i.get_method_hashes)?)
    .bind(to_json(&i.get_methods)?)
    .bind(&i.name)
    .execute(&mut *conn)
    .await?;

    Ok(ret.rows_affected())
}

/// Removes the interface together with its operations.
pub async fn delete_interface(conn: &mut SqliteConnection, name: &str) -> Result<u64, sqlx::Error> {
    sqlx::query("DELETE FROM contract_operations WHERE contract_name = ?")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    let ret = sqlx::query("DELETE FROM contract_interfaces WHERE name = ?")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    Ok(ret.rows_affected())
}

pub async fn get_operations(pool: &SqlitePool) -> Result<Vec<ContractOperation>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT operation_name, contract_name, message_type, outgoing, operation_id, schema \
         FROM contract_operations ORDER BY contract_name, operation_name",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(operation_from_row).collect()
}

pub async fn get_operation(
    conn: &mut SqliteConnection,
    contract_name: &str,
    operation_name: &str,
) -> Result<Option<ContractOperation>, sqlx::Error> {
    sqlx::query(
        "SELECT operation_name, contract_name, message_type, outgoing, operation_id, schema \
         FROM contract_operations WHERE contract_name = ? AND operation_name = ?",
    )
    .bind(contract_name)
    .bind(operation_name)
    .fetch_optional(&mut *conn)
    .await?
    .map(|row| operation_from_row(&row))
    .transpose()
}

pub async fn insert_operation(conn: &mut SqliteConnection, op: &ContractOperation) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO contract_operations \
         (operation_name, contract_name, message_type, outgoing, operation_id, schema) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&op.operation_name)
    .bind(&op.contract_name)
    .bind(op.message_type.as_str())
    .bind(op.outgoing)
    .bind(op.operation_id as i64)
    .bind(to_json(&op.schema)?)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Replaces the schema of the operation identified by contract and operation name.
pub async fn update_operation(conn: &mut SqliteConnection, op: &ContractOperation) -> Result<u64, sqlx::Error> {
    let ret = sqlx::query(
        "UPDATE contract_operations SET message_type = ?, outgoing = ?, operation_id = ?, schema = ? \
         WHERE contract_name = ? AND operation_name = ?",
    )
    .bind(op.message_type.as_str())
    .bind(op.outgoing)
    .bind(op.operation_id as i64)
    .bind(to_json(&op.schema)?)
    .bind(&op.contract_name)
    .bind(&op.operation_name)
    .execute(&mut *conn)
    .await?;

    Ok(ret.rows_affected())
}

pub async fn delete_operation(
    conn: &mut SqliteConnection,
    contract_name: &str,
    operation_name: &str,
) -> Result<u64, sqlx::Error> {
    let ret = sqlx::query("DELETE FROM contract_operations WHERE contract_name = ? AND operation_name = ?")
        .bind(contract_name)
        .bind(operation_name)
        .execute(&mut *conn)
        .await?;

    Ok(ret.rows_affected())
}

pub async fn get_definitions(conn: &mut SqliteConnection) -> Result<Vec<ContractDefinition>, sqlx::Error> {
    let rows = sqlx::query("SELECT name, schema FROM contract_definitions ORDER BY name")
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| {
            Ok(ContractDefinition {
                name: row.try_get("name")?,
                schema: Schema(from_json(row.try_get("schema")?)?),
            })
        })
        .collect()
}

pub async fn insert_definition(conn: &mut SqliteConnection, d: &ContractDefinition) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO contract_definitions (name, schema) VALUES (?, ?)")
        .bind(&d.name)
        .bind(to_json(&d.schema)?)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Returns the number of updated rows.
pub async fn update_definition(conn: &mut SqliteConnection, d: &ContractDefinition) -> Result<u64, sqlx::Error> {
    let ret = sqlx::query("UPDATE contract_definitions SET schema = ? WHERE name = ?")
        .bind(to_json(&d.schema)?)
        .bind(&d.name)
        .execute(&mut *conn)
        .await?;

    Ok(ret.rows_affected())
}

pub async fn delete_definition(conn: &mut SqliteConnection, name: &str) -> Result<u64, sqlx::Error> {
    let ret = sqlx::query("DELETE FROM contract_definitions WHERE name = ?")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    Ok(ret.rows_affected())
}
