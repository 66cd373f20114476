use crate::db::{from_json, parse_address, parse_enum, parse_opt_address, to_json};
use crate::models::{AccountState, AccountStateId, Address, BlockId, LatestAccountState};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::collections::BTreeMap;

const STATE_COLUMNS: &str = "address, last_tx_lt, last_tx_hash, workchain, shard, block_seq_no, \
    status, balance, code_hash, data_hash, get_method_hashes, types, executed_get_methods, \
    owner_address, minter_address, content_uri, content_name, content_description, \
    content_image, jetton_balance";

/// Criteria selecting stored states for a rescan page. Criteria are OR-ed.
#[derive(Debug, Clone, Default)]
pub struct StateFilter {
    /// States that already carry this interface.
    pub contract_name: Option<String>,
    pub addresses: Vec<Address>,
    pub code_hash: Option<Vec<u8>>,
    /// Only used when neither addresses nor code hash are set.
    pub get_method_hashes: Vec<i32>,
}

impl StateFilter {
    pub fn is_empty(&self) -> bool {
        self.contract_name.is_none()
            && self.addresses.is_empty()
            && self.code_hash.is_none()
            && self.get_method_hashes.is_empty()
    }
}

fn state_from_row(row: &SqliteRow) -> Result<AccountState, sqlx::Error> {
    let executed: String = row.try_get("executed_get_methods")?;

    Ok(AccountState {
        address: parse_address(row.try_get("address")?)?,
        last_tx_lt: row.try_get::<i64, _>("last_tx_lt")? as u64,
        last_tx_hash: row.try_get("last_tx_hash")?,
        block: BlockId::new(
            row.try_get("workchain")?,
            row.try_get("shard")?,
            row.try_get::<i64, _>("block_seq_no")? as u32,
        ),
        status: parse_enum(row.try_get("status")?)?,
        balance: row.try_get::<i64, _>("balance")? as u64,
        code_hash: row.try_get("code_hash")?,
        code: None,
        data_hash: row.try_get("data_hash")?,
        data: None,
        get_method_hashes: from_json(row.try_get("get_method_hashes")?)?,
        types: from_json(row.try_get("types")?)?,
        executed_get_methods: from_json::<BTreeMap<_, _>>(&executed)?,
        owner_address: parse_opt_address(row.try_get("owner_address")?)?,
        minter_address: parse_opt_address(row.try_get("minter_address")?)?,
        content_uri: row.try_get("content_uri")?,
        content_name: row.try_get("content_name")?,
        content_description: row.try_get("content_description")?,
        content_image: row.try_get("content_image")?,
        jetton_balance: row.try_get("jetton_balance")?,
    })
}

/// Writes code and data blobs keyed by their hashes. Same hash means same
/// bytes, so repeating the write is harmless.
pub async fn add_code_data(pool: &SqlitePool, accounts: &[AccountState]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for a in accounts {
        if let (Some(hash), Some(code)) = (&a.code_hash, &a.code) {
            sqlx::query("INSERT OR IGNORE INTO account_state_code (code_hash, code) VALUES (?, ?)")
                .bind(hash)
                .bind(code)
                .execute(&mut *tx)
                .await?;
        }
        if let (Some(hash), Some(data)) = (&a.data_hash, &a.data) {
            sqlx::query("INSERT OR IGNORE INTO account_state_data (data_hash, data) VALUES (?, ?)")
                .bind(hash)
                .bind(data)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

pub async fn add_account_states(
    conn: &mut SqliteConnection,
    accounts: &[AccountState],
) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now().timestamp();

    for a in accounts {
        sqlx::query(
            r#"
            INSERT INTO account_states
            (address, last_tx_lt, last_tx_hash, workchain, shard, block_seq_no, status, balance,
             code_hash, data_hash, get_method_hashes, types, executed_get_methods,
             owner_address, minter_address, content_uri, content_name, content_description,
             content_image, jetton_balance, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(a.address.to_string())
        .bind(a.last_tx_lt as i64)
        .bind(&a.last_tx_hash)
        .bind(a.block.workchain)
        .bind(a.block.shard)
        .bind(a.block.seq_no as i64)
        .bind(a.status.as_str())
        .bind(a.balance as i64)
        .bind(&a.code_hash)
        .bind(&a.data_hash)
        .bind(to_json(&a.get_method_hashes)?)
        .bind(to_json(&a.types)?)
        .bind(to_json(&a.executed_get_methods)?)
        .bind(a.owner_address.map(|x| x.to_string()))
        .bind(a.minter_address.map(|x| x.to_string()))
        .bind(&a.content_uri)
        .bind(&a.content_name)
        .bind(&a.content_description)
        .bind(&a.content_image)
        .bind(&a.jetton_balance)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Moves the latest-state pointer of each address forward. A stored pointer
/// with a higher or equal LT is left untouched.
pub async fn update_latest_states(
    conn: &mut SqliteConnection,
    accounts: &[AccountState],
) -> Result<(), sqlx::Error> {
    let mut newest: BTreeMap<Address, u64> = BTreeMap::new();
    for a in accounts {
        let lt = newest.entry(a.address).or_insert(a.last_tx_lt);
        if *lt < a.last_tx_lt {
            *lt = a.last_tx_lt;
        }
    }

    for (address, lt) in newest {
        sqlx::query(
            r#"
            INSERT INTO latest_account_states (address, last_tx_lt) VALUES (?, ?)
            ON CONFLICT(address) DO UPDATE SET last_tx_lt = excluded.last_tx_lt
            WHERE excluded.last_tx_lt > latest_account_states.last_tx_lt
            "#,
        )
        .bind(address.to_string())
        .bind(lt as i64)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Rewrites everything derived from interface matching.
pub async fn update_account_states(
    conn: &mut SqliteConnection,
    accounts: &[AccountState],
) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now().timestamp();

    for a in accounts {
        sqlx::query(
            r#"
            UPDATE account_states SET
                types = ?, executed_get_methods = ?, owner_address = ?, minter_address = ?,
                content_uri = ?, content_name = ?, content_description = ?, content_image = ?,
                jetton_balance = ?, updated_at = ?
            WHERE address = ? AND last_tx_lt = ?
            "#,
        )
        .bind(to_json(&a.types)?)
        .bind(to_json(&a.executed_get_methods)?)
        .bind(a.owner_address.map(|x| x.to_string()))
        .bind(a.minter_address.map(|x| x.to_string()))
        .bind(&a.content_uri)
        .bind(&a.content_name)
        .bind(&a.content_description)
        .bind(&a.content_image)
        .bind(&a.jetton_balance)
        .bind(now)
        .bind(a.address.to_string())
        .bind(a.last_tx_lt as i64)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn get_account_states(
    pool: &SqlitePool,
    ids: &[AccountStateId],
) -> Result<Vec<AccountState>, sqlx::Error> {
    let sql = format!("SELECT {STATE_COLUMNS} FROM account_states WHERE address = ? AND last_tx_lt = ?");
    let mut states = Vec::with_capacity(ids.len());

    for id in ids {
        let row = sqlx::query(&sql)
            .bind(id.address.to_string())
            .bind(id.last_tx_lt as i64)
            .fetch_optional(pool)
            .await?;
        if let Some(row) = row {
            states.push(state_from_row(&row)?);
        }
    }

    Ok(states)
}

/// Returns the snapshot covering a transaction of `address` at `lt`: the
/// earliest stored state whose last transaction is not older than `lt`.
pub async fn get_state_at(
    pool: &SqlitePool,
    address: &Address,
    lt: u64,
) -> Result<Option<AccountState>, sqlx::Error> {
    let sql = format!(
        "SELECT {STATE_COLUMNS} FROM account_states WHERE address = ? AND last_tx_lt >= ? \
         ORDER BY last_tx_lt ASC LIMIT 1"
    );

    sqlx::query(&sql)
        .bind(address.to_string())
        .bind(lt as i64)
        .fetch_optional(pool)
        .await?
        .map(|row| state_from_row(&row))
        .transpose()
}

pub async fn get_latest_state(
    pool: &SqlitePool,
    address: &Address,
) -> Result<Option<LatestAccountState>, sqlx::Error> {
    let row = sqlx::query("SELECT address, last_tx_lt FROM latest_account_states WHERE address = ?")
        .bind(address.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|row| {
        Ok(LatestAccountState {
            address: parse_address(row.try_get("address")?)?,
            last_tx_lt: row.try_get::<i64, _>("last_tx_lt")? as u64,
        })
    })
    .transpose()
}

/// Pages through states matching `filter`, ordered by (address, LT) and
/// strictly after `after`.
pub async fn match_states_by_interface_desc(
    pool: &SqlitePool,
    filter: &StateFilter,
    after: Option<(Address, u64)>,
    limit: usize,
) -> Result<Vec<AccountStateId>, sqlx::Error> {
    if filter.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT address, last_tx_lt FROM account_states WHERE (");
    {
        let mut criteria = qb.separated(" OR ");

        if let Some(name) = &filter.contract_name {
            criteria
                .push("EXISTS (SELECT 1 FROM json_each(account_states.types) WHERE value = ")
                .push_bind_unseparated(name.clone())
                .push_unseparated(")");
        }
        if !filter.addresses.is_empty() {
            let addresses: Vec<String> = filter.addresses.iter().map(|a| a.to_string()).collect();
            criteria
                .push("address IN (SELECT value FROM json_each(")
                .push_bind_unseparated(to_json(&addresses)?)
                .push_unseparated("))");
        }
        if let Some(code_hash) = &filter.code_hash {
            criteria
                .push("code_hash = ")
                .push_bind_unseparated(code_hash.clone());
        }
        if filter.addresses.is_empty()
            && filter.code_hash.is_none()
            && !filter.get_method_hashes.is_empty()
        {
            criteria
                .push("NOT EXISTS (SELECT 1 FROM json_each(")
                .push_bind_unseparated(to_json(&filter.get_method_hashes)?)
                .push_unseparated(
                    ") AS want WHERE want.value NOT IN \
                     (SELECT value FROM json_each(account_states.get_method_hashes)))",
                );
        }
    }
    qb.push(")");

    if let Some((address, lt)) = after {
        qb.push(" AND (address, last_tx_lt) > (")
            .push_bind(address.to_string())
            .push(", ")
            .push_bind(lt as i64)
            .push(")");
    }

    qb.push(" ORDER BY address ASC, last_tx_lt ASC LIMIT ")
        .push_bind(limit as i64);

    let rows = qb.build().fetch_all(pool).await?;

    rows.iter()
        .map(|row| {
            Ok(AccountStateId {
                address: parse_address(row.try_get("address")?)?,
                last_tx_lt: row.try_get::<i64, _>("last_tx_lt")? as u64,
            })
        })
        .collect()
}
