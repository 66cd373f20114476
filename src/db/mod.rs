pub mod account;
pub mod block;
pub mod connection;
pub mod contract;
pub mod message;
pub mod migration;
pub mod mirror;
pub mod rescan;
pub mod transaction;

use crate::models::Address;
use serde::{de::DeserializeOwned, Serialize};

pub const INIT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS blocks (
    workchain INTEGER NOT NULL,
    shard INTEGER NOT NULL,
    seq_no INTEGER NOT NULL,
    root_hash BLOB NOT NULL,
    file_hash BLOB NOT NULL,
    master_workchain INTEGER,
    master_shard INTEGER,
    master_seq_no INTEGER,
    parents TEXT NOT NULL DEFAULT '[]',
    transactions_count INTEGER NOT NULL,
    gen_utime INTEGER NOT NULL,
    scanned_at INTEGER NOT NULL,
    PRIMARY KEY (workchain, shard, seq_no)
);

CREATE TABLE IF NOT EXISTS transactions (
    hash BLOB PRIMARY KEY,
    address TEXT NOT NULL,
    lt INTEGER NOT NULL,
    workchain INTEGER NOT NULL,
    shard INTEGER NOT NULL,
    block_seq_no INTEGER NOT NULL,
    prev_tx_hash BLOB,
    prev_tx_lt INTEGER NOT NULL DEFAULT 0,
    in_msg_hash BLOB,
    out_msg_count INTEGER NOT NULL,
    total_fees INTEGER NOT NULL,
    orig_status TEXT NOT NULL,
    end_status TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS account_state_code (
    code_hash BLOB PRIMARY KEY,
    code BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS account_state_data (
    data_hash BLOB PRIMARY KEY,
    data BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS account_states (
    address TEXT NOT NULL,
    last_tx_lt INTEGER NOT NULL,
    last_tx_hash BLOB NOT NULL,
    workchain INTEGER NOT NULL,
    shard INTEGER NOT NULL,
    block_seq_no INTEGER NOT NULL,
    status TEXT NOT NULL,
    balance INTEGER NOT NULL,
    code_hash BLOB,
    data_hash BLOB,
    get_method_hashes TEXT NOT NULL DEFAULT '[]',
    types TEXT NOT NULL DEFAULT '[]',
    executed_get_methods TEXT NOT NULL DEFAULT '{}',
    owner_address TEXT,
    minter_address TEXT,
    content_uri TEXT,
    content_name TEXT,
    content_description TEXT,
    content_image TEXT,
    jetton_balance TEXT,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (address, last_tx_lt)
);

CREATE TABLE IF NOT EXISTS latest_account_states (
    address TEXT PRIMARY KEY,
    last_tx_lt INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    hash BLOB PRIMARY KEY,
    type TEXT NOT NULL,
    src_address TEXT,
    src_tx_lt INTEGER NOT NULL DEFAULT 0,
    src_tx_hash BLOB,
    src_workchain INTEGER NOT NULL DEFAULT 0,
    src_shard INTEGER NOT NULL DEFAULT 0,
    src_block_seq_no INTEGER NOT NULL DEFAULT 0,
    dst_address TEXT,
    dst_tx_lt INTEGER NOT NULL DEFAULT 0,
    dst_tx_hash BLOB,
    dst_workchain INTEGER NOT NULL DEFAULT 0,
    dst_shard INTEGER NOT NULL DEFAULT 0,
    dst_block_seq_no INTEGER NOT NULL DEFAULT 0,
    bounce INTEGER NOT NULL DEFAULT 0,
    bounced INTEGER NOT NULL DEFAULT 0,
    amount INTEGER NOT NULL DEFAULT 0,
    body BLOB,
    operation_id INTEGER NOT NULL DEFAULT 0,
    created_lt INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    src_contract TEXT,
    dst_contract TEXT,
    operation_name TEXT,
    minter_address TEXT,
    data_json TEXT
);

CREATE TABLE IF NOT EXISTS contract_interfaces (
    name TEXT PRIMARY KEY,
    addresses TEXT NOT NULL DEFAULT '[]',
    code BLOB,
    code_hash BLOB,
    get_method_hashes TEXT NOT NULL DEFAULT '[]',
    get_methods TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS contract_operations (
    operation_name TEXT NOT NULL,
    contract_name TEXT NOT NULL,
    message_type TEXT NOT NULL,
    outgoing INTEGER NOT NULL,
    operation_id INTEGER NOT NULL,
    schema TEXT NOT NULL,
    PRIMARY KEY (contract_name, message_type, outgoing, operation_id),
    UNIQUE (contract_name, operation_name)
);

CREATE TABLE IF NOT EXISTS contract_definitions (
    name TEXT PRIMARY KEY,
    schema TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rescan_tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type TEXT NOT NULL,
    finished INTEGER NOT NULL DEFAULT 0,
    contract_name TEXT NOT NULL,
    changed_get_methods TEXT NOT NULL DEFAULT '[]',
    message_type TEXT,
    outgoing INTEGER NOT NULL DEFAULT 0,
    operation_id INTEGER,
    last_address TEXT,
    last_tx_lt INTEGER NOT NULL DEFAULT 0,
    last_hash BLOB NOT NULL DEFAULT x'',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_blocks_master ON blocks(master_workchain, master_shard, master_seq_no);
CREATE INDEX IF NOT EXISTS idx_transactions_address_lt ON transactions(address, lt);
CREATE INDEX IF NOT EXISTS idx_account_states_code_hash ON account_states(code_hash);
CREATE INDEX IF NOT EXISTS idx_account_states_owner ON account_states(owner_address) WHERE owner_address IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_account_states_minter ON account_states(minter_address) WHERE minter_address IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_messages_created_lt ON messages(created_lt);
CREATE INDEX IF NOT EXISTS idx_messages_dst_operation ON messages(operation_id, dst_address, dst_tx_lt);
CREATE INDEX IF NOT EXISTS idx_messages_src_operation ON messages(operation_id, src_address, src_tx_lt);
CREATE INDEX IF NOT EXISTS idx_rescan_tasks_unfinished ON rescan_tasks(finished, id);
"#;

pub(crate) fn parse_address(s: &str) -> Result<Address, sqlx::Error> {
    s.parse().map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(crate) fn parse_opt_address(s: Option<String>) -> Result<Option<Address>, sqlx::Error> {
    s.as_deref().map(parse_address).transpose()
}

pub(crate) fn from_json<T: DeserializeOwned>(s: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(s).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

pub(crate) fn parse_enum<T: std::str::FromStr<Err = String>>(s: &str) -> Result<T, sqlx::Error> {
    s.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))
}
