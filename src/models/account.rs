use super::address::Address;
use super::block::BlockId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Uninit,
    Active,
    Frozen,
    #[default]
    NonExist,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninit => "UNINIT",
            Self::Active => "ACTIVE",
            Self::Frozen => "FROZEN",
            Self::NonExist => "NON_EXIST",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNINIT" => Ok(Self::Uninit),
            "ACTIVE" => Ok(Self::Active),
            "FROZEN" => Ok(Self::Frozen),
            "NON_EXIST" => Ok(Self::NonExist),
            other => Err(format!("unknown account status {other}")),
        }
    }
}

/// A stack value passed to or returned from a get-method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum VmValue {
    Null,
    /// Arbitrary precision integer in decimal form.
    Int(String),
    Cell(Vec<u8>),
    Slice(Vec<u8>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetMethodExecution {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub returns: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Snapshot of an account after its last transaction in a block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub address: Address,
    pub last_tx_lt: u64,
    pub last_tx_hash: Vec<u8>,
    pub block: BlockId,

    pub status: AccountStatus,
    pub balance: u64,

    pub code_hash: Option<Vec<u8>>,
    #[serde(skip)]
    pub code: Option<Vec<u8>>,
    pub data_hash: Option<Vec<u8>>,
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
    pub get_method_hashes: Vec<i32>,

    /// Names of the contract interfaces this state matched.
    pub types: Vec<String>,
    /// Get-method results keyed by interface name.
    pub executed_get_methods: BTreeMap<String, Vec<GetMethodExecution>>,

    pub owner_address: Option<Address>,
    pub minter_address: Option<Address>,
    pub content_uri: Option<String>,
    pub content_name: Option<String>,
    pub content_description: Option<String>,
    pub content_image: Option<String>,
    pub jetton_balance: Option<String>,
}

impl AccountState {
    pub fn id(&self) -> AccountStateId {
        AccountStateId {
            address: self.address,
            last_tx_lt: self.last_tx_lt,
        }
    }

    pub fn has_interface(&self, name: &str) -> bool {
        self.types.iter().any(|t| t == name)
    }

    /// Drops everything derived from interface matching.
    pub fn clear_parsed_data(&mut self) {
        self.types.clear();
        self.executed_get_methods.clear();
        self.clear_derived_fields();
    }

    pub fn clear_derived_fields(&mut self) {
        self.owner_address = None;
        self.minter_address = None;
        self.content_uri = None;
        self.content_name = None;
        self.content_description = None;
        self.content_image = None;
        self.jetton_balance = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountStateId {
    pub address: Address,
    pub last_tx_lt: u64,
}

/// Pointer to the newest known state of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestAccountState {
    pub address: Address,
    pub last_tx_lt: u64,
}
