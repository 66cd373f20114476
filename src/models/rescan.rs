use super::address::Address;
use super::message::MessageType;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RescanTaskType {
    /// Match stored states against a new interface and run its get-methods.
    AddInterface,
    /// Re-evaluate states that matched before or match now.
    UpdInterface,
    /// Clear parsed data of states that matched a removed interface.
    DelInterface,
    AddGetMethod,
    DelGetMethod,
    UpdGetMethod,
    /// Re-decode messages carrying the operation id to or from the contract.
    UpdOperation,
    DelOperation,
}

impl RescanTaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddInterface => "add_interface",
            Self::UpdInterface => "upd_interface",
            Self::DelInterface => "del_interface",
            Self::AddGetMethod => "add_get_method",
            Self::DelGetMethod => "del_get_method",
            Self::UpdGetMethod => "upd_get_method",
            Self::UpdOperation => "upd_operation",
            Self::DelOperation => "del_operation",
        }
    }

    pub fn is_operation_task(&self) -> bool {
        matches!(self, Self::UpdOperation | Self::DelOperation)
    }
}

impl fmt::Display for RescanTaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RescanTaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "add_interface" => Self::AddInterface,
            "upd_interface" => Self::UpdInterface,
            "del_interface" => Self::DelInterface,
            "add_get_method" => Self::AddGetMethod,
            "del_get_method" => Self::DelGetMethod,
            "upd_get_method" => Self::UpdGetMethod,
            "upd_operation" => Self::UpdOperation,
            "del_operation" => Self::DelOperation,
            other => return Err(format!("unknown rescan task type {other}")),
        })
    }
}

/// Checkpointed reconciliation job created by a catalog edit.
#[derive(Debug, Clone, PartialEq)]
pub struct RescanTask {
    pub id: i64,
    pub task_type: RescanTaskType,
    pub finished: bool,
    pub contract_name: String,

    pub changed_get_methods: Vec<String>,

    pub message_type: Option<MessageType>,
    pub outgoing: bool,
    pub operation_id: Option<u32>,

    pub last_address: Option<Address>,
    pub last_tx_lt: u64,
    /// Message hash within `last_tx_lt`, set by operation tasks only.
    pub last_hash: Vec<u8>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl RescanTask {
    pub fn new(task_type: RescanTaskType, contract_name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: 0,
            task_type,
            finished: false,
            contract_name: contract_name.into(),
            changed_get_methods: Vec::new(),
            message_type: None,
            outgoing: false,
            operation_id: None,
            last_address: None,
            last_tx_lt: 0,
            last_hash: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_get_methods(mut self, methods: Vec<String>) -> Self {
        self.changed_get_methods = methods;
        self
    }

    pub fn with_operation(mut self, message_type: MessageType, outgoing: bool, operation_id: u32) -> Self {
        self.message_type = Some(message_type);
        self.outgoing = outgoing;
        self.operation_id = Some(operation_id);
        self
    }

    /// Position after which the next page starts.
    pub fn checkpoint(&self) -> Option<(Address, u64)> {
        self.last_address.map(|a| (a, self.last_tx_lt))
    }

    /// Position of operation tasks, unique per message.
    pub fn message_checkpoint(&self) -> Option<(Address, u64, &[u8])> {
        self.last_address.map(|a| (a, self.last_tx_lt, self.last_hash.as_slice()))
    }
}
