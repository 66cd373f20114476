use super::account::AccountState;
use super::address::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    Internal,
    ExternalIn,
    ExternalOut,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "INTERNAL",
            Self::ExternalIn => "EXTERNAL_IN",
            Self::ExternalOut => "EXTERNAL_OUT",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INTERNAL" => Ok(Self::Internal),
            "EXTERNAL_IN" => Ok(Self::ExternalIn),
            "EXTERNAL_OUT" => Ok(Self::ExternalOut),
            other => Err(format!("unknown message type {other}")),
        }
    }
}

/// One end of a message: the transaction that emitted or consumed it.
/// A side with `tx_lt == 0` has not been observed yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageSide {
    pub tx_lt: u64,
    pub tx_hash: Vec<u8>,
    pub workchain: i32,
    pub shard: i64,
    pub block_seq_no: u32,
    pub state: Option<Arc<AccountState>>,
}

impl MessageSide {
    pub fn is_observed(&self) -> bool {
        self.tx_lt != 0
    }

    /// Takes every field from `other` if it was observed. An absent state never
    /// replaces a known one.
    pub fn absorb(&mut self, other: &MessageSide) {
        if !other.is_observed() {
            return;
        }
        self.tx_lt = other.tx_lt;
        self.tx_hash = other.tx_hash.clone();
        self.workchain = other.workchain;
        self.shard = other.shard;
        self.block_seq_no = other.block_seq_no;
        if other.state.is_some() {
            self.state = other.state.clone();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub hash: Vec<u8>,
    pub msg_type: MessageType,

    pub src_address: Option<Address>,
    pub dst_address: Option<Address>,
    pub src: MessageSide,
    pub dst: MessageSide,

    pub bounce: bool,
    pub bounced: bool,
    pub amount: u64,

    pub body: Vec<u8>,
    pub operation_id: u32,

    pub created_lt: u64,
    pub created_at: i64,

    pub src_contract: Option<String>,
    pub dst_contract: Option<String>,
    pub operation_name: Option<String>,
    pub minter_address: Option<Address>,
    pub data_json: Option<serde_json::Value>,
}

impl Message {
    pub fn hash_hex(&self) -> String {
        hex::encode(&self.hash)
    }

    /// Merges another observation of the same message.
    pub fn merge(&mut self, other: &Message) {
        self.src.absorb(&other.src);
        self.dst.absorb(&other.dst);
    }

    pub fn is_masterchain_only(&self) -> bool {
        self.src_address.is_some_and(|a| a.is_masterchain())
            && self.dst_address.is_some_and(|a| a.is_masterchain())
    }

    /// Drops the contract label of one side. The decoded payload goes with it
    /// unless the other side is still labeled.
    pub fn clear_parsed_side(&mut self, outgoing: bool) {
        let other = if outgoing {
            self.src_contract = None;
            &self.dst_contract
        } else {
            self.dst_contract = None;
            &self.src_contract
        };
        if other.is_none() {
            self.operation_name = None;
            self.minter_address = None;
            self.data_json = None;
        }
    }
}
