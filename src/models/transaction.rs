use super::account::{AccountState, AccountStatus};
use super::address::Address;
use super::block::BlockId;
use super::message::Message;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub hash: Vec<u8>,
    pub address: Address,
    pub lt: u64,
    pub block: BlockId,

    pub prev_tx_hash: Vec<u8>,
    pub prev_tx_lt: u64,

    pub in_msg: Option<Message>,
    pub out_msgs: Vec<Message>,

    pub total_fees: u64,
    pub orig_status: AccountStatus,
    pub end_status: AccountStatus,
    pub created_at: i64,

    /// State of the account at the end of the block containing this transaction.
    pub account: Option<Arc<AccountState>>,
}

impl Transaction {
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.in_msg.iter().chain(self.out_msgs.iter())
    }
}
