use super::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId {
    pub workchain: i32,
    pub shard: i64,
    pub seq_no: u32,
}

impl BlockId {
    pub fn new(workchain: i32, shard: i64, seq_no: u32) -> Self {
        Self {
            workchain,
            shard,
            seq_no,
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {:x}, {})", self.workchain, self.shard, self.seq_no)
    }
}

/// A master or shard block with its transactions. Master blocks carry the
/// shard blocks they finalize.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub id: BlockId,
    pub root_hash: Vec<u8>,
    pub file_hash: Vec<u8>,
    /// Master block that committed this shard block.
    pub master: Option<BlockId>,
    pub parents: Vec<BlockId>,
    pub shards: Vec<Block>,
    pub transactions: Vec<Transaction>,
    pub gen_utime: i64,
}

impl Block {
    /// Iterates over the block and its shards, master first.
    pub fn with_shards(&self) -> impl Iterator<Item = &Block> {
        std::iter::once(self).chain(self.shards.iter())
    }

    pub fn transaction_count(&self) -> usize {
        self.with_shards().map(|b| b.transactions.len()).sum()
    }
}
