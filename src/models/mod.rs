// Domain model shared by the fetcher, decoder, persistence and rescan engine

pub mod account;
pub mod address;
pub mod block;
pub mod contract;
pub mod message;
pub mod rescan;
pub mod transaction;

pub use account::{
    AccountState, AccountStateId, AccountStatus, GetMethodExecution, LatestAccountState, VmValue,
};
pub use address::{Address, AddressError, MASTERCHAIN};
pub use block::{Block, BlockId};
pub use contract::{ContractDefinition, ContractInterface, ContractOperation, GetMethodDesc, Schema, StackValueDesc};
pub use message::{Message, MessageSide, MessageType};
pub use rescan::{RescanTask, RescanTaskType};
pub use transaction::Transaction;
