use super::ParseError;
use crate::catalog::{CatalogError, ContractCatalog};
use crate::models::{AccountState, ContractOperation, Message};
use std::sync::Arc;
use tracing::warn;

/// Result of decoding a message from the point of view of one of its accounts.
#[derive(Debug)]
pub enum DirectedOutcome {
    Parsed,
    /// Nothing describes the message on this side.
    Unmatched(&'static str),
    /// A schema matched but could not decode the body.
    Failed(ParseError),
}

/// Decodes message bodies against the operations of the accounts a message
/// connects.
#[derive(Clone)]
pub struct MessageParser {
    catalog: Arc<ContractCatalog>,
}

impl MessageParser {
    pub fn new(catalog: Arc<ContractCatalog>) -> Self {
        Self { catalog }
    }

    /// Tries the message as incoming to `dst`, then as outgoing from `src`.
    ///
    /// Returns [`ParseError::Impossible`] when neither side knows the
    /// operation, and a hard error when a matched schema failed to decode.
    pub async fn parse_message_payload(
        &self,
        src: Option<&AccountState>,
        dst: Option<&AccountState>,
        msg: &mut Message,
    ) -> Result<(), ParseError> {
        if msg.body.is_empty() {
            return Err(ParseError::Impossible("no message body"));
        }

        let incoming = self.parse_directed(dst, msg).await;
        if let DirectedOutcome::Parsed = incoming {
            return Ok(());
        }

        let outgoing = self.parse_directed(src, msg).await;
        match (incoming, outgoing) {
            (_, DirectedOutcome::Parsed) => Ok(()),
            (_, DirectedOutcome::Failed(e)) => {
                warn!("Parse outgoing message {} from {:?}: {}", msg.hash_hex(), msg.src_address, e);
                Err(e)
            }
            (DirectedOutcome::Failed(e), _) => {
                warn!("Parse incoming message {} to {:?}: {}", msg.hash_hex(), msg.dst_address, e);
                Err(e)
            }
            (_, DirectedOutcome::Unmatched(reason)) => Err(ParseError::Impossible(reason)),
        }
    }

    async fn parse_directed(&self, account: Option<&AccountState>, msg: &mut Message) -> DirectedOutcome {
        let Some(account) = account else {
            return DirectedOutcome::Unmatched("no account data");
        };
        if account.types.is_empty() {
            return DirectedOutcome::Unmatched("no interfaces");
        }

        let outgoing = msg.src_address == Some(account.address);
        let op = match self
            .catalog
            .get_operation_by_id(&account.types, msg.msg_type, outgoing, msg.operation_id)
            .await
        {
            Ok(op) => op,
            Err(CatalogError::NotFound) => return DirectedOutcome::Unmatched("unknown operation"),
            Err(e) => return DirectedOutcome::Failed(e.into()),
        };

        match self.apply_operation(&op, account, msg) {
            Ok(()) => DirectedOutcome::Parsed,
            Err(e) => DirectedOutcome::Failed(e),
        }
    }

    /// Decodes the body with the schema of `op` and records the result on the
    /// side of the message `account` belongs to.
    pub fn apply_operation(
        &self,
        op: &ContractOperation,
        account: &AccountState,
        msg: &mut Message,
    ) -> Result<(), ParseError> {
        let data = self
            .catalog
            .codec()
            .decode(&op.schema, &msg.body)
            .map_err(|source| ParseError::Decode {
                contract: op.contract_name.clone(),
                operation: op.operation_name.clone(),
                source,
            })?;

        msg.operation_name = Some(op.operation_name.clone());
        if msg.src_address == Some(account.address) {
            msg.src_contract = Some(op.contract_name.clone());
        } else {
            msg.dst_contract = Some(op.contract_name.clone());
        }
        msg.minter_address = account.minter_address;
        msg.data_json = Some(data);

        Ok(())
    }
}
