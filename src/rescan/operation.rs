use super::{RescanEngine, RescanError};
use crate::db;
use crate::db::message::OperationFilter;
use crate::models::{Address, Message, MessageType, RescanTask, RescanTaskType};
use tracing::{debug, warn};

/// Key of the contract side of a message, the order operation pages follow.
fn contract_side(msg: &Message, outgoing: bool) -> Option<(Address, u64)> {
    if outgoing {
        msg.src_address.map(|a| (a, msg.src.tx_lt))
    } else {
        msg.dst_address.map(|a| (a, msg.dst.tx_lt))
    }
}

impl RescanEngine {
    pub(super) async fn rescan_operation_page(&self, task: &mut RescanTask) -> Result<(), RescanError> {
        let (Some(message_type), Some(operation_id)) = (task.message_type, task.operation_id) else {
            warn!("Rescan task {} has no operation key, finishing it", task.id);
            return self.finish(task).await;
        };

        let filter = OperationFilter {
            message_type,
            operation_id,
            outgoing: task.outgoing,
            decoded_for: (task.task_type == RescanTaskType::DelOperation).then(|| task.contract_name.clone()),
        };

        let mut page = db::message::get_operation_messages(
            &self.pool,
            &filter,
            task.message_checkpoint(),
            self.select_limit,
        )
        .await?;

        let scanned = page.len();
        if let Some(last) = page.last() {
            if let Some((address, lt)) = contract_side(last, task.outgoing) {
                task.last_address = Some(address);
                task.last_tx_lt = lt;
                task.last_hash = last.hash.clone();
            }
        }
        task.finished = scanned < self.select_limit;

        let updated = match task.task_type {
            RescanTaskType::UpdOperation => self.decode_messages(task, message_type, operation_id, page).await?,
            _ => {
                for msg in &mut page {
                    msg.clear_parsed_side(task.outgoing);
                }
                page
            }
        };

        let mut tx = self.pool.begin().await?;
        db::message::update_message_payloads(&mut tx, &updated).await?;
        db::rescan::set_task(&mut tx, task).await?;
        tx.commit().await?;

        debug!("Rescanned {} messages for task {}, updated {}", scanned, task.id, updated.len());
        Ok(())
    }

    /// Decodes messages whose contract side carried the task's interface at
    /// the time of the message. Returns the decoded messages.
    async fn decode_messages(
        &self,
        task: &RescanTask,
        message_type: MessageType,
        operation_id: u32,
        page: Vec<Message>,
    ) -> Result<Vec<Message>, RescanError> {
        let operations = self.catalog.get_operations().await?;
        let operation = operations.iter().find(|op| {
            op.contract_name == task.contract_name
                && op.message_type == message_type
                && op.outgoing == task.outgoing
                && op.operation_id == operation_id
        });

        let Some(operation) = operation else {
            debug!("Operation of rescan task {} is gone", task.id);
            return Ok(Vec::new());
        };

        let mut decoded = Vec::with_capacity(page.len());
        for mut msg in page {
            let Some((address, lt)) = contract_side(&msg, task.outgoing) else {
                continue;
            };
            let Some(state) = db::account::get_state_at(&self.pool, &address, lt).await? else {
                continue;
            };
            if !state.has_interface(&task.contract_name) {
                continue;
            }

            match self.messages.apply_operation(operation, &state, &mut msg) {
                Ok(()) => decoded.push(msg),
                Err(e) => warn!("Failed to decode message {} for task {}: {}", msg.hash_hex(), task.id, e),
            }
        }

        Ok(decoded)
    }
}
