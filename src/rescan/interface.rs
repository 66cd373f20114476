use super::{RescanEngine, RescanError};
use crate::catalog::match_interfaces;
use crate::db;
use crate::db::account::StateFilter;
use crate::decoder::account::{derive_fields, remove_get_method, remove_interface};
use crate::models::{AccountState, ContractInterface, RescanTask, RescanTaskType};
use tracing::{debug, warn};

fn state_filter(task: &RescanTask, interface: Option<&ContractInterface>) -> StateFilter {
    let contract_name = Some(task.contract_name.clone());

    match (task.task_type, interface) {
        (RescanTaskType::AddInterface, Some(i)) => StateFilter {
            contract_name: None,
            addresses: i.addresses.clone(),
            code_hash: i.code_hash.clone(),
            get_method_hashes: i.get_method_hashes.clone(),
        },
        (RescanTaskType::UpdInterface | RescanTaskType::DelGetMethod, Some(i)) => StateFilter {
            contract_name,
            addresses: i.addresses.clone(),
            code_hash: i.code_hash.clone(),
            get_method_hashes: i.get_method_hashes.clone(),
        },
        _ => StateFilter {
            contract_name,
            ..Default::default()
        },
    }
}

impl RescanEngine {
    pub(super) async fn rescan_interface_page(&self, task: &mut RescanTask) -> Result<(), RescanError> {
        let interfaces = self.catalog.get_interfaces().await?;
        let interface = interfaces.iter().find(|i| i.name == task.contract_name);

        if interface.is_none() && task.task_type != RescanTaskType::DelInterface {
            warn!(
                "Interface {} of rescan task {} is gone, finishing the task",
                task.contract_name, task.id
            );
            return self.finish(task).await;
        }

        let filter = state_filter(task, interface);
        let ids = db::account::match_states_by_interface_desc(
            &self.pool,
            &filter,
            task.checkpoint(),
            self.select_limit,
        )
        .await?;
        let mut states = db::account::get_account_states(&self.pool, &ids).await?;

        for state in &mut states {
            match interface {
                Some(interface) => self.reconcile(task, &interfaces, interface, state).await,
                None => remove_interface(state, &task.contract_name),
            }
            derive_fields(state, &interfaces);
        }

        if let Some(last) = ids.last() {
            task.last_address = Some(last.address);
            task.last_tx_lt = last.last_tx_lt;
        }
        task.finished = ids.len() < self.select_limit;

        let mut tx = self.pool.begin().await?;
        db::account::update_account_states(&mut tx, &states).await?;
        db::rescan::set_task(&mut tx, task).await?;
        tx.commit().await?;

        debug!("Rescanned {} account states for task {}", states.len(), task.id);
        Ok(())
    }

    /// Brings the interface data of one state in line with the catalog.
    async fn reconcile(
        &self,
        task: &RescanTask,
        interfaces: &[ContractInterface],
        interface: &ContractInterface,
        state: &mut AccountState,
    ) {
        let matches = match_interfaces(interfaces, state)
            .iter()
            .any(|i| i.name == interface.name);
        let has = state.has_interface(&interface.name);
        let changed = Some(task.changed_get_methods.as_slice());

        if !matches {
            if has {
                remove_interface(state, &interface.name);
            }
            return;
        }

        match task.task_type {
            RescanTaskType::AddInterface | RescanTaskType::UpdInterface => {
                if !has {
                    state.types.push(interface.name.clone());
                }
                state.executed_get_methods.remove(&interface.name);
                self.accounts.execute_get_methods(interface, state, None).await;
            }
            RescanTaskType::AddGetMethod | RescanTaskType::UpdGetMethod => {
                if has {
                    self.accounts.execute_get_methods(interface, state, changed).await;
                }
            }
            RescanTaskType::DelGetMethod => {
                if has {
                    for method in &task.changed_get_methods {
                        remove_get_method(state, &interface.name, method);
                    }
                } else {
                    state.types.push(interface.name.clone());
                    self.accounts.execute_get_methods(interface, state, None).await;
                }
            }
            _ => {}
        }
    }
}
