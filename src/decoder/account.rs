use crate::blockchain::client::ChainClient;
use crate::catalog::{match_interfaces, CatalogError, ContractCatalog};
use crate::models::{AccountState, Address, ContractInterface, GetMethodDesc, GetMethodExecution, StackValueDesc, VmValue};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Classifies account states against the catalog and runs the get-methods of
/// the matched interfaces.
#[derive(Clone)]
pub struct AccountParser {
    catalog: Arc<ContractCatalog>,
    client: Arc<dyn ChainClient>,
}

impl AccountParser {
    pub fn new(catalog: Arc<ContractCatalog>, client: Arc<dyn ChainClient>) -> Self {
        Self { catalog, client }
    }

    /// Replaces the interfaces, get-method results and derived fields of
    /// `state`. Get-method failures are recorded on the execution, not
    /// returned.
    pub async fn parse_account(&self, state: &mut AccountState) -> Result<(), CatalogError> {
        let interfaces = self.catalog.get_interfaces().await?;
        let matched = match_interfaces(&interfaces, state);

        state.clear_parsed_data();
        for interface in matched {
            state.types.push(interface.name.clone());
            self.execute_get_methods(interface, state, None).await;
        }
        derive_fields(state, &interfaces);

        Ok(())
    }

    /// Runs argument-less get-methods of `interface` on `state`, all of them
    /// or only those named in `only`, replacing earlier results.
    pub async fn execute_get_methods(
        &self,
        interface: &ContractInterface,
        state: &mut AccountState,
        only: Option<&[String]>,
    ) {
        for desc in &interface.get_methods {
            if !desc.arguments.is_empty() {
                continue;
            }
            if only.is_some_and(|names| !names.contains(&desc.name)) {
                continue;
            }

            let execution = self.execute_get_method(desc, state).await;
            let executions = state
                .executed_get_methods
                .entry(interface.name.clone())
                .or_default();
            executions.retain(|e| e.name != execution.name);
            executions.push(execution);
        }
    }

    async fn execute_get_method(&self, desc: &GetMethodDesc, state: &AccountState) -> GetMethodExecution {
        let mut execution = GetMethodExecution {
            name: desc.name.clone(),
            ..Default::default()
        };

        match self
            .client
            .run_get_method(&state.address, &state.block, &desc.name, &[])
            .await
        {
            Ok(values) => match self.decode_returns(&desc.return_values, &values) {
                Ok(returns) => execution.returns = returns,
                Err(e) => execution.error = Some(e),
            },
            Err(e) => {
                debug!("Get-method {} on {} failed: {}", desc.name, state.address, e);
                execution.error = Some(e.to_string());
            }
        }

        execution
    }

    fn decode_returns(&self, descs: &[StackValueDesc], values: &[VmValue]) -> Result<Vec<Value>, String> {
        descs
            .iter()
            .zip(values)
            .map(|(desc, value)| match (value, &desc.format) {
                (VmValue::Null, _) => Ok(Value::Null),
                (VmValue::Int(n), _) => Ok(Value::String(n.clone())),
                (VmValue::Cell(boc) | VmValue::Slice(boc), Some(schema)) => self
                    .catalog
                    .codec()
                    .decode(schema, boc)
                    .map_err(|e| format!("decode {}: {}", desc.name, e)),
                (VmValue::Cell(boc) | VmValue::Slice(boc), None) => Ok(Value::String(hex::encode(boc))),
            })
            .collect()
    }
}

/// Drops the results of `method` of `contract_name` from `state`.
pub fn remove_get_method(state: &mut AccountState, contract_name: &str, method: &str) {
    if let Some(executions) = state.executed_get_methods.get_mut(contract_name) {
        executions.retain(|e| e.name != method);
        if executions.is_empty() {
            state.executed_get_methods.remove(contract_name);
        }
    }
}

/// Drops the interface and its get-method results from `state`.
pub fn remove_interface(state: &mut AccountState, contract_name: &str) {
    state.types.retain(|t| t != contract_name);
    state.executed_get_methods.remove(contract_name);
}

/// Fills owner, minter, content and jetton balance from get-method results,
/// using the return value names of the interface descriptors.
pub fn derive_fields(state: &mut AccountState, interfaces: &[ContractInterface]) {
    state.clear_derived_fields();

    let mut named: Vec<(String, Value)> = Vec::new();
    for (contract, executions) in &state.executed_get_methods {
        let Some(interface) = interfaces.iter().find(|i| &i.name == contract) else {
            continue;
        };
        for execution in executions {
            let Some(desc) = interface.get_method(&execution.name) else {
                continue;
            };
            named.extend(
                desc.return_values
                    .iter()
                    .zip(&execution.returns)
                    .map(|(ret, value)| (ret.name.clone(), value.clone())),
            );
        }
    }

    for (name, value) in named {
        match name.as_str() {
            "owner" | "owner_address" => state.owner_address = value_address(&value),
            "minter" | "minter_address" | "jetton_master" | "collection_address" => {
                state.minter_address = value_address(&value)
            }
            "balance" | "jetton_balance" => state.jetton_balance = value_string(&value),
            "content" | "individual_content" => apply_content(state, &value),
            "content_uri" => state.content_uri = value_string(&value),
            _ => {}
        }
    }
}

fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_address(value: &Value) -> Option<Address> {
    value.as_str().and_then(|s| s.parse().ok())
}

fn apply_content(state: &mut AccountState, value: &Value) {
    let field = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

    if let Some(uri) = field("uri") {
        state.content_uri = Some(uri);
    }
    state.content_name = field("name");
    state.content_description = field("description");
    state.content_image = field("image");
}
