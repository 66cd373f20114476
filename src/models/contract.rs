use super::address::Address;
use super::message::MessageType;
use serde::{Deserialize, Serialize};

/// TL-B field description understood by the cell codec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema(pub serde_json::Value);

/// Named TL-B type that schemas may refer to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractDefinition {
    pub name: String,
    pub schema: Schema,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackValueDesc {
    pub name: String,
    pub stack_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Schema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetMethodDesc {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<StackValueDesc>,
    #[serde(default)]
    pub return_values: Vec<StackValueDesc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractInterface {
    pub name: String,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_hash: Option<Vec<u8>>,
    #[serde(default)]
    pub get_method_hashes: Vec<i32>,
    #[serde(default)]
    pub get_methods: Vec<GetMethodDesc>,
}

impl ContractInterface {
    pub fn get_method(&self, name: &str) -> Option<&GetMethodDesc> {
        self.get_methods.iter().find(|m| m.name == name)
    }

    /// Only interfaces without address and code criteria may be matched by
    /// their get-method set.
    pub fn matches_by_get_methods_only(&self) -> bool {
        self.addresses.is_empty() && self.code_hash.is_none() && !self.get_method_hashes.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractOperation {
    pub operation_name: String,
    pub contract_name: String,
    pub message_type: MessageType,
    pub outgoing: bool,
    pub operation_id: u32,
    pub schema: Schema,
}
