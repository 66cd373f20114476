//! Payload decoding: message bodies against operation schemas and account
//! classification against contract interfaces.

pub mod account;
pub mod message;

pub use account::AccountParser;
pub use message::{DirectedOutcome, MessageParser};

use crate::catalog::CatalogError;
use crate::models::{ContractDefinition, Schema};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid bag of cells: {0}")]
    InvalidBoc(String),

    #[error("schema mismatch: {0}")]
    Schema(String),
}

/// Binary cell decoding capability.
pub trait CellCodec: Send + Sync {
    /// Decodes a serialized cell into a JSON record following `schema`.
    fn decode(&self, schema: &Schema, boc: &[u8]) -> Result<serde_json::Value, CodecError>;

    /// Representation hash of the root cell.
    fn cell_hash(&self, boc: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Numeric id a get-method is dispatched by.
    fn method_id(&self, name: &str) -> i32;

    /// Replaces the named types schemas may refer to.
    fn register_definitions(&self, definitions: &[ContractDefinition]) -> Result<(), CodecError>;
}

#[derive(Error, Debug)]
pub enum ParseError {
    /// Nothing known describes the payload. Recorded, never propagated as a failure.
    #[error("impossible to parse: {0}")]
    Impossible(&'static str),

    #[error("decode {contract}/{operation}: {source}")]
    Decode {
        contract: String,
        operation: String,
        #[source]
        source: CodecError,
    },

    #[error("catalog: {0}")]
    Catalog(#[from] CatalogError),
}

impl ParseError {
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::Impossible(_))
    }
}
