use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MASTERCHAIN: i32 = -1;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddressError {
    #[error("Missing workchain separator in {0}")]
    MissingSeparator(String),

    #[error("Invalid workchain in {0}")]
    InvalidWorkchain(String),

    #[error("Invalid account id in {0}")]
    InvalidAccountId(String),
}

/// Account address in raw form: workchain and 256-bit account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub workchain: i32,
    pub id: [u8; 32],
}

impl Address {
    pub fn new(workchain: i32, id: [u8; 32]) -> Self {
        Self { workchain, id }
    }

    pub fn is_masterchain(&self) -> bool {
        self.workchain == MASTERCHAIN
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::new(0, [0; 32])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workchain, hex::encode(self.id))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (workchain, id) = s
            .split_once(':')
            .ok_or_else(|| AddressError::MissingSeparator(s.to_string()))?;

        let workchain = workchain
            .parse()
            .map_err(|_| AddressError::InvalidWorkchain(s.to_string()))?;

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(id, &mut bytes)
            .map_err(|_| AddressError::InvalidAccountId(s.to_string()))?;

        Ok(Self::new(workchain, bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
