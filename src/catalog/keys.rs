//! Catalog cache keys

use std::fmt;

/// Each key holds one full table of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKey {
    Interfaces,
    Operations,
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interfaces => write!(f, "catalog:interfaces"),
            Self::Operations => write!(f, "catalog:operations"),
        }
    }
}
