use crate::identifier::Id;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A ring participant: `(id, address)`. Two peers are equal iff their ids
/// are equal — `address` is only a routing hint, never part of identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    pub id: Id,
    pub address: String,
}

impl Peer {
    pub fn new(id: Id, address: impl Into<String>) -> Self {
        Peer {
            id,
            address: address.into(),
        }
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Peer {}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}
