//! Key distribution vocabulary
//!
//! Key material is opaque to this crate: the crypto provider produces and
//! consumes it, the engine only moves it around.

use serde::{Deserialize, Serialize};

use super::newtypes::{NodeId, UserId};

/// A room's symmetric content key, in whatever form the provider hands out
#[derive(Clone, PartialEq, Eq)]
pub struct ContentKey(Vec<u8>);

impl ContentKey {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentKey([REDACTED; {}])", self.0.len())
    }
}

/// A user's public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub user_id: UserId,
    /// Algorithm identifier as reported by the provider
    pub algorithm: String,
    pub material: Vec<u8>,
}

/// The content key encrypted for a single recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKey {
    pub user_id: UserId,
    pub material: Vec<u8>,
}

/// A member of a room and whether they already hold the content key
///
/// Computed fresh on every run; never cached or persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAssignment {
    pub user_id: UserId,
    pub room_id: NodeId,
    pub has_key: bool,
}

/// Per-user key distribution failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFailure {
    pub user_id: UserId,
    pub cause: String,
}

/// Outcome of distributing a room's content key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDistributionResult {
    pub room_id: NodeId,
    /// Users who received a key record in this run
    pub equipped: Vec<UserId>,
    /// Users for whom the key record could not be stored
    pub failed: Vec<KeyFailure>,
}

impl KeyDistributionResult {
    #[must_use]
    pub fn empty(room_id: NodeId) -> Self {
        Self {
            room_id,
            equipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Returns true if some users could not be equipped
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}
