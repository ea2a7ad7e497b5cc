//! Crypto provider port (driven/secondary port)
//!
//! Everything the key distribution step needs from the encryption layer:
//! member and key-holder enumeration, public key lookup, the encryption
//! primitive itself and storage of the per-user key record.

use thiserror::Error;

use crate::domain::keys::{ContentKey, EncryptedKey, PublicKey};
use crate::domain::newtypes::{NodeId, UserId};

/// Failure of a crypto provider call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The user has no usable key pair
    #[error("user {0} has no public key")]
    MissingPublicKey(UserId),

    /// The underlying encryption primitive failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Port trait for the end-to-end encryption layer
#[async_trait::async_trait]
pub trait ICryptoProvider: Send + Sync {
    /// Decrypted content key of a room, usable by the current user
    async fn get_room_content_key(&self, room_id: NodeId) -> Result<ContentKey, CryptoError>;

    /// Users authorized on the room
    async fn list_room_members(&self, room_id: NodeId) -> Result<Vec<UserId>, CryptoError>;

    /// Users that already hold a key record for the room
    async fn list_users_with_key_record(&self, room_id: NodeId)
        -> Result<Vec<UserId>, CryptoError>;

    async fn get_user_public_key(&self, user_id: UserId) -> Result<PublicKey, CryptoError>;

    /// Encrypt the content key for one recipient
    async fn encrypt_key_for_user(
        &self,
        key: &ContentKey,
        public_key: &PublicKey,
    ) -> Result<EncryptedKey, CryptoError>;

    /// Persist a per-user key record on the room
    async fn store_user_key(
        &self,
        room_id: NodeId,
        encrypted: &EncryptedKey,
    ) -> Result<(), CryptoError>;
}
