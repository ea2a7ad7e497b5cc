//! Room key distribution
//!
//! After files land in an encrypted room, every member of that room needs a
//! personal copy of the room's content key. The engine compares membership
//! with the existing key records and equips each member that lacks one.
//! Members are handled independently; one failure never stops the others.
//!
//! Distribution also runs on its own through [`distribute_for_path`], for
//! rooms whose members joined after the last upload.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use dcbulk_core::domain::{
    ContentKey, KeyAssignment, KeyDistributionResult, KeyFailure, NodeId, NodeType, RemoteNode,
    RemotePath, UserId,
};
use dcbulk_core::ports::{CryptoError, ICryptoProvider};
use dcbulk_core::session::Session;

use crate::{DistributeError, KeyDistributionError};

/// Default number of members equipped concurrently
pub const DEFAULT_KEY_CONCURRENCY: usize = 4;

/// Room whose key scope covers uploads into `target`
///
/// A room is its own scope; a folder belongs to its `auth_parent_id`.
/// Unencrypted targets need no distribution and yield `None`.
///
/// # Errors
/// Returns an error for file targets and for encrypted folders without an
/// authoritative parent
pub fn room_for_target(target: &RemoteNode) -> Result<Option<NodeId>, KeyDistributionError> {
    match target.node_type {
        NodeType::File => Err(KeyDistributionError::InvalidTarget {
            node_id: target.id,
            node_type: target.node_type,
        }),
        _ if !target.is_encrypted => Ok(None),
        NodeType::Room => Ok(Some(target.id)),
        NodeType::Folder => target
            .auth_parent_id
            .map(Some)
            .ok_or(KeyDistributionError::MissingAuthParent(target.id)),
    }
}

/// Equip the members of the room covering `path` that lack a key record
///
/// Returns `Ok(None)` when the target is not encrypted.
///
/// # Errors
/// Returns `DistributeError` when the target is missing or is a file, when
/// the session has no crypto provider for an encrypted target, or when the
/// room's key state cannot be enumerated
pub async fn distribute_for_path(
    session: &Session,
    path: &RemotePath,
    concurrency: usize,
) -> Result<Option<KeyDistributionResult>, DistributeError> {
    let target = session
        .store()?
        .resolve_path_to_node(path)
        .await?
        .ok_or_else(|| DistributeError::TargetNotFound(path.clone()))?;

    let Some(room_id) = room_for_target(&target)? else {
        debug!(path = %path, "Target is not encrypted, no keys to distribute");
        return Ok(None);
    };
    let crypto = session
        .crypto()?
        .cloned()
        .ok_or(DistributeError::CryptoUnavailable(room_id))?;

    let result = KeyDistributionEngine::new(crypto)
        .with_concurrency(concurrency)
        .distribute(room_id)
        .await?;
    Ok(Some(result))
}

/// Equips room members with the room's content key
pub struct KeyDistributionEngine {
    crypto: Arc<dyn ICryptoProvider>,
    concurrency: usize,
}

impl KeyDistributionEngine {
    pub fn new(crypto: Arc<dyn ICryptoProvider>) -> Self {
        Self {
            crypto,
            concurrency: DEFAULT_KEY_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Current key state of every member of `room_id`, sorted by user
    ///
    /// Always queried fresh from the provider.
    pub async fn assess(&self, room_id: NodeId) -> Result<Vec<KeyAssignment>, KeyDistributionError> {
        let (members, holders) = tokio::join!(
            self.crypto.list_room_members(room_id),
            self.crypto.list_users_with_key_record(room_id),
        );
        let members: BTreeSet<UserId> = members
            .map_err(|source| KeyDistributionError::MembersUnavailable { room_id, source })?
            .into_iter()
            .collect();
        let holders: HashSet<UserId> = holders
            .map_err(|source| KeyDistributionError::HoldersUnavailable { room_id, source })?
            .into_iter()
            .collect();

        Ok(members
            .into_iter()
            .map(|user_id| KeyAssignment {
                user_id,
                room_id,
                has_key: holders.contains(&user_id),
            })
            .collect())
    }

    /// Equip every member of `room_id` that has no key record yet
    ///
    /// # Errors
    /// Fails only when membership, key records or the content key cannot be
    /// obtained; per-member failures are listed in the result
    pub async fn distribute(
        &self,
        room_id: NodeId,
    ) -> Result<KeyDistributionResult, KeyDistributionError> {
        let assignments = self.assess(room_id).await?;
        let missing: Vec<UserId> = assignments
            .iter()
            .filter(|a| !a.has_key)
            .map(|a| a.user_id)
            .collect();

        info!(
            room_id = %room_id,
            members = assignments.len(),
            missing = missing.len(),
            "Distributing room keys"
        );

        let mut result = KeyDistributionResult::empty(room_id);
        if missing.is_empty() {
            return Ok(result);
        }

        let key = self
            .crypto
            .get_room_content_key(room_id)
            .await
            .map_err(|source| KeyDistributionError::ContentKeyUnavailable { room_id, source })?;

        let outcomes: Vec<(UserId, Result<(), CryptoError>)> = stream::iter(missing)
            .map(|user_id| {
                let key = &key;
                async move { (user_id, self.equip(room_id, user_id, key).await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (user_id, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    debug!(room_id = %room_id, user_id = %user_id, "Key record stored");
                    result.equipped.push(user_id);
                }
                Err(e) => {
                    warn!(room_id = %room_id, user_id = %user_id, error = %e, "Key distribution failed");
                    result.failed.push(KeyFailure {
                        user_id,
                        cause: e.to_string(),
                    });
                }
            }
        }
        result.equipped.sort();
        result.failed.sort_by_key(|f| f.user_id);

        info!(
            room_id = %room_id,
            equipped = result.equipped.len(),
            failed = result.failed.len(),
            "Room keys distributed"
        );
        Ok(result)
    }

    async fn equip(&self, room_id: NodeId, user_id: UserId, key: &ContentKey) -> Result<(), CryptoError> {
        let public_key = self.crypto.get_user_public_key(user_id).await?;
        let encrypted = self.crypto.encrypt_key_for_user(key, &public_key).await?;
        self.crypto.store_user_key(room_id, &encrypted).await
    }
}
