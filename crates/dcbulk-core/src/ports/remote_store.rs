//! Remote store port (driven/secondary port)
//!
//! This module defines the interface to the hierarchical storage service:
//! path resolution, container creation, paged listings, file upload and
//! node deletion.
//!
//! ## Design Notes
//!
//! - Unlike most ports, errors are classified (`RemoteError`) because the
//!   upload pipeline branches on them: a lost creation race is recovered,
//!   a missing path is reported, everything else blocks the item.
//! - Timeouts and retries belong to the adapter and surface as `Transport`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::newtypes::{NodeId, RemotePath};
use crate::domain::node::RemoteNode;
use crate::domain::transfer::TaskFailure;

// ============================================================================
// Errors
// ============================================================================

/// Classified failure of a remote store call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The credentials do not allow the operation
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The addressed node does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The name is already taken under the parent
    #[error("conflict: {0}")]
    Conflict(String),

    /// Network, timeout or server failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<RemoteError> for TaskFailure {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unauthorized(msg) => Self::PermissionDenied(msg),
            RemoteError::NotFound(msg) => Self::PathInvalid(msg),
            RemoteError::Conflict(msg) => Self::Conflict(msg),
            RemoteError::Transport(msg) => Self::Transport(msg),
        }
    }
}

// ============================================================================
// DTOs
// ============================================================================

/// One page of a parent's children
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<RemoteNode>,
    pub offset: usize,
    /// Total number of children across all pages
    pub total: usize,
}

impl Page {
    /// Returns true if more children follow this page
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.offset + self.items.len() < self.total
    }
}

/// How an upload lands under its parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UploadAction {
    /// Create a new file with the given name
    Create { name: String },
    /// Replace the content of an existing file, keeping its id
    Replace { node_id: NodeId, name: String },
}

impl UploadAction {
    /// Final name of the uploaded file
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Create { name } | Self::Replace { name, .. } => name,
        }
    }
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for the storage service
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Resolve a hierarchy path to its node
    ///
    /// Returns `Ok(None)` when nothing exists at the path (and for the root,
    /// which is not a node).
    async fn resolve_path_to_node(&self, path: &RemotePath)
        -> Result<Option<RemoteNode>, RemoteError>;

    /// Create a folder under a room or folder
    async fn create_folder(&self, parent: NodeId, name: &str) -> Result<RemoteNode, RemoteError>;

    /// Create a room at the top level (`parent = None`) or below another room
    async fn create_room(
        &self,
        parent: Option<NodeId>,
        name: &str,
        inherit_perms: bool,
    ) -> Result<RemoteNode, RemoteError>;

    /// List one page of a container's children
    async fn list_children(
        &self,
        parent: NodeId,
        offset: usize,
        limit: usize,
    ) -> Result<Page, RemoteError>;

    /// Upload a local file under `parent`
    async fn upload_file(
        &self,
        source: &Path,
        parent: NodeId,
        action: &UploadAction,
    ) -> Result<RemoteNode, RemoteError>;

    /// Delete a node, its subtree included
    async fn delete_node(&self, node_id: NodeId) -> Result<(), RemoteError>;

    /// Release the session held by this store (token revocation)
    async fn close(&self) -> Result<(), RemoteError>;

    /// List one page of the top-level rooms
    ///
    /// Stores that cannot enumerate the top level answer `Unauthorized`.
    async fn list_root(&self, _offset: usize, _limit: usize) -> Result<Page, RemoteError> {
        Err(RemoteError::Unauthorized(
            "listing top-level rooms is not supported".to_string(),
        ))
    }

    /// List every top-level room by following pages
    async fn list_all_root(&self, page_size: usize) -> Result<Vec<RemoteNode>, RemoteError> {
        let page_size = page_size.max(1);
        let mut rooms = Vec::new();
        loop {
            let page = self.list_root(rooms.len(), page_size).await?;
            let fetched = page.items.len();
            let more = page.has_more();
            rooms.extend(page.items);
            if !more || fetched == 0 {
                break;
            }
        }
        Ok(rooms)
    }

    /// List every child of a container by following pages
    async fn list_all_children(
        &self,
        parent: NodeId,
        page_size: usize,
    ) -> Result<Vec<RemoteNode>, RemoteError> {
        let page_size = page_size.max(1);
        let mut children = Vec::new();
        loop {
            let page = self.list_children(parent, children.len(), page_size).await?;
            let fetched = page.items.len();
            let more = page.has_more();
            children.extend(page.items);
            if !more || fetched == 0 {
                break;
            }
        }
        Ok(children)
    }
}
