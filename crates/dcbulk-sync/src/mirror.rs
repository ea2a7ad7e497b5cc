//! Directory-backed remote store
//!
//! `MirrorStore` implements [`IRemoteStore`] on top of a local directory so
//! the command-line client has a working backend without a storage server.
//!
//! Layout rules:
//! - directories directly below the store root are rooms,
//! - deeper directories holding a `.dcroom` marker file are rooms,
//! - every other directory is a folder, every regular file a file.
//!
//! Node ids are issued on first sight of a path and stay stable for the
//! lifetime of the store. Nothing is encrypted. No path ever leaves the store
//! root: names are single plain segments and lookups refuse anything else.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, info};

use dcbulk_core::domain::{NodeId, NodeType, RemoteNode, RemotePath};
use dcbulk_core::ports::{IRemoteStore, Page, RemoteError, UploadAction};

/// Marker file turning a nested directory into a room
pub const ROOM_MARKER: &str = ".dcroom";

/// Remote store adapter over a local directory
pub struct MirrorStore {
    root: PathBuf,
    ids_by_path: DashMap<PathBuf, NodeId>,
    paths_by_id: DashMap<NodeId, PathBuf>,
    next_id: AtomicU64,
}

fn io_to_remote(err: io::Error, path: &Path) -> RemoteError {
    let msg = format!("{}: {err}", path.display());
    match err.kind() {
        io::ErrorKind::NotFound => RemoteError::NotFound(msg),
        io::ErrorKind::PermissionDenied => RemoteError::Unauthorized(msg),
        io::ErrorKind::AlreadyExists => RemoteError::Conflict(msg),
        _ => RemoteError::Transport(msg),
    }
}

/// A name usable as one child below a container
fn child_name(name: &str) -> Result<&str, RemoteError> {
    if name == ROOM_MARKER {
        return Err(RemoteError::Unauthorized(format!("{name} is a reserved name")));
    }
    RemotePath::check_segment(name)
        .map(|()| name)
        .map_err(|e| RemoteError::Unauthorized(e.to_string()))
}

/// Non-empty and made of plain names only
fn is_contained(relative: &Path) -> bool {
    relative.components().next().is_some()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

impl MirrorStore {
    /// Open a store rooted at `root`, creating the directory if needed
    ///
    /// # Errors
    /// Returns an I/O error if the root cannot be created
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        info!(root = %root.display(), "Mirror store opened");
        Ok(Self {
            root,
            ids_by_path: DashMap::new(),
            paths_by_id: DashMap::new(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stable id for a path relative to the root
    fn id_for(&self, relative: &Path) -> NodeId {
        let id = *self
            .ids_by_path
            .entry(relative.to_path_buf())
            .or_insert_with(|| NodeId::new(self.next_id.fetch_add(1, Ordering::Relaxed)));
        self.paths_by_id.entry(id).or_insert_with(|| relative.to_path_buf());
        id
    }

    fn relative_of(&self, id: NodeId) -> Result<PathBuf, RemoteError> {
        self.paths_by_id
            .get(&id)
            .map(|p| p.value().clone())
            .ok_or_else(|| RemoteError::NotFound(format!("node {id}")))
    }

    async fn is_room_dir(&self, relative: &Path) -> bool {
        relative.components().count() == 1
            || tokio::fs::try_exists(self.root.join(relative).join(ROOM_MARKER))
                .await
                .unwrap_or(false)
    }

    /// Build the node for an existing relative path
    async fn node_at(&self, relative: &Path) -> Result<RemoteNode, RemoteError> {
        if !is_contained(relative) {
            return Err(RemoteError::NotFound(relative.display().to_string()));
        }
        let absolute = self.root.join(relative);
        let meta = tokio::fs::metadata(&absolute)
            .await
            .map_err(|e| io_to_remote(e, &absolute))?;

        let node_type = if meta.is_dir() {
            if self.is_room_dir(relative).await {
                NodeType::Room
            } else {
                NodeType::Folder
            }
        } else {
            NodeType::File
        };

        let parent_relative = relative.parent().filter(|p| !p.as_os_str().is_empty());
        let parent_id = parent_relative.map(|p| self.id_for(p));

        let auth_parent_id = if node_type == NodeType::Room {
            None
        } else {
            let mut ancestor = parent_relative;
            let mut room = None;
            while let Some(dir) = ancestor {
                if self.is_room_dir(dir).await {
                    room = Some(self.id_for(dir));
                    break;
                }
                ancestor = dir.parent().filter(|p| !p.as_os_str().is_empty());
            }
            room
        };

        let name = relative
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        Ok(RemoteNode {
            id: self.id_for(relative),
            name,
            node_type,
            parent_id,
            is_encrypted: false,
            auth_parent_id,
            size: if meta.is_file() { meta.len() } else { 0 },
        })
    }

    async fn container_path(&self, id: NodeId) -> Result<PathBuf, RemoteError> {
        let relative = self.relative_of(id)?;
        let node = self.node_at(&relative).await?;
        if !node.is_container() {
            return Err(RemoteError::Conflict(format!("node {id} is a file")));
        }
        Ok(relative)
    }
}

#[async_trait::async_trait]
impl IRemoteStore for MirrorStore {
    async fn resolve_path_to_node(
        &self,
        path: &RemotePath,
    ) -> Result<Option<RemoteNode>, RemoteError> {
        if path.is_root() {
            return Ok(None);
        }
        let relative: PathBuf = path.segments().iter().collect();
        match self.node_at(&relative).await {
            Ok(node) => Ok(Some(node)),
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_folder(&self, parent: NodeId, name: &str) -> Result<RemoteNode, RemoteError> {
        let relative = self.container_path(parent).await?.join(child_name(name)?);
        let absolute = self.root.join(&relative);
        tokio::fs::create_dir(&absolute)
            .await
            .map_err(|e| io_to_remote(e, &absolute))?;
        debug!(path = %relative.display(), "Folder created");
        self.node_at(&relative).await
    }

    async fn create_room(
        &self,
        parent: Option<NodeId>,
        name: &str,
        inherit_perms: bool,
    ) -> Result<RemoteNode, RemoteError> {
        let name = child_name(name)?;
        let relative = match parent {
            None => PathBuf::from(name),
            Some(id) => {
                let parent_relative = self.relative_of(id)?;
                if self.node_at(&parent_relative).await?.node_type != NodeType::Room {
                    return Err(RemoteError::Unauthorized(format!(
                        "rooms can only be created inside rooms (node {id})"
                    )));
                }
                parent_relative.join(name)
            }
        };
        let absolute = self.root.join(&relative);
        tokio::fs::create_dir(&absolute)
            .await
            .map_err(|e| io_to_remote(e, &absolute))?;
        if parent.is_some() {
            let marker = absolute.join(ROOM_MARKER);
            tokio::fs::write(&marker, b"")
                .await
                .map_err(|e| io_to_remote(e, &marker))?;
        }
        debug!(path = %relative.display(), inherit_perms, "Room created");
        self.node_at(&relative).await
    }

    async fn list_children(
        &self,
        parent: NodeId,
        offset: usize,
        limit: usize,
    ) -> Result<Page, RemoteError> {
        let relative = self.container_path(parent).await?;
        let absolute = self.root.join(&relative);

        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&absolute)
            .await
            .map_err(|e| io_to_remote(e, &absolute))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| io_to_remote(e, &absolute))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if name != ROOM_MARKER {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        let total = names.len();
        let mut items = Vec::new();
        for name in names.into_iter().skip(offset).take(limit) {
            items.push(self.node_at(&relative.join(name)).await?);
        }
        Ok(Page {
            items,
            offset,
            total,
        })
    }

    async fn upload_file(
        &self,
        source: &Path,
        parent: NodeId,
        action: &UploadAction,
    ) -> Result<RemoteNode, RemoteError> {
        let relative = match action {
            UploadAction::Create { name } => {
                let relative = self.container_path(parent).await?.join(child_name(name)?);
                if tokio::fs::try_exists(self.root.join(&relative))
                    .await
                    .unwrap_or(false)
                {
                    return Err(RemoteError::Conflict(name.clone()));
                }
                relative
            }
            UploadAction::Replace { node_id, .. } => {
                let relative = self.relative_of(*node_id)?;
                if !self.node_at(&relative).await?.is_file() {
                    return Err(RemoteError::Conflict(format!("node {node_id} is not a file")));
                }
                relative
            }
        };

        let target = self.root.join(&relative);
        tokio::fs::copy(source, &target)
            .await
            .map_err(|e| io_to_remote(e, &target))?;
        debug!(source = %source.display(), target = %relative.display(), "File stored");
        self.node_at(&relative).await
    }

    async fn delete_node(&self, node_id: NodeId) -> Result<(), RemoteError> {
        let relative = self.relative_of(node_id)?;
        let node = self.node_at(&relative).await?;
        let absolute = self.root.join(&relative);
        let removed = if node.is_container() {
            tokio::fs::remove_dir_all(&absolute).await
        } else {
            tokio::fs::remove_file(&absolute).await
        };
        removed.map_err(|e| io_to_remote(e, &absolute))?;

        self.ids_by_path.retain(|path, _| !path.starts_with(&relative));
        self.paths_by_id.retain(|_, path| !path.starts_with(&relative));
        debug!(path = %relative.display(), node_type = %node.node_type, "Node deleted");
        Ok(())
    }

    async fn close(&self) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn list_root(&self, offset: usize, limit: usize) -> Result<Page, RemoteError> {
        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| io_to_remote(e, &self.root))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| io_to_remote(e, &self.root))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| io_to_remote(e, &entry.path()))?
                .is_dir();
            if let (true, Some(name)) = (is_dir, entry.file_name().to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();

        let total = names.len();
        let mut items = Vec::new();
        for name in names.into_iter().skip(offset).take(limit) {
            items.push(self.node_at(Path::new(&name)).await?);
        }
        Ok(Page {
            items,
            offset,
            total,
        })
    }
}
