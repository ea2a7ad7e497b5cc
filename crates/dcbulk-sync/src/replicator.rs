//! Remote folder structure replication
//!
//! Mirrors the directories of a local tree below a remote destination.
//! Directories are processed one depth level at a time: every folder of a
//! level has resolved (created, reused or blocked) before any folder of the
//! next level is attempted. Siblings within a level run concurrently.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dcbulk_core::domain::{LocalEntry, NodeId, RemoteNode, RemotePath, TaskFailure};
use dcbulk_core::ports::{IRemoteStore, RemoteError};

/// Mapping from local relative directory paths to remote folders
#[derive(Debug, Clone, Default)]
pub struct FolderMap {
    /// Resolved folders; the empty path maps to the destination itself
    pub nodes: HashMap<Vec<String>, NodeId>,
    /// Directories that could not be mirrored, with the cause
    pub blocked: BTreeMap<Vec<String>, TaskFailure>,
    pub created: usize,
    pub reused: usize,
}

impl FolderMap {
    fn rooted_at(destination: NodeId) -> Self {
        let mut map = Self::default();
        map.nodes.insert(Vec::new(), destination);
        map
    }

    /// Remote folder for a local relative directory path
    pub fn node_for(&self, relative: &[String]) -> Option<NodeId> {
        self.nodes.get(relative).copied()
    }

    /// Cause that prevents uploading `entry`, if its directory is blocked
    pub fn skip_cause(&self, entry: &LocalEntry) -> Option<TaskFailure> {
        let parent = entry.parent_relative();
        let cause = self.blocked.get(parent)?;
        Some(Self::inherited(parent, cause))
    }

    fn block(&mut self, relative: Vec<String>, cause: TaskFailure) {
        self.blocked.insert(relative, cause);
    }

    /// Cause recorded for something below the blocked directory `branch`
    fn inherited(branch: &[String], cause: &TaskFailure) -> TaskFailure {
        match cause {
            TaskFailure::Cancelled | TaskFailure::BranchBlocked { .. } => cause.clone(),
            other => TaskFailure::BranchBlocked {
                branch: branch.join("/"),
                reason: other.to_string(),
            },
        }
    }
}

/// Result of ensuring a single folder
enum Ensured {
    Created(NodeId),
    Reused(NodeId),
    Blocked(TaskFailure),
}

/// Ensures remote folders exist for every local directory
pub struct FolderStructureReplicator {
    store: Arc<dyn IRemoteStore>,
    concurrency: usize,
}

impl FolderStructureReplicator {
    pub fn new(store: Arc<dyn IRemoteStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Mirror the directory entries of `entries` below `destination`
    ///
    /// Never fails as a whole: unresolvable directories are recorded in
    /// `FolderMap::blocked` and the rest of the tree proceeds.
    pub async fn replicate(
        &self,
        destination: &RemoteNode,
        destination_path: &RemotePath,
        entries: &[LocalEntry],
        cancel: &CancellationToken,
    ) -> FolderMap {
        let mut map = FolderMap::rooted_at(destination.id);

        let mut levels: BTreeMap<usize, Vec<&LocalEntry>> = BTreeMap::new();
        for dir in entries.iter().filter(|e| e.is_dir()) {
            levels.entry(dir.depth()).or_default().push(dir);
        }

        info!(
            destination = %destination_path,
            directories = levels.values().map(Vec::len).sum::<usize>(),
            levels = levels.len(),
            "Replicating folder structure"
        );

        for (depth, dirs) in levels {
            if cancel.is_cancelled() {
                warn!(depth, remaining = dirs.len(), "Replication cancelled");
                for dir in dirs {
                    map.block(dir.relative_path().to_vec(), TaskFailure::Cancelled);
                }
                continue;
            }

            let mut jobs = Vec::with_capacity(dirs.len());
            for dir in dirs {
                let relative = dir.relative_path().to_vec();
                let parent = dir.parent_relative();

                if let Some(cause) = map.blocked.get(parent) {
                    let cause = FolderMap::inherited(parent, cause);
                    debug!(path = %dir.display_path(), "Parent blocked, skipping");
                    map.block(relative, cause);
                    continue;
                }
                let Some(parent_id) = map.node_for(parent) else {
                    map.block(
                        relative,
                        TaskFailure::PathInvalid(format!("no remote parent for {}", dir.display_path())),
                    );
                    continue;
                };
                let remote_path = match destination_path.join_all(dir.relative_path()) {
                    Ok(path) => path,
                    Err(e) => {
                        map.block(relative, TaskFailure::PathInvalid(e.to_string()));
                        continue;
                    }
                };
                jobs.push((relative, parent_id, remote_path, dir.name().to_string()));
            }

            let results: Vec<(Vec<String>, Ensured)> = stream::iter(jobs)
                .map(|(relative, parent_id, remote_path, name)| async move {
                    let ensured = self.ensure_folder(parent_id, &remote_path, &name).await;
                    (relative, ensured)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

            for (relative, ensured) in results {
                match ensured {
                    Ensured::Created(id) => {
                        map.created += 1;
                        map.nodes.insert(relative, id);
                    }
                    Ensured::Reused(id) => {
                        map.reused += 1;
                        map.nodes.insert(relative, id);
                    }
                    Ensured::Blocked(cause) => {
                        warn!(path = %relative.join("/"), cause = %cause, "Folder branch blocked");
                        map.block(relative, cause);
                    }
                }
            }
        }

        info!(
            created = map.created,
            reused = map.reused,
            blocked = map.blocked.len(),
            "Folder structure replicated"
        );
        map
    }

    async fn ensure_folder(&self, parent: NodeId, path: &RemotePath, name: &str) -> Ensured {
        match self.store.resolve_path_to_node(path).await {
            Ok(Some(node)) => Self::classify_existing(node, name),
            Ok(None) => match self.store.create_folder(parent, name).await {
                Ok(node) => {
                    debug!(path = %path, node_id = %node.id, "Folder created");
                    Ensured::Created(node.id)
                }
                Err(RemoteError::Conflict(_)) => {
                    debug!(path = %path, "Folder appeared concurrently, re-reading");
                    match self.store.resolve_path_to_node(path).await {
                        Ok(Some(node)) => Self::classify_existing(node, name),
                        Ok(None) => Ensured::Blocked(TaskFailure::Conflict(name.to_string())),
                        Err(e) => Ensured::Blocked(e.into()),
                    }
                }
                Err(e) => Ensured::Blocked(e.into()),
            },
            Err(e) => Ensured::Blocked(e.into()),
        }
    }

    fn classify_existing(node: RemoteNode, name: &str) -> Ensured {
        if node.is_folder() {
            Ensured::Reused(node.id)
        } else {
            Ensured::Blocked(TaskFailure::StructuralConflict {
                name: name.to_string(),
                existing: node.node_type,
            })
        }
    }
}
