//! Remote node entity
//!
//! A `RemoteNode` is the client-side view of a room, folder or file that
//! exists on the storage service.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::newtypes::NodeId;

/// Kind of a remote node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Permission (and optional encryption) boundary
    Room,
    Folder,
    File,
}

impl NodeType {
    /// Returns true for node types that may hold children
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Room | Self::Folder)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Room => "room",
            Self::Folder => "folder",
            Self::File => "file",
        }
    }
}

impl Display for NodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A node on the storage service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    pub id: NodeId,
    pub name: String,
    pub node_type: NodeType,
    /// `None` for top-level rooms
    pub parent_id: Option<NodeId>,
    pub is_encrypted: bool,
    /// Nearest ancestor room establishing the encryption scope
    pub auth_parent_id: Option<NodeId>,
    pub size: u64,
}

impl RemoteNode {
    #[must_use]
    pub fn is_room(&self) -> bool {
        self.node_type == NodeType::Room
    }

    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.node_type == NodeType::Folder
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.node_type == NodeType::File
    }

    #[must_use]
    pub fn is_container(&self) -> bool {
        self.node_type.is_container()
    }
}
