//! dcbulk Sync - Bulk upload orchestration
//!
//! Provides:
//! - Ordered local tree traversal
//! - Level-by-level remote folder replication
//! - Bounded-concurrency upload scheduling with conflict resolution
//! - Room key distribution for encrypted destinations
//!
//! ## Modules
//!
//! - [`walker`] - Depth-first, name-ordered local tree walk
//! - [`replicator`] - Ensures the remote folder structure mirrors the local tree
//! - [`scheduler`] - Dispatches per-file uploads under a concurrency limit
//! - [`keys`] - Equips room members with the room's content key
//! - [`engine`] - The upload use case wiring the steps together
//! - [`mirror`] - Directory-backed remote store adapter

pub mod engine;
pub mod keys;
pub mod mirror;
pub mod replicator;
pub mod scheduler;
pub mod walker;

use std::path::PathBuf;

use thiserror::Error;

use dcbulk_core::domain::{NodeId, NodeType, RemotePath};
use dcbulk_core::ports::{CryptoError, RemoteError};
use dcbulk_core::session::SessionError;

/// Errors raised while walking a local tree
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalkError {
    /// The walk root is missing or not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A file or directory name is not valid UTF-8
    #[error("Name is not valid UTF-8: {0}")]
    NonUtf8Name(PathBuf),

    /// An entry could not be read
    #[error("Failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// The blocking traversal task did not finish
    #[error("Traversal interrupted: {0}")]
    Interrupted(String),
}

/// Errors that make key distribution impossible for a room
#[derive(Debug, Error)]
pub enum KeyDistributionError {
    #[error("Cannot distribute keys for a {node_type} (node {node_id})")]
    InvalidTarget { node_id: NodeId, node_type: NodeType },

    #[error("Encrypted folder {0} has no authoritative parent room")]
    MissingAuthParent(NodeId),

    #[error("Failed to list members of room {room_id}: {source}")]
    MembersUnavailable {
        room_id: NodeId,
        #[source]
        source: CryptoError,
    },

    #[error("Failed to list key holders of room {room_id}: {source}")]
    HoldersUnavailable {
        room_id: NodeId,
        #[source]
        source: CryptoError,
    },

    #[error("Failed to obtain content key of room {room_id}: {source}")]
    ContentKeyUnavailable {
        room_id: NodeId,
        #[source]
        source: CryptoError,
    },
}

/// Failures of a standalone key distribution run
#[derive(Debug, Error)]
pub enum DistributeError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Target not found: {0}")]
    TargetNotFound(RemotePath),

    #[error("Room {0} is encrypted but no crypto provider is available")]
    CryptoUnavailable(NodeId),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Keys(#[from] KeyDistributionError),
}

/// Precondition failures of an upload run
///
/// Per-file and per-user failures are reported in the results instead.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Destination not found: {0}")]
    DestinationNotFound(RemotePath),

    #[error("Destination {path} is a {node_type}, expected a room or folder")]
    InvalidDestination { path: RemotePath, node_type: NodeType },

    #[error("Destination room {0} is encrypted but no crypto provider is available")]
    CryptoUnavailable(NodeId),

    #[error("{0} is a directory; recursive upload was not requested")]
    RecursiveRequired(PathBuf),

    #[error("Invalid source: {0}")]
    InvalidSource(PathBuf),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Walk error: {0}")]
    Walk(#[from] WalkError),

    #[error("Key distribution error: {0}")]
    Keys(#[from] KeyDistributionError),
}
