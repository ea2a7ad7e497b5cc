//! Domain entities and value objects
//!
//! This module contains the core domain model for dcbulk:
//! - Newtypes for type-safe identifiers and hierarchy paths
//! - Remote nodes and local entries
//! - Transfer tasks, resolution strategies and batch results
//! - Key distribution vocabulary

pub mod errors;
pub mod keys;
pub mod local_entry;
pub mod newtypes;
pub mod node;
pub mod transfer;

pub use errors::{DomainError, PathParseError};
pub use keys::{
    ContentKey, EncryptedKey, KeyAssignment, KeyDistributionResult, KeyFailure, PublicKey,
};
pub use local_entry::{EntryKind, LocalEntry};
pub use newtypes::{NodeId, RemotePath, SessionId, TaskId, UserId};
pub use node::{NodeType, RemoteNode};
pub use transfer::{
    BatchResult, FailedTask, ResolutionStrategy, SkippedEntry, TaskFailure, TaskStatus,
    TransferTask, UploadedFile, Velocity,
};
