//! Transfer task entities
//!
//! This module contains the vocabulary of a bulk upload: how name collisions
//! are resolved, how aggressively the batch runs, the per-file task with its
//! lifecycle, and the aggregate result of a batch.
//!
//! ## Task lifecycle
//!
//! ```text
//! Queued ──► InFlight ──► Completed
//!               │
//!               └──────► Failed
//! ```
//!
//! Both terminal states are final. A task that is never dispatched stays
//! `Queued` and is reported as a skipped entry instead.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::errors::DomainError;
use super::local_entry::LocalEntry;
use super::newtypes::{NodeId, TaskId};
use super::node::{NodeType, RemoteNode};

// ============================================================================
// Resolution strategy
// ============================================================================

/// What to do when an upload's target name is already taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Leave the existing node untouched and fail the task
    #[default]
    Fail,
    /// Replace an existing file, keeping its identity
    Overwrite,
    /// Pick a fresh name of the form `stem (n).ext`
    Autorename,
}

impl ResolutionStrategy {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Overwrite => "overwrite",
            Self::Autorename => "autorename",
        }
    }
}

impl Display for ResolutionStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResolutionStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "overwrite" => Ok(Self::Overwrite),
            "autorename" | "auto_rename" | "auto-rename" => Ok(Self::Autorename),
            other => Err(DomainError::InvalidStrategy(other.to_string())),
        }
    }
}

// ============================================================================
// Velocity
// ============================================================================

/// Concurrency factor for a batch
///
/// Each level maps to a maximum number of simultaneously in-flight uploads;
/// the defaults are `factor * 5`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Velocity {
    Low,
    #[default]
    Normal,
    High,
}

impl Velocity {
    /// Multiplier of this level (1, 2 or 3)
    #[must_use]
    pub fn factor(&self) -> usize {
        match self {
            Self::Low => 1,
            Self::Normal => 2,
            Self::High => 3,
        }
    }

    /// In-flight limit used when no configuration overrides it
    #[must_use]
    pub fn default_limit(&self) -> usize {
        self.factor() * 5
    }

    /// Clamp an arbitrary numeric factor into a valid level
    #[must_use]
    pub fn from_factor(factor: i64) -> Self {
        match factor {
            i64::MIN..=1 => Self::Low,
            2 => Self::Normal,
            _ => Self::High,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl Display for Velocity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Velocity {
    type Err = DomainError;

    /// Accepts level names as well as numeric factors; numbers out of range
    /// are clamped to the nearest level
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            other => other
                .parse::<i64>()
                .map(Self::from_factor)
                .map_err(|_| DomainError::InvalidVelocity(other.to_string())),
        }
    }
}

// ============================================================================
// Failure causes
// ============================================================================

/// Why a task (or a skipped entry) did not produce an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TaskFailure {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("path invalid: {0}")]
    PathInvalid(String),

    #[error("name '{0}' is already taken")]
    Conflict(String),

    #[error("name '{name}' is occupied by a {existing}")]
    StructuralConflict { name: String, existing: NodeType },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cancelled before dispatch")]
    Cancelled,

    #[error("branch '{branch}' is blocked: {reason}")]
    BranchBlocked { branch: String, reason: String },
}

impl TaskFailure {
    /// Short machine-readable code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "permission_denied",
            Self::PathInvalid(_) => "path_invalid",
            Self::Conflict(_) => "conflict",
            Self::StructuralConflict { .. } => "structural_conflict",
            Self::Transport(_) => "transport",
            Self::Cancelled => "cancelled",
            Self::BranchBlocked { .. } => "branch_blocked",
        }
    }
}

// ============================================================================
// Transfer task
// ============================================================================

/// Lifecycle state of a transfer task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "cause", rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    InFlight,
    Completed,
    Failed(TaskFailure),
}

impl TaskStatus {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::InFlight => "InFlight",
            Self::Completed => "Completed",
            Self::Failed(_) => "Failed",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

/// A single file upload within a batch
///
/// Everything except the status is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTask {
    id: TaskId,
    local_entry: LocalEntry,
    target_parent_id: NodeId,
    resolution_strategy: ResolutionStrategy,
    status: TaskStatus,
}

impl TransferTask {
    #[must_use]
    pub fn new(
        local_entry: LocalEntry,
        target_parent_id: NodeId,
        resolution_strategy: ResolutionStrategy,
    ) -> Self {
        Self {
            id: TaskId::new(),
            local_entry,
            target_parent_id,
            resolution_strategy,
            status: TaskStatus::Queued,
        }
    }

    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub fn local_entry(&self) -> &LocalEntry {
        &self.local_entry
    }

    #[must_use]
    pub fn target_parent_id(&self) -> NodeId {
        self.target_parent_id
    }

    #[must_use]
    pub fn resolution_strategy(&self) -> ResolutionStrategy {
        self.resolution_strategy
    }

    #[must_use]
    pub fn status(&self) -> &TaskStatus {
        &self.status
    }

    /// Name the file should get under its parent before conflict handling
    #[must_use]
    pub fn requested_name(&self) -> &str {
        self.local_entry.name()
    }

    #[must_use]
    pub fn can_transition_to(&self, target: &TaskStatus) -> bool {
        matches!(
            (&self.status, target),
            (TaskStatus::Queued, TaskStatus::InFlight)
                | (TaskStatus::InFlight, TaskStatus::Completed)
                | (TaskStatus::InFlight, TaskStatus::Failed(_))
        )
    }

    /// Move the task to a new status
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` if the transition is not allowed
    pub fn transition_to(&mut self, target: TaskStatus) -> Result<(), DomainError> {
        if !self.can_transition_to(&target) {
            return Err(DomainError::InvalidState {
                from: self.status.name().to_string(),
                to: target.name().to_string(),
            });
        }
        self.status = target;
        Ok(())
    }

    /// Convenience method for dispatch
    pub fn start(&mut self) -> Result<(), DomainError> {
        self.transition_to(TaskStatus::InFlight)
    }

    pub fn complete(&mut self) -> Result<(), DomainError> {
        self.transition_to(TaskStatus::Completed)
    }

    pub fn fail(&mut self, cause: TaskFailure) -> Result<(), DomainError> {
        self.transition_to(TaskStatus::Failed(cause))
    }
}

// ============================================================================
// Batch result
// ============================================================================

/// A successfully uploaded task and the node it produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub task: TransferTask,
    pub node: RemoteNode,
}

/// A task that was dispatched and failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTask {
    pub task: TransferTask,
    pub cause: TaskFailure,
}

/// A local entry that never became a dispatched task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub entry: LocalEntry,
    pub cause: TaskFailure,
}

/// Aggregate outcome of one batch
///
/// Every input task ends up in exactly one of `uploaded`, `failures` or
/// `skipped_entries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub uploaded: Vec<UploadedFile>,
    pub failures: Vec<FailedTask>,
    pub skipped_entries: Vec<SkippedEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchResult {
    /// Start an empty result stamped with the current time
    #[must_use]
    pub fn begin() -> Self {
        Self {
            uploaded: Vec::new(),
            failures: Vec::new(),
            skipped_entries: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_uploaded(&mut self, task: TransferTask, node: RemoteNode) {
        self.uploaded.push(UploadedFile { task, node });
    }

    pub fn record_failed(&mut self, task: TransferTask, cause: TaskFailure) {
        self.failures.push(FailedTask { task, cause });
    }

    pub fn record_skipped(&mut self, entry: LocalEntry, cause: TaskFailure) {
        self.skipped_entries.push(SkippedEntry { entry, cause });
    }

    /// Fold skipped entries discovered before scheduling into this result
    pub fn extend_skipped(&mut self, skipped: impl IntoIterator<Item = SkippedEntry>) {
        self.skipped_entries.extend(skipped);
    }

    /// Stamp the finish time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.uploaded.len()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped_entries.len()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded() + self.failed() + self.skipped()
    }

    /// Returns true if any task failed or was skipped
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || !self.skipped_entries.is_empty()
    }

    /// Total bytes of uploaded files
    #[must_use]
    pub fn bytes_uploaded(&self) -> u64 {
        self.uploaded.iter().map(|u| u.task.local_entry().size()).sum()
    }

    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
