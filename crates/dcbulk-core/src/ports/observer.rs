//! Transfer observer port
//!
//! Progress callbacks fired by the upload scheduler. Callbacks are
//! synchronous and invoked from worker tasks, so implementations must be
//! cheap and thread-safe.

use tracing::{debug, info, warn};

use crate::domain::local_entry::LocalEntry;
use crate::domain::node::RemoteNode;
use crate::domain::transfer::{TaskFailure, TransferTask};

/// Receives per-task progress events
pub trait ITransferObserver: Send + Sync {
    fn on_started(&self, task: &TransferTask);

    fn on_completed(&self, task: &TransferTask, node: &RemoteNode);

    fn on_failed(&self, task: &TransferTask, cause: &TaskFailure);

    /// An entry that was never dispatched
    fn on_skipped(&self, entry: &LocalEntry, cause: &TaskFailure);
}

/// Observer that reports progress through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ITransferObserver for TracingObserver {
    fn on_started(&self, task: &TransferTask) {
        debug!(
            task_id = %task.id(),
            path = %task.local_entry().display_path(),
            size = task.local_entry().size(),
            "Upload started"
        );
    }

    fn on_completed(&self, task: &TransferTask, node: &RemoteNode) {
        info!(
            task_id = %task.id(),
            path = %task.local_entry().display_path(),
            node_id = %node.id,
            name = %node.name,
            "Upload completed"
        );
    }

    fn on_failed(&self, task: &TransferTask, cause: &TaskFailure) {
        warn!(
            task_id = %task.id(),
            path = %task.local_entry().display_path(),
            cause = %cause,
            "Upload failed"
        );
    }

    fn on_skipped(&self, entry: &LocalEntry, cause: &TaskFailure) {
        warn!(path = %entry.display_path(), cause = %cause, "Entry skipped");
    }
}
