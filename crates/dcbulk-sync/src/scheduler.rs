//! Upload scheduler
//!
//! Dispatches per-file transfer tasks with a bounded number of uploads in
//! flight. For each task the scheduler:
//!
//! 1. lists the target parent (once per parent per batch), which also
//!    verifies the parent exists; a failed listing is not cached and the
//!    next task for that parent tries again,
//! 2. claims a final name through the [`NameLedger`],
//! 3. uploads the file.
//!
//! A task's failure is recorded and never affects other tasks. The batch
//! result is assembled only after every dispatched task has resolved.
//! Cancellation stops new dispatches; tasks still waiting are reported as
//! skipped.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dcbulk_conflict::{NameLedger, ParentListing};
use dcbulk_core::domain::{BatchResult, NodeId, RemoteNode, TaskFailure, TaskId, TransferTask};
use dcbulk_core::ports::{IRemoteStore, ITransferObserver};

/// Default page size when listing a parent
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// State shared by the workers of one batch
struct BatchContext {
    store: Arc<dyn IRemoteStore>,
    ledger: NameLedger,
    listings: DashMap<NodeId, Arc<OnceCell<Arc<ParentListing>>>>,
    page_size: usize,
}

impl BatchContext {
    /// Listing of `parent`, fetched successfully at most once per batch
    async fn listing(&self, parent: NodeId) -> Result<Arc<ParentListing>, TaskFailure> {
        let cell = self
            .listings
            .entry(parent)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_try_init(|| async {
            debug!(parent = %parent, "Listing parent");
            self.store
                .list_all_children(parent, self.page_size)
                .await
                .map(|children| Arc::new(ParentListing::from_nodes(children)))
                .map_err(TaskFailure::from)
        })
        .await
        .cloned()
    }

    async fn execute(&self, task: &TransferTask) -> Result<RemoteNode, TaskFailure> {
        let parent = task.target_parent_id();
        let listing = self.listing(parent).await?;

        let name = task.requested_name();
        let action = self
            .ledger
            .claim(parent, name, task.resolution_strategy(), &listing)
            .map_err(|rejection| rejection.to_failure(name))?;

        self.store
            .upload_file(task.local_entry().source(), parent, &action)
            .await
            .map_err(TaskFailure::from)
    }
}

/// Bounded-concurrency executor for transfer tasks
pub struct UploadScheduler {
    store: Arc<dyn IRemoteStore>,
    observer: Arc<dyn ITransferObserver>,
    max_in_flight: usize,
    page_size: usize,
}

impl UploadScheduler {
    pub fn new(
        store: Arc<dyn IRemoteStore>,
        observer: Arc<dyn ITransferObserver>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            store,
            observer,
            max_in_flight: max_in_flight.max(1),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Run all tasks, largest file first
    pub async fn run(&self, mut tasks: Vec<TransferTask>, cancel: &CancellationToken) -> BatchResult {
        let mut batch = BatchResult::begin();
        tasks.sort_by(|a, b| b.local_entry().size().cmp(&a.local_entry().size()));

        info!(
            tasks = tasks.len(),
            max_in_flight = self.max_in_flight,
            "Starting upload batch"
        );

        let context = Arc::new(BatchContext {
            store: Arc::clone(&self.store),
            ledger: NameLedger::new(),
            listings: DashMap::new(),
            page_size: self.page_size,
        });
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut workers: JoinSet<(TransferTask, Result<RemoteNode, TaskFailure>)> = JoinSet::new();
        let mut in_flight: HashMap<TaskId, TransferTask> = HashMap::new();

        let mut pending = tasks.into_iter();
        while let Some(mut task) = pending.next() {
            let permit = if cancel.is_cancelled() {
                None
            } else {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
                }
            };
            let Some(permit) = permit else {
                warn!(remaining = pending.len() + 1, "Batch cancelled, skipping undispatched tasks");
                for task in std::iter::once(task).chain(pending.by_ref()) {
                    self.skip(&mut batch, task, TaskFailure::Cancelled);
                }
                break;
            };

            if let Err(e) = task.start() {
                warn!(task_id = %task.id(), error = %e, "Task is not queued");
                self.skip(&mut batch, task, TaskFailure::PathInvalid(e.to_string()));
                continue;
            }
            self.observer.on_started(&task);
            in_flight.insert(task.id(), task.clone());

            let context = Arc::clone(&context);
            workers.spawn(async move {
                let _permit = permit;
                let outcome = context.execute(&task).await;
                (task, outcome)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((task, outcome)) => {
                    in_flight.remove(&task.id());
                    self.resolve(&mut batch, task, outcome);
                }
                Err(e) => warn!(error = %e, "Upload worker aborted"),
            }
        }

        // Workers that panicked never returned their task
        for (_, task) in in_flight.drain() {
            self.resolve(
                &mut batch,
                task,
                Err(TaskFailure::Transport("upload worker aborted".to_string())),
            );
        }

        batch.finish();
        info!(
            succeeded = batch.succeeded(),
            failed = batch.failed(),
            skipped = batch.skipped(),
            "Upload batch finished"
        );
        batch
    }

    fn resolve(
        &self,
        batch: &mut BatchResult,
        mut task: TransferTask,
        outcome: Result<RemoteNode, TaskFailure>,
    ) {
        match outcome {
            Ok(node) => {
                if let Err(e) = task.complete() {
                    warn!(task_id = %task.id(), error = %e, "Unexpected task state");
                }
                self.observer.on_completed(&task, &node);
                batch.record_uploaded(task, node);
            }
            Err(cause) => {
                if let Err(e) = task.fail(cause.clone()) {
                    warn!(task_id = %task.id(), error = %e, "Unexpected task state");
                }
                self.observer.on_failed(&task, &cause);
                batch.record_failed(task, cause);
            }
        }
    }

    fn skip(&self, batch: &mut BatchResult, task: TransferTask, cause: TaskFailure) {
        self.observer.on_skipped(task.local_entry(), &cause);
        batch.record_skipped(task.local_entry().clone(), cause);
    }
}
