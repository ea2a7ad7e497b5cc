//! Bulk upload use case
//!
//! Wires the upload steps together for one run:
//!
//! ```text
//! resolve destination ─► walk ─► replicate folders ─► schedule uploads ─► distribute keys
//! ```
//!
//! Only precondition failures are returned as errors. Everything that goes
//! wrong for an individual folder, file or user is part of the report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use dcbulk_core::config::Config;
use dcbulk_core::domain::{
    BatchResult, KeyDistributionResult, LocalEntry, RemoteNode, RemotePath, ResolutionStrategy,
    SkippedEntry, TaskFailure, TransferTask, Velocity,
};
use dcbulk_core::ports::{ITransferObserver, TracingObserver};
use dcbulk_core::session::Session;

use crate::keys::{room_for_target, KeyDistributionEngine, DEFAULT_KEY_CONCURRENCY};
use crate::replicator::{FolderMap, FolderStructureReplicator};
use crate::scheduler::{UploadScheduler, DEFAULT_PAGE_SIZE};
use crate::walker::LocalTreeWalker;
use crate::{KeyDistributionError, UploadError, WalkError};

/// What to upload and where
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: PathBuf,
    pub destination: RemotePath,
    pub strategy: ResolutionStrategy,
    pub velocity: Velocity,
    /// Required for directory sources
    pub recursive: bool,
}

/// Tunables of the upload pipeline
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub velocity_limits: [usize; 3],
    pub folder_concurrency: usize,
    pub listing_page_size: usize,
    pub key_concurrency: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            velocity_limits: [
                Velocity::Low.default_limit(),
                Velocity::Normal.default_limit(),
                Velocity::High.default_limit(),
            ],
            folder_concurrency: 10,
            listing_page_size: DEFAULT_PAGE_SIZE,
            key_concurrency: DEFAULT_KEY_CONCURRENCY,
        }
    }
}

impl UploadOptions {
    pub fn from_config(config: &Config) -> Self {
        let transfer = &config.transfer;
        Self {
            velocity_limits: [
                transfer.velocity_limit(Velocity::Low),
                transfer.velocity_limit(Velocity::Normal),
                transfer.velocity_limit(Velocity::High),
            ],
            folder_concurrency: transfer.folder_concurrency.max(1),
            listing_page_size: transfer.listing_page_size.max(1),
            key_concurrency: config.keys.concurrency.max(1),
        }
    }

    /// Maximum in-flight uploads for `velocity`
    pub fn limit_for(&self, velocity: Velocity) -> usize {
        self.velocity_limits[velocity.factor() - 1].max(1)
    }
}

/// Folder replication figures of a directory upload
#[derive(Debug, Clone, Default)]
pub struct FolderSummary {
    pub created: usize,
    pub reused: usize,
    /// Directories that could not be mirrored, as slash-joined relative paths
    pub blocked: Vec<(String, TaskFailure)>,
}

impl From<&FolderMap> for FolderSummary {
    fn from(map: &FolderMap) -> Self {
        Self {
            created: map.created,
            reused: map.reused,
            blocked: map
                .blocked
                .iter()
                .map(|(path, cause)| (path.join("/"), cause.clone()))
                .collect(),
        }
    }
}

/// Everything that happened in one upload run
#[derive(Debug)]
pub struct UploadReport {
    pub destination: RemoteNode,
    /// Present for directory uploads
    pub folders: Option<FolderSummary>,
    pub batch: BatchResult,
    /// Present when the destination is encrypted and the run was not cancelled
    pub keys: Option<KeyDistributionResult>,
    /// Why the room's key state could not be enumerated, if it could not
    pub key_error: Option<KeyDistributionError>,
    /// Local entries that could not be read
    pub walk_errors: Vec<WalkError>,
    pub cancelled: bool,
}

impl UploadReport {
    /// Returns true if any file, folder, local entry or key record failed
    pub fn has_failures(&self) -> bool {
        self.batch.has_failures()
            || !self.walk_errors.is_empty()
            || self.folders.as_ref().is_some_and(|f| !f.blocked.is_empty())
            || self.keys.as_ref().is_some_and(KeyDistributionResult::is_partial)
            || self.key_error.is_some()
    }
}

/// Orchestrates a bulk upload within a session
pub struct UploadUseCase {
    options: UploadOptions,
    observer: Arc<dyn ITransferObserver>,
}

impl UploadUseCase {
    pub fn new(options: UploadOptions) -> Self {
        Self {
            options,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ITransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run one upload
    ///
    /// # Errors
    /// Returns `UploadError` only when the destination, the source or the
    /// session does not allow the upload to start. After folder replication
    /// has begun every outcome, key distribution included, is reported in the
    /// returned `UploadReport`
    pub async fn execute(
        &self,
        session: &Session,
        request: UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<UploadReport, UploadError> {
        let store = Arc::clone(session.store()?);

        let destination = store
            .resolve_path_to_node(&request.destination)
            .await?
            .ok_or_else(|| UploadError::DestinationNotFound(request.destination.clone()))?;
        if !destination.is_container() {
            return Err(UploadError::InvalidDestination {
                path: request.destination.clone(),
                node_type: destination.node_type,
            });
        }

        let room = room_for_target(&destination)?;
        let crypto = match room {
            Some(room_id) => Some(
                session
                    .crypto()?
                    .cloned()
                    .ok_or(UploadError::CryptoUnavailable(room_id))?,
            ),
            None => None,
        };

        let metadata = tokio::fs::metadata(&request.source)
            .await
            .map_err(|_| UploadError::InvalidSource(request.source.clone()))?;

        info!(
            session_id = %session.id(),
            source = %request.source.display(),
            destination = %request.destination,
            strategy = %request.strategy,
            velocity = %request.velocity,
            "Starting upload"
        );

        let scheduler = UploadScheduler::new(
            Arc::clone(&store),
            Arc::clone(&self.observer),
            self.options.limit_for(request.velocity),
        )
        .with_page_size(self.options.listing_page_size);

        // Once remote work has begun every outcome lands in the report. A
        // session closed mid-run stops new work like a cancellation does.
        let run = cancel.child_token();

        let (folders, batch, walk_errors) = if metadata.is_dir() {
            if !request.recursive {
                return Err(UploadError::RecursiveRequired(request.source.clone()));
            }
            let walker = LocalTreeWalker::new(&request.source)?;
            let scan = walker.scan().await?;

            session.ensure_open()?;
            let replicator =
                FolderStructureReplicator::new(Arc::clone(&store), self.options.folder_concurrency);
            let folder_map = replicator
                .replicate(&destination, &request.destination, &scan.entries, &run)
                .await;

            stop_if_closed(session, &run);
            let (tasks, skipped) = self.plan(&scan.entries, &folder_map, request.strategy);
            for entry in &skipped {
                self.observer.on_skipped(&entry.entry, &entry.cause);
            }
            let mut batch = scheduler.run(tasks, &run).await;
            batch.extend_skipped(skipped);

            (Some(FolderSummary::from(&folder_map)), batch, scan.errors)
        } else if metadata.is_file() {
            let entry = single_file_entry(&request.source, metadata.len())?;
            let task = TransferTask::new(entry, destination.id, request.strategy);
            (None, scheduler.run(vec![task], &run).await, Vec::new())
        } else {
            return Err(UploadError::InvalidSource(request.source.clone()));
        };

        stop_if_closed(session, &run);
        let cancelled = run.is_cancelled();
        let mut key_error = None;
        let keys = match (room, crypto) {
            (Some(room_id), Some(crypto)) if !cancelled => {
                let engine = KeyDistributionEngine::new(crypto)
                    .with_concurrency(self.options.key_concurrency);
                match engine.distribute(room_id).await {
                    Ok(result) => Some(result),
                    Err(e) => {
                        warn!(room_id = %room_id, error = %e, "Key distribution failed");
                        key_error = Some(e);
                        None
                    }
                }
            }
            (Some(room_id), _) => {
                warn!(room_id = %room_id, "Run cancelled, key distribution skipped");
                None
            }
            _ => None,
        };

        info!(
            uploaded = batch.succeeded(),
            failed = batch.failed(),
            skipped = batch.skipped(),
            cancelled,
            "Upload finished"
        );

        Ok(UploadReport {
            destination,
            folders,
            batch,
            keys,
            key_error,
            walk_errors,
            cancelled,
        })
    }

    /// Split file entries into dispatchable tasks and entries under blocked
    /// folders
    fn plan(
        &self,
        entries: &[LocalEntry],
        folders: &FolderMap,
        strategy: ResolutionStrategy,
    ) -> (Vec<TransferTask>, Vec<SkippedEntry>) {
        let mut tasks = Vec::new();
        let mut skipped = Vec::new();

        for entry in entries.iter().filter(|e| e.is_file()) {
            if let Some(cause) = folders.skip_cause(entry) {
                skipped.push(SkippedEntry {
                    entry: entry.clone(),
                    cause,
                });
                continue;
            }
            match folders.node_for(entry.parent_relative()) {
                Some(parent) => tasks.push(TransferTask::new(entry.clone(), parent, strategy)),
                None => skipped.push(SkippedEntry {
                    entry: entry.clone(),
                    cause: TaskFailure::PathInvalid(format!(
                        "no remote folder for {}",
                        entry.parent_relative().join("/")
                    )),
                }),
            }
        }
        (tasks, skipped)
    }
}

fn stop_if_closed(session: &Session, run: &CancellationToken) {
    if !session.is_open() && !run.is_cancelled() {
        warn!(session_id = %session.id(), "Session closed during upload, stopping");
        run.cancel();
    }
}

fn single_file_entry(source: &Path, size: u64) -> Result<LocalEntry, UploadError> {
    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| UploadError::InvalidSource(source.to_path_buf()))?;
    Ok(LocalEntry::file(
        vec![name.to_string()],
        size,
        source.to_path_buf(),
    ))
}
