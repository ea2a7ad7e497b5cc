//! Upload scheduling: concurrency, conflict strategies, failures and cancellation

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use dcbulk_core::domain::{NodeId, NodeType, ResolutionStrategy, TaskFailure, TransferTask};
use dcbulk_core::ports::RemoteError;
use dcbulk_sync::scheduler::UploadScheduler;

use crate::common::{file_entry, MemoryStore, RecordingObserver};

fn scheduler(store: &Arc<MemoryStore>, observer: &Arc<RecordingObserver>, limit: usize) -> UploadScheduler {
    UploadScheduler::new(store.clone(), observer.clone(), limit)
}

#[tokio::test]
async fn test_in_flight_uploads_never_exceed_limit() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new().with_upload_delay(Duration::from_millis(20)));
    let room = store.add_room(None, "team", false);
    let observer = Arc::new(RecordingObserver::new());

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let name = format!("f{i:02}.bin");
            TransferTask::new(
                file_entry(local.path(), &[&name], b"data"),
                room.id,
                ResolutionStrategy::Fail,
            )
        })
        .collect();

    let batch = scheduler(&store, &observer, 3)
        .run(tasks, &CancellationToken::new())
        .await;

    assert_eq!(batch.succeeded(), 20);
    assert!(store.max_in_flight() <= 3, "saw {}", store.max_in_flight());
    assert!(store.max_in_flight() >= 1);
    assert_eq!(observer.started.lock().unwrap().len(), 20);
    assert_eq!(observer.completed.lock().unwrap().len(), 20);
    assert!(batch.finished_at.is_some());
}

#[tokio::test]
async fn test_autorename_never_reuses_a_name_within_batch() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new().with_upload_delay(Duration::from_millis(5)));
    let room = store.add_room(None, "team", false);
    let original = store.add_file(room.id, "a.txt", b"original");
    let observer = Arc::new(RecordingObserver::new());

    // Same file name from different local branches, all aimed at one parent
    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let dir = format!("branch{i}");
            TransferTask::new(
                file_entry(local.path(), &[&dir, "a.txt"], b"copy"),
                room.id,
                ResolutionStrategy::Autorename,
            )
        })
        .collect();

    let batch = scheduler(&store, &observer, 8)
        .run(tasks, &CancellationToken::new())
        .await;

    assert_eq!(batch.succeeded(), 8);
    let names: HashSet<_> = batch.uploaded.iter().map(|u| u.node.name.clone()).collect();
    assert_eq!(names.len(), 8);
    assert!(!names.contains("a.txt"));
    assert!(names.contains("a (1).txt"));
    assert!(names.contains("a (8).txt"));
    assert_eq!(store.content(original.id).unwrap(), b"original");
}

#[tokio::test]
async fn test_overwrite_preserves_node_id() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let room = store.add_room(None, "team", false);
    let existing = store.add_file(room.id, "report.pdf", b"v1");
    let observer = Arc::new(RecordingObserver::new());

    let task = TransferTask::new(
        file_entry(local.path(), &["report.pdf"], b"version two"),
        room.id,
        ResolutionStrategy::Overwrite,
    );
    let batch = scheduler(&store, &observer, 2)
        .run(vec![task], &CancellationToken::new())
        .await;

    assert_eq!(batch.succeeded(), 1);
    assert_eq!(batch.uploaded[0].node.id, existing.id);
    assert_eq!(store.content(existing.id).unwrap(), b"version two");
    assert_eq!(store.children(room.id).len(), 1);
}

#[tokio::test]
async fn test_fail_strategy_leaves_existing_content_untouched() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let room = store.add_room(None, "team", false);
    let existing = store.add_file(room.id, "report.pdf", b"v1");
    let observer = Arc::new(RecordingObserver::new());

    let task = TransferTask::new(
        file_entry(local.path(), &["report.pdf"], b"v2"),
        room.id,
        ResolutionStrategy::Fail,
    );
    let batch = scheduler(&store, &observer, 2)
        .run(vec![task], &CancellationToken::new())
        .await;

    assert_eq!(batch.failed(), 1);
    assert_eq!(
        batch.failures[0].cause,
        TaskFailure::Conflict("report.pdf".to_string())
    );
    assert_eq!(store.content(existing.id).unwrap(), b"v1");
    assert_eq!(store.mutations(), 0);
    assert_eq!(observer.failed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_overwrite_never_replaces_a_folder() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let room = store.add_room(None, "team", false);
    store.add_folder(room.id, "docs");
    let observer = Arc::new(RecordingObserver::new());

    let task = TransferTask::new(
        file_entry(local.path(), &["docs"], b"not a folder"),
        room.id,
        ResolutionStrategy::Overwrite,
    );
    let batch = scheduler(&store, &observer, 2)
        .run(vec![task], &CancellationToken::new())
        .await;

    assert_eq!(
        batch.failures[0].cause,
        TaskFailure::StructuralConflict {
            name: "docs".to_string(),
            existing: NodeType::Folder,
        }
    );
    assert_eq!(store.mutations(), 0);
}

#[tokio::test]
async fn test_one_failure_does_not_abort_the_batch() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let room = store.add_room(None, "team", false);
    store.fail_upload("bad.bin", RemoteError::Transport("connection reset".into()));
    store.fail_upload("secret.bin", RemoteError::Unauthorized("read-only".into()));
    let observer = Arc::new(RecordingObserver::new());

    let tasks: Vec<_> = ["a.bin", "bad.bin", "c.bin", "secret.bin", "e.bin"]
        .iter()
        .map(|name| {
            TransferTask::new(
                file_entry(local.path(), &[name], b"x"),
                room.id,
                ResolutionStrategy::Fail,
            )
        })
        .collect();

    let batch = scheduler(&store, &observer, 2)
        .run(tasks, &CancellationToken::new())
        .await;

    assert_eq!(batch.succeeded(), 3);
    assert_eq!(batch.failed(), 2);
    let codes: HashSet<_> = batch.failures.iter().map(|f| f.cause.code()).collect();
    assert_eq!(codes, HashSet::from(["transport", "permission_denied"]));
}

#[tokio::test]
async fn test_missing_parent_is_path_invalid() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let observer = Arc::new(RecordingObserver::new());

    let task = TransferTask::new(
        file_entry(local.path(), &["orphan.txt"], b"x"),
        NodeId::new(999),
        ResolutionStrategy::Fail,
    );
    let batch = scheduler(&store, &observer, 1)
        .run(vec![task], &CancellationToken::new())
        .await;

    assert_eq!(batch.failures[0].cause.code(), "path_invalid");
}

#[tokio::test]
async fn test_parent_listed_once_and_before_uploads() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let room = store.add_room(None, "team", false);
    let observer = Arc::new(RecordingObserver::new());

    let tasks: Vec<_> = (0..6)
        .map(|i| {
            TransferTask::new(
                file_entry(local.path(), &[&format!("{i}.txt")], b"x"),
                room.id,
                ResolutionStrategy::Fail,
            )
        })
        .collect();
    scheduler(&store, &observer, 3)
        .with_page_size(2)
        .run(tasks, &CancellationToken::new())
        .await;

    // one listing pass over an initially empty parent
    assert_eq!(store.list_calls(room.id), 1);
    assert_eq!(store.unlisted_uploads(), 0);
}

#[tokio::test]
async fn test_failed_listing_is_retried_by_the_next_task() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let room = store.add_room(None, "team", false);
    store.fail_list_once(room.id, RemoteError::Transport("listing timed out".to_string()));
    let observer = Arc::new(RecordingObserver::new());

    let tasks: Vec<_> = ["a.txt", "b.txt", "c.txt"]
        .iter()
        .map(|name| {
            TransferTask::new(
                file_entry(local.path(), &[name], b"x"),
                room.id,
                ResolutionStrategy::Fail,
            )
        })
        .collect();
    let batch = scheduler(&store, &observer, 1)
        .run(tasks, &CancellationToken::new())
        .await;

    assert_eq!(batch.failed(), 1);
    assert_eq!(batch.failures[0].cause.code(), "transport");
    assert_eq!(batch.succeeded(), 2);
    // the failure was not cached, the success was
    assert_eq!(store.list_calls(room.id), 2);
    assert_eq!(store.children(room.id).len(), 2);
}

#[tokio::test]
async fn test_largest_files_dispatch_first() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let room = store.add_room(None, "team", false);
    let observer = Arc::new(RecordingObserver::new());

    let tasks = vec![
        TransferTask::new(file_entry(local.path(), &["small"], b"1"), room.id, ResolutionStrategy::Fail),
        TransferTask::new(file_entry(local.path(), &["large"], b"12345"), room.id, ResolutionStrategy::Fail),
        TransferTask::new(file_entry(local.path(), &["medium"], b"123"), room.id, ResolutionStrategy::Fail),
    ];
    scheduler(&store, &observer, 1)
        .run(tasks, &CancellationToken::new())
        .await;

    assert_eq!(store.upload_order(), ["large", "medium", "small"]);
}

#[tokio::test]
async fn test_cancelled_before_start_skips_everything() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let room = store.add_room(None, "team", false);
    let observer = Arc::new(RecordingObserver::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            TransferTask::new(
                file_entry(local.path(), &[&format!("{i}.txt")], b"x"),
                room.id,
                ResolutionStrategy::Fail,
            )
        })
        .collect();
    let batch = scheduler(&store, &observer, 2).run(tasks, &cancel).await;

    assert_eq!(batch.skipped(), 4);
    assert!(batch
        .skipped_entries
        .iter()
        .all(|s| s.cause == TaskFailure::Cancelled));
    assert_eq!(store.mutations(), 0);
    assert!(observer.started.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancellation_mid_batch_accounts_for_every_task() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new().with_upload_delay(Duration::from_millis(100)));
    let room = store.add_room(None, "team", false);
    let observer = Arc::new(RecordingObserver::new());
    let cancel = CancellationToken::new();

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            TransferTask::new(
                file_entry(local.path(), &[&format!("{i}.txt")], b"x"),
                room.id,
                ResolutionStrategy::Fail,
            )
        })
        .collect();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });
    let batch = scheduler(&store, &observer, 1).run(tasks, &cancel).await;

    assert_eq!(batch.total(), 10);
    assert!(batch.succeeded() >= 1);
    assert!(batch.skipped() >= 1);
    // in-flight uploads finish; nothing is dispatched after cancellation
    let started = observer.started.lock().unwrap().len();
    assert_eq!(started, batch.succeeded() + batch.failed());
    assert_eq!(store.upload_order().len(), batch.succeeded());
}
