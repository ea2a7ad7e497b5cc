//! End-to-end upload runs through a session

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use dcbulk_core::domain::{NodeType, RemotePath, ResolutionStrategy, TaskFailure, Velocity};
use dcbulk_core::path::ResolvedTarget;
use dcbulk_core::ports::{ICryptoProvider, IRemoteStore};
use dcbulk_core::session::{Session, SessionError};
use dcbulk_sync::engine::{UploadOptions, UploadRequest, UploadUseCase};
use dcbulk_sync::mirror::MirrorStore;
use dcbulk_sync::{KeyDistributionError, UploadError};

use crate::common::{build_tree, MemoryCrypto, MemoryStore, RecordingObserver};

fn target(path: &str) -> ResolvedTarget {
    ResolvedTarget {
        base_url: "dc.example.com".to_string(),
        path: path.parse().unwrap(),
    }
}

fn session(store: Arc<dyn IRemoteStore>, crypto: Option<Arc<dyn ICryptoProvider>>) -> Session {
    Session::open(target("/"), store, crypto)
}

fn request(source: &Path, destination: &str, recursive: bool) -> UploadRequest {
    UploadRequest {
        source: source.to_path_buf(),
        destination: destination.parse::<RemotePath>().unwrap(),
        strategy: ResolutionStrategy::Fail,
        velocity: Velocity::Normal,
        recursive,
    }
}

fn use_case() -> UploadUseCase {
    UploadUseCase::new(UploadOptions::default())
}

#[tokio::test]
async fn test_uploads_a_tree_into_a_room() {
    let local = tempfile::tempdir().unwrap();
    build_tree(
        local.path(),
        &[
            ("a.txt", b"alpha"),
            ("docs/b.txt", b"beta"),
            ("docs/inner/c.txt", b"gamma"),
            ("empty/", b""),
        ],
    );
    let store = Arc::new(MemoryStore::new());
    let room = store.add_room(None, "team", false);
    let session = session(store.clone(), None);

    let report = use_case()
        .execute(&session, request(local.path(), "/team", true), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.destination.id, room.id);
    let folders = report.folders.as_ref().unwrap();
    assert_eq!(folders.created, 3);
    assert!(folders.blocked.is_empty());
    assert_eq!(report.batch.succeeded(), 3);
    assert_eq!(report.batch.bytes_uploaded(), 14);
    assert!(report.keys.is_none());
    assert!(!report.has_failures());
    assert!(!report.cancelled);

    let names: Vec<_> = store.children(room.id).into_iter().map(|n| n.name).collect();
    assert_eq!(names, ["a.txt", "docs", "empty"]);
    let docs = store.child_named(room.id, "docs").unwrap();
    let inner = store.child_named(docs.id, "inner").unwrap();
    let c = store.child_named(inner.id, "c.txt").unwrap();
    assert_eq!(store.content(c.id).unwrap(), b"gamma");
}

#[tokio::test]
async fn test_missing_destination_is_rejected() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    store.add_room(None, "team", false);
    let session = session(store.clone(), None);

    let err = use_case()
        .execute(&session, request(local.path(), "/team/nope", true), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::DestinationNotFound(path) if path.to_string() == "/team/nope"));
    assert_eq!(store.mutations(), 0);
}

#[tokio::test]
async fn test_file_destination_is_rejected() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let room = store.add_room(None, "team", false);
    store.add_file(room.id, "a.txt", b"x");
    let session = session(store.clone(), None);

    let err = use_case()
        .execute(&session, request(local.path(), "/team/a.txt", true), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        UploadError::InvalidDestination { node_type: NodeType::File, .. }
    ));
}

#[tokio::test]
async fn test_directory_requires_recursive_flag() {
    let local = tempfile::tempdir().unwrap();
    build_tree(local.path(), &[("a.txt", b"x")]);
    let store = Arc::new(MemoryStore::new());
    store.add_room(None, "team", false);
    let session = session(store.clone(), None);

    let err = use_case()
        .execute(&session, request(local.path(), "/team", false), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::RecursiveRequired(_)));
    assert_eq!(store.mutations(), 0);
}

#[tokio::test]
async fn test_missing_source_is_rejected() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    store.add_room(None, "team", false);
    let session = session(store.clone(), None);

    let err = use_case()
        .execute(
            &session,
            request(&local.path().join("gone"), "/team", true),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::InvalidSource(_)));
}

#[tokio::test]
async fn test_encrypted_room_needs_crypto_provider() {
    let local = tempfile::tempdir().unwrap();
    build_tree(local.path(), &[("a.txt", b"x")]);
    let store = Arc::new(MemoryStore::new());
    let vault = store.add_room(None, "vault", true);
    let session = session(store.clone(), None);

    let err = use_case()
        .execute(&session, request(local.path(), "/vault", true), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::CryptoUnavailable(id) if id == vault.id));
    assert_eq!(store.mutations(), 0);
}

#[tokio::test]
async fn test_encrypted_folder_distributes_keys_of_its_room() {
    let local = tempfile::tempdir().unwrap();
    build_tree(local.path(), &[("report.pdf", b"secret")]);
    let store = Arc::new(MemoryStore::new());
    let vault = store.add_room(None, "vault", true);
    store.add_folder(vault.id, "inbox");
    let crypto = Arc::new(MemoryCrypto::new());
    crypto.add_member(vault.id, 1, false);
    crypto.add_member(vault.id, 2, true);
    let session = session(store.clone(), Some(crypto.clone() as Arc<dyn ICryptoProvider>));

    let report = use_case()
        .execute(
            &session,
            request(&local.path().join("report.pdf"), "/vault/inbox", false),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.batch.succeeded(), 1);
    assert!(report.folders.is_none());
    let keys = report.keys.unwrap();
    assert_eq!(keys.room_id, vault.id);
    assert_eq!(keys.equipped.len(), 1);
    assert_eq!(keys.equipped[0].as_u64(), 1);
}

#[tokio::test]
async fn test_cancelled_run_skips_key_distribution() {
    let local = tempfile::tempdir().unwrap();
    build_tree(local.path(), &[("a.txt", b"a"), ("b.txt", b"b")]);
    let store = Arc::new(MemoryStore::new());
    let vault = store.add_room(None, "vault", true);
    let crypto = Arc::new(MemoryCrypto::new());
    crypto.add_member(vault.id, 1, false);
    let session = session(store.clone(), Some(crypto.clone() as Arc<dyn ICryptoProvider>));

    let cancel = CancellationToken::new();
    let observer = Arc::new(RecordingObserver::cancelling(cancel.clone()));
    let report = use_case()
        .with_observer(observer)
        .execute(&session, request(local.path(), "/vault", true), &cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(report.keys.is_none());
    assert_eq!(report.batch.total(), 2);
    assert_eq!(crypto.content_key_requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_key_enumeration_failure_keeps_upload_results() {
    let local = tempfile::tempdir().unwrap();
    build_tree(local.path(), &[("a.txt", b"a"), ("b.txt", b"b")]);
    let store = Arc::new(MemoryStore::new());
    let vault = store.add_room(None, "vault", true);
    let crypto = Arc::new(MemoryCrypto::new());
    crypto.add_member(vault.id, 1, false);
    crypto.make_members_unavailable();
    let session = session(store.clone(), Some(crypto.clone() as Arc<dyn ICryptoProvider>));

    let report = use_case()
        .execute(&session, request(local.path(), "/vault", true), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.batch.succeeded(), 2);
    assert!(report.keys.is_none());
    assert!(matches!(
        report.key_error,
        Some(KeyDistributionError::MembersUnavailable { .. })
    ));
    assert!(!report.cancelled);
    assert!(report.has_failures());
    assert_eq!(store.children(vault.id).len(), 2);
}

#[tokio::test]
async fn test_structural_conflict_skips_only_that_branch() {
    let local = tempfile::tempdir().unwrap();
    build_tree(
        local.path(),
        &[("a.txt", b"a"), ("docs/b.txt", b"b"), ("docs/deep/c.txt", b"c")],
    );
    let store = Arc::new(MemoryStore::new());
    let room = store.add_room(None, "team", false);
    store.add_file(room.id, "docs", b"i am a file");
    let session = session(store.clone(), None);
    let observer = Arc::new(RecordingObserver::new());

    let report = use_case()
        .with_observer(observer.clone())
        .execute(&session, request(local.path(), "/team", true), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.batch.succeeded(), 1);
    assert_eq!(report.batch.skipped(), 2);
    let folders = report.folders.as_ref().unwrap();
    assert_eq!(folders.blocked.len(), 2);
    assert_eq!(folders.blocked[0].0, "docs");
    assert_eq!(folders.blocked[0].1.code(), "structural_conflict");
    assert!(report
        .batch
        .skipped_entries
        .iter()
        .all(|s| matches!(s.cause, TaskFailure::BranchBlocked { .. })));
    assert_eq!(observer.skipped.lock().unwrap().len(), 2);
    assert!(report.has_failures());
}

#[tokio::test]
async fn test_single_file_autorenames_on_conflict() {
    let local = tempfile::tempdir().unwrap();
    build_tree(local.path(), &[("notes.md", b"new")]);
    let store = Arc::new(MemoryStore::new());
    let room = store.add_room(None, "team", false);
    let existing = store.add_file(room.id, "notes.md", b"old");
    let session = session(store.clone(), None);

    let mut req = request(&local.path().join("notes.md"), "/team", false);
    req.strategy = ResolutionStrategy::Autorename;
    let report = use_case()
        .execute(&session, req, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.batch.uploaded[0].node.name, "notes (1).md");
    assert_eq!(store.content(existing.id).unwrap(), b"old");
}

#[tokio::test]
async fn test_closed_session_refuses_work() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    store.add_room(None, "team", false);
    let session = session(store.clone(), None);
    session.close().await.unwrap();

    let err = use_case()
        .execute(&session, request(local.path(), "/team", true), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Session(SessionError::Closed(_))));
}

#[tokio::test]
async fn test_mirror_store_rerun_with_overwrite_keeps_ids() {
    let local = tempfile::tempdir().unwrap();
    build_tree(local.path(), &[("a.txt", b"one"), ("sub/b.txt", b"two")]);
    let remote = tempfile::tempdir().unwrap();
    std::fs::create_dir(remote.path().join("team")).unwrap();
    let store = Arc::new(MirrorStore::open(remote.path()).unwrap());
    let session = session(store.clone(), None);

    let first = use_case()
        .execute(&session, request(local.path(), "/team", true), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.batch.succeeded(), 2);
    assert_eq!(
        std::fs::read(remote.path().join("team/sub/b.txt")).unwrap(),
        b"two"
    );

    // plain rerun conflicts on every file
    let again = use_case()
        .execute(&session, request(local.path(), "/team", true), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again.batch.failed(), 2);
    assert_eq!(again.folders.as_ref().unwrap().reused, 1);

    std::fs::write(local.path().join("a.txt"), b"one, revised").unwrap();
    let mut req = request(local.path(), "/team", true);
    req.strategy = ResolutionStrategy::Overwrite;
    let second = use_case()
        .execute(&session, req, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.batch.succeeded(), 2);

    let ids = |report: &dcbulk_sync::engine::UploadReport| -> HashMap<String, u64> {
        report
            .batch
            .uploaded
            .iter()
            .map(|u| (u.node.name.clone(), u.node.id.as_u64()))
            .collect()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(
        std::fs::read(remote.path().join("team/a.txt")).unwrap(),
        b"one, revised"
    );
}

#[tokio::test]
async fn test_nested_folders_exist_before_their_files_upload() {
    let local = tempfile::tempdir().unwrap();
    build_tree(
        local.path(),
        &[("docs/readme.txt", b"read me"), ("docs/img/logo.png", b"\x89PNG")],
    );
    let store = Arc::new(MemoryStore::new());
    let teamspace = store.add_room(None, "teamspace", false);
    let archive = store.add_folder(teamspace.id, "archive");
    let session = session(store.clone(), None);

    let report = use_case()
        .execute(
            &session,
            request(local.path(), "/teamspace/archive", true),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.batch.succeeded(), 2);
    assert_eq!(store.created_folders(), ["docs", "img"]);
    // every upload went to a parent that had already been created and listed
    assert_eq!(store.unlisted_uploads(), 0);

    let docs = store.child_named(archive.id, "docs").unwrap();
    let img = store.child_named(docs.id, "img").unwrap();
    assert!(store.child_named(docs.id, "readme.txt").is_some());
    assert!(store.child_named(img.id, "logo.png").is_some());
}
