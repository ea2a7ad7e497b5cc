//! Room key distribution against the in-memory crypto provider

use std::sync::atomic::Ordering;
use std::sync::Arc;

use dcbulk_core::domain::{NodeId, RemotePath, UserId};
use dcbulk_core::path::ResolvedTarget;
use dcbulk_core::ports::{ICryptoProvider, IRemoteStore};
use dcbulk_core::session::Session;
use dcbulk_sync::keys::{distribute_for_path, KeyDistributionEngine};
use dcbulk_sync::{DistributeError, KeyDistributionError};

use crate::common::{MemoryCrypto, MemoryStore};

const ROOM: NodeId = NodeId::new(7);

fn users(ids: &[u64]) -> Vec<UserId> {
    ids.iter().copied().map(UserId::new).collect()
}

fn session(store: &Arc<MemoryStore>, crypto: Option<&Arc<MemoryCrypto>>) -> Session {
    let target = ResolvedTarget {
        base_url: "https://dc.example.com".to_string(),
        path: RemotePath::root(),
    };
    Session::open(
        target,
        store.clone() as Arc<dyn IRemoteStore>,
        crypto.map(|c| c.clone() as Arc<dyn ICryptoProvider>),
    )
}

fn path(raw: &str) -> RemotePath {
    raw.parse().unwrap()
}

#[tokio::test]
async fn test_equips_only_members_without_key() {
    let crypto = Arc::new(MemoryCrypto::new());
    crypto.add_member(ROOM, 1, true);
    crypto.add_member(ROOM, 2, false);
    crypto.add_member(ROOM, 3, false);

    let engine = KeyDistributionEngine::new(crypto.clone());
    let result = engine.distribute(ROOM).await.unwrap();

    assert_eq!(result.room_id, ROOM);
    assert_eq!(result.equipped, users(&[2, 3]));
    assert!(result.failed.is_empty());
    assert_eq!(crypto.stored_for(), users(&[2, 3]));
}

#[tokio::test]
async fn test_one_failing_member_does_not_block_others() {
    let crypto = Arc::new(MemoryCrypto::new());
    for user in 1..=5 {
        crypto.add_member(ROOM, user, false);
    }
    crypto.fail_store_for(3);

    let engine = KeyDistributionEngine::new(crypto.clone()).with_concurrency(2);
    let result = engine.distribute(ROOM).await.unwrap();

    assert_eq!(result.equipped, users(&[1, 2, 4, 5]));
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].user_id, UserId::new(3));
    assert!(result.is_partial());
}

#[tokio::test]
async fn test_encryption_failure_is_scoped_to_its_member() {
    let crypto = Arc::new(MemoryCrypto::new());
    crypto.add_member(ROOM, 1, true);
    crypto.add_member(ROOM, 2, false);
    crypto.add_member(ROOM, 3, false);
    crypto.fail_encrypt_for(3);

    let result = KeyDistributionEngine::new(crypto.clone())
        .distribute(ROOM)
        .await
        .unwrap();

    assert_eq!(result.equipped, users(&[2]));
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].user_id, UserId::new(3));
    assert!(result.failed[0].cause.contains("encryption failed"));
    assert_eq!(crypto.stored_for(), users(&[2]));
    assert!(result.is_partial());
}

#[tokio::test]
async fn test_member_without_key_pair_is_reported() {
    let crypto = Arc::new(MemoryCrypto::new());
    crypto.add_member(ROOM, 1, false);
    crypto.add_member_without_key_pair(ROOM, 2);

    let result = KeyDistributionEngine::new(crypto.clone())
        .distribute(ROOM)
        .await
        .unwrap();

    assert_eq!(result.equipped, users(&[1]));
    assert_eq!(result.failed[0].user_id, UserId::new(2));
}

#[tokio::test]
async fn test_fully_equipped_room_skips_content_key() {
    let crypto = Arc::new(MemoryCrypto::new());
    crypto.add_member(ROOM, 1, true);
    crypto.add_member(ROOM, 2, true);

    let result = KeyDistributionEngine::new(crypto.clone())
        .distribute(ROOM)
        .await
        .unwrap();

    assert!(result.equipped.is_empty());
    assert!(!result.is_partial());
    assert_eq!(crypto.content_key_requests.load(Ordering::SeqCst), 0);
    assert!(crypto.stored.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_assessment_is_recomputed_after_distribution() {
    let crypto = Arc::new(MemoryCrypto::new());
    crypto.add_member(ROOM, 2, false);
    crypto.add_member(ROOM, 1, true);

    let engine = KeyDistributionEngine::new(crypto.clone());
    let before = engine.assess(ROOM).await.unwrap();
    assert_eq!(
        before.iter().map(|a| (a.user_id.as_u64(), a.has_key)).collect::<Vec<_>>(),
        vec![(1, true), (2, false)]
    );

    engine.distribute(ROOM).await.unwrap();

    let after = engine.assess(ROOM).await.unwrap();
    assert!(after.iter().all(|a| a.has_key));

    // second run has nothing left to do
    let rerun = engine.distribute(ROOM).await.unwrap();
    assert!(rerun.equipped.is_empty());
    assert_eq!(crypto.content_key_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unavailable_membership_fails_the_room() {
    let crypto = Arc::new(MemoryCrypto::new());
    crypto.add_member(ROOM, 1, false);
    crypto.make_members_unavailable();

    let err = KeyDistributionEngine::new(crypto.clone())
        .distribute(ROOM)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        KeyDistributionError::MembersUnavailable { room_id, .. } if room_id == ROOM
    ));
    assert!(crypto.stored.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_room_is_a_no_op() {
    let crypto = Arc::new(MemoryCrypto::new());
    let result = KeyDistributionEngine::new(crypto.clone())
        .distribute(ROOM)
        .await
        .unwrap();
    assert!(result.equipped.is_empty());
    assert!(result.failed.is_empty());
}

#[tokio::test]
async fn test_distribute_for_path_uses_the_folders_room() {
    let store = Arc::new(MemoryStore::new());
    let vault = store.add_room(None, "vault", true);
    store.add_folder(vault.id, "inbox");
    let crypto = Arc::new(MemoryCrypto::new());
    crypto.add_member(vault.id, 1, true);
    crypto.add_member(vault.id, 2, false);

    let result = distribute_for_path(&session(&store, Some(&crypto)), &path("/vault/inbox"), 2)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.room_id, vault.id);
    assert_eq!(result.equipped, users(&[2]));
    assert_eq!(crypto.stored_for(), users(&[2]));
}

#[tokio::test]
async fn test_distribute_for_path_skips_unencrypted_rooms() {
    let store = Arc::new(MemoryStore::new());
    store.add_room(None, "team", false);
    let crypto = Arc::new(MemoryCrypto::new());

    let result = distribute_for_path(&session(&store, Some(&crypto)), &path("/team"), 2)
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(crypto.content_key_requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_distribute_for_path_preconditions() {
    let store = Arc::new(MemoryStore::new());
    let vault = store.add_room(None, "vault", true);
    store.add_file(vault.id, "a.txt", b"a");

    let without_crypto = session(&store, None);
    assert!(matches!(
        distribute_for_path(&without_crypto, &path("/vault"), 2).await,
        Err(DistributeError::CryptoUnavailable(id)) if id == vault.id
    ));
    assert!(matches!(
        distribute_for_path(&without_crypto, &path("/absent"), 2).await,
        Err(DistributeError::TargetNotFound(_))
    ));
    assert!(matches!(
        distribute_for_path(&without_crypto, &path("/vault/a.txt"), 2).await,
        Err(DistributeError::Keys(KeyDistributionError::InvalidTarget { .. }))
    ));
}
