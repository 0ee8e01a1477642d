// Integration tests for the session lifecycle manager

use crate::common::{create_test_services, next_event};
use indexd::core::error::IndexdError;
use indexd::core::session::{LifecycleEvent, SessionManager, SessionRequest};
use indexd::core::types::PeerId;
use serde_json::json;
use std::collections::HashSet;

#[tokio::test]
async fn test_open_returns_unique_resolvable_ids() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (mut manager, _events) = SessionManager::new(&services);

    let mut ids = HashSet::new();
    for path in ["shards/a", "shards/b", "shards/c"] {
        let id = manager
            .open(peer.id(), path, &json!("standard"))
            .await
            .expect("Failed to open session");

        let handle = services.registry.lookup(&id).expect("Session not registered");
        assert_eq!(handle.path(), path);
        assert_eq!(manager.linked_peer(&id), Some(peer.id()));
        ids.insert(id);
    }

    assert_eq!(ids.len(), 3);
    assert_eq!(manager.session_count(), 3);
    assert_eq!(manager.open_stats().count, 3);
}

#[tokio::test]
async fn test_same_path_twice_is_storage_open_error() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (mut manager, _events) = SessionManager::new(&services);

    let first = manager
        .open(peer.id(), "shards/dup", &json!("standard"))
        .await
        .unwrap();
    let second = manager.open(peer.id(), "shards/dup", &json!("standard")).await;

    assert!(matches!(second, Err(IndexdError::StorageOpenError { .. })));
    assert_eq!(services.registry.ids(), vec![first]);
    assert_eq!(manager.open_stats().count, 1);
}

#[tokio::test]
async fn test_invalid_analyzer_leaves_registry_unchanged() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (mut manager, _events) = SessionManager::new(&services);

    let existing = manager
        .open(peer.id(), "shards/ok", &json!("standard"))
        .await
        .unwrap();
    let result = manager
        .open(peer.id(), "shards/bad", &json!("no_such_analyzer"))
        .await;

    assert!(matches!(result, Err(IndexdError::InvalidAnalyzerConfig(_))));
    assert_eq!(services.registry.ids(), vec![existing]);
    assert!(!services.root.path().join("shards/bad").exists());
}

#[tokio::test]
async fn test_invalid_perfield_name_is_analyzer_error() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (mut manager, _events) = SessionManager::new(&services);

    let result = manager
        .open(
            peer.id(),
            "shards/dash",
            &json!(["perfield", "standard", {"-x": "keyword"}]),
        )
        .await;

    assert!(matches!(result, Err(IndexdError::InvalidAnalyzerConfig(_))));
    assert!(services.registry.is_empty());
    assert!(!services.root.path().join("shards/dash").exists());
}

#[tokio::test]
async fn test_parent_path_rejected() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (mut manager, _events) = SessionManager::new(&services);

    let result = manager
        .open(peer.id(), "shards/../../escape", &json!("standard"))
        .await;

    assert!(matches!(result, Err(IndexdError::InvalidPath(_))));
    assert!(services.registry.is_empty());
}

#[tokio::test]
async fn test_peer_death_closes_linked_sessions() {
    let services = create_test_services();
    let peer = services.peers.register();
    let peer_id = peer.id();
    let (mut manager, mut events) = SessionManager::new(&services);

    let a = manager.open(peer_id, "shards/a", &json!("standard")).await.unwrap();
    let b = manager.open(peer_id, "shards/b", &json!("simple")).await.unwrap();
    let handle = services.registry.lookup(&a).unwrap();

    drop(peer);

    let event = next_event(&mut events).await;
    assert_eq!(event, LifecycleEvent::PeerDown(peer_id));
    manager.handle_event(event).await;

    assert!(services.registry.lookup(&a).unwrap_err().is_not_found());
    assert!(services.registry.lookup(&b).unwrap_err().is_not_found());
    assert_eq!(manager.linked_peer(&a), None);

    // The writer is gone
    let write = handle
        .call(SessionRequest::UpdateDocument {
            id: "doc".to_string(),
            fields: Default::default(),
        })
        .await;
    assert!(matches!(write, Err(IndexdError::SessionClosed(_))));

    // and its lock released
    let other = services.peers.register();
    let reopened = manager.open(other.id(), "shards/a", &json!("standard")).await;
    assert!(reopened.is_ok());
}

#[tokio::test]
async fn test_peer_death_spares_other_peers() {
    let services = create_test_services();
    let doomed = services.peers.register();
    let survivor = services.peers.register();
    let (mut manager, mut events) = SessionManager::new(&services);

    let gone = manager
        .open(doomed.id(), "shards/gone", &json!("standard"))
        .await
        .unwrap();
    let kept = manager
        .open(survivor.id(), "shards/kept", &json!("standard"))
        .await
        .unwrap();

    let doomed_id = doomed.id();
    drop(doomed);
    let event = next_event(&mut events).await;
    assert_eq!(event, LifecycleEvent::PeerDown(doomed_id));
    manager.handle_event(event).await;

    assert!(services.registry.lookup(&gone).is_err());
    assert!(services.registry.lookup(&kept).is_ok());
    assert_eq!(manager.linked_peer(&kept), Some(survivor.id()));
}

#[tokio::test]
async fn test_unknown_peer_terminates_immediately() {
    let services = create_test_services();
    let (mut manager, mut events) = SessionManager::new(&services);
    let ghost = PeerId::from_raw(u64::MAX);

    // The open itself succeeds; teardown follows at once
    let id = manager
        .open(ghost, "shards/ghost", &json!("standard"))
        .await
        .unwrap();
    assert!(services.registry.contains(&id));

    let event = next_event(&mut events).await;
    assert_eq!(event, LifecycleEvent::PeerDown(ghost));
    manager.handle_event(event).await;

    assert!(services.registry.is_empty());
}

#[tokio::test]
async fn test_explicit_close_unregisters_and_unlinks() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (mut manager, mut events) = SessionManager::new(&services);

    let id = manager
        .open(peer.id(), "shards/closing", &json!("standard"))
        .await
        .unwrap();
    let handle = services.registry.lookup(&id).unwrap();

    handle.call(SessionRequest::Close).await.unwrap();
    assert!(services.registry.lookup(&id).is_err());

    let event = next_event(&mut events).await;
    assert_eq!(event, LifecycleEvent::SessionClosed(id));
    manager.handle_event(event).await;
    assert_eq!(manager.linked_peer(&id), None);

    let again = handle.call(SessionRequest::Info).await;
    assert!(matches!(again, Err(IndexdError::SessionClosed(_))));
}

#[tokio::test]
async fn test_peer_death_after_close_is_harmless() {
    let services = create_test_services();
    let peer = services.peers.register();
    let peer_id = peer.id();
    let (mut manager, mut events) = SessionManager::new(&services);

    let id = manager
        .open(peer_id, "shards/x", &json!("standard"))
        .await
        .unwrap();
    services
        .registry
        .lookup(&id)
        .unwrap()
        .call(SessionRequest::Close)
        .await
        .unwrap();
    drop(peer);

    // SessionClosed and PeerDown, in whichever order they arrive
    for _ in 0..2 {
        let event = next_event(&mut events).await;
        manager.handle_event(event).await;
    }

    assert!(services.registry.is_empty());
    assert_eq!(manager.linked_peer(&id), None);
}

#[tokio::test]
async fn test_disk_size_reflects_committed_index() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (mut manager, _events) = SessionManager::new(&services);

    assert_eq!(manager.disk_size("shards/sized"), 0);

    let id = manager
        .open(peer.id(), "shards/sized", &json!("standard"))
        .await
        .unwrap();
    let handle = services.registry.lookup(&id).unwrap();
    handle
        .call(SessionRequest::UpdateDocument {
            id: "doc-1".to_string(),
            fields: [("body".to_string(), "some words".to_string())].into(),
        })
        .await
        .unwrap();
    handle.call(SessionRequest::Commit).await.unwrap();

    assert!(manager.disk_size("shards/sized") > 0);
    assert_eq!(manager.root_dir(), services.root.path());
}
