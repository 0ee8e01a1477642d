// Integration tests for document operations on open sessions

use crate::common::{create_test_services, create_test_services_with};
use indexd::core::error::IndexdError;
use indexd::core::session::{SessionHandle, SessionManager, SessionReply, SessionRequest};
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn update(id: &str, fields: &[(&str, &str)]) -> SessionRequest {
    SessionRequest::UpdateDocument {
        id: id.to_string(),
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn search(query: &str, limit: Option<usize>) -> SessionRequest {
    SessionRequest::Search {
        query: query.to_string(),
        limit,
    }
}

async fn hits(handle: &SessionHandle, request: SessionRequest) -> (usize, Vec<String>) {
    match handle.call(request).await.expect("Search failed") {
        SessionReply::Search(hits) => (hits.total_hits, hits.hits),
        other => panic!("Expected search hits, got {other:?}"),
    }
}

async fn open(manager: &mut SessionManager, peer: indexd::PeerId, path: &str, analyzer: Value) -> SessionHandle {
    let id = manager
        .open(peer, path, &analyzer)
        .await
        .expect("Failed to open session");
    manager.registry().lookup(&id).unwrap()
}

#[tokio::test]
async fn test_index_and_search() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (mut manager, _events) = SessionManager::new(&services);
    let handle = open(&mut manager, peer.id(), "shards/docs", json!("standard")).await;

    handle
        .call(update("doc-1", &[("title", "Rust in Action"), ("body", "ownership")]))
        .await
        .unwrap();
    handle
        .call(update("doc-2", &[("body", "borrowing and ownership")]))
        .await
        .unwrap();

    // Nothing is visible before a commit
    assert_eq!(hits(&handle, search("ownership", None)).await.0, 0);

    handle.call(SessionRequest::Commit).await.unwrap();

    let (total, mut ids) = hits(&handle, search("ownership", None)).await;
    ids.sort();
    assert_eq!(total, 2);
    assert_eq!(ids, vec!["doc-1", "doc-2"]);

    let (total, ids) = hits(&handle, search("ownership", Some(1))).await;
    assert_eq!(total, 2);
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn test_update_replaces_and_delete_removes() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (mut manager, _events) = SessionManager::new(&services);
    let handle = open(&mut manager, peer.id(), "shards/replace", json!("standard")).await;

    handle.call(update("doc-1", &[("body", "alpha")])).await.unwrap();
    handle.call(SessionRequest::Commit).await.unwrap();
    handle.call(update("doc-1", &[("body", "beta")])).await.unwrap();
    handle.call(SessionRequest::Commit).await.unwrap();

    assert_eq!(hits(&handle, search("alpha", None)).await.0, 0);
    assert_eq!(hits(&handle, search("beta", None)).await.0, 1);

    handle
        .call(SessionRequest::DeleteDocument {
            id: "doc-1".to_string(),
        })
        .await
        .unwrap();
    handle.call(SessionRequest::Commit).await.unwrap();
    assert_eq!(hits(&handle, search("beta", None)).await.0, 0);
}

#[tokio::test]
async fn test_english_analyzer_stems() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (mut manager, _events) = SessionManager::new(&services);
    let handle = open(&mut manager, peer.id(), "shards/english", json!("english")).await;

    handle
        .call(update("doc-1", &[("body", "The runners were running")]))
        .await
        .unwrap();
    handle.call(SessionRequest::Commit).await.unwrap();

    assert_eq!(hits(&handle, search("run", None)).await.0, 1);
}

#[tokio::test]
async fn test_perfield_analyzer() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (mut manager, _events) = SessionManager::new(&services);
    let analyzer = json!({
        "name": "perfield",
        "default": "standard",
        "fields": {"sku": "keyword"}
    });
    let handle = open(&mut manager, peer.id(), "shards/perfield", analyzer).await;

    handle
        .call(update("doc-1", &[("sku", "XJ-9000"), ("body", "Heavy Duty Widget")]))
        .await
        .unwrap();
    handle.call(SessionRequest::Commit).await.unwrap();

    assert_eq!(hits(&handle, search("sku:\"XJ-9000\"", None)).await.0, 1);
    assert_eq!(hits(&handle, search("sku:xj", None)).await.0, 0);
    assert_eq!(hits(&handle, search("widget", None)).await.0, 1);
}

#[tokio::test]
async fn test_bad_query_is_invalid_request() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (mut manager, _events) = SessionManager::new(&services);
    let handle = open(&mut manager, peer.id(), "shards/query", json!("standard")).await;

    let result = handle.call(search("missing_field:value", None)).await;
    assert!(matches!(result, Err(IndexdError::InvalidRequest(_))));

    // The session survives a failed request
    assert!(handle.call(SessionRequest::Commit).await.is_ok());
}

#[tokio::test]
async fn test_search_limit_capped() {
    let services = create_test_services_with(|config| {
        config.search.default_limit = 2;
        config.search.max_limit = 3;
    });
    let peer = services.peers.register();
    let (mut manager, _events) = SessionManager::new(&services);
    let handle = open(&mut manager, peer.id(), "shards/limits", json!("standard")).await;

    for i in 0..5 {
        handle
            .call(update(&format!("doc-{i}"), &[("body", "common")]))
            .await
            .unwrap();
    }
    handle.call(SessionRequest::Commit).await.unwrap();

    let (total, ids) = hits(&handle, search("common", None)).await;
    assert_eq!(total, 5);
    assert_eq!(ids.len(), 2);

    let (_, ids) = hits(&handle, search("common", Some(100))).await;
    assert_eq!(ids.len(), 3);

    let (_, ids) = hits(&handle, search("common", Some(0))).await;
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn test_info_and_disk_size() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (mut manager, _events) = SessionManager::new(&services);
    let handle = open(&mut manager, peer.id(), "shards/info", json!("standard")).await;

    handle.call(update("doc-1", &[("body", "x")])).await.unwrap();
    handle.call(SessionRequest::Commit).await.unwrap();

    let info = match handle.call(SessionRequest::Info).await.unwrap() {
        SessionReply::Info(info) => info,
        other => panic!("Expected info, got {other:?}"),
    };
    assert_eq!(info.path, "shards/info");
    assert_eq!(info.doc_count, 1);
    assert!(info.disk_size > 0);

    match handle.call(SessionRequest::DiskSize).await.unwrap() {
        SessionReply::DiskSize(bytes) => {
            assert_eq!(bytes, manager.disk_size("shards/info"));
        }
        other => panic!("Expected disk size, got {other:?}"),
    }
}

#[tokio::test]
async fn test_close_persists_uncommitted_documents() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (mut manager, _events) = SessionManager::new(&services);

    let handle = open(&mut manager, peer.id(), "shards/persist", json!("standard")).await;
    handle.call(update("doc-1", &[("body", "durable")])).await.unwrap();
    handle.call(SessionRequest::Close).await.unwrap();

    let reopened = open(&mut manager, peer.id(), "shards/persist", json!("standard")).await;
    assert_eq!(hits(&reopened, search("durable", None)).await.0, 1);
}
