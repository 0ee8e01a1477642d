// Integration tests for the dispatcher actor

use crate::common::{create_test_services, wait_for, write_file};
use indexd::core::types::PeerId;
use indexd::rpc::{Dispatch, Dispatcher, Service};
use serde_json::{json, Value};

fn reply(outcome: Dispatch) -> Value {
    match outcome {
        Dispatch::Reply(value) => value,
        Dispatch::Unhandled => panic!("Expected a reply"),
    }
}

#[tokio::test]
async fn test_disk_size_of_never_opened_path() {
    let services = create_test_services();
    let (main, _task) = Dispatcher::new(&services).spawn();

    let outcome = main
        .call(PeerId::from_raw(1), json!(["disk_size", "shards/never"]))
        .await
        .unwrap();
    assert_eq!(reply(outcome), json!(["ok", [["disk_size", 0]]]));
}

#[tokio::test]
async fn test_disk_size_sums_files() {
    let services = create_test_services();
    write_file(&services.root.path().join("shards/full/a"), 100);
    write_file(&services.root.path().join("shards/full/b"), 250);
    write_file(&services.root.path().join("shards/full/nested/c"), 999);
    let (main, _task) = Dispatcher::new(&services).spawn();

    let outcome = main
        .call(PeerId::from_raw(1), json!(["disk_size", "/shards/full"]))
        .await
        .unwrap();
    assert_eq!(reply(outcome), json!(["ok", [["disk_size", 350]]]));
}

#[tokio::test]
async fn test_get_root_dir_is_absolute() {
    let services = create_test_services();
    let (main, _task) = Dispatcher::new(&services).spawn();

    let value = reply(
        main.call(PeerId::from_raw(1), json!("get_root_dir"))
            .await
            .unwrap(),
    );
    let root = value[1].as_str().unwrap();
    assert!(std::path::Path::new(root).is_absolute());
    assert_eq!(root, services.root.path().to_string_lossy());
}

#[tokio::test]
async fn test_unrecognized_requests_are_unhandled() {
    let services = create_test_services();
    let (main, task) = Dispatcher::new(&services).spawn();

    for request in [json!("shutdown"), json!(["open"]), json!({"open": 1}), json!(null)] {
        let outcome = main.call(PeerId::from_raw(1), request).await.unwrap();
        assert_eq!(outcome, Dispatch::Unhandled);
    }

    // Still serving
    let outcome = main
        .call(PeerId::from_raw(1), json!("version"))
        .await
        .unwrap();
    assert_eq!(reply(outcome), json!(["ok", env!("CARGO_PKG_VERSION")]));
    assert!(!task.is_finished());
}

#[tokio::test]
async fn test_open_and_peer_death_through_actor() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (main, _task) = Dispatcher::new(&services).spawn();

    let value = reply(
        main.call(
            peer.id(),
            json!(["open", peer.id().to_string(), "shards/a", "standard"]),
        )
        .await
        .unwrap(),
    );
    assert_eq!(value[0], "ok");
    let id: indexd::SessionId = value[1].as_str().unwrap().parse().unwrap();
    assert!(services.registry.contains(&id));

    drop(peer);

    let registry = services.registry.clone();
    wait_for("session teardown", || {
        let registry = registry.clone();
        async move { !registry.contains(&id) }
    })
    .await;
}

#[tokio::test]
async fn test_open_error_reply() {
    let services = create_test_services();
    let peer = services.peers.register();
    let (main, _task) = Dispatcher::new(&services).spawn();

    let value = reply(
        main.call(
            peer.id(),
            json!(["open", peer.id().to_string(), "../outside", "standard"]),
        )
        .await
        .unwrap(),
    );
    assert_eq!(value[0], "error");
    assert_eq!(value[1][0], "invalid_path");

    let value = reply(
        main.call(peer.id(), json!(["open", 17, "shards/a", "standard"]))
            .await
            .unwrap(),
    );
    assert_eq!(value[1][0], "invalid_request");
    assert!(services.registry.is_empty());
}
