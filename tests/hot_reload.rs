// Integration tests for reloading the routing table from a routes file
use std::{path::Path, sync::Arc, time::Duration};

use hostgate::{
    FileConfigProvider, ReloadRequest, ReloadState, ReloadTrigger, RouteTable,
    core::ReloadError,
};
use tempfile::TempDir;

fn write_routes(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
}

fn setup(body: Option<&str>) -> (TempDir, Arc<FileConfigProvider>, Arc<RouteTable>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.json");
    if let Some(body) = body {
        write_routes(&path, body);
    }
    (
        dir,
        Arc::new(FileConfigProvider::new(path)),
        Arc::new(RouteTable::new()),
    )
}

async fn wait_for_generation(handle: &hostgate::ReloadHandle, generation: u64) -> ReloadState {
    let mut state = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let current = *state.borrow_and_update();
            match current {
                ReloadState::Loaded { generation: g, .. } if g >= generation => return current,
                ReloadState::Terminated => return current,
                _ => {}
            }
            state.changed().await.unwrap();
        }
    })
    .await
    .expect("timed out waiting for reload")
}

#[tokio::test]
async fn test_reload_switches_hosts() {
    let (_dir, provider, routes) = setup(Some(
        r#"{"routes": {"a.test": "http://127.0.0.1:9001"}}"#,
    ));
    let (trigger, handle) = ReloadTrigger::new(provider.clone(), routes.clone());

    trigger.load(ReloadRequest::Startup).await.unwrap();
    assert!(routes.lookup("a.test").is_some());
    assert!(routes.lookup("b.test").is_none());

    let worker = tokio::spawn(trigger.run());

    write_routes(
        provider.path(),
        r#"{"routes": {"b.test": "http://127.0.0.1:9002"}}"#,
    );
    assert!(handle.request(ReloadRequest::Signal));

    let state = wait_for_generation(&handle, 2).await;
    assert_eq!(
        state,
        ReloadState::Loaded {
            generation: 2,
            routes: 1
        }
    );
    assert!(routes.lookup("a.test").is_none());
    assert_eq!(routes.lookup("b.test").unwrap().target().port(), 9002);

    drop(handle);
    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_missing_file_loads_zero_routes() {
    let (_dir, provider, routes) = setup(None);
    let (trigger, handle) = ReloadTrigger::new(provider, routes.clone());

    let state = trigger.load(ReloadRequest::Startup).await.unwrap();

    assert_eq!(
        state,
        ReloadState::Loaded {
            generation: 1,
            routes: 0
        }
    );
    assert_eq!(handle.state(), state);
    assert!(routes.is_empty());
}

#[tokio::test]
async fn test_malformed_startup_is_fatal() {
    let (_dir, provider, routes) = setup(Some("{\"routes\": "));
    let (trigger, handle) = ReloadTrigger::new(provider, routes.clone());

    let err = trigger.load(ReloadRequest::Startup).await.unwrap_err();

    let ReloadError::Config(config_error) = err;
    assert!(config_error.is_fatal());
    assert_eq!(handle.state(), ReloadState::Terminated);
    assert!(routes.is_empty());
    assert_eq!(routes.generation(), 0);
}

#[tokio::test]
async fn test_malformed_reload_stops_worker_and_keeps_table() {
    let (_dir, provider, routes) = setup(Some(
        r#"{"routes": {"a.test": "http://127.0.0.1:9001"}}"#,
    ));
    let (trigger, handle) = ReloadTrigger::new(provider.clone(), routes.clone());
    trigger.load(ReloadRequest::Startup).await.unwrap();
    let worker = tokio::spawn(trigger.run());

    write_routes(provider.path(), "not json");
    assert!(handle.request(ReloadRequest::Signal));

    let result = tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker should stop")
        .unwrap();
    assert!(result.is_err());
    assert_eq!(handle.state(), ReloadState::Terminated);
    assert!(routes.lookup("a.test").is_some());
}

#[tokio::test]
async fn test_invalid_entries_are_skipped_on_reload() {
    let (_dir, provider, routes) = setup(Some(r#"{"routes": {}}"#));
    let (trigger, handle) = ReloadTrigger::new(provider.clone(), routes.clone());
    trigger.load(ReloadRequest::Startup).await.unwrap();
    let worker = tokio::spawn(trigger.run());

    write_routes(
        provider.path(),
        r#"{"routes": {
            "a.test": "http://127.0.0.1:9001",
            "bad.test": "::nope::",
            "b.test": "http://127.0.0.1:9002",
            "c.test": "ftp://127.0.0.1"
        }}"#,
    );
    handle.request(ReloadRequest::Manual);

    let state = wait_for_generation(&handle, 2).await;
    assert_eq!(
        state,
        ReloadState::Loaded {
            generation: 2,
            routes: 2
        }
    );
    assert_eq!(routes.snapshot().hosts(), ["a.test", "b.test"]);

    drop(handle);
    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_burst_of_requests_is_coalesced() {
    let (_dir, provider, routes) = setup(Some(
        r#"{"routes": {"a.test": "http://127.0.0.1:9001"}}"#,
    ));
    let (trigger, handle) = ReloadTrigger::new(provider, routes.clone());
    trigger.load(ReloadRequest::Startup).await.unwrap();

    for _ in 0..3 {
        assert!(handle.request(ReloadRequest::Signal));
    }
    drop(handle);
    trigger.run().await.unwrap();

    assert_eq!(routes.generation(), 2);
}
