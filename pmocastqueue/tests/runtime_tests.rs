mod common;

use std::time::Duration;

use pmocastqueue::{
    AffectedRange, Dispatch, ItemId, QueueNotification, QueueSyncError, RemoteEvent,
    SessionState, SyncConfig, SyncRuntime,
};

use common::{RecordingClient, Sent, ids, items, media};

const WAIT: Duration = Duration::from_secs(2);

fn spawn() -> (SyncRuntime<RecordingClient>, RecordingClient) {
    let client = RecordingClient::new();
    let runtime = SyncRuntime::spawn(client.clone(), &SyncConfig::default()).unwrap();
    (runtime, client)
}

#[test]
fn test_remote_events_are_applied_before_later_calls() {
    let (runtime, _client) = spawn();
    let handle = runtime.handle();
    let sink = runtime.remote_events();

    sink.send(RemoteEvent::QueueStateChanged {
        items: items(&[1, 2, 3]),
        current_item_id: Some(ItemId(2)),
    })
    .unwrap();

    let snapshot = handle.snapshot().unwrap();
    assert_eq!(snapshot.state, SessionState::Attached);
    assert_eq!(snapshot.item_ids(), ids(&[1, 2, 3]));
    assert_eq!(snapshot.upcoming_item_id, Some(ItemId(3)));
}

#[test]
fn test_listener_is_called_from_worker() {
    let (runtime, client) = spawn();
    let handle = runtime.handle();
    let sink = handle.remote_events();

    sink.send(RemoteEvent::QueueStateChanged {
        items: items(&[1, 2, 3]),
        current_item_id: None,
    })
    .unwrap();
    let (_sub, rx) = handle.subscribe_channel();

    let outcome = handle.request_reorder(2, 0).unwrap();
    assert!(matches!(outcome, Dispatch::Remote(_)));
    assert_eq!(client.sent(), vec![Sent::Reorder(ItemId(3), 0)]);

    // the load notification may or may not have reached this listener
    let changed = rx
        .iter()
        .find(|note| *note != QueueNotification::Changed(None))
        .unwrap();
    assert_eq!(
        changed,
        QueueNotification::Changed(Some(AffectedRange::new(0, 2)))
    );
    assert_eq!(handle.snapshot().unwrap().item_ids(), ids(&[3, 1, 2]));
    drop(runtime);
}

#[test]
fn test_operation_results_flow_through_sink() {
    let (runtime, client) = spawn();
    let handle = runtime.handle();
    let sink = runtime.remote_events();

    let load = handle.request_load_queue(vec![media(1), media(2)], 1).unwrap();
    assert_eq!(handle.snapshot().unwrap().state, SessionState::Loading);
    assert_eq!(client.last_operation(), Some(load.operation));

    sink.send(RemoteEvent::OperationResult {
        operation: load.operation,
        success: false,
    })
    .unwrap();

    assert_eq!(handle.snapshot().unwrap().state, SessionState::Empty);
}

#[test]
fn test_calls_after_shutdown_fail() {
    let (runtime, _client) = spawn();
    let handle = runtime.handle();
    let sink = runtime.remote_events();

    runtime.shutdown();

    assert_eq!(handle.snapshot().unwrap_err(), QueueSyncError::RuntimeStopped);
    assert_eq!(
        handle.request_toggle_playback(),
        Err(QueueSyncError::RuntimeStopped)
    );
    // the worker is gone, nobody reads the events any more
    let _ = sink.send(RemoteEvent::ConnectivityChanged { connected: false });
}

#[test]
fn test_stale_notification_through_runtime() {
    let (runtime, _client) = spawn();
    let handle = runtime.handle();
    let (_sub, rx) = handle.subscribe_channel();

    handle
        .remote_events()
        .send(RemoteEvent::ConnectivityChanged { connected: false })
        .unwrap();

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), QueueNotification::Stale(true));
    assert!(handle.snapshot().unwrap().stale);
}
