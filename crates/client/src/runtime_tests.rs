// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::channel::test_helpers::{MockTransport, RecordingFallback};
use crate::config::RemoteConfig;
use pk_core::{
    EventType, NewSession, Origin, Record, SessionPatch, UrlService, UrlServicePatch,
};

fn realtime_config() -> Config {
    Config {
        remote: Some(RemoteConfig::new("ws://remote.test")),
        ..Config::default()
    }
}

fn memory_store() -> (StoreHandle, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    (StoreHandle::local_only(store.clone()), store)
}

async fn settle(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

#[tokio::test(start_paused = true)]
async fn test_local_changes_reach_the_channel_through_the_outbox() {
    let (transport, remote, _peer) = MockTransport::new();
    let (store, _) = memory_store();
    let runtime = Runtime::spawn(&realtime_config(), store, transport, None);
    settle(100).await;

    let id = runtime
        .service()
        .create_session("u-1", NewSession::new("1.2.3.4", 1080))
        .await
        .unwrap();

    // Next dispatcher tick is at 5s.
    settle(6_000).await;
    let sent = remote.sent();
    let created = sent.iter().find(|e| e.kind == "session_created").unwrap();
    assert_eq!(created.data["id"], id.as_str());
    assert_eq!(created.source, "desktop");
    assert_eq!(runtime.service().status().await.pending_events, 0);

    runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_location_updates_are_pushed_without_waiting_for_the_outbox() {
    let (transport, remote, _peer) = MockTransport::new();
    let (store, _) = memory_store();
    let runtime = Runtime::spawn(&realtime_config(), store, transport, None);
    settle(100).await;

    let id = runtime
        .service()
        .create_session("u-1", NewSession::new("1.2.3.4", 1080))
        .await
        .unwrap();
    let patch = SessionPatch {
        location: Some("Berlin".into()),
        ..Default::default()
    };
    runtime.service().update_session(&id, patch).await.unwrap();
    settle(100).await;

    assert_eq!(
        remote.sent_kinds(),
        vec!["identify", "session_location_updated"]
    );
    runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_remote_changes_are_applied_without_echo() {
    let (transport, remote, peer) = MockTransport::new();
    let (store, _) = memory_store();
    let runtime = Runtime::spawn(&realtime_config(), store, transport, None);
    let mut notifications = runtime.service().subscribe();
    settle(100).await;

    let svc = UrlService::new(7, "svc", "https://r.example");
    peer.send(Some(Envelope::event(
        "admin",
        EventType::UrlServiceCreated,
        serde_json::to_value(&svc).unwrap(),
    )))
    .unwrap();
    settle(100).await;

    let services = runtime.service().list_url_services().await.unwrap();
    assert_eq!(services, vec![svc]);
    assert!(matches!(
        notifications.recv().await.unwrap(),
        Notification::EntityUpdated { ref id, .. } if id == "7"
    ));

    settle(10_000).await;
    assert_eq!(runtime.service().status().await.pending_events, 0);
    assert_eq!(remote.sent_kinds(), vec!["identify"]);
    runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_admin_edit_is_broadcast() {
    let (transport, remote, _peer) = MockTransport::new();
    let (store, sqlite) = memory_store();
    sqlite
        .put(
            Record::UrlService(UrlService::new(7, "svc", "https://r.example")),
            Origin::Remote,
        )
        .await
        .unwrap();
    let runtime = Runtime::spawn(&realtime_config(), store, transport, None);
    settle(100).await;

    let patch = UrlServicePatch {
        priority: Some(1),
        ..Default::default()
    };
    runtime.service().update_url_service(7, patch).await.unwrap();
    settle(6_000).await;

    let sent = remote.sent();
    let update = sent
        .iter()
        .find(|e| e.kind == "url_service_updated")
        .unwrap();
    assert_eq!(update.data["priority"], 1);
    runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_remote_delivers_through_fallback() {
    let (transport, remote, _peer) = MockTransport::new();
    remote.refuse_connections(true);
    let (store, _) = memory_store();
    let mut config = realtime_config();
    if let Some(remote) = config.remote.as_mut() {
        remote.reconnect_max_retries = 1;
    }
    let fallback = Arc::new(RecordingFallback::default());
    let runtime = Runtime::spawn(&config, store, transport, Some(Arc::clone(&fallback) as Arc<dyn pk_core::Fallback>));

    // Initial attempt at 0s, retry at 1s, then the channel gives up.
    settle(2_000).await;
    assert_eq!(
        runtime.channel().unwrap().status().state(),
        crate::channel::ChannelState::Closed
    );

    let id = runtime
        .service()
        .create_session("u-1", NewSession::new("1.2.3.4", 1080))
        .await
        .unwrap();
    settle(6_000).await;

    assert!(fallback.delivered_ids().contains(&id.to_string()));
    assert_eq!(runtime.service().status().await.pending_events, 0);
    assert!(remote.sent().is_empty());
    runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_fallback_only_mode_runs_without_channel() {
    let (transport, remote, _peer) = MockTransport::new();
    let (store, _) = memory_store();
    let runtime = Runtime::spawn(&Config::default(), store, transport, None);
    settle(100).await;

    assert!(runtime.channel().is_none());
    assert_eq!(remote.connects(), 0);
    assert_eq!(runtime.service().status().await.channel, None);
    runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_the_channel() {
    let (transport, _remote, _peer) = MockTransport::new();
    let (store, _) = memory_store();
    let runtime = Runtime::spawn(&realtime_config(), store, transport, None);
    settle(100).await;

    let status = Arc::clone(runtime.channel().unwrap().status());
    assert!(status.is_open());
    runtime.shutdown().await;
    assert_eq!(status.state(), crate::channel::ChannelState::Closed);
}

#[tokio::test]
async fn test_open_store_degrades_when_disabled() {
    let mut config = Config::default();
    config.store.enabled = false;
    config.fallback.endpoints = vec!["http://127.0.0.1:9".into()];

    let handle = open_store(&config).await.unwrap();
    assert_eq!(handle.state(), StoreState::Disabled);
    assert!(!handle.is_connected());
}

#[tokio::test]
async fn test_open_store_uses_configured_path() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.store.path = Some(dir.path().join("nested").join("pk.db"));

    let handle = open_store(&config).await.unwrap();
    assert!(handle.is_connected());
    assert!(dir.path().join("nested").join("pk.db").exists());
}
