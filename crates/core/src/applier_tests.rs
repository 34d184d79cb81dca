// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::entity::{NewSession, Session, SessionStatus, UrlService};
use crate::fallback::RecordingFallback;
use crate::store::{Command, DisabledStore, FallbackStore, Outcome, SqliteStore, Store};
use chrono::Utc;
use std::sync::Arc;

fn setup() -> (Arc<SqliteStore>, Applier, EventBus) {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let bus = EventBus::default();
    let applier = Applier::new(StoreHandle::local_only(store.clone()), bus.clone());
    (store, applier, bus)
}

async fn pending(store: &SqliteStore) -> usize {
    match store.exec(Command::PendingCount).await.unwrap() {
        Outcome::Count(n) => n,
        other => panic!("unexpected outcome {other:?}"),
    }
}

fn url_service_message(priority: i32) -> Envelope {
    let mut svc = UrlService::new(7, "shortener", "https://s.example");
    svc.priority = priority;
    Envelope::event(
        "admin",
        EventType::UrlServiceUpdated,
        serde_json::to_value(&svc).unwrap(),
    )
}

#[tokio::test]
async fn test_applies_unknown_id_as_insert() {
    let (store, applier, _) = setup();
    let outcome = applier.apply(&url_service_message(1)).await;
    assert_eq!(
        outcome,
        ApplyOutcome::Applied {
            kind: EntityKind::UrlService,
            id: "7".into()
        }
    );
    let got = store.get(EntityKind::UrlService, "7").await.unwrap();
    assert!(matches!(got, Some(Record::UrlService(ref s)) if s.priority == 1));
}

#[tokio::test]
async fn test_applying_twice_is_idempotent() {
    let (store, applier, _) = setup();
    let msg = url_service_message(3);
    applier.apply(&msg).await;
    let once = store.get(EntityKind::UrlService, "7").await.unwrap();
    applier.apply(&msg).await;
    let twice = store.get(EntityKind::UrlService, "7").await.unwrap();
    assert_eq!(once, twice);
}

#[tokio::test]
async fn test_applied_changes_never_reach_the_outbox() {
    let (store, applier, _) = setup();
    let session = Session::start(
        "s-1".into(),
        "u-1".into(),
        NewSession::new("1.2.3.4", 1080),
        Utc::now(),
    );
    for event_type in [EventType::SessionCreated, EventType::SessionLocationUpdated] {
        let msg = Envelope::event("admin", event_type, serde_json::to_value(&session).unwrap());
        applier.apply(&msg).await;
    }
    applier.apply(&url_service_message(2)).await;
    assert_eq!(pending(&store).await, 0);
}

#[tokio::test]
async fn test_later_message_overwrites_all_fields() {
    let (store, applier, _) = setup();
    applier.apply(&url_service_message(1)).await;

    let mut svc = UrlService::new(7, "renamed", "https://other.example");
    svc.is_active = false;
    let msg = Envelope::event(
        "admin",
        EventType::UrlServiceUpdated,
        serde_json::to_value(&svc).unwrap(),
    );
    applier.apply(&msg).await;

    let Some(Record::UrlService(stored)) =
        store.get(EntityKind::UrlService, "7").await.unwrap()
    else {
        panic!("url service missing");
    };
    assert_eq!(stored.name, "renamed");
    assert_eq!(stored.priority, 0);
    assert!(!stored.is_active);
}

#[tokio::test]
async fn test_stale_session_update_does_not_revive() {
    let (store, applier, _) = setup();
    let mut session = Session::start(
        "s-1".into(),
        "u-1".into(),
        NewSession::new("1.2.3.4", 1080),
        Utc::now(),
    );
    session.status = SessionStatus::Expired;
    applier
        .apply(&Envelope::event(
            "admin",
            EventType::SessionExpired,
            serde_json::to_value(&session).unwrap(),
        ))
        .await;

    session.status = SessionStatus::Connected;
    applier
        .apply(&Envelope::event(
            "admin",
            EventType::SessionUpdated,
            serde_json::to_value(&session).unwrap(),
        ))
        .await;

    let Some(Record::Session(stored)) = store.get(EntityKind::Session, "s-1").await.unwrap()
    else {
        panic!("session missing");
    };
    assert_eq!(stored.status, SessionStatus::Expired);
}

#[tokio::test]
async fn test_publishes_entity_updated() {
    let (_, applier, bus) = setup();
    let mut rx = bus.subscribe();
    applier.apply(&url_service_message(1)).await;
    assert_eq!(
        rx.try_recv().unwrap(),
        Notification::EntityUpdated {
            entity: EntityKind::UrlService,
            id: "7".into(),
            event_type: EventType::UrlServiceUpdated,
        }
    );
}

#[tokio::test]
async fn test_unknown_and_control_messages_are_ignored() {
    let (store, applier, bus) = setup();
    let mut rx = bus.subscribe();
    let unknown = Envelope::new("invoice_paid", serde_json::json!({ "id": 1 }), "admin");
    assert_eq!(applier.apply(&unknown).await, ApplyOutcome::Ignored);
    assert_eq!(
        applier.apply(&Envelope::ping("admin", 1)).await,
        ApplyOutcome::Ignored
    );
    assert!(rx.try_recv().is_err());
    assert_eq!(pending(&store).await, 0);
}

#[tokio::test]
async fn test_partial_payload_is_malformed() {
    let (store, applier, _) = setup();
    let msg = Envelope::event(
        "admin",
        EventType::UrlServiceUpdated,
        serde_json::json!({ "id": 7, "priority": 1 }),
    );
    assert_eq!(applier.apply(&msg).await, ApplyOutcome::Malformed);
    assert!(store
        .get(EntityKind::UrlService, "7")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_unavailable_store_reports_failure() {
    let applier = Applier::new(
        StoreHandle::local_only(Arc::new(DisabledStore::new())),
        EventBus::default(),
    );
    assert_eq!(
        applier.apply(&url_service_message(1)).await,
        ApplyOutcome::Failed
    );
}

#[tokio::test]
async fn test_degraded_store_does_not_report_applied() {
    let fallback = Arc::new(RecordingFallback::default());
    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let applier = Applier::new(
        StoreHandle::new(
            Arc::new(DisabledStore::new()),
            Arc::new(FallbackStore::new(fallback.clone(), "desktop")),
        ),
        bus,
    );

    assert_eq!(
        applier.apply(&url_service_message(1)).await,
        ApplyOutcome::Failed
    );
    assert!(rx.try_recv().is_err());
    assert!(fallback.delivered().is_empty());
}
