// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::entity::{NewSession, UserProfile};
use chrono::Duration;

fn test_session(id: &str, user_id: &str) -> Session {
    Session::start(
        id.to_string(),
        user_id.to_string(),
        NewSession::new("10.0.0.1", 1080),
        Utc::now(),
    )
}

fn event_types(db: &Database, entity_id: &str) -> Vec<String> {
    db.events_for(entity_id)
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect()
}

#[test]
fn test_open_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store.db");
    let db = Database::open(&path).unwrap();
    assert!(path.exists());
    assert_eq!(db.pending_count().unwrap(), 0);
}

#[test]
fn test_migrations_are_idempotent() {
    let db = Database::open_in_memory().unwrap();
    run_migrations(&db.conn).unwrap();
    run_migrations(&db.conn).unwrap();
}

#[test]
fn test_upsert_user_emits_created_then_updated() {
    let mut db = Database::open_in_memory().unwrap();
    let mut user = User::new("u-1".into(), Utc::now());

    assert!(db.upsert_user(&user, Origin::Local).unwrap());
    user.apply_profile(&UserProfile {
        email: Some("a@example.com".into()),
        ..Default::default()
    });
    assert!(!db.upsert_user(&user, Origin::Local).unwrap());

    let stored = db.get_user("u-1").unwrap().unwrap();
    assert_eq!(stored.email.as_deref(), Some("a@example.com"));
    assert_eq!(event_types(&db, "u-1"), vec!["user_created", "user_updated"]);
}

#[test]
fn test_remote_writes_never_touch_outbox() {
    let mut db = Database::open_in_memory().unwrap();
    let user = User::new("u-1".into(), Utc::now());
    db.upsert_user(&user, Origin::Remote).unwrap();
    db.upsert_session(&test_session("s-1", "u-1"), Origin::Remote)
        .unwrap();
    db.upsert_url_service(&UrlService::new(1, "svc", "https://a"), Origin::Remote)
        .unwrap();

    assert!(db.get_user("u-1").unwrap().is_some());
    assert!(db.get_session("s-1").unwrap().is_some());
    assert_eq!(db.pending_count().unwrap(), 0);
}

#[test]
fn test_create_session_disconnects_previous_sessions() {
    let mut db = Database::open_in_memory().unwrap();
    assert_eq!(
        db.create_session(&test_session("s-1", "u-1"), Origin::Local)
            .unwrap(),
        0
    );
    db.update_session(
        "s-1",
        &SessionPatch {
            status: Some(SessionStatus::Connected),
            ..Default::default()
        },
        Origin::Local,
    )
    .unwrap();

    assert_eq!(
        db.create_session(&test_session("s-2", "u-1"), Origin::Local)
            .unwrap(),
        1
    );

    let s1 = db.get_session("s-1").unwrap().unwrap();
    let s2 = db.get_session("s-2").unwrap().unwrap();
    assert_eq!(s1.status, SessionStatus::Disconnected);
    assert_eq!(s2.status, SessionStatus::Connecting);

    let active = db
        .list_sessions(&SessionFilter {
            user_id: Some("u-1".into()),
            active_only: true,
        })
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "s-2");
}

#[test]
fn test_create_session_leaves_other_users_alone() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_session(&test_session("s-1", "u-1"), Origin::Local)
        .unwrap();
    db.create_session(&test_session("s-2", "u-2"), Origin::Local)
        .unwrap();
    assert_eq!(
        db.get_session("s-1").unwrap().unwrap().status,
        SessionStatus::Connecting
    );
}

#[test]
fn test_create_session_rejects_duplicate_id() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_session(&test_session("s-1", "u-1"), Origin::Local)
        .unwrap();
    let err = db
        .create_session(&test_session("s-1", "u-1"), Origin::Local)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(event_types(&db, "s-1"), vec!["session_created"]);
}

#[test]
fn test_upsert_session_keeps_terminal_status() {
    let mut db = Database::open_in_memory().unwrap();
    let mut session = test_session("s-1", "u-1");
    session.status = SessionStatus::Disconnected;
    db.upsert_session(&session, Origin::Remote).unwrap();

    let mut stale = session.clone();
    stale.status = SessionStatus::Connected;
    stale.location = Some("Berlin".into());
    let stored = db.upsert_session(&stale, Origin::Remote).unwrap();

    assert_eq!(stored.status, SessionStatus::Disconnected);
    assert_eq!(stored.location.as_deref(), Some("Berlin"));
}

#[test]
fn test_upsert_active_session_keeps_single_active() {
    let mut db = Database::open_in_memory().unwrap();
    let mut a = test_session("s-a", "u-1");
    a.status = SessionStatus::Connected;
    db.upsert_session(&a, Origin::Remote).unwrap();

    let mut b = test_session("s-b", "u-1");
    b.status = SessionStatus::Connected;
    db.upsert_session(&b, Origin::Remote).unwrap();

    assert_eq!(
        db.get_session("s-a").unwrap().unwrap().status,
        SessionStatus::Disconnected
    );
}

#[test]
fn test_update_session_rejects_regression() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_session(&test_session("s-1", "u-1"), Origin::Local)
        .unwrap();
    db.end_session("s-1", None, Origin::Local).unwrap();

    let err = db
        .update_session(
            "s-1",
            &SessionPatch {
                status: Some(SessionStatus::Connected),
                ..Default::default()
            },
            Origin::Local,
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
}

#[test]
fn test_update_missing_session_is_not_found() {
    let mut db = Database::open_in_memory().unwrap();
    let err = db
        .update_session("nope", &SessionPatch::default(), Origin::Local)
        .unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(_)));
}

#[test]
fn test_empty_patch_emits_nothing() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_session(&test_session("s-1", "u-1"), Origin::Local)
        .unwrap();
    db.update_session("s-1", &SessionPatch::default(), Origin::Local)
        .unwrap();
    assert_eq!(event_types(&db, "s-1"), vec!["session_created"]);
}

#[test]
fn test_end_session_with_duration_logs_connection() {
    let mut db = Database::open_in_memory().unwrap();
    db.upsert_user(&User::new("u-1".into(), Utc::now()), Origin::Local)
        .unwrap();
    db.create_session(&test_session("s-1", "u-1"), Origin::Local)
        .unwrap();

    let (session, log) = db.end_session("s-1", Some(90), Origin::Local).unwrap();
    let log = log.unwrap();

    assert_eq!(session.status, SessionStatus::Disconnected);
    assert_eq!(log.duration_secs, 90);
    assert_eq!(log.session_id, "s-1");
    assert_eq!(db.list_connection_logs(Some("u-1")).unwrap(), vec![log.clone()]);
    assert_eq!(
        db.get_user("u-1").unwrap().unwrap().total_connection_secs,
        90
    );
    assert_eq!(event_types(&db, "s-1"), vec!["session_created", "session_ended"]);
    assert_eq!(event_types(&db, &log.id), vec!["connection_log_created"]);
}

#[test]
fn test_end_session_without_duration_has_no_log() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_session(&test_session("s-1", "u-1"), Origin::Local)
        .unwrap();
    let (_, log) = db.end_session("s-1", None, Origin::Local).unwrap();
    assert!(log.is_none());
    assert!(db.list_connection_logs(None).unwrap().is_empty());
}

#[test]
fn test_connection_log_insert_is_idempotent() {
    let mut db = Database::open_in_memory().unwrap();
    db.upsert_user(&User::new("u-1".into(), Utc::now()), Origin::Remote)
        .unwrap();
    let log = ConnectionLog {
        id: "log-1".into(),
        user_id: "u-1".into(),
        session_id: "s-1".into(),
        duration_secs: 30,
        is_trial: false,
        created_at: Utc::now(),
    };
    assert!(db.insert_connection_log(&log, Origin::Remote).unwrap());
    assert!(!db.insert_connection_log(&log, Origin::Remote).unwrap());
    assert_eq!(
        db.get_user("u-1").unwrap().unwrap().total_connection_secs,
        30
    );
}

#[test]
fn test_expire_sessions_only_touches_connected_past_expiry() {
    let mut db = Database::open_in_memory().unwrap();
    let now = Utc::now();

    let mut past = test_session("s-past", "u-1");
    past.status = SessionStatus::Connected;
    past.expires_at = Some(now - Duration::minutes(1));
    db.upsert_session(&past, Origin::Remote).unwrap();

    let mut future = test_session("s-future", "u-2");
    future.status = SessionStatus::Connected;
    future.expires_at = Some(now + Duration::hours(1));
    db.upsert_session(&future, Origin::Remote).unwrap();

    let mut connecting = test_session("s-connecting", "u-3");
    connecting.expires_at = Some(now - Duration::minutes(1));
    db.upsert_session(&connecting, Origin::Remote).unwrap();

    let expired = db.expire_sessions(now, Origin::Local).unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, "s-past");
    assert_eq!(
        db.get_session("s-past").unwrap().unwrap().status,
        SessionStatus::Expired
    );
    assert_eq!(event_types(&db, "s-past"), vec!["session_expired"]);
    assert_eq!(
        db.get_session("s-connecting").unwrap().unwrap().status,
        SessionStatus::Connecting
    );
}

#[test]
fn test_url_services_sorted_by_priority_then_id() {
    let mut db = Database::open_in_memory().unwrap();
    for (id, priority) in [(3, 1), (1, 2), (2, 1)] {
        let mut svc = UrlService::new(id, format!("svc-{id}"), "https://x");
        svc.priority = priority;
        db.upsert_url_service(&svc, Origin::Remote).unwrap();
    }
    let mut inactive = UrlService::new(4, "off", "https://x");
    inactive.is_active = false;
    db.upsert_url_service(&inactive, Origin::Remote).unwrap();

    let ids: Vec<i64> = db
        .list_url_services(true)
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec![2, 3, 1]);
    assert_eq!(db.list_url_services(false).unwrap().len(), 4);
}

#[test]
fn test_record_url_service_result_updates_rate() {
    let mut db = Database::open_in_memory().unwrap();
    db.upsert_url_service(&UrlService::new(1, "svc", "https://x"), Origin::Remote)
        .unwrap();

    let svc = db.record_url_service_result(1, false, Origin::Local).unwrap();
    assert!((svc.success_rate - 0.9).abs() < 1e-9);
    assert!(svc.last_used_at.is_some());
    assert_eq!(event_types(&db, "1"), vec!["url_service_updated"]);

    let err = db
        .record_url_service_result(99, true, Origin::Local)
        .unwrap_err();
    assert!(matches!(err, Error::UrlServiceNotFound(_)));
}

#[test]
fn test_update_url_service_applies_patch() {
    let mut db = Database::open_in_memory().unwrap();
    db.upsert_url_service(&UrlService::new(1, "svc", "https://x"), Origin::Remote)
        .unwrap();
    let svc = db
        .update_url_service(
            1,
            &UrlServicePatch {
                is_active: Some(false),
                priority: Some(5),
                ..Default::default()
            },
            Origin::Local,
        )
        .unwrap();
    assert!(!svc.is_active);
    assert_eq!(svc.priority, 5);
    assert!(db.list_url_services(true).unwrap().is_empty());
}

#[test]
fn test_config_upsert_and_public_listing() {
    let mut db = Database::open_in_memory().unwrap();
    let public = ConfigEntry {
        key: "max_trial_minutes".into(),
        value: "30".into(),
        value_type: crate::entity::ConfigType::Number,
        is_public: true,
    };
    let private = ConfigEntry {
        key: "admin_token".into(),
        value: "secret".into(),
        value_type: crate::entity::ConfigType::String,
        is_public: false,
    };
    db.upsert_config(&public, Origin::Local).unwrap();
    db.upsert_config(&private, Origin::Local).unwrap();

    let listed = db.list_config(true).unwrap();
    assert_eq!(listed, vec![public.clone()]);
    assert_eq!(db.list_config(false).unwrap().len(), 2);
    assert_eq!(event_types(&db, "max_trial_minutes"), vec!["config_updated"]);

    let mut changed = public.clone();
    changed.value = "45".into();
    db.upsert_config(&changed, Origin::Remote).unwrap();
    assert_eq!(
        db.get_config("max_trial_minutes").unwrap().unwrap().value,
        "45"
    );
}

#[test]
fn test_pending_events_in_creation_order() {
    let mut db = Database::open_in_memory().unwrap();
    for i in 0..5 {
        db.upsert_user(&User::new(format!("u-{i}"), Utc::now()), Origin::Local)
            .unwrap();
    }
    let pending = db.pending_events(3).unwrap();
    let ids: Vec<&str> = pending.iter().map(|e| e.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["u-0", "u-1", "u-2"]);
    assert!(pending.iter().all(|e| e.source == "local" && !e.processed));
}

#[test]
fn test_pending_events_ignore_clock_steps() {
    let mut db = Database::open_in_memory().unwrap();
    db.upsert_user(&User::new("u-1".into(), Utc::now()), Origin::Local)
        .unwrap();
    db.upsert_user(&User::new("u-2".into(), Utc::now()), Origin::Local)
        .unwrap();
    // The second row carries an earlier timestamp, as after a clock step back.
    db.conn
        .execute(
            "UPDATE sync_events SET created_at = ?1 WHERE entity_id = 'u-2'",
            params![ts(&(Utc::now() - Duration::hours(1)))],
        )
        .unwrap();

    let pending = db.pending_events(10).unwrap();
    let ids: Vec<&str> = pending.iter().map(|e| e.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["u-1", "u-2"]);
    assert_eq!(event_types(&db, "u-2"), vec!["user_created"]);
}

#[test]
fn test_mark_processed_is_one_way() {
    let mut db = Database::open_in_memory().unwrap();
    db.upsert_user(&User::new("u-1".into(), Utc::now()), Origin::Local)
        .unwrap();
    let id = db.pending_events(1).unwrap()[0].id;

    assert!(db.mark_processed(id).unwrap());
    assert!(!db.mark_processed(id).unwrap());
    assert_eq!(db.pending_count().unwrap(), 0);
    assert!(db.events_for("u-1").unwrap()[0].processed);
}

#[test]
fn test_compact_processed_keeps_pending_rows() {
    let mut db = Database::open_in_memory().unwrap();
    db.upsert_user(&User::new("u-1".into(), Utc::now()), Origin::Local)
        .unwrap();
    db.upsert_user(&User::new("u-2".into(), Utc::now()), Origin::Local)
        .unwrap();
    let first = db.pending_events(1).unwrap()[0].id;
    db.mark_processed(first).unwrap();

    let removed = db
        .compact_processed(Utc::now() + Duration::seconds(1))
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(db.pending_count().unwrap(), 1);
    assert!(db.events_for("u-1").unwrap().is_empty());
}

#[test]
fn test_corrupted_status_is_reported() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_session(&test_session("s-1", "u-1"), Origin::Local)
        .unwrap();
    db.conn
        .execute("UPDATE sessions SET status = 'bogus' WHERE id = 's-1'", [])
        .unwrap();
    assert!(db.get_session("s-1").is_err());
}
