//! Tests for the session registry.

use std::sync::Arc;
use strictly_rooms::{
    ChessEngine, ConnectionId, Outbox, SessionRegistry, SessionSettings, lock_session,
};

fn registry() -> SessionRegistry<ChessEngine> {
    SessionRegistry::new(ChessEngine::new(), SessionSettings::default())
}

#[test]
fn test_get_or_create_returns_same_session() {
    let registry = registry();
    let first = registry.get_or_create("g1");
    let second = registry.get_or_create("g1");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
    assert_eq!(lock_session(&first).key(), "g1");
}

#[test]
fn test_get_unknown_is_none() {
    let registry = registry();
    assert!(registry.get("missing").is_none());
    assert!(registry.is_empty());
}

#[test]
fn test_remove_is_idempotent() {
    let registry = registry();
    registry.get_or_create("g1");

    registry.remove("g1");
    registry.remove("g1");
    registry.remove("never-existed");
    assert!(registry.get("g1").is_none());
}

#[test]
fn test_remove_if_empty_keeps_occupied_sessions() {
    let registry = registry();
    registry.with_or_create("busy", |session| {
        session.join(ConnectionId(1), &mut Outbox::new());
    });
    registry.get_or_create("idle");

    assert!(!registry.remove_if_empty("busy"));
    assert!(registry.remove_if_empty("idle"));
    assert!(!registry.remove_if_empty("idle"));
    assert_eq!(registry.keys(), vec!["busy".to_string()]);
}

#[test]
fn test_with_then_reap_removes_emptied_session() {
    let registry = registry();
    let connection = ConnectionId(7);
    registry.with_or_create("g1", |session| {
        session.join(connection, &mut Outbox::new());
    });

    let result = registry.with_then_reap("g1", |session| {
        session.leave(connection, &mut Outbox::new())
    });
    assert!(matches!(result, Some((Some(_), true))));
    assert!(registry.get("g1").is_none());

    assert!(registry.with_then_reap("g1", |_| ()).is_none());
}

#[test]
fn test_for_each_allows_reentry() {
    let registry = registry();
    registry.get_or_create("a");
    registry.get_or_create("b");

    let mut visited = Vec::new();
    registry.for_each(|key, session| {
        assert_eq!(lock_session(session).key(), key);
        registry.remove(key);
        visited.push(key.to_string());
    });
    visited.sort();

    assert_eq!(visited, vec!["a".to_string(), "b".to_string()]);
    assert!(registry.is_empty());
}

#[test]
fn test_summaries_sorted_by_key() {
    let registry = registry();
    registry.get_or_create("zeta");
    registry.get_or_create("alpha");

    let keys: Vec<String> = registry
        .summaries()
        .iter()
        .map(|summary| summary.key().clone())
        .collect();
    assert_eq!(keys, vec!["alpha".to_string(), "zeta".to_string()]);
}

#[test]
fn test_sessions_share_engine_settings() {
    let settings = SessionSettings::new(Some(3), None, false);
    let registry = SessionRegistry::new(ChessEngine::new(), settings);
    let connection = ConnectionId(1);
    registry.with_or_create("g1", |session| {
        let mut out = Outbox::new();
        session.join(connection, &mut out);
        session.set_display_name(connection, "Alice", &mut out);
        assert_eq!(
            session.display_name(strictly_rooms::Role::FirstMover),
            Some("Ali")
        );
    });
}
