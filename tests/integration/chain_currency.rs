//! Overlapping navigations: results of a superseded primary chain never land.

use super::test_utils::{engine, eventually, route_iri, script_route, MockTransport};
use serde_json::json;
use std::time::Duration;
use trellis::fetcher::{FetchOutcome, RouteState};

#[tokio::test]
async fn test_superseded_navigation_writes_are_rejected() {
    let transport = MockTransport::new();
    script_route(&transport, "page-a");
    let members_b = script_route(&transport, "page-b");
    let gate_a = transport.gate(&route_iri("page-a"));
    let t = engine(transport.clone());

    let slow = {
        let fetcher = t.engine.fetcher().clone();
        tokio::spawn(async move { fetcher.fetch_route(&RouteState::new("page-a")).await })
    };
    eventually(|| transport.calls(&route_iri("page-a")) == 1).await;
    assert!(t.engine.store().is_pending(&route_iri("page-a")));

    let fast = t.engine.fetch_route(&RouteState::new("page-b")).await;
    assert!(matches!(fast, FetchOutcome::Resource(_)));

    // page-a's response arrives after page-b became current.
    gate_a.notify_one();
    let slow = slow.await.unwrap();
    assert!(slow.is_missing());

    let store = t.engine.store();
    assert!(!store
        .get(&route_iri("page-a"))
        .map_or(false, |record| record.state.is_success()));
    assert_eq!(transport.calls("/_/pages/page-a"), 0);
    assert_eq!(store.current_ids(), members_b);
    assert_eq!(store.pending_count(), 0);

    let ledger = t.engine.ledger();
    let success = ledger.success_token().unwrap();
    assert_eq!(ledger.chain(success).unwrap().path, route_iri("page-b"));
    assert_eq!(ledger.tokens(), vec![success]);
}

#[tokio::test]
async fn test_stale_refetch_keeps_current_success() {
    let transport = MockTransport::new();
    script_route(&transport, "page-a");
    script_route(&transport, "page-b");
    let t = engine(transport.clone());

    t.engine.fetch_route(&RouteState::new("page-a")).await;
    let original = t.engine.get_resource(&route_iri("page-a")).unwrap();

    // Force a refetch of page-a, then hold its response while page-b navigates.
    t.engine.store().mark_error(
        "/_/pages/page-a",
        trellis::error::ResourceError::new(Some(500), "flaky"),
        false,
    );
    transport.respond(
        &route_iri("page-a"),
        json!({"@id": route_iri("page-a"), "page": "/_/pages/page-a", "title": "changed"}),
    );
    let gate_a = transport.gate(&route_iri("page-a"));

    let slow = {
        let fetcher = t.engine.fetcher().clone();
        tokio::spawn(async move { fetcher.fetch_route(&RouteState::new("page-a")).await })
    };
    eventually(|| transport.calls(&route_iri("page-a")) == 2).await;
    t.engine.fetch_route(&RouteState::new("page-b")).await;
    gate_a.notify_one();
    slow.await.unwrap();

    let record = t.engine.store().get(&route_iri("page-a")).unwrap();
    assert!(record.state.is_success());
    assert_eq!(record.resource(), Some(original));
    assert_eq!(t.engine.store().pending_count(), 0);
}

#[tokio::test]
async fn test_abandoned_navigation_still_settles() {
    let transport = MockTransport::new();
    script_route(&transport, "page-a");
    let members_b = script_route(&transport, "page-b");
    let gate_a = transport.gate(&route_iri("page-a"));
    let t = engine(transport.clone());

    // The caller gives up on page-a while its route request is in flight.
    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        t.engine.fetch_route(&RouteState::new("page-a")),
    )
    .await;
    assert!(abandoned.is_err());
    assert!(t.engine.store().is_pending(&route_iri("page-a")));

    t.engine.fetch_route(&RouteState::new("page-b")).await;
    gate_a.notify_one();

    let store = t.engine.store().clone();
    let ledger = t.engine.ledger().clone();
    eventually(|| store.pending_count() == 0 && ledger.tokens().len() == 1).await;
    assert!(!t.engine.is_loading());
    assert!(!store.contains(&route_iri("page-a")));
    assert_eq!(store.current_ids(), members_b);
    assert_eq!(ledger.tokens(), vec![ledger.success_token().unwrap()]);
}
