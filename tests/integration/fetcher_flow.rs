//! Route fetch scenarios: hydration, cache hits, failures, headers, manifest, redirects.

use super::test_utils::{engine, manifest_path, route_iri, script_route, MockTransport};
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use trellis::fetcher::preload::hints_for;
use trellis::fetcher::{FetchOutcome, FetchResourceEvent, RouteState};
use trellis::resource::{Resource, ResourceType};
use trellis::store::SuccessMeta;
use trellis::transport::{PATH_HEADER, PRELOAD_HEADER};

#[tokio::test]
async fn test_route_fetch_hydrates_graph() {
    let transport = MockTransport::new();
    let members = script_route(&transport, "home");
    let t = engine(transport);

    let outcome = t.engine.fetch_route(&RouteState::new("home")).await;
    let route = outcome.into_resource().expect("route resource");
    assert_eq!(route.iri, route_iri("home"));

    let store = t.engine.store();
    for iri in &members {
        let record = store.get(iri).expect("member stored");
        assert!(record.state.is_success(), "{iri} should be success");
    }
    assert_eq!(store.current_ids(), members);
    assert_eq!(store.pending_count(), 0);
    assert!(!t.engine.is_loading());

    let ledger = t.engine.ledger();
    assert_eq!(ledger.fetching_token(), None);
    let success = ledger.success_token().expect("promoted chain");
    assert_eq!(ledger.chain(success).unwrap().path, route_iri("home"));
}

#[tokio::test]
async fn test_cache_hit_issues_no_network_call() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let t = engine(transport.clone());

    let first = t.engine.fetch_route(&RouteState::new("home")).await;
    let calls = transport.total_calls();
    let token = t.engine.ledger().success_token();

    let second = t.engine.fetch_route(&RouteState::new("home")).await;
    assert_eq!(transport.total_calls(), calls);
    assert_eq!(second, first);
    assert_eq!(t.engine.ledger().success_token(), token);
}

#[tokio::test]
async fn test_member_404_is_tolerated() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    transport.fail("/component/text/home", 404);
    let t = engine(transport.clone());

    let outcome = t.engine.fetch_route(&RouteState::new("home")).await;
    assert!(matches!(outcome, FetchOutcome::Resource(_)));
    assert!(t.boundary.errors().is_empty());

    let record = t.engine.store().get("/component/text/home").unwrap();
    assert!(record.state.is_error());

    // The tolerated failure still counts as resolved: no refetch.
    let calls = transport.total_calls();
    t.engine.fetch_route(&RouteState::new("home")).await;
    assert_eq!(transport.total_calls(), calls);
}

#[tokio::test]
async fn test_primary_root_failure_surfaces_and_refetches() {
    let transport = MockTransport::new();
    script_route(&transport, "broken");
    transport.fail(&route_iri("broken"), 500);
    let t = engine(transport.clone());

    let outcome = t.engine.fetch_route(&RouteState::new("broken")).await;
    assert!(outcome.is_missing());
    let (iri, error) = t.boundary.last().expect("fatal error surfaced");
    assert_eq!(iri, route_iri("broken"));
    assert_eq!(error.status, Some(500));

    t.engine.fetch_route(&RouteState::new("broken")).await;
    assert_eq!(transport.calls(&route_iri("broken")), 2);
}

#[tokio::test]
async fn test_non_root_server_error_is_not_fatal() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    transport.fail("/_/pages/home", 503);
    let t = engine(transport.clone());

    t.engine.fetch_route(&RouteState::new("home")).await;
    assert!(t.boundary.errors().is_empty());

    // The chain is not resolved, so the next navigation fetches again.
    t.engine.fetch_route(&RouteState::new("home")).await;
    assert_eq!(transport.calls(&route_iri("home")), 2);
}

#[tokio::test]
async fn test_requests_carry_path_and_preload_headers() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let t = engine(transport.clone());

    t.engine.fetch_route(&RouteState::new("home")).await;

    let route = transport.last_request(&route_iri("home")).unwrap();
    assert_eq!(route.header(PATH_HEADER), Some(route_iri("home").as_str()));
    assert_eq!(
        route.header(PRELOAD_HEADER),
        Some(hints_for(ResourceType::Route).join(",").as_str())
    );

    let page = transport.last_request("/_/pages/home").unwrap();
    assert_eq!(page.header(PATH_HEADER), Some(route_iri("home").as_str()));
    assert_eq!(
        page.header(PRELOAD_HEADER),
        Some(hints_for(ResourceType::Page).join(",").as_str())
    );

    let manifest = transport.last_request(&manifest_path("home")).unwrap();
    assert_eq!(manifest.header(PRELOAD_HEADER), None);

    let record = t.engine.store().get("/component/text/home").unwrap();
    assert_eq!(
        record.state.success_meta().and_then(|meta| meta.path.clone()),
        Some(route_iri("home"))
    );
}

#[tokio::test]
async fn test_manifest_resources_join_the_chain() {
    let transport = MockTransport::new();
    let mut members = script_route(&transport, "home");
    transport.respond(
        &manifest_path("home"),
        json!({"resource_iris": ["/component/text/sidebar"]}),
    );
    transport.respond(
        "/component/text/sidebar",
        json!({"@id": "/component/text/sidebar", "@type": "Component"}),
    );
    let t = engine(transport.clone());

    t.engine.fetch_route(&RouteState::new("home")).await;

    let store = t.engine.store();
    assert!(store.get("/component/text/sidebar").unwrap().state.is_success());
    members.push("/component/text/sidebar".to_string());
    let mut current = store.current_ids();
    current.sort();
    members.sort();
    assert_eq!(current, members);
}

#[tokio::test]
async fn test_manifest_failure_does_not_block_the_chain() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    transport.fail(&manifest_path("home"), 500);
    let t = engine(transport);

    let outcome = t.engine.fetch_route(&RouteState::new("home")).await;
    assert!(matches!(outcome, FetchOutcome::Resource(_)));
    assert!(t.engine.ledger().success_token().is_some());
}

#[tokio::test]
async fn test_redirect_aborts_the_chain() {
    let transport = MockTransport::new();
    script_route(&transport, "old");
    transport.respond(
        &route_iri("old"),
        json!({"@id": route_iri("old"), "redirectPath": "/new", "page": "/_/pages/old"}),
    );
    let t = engine(transport.clone());

    let outcome = t.engine.fetch_route(&RouteState::new("old")).await;
    assert_eq!(
        outcome,
        FetchOutcome::Redirect {
            from: route_iri("old"),
            to: "/new".to_string()
        }
    );
    assert_eq!(transport.calls("/_/pages/old"), 0);
    let ledger = t.engine.ledger();
    assert_eq!(ledger.success_token(), None);
    assert_eq!(ledger.fetching_token(), None);
    assert!(!t.engine.is_loading());
}

#[tokio::test]
async fn test_iri_param_fetches_without_manifest() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let t = engine(transport.clone());

    let route = RouteState::new("/ignored").with_param("iri", "/_/pages/home");
    let outcome = t.engine.fetch_route(&route).await;
    assert_eq!(outcome.into_resource().unwrap().iri, "/_/pages/home");
    assert_eq!(transport.calls(&manifest_path("/ignored")), 0);
    assert!(t.engine.store().get("/component/text/home").is_some());
}

#[tokio::test]
async fn test_shallow_fetch_skips_relations() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let t = engine(transport.clone());

    let outcome = t
        .engine
        .fetcher()
        .fetch_resource(FetchResourceEvent::new("/_/pages/home").shallow())
        .await;
    assert!(outcome.into_resource().is_some());
    assert_eq!(transport.total_calls(), 1);
    assert!(t.engine.store().get("/_/pages/home").unwrap().state.is_success());
}

#[tokio::test]
async fn test_no_save_fetch_leaves_store_untouched() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let t = engine(transport.clone());

    let outcome = t
        .engine
        .fetcher()
        .fetch_resource(FetchResourceEvent::new("/_/pages/home").no_save())
        .await;
    assert_eq!(outcome.into_resource().unwrap().iri, "/_/pages/home");
    assert!(transport.calls("/component/text/home") > 0);
    assert_eq!(t.engine.store().summary().total, 0);
    assert!(t.engine.ledger().tokens().is_empty());
}

#[tokio::test]
async fn test_engine_fetch_resource_returns_hydrated_root() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let t = engine(transport);

    let group = t
        .engine
        .fetch_resource("/_/component_groups/home")
        .await
        .unwrap();
    assert_eq!(group.resource_type, Some(ResourceType::ComponentGroup));
    assert!(t.engine.get_resource("/component/text/home").is_some());
    // Non-primary chains are discarded once finished.
    assert!(t.engine.ledger().tokens().is_empty());
}

#[tokio::test]
async fn test_no_save_primary_keeps_current_navigation() {
    let transport = MockTransport::new();
    let members = script_route(&transport, "home");
    script_route(&transport, "preview");
    let t = engine(transport);
    t.engine.fetch_route(&RouteState::new("home")).await;
    let success = t.engine.ledger().success_token().unwrap();

    let outcome = t
        .engine
        .fetcher()
        .fetch_resource(FetchResourceEvent::primary(route_iri("preview")).no_save())
        .await;
    assert_eq!(outcome.into_resource().unwrap().iri, route_iri("preview"));

    let store = t.engine.store();
    assert_eq!(store.current_ids(), members);
    assert!(!store.contains(&route_iri("preview")));
    let ledger = t.engine.ledger();
    assert_eq!(ledger.success_token(), Some(success));
    assert_eq!(ledger.fetching_token(), None);
    assert_eq!(ledger.tokens(), vec![success]);
}

#[tokio::test(start_paused = true)]
async fn test_repeat_navigation_waits_for_reload() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let t = engine(transport.clone());
    t.engine.fetch_route(&RouteState::new("home")).await;
    let calls = transport.total_calls();

    let store = t.engine.store().clone();
    store.mark_pending(&route_iri("home"));
    let waiting = {
        let fetcher = t.engine.fetcher().clone();
        tokio::spawn(async move { fetcher.fetch_route(&RouteState::new("home")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!waiting.is_finished());

    let refreshed = Resource::from_document(
        &route_iri("home"),
        json!({"@id": route_iri("home"), "page": "/_/pages/home", "title": "fresh"}),
    )
    .unwrap();
    store.upsert(refreshed.clone(), SuccessMeta::for_path(Some(route_iri("home"))));

    assert_eq!(waiting.await.unwrap(), FetchOutcome::Resource(refreshed));
    assert_eq!(transport.total_calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_repeat_navigation_wait_is_bounded() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let t = engine(transport.clone());
    let first = t.engine.fetch_route(&RouteState::new("home")).await;
    let calls = transport.total_calls();

    t.engine.store().mark_pending(&route_iri("home"));
    let started = Instant::now();
    let outcome = t.engine.fetch_route(&RouteState::new("home")).await;

    assert!(started.elapsed() >= t.engine.config().fetch.ready_timeout());
    assert_eq!(outcome, first);
    assert!(t.engine.store().is_pending(&route_iri("home")));
    assert_eq!(transport.total_calls(), calls);
}
