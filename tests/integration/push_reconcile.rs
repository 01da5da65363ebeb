//! Push messages: gating on loading, position refetch, tombstones, queue replacement.

use super::test_utils::{engine, engine_with, eventually, script_route, MockTransport};
use serde_json::json;
use trellis::config::{EngineConfig, PushConfig};
use trellis::fetcher::RouteState;
use trellis::push::{PushDisposition, PushMessage};
use trellis::resource::Resource;
use trellis::store::SuccessMeta;

const POSITION: &str = "/_/component_positions/home";
const COMPONENT: &str = "/component/text/home";
const PAGE: &str = "/_/pages/home";
const GROUP: &str = "/_/component_groups/home";

#[tokio::test]
async fn test_position_push_waits_for_loading_then_refetches() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let t = engine(transport.clone());
    t.engine.fetch_route(&RouteState::new("home")).await;

    // The page reloads; a position update arrives meanwhile.
    let page = t.engine.get_resource(PAGE).unwrap();
    t.engine.store().mark_pending(PAGE);
    transport.respond(
        POSITION,
        json!({"@id": POSITION, "@type": "ComponentPosition", "component": COMPONENT, "sortValue": 9}),
    );
    let disposition = t
        .engine
        .on_push_raw(&json!({
            "@id": POSITION,
            "@type": "ComponentPosition",
            "component": COMPONENT,
            "sortValue": 3
        }))
        .await
        .unwrap();
    assert_eq!(disposition, PushDisposition::Queued);
    assert_eq!(t.engine.reconciler().queue_len(), 1);
    assert_eq!(transport.calls(POSITION), 1);

    t.engine.store().upsert(page, SuccessMeta::default());

    let store = t.engine.store().clone();
    eventually(|| {
        store
            .get(POSITION)
            .and_then(|record| record.data)
            .map_or(false, |data| data["sortValue"] == 9)
    })
    .await;
    assert_eq!(transport.calls(POSITION), 2);
    // Shallow: the component is not fetched again.
    assert_eq!(transport.calls(COMPONENT), 1);
    assert_eq!(t.engine.reconciler().queue_len(), 0);
}

#[tokio::test]
async fn test_update_applies_immediately_when_idle() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let t = engine(transport.clone());
    t.engine.fetch_route(&RouteState::new("home")).await;

    let disposition = t
        .engine
        .on_push(PushMessage::update(
            COMPONENT,
            json!({"@id": COMPONENT, "@type": "Component", "text": "pushed"}),
        ))
        .await;
    let report = match disposition {
        PushDisposition::Applied(report) => report,
        other => panic!("expected immediate drain, got {other:?}"),
    };
    assert_eq!(report.upserted, vec![COMPONENT.to_string()]);
    assert_eq!(t.engine.get_resource(COMPONENT).unwrap().data["text"], "pushed");
}

#[tokio::test]
async fn test_tombstone_deletes_with_cascade() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let t = engine(transport);
    t.engine.fetch_route(&RouteState::new("home")).await;

    let disposition = t
        .engine
        .on_push_raw(&json!({"@id": COMPONENT}))
        .await
        .unwrap();
    let report = match disposition {
        PushDisposition::Applied(report) => report,
        other => panic!("expected immediate drain, got {other:?}"),
    };
    assert_eq!(report.deleted, vec![COMPONENT.to_string()]);

    let store = t.engine.store();
    assert!(!store.contains(COMPONENT));
    assert!(!store.contains(POSITION));
    assert_eq!(
        store.get(GROUP).unwrap().data.unwrap()["componentPositions"],
        json!([])
    );
    assert!(!store.current_ids().contains(&COMPONENT.to_string()));
}

#[tokio::test]
async fn test_message_for_unmounted_resource_is_discarded() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let t = engine(transport);
    t.engine.fetch_route(&RouteState::new("home")).await;

    let disposition = t
        .engine
        .on_push(PushMessage::update("/_/pages/elsewhere", json!({"@id": "/_/pages/elsewhere"})))
        .await;
    assert_eq!(disposition, PushDisposition::Discarded);
    assert!(!t.engine.store().contains("/_/pages/elsewhere"));
}

#[tokio::test]
async fn test_counterpart_of_mounted_resource_is_accepted() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let t = engine(transport);
    t.engine.fetch_route(&RouteState::new("home")).await;
    t.engine
        .store()
        .register_publishable("/component/text/home-draft", COMPONENT);

    let disposition = t
        .engine
        .on_push(PushMessage::update(
            "/component/text/home-draft",
            json!({"@id": "/component/text/home-draft", "publishedResource": COMPONENT}),
        ))
        .await;
    assert!(matches!(disposition, PushDisposition::Applied(_)));
    assert!(t.engine.store().contains("/component/text/home-draft"));
}

#[tokio::test]
async fn test_queue_replaces_entries_in_place() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let t = engine(transport);
    t.engine.fetch_route(&RouteState::new("home")).await;
    t.engine.store().mark_pending(COMPONENT);

    let reconciler = t.engine.reconciler();
    reconciler
        .on_message(PushMessage::update(PAGE, json!({"@id": PAGE, "v": 1})))
        .await;
    reconciler
        .on_message(PushMessage::update(GROUP, json!({"@id": GROUP, "v": 1})))
        .await;
    reconciler
        .on_message(PushMessage::update(PAGE, json!({"@id": PAGE, "v": 2})))
        .await;

    let queued = reconciler.queued();
    let ids: Vec<&str> = queued.iter().map(|m| m.resource_id.as_str()).collect();
    assert_eq!(ids, vec![PAGE, GROUP]);
    assert_eq!(queued[0].payload.as_ref().unwrap()["v"], 2);

    // Settling the component releases the deferred drain.
    let component = Resource::from_document(COMPONENT, json!({"@id": COMPONENT})).unwrap();
    t.engine.store().upsert(component, SuccessMeta::default());
    let store = t.engine.store().clone();
    eventually(|| store.get_resource(PAGE).map_or(false, |page| page.data["v"] == 2)).await;
    assert_eq!(t.engine.get_resource(GROUP).unwrap().data["v"], 1);
}

#[tokio::test]
async fn test_disabled_push_discards_everything() {
    let transport = MockTransport::new();
    script_route(&transport, "home");
    let config = EngineConfig {
        push: PushConfig { enabled: false },
        ..EngineConfig::default()
    };
    let t = engine_with(transport, config);
    t.engine.fetch_route(&RouteState::new("home")).await;

    let disposition = t.engine.on_push(PushMessage::tombstone(COMPONENT)).await;
    assert_eq!(disposition, PushDisposition::Discarded);
    assert!(t.engine.store().contains(COMPONENT));
}

#[tokio::test]
async fn test_invalid_raw_message_is_rejected() {
    let t = engine(MockTransport::new());
    assert!(t.engine.on_push_raw(&json!({"@type": "Page"})).await.is_err());
}
