//! Property-based tests: writes from non-current chains never reach the store

use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use trellis::chain::{ChainLedger, StartChain};
use trellis::error::ResourceError;
use trellis::resource::Resource;
use trellis::store::{LogErrorBoundary, ResourceStore, SuccessMeta};

#[derive(Debug, Clone)]
enum Write {
    Upsert(u8),
    Pending,
    Error(u16),
}

fn write_strategy() -> impl Strategy<Value = Write> {
    prop_oneof![
        any::<u8>().prop_map(Write::Upsert),
        Just(Write::Pending),
        (400u16..600).prop_map(Write::Error),
    ]
}

fn primary(path: &str) -> StartChain {
    StartChain {
        path: path.to_string(),
        is_primary: true,
        ..StartChain::default()
    }
}

/// A superseded or aborted chain cannot change a resource in Success state
#[test]
fn test_non_current_chain_never_changes_success_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(prop::collection::vec(write_strategy(), 1..24), any::<bool>()),
            |(writes, abort_instead)| {
                let store = ResourceStore::shared(Arc::new(LogErrorBoundary));
                let ledger = ChainLedger::new(store.clone());
                let iri = "/_/pages/shared";

                let stale = ledger.start(primary("/_/routes//a")).unwrap().token();
                let current = ledger.start(primary("/_/routes//b")).unwrap().token();
                ledger.commit(current, |store| {
                    store.upsert(
                        Resource::from_document(iri, json!({"@id": iri, "v": "current"})).unwrap(),
                        SuccessMeta::for_path(Some("/_/routes//b".to_string())),
                    )
                });
                if abort_instead {
                    ledger.abort(current);
                }
                let non_current = if abort_instead { current } else { stale };
                let before = store.get(iri).unwrap();

                for write in writes {
                    let applied = ledger.commit(non_current, |store| match write {
                        Write::Upsert(v) => {
                            store.upsert(
                                Resource::from_document(iri, json!({"@id": iri, "v": v})).unwrap(),
                                SuccessMeta::default(),
                            );
                        }
                        Write::Pending => store.mark_pending(iri),
                        Write::Error(status) => {
                            store.mark_error(iri, ResourceError::new(Some(status), "stale"), false)
                        }
                    });
                    prop_assert!(applied.is_none());
                }

                prop_assert_eq!(store.get(iri).unwrap(), before);
                Ok(())
            },
        )
        .unwrap();
}
