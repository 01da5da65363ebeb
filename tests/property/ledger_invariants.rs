//! Property-based tests for fetch-chain ledger invariants

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use trellis::chain::{ChainLedger, FinishOutcome, StartChain};
use trellis::store::{LogErrorBoundary, ResourceStore};

fn ledger() -> ChainLedger {
    ChainLedger::new(ResourceStore::shared(Arc::new(LogErrorBoundary)))
}

/// Only the first add of each IRI to a chain succeeds
#[test]
fn test_add_resource_first_call_wins_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(prop::collection::vec(0u8..12, 0..64), any::<bool>()),
            |(picks, is_primary)| {
                let ledger = ledger();
                let token = ledger
                    .start(StartChain {
                        path: "/_/routes//p".to_string(),
                        is_primary,
                        ..StartChain::default()
                    })
                    .unwrap()
                    .token();

                let mut seen = HashSet::new();
                for pick in picks {
                    let iri = format!("/component/text/{}", pick);
                    let added = ledger.add_resource(token, &iri);
                    prop_assert_eq!(added, seen.insert(iri));
                }

                let resources = ledger.chain(token).unwrap().resources;
                prop_assert_eq!(resources.len(), seen.len());
                Ok(())
            },
        )
        .unwrap();
}

/// Finishing reaps non-primary chains and promotes the current primary chain
#[test]
fn test_finish_reaps_and_promotes_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(any::<bool>(), 1..16), |kinds| {
            let ledger = ledger();
            for (i, is_primary) in kinds.into_iter().enumerate() {
                let previous_success = ledger.success_token();
                let token = ledger
                    .start(StartChain {
                        path: format!("/_/routes//{}", i),
                        is_primary,
                        ..StartChain::default()
                    })
                    .unwrap()
                    .token();
                ledger.add_resource(token, &format!("/_/pages/{}", i));

                let outcome = ledger.finish(token);
                if is_primary {
                    prop_assert!(matches!(outcome, FinishOutcome::Promoted { .. }), "{:?}", outcome);
                    prop_assert_eq!(ledger.success_token(), Some(token));
                    if let Some(previous) = previous_success {
                        prop_assert!(!ledger.contains(previous));
                    }
                } else {
                    prop_assert_eq!(outcome, FinishOutcome::Discarded);
                    prop_assert!(!ledger.contains(token));
                    prop_assert_eq!(ledger.success_token(), previous_success);
                }
            }
            Ok(())
        })
        .unwrap();
}
