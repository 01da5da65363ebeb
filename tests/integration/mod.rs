//! Integration tests for the trellis fetch engine

mod chain_currency;
mod fetcher_flow;
mod push_reconcile;
