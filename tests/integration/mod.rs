//! Integration tests against a live cluster
//!
//! These tests require a reachable cluster in the current kubeconfig.
//! Run with: cargo test --test integration -- --ignored

mod live_test;
