//! Unit tests module

#[path = "../common/mod.rs"]
mod common;

mod bundle_test;
mod config_test;
mod registry_test;
