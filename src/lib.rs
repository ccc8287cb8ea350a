//! opsdiag - cluster-side health checks and support bundles for edge IoT
//! operations on Kubernetes

pub mod checks;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod resources;
pub mod support;
