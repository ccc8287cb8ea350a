//! Support-bundle collector
//!
//! Collection is a three-stage pipeline: [`collector`] enumerates work items
//! and fetches them with bounded parallelism, and every fetched
//! [`BundleEntry`] goes through a bounded channel to the single
//! [`archive::ArchiveWriter`] that owns the zip file.

pub mod archive;
pub mod collector;
pub mod manifest;
pub mod traces;

pub use collector::create_bundle;

use crate::config::AppConfig;
use crate::resources::ServiceKind;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// One file inside the bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    /// Archive-relative path using `/` separators
    pub path: String,
    pub content: Vec<u8>,
    pub mtime: Option<DateTime<Utc>>,
}

impl BundleEntry {
    pub fn new(path: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            content,
            mtime: None,
        }
    }

    pub fn with_mtime(mut self, mtime: DateTime<Utc>) -> Self {
        self.mtime = Some(mtime);
        self
    }
}

/// What to do with the archive when collection fails or is cancelled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PartialPolicy {
    #[default]
    Discard,
    /// Keep it with a `.partial` suffix
    KeepPartial,
}

/// Inputs of one bundle run
#[derive(Debug, Clone)]
pub struct BundleOptions {
    /// Empty means every known service
    pub services: Vec<ServiceKind>,
    pub include_mq_traces: bool,
    pub bundle_dir: PathBuf,
    /// Clock reading used for the archive name and entry timestamps
    pub now: DateTime<Utc>,
    /// Only collect log lines newer than this
    pub log_age: Option<Duration>,
    pub partial_policy: PartialPolicy,
    pub workers: usize,
    pub log_byte_cap: Option<i64>,
    pub log_timeout: Duration,
}

impl BundleOptions {
    pub fn new(bundle_dir: PathBuf, now: DateTime<Utc>) -> Self {
        Self::from_config(&AppConfig::default(), bundle_dir, now)
    }

    pub fn from_config(config: &AppConfig, bundle_dir: PathBuf, now: DateTime<Utc>) -> Self {
        Self {
            services: Vec::new(),
            include_mq_traces: false,
            bundle_dir,
            now,
            log_age: None,
            partial_policy: PartialPolicy::default(),
            workers: worker_count(config.max_workers),
            log_byte_cap: Some(config.log_byte_cap),
            log_timeout: config.log_timeout(),
        }
    }

    /// Selected services, all of them when none were named
    pub fn selected_services(&self) -> Vec<ServiceKind> {
        if self.services.is_empty() {
            ServiceKind::ALL.to_vec()
        } else {
            self.services.clone()
        }
    }

    /// `support_bundle_<YYYYMMDDTHHMMSS>_<service|all>.zip`
    pub fn archive_name(&self) -> String {
        let tag = match self.services.as_slice() {
            [single] => single.moniker().to_string(),
            _ => "all".to_string(),
        };
        format!("support_bundle_{}_{}.zip", self.now.format("%Y%m%dT%H%M%S"), tag)
    }
}

/// `min(cpus * 2, max_workers)`, at least one
pub fn worker_count(max_workers: usize) -> usize {
    (num_cpus::get() * 2).min(max_workers).max(1)
}

/// Outcome of a bundle run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    /// Where the archive ended up; `None` when a partial archive was discarded
    pub path: Option<PathBuf>,
    /// Number of files in the archive
    pub files: usize,
    /// Services skipped because their API is not deployed
    pub skipped: Vec<ServiceKind>,
    /// Tolerated failures, one line each
    pub errors: Vec<String>,
    pub cancelled: bool,
}
