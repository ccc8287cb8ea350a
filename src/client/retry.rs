//! Timeout and retry discipline around a [`ClusterAccess`]

use super::{ClusterAccess, LogOutcome, LogRequest, VersionInfo, WorkloadKind};
use crate::config::AppConfig;
use crate::error::{OpsError, Result};
use crate::resources::{ResourceApi, ResourceKind};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Event, Node, Pod};
use kube::api::DynamicObject;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Timeouts and retry budget for cluster calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Per-attempt timeout
    pub soft_timeout: Duration,
    /// Deadline over all attempts
    pub hard_timeout: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            soft_timeout: Duration::from_secs(15),
            hard_timeout: Duration::from_secs(60),
            max_retries: 1,
            base_backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            soft_timeout: config.soft_timeout(),
            hard_timeout: config.hard_timeout(),
            ..Self::default()
        }
    }

    /// Backoff before retry `attempt` (1-based), with up to 100% jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff.saturating_mul(attempt);
        let jitter_ms = rand::rng().random_range(0..=base.as_millis() as u64);
        base + Duration::from_millis(jitter_ms)
    }
}

/// Wraps a [`ClusterAccess`] with soft/hard timeouts and one retry on transient failures
pub struct Retrying<A> {
    inner: A,
    policy: RetryPolicy,
}

impl<A: ClusterAccess> Retrying<A> {
    pub fn new(inner: A, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    async fn call<T, F, Fut>(&self, what: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let policy = self.policy;
        let attempts = async {
            let mut attempt = 0;
            loop {
                attempt += 1;
                let result = match tokio::time::timeout(policy.soft_timeout, f()).await {
                    Ok(r) => r,
                    Err(_) => Err(OpsError::Transient(format!(
                        "{what} timed out after {}s",
                        policy.soft_timeout.as_secs()
                    ))),
                };
                match result {
                    Err(e) if e.is_transient() && attempt <= policy.max_retries => {
                        let delay = policy.backoff(attempt);
                        warn!("{what} failed ({e}); retrying in {}ms", delay.as_millis());
                        tokio::time::sleep(delay).await;
                    }
                    other => return other,
                }
            }
        };

        match tokio::time::timeout(policy.hard_timeout, attempts).await {
            Ok(r) => r,
            Err(_) => Err(OpsError::Transient(format!(
                "{what} exceeded deadline of {}s",
                policy.hard_timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl<A: ClusterAccess> ClusterAccess for Retrying<A> {
    async fn server_version(&self) -> Result<VersionInfo> {
        self.call("server version", || self.inner.server_version()).await
    }

    async fn api_versions(&self) -> Result<Vec<String>> {
        self.call("api discovery", || self.inner.api_versions()).await
    }

    async fn list_custom(
        &self,
        api: &ResourceApi,
        kind: &ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        self.call(kind.plural, || self.inner.list_custom(api, kind, namespace))
            .await
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        name_prefixes: &[&str],
    ) -> Result<Vec<Pod>> {
        self.call("pods", || {
            self.inner.list_pods(namespace, label_selector, name_prefixes)
        })
        .await
    }

    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        name_prefixes: &[&str],
    ) -> Result<Vec<DynamicObject>> {
        self.call(kind.file_prefix(), || {
            self.inner
                .list_workloads(kind, namespace, label_selector, name_prefixes)
        })
        .await
    }

    async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<Event>> {
        self.call("events", || self.inner.list_events(namespace)).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.call("nodes", || self.inner.list_nodes()).await
    }

    async fn read_log(&self, request: &LogRequest) -> Result<LogOutcome> {
        self.call("container log", || self.inner.read_log(request)).await
    }

    async fn proxy_get(&self, namespace: &str, pod: &str, port: u16, path: &str) -> Result<Vec<u8>> {
        self.call("pod proxy", || self.inner.proxy_get(namespace, pod, port, path))
            .await
    }
}
