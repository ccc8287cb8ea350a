//! Kubernetes access layer
//!
//! [`ClusterAccess`] is the single seam between the check engine / bundle
//! collector and the cluster. [`KubeAccess`] implements it over a
//! `kube::Client`; [`Retrying`] wraps any implementation with timeouts and a
//! single jittered retry for transient failures.

mod kube_access;
mod retry;

pub use kube_access::KubeAccess;
pub use retry::{RetryPolicy, Retrying};

use crate::error::{OpsError, Result};
use crate::resources::{ResourceApi, ResourceKind};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Event, Node, PersistentVolumeClaim, Pod, Service};
use kube::api::{ApiResource, DynamicObject};
use kube::config::KubeConfigOptions;
use kube::{Client, Config, ResourceExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Grouping key used for cluster-scoped objects
pub const CLUSTER_SCOPE: &str = "_all_";

/// Create a Kubernetes client for the specified context
pub async fn create_client(context: Option<&str>) -> Result<Client> {
    let options = KubeConfigOptions {
        context: context.map(String::from),
        ..Default::default()
    };

    let config = Config::from_kubeconfig(&options)
        .await
        .map_err(|e| OpsError::Config(format!("Failed to load kubeconfig: {e}")))?;

    Client::try_from(config).map_err(OpsError::from)
}

/// Server version as reported by `/version`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub major: String,
    pub minor: String,
    pub git_version: String,
}

/// Core workload kinds collected next to custom resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkloadKind {
    Deployment,
    DaemonSet,
    StatefulSet,
    ReplicaSet,
    Service,
    Pvc,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 6] = [
        WorkloadKind::Deployment,
        WorkloadKind::DaemonSet,
        WorkloadKind::StatefulSet,
        WorkloadKind::ReplicaSet,
        WorkloadKind::Service,
        WorkloadKind::Pvc,
    ];

    /// Lowercase prefix used in bundle file names
    pub fn file_prefix(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "deployment",
            WorkloadKind::DaemonSet => "daemonset",
            WorkloadKind::StatefulSet => "statefulset",
            WorkloadKind::ReplicaSet => "replicaset",
            WorkloadKind::Service => "service",
            WorkloadKind::Pvc => "pvc",
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        match self {
            WorkloadKind::Deployment => ApiResource::erase::<Deployment>(&()),
            WorkloadKind::DaemonSet => ApiResource::erase::<DaemonSet>(&()),
            WorkloadKind::StatefulSet => ApiResource::erase::<StatefulSet>(&()),
            WorkloadKind::ReplicaSet => ApiResource::erase::<ReplicaSet>(&()),
            WorkloadKind::Service => ApiResource::erase::<Service>(&()),
            WorkloadKind::Pvc => ApiResource::erase::<PersistentVolumeClaim>(&()),
        }
    }
}

/// A single container log read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRequest {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub previous: bool,
    pub since: Option<Duration>,
    pub byte_cap: Option<i64>,
}

/// Result of a log read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    Content(Vec<u8>),
    /// The container has no previous instance; not an error
    NoPrevious,
}

/// Read-only view of a cluster
#[async_trait]
pub trait ClusterAccess: Send + Sync {
    async fn server_version(&self) -> Result<VersionInfo>;

    /// `group/version` strings advertised by API discovery
    async fn api_versions(&self) -> Result<Vec<String>>;

    async fn list_custom(
        &self,
        api: &ResourceApi,
        kind: &ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>>;

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        name_prefixes: &[&str],
    ) -> Result<Vec<Pod>>;

    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        name_prefixes: &[&str],
    ) -> Result<Vec<DynamicObject>>;

    async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<Event>>;

    async fn list_nodes(&self) -> Result<Vec<Node>>;

    async fn read_log(&self, request: &LogRequest) -> Result<LogOutcome>;

    /// GET through the pod proxy subresource
    async fn proxy_get(&self, namespace: &str, pod: &str, port: u16, path: &str) -> Result<Vec<u8>>;
}

/// Whether `name` starts with any of `prefixes`; an empty list matches everything
pub fn matches_prefix(name: &str, prefixes: &[&str]) -> bool {
    prefixes.is_empty() || prefixes.iter().any(|p| name.starts_with(p))
}

/// Pods named with one of `prefixes` or carrying `label`
pub async fn list_service_pods(
    cluster: &dyn ClusterAccess,
    namespace: Option<&str>,
    prefixes: &[&str],
    label: Option<&str>,
) -> Result<Vec<Pod>> {
    let mut pods = Vec::new();
    if !prefixes.is_empty() {
        pods = cluster.list_pods(namespace, None, prefixes).await?;
    }
    if let Some(label) = label {
        let labelled = cluster.list_pods(namespace, Some(label), &[]).await?;
        pods = merge_unique(pods, labelled);
    }
    Ok(pods)
}

/// Workloads named with one of `prefixes` or carrying `label`
pub async fn list_service_workloads(
    cluster: &dyn ClusterAccess,
    kind: WorkloadKind,
    namespace: Option<&str>,
    prefixes: &[&str],
    label: Option<&str>,
) -> Result<Vec<DynamicObject>> {
    let mut objects = Vec::new();
    if !prefixes.is_empty() {
        objects = cluster.list_workloads(kind, namespace, None, prefixes).await?;
    }
    if let Some(label) = label {
        let labelled = cluster.list_workloads(kind, namespace, Some(label), &[]).await?;
        objects = merge_unique(objects, labelled);
    }
    Ok(objects)
}

fn merge_unique<K: ResourceExt>(mut items: Vec<K>, more: Vec<K>) -> Vec<K> {
    for item in more {
        let seen = items
            .iter()
            .any(|i| i.name_any() == item.name_any() && i.namespace() == item.namespace());
        if !seen {
            items.push(item);
        }
    }
    items
}

/// Group objects by namespace; namespaces and names in lexical order
pub fn group_by_namespace<K>(items: Vec<K>) -> BTreeMap<String, Vec<K>>
where
    K: ResourceExt,
{
    let mut groups: BTreeMap<String, Vec<K>> = BTreeMap::new();
    for item in items {
        let ns = item.namespace().unwrap_or_else(|| CLUSTER_SCOPE.to_string());
        groups.entry(ns).or_default().push(item);
    }
    for items in groups.values_mut() {
        items.sort_by_key(|item| item.name_any());
    }
    groups
}
