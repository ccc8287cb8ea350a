// Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    Container, Event, Node, NodeStatus, NodeSystemInfo, ObjectReference, Pod, PodCondition, PodSpec, PodStatus,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use kube::ResourceExt;
use opsdiag::client::{matches_prefix, ClusterAccess, LogOutcome, LogRequest, VersionInfo, WorkloadKind};
use opsdiag::error::{OpsError, Result};
use opsdiag::resources::{ResourceApi, ResourceKind};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// In-memory cluster used by the engine and collector tests
#[derive(Debug, Default, Clone)]
pub struct FakeCluster {
    pub version: Option<VersionInfo>,
    pub api_versions: Vec<String>,
    /// Custom objects keyed by `plural.group`
    pub custom: HashMap<String, Vec<DynamicObject>>,
    pub workloads: HashMap<WorkloadKind, Vec<DynamicObject>>,
    pub pods: Vec<Pod>,
    pub events: Vec<Event>,
    pub nodes: Vec<Node>,
    /// Log bodies keyed by `(pod, container, previous)`
    pub logs: HashMap<(String, String, bool), Vec<u8>>,
    /// Containers whose log reads are forbidden
    pub forbidden_logs: HashSet<String>,
    pub forbid_nodes: bool,
    pub forbid_pods: bool,
    pub proxy: Option<Vec<u8>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api(mut self, api: &ResourceApi) -> Self {
        self.api_versions.push(api.api_version());
        self
    }

    pub fn with_custom(mut self, api: &ResourceApi, kind: &str, object: DynamicObject) -> Self {
        let kind = api.kind(kind).expect("kind owned by api");
        self.custom
            .entry(format!("{}.{}", kind.plural, api.group))
            .or_default()
            .push(object);
        self
    }

    pub fn with_workload(mut self, kind: WorkloadKind, object: DynamicObject) -> Self {
        self.workloads.entry(kind).or_default().push(object);
        self
    }

    pub fn with_pod(mut self, pod: Pod) -> Self {
        self.pods.push(pod);
        self
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_log(self, pod: &str, container: &str, previous: bool, body: &str) -> Self {
        self.with_log_bytes(pod, container, previous, body.as_bytes())
    }

    pub fn with_log_bytes(mut self, pod: &str, container: &str, previous: bool, body: &[u8]) -> Self {
        self.logs
            .insert((pod.to_string(), container.to_string(), previous), body.to_vec());
        self
    }
}

fn in_namespace(object_ns: Option<String>, wanted: Option<&str>) -> bool {
    wanted.map_or(true, |ns| object_ns.as_deref() == Some(ns))
}

/// Equality selectors only, e.g. `app=x,tier=y`
fn has_labels(labels: &BTreeMap<String, String>, selector: Option<&str>) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    selector.split(',').all(|term| match term.split_once('=') {
        Some((key, value)) => labels.get(key.trim()).map(String::as_str) == Some(value.trim()),
        None => false,
    })
}

#[async_trait]
impl ClusterAccess for FakeCluster {
    async fn server_version(&self) -> Result<VersionInfo> {
        self.version
            .clone()
            .ok_or_else(|| OpsError::Transient("version endpoint unavailable".to_string()))
    }

    async fn api_versions(&self) -> Result<Vec<String>> {
        Ok(self.api_versions.clone())
    }

    async fn list_custom(
        &self,
        api: &ResourceApi,
        kind: &ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        if !self.api_versions.contains(&api.api_version()) {
            return Err(OpsError::KindNotFound(api.api_version()));
        }
        Ok(self
            .custom
            .get(&format!("{}.{}", kind.plural, api.group))
            .into_iter()
            .flatten()
            .filter(|o| in_namespace(o.namespace(), namespace))
            .cloned()
            .collect())
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        name_prefixes: &[&str],
    ) -> Result<Vec<Pod>> {
        if self.forbid_pods {
            return Err(OpsError::Forbidden("pods is forbidden".to_string()));
        }
        Ok(self
            .pods
            .iter()
            .filter(|p| in_namespace(p.namespace(), namespace))
            .filter(|p| has_labels(p.labels(), label_selector))
            .filter(|p| matches_prefix(&p.name_any(), name_prefixes))
            .cloned()
            .collect())
    }

    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        name_prefixes: &[&str],
    ) -> Result<Vec<DynamicObject>> {
        Ok(self
            .workloads
            .get(&kind)
            .into_iter()
            .flatten()
            .filter(|o| in_namespace(o.namespace(), namespace))
            .filter(|o| has_labels(o.labels(), label_selector))
            .filter(|o| matches_prefix(&o.name_any(), name_prefixes))
            .cloned()
            .collect())
    }

    async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<Event>> {
        Ok(self
            .events
            .iter()
            .filter(|e| in_namespace(e.namespace(), namespace))
            .cloned()
            .collect())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        if self.forbid_nodes {
            return Err(OpsError::Forbidden("nodes is forbidden".to_string()));
        }
        Ok(self.nodes.clone())
    }

    async fn read_log(&self, request: &LogRequest) -> Result<LogOutcome> {
        if self.forbidden_logs.contains(&request.container) {
            return Err(OpsError::Forbidden(format!("logs of {}", request.container)));
        }
        let key = (request.pod.clone(), request.container.clone(), request.previous);
        match self.logs.get(&key) {
            Some(body) => Ok(LogOutcome::Content(body.clone())),
            None if request.previous => Ok(LogOutcome::NoPrevious),
            None => Ok(LogOutcome::Content(Vec::new())),
        }
    }

    async fn proxy_get(&self, _namespace: &str, _pod: &str, _port: u16, _path: &str) -> Result<Vec<u8>> {
        self.proxy
            .clone()
            .ok_or_else(|| OpsError::Transient("probe unreachable".to_string()))
    }
}

/// Custom object with `data` holding spec/status
pub fn custom_object(api: &ResourceApi, kind: &str, namespace: &str, name: &str, data: Value) -> DynamicObject {
    let kind = api.kind(kind).expect("kind owned by api");
    DynamicObject::new(name, &api.api_resource(kind))
        .within(namespace)
        .data(data)
}

pub fn workload(kind: WorkloadKind, namespace: &str, name: &str) -> DynamicObject {
    DynamicObject::new(name, &kind.api_resource()).within(namespace)
}

/// A pod in `phase` with the given containers; conditions all `True` when running
pub fn create_mock_pod(name: &str, namespace: &str, phase: &str, containers: &[&str]) -> Pod {
    let conditions = (phase == "Running").then(|| {
        ["Initialized", "Ready", "ContainersReady", "PodScheduled"]
            .iter()
            .map(|t| PodCondition {
                type_: t.to_string(),
                status: "True".to_string(),
                ..Default::default()
            })
            .collect()
    });
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            managed_fields: Some(vec![Default::default()]),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: containers
                .iter()
                .map(|c| Container {
                    name: c.to_string(),
                    image: Some(format!("mcr.microsoft.com/{c}:1.0")),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            conditions,
            ..Default::default()
        }),
    }
}

/// Add an init container to a pod
pub fn with_init_container(mut pod: Pod, name: &str) -> Pod {
    if let Some(spec) = pod.spec.as_mut() {
        spec.init_containers = Some(vec![Container {
            name: name.to_string(),
            ..Default::default()
        }]);
    }
    pod
}

/// Attach a label to a pod
pub fn with_label(mut pod: Pod, key: &str, value: &str) -> Pod {
    pod.metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_string(), value.to_string());
    pod
}

/// Set one pod condition to `False`
pub fn with_failing_condition(mut pod: Pod, type_: &str, message: &str) -> Pod {
    if let Some(conditions) = pod.status.as_mut().and_then(|s| s.conditions.as_mut()) {
        for condition in conditions.iter_mut().filter(|c| c.type_ == type_) {
            condition.status = "False".to_string();
            condition.message = Some(message.to_string());
        }
    }
    pod
}

pub fn create_mock_node(name: &str, architecture: &str, cpu: &str, memory: &str, storage: Option<&str>) -> Node {
    let mut capacity = BTreeMap::new();
    capacity.insert("cpu".to_string(), Quantity(cpu.to_string()));
    capacity.insert("memory".to_string(), Quantity(memory.to_string()));
    if let Some(storage) = storage {
        capacity.insert("ephemeral-storage".to_string(), Quantity(storage.to_string()));
    }
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(NodeStatus {
            capacity: Some(capacity),
            node_info: Some(NodeSystemInfo {
                architecture: architecture.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn create_mock_event(name: &str, namespace: &str, reason: &str) -> Event {
    Event {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        involved_object: ObjectReference {
            kind: Some("Pod".to_string()),
            name: Some("aio-mq-frontend-0".to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        reason: Some(reason.to_string()),
        type_: Some("Warning".to_string()),
        ..Default::default()
    }
}

/// OTLP/JSON payload with two traces
pub const TRACE_ID: &str = "5b8efff798038103d269b633813fc60c";
pub const ROOT_SPAN_ID: &str = "eee19b7ec3c1b173";

pub fn trace_payload() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "resourceSpans": [{
            "resource": {"attributes": [{"key": "service.name", "value": {"stringValue": "aio-mq-frontend"}}]},
            "scopeSpans": [{
                "scope": {"name": "mq"},
                "spans": [
                    {"traceId": TRACE_ID, "spanId": ROOT_SPAN_ID, "name": "connect"},
                    {"traceId": TRACE_ID, "spanId": "eee19b7ec3c1b174", "parentSpanId": ROOT_SPAN_ID, "name": "publish"},
                    {"traceId": "0af7651916cd43dd8448eb211c80319c", "spanId": "b7ad6b7169203331", "name": "subscribe"}
                ]
            }]
        }]
    }))
    .expect("static payload")
}
