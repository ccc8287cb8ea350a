//! `ClusterAccess` over a live `kube::Client`

use super::{matches_prefix, ClusterAccess, LogOutcome, LogRequest, VersionInfo, WorkloadKind};
use crate::error::{OpsError, Result};
use crate::resources::{ResourceApi, ResourceKind};
use async_trait::async_trait;
use futures::{AsyncRead, AsyncReadExt};
use k8s_openapi::api::core::v1::{Event, Node, Pod};
use kube::api::{ApiResource, DynamicObject, ListParams, LogParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

/// Cluster access backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeAccess {
    client: Client,
}

impl KubeAccess {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn dynamic_api(&self, ar: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, ar),
            None => Api::all_with(self.client.clone(), ar),
        }
    }
}

fn list_params(label_selector: Option<&str>) -> ListParams {
    match label_selector {
        Some(ls) => ListParams::default().labels(ls),
        None => ListParams::default(),
    }
}

/// Listed items carry no type meta
fn with_types(mut object: DynamicObject, ar: &ApiResource) -> DynamicObject {
    if object.types.is_none() {
        object.types = Some(kube::core::TypeMeta {
            api_version: ar.api_version.clone(),
            kind: ar.kind.clone(),
        });
    }
    object
}

/// Read a log body to EOF as raw bytes, at most `cap` of them
///
/// Container output need not be UTF-8.
async fn read_capped<R: AsyncRead>(reader: R, cap: Option<i64>) -> std::io::Result<Vec<u8>> {
    let limit = cap.and_then(|c| u64::try_from(c).ok()).unwrap_or(u64::MAX);
    let mut body = Vec::new();
    Box::pin(reader).take(limit).read_to_end(&mut body).await?;
    Ok(body)
}

fn is_missing_previous(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(resp) => {
            resp.code == 400
                && (resp.message.contains("previous terminated container")
                    || resp.message.contains("not found"))
        }
        _ => false,
    }
}

#[async_trait]
impl ClusterAccess for KubeAccess {
    async fn server_version(&self) -> Result<VersionInfo> {
        let info = self.client.apiserver_version().await?;
        Ok(VersionInfo {
            major: info.major,
            minor: info.minor,
            git_version: info.git_version,
        })
    }

    async fn api_versions(&self) -> Result<Vec<String>> {
        let groups = self.client.list_api_groups().await?;
        Ok(groups
            .groups
            .into_iter()
            .flat_map(|g| g.versions.into_iter().map(|v| v.group_version))
            .collect())
    }

    async fn list_custom(
        &self,
        api: &ResourceApi,
        kind: &ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        let ar = api.api_resource(kind);
        let list = self
            .dynamic_api(&ar, namespace)
            .list(&ListParams::default())
            .await?;
        debug!("Listed {} {} objects", list.items.len(), kind.plural);
        Ok(list.items.into_iter().map(|o| with_types(o, &ar)).collect())
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        name_prefixes: &[&str],
    ) -> Result<Vec<Pod>> {
        let api: Api<Pod> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let list = api.list(&list_params(label_selector)).await?;
        Ok(list
            .items
            .into_iter()
            .filter(|p| matches_prefix(&p.name_any(), name_prefixes))
            .collect())
    }

    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        name_prefixes: &[&str],
    ) -> Result<Vec<DynamicObject>> {
        let ar = kind.api_resource();
        let list = self
            .dynamic_api(&ar, namespace)
            .list(&list_params(label_selector))
            .await?;
        Ok(list
            .items
            .into_iter()
            .filter(|o| matches_prefix(&o.name_any(), name_prefixes))
            .map(|o| with_types(o, &ar))
            .collect())
    }

    async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<Event>> {
        let api: Api<Event> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn read_log(&self, request: &LogRequest) -> Result<LogOutcome> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &request.namespace);
        let lp = LogParams {
            container: Some(request.container.clone()),
            previous: request.previous,
            since_seconds: request.since.map(|d| d.as_secs() as i64),
            limit_bytes: request.byte_cap,
            ..LogParams::default()
        };

        let reader = match api.log_stream(&request.pod, &lp).await {
            Ok(reader) => reader,
            Err(e) if request.previous && is_missing_previous(&e) => {
                debug!(
                    "No previous log for {}/{}/{}",
                    request.namespace, request.pod, request.container
                );
                return Ok(LogOutcome::NoPrevious);
            }
            Err(e) => return Err(e.into()),
        };

        let body = read_capped(reader, request.byte_cap).await?;
        Ok(LogOutcome::Content(body))
    }

    async fn proxy_get(&self, namespace: &str, pod: &str, port: u16, path: &str) -> Result<Vec<u8>> {
        let uri = format!("/api/v1/namespaces/{namespace}/pods/{pod}:{port}/proxy{path}");
        let request = http::Request::builder()
            .method("GET")
            .uri(&uri)
            .body(Vec::new())
            .map_err(|e| OpsError::InvalidResponse(format!("Failed to build request: {e}")))?;

        let text = self.client.request_text(request).await?;
        Ok(text.into_bytes())
    }
}
