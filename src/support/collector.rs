//! Enumerate and fetch stages of the bundle pipeline

use super::archive::ArchiveWriter;
use super::manifest::{canonical_yaml, list_yaml};
use super::traces::{group_traces, PROBE_PATH, PROBE_PORT, PROBE_POD_PREFIX};
use super::{BundleEntry, BundleOptions, BundleSummary, PartialPolicy};
use crate::client::{
    list_service_pods, list_service_workloads, ClusterAccess, LogOutcome, LogRequest, WorkloadKind, CLUSTER_SCOPE,
};
use crate::error::{OpsError, Result};
use crate::resources::{self, ResourceKind, ServiceKind};
use futures::stream::{self, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A unit of fetch work
#[derive(Debug, Clone)]
enum WorkItem {
    SkipMarker { service: ServiceKind, reason: String },
    /// A listing failed while enumerating; only the sidecar remains
    Failed { path: String, cause: String },
    Events,
    Nodes,
    Workloads { service: ServiceKind, kind: WorkloadKind },
    Pod { service: ServiceKind, pod: Box<Pod> },
    Custom { service: ServiceKind, kind: &'static ResourceKind },
    Traces,
}

/// Entries and tolerated failures produced by one work item
#[derive(Debug, Default)]
struct Fetched {
    entries: Vec<BundleEntry>,
    errors: Vec<String>,
}

impl Fetched {
    fn push(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.entries.push(BundleEntry::new(path, content.into()));
    }

    /// Record a failure next to the file it was meant to produce
    fn sidecar(&mut self, path: &str, cause: impl std::fmt::Display) {
        let message = format!("{path}: {cause}");
        warn!("{}", message);
        self.push(format!("{path}.error"), format!("{cause}\n"));
        self.errors.push(message);
    }
}

/// Collect a support bundle into `options.bundle_dir`
///
/// Fails only when the archive itself cannot be written; cluster failures
/// become `.error` sidecars and are listed in the summary.
pub async fn create_bundle(
    cluster: &dyn ClusterAccess,
    options: &BundleOptions,
    cancel: &CancellationToken,
) -> Result<BundleSummary> {
    std::fs::create_dir_all(&options.bundle_dir)?;
    let path = options.bundle_dir.join(options.archive_name());
    info!("Creating support bundle {}", path.display());

    let writer = ArchiveWriter::create(&path, options.workers * 4)?;
    let tx = writer.sender();

    let (items, skipped, mut errors) = enumerate(cluster, options).await;
    info!("Collecting {} work items with {} workers", items.len(), options.workers);

    let mut results = stream::iter(items)
        .map(|item| fetch(cluster, options, cancel, item))
        .buffer_unordered(options.workers.max(1));

    let mut writer_gone = false;
    while let Some(fetched) = results.next().await {
        errors.extend(fetched.errors);
        for entry in fetched.entries {
            if tx.send(entry.with_mtime(options.now)).await.is_err() {
                writer_gone = true;
                break;
            }
        }
        if writer_gone || cancel.is_cancelled() {
            break;
        }
    }
    drop(results);
    drop(tx);

    let cancelled = cancel.is_cancelled();
    match writer.finish().await {
        Ok(written) if !cancelled => {
            info!("Support bundle written with {} files", written.len());
            Ok(BundleSummary {
                path: Some(path),
                files: written.len(),
                skipped,
                errors,
                cancelled,
            })
        }
        Ok(written) => {
            warn!("Bundle collection cancelled after {} files", written.len());
            let kept = settle_partial(&path, options.partial_policy)?;
            Ok(BundleSummary {
                path: kept,
                files: written.len(),
                skipped,
                errors,
                cancelled,
            })
        }
        Err(e) => {
            settle_partial(&path, options.partial_policy)?;
            Err(e)
        }
    }
}

/// Apply the partial policy to an unfinished archive
fn settle_partial(path: &Path, policy: PartialPolicy) -> Result<Option<PathBuf>> {
    match policy {
        PartialPolicy::Discard => {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            Ok(None)
        }
        PartialPolicy::KeepPartial => {
            let mut partial = path.as_os_str().to_owned();
            partial.push(".partial");
            let partial = PathBuf::from(partial);
            std::fs::rename(path, &partial)?;
            Ok(Some(partial))
        }
    }
}

/// Build the work list; services whose API is absent get a skip marker
async fn enumerate(
    cluster: &dyn ClusterAccess,
    options: &BundleOptions,
) -> (Vec<WorkItem>, Vec<ServiceKind>, Vec<String>) {
    let mut items = vec![WorkItem::Events, WorkItem::Nodes];
    let mut skipped = Vec::new();
    let mut errors = Vec::new();

    let services = options.selected_services();
    let planned = futures::future::join_all(
        services
            .iter()
            .map(|service| enumerate_service(cluster, options, *service)),
    )
    .await;

    for (service, plan) in services.into_iter().zip(planned) {
        match plan {
            Ok(Some(service_items)) => items.extend(service_items),
            Ok(None) => {
                skipped.push(service);
                items.push(WorkItem::SkipMarker {
                    service,
                    reason: format!(
                        "{} API not detected on cluster; nothing collected\n",
                        service.def().api.api_version()
                    ),
                });
            }
            Err(e) => {
                errors.push(format!("{service}: {e}"));
                skipped.push(service);
                items.push(WorkItem::SkipMarker {
                    service,
                    reason: format!("API discovery failed: {e}\n"),
                });
            }
        }
    }
    (items, skipped, errors)
}

async fn enumerate_service(
    cluster: &dyn ClusterAccess,
    options: &BundleOptions,
    service: ServiceKind,
) -> Result<Option<Vec<WorkItem>>> {
    let def = service.def();
    if !resources::is_deployed(cluster, &def.api).await? {
        debug!("{} not deployed; skipping", service);
        return Ok(None);
    }

    let mut items = Vec::new();
    if !def.pod_prefixes.is_empty() || def.api.label.is_some() {
        items.extend(
            WorkloadKind::ALL
                .into_iter()
                .map(|kind| WorkItem::Workloads { service, kind }),
        );
        match list_service_pods(cluster, None, def.pod_prefixes, def.api.label).await {
            Ok(pods) => items.extend(pods.into_iter().map(|pod| WorkItem::Pod {
                service,
                pod: Box::new(pod),
            })),
            Err(e) => items.push(WorkItem::Failed {
                path: format!("{}/pods", service.moniker()),
                cause: e.to_string(),
            }),
        }
    }
    items.extend(
        def.api
            .kinds
            .iter()
            .map(|kind| WorkItem::Custom { service, kind }),
    );
    if service == ServiceKind::Mq && options.include_mq_traces {
        items.push(WorkItem::Traces);
    }
    Ok(Some(items))
}

async fn fetch(
    cluster: &dyn ClusterAccess,
    options: &BundleOptions,
    cancel: &CancellationToken,
    item: WorkItem,
) -> Fetched {
    let mut out = Fetched::default();
    if cancel.is_cancelled() {
        return out;
    }

    match item {
        WorkItem::SkipMarker { service, reason } => {
            out.push(format!("skipped/{}.txt", service.moniker()), reason);
        }
        WorkItem::Failed { path, cause } => out.sidecar(&path, cause),
        WorkItem::Events => match cluster.list_events(None).await {
            Ok(events) => push_yaml(&mut out, "events.yaml", list_yaml(&events)),
            Err(e) => out.sidecar("events.yaml", e),
        },
        WorkItem::Nodes => match cluster.list_nodes().await {
            Ok(nodes) => push_yaml(&mut out, "nodes.yaml", list_yaml(&nodes)),
            Err(e) => out.sidecar("nodes.yaml", e),
        },
        WorkItem::Workloads { service, kind } => {
            let def = service.def();
            match list_service_workloads(cluster, kind, None, def.pod_prefixes, def.api.label).await {
                Ok(objects) => {
                    for object in &objects {
                        let path = format!(
                            "{}/{}/{}.{}.yaml",
                            namespace_dir(object.namespace()),
                            service.moniker(),
                            kind.file_prefix(),
                            object.name_any()
                        );
                        push_yaml(&mut out, &path, canonical_yaml(object));
                    }
                }
                Err(e) => out.sidecar(&format!("{}/{}", service.moniker(), kind.file_prefix()), e),
            }
        }
        WorkItem::Pod { service, pod } => fetch_pod(cluster, options, cancel, service, &pod, &mut out).await,
        WorkItem::Custom { service, kind } => {
            let api = &service.def().api;
            match resources::get_resources(cluster, api, kind, None).await {
                Ok(objects) => {
                    for object in &objects {
                        let path = format!(
                            "{}/{}/{}.{}.{}.yaml",
                            namespace_dir(object.namespace()),
                            service.moniker(),
                            api.version,
                            kind.plural,
                            object.name_any()
                        );
                        push_yaml(&mut out, &path, canonical_yaml(object));
                    }
                }
                Err(e) => out.sidecar(
                    &format!("{}/{}.{}", service.moniker(), api.version, kind.plural),
                    e,
                ),
            }
        }
        WorkItem::Traces => fetch_traces(cluster, &mut out).await,
    }
    out
}

fn namespace_dir(namespace: Option<String>) -> String {
    namespace.unwrap_or_else(|| CLUSTER_SCOPE.to_string())
}

fn push_yaml(out: &mut Fetched, path: &str, yaml: Result<String>) {
    match yaml {
        Ok(text) => out.push(path, text),
        Err(e) => out.sidecar(path, e),
    }
}

async fn fetch_pod(
    cluster: &dyn ClusterAccess,
    options: &BundleOptions,
    cancel: &CancellationToken,
    service: ServiceKind,
    pod: &Pod,
    out: &mut Fetched,
) {
    let namespace = namespace_dir(pod.namespace());
    let name = pod.name_any();
    let base = format!("{}/{}/pod.{}", namespace, service.moniker(), name);
    push_yaml(out, &format!("{base}.yaml"), canonical_yaml(pod));

    let Some(spec) = pod.spec.as_ref() else {
        return;
    };

    let init = spec.init_containers.iter().flatten().map(|c| (c.name.as_str(), true));
    let regular = spec.containers.iter().map(|c| (c.name.as_str(), false));

    for (container, is_init) in init.chain(regular) {
        if cancel.is_cancelled() {
            return;
        }
        let request = LogRequest {
            namespace: namespace.clone(),
            pod: name.clone(),
            container: container.to_string(),
            previous: false,
            since: options.log_age,
            byte_cap: options.log_byte_cap,
        };

        let current = if is_init {
            format!("{base}.{container}.init.log")
        } else {
            format!("{base}.{container}.log")
        };
        match read_log(cluster, options, &request).await {
            Ok(Some(bytes)) => out.push(current, bytes),
            Ok(None) => {}
            Err(e) => out.sidecar(&current, e),
        }

        if is_init {
            continue;
        }
        let previous = LogRequest {
            previous: true,
            ..request
        };
        let path = format!("{base}.{container}.previous.log");
        match read_log(cluster, options, &previous).await {
            Ok(Some(bytes)) => out.push(path, bytes),
            Ok(None) => debug!("No previous log for {}/{}/{}", namespace, name, container),
            Err(e) => out.sidecar(&path, e),
        }
    }
}

/// One log read under the per-container wall-clock cap
async fn read_log(
    cluster: &dyn ClusterAccess,
    options: &BundleOptions,
    request: &LogRequest,
) -> std::result::Result<Option<Vec<u8>>, OpsError> {
    match tokio::time::timeout(options.log_timeout, cluster.read_log(request)).await {
        Ok(Ok(LogOutcome::Content(bytes))) => Ok(Some(bytes)),
        Ok(Ok(LogOutcome::NoPrevious)) => Ok(None),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(OpsError::Timeout(format!(
            "log of {}/{} after {}s",
            request.pod,
            request.container,
            options.log_timeout.as_secs()
        ))),
    }
}

async fn fetch_traces(cluster: &dyn ClusterAccess, out: &mut Fetched) {
    let probes = match cluster.list_pods(None, None, &[PROBE_POD_PREFIX]).await {
        Ok(pods) => pods,
        Err(e) => {
            out.sidecar("mq/traces", e);
            return;
        }
    };
    let Some(probe) = probes.first() else {
        out.sidecar("mq/traces", format!("no {PROBE_POD_PREFIX} pod found"));
        return;
    };

    let namespace = namespace_dir(probe.namespace());
    let dir = format!("{namespace}/mq/traces");
    let payload = match cluster
        .proxy_get(&namespace, &probe.name_any(), PROBE_PORT, PROBE_PATH)
        .await
    {
        Ok(payload) => payload,
        Err(e) => {
            out.sidecar(&dir, e);
            return;
        }
    };

    match group_traces(&payload) {
        Ok(groups) => {
            debug!("Collected {} traces from {}", groups.len(), probe.name_any());
            for group in groups {
                match group.to_ndjson() {
                    Ok(lines) => out.push(format!("{dir}/{}", group.file_name()), lines),
                    Err(e) => out.sidecar(&format!("{dir}/{}", group.file_name()), e),
                }
            }
        }
        Err(e) => out.sidecar(&dir, e),
    }
}
