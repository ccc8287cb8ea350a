//! Support bundle collection against an in-memory cluster

use crate::common::*;
use chrono::{TimeZone, Utc};
use opsdiag::client::WorkloadKind;
use opsdiag::resources::registry::MQ_API;
use opsdiag::resources::ServiceKind;
use opsdiag::support::{create_bundle, BundleOptions, PartialPolicy};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

fn fixture_cluster() -> FakeCluster {
    let mut cluster = FakeCluster::new()
        .with_api(&MQ_API)
        .with_custom(
            &MQ_API,
            "broker",
            custom_object(&MQ_API, "broker", "aio", "b1", json!({"spec": {"mode": "distributed"}})),
        )
        .with_workload(
            WorkloadKind::Deployment,
            workload(WorkloadKind::Deployment, "aio", "aio-mq-operator"),
        )
        .with_workload(
            WorkloadKind::Deployment,
            workload(WorkloadKind::Deployment, "aio", "unrelated-app"),
        )
        .with_pod(create_mock_pod("aio-mq-frontend-0", "aio", "Running", &["frontend"]))
        .with_pod(with_init_container(
            create_mock_pod("aio-mq-backend-0", "aio", "Running", &["backend"]),
            "setup",
        ))
        .with_pod(create_mock_pod("aio-mq-diagnostics-probe-0", "aio", "Running", &["probe"]))
        .with_node(create_mock_node("edge-0", "amd64", "4", "16Gi", Some("64Gi")))
        .with_event(create_mock_event("frontend.17c", "aio", "BackOff"))
        .with_log("aio-mq-frontend-0", "frontend", false, "frontend started\n")
        .with_log("aio-mq-frontend-0", "frontend", true, "frontend crashed\n")
        .with_log("aio-mq-backend-0", "backend", false, "backend started\n");
    cluster.proxy = Some(trace_payload());
    cluster
}

fn bundle_options(dir: &Path) -> BundleOptions {
    let now = Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 5).unwrap();
    let mut options = BundleOptions::new(dir.to_path_buf(), now);
    options.services = vec![ServiceKind::Mq];
    options.include_mq_traces = true;
    options.workers = 4;
    options
}

fn entries(path: &Path) -> BTreeSet<String> {
    let archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    archive.file_names().map(String::from).collect()
}

fn read_entry(path: &Path, name: &str) -> String {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut text = String::new();
    archive.by_name(name).unwrap().read_to_string(&mut text).unwrap();
    text
}

#[tokio::test]
async fn test_bundle_with_traces() {
    let dir = tempfile::tempdir().unwrap();
    let options = bundle_options(dir.path());
    let summary = create_bundle(&fixture_cluster(), &options, &CancellationToken::new())
        .await
        .unwrap();

    let path = summary.path.clone().unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "support_bundle_20240517T093005_mq.zip"
    );
    assert!(!summary.cancelled);
    assert!(summary.errors.is_empty(), "{:?}", summary.errors);

    let names = entries(&path);
    assert_eq!(names.len(), summary.files);
    for expected in [
        "events.yaml",
        "nodes.yaml",
        "aio/mq/deployment.aio-mq-operator.yaml",
        "aio/mq/v1beta1.brokers.b1.yaml",
        "aio/mq/pod.aio-mq-frontend-0.yaml",
        "aio/mq/pod.aio-mq-backend-0.yaml",
        "aio/mq/pod.aio-mq-frontend-0.frontend.log",
        "aio/mq/pod.aio-mq-frontend-0.frontend.previous.log",
        "aio/mq/pod.aio-mq-backend-0.backend.log",
        "aio/mq/pod.aio-mq-backend-0.setup.init.log",
    ] {
        assert!(names.contains(expected), "missing {expected} in {names:?}");
    }
    assert!(!names.contains("aio/mq/deployment.unrelated-app.yaml"));
    assert!(!names.contains("aio/mq/pod.aio-mq-backend-0.backend.previous.log"));

    let traces: Vec<&String> = names
        .iter()
        .filter(|n| n.starts_with("aio/mq/traces/"))
        .collect();
    assert_eq!(traces.len(), 2);
    let root = format!("aio/mq/traces/{TRACE_ID}.{ROOT_SPAN_ID}.json");
    assert!(names.contains(&root));
    for line in read_entry(&path, &root).lines() {
        let parsed: Value = serde_json::from_str(line).unwrap();
        assert_eq!(parsed["spans"][0]["traceId"], json!(TRACE_ID));
    }
}

#[tokio::test]
async fn test_manifests_are_canonical() {
    let dir = tempfile::tempdir().unwrap();
    let options = bundle_options(dir.path());
    let summary = create_bundle(&fixture_cluster(), &options, &CancellationToken::new())
        .await
        .unwrap();
    let path = summary.path.unwrap();

    let pod = read_entry(&path, "aio/mq/pod.aio-mq-frontend-0.yaml");
    assert!(!pod.contains("managedFields"));
    let parsed: Value = serde_yaml::from_str(&pod).unwrap();
    assert_eq!(parsed["metadata"]["name"], json!("aio-mq-frontend-0"));

    let nodes: Value = serde_yaml::from_str(&read_entry(&path, "nodes.yaml")).unwrap();
    assert_eq!(nodes["kind"], json!("List"));
    assert_eq!(nodes["items"][0]["metadata"]["name"], json!("edge-0"));

    assert_eq!(
        read_entry(&path, "aio/mq/pod.aio-mq-frontend-0.frontend.previous.log"),
        "frontend crashed\n"
    );
}

#[tokio::test]
async fn test_undeployed_services_get_skip_markers() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = bundle_options(dir.path());
    options.services = Vec::new();
    options.include_mq_traces = false;

    let summary = create_bundle(&fixture_cluster(), &options, &CancellationToken::new())
        .await
        .unwrap();
    let path = summary.path.clone().unwrap();
    assert!(path.to_str().unwrap().ends_with("_all.zip"));

    assert_eq!(summary.skipped.len(), ServiceKind::ALL.len() - 1);
    assert!(!summary.skipped.contains(&ServiceKind::Mq));

    let names = entries(&path);
    assert!(names.contains("skipped/akri.txt"));
    assert!(names.contains("skipped/dataflow.txt"));
    assert!(!names.contains("skipped/mq.txt"));
    assert!(!names.iter().any(|n| n.contains("/traces/")));
}

#[tokio::test]
async fn test_failures_become_sidecars() {
    let dir = tempfile::tempdir().unwrap();
    let options = bundle_options(dir.path());
    let mut cluster = fixture_cluster();
    cluster.forbid_nodes = true;
    cluster.forbidden_logs.insert("backend".to_string());
    cluster.proxy = None;

    let summary = create_bundle(&cluster, &options, &CancellationToken::new())
        .await
        .unwrap();
    let path = summary.path.clone().unwrap();
    let names = entries(&path);

    assert!(names.contains("nodes.yaml.error"));
    assert!(!names.contains("nodes.yaml"));
    assert!(names.contains("aio/mq/pod.aio-mq-backend-0.backend.log.error"));
    assert!(names.contains("aio/mq/traces.error"));
    assert!(names.contains("aio/mq/pod.aio-mq-frontend-0.frontend.log"));
    assert!(summary.errors.len() >= 3);
    assert!(read_entry(&path, "nodes.yaml.error").contains("Forbidden"));
}

#[tokio::test]
async fn test_cancelled_bundle_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let options = bundle_options(dir.path());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = create_bundle(&fixture_cluster(), &options, &cancel).await.unwrap();
    assert!(summary.cancelled);
    assert!(summary.path.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_cancelled_bundle_can_be_kept() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = bundle_options(dir.path());
    options.partial_policy = PartialPolicy::KeepPartial;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = create_bundle(&fixture_cluster(), &options, &cancel).await.unwrap();
    let kept = summary.path.unwrap();
    assert!(kept.to_str().unwrap().ends_with(".zip.partial"));
    assert!(kept.exists());
}

#[tokio::test]
async fn test_missing_bundle_dir_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("bundles").join("today");
    let options = bundle_options(&nested);

    let summary = create_bundle(&fixture_cluster(), &options, &CancellationToken::new())
        .await
        .unwrap();
    assert!(summary.path.unwrap().starts_with(&nested));
}

#[tokio::test]
async fn test_forbidden_pod_listing_keeps_the_rest_of_the_service() {
    let dir = tempfile::tempdir().unwrap();
    let options = bundle_options(dir.path());
    let mut cluster = fixture_cluster();
    cluster.forbid_pods = true;

    let summary = create_bundle(&cluster, &options, &CancellationToken::new())
        .await
        .unwrap();
    assert!(summary.skipped.is_empty());
    let names = entries(&summary.path.clone().unwrap());

    assert!(names.contains("mq/pods.error"), "{names:?}");
    assert!(!names.contains("skipped/mq.txt"));
    assert!(names.contains("aio/mq/v1beta1.brokers.b1.yaml"));
    assert!(names.contains("aio/mq/deployment.aio-mq-operator.yaml"));
    assert!(names.contains("mq/traces.error"));
    assert!(!names.iter().any(|n| n.starts_with("aio/mq/pod.")));
    assert!(summary.errors.iter().any(|e| e.starts_with("mq/pods: ")));
}

#[tokio::test]
async fn test_logs_are_archived_as_raw_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let options = bundle_options(dir.path());
    let raw: &[u8] = &[b'f', b'r', 0xff, 0xfe, 0x80, b'\n'];
    let cluster = fixture_cluster().with_log_bytes("aio-mq-frontend-0", "frontend", false, raw);

    let summary = create_bundle(&cluster, &options, &CancellationToken::new())
        .await
        .unwrap();
    let path = summary.path.unwrap();

    let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
    let mut body = Vec::new();
    archive
        .by_name("aio/mq/pod.aio-mq-frontend-0.frontend.log")
        .unwrap()
        .read_to_end(&mut body)
        .unwrap();
    assert_eq!(body, raw);
    assert!(!entries(&path).contains("aio/mq/pod.aio-mq-frontend-0.frontend.log.error"));
}

#[tokio::test]
async fn test_labelled_pods_are_collected_without_a_name_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = bundle_options(dir.path());
    options.include_mq_traces = false;
    let labelled = with_label(
        create_mock_pod("edge-broker-0", "aio", "Running", &["broker"]),
        "app.kubernetes.io/name",
        "aio-mq",
    );
    let cluster = fixture_cluster()
        .with_pod(labelled)
        .with_pod(create_mock_pod("edge-other-0", "aio", "Running", &["other"]));

    let summary = create_bundle(&cluster, &options, &CancellationToken::new())
        .await
        .unwrap();
    let names = entries(&summary.path.unwrap());

    assert!(names.contains("aio/mq/pod.edge-broker-0.yaml"));
    assert!(names.contains("aio/mq/pod.edge-broker-0.broker.log"));
    assert!(!names.contains("aio/mq/pod.edge-other-0.yaml"));
    assert!(names.contains("aio/mq/pod.aio-mq-frontend-0.yaml"));
}
