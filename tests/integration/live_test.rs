//! Read-only runs against the current kubeconfig context

use opsdiag::checks::{run_checks, CheckOptions, CheckStatus};
use opsdiag::client::{create_client, ClusterAccess, KubeAccess, RetryPolicy, Retrying};
use opsdiag::support::{create_bundle, BundleOptions};
use tokio_util::sync::CancellationToken;

async fn cluster() -> Retrying<KubeAccess> {
    let client = create_client(None).await.expect("kubeconfig");
    Retrying::new(KubeAccess::new(client), RetryPolicy::default())
}

#[tokio::test]
#[ignore]
async fn test_server_version() {
    let version = cluster().await.server_version().await.unwrap();
    assert_eq!(version.major, "1");
}

#[tokio::test]
#[ignore]
async fn test_discovery_lists_core() {
    let versions = cluster().await.api_versions().await.unwrap();
    assert!(versions.iter().any(|v| v == "apps/v1"));
}

#[tokio::test]
#[ignore]
async fn test_pre_deployment_run() {
    let options = CheckOptions {
        pre: true,
        ..CheckOptions::default()
    };
    let result = run_checks(&cluster().await, &options, &CancellationToken::new())
        .await
        .unwrap();
    let pre = result.pre_deployment.unwrap();
    assert_eq!(pre.len(), 2);
    assert!(pre.iter().all(|r| r.status != CheckStatus::Skipped));
}

#[tokio::test]
#[ignore]
async fn test_bundle_run() {
    let dir = tempfile::tempdir().unwrap();
    let options = BundleOptions::new(dir.path().to_path_buf(), chrono::Utc::now());
    let summary = create_bundle(&cluster().await, &options, &CancellationToken::new())
        .await
        .unwrap();
    assert!(summary.path.unwrap().exists());
    assert!(summary.files >= 2);
}
