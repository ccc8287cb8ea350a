//! Service catalog probes against an in-memory cluster

use crate::common::*;
use opsdiag::client::{RetryPolicy, Retrying};
use opsdiag::resources::registry::{DATAFLOW_API, MQ_API};
use opsdiag::resources::{get_resources, is_deployed, ServiceKind};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_is_deployed_follows_discovery() {
    let cluster = FakeCluster::new().with_api(&MQ_API);
    assert!(is_deployed(&cluster, &MQ_API).await.unwrap());
    assert!(!is_deployed(&cluster, &DATAFLOW_API).await.unwrap());
}

#[tokio::test]
async fn test_missing_kind_lists_empty() {
    let cluster = FakeCluster::new();
    let kind = DATAFLOW_API.kind("dataflow").unwrap();
    let items = get_resources(&cluster, &DATAFLOW_API, kind, None).await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_resources_filtered_by_namespace() {
    let cluster = FakeCluster::new()
        .with_api(&MQ_API)
        .with_custom(&MQ_API, "broker", custom_object(&MQ_API, "broker", "aio", "b1", json!({})))
        .with_custom(&MQ_API, "broker", custom_object(&MQ_API, "broker", "edge", "b2", json!({})));
    let kind = MQ_API.kind("broker").unwrap();

    assert_eq!(get_resources(&cluster, &MQ_API, kind, None).await.unwrap().len(), 2);
    assert_eq!(get_resources(&cluster, &MQ_API, kind, Some("edge")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_retrying_wrapper_passes_through() {
    let policy = RetryPolicy {
        soft_timeout: Duration::from_secs(1),
        hard_timeout: Duration::from_secs(2),
        ..RetryPolicy::default()
    };
    let cluster = Retrying::new(FakeCluster::new().with_api(&MQ_API), policy);
    assert!(is_deployed(&cluster, &MQ_API).await.unwrap());
}

#[test]
fn test_every_service_has_kinds() {
    for service in ServiceKind::ALL {
        assert!(!service.def().api.kinds.is_empty(), "{service} has no kinds");
        assert_eq!(service.def().service, service);
    }
}
