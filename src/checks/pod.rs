//! Pod health evaluation

use super::manager::CheckManager;
use super::types::{CheckStatus, DisplayItem, Evaluation, Style};
use crate::client::{list_service_pods, matches_prefix, ClusterAccess};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use serde::Serialize;
use serde_json::Value;

/// Target under which pod-health evaluations are grouped
pub const CORE_SERVICE_RUNTIME: &str = "coreServiceRuntimeResource";

/// Health derived from a pod's phase and conditions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodHealth {
    pub name: String,
    pub phase: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Classify a pod
///
/// `Running` is success unless a condition is not `True`, in which case it
/// is a warning carrying the first such condition. `Pending` and `Unknown` are
/// warnings, `Failed` is an error and `Succeeded` is success.
pub fn pod_health(pod: &Pod) -> PodHealth {
    let status = pod.status.as_ref();
    let phase = status
        .and_then(|s| s.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let not_ready = status
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conds| conds.iter().find(|c| c.status != "True"))
        .map(|c| {
            let detail = c
                .message
                .clone()
                .or_else(|| c.reason.clone())
                .unwrap_or_else(|| c.status.clone());
            format!("{}: {}", c.type_, detail)
        });

    let (check_status, description) = match phase.as_str() {
        "Running" => match not_ready {
            Some(cond) => (CheckStatus::Warning, Some(cond)),
            None => (CheckStatus::Success, None),
        },
        "Succeeded" => (CheckStatus::Success, None),
        "Failed" => (
            CheckStatus::Error,
            not_ready.or_else(|| status.and_then(|s| s.reason.clone())),
        ),
        _ => (CheckStatus::Warning, not_ready),
    };

    PodHealth {
        name: pod.name_any(),
        phase,
        status: check_status,
        description,
    }
}

/// Append one evaluation per pod matching `prefixes` or `label` in `namespace`
///
/// A prefix with no matching pod yields a `skipped` "not found" evaluation.
pub async fn evaluate_pod_health(
    check: &mut CheckManager,
    cluster: &dyn ClusterAccess,
    namespace: &str,
    prefixes: &[&str],
    label: Option<&str>,
    padding: usize,
) {
    if prefixes.is_empty() && label.is_none() {
        return;
    }

    let ns = Some(namespace);
    check.add_target(
        CORE_SERVICE_RUNTIME,
        ns,
        &["status.phase in (Running, Succeeded)"],
    );

    let pods = match list_service_pods(cluster, ns, prefixes, label).await {
        Ok(pods) => pods,
        Err(e) => {
            check.add_failure(CORE_SERVICE_RUNTIME, ns, "pods", &e);
            return;
        }
    };

    for prefix in prefixes {
        if !pods.iter().any(|p| matches_prefix(&p.name_any(), &[*prefix])) {
            check.add_evaluation(
                CORE_SERVICE_RUNTIME,
                ns,
                Evaluation::new(CheckStatus::Skipped)
                    .with_value("pod", Value::from(format!("{prefix}*")))
                    .with_description(format!("Pods with prefix '{prefix}' not found")),
            );
        }
    }

    for pod in &pods {
        let health = pod_health(pod);
        check.add_display(
            CORE_SERVICE_RUNTIME,
            ns,
            DisplayItem::new(format!("{} Pod {} ({})", health.status.symbol(), health.name, health.phase))
                .padded(padding)
                .styled(Style::Status(health.status)),
        );

        let mut evaluation = Evaluation::new(health.status)
            .with_name(health.name)
            .with_value("status.phase", Value::from(health.phase));
        evaluation.description = health.description;
        check.add_evaluation(CORE_SERVICE_RUNTIME, ns, evaluation);
    }
}
