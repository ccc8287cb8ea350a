//! Pre-deployment readiness: Kubernetes version and node capacity

use super::manager::CheckManager;
use super::types::{CheckReport, CheckStatus, DisplayItem, Evaluation, Style};
use crate::client::ClusterAccess;
use crate::config::NodeRequirements;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use serde_json::{json, Value};

const K8S_VERSION_TARGET: &str = "k8s";
const NODES_TARGET: &str = "cluster/nodes";

/// Inputs for the pre-deployment evaluators
#[derive(Debug, Clone)]
pub struct PreDeploymentOptions {
    /// `major.minor`
    pub min_k8s_version: String,
    pub node: NodeRequirements,
    pub as_list: bool,
}

/// Run both pre-deployment evaluators
pub async fn check_pre_deployment(
    cluster: &dyn ClusterAccess,
    options: &PreDeploymentOptions,
) -> Vec<CheckReport> {
    vec![
        evaluate_k8s_version(cluster, options).await,
        evaluate_cluster_nodes(cluster, options).await,
    ]
}

/// Parse `major.minor` into a comparable pair; a trailing `+` on the minor is ignored
pub fn parse_version(major: &str, minor: &str) -> Option<(u32, u32)> {
    let major = major.trim().trim_end_matches('+').parse().ok()?;
    let minor = minor.trim().trim_end_matches('+').parse().ok()?;
    Some((major, minor))
}

fn parse_min_version(text: &str) -> Option<(u32, u32)> {
    let (major, minor) = text.split_once('.')?;
    parse_version(major, minor)
}

pub async fn evaluate_k8s_version(
    cluster: &dyn ClusterAccess,
    options: &PreDeploymentOptions,
) -> CheckReport {
    let mut check = CheckManager::new("evalK8sVers", "Evaluate Kubernetes server");
    let condition = format!("(k8s version)>={}", options.min_k8s_version);
    check.add_target(K8S_VERSION_TARGET, None, &[condition]);

    let version = match cluster.server_version().await {
        Ok(v) => v,
        Err(e) => {
            check.add_failure(K8S_VERSION_TARGET, None, "version", &e);
            return check.as_object(options.as_list);
        }
    };

    let actual = format!("{}.{}", version.major, version.minor);
    let status = match (
        parse_version(&version.major, &version.minor),
        parse_min_version(&options.min_k8s_version),
    ) {
        (Some(found), Some(wanted)) if found >= wanted => CheckStatus::Success,
        (Some(_), Some(_)) => CheckStatus::Error,
        _ => CheckStatus::Warning,
    };

    check.add_display(
        K8S_VERSION_TARGET,
        None,
        DisplayItem::new(format!(
            "Require k8s >={}, detected {}",
            options.min_k8s_version, version.git_version
        ))
        .padded(4)
        .styled(Style::Status(status)),
    );

    let mut evaluation = Evaluation::new(status).with_value("value", Value::from(actual));
    if status == CheckStatus::Warning {
        evaluation.description = Some(format!(
            "Unable to parse server version '{}'",
            version.git_version
        ));
    }
    check.add_evaluation(K8S_VERSION_TARGET, None, evaluation);
    check.as_object(options.as_list)
}

pub async fn evaluate_cluster_nodes(
    cluster: &dyn ClusterAccess,
    options: &PreDeploymentOptions,
) -> CheckReport {
    let mut check = CheckManager::new("evalClusterNodes", "Evaluate cluster nodes");
    check.add_target(NODES_TARGET, None, &["len(cluster/nodes)>=1"]);

    let nodes = match cluster.list_nodes().await {
        Ok(nodes) => nodes,
        Err(e) => {
            check.add_failure(NODES_TARGET, None, "nodes", &e);
            return check.as_object(options.as_list);
        }
    };

    if nodes.is_empty() {
        check.add_evaluation(
            NODES_TARGET,
            None,
            Evaluation::new(CheckStatus::Error)
                .with_value("len(cluster/nodes)", json!(0))
                .with_description("No nodes detected"),
        );
        return check.as_object(options.as_list);
    }
    check.add_target_eval(
        NODES_TARGET,
        None,
        CheckStatus::Success,
        json!({ "len(cluster/nodes)": nodes.len() }),
        None,
    );

    let req = &options.node;
    let min_memory = parse_quantity(&req.min_memory);
    let min_storage = parse_quantity(&req.min_storage);
    let conditions = vec![
        format!("info.architecture in ({})", req.architectures.join(",")),
        format!("condition.cpu>={}", req.min_vcpu),
        format!("condition.memory>={}", req.min_memory),
        format!("condition.ephemeral-storage>={}", req.min_storage),
    ];

    for node in &nodes {
        let name = node.name_any();
        let target = format!("cluster/nodes/{name}");
        check.add_target(&target, None, &conditions);

        let facts = NodeFacts::from_node(node);

        let arch_ok = facts
            .architecture
            .as_deref()
            .is_some_and(|a| req.architectures.iter().any(|r| r == a));
        record(&mut check, &target, &name, "info.architecture", facts.architecture.clone().into(), arch_ok);

        let cpu_ok = facts
            .cpu
            .as_deref()
            .and_then(parse_cpu)
            .is_some_and(|c| c >= f64::from(req.min_vcpu));
        record(&mut check, &target, &name, "condition.cpu", facts.cpu.clone().into(), cpu_ok);

        let memory_ok = at_least(facts.memory.as_deref(), min_memory);
        record(&mut check, &target, &name, "condition.memory", facts.memory.clone().into(), memory_ok);

        let storage_ok = at_least(facts.storage.as_deref(), min_storage);
        record(
            &mut check,
            &target,
            &name,
            "condition.ephemeral-storage",
            facts.storage.clone().into(),
            storage_ok,
        );

        let node_status = check.target_status(&target, None).unwrap_or_default();
        check.add_display(
            &target,
            None,
            DisplayItem::new(format!(
                "{} {name}: {} / {} cpu / {} memory / {} storage",
                node_status.symbol(),
                facts.architecture.as_deref().unwrap_or("?"),
                facts.cpu.as_deref().unwrap_or("?"),
                facts.memory.as_deref().unwrap_or("?"),
                facts.storage.as_deref().unwrap_or("?"),
            ))
            .padded(4)
            .styled(Style::Status(node_status)),
        );
    }

    check.as_object(options.as_list)
}

fn record(check: &mut CheckManager, target: &str, node: &str, path: &str, actual: Value, ok: bool) {
    let status = if ok {
        CheckStatus::Success
    } else {
        CheckStatus::Error
    };
    check.add_evaluation(
        target,
        None,
        Evaluation::new(status).with_name(node).with_value(path, actual),
    );
}

fn at_least(actual: Option<&str>, minimum: Option<f64>) -> bool {
    match (actual.and_then(parse_quantity), minimum) {
        (Some(found), Some(min)) => found >= min,
        _ => false,
    }
}

struct NodeFacts {
    architecture: Option<String>,
    cpu: Option<String>,
    memory: Option<String>,
    storage: Option<String>,
}

impl NodeFacts {
    fn from_node(node: &Node) -> Self {
        let status = node.status.as_ref();
        let capacity = status.and_then(|s| s.capacity.as_ref());
        let quantity = |key: &str| capacity.and_then(|c| c.get(key)).map(|q| q.0.clone());
        Self {
            architecture: status
                .and_then(|s| s.node_info.as_ref())
                .map(|i| i.architecture.clone()),
            cpu: quantity("cpu"),
            memory: quantity("memory"),
            storage: quantity("ephemeral-storage"),
        }
    }
}

/// Parse a CPU quantity (`2`, `500m`, `1.5`) into cores
pub fn parse_cpu(text: &str) -> Option<f64> {
    let text = text.trim();
    match text.strip_suffix('m') {
        Some(milli) => milli.parse::<f64>().ok().map(|m| m / 1000.0),
        None => parse_quantity(text),
    }
}

/// Parse a Kubernetes quantity into its base unit (bytes for memory)
///
/// Supports binary (`Ki`..`Ei`) and decimal (`k`..`E`, `m`) suffixes and
/// plain or exponent numbers.
pub fn parse_quantity(text: &str) -> Option<f64> {
    const SUFFIXES: [(&str, f64); 13] = [
        ("Ki", 1024.0),
        ("Mi", 1_048_576.0),
        ("Gi", 1_073_741_824.0),
        ("Ti", 1_099_511_627_776.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("Ei", 1_152_921_504_606_846_976.0),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
        ("E", 1e18),
        ("m", 1e-3),
    ];

    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for (suffix, factor) in SUFFIXES {
        if let Some(number) = text.strip_suffix(suffix) {
            return number.parse::<f64>().ok().map(|n| n * factor);
        }
    }
    text.parse::<f64>().ok()
}
