//! Dataflow evaluators: dataflows, endpoints and profiles

use super::pod::evaluate_pod_health;
use super::post::*;
use super::rules::{lookup, Rule};
use super::types::{CheckReport, CheckStatus, Evaluation};
use crate::resources::registry::{DATAFLOW, DATAFLOW_API};
use crate::resources::{ResourceKind, ServiceDef};
use async_trait::async_trait;
use kube::ResourceExt;
use serde_json::{json, Value};

pub const ENDPOINT_TYPES: &[&str] = &[
    "dataExplorer",
    "dataLakeStorage",
    "fabricOneLake",
    "kafka",
    "localStorage",
    "mqtt",
];

pub struct DataflowChecks;

#[async_trait]
impl ServiceChecks for DataflowChecks {
    fn service(&self) -> &'static ServiceDef {
        &DATAFLOW
    }

    async fn evaluate(&self, ctx: &EvalContext<'_>, kind: &'static ResourceKind) -> CheckReport {
        match kind.name {
            "dataflowendpoint" => evaluate_kind(ctx, kind, &endpoint_rules(), false).await,
            "dataflowprofile" => evaluate_kind(ctx, kind, &profile_rules(), true).await,
            "dataflow" => evaluate_dataflows(ctx, kind).await,
            _ => unsupported_kind(ctx, &DATAFLOW_API, kind),
        }
    }
}

pub fn endpoint_rules() -> Vec<Rule> {
    vec![Rule::InSet {
        path: "spec.endpointType",
        allowed: ENDPOINT_TYPES,
    }]
}

pub fn profile_rules() -> Vec<Rule> {
    vec![Rule::IfPresent {
        path: "spec.instanceCount",
        rules: vec![Rule::InRange {
            path: "spec.instanceCount",
            min: Some(1),
            max: None,
        }],
    }]
}

async fn evaluate_kind(
    ctx: &EvalContext<'_>,
    kind: &ResourceKind,
    rules: &[Rule],
    with_pods: bool,
) -> CheckReport {
    let api = &DATAFLOW_API;
    let mut check = kind_manager(api, kind);
    let target = target_name(api, kind);
    let conditions = kind_conditions(rules, &["status.provisioningStatus"]);

    let Some(groups) = fetch_grouped(ctx, &mut check, api, kind, &target, &conditions).await else {
        return check.as_object(ctx.as_list);
    };

    for (namespace, items) in &groups {
        if ctx.is_cancelled() {
            break;
        }
        check.add_target(&target, Some(namespace), &conditions);
        namespace_header(&mut check, &target, namespace, kind, items.len());

        for item in items {
            let mut status = evaluate_rules(&mut check, &target, namespace, item, rules);
            if let Some(s) = evaluate_provisioning(&mut check, &target, namespace, item, true) {
                status = status.combine(s);
            }
            resource_display(&mut check, &target, namespace, kind, item, status);
            walk_display(&mut check, ctx, &target, namespace, item.data.get("spec"));
        }

        if with_pods {
            evaluate_pod_health(&mut check, ctx.cluster, namespace, DATAFLOW.pod_prefixes, DATAFLOW_API.label, 6)
                .await;
        }
    }

    check.as_object(ctx.as_list)
}

pub async fn evaluate_dataflows(ctx: &EvalContext<'_>, kind: &ResourceKind) -> CheckReport {
    let api = &DATAFLOW_API;
    let mut check = kind_manager(api, kind);
    let target = target_name(api, kind);
    let conditions = vec![
        "spec.profileRef in dataflowprofiles".to_string(),
        "status.provisioningStatus".to_string(),
    ];

    let Some(groups) = fetch_grouped(ctx, &mut check, api, kind, &target, &conditions).await else {
        return check.as_object(ctx.as_list);
    };

    let profile_kind = DATAFLOW_API.kind("dataflowprofile");

    for (namespace, dataflows) in &groups {
        if ctx.is_cancelled() {
            break;
        }
        check.add_target(&target, Some(namespace), &conditions);
        namespace_header(&mut check, &target, namespace, kind, dataflows.len());

        let profiles = match profile_kind {
            Some(pk) => match sibling_names(ctx, api, pk, namespace).await {
                Ok(names) => Some(names),
                Err(e) => {
                    check.add_failure(&target, Some(namespace), "dataflowprofiles", &e);
                    None
                }
            },
            None => None,
        };

        for dataflow in dataflows {
            let name = dataflow.name_any();
            let mut status = CheckStatus::Success;

            let profile_ref = lookup(&dataflow.data, "spec.profileRef").and_then(Value::as_str);
            if let Some(profiles) = profiles.as_ref() {
                let found = profile_ref.is_some_and(|p| profiles.iter().any(|k| k == p));
                let profile_status = if found {
                    CheckStatus::Success
                } else {
                    CheckStatus::Warning
                };
                let mut evaluation = Evaluation::new(profile_status)
                    .with_name(&name)
                    .with_value("spec.profileRef", json!(profile_ref));
                if !found {
                    evaluation.description = Some(match profile_ref {
                        Some(p) => format!("Dataflow profile {p} not found in namespace {namespace}"),
                        None => "spec.profileRef is not set".to_string(),
                    });
                }
                check.add_evaluation(&target, Some(namespace), evaluation);
                status = status.combine(profile_status);
            }

            if let Some(s) = evaluate_provisioning(&mut check, &target, namespace, dataflow, true) {
                status = status.combine(s);
            }
            resource_display(&mut check, &target, namespace, kind, dataflow, status);
            walk_display(&mut check, ctx, &target, namespace, dataflow.data.get("spec"));
        }
    }

    check.as_object(ctx.as_list)
}
