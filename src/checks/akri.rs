//! Device discovery evaluators: configurations and instances

use super::pod::evaluate_pod_health;
use super::post::*;
use super::rules::{lookup, Rule};
use super::types::{CheckReport, CheckStatus, DisplayItem, Evaluation};
use crate::resources::registry::{AKRI, AKRI_API};
use crate::resources::{ResourceKind, ServiceDef};
use async_trait::async_trait;
use kube::ResourceExt;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[_A-Za-z][_A-Za-z0-9]*$").expect("identifier pattern is valid")
});

pub struct AkriChecks;

#[async_trait]
impl ServiceChecks for AkriChecks {
    fn service(&self) -> &'static ServiceDef {
        &AKRI
    }

    async fn evaluate(&self, ctx: &EvalContext<'_>, kind: &'static ResourceKind) -> CheckReport {
        match kind.name {
            "configuration" => evaluate_configurations(ctx, kind).await,
            "instance" => evaluate_instances(ctx, kind).await,
            _ => unsupported_kind(ctx, &AKRI_API, kind),
        }
    }
}

pub fn configuration_rules() -> Vec<Rule> {
    vec![
        Rule::Matches {
            path: "spec.discoveryHandler.name",
            pattern: &IDENTIFIER,
        },
        Rule::ForEach {
            path: "spec.discoveryHandler.discoveryProperties",
            rules: vec![
                Rule::Require("name"),
                Rule::OneOf(&["value", "valueFrom"]),
                Rule::IfPresent {
                    path: "valueFrom",
                    rules: vec![Rule::OneOf(&["valueFrom.secretKeyRef", "valueFrom.configMapKeyRef"])],
                },
                Rule::IfPresent {
                    path: "valueFrom.secretKeyRef",
                    rules: vec![Rule::Require("valueFrom.secretKeyRef.name")],
                },
                Rule::IfPresent {
                    path: "valueFrom.configMapKeyRef",
                    rules: vec![Rule::Require("valueFrom.configMapKeyRef.name")],
                },
            ],
        },
    ]
}

pub async fn evaluate_configurations(ctx: &EvalContext<'_>, kind: &ResourceKind) -> CheckReport {
    let api = &AKRI_API;
    let mut check = kind_manager(api, kind);
    let target = target_name(api, kind);
    let rules = configuration_rules();
    let conditions = kind_conditions(&rules, &[]);

    let Some(groups) = fetch_grouped(ctx, &mut check, api, kind, &target, &conditions).await else {
        return check.as_object(ctx.as_list);
    };

    for (namespace, configurations) in &groups {
        if ctx.is_cancelled() {
            break;
        }
        check.add_target(&target, Some(namespace), &conditions);
        namespace_header(&mut check, &target, namespace, kind, configurations.len());

        for configuration in configurations {
            let status = evaluate_rules(&mut check, &target, namespace, configuration, &rules);
            resource_display(&mut check, &target, namespace, kind, configuration, status);
            walk_display(
                &mut check,
                ctx,
                &target,
                namespace,
                lookup(&configuration.data, "spec.discoveryHandler"),
            );
        }

        evaluate_pod_health(&mut check, ctx.cluster, namespace, AKRI.pod_prefixes, AKRI_API.label, 6).await;
    }

    check.as_object(ctx.as_list)
}

pub async fn evaluate_instances(ctx: &EvalContext<'_>, kind: &ResourceKind) -> CheckReport {
    let api = &AKRI_API;
    let mut check = kind_manager(api, kind);
    let target = target_name(api, kind);
    let rules = vec![Rule::Require("spec.configurationName")];
    let conditions = kind_conditions(&rules, &["spec.configurationName in configurations"]);

    let Some(groups) = fetch_grouped(ctx, &mut check, api, kind, &target, &conditions).await else {
        return check.as_object(ctx.as_list);
    };

    let configuration_kind = AKRI_API.kind("configuration");

    for (namespace, instances) in &groups {
        if ctx.is_cancelled() {
            break;
        }
        check.add_target(&target, Some(namespace), &conditions);
        namespace_header(&mut check, &target, namespace, kind, instances.len());

        let known = match configuration_kind {
            Some(ck) => match sibling_names(ctx, api, ck, namespace).await {
                Ok(names) => Some(names),
                Err(e) => {
                    check.add_failure(&target, Some(namespace), "configurations", &e);
                    None
                }
            },
            None => None,
        };

        for instance in instances {
            let name = instance.name_any();
            let mut status = evaluate_rules(&mut check, &target, namespace, instance, &rules);

            let configuration = lookup(&instance.data, "spec.configurationName").and_then(Value::as_str);
            if let (Some(configuration), Some(known)) = (configuration.filter(|c| !c.is_empty()), known.as_ref()) {
                let found = known.iter().any(|k| k == configuration);
                let exists = if found {
                    CheckStatus::Success
                } else {
                    CheckStatus::Error
                };
                let mut evaluation = Evaluation::new(exists)
                    .with_name(&name)
                    .with_value("spec.configurationName", json!(configuration));
                if !found {
                    evaluation.description = Some(format!(
                        "Configuration {configuration} not found in namespace {namespace}"
                    ));
                }
                check.add_evaluation(&target, Some(namespace), evaluation);
                status = status.combine(exists);
            }

            resource_display(&mut check, &target, namespace, kind, instance, status);
            if let Some(nodes) = lookup(&instance.data, "spec.nodes").and_then(Value::as_array) {
                let nodes: Vec<&str> = nodes.iter().filter_map(Value::as_str).collect();
                check.add_display(
                    &target,
                    Some(namespace),
                    DisplayItem::new(format!("nodes: {}", nodes.join(", "))).padded(8),
                );
            }
            walk_display(&mut check, ctx, &target, namespace, instance.data.get("spec"));
        }
    }

    check.as_object(ctx.as_list)
}
