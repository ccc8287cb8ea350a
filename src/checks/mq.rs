//! Broker service evaluators

use super::pod::evaluate_pod_health;
use super::post::*;
use super::rules::{lookup, Rule};
use super::types::{CheckReport, CheckStatus, Evaluation};
use crate::client::WorkloadKind;
use crate::resources::registry::{MQ, MQ_API};
use crate::resources::{ResourceKind, ServiceDef};
use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::ResourceExt;
use serde_json::{json, Value};

const ENCRYPT_INTERNAL_TRAFFIC: &str = "spec.encryptInternalTraffic";

pub struct MqChecks;

#[async_trait]
impl ServiceChecks for MqChecks {
    fn service(&self) -> &'static ServiceDef {
        &MQ
    }

    async fn evaluate(&self, ctx: &EvalContext<'_>, kind: &'static ResourceKind) -> CheckReport {
        match kind.name {
            "broker" => evaluate_brokers(ctx, kind).await,
            "brokerlistener" => evaluate_broker_listeners(ctx, kind).await,
            "brokerauthentication" => evaluate_broker_authentications(ctx, kind).await,
            "brokerauthorization" => evaluate_broker_authorizations(ctx, kind).await,
            _ => unsupported_kind(ctx, &MQ_API, kind),
        }
    }
}

fn broker_rules() -> Vec<Rule> {
    let cardinality = [
        "spec.cardinality.backendChain.partitions",
        "spec.cardinality.backendChain.redundancyFactor",
        "spec.cardinality.backendChain.workers",
        "spec.cardinality.frontend.replicas",
        "spec.cardinality.frontend.workers",
    ];
    vec![
        Rule::InSet {
            path: "spec.mode",
            allowed: &["distributed", "standalone"],
        },
        Rule::When {
            path: "spec.mode",
            equals: "distributed",
            rules: cardinality
                .into_iter()
                .map(|path| Rule::InRange { path, min: Some(1), max: None })
                .collect(),
        },
        Rule::IfPresent {
            path: "spec.memoryProfile",
            rules: vec![Rule::InSet {
                path: "spec.memoryProfile",
                allowed: &["tiny", "low", "medium", "high"],
            }],
        },
    ]
}

/// Effective `encryptInternalTraffic`; absent means enabled
fn encrypt_internal_traffic(body: &Value) -> bool {
    match lookup(body, ENCRYPT_INTERNAL_TRAFFIC) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("enabled") || s.eq_ignore_ascii_case("true"),
        _ => true,
    }
}

pub async fn evaluate_brokers(ctx: &EvalContext<'_>, kind: &ResourceKind) -> CheckReport {
    let api = &MQ_API;
    let mut check = kind_manager(api, kind);
    let target = target_name(api, kind);
    let rules = broker_rules();
    let expected_encrypt = !ctx.mq_insecure;
    let conditions = kind_conditions(
        &rules,
        &[
            "len(brokers)<=1",
            &format!("{ENCRYPT_INTERNAL_TRAFFIC}=={expected_encrypt}"),
        ],
    );

    let Some(groups) = fetch_grouped(ctx, &mut check, api, kind, &target, &conditions).await else {
        return check.as_object(ctx.as_list);
    };

    for (namespace, brokers) in &groups {
        if ctx.is_cancelled() {
            break;
        }
        check.add_target(&target, Some(namespace), &conditions);
        namespace_header(&mut check, &target, namespace, kind, brokers.len());

        let count_status = if brokers.len() <= 1 {
            CheckStatus::Success
        } else {
            CheckStatus::Error
        };
        let mut count = Evaluation::new(count_status).with_value("len(brokers)", json!(brokers.len()));
        if count_status == CheckStatus::Error {
            count.description = Some(format!("Only one broker is allowed per namespace, found {}", brokers.len()));
        }
        check.add_evaluation(&target, Some(namespace), count);

        for broker in brokers {
            let name = broker.name_any();
            let mut status = evaluate_rules(&mut check, &target, namespace, broker, &rules);

            let actual = encrypt_internal_traffic(&broker.data);
            let encrypt_status = if actual == expected_encrypt {
                CheckStatus::Success
            } else {
                CheckStatus::Warning
            };
            let mut evaluation = Evaluation::new(encrypt_status)
                .with_name(&name)
                .with_value(ENCRYPT_INTERNAL_TRAFFIC, json!(actual));
            if encrypt_status == CheckStatus::Warning {
                evaluation.description = Some(format!(
                    "Broker {name} has {ENCRYPT_INTERNAL_TRAFFIC}={actual}, expected {expected_encrypt}"
                ));
            }
            check.add_evaluation(&target, Some(namespace), evaluation);
            status = status.combine(encrypt_status);

            if let Some(s) = evaluate_provisioning(&mut check, &target, namespace, broker, false) {
                status = status.combine(s);
            }

            resource_display(&mut check, &target, namespace, kind, broker, status);
            walk_display(&mut check, ctx, &target, namespace, broker.data.get("spec"));
        }

        evaluate_pod_health(&mut check, ctx.cluster, namespace, MQ.pod_prefixes, MQ_API.label, 6).await;
    }

    check.as_object(ctx.as_list)
}

fn listener_rules() -> Vec<Rule> {
    vec![
        Rule::InSet {
            path: "spec.serviceType",
            allowed: &["clusterIp", "loadBalancer", "nodePort"],
        },
        Rule::ForEach {
            path: "spec.ports",
            rules: vec![
                Rule::Require("port"),
                Rule::IfPresent {
                    path: "tls",
                    rules: vec![Rule::OneOf(&["tls.automatic.issuerRef", "tls.manual.secretRef"])],
                },
            ],
        },
    ]
}

fn has_ingress(service: &DynamicObject) -> bool {
    lookup(&service.data, "status.loadBalancer.ingress")
        .and_then(Value::as_array)
        .is_some_and(|i| !i.is_empty())
}

pub async fn evaluate_broker_listeners(ctx: &EvalContext<'_>, kind: &ResourceKind) -> CheckReport {
    let api = &MQ_API;
    let mut check = kind_manager(api, kind);
    let target = target_name(api, kind);
    let rules = listener_rules();
    let conditions = kind_conditions(&rules, &["spec.serviceName exists"]);

    let Some(groups) = fetch_grouped(ctx, &mut check, api, kind, &target, &conditions).await else {
        return check.as_object(ctx.as_list);
    };

    for (namespace, listeners) in &groups {
        if ctx.is_cancelled() {
            break;
        }
        check.add_target(&target, Some(namespace), &conditions);
        namespace_header(&mut check, &target, namespace, kind, listeners.len());

        let services = match ctx
            .cluster
            .list_workloads(WorkloadKind::Service, Some(namespace), None, &[])
            .await
        {
            Ok(services) => Some(services),
            Err(e) => {
                check.add_failure(&target, Some(namespace), "services", &e);
                None
            }
        };

        for listener in listeners {
            let name = listener.name_any();
            let mut status = evaluate_rules(&mut check, &target, namespace, listener, &rules);

            let service_name = lookup(&listener.data, "spec.serviceName").and_then(Value::as_str);
            if let (Some(service_name), Some(services)) = (service_name, services.as_ref()) {
                let service = services.iter().find(|s| s.name_any() == service_name);
                let service_status = match service {
                    None => CheckStatus::Warning,
                    Some(svc) => {
                        let is_lb = lookup(&listener.data, "spec.serviceType").and_then(Value::as_str)
                            == Some("loadBalancer");
                        if is_lb && !has_ingress(svc) {
                            CheckStatus::Warning
                        } else {
                            CheckStatus::Success
                        }
                    }
                };
                let mut evaluation = Evaluation::new(service_status)
                    .with_name(&name)
                    .with_value("spec.serviceName", json!(service_name));
                evaluation.description = match (service, service_status) {
                    (None, _) => Some(format!("Service {service_name} not found in namespace {namespace}")),
                    (Some(_), CheckStatus::Warning) => {
                        Some(format!("Service {service_name} has no load balancer ingress"))
                    }
                    _ => None,
                };
                check.add_evaluation(&target, Some(namespace), evaluation);
                status = status.combine(service_status);
            }

            if let Some(s) = evaluate_provisioning(&mut check, &target, namespace, listener, false) {
                status = status.combine(s);
            }

            resource_display(&mut check, &target, namespace, kind, listener, status);
            walk_display(&mut check, ctx, &target, namespace, listener.data.get("spec"));
        }
    }

    check.as_object(ctx.as_list)
}

fn authentication_rules() -> Vec<Rule> {
    vec![
        Rule::Require("spec.authenticationMethods"),
        Rule::ForEach {
            path: "spec.authenticationMethods",
            rules: vec![Rule::InSet {
                path: "method",
                allowed: &["Custom", "ServiceAccountToken", "X509"],
            }],
        },
    ]
}

pub async fn evaluate_broker_authentications(ctx: &EvalContext<'_>, kind: &ResourceKind) -> CheckReport {
    let api = &MQ_API;
    let mut check = kind_manager(api, kind);
    let target = target_name(api, kind);
    let rules = authentication_rules();
    let conditions = kind_conditions(&rules, &[]);

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
            let mut status = evaluate_rules(&mut check, &target, namespace, item, &rules);
            if let Some(s) = evaluate_provisioning(&mut check, &target, namespace, item, false) {
                status = status.combine(s);
            }
            resource_display(&mut check, &target, namespace, kind, item, status);
            walk_display(&mut check, ctx, &target, namespace, item.data.get("spec"));
        }
    }

    check.as_object(ctx.as_list)
}

pub async fn evaluate_broker_authorizations(ctx: &EvalContext<'_>, kind: &ResourceKind) -> CheckReport {
    let api = &MQ_API;
    let mut check = kind_manager(api, kind);
    let target = target_name(api, kind);
    let conditions = vec!["status.provisioningStatus".to_string()];

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
            let status = evaluate_provisioning(&mut check, &target, namespace, item, false).unwrap_or_else(|| {
                check.add_evaluation(
                    &target,
                    Some(namespace),
                    Evaluation::new(CheckStatus::Success)
                        .with_name(item.name_any())
                        .with_value("metadata.name", json!(item.name_any())),
                );
                CheckStatus::Success
            });
            resource_display(&mut check, &target, namespace, kind, item, status);
            walk_display(&mut check, ctx, &target, namespace, item.data.get("spec"));
        }
    }

    check.as_object(ctx.as_list)
}
