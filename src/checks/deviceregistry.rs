//! Device registry evaluators: assets and asset endpoint profiles

use super::post::*;
use super::rules::Rule;
use super::types::CheckReport;
use crate::resources::registry::{DEVICE_REGISTRY, DEVICE_REGISTRY_API};
use crate::resources::{ResourceKind, ServiceDef};
use async_trait::async_trait;

/// Upper bound for both `spec.dataPoints` and `spec.events`
pub const MAX_ASSET_ITEMS: usize = 1000;

pub struct DeviceRegistryChecks;

#[async_trait]
impl ServiceChecks for DeviceRegistryChecks {
    fn service(&self) -> &'static ServiceDef {
        &DEVICE_REGISTRY
    }

    async fn evaluate(&self, ctx: &EvalContext<'_>, kind: &'static ResourceKind) -> CheckReport {
        match kind.name {
            "asset" => evaluate_kind(ctx, kind, &asset_rules()).await,
            "assetendpointprofile" => evaluate_kind(ctx, kind, &asset_endpoint_profile_rules()).await,
            _ => unsupported_kind(ctx, &DEVICE_REGISTRY_API, kind),
        }
    }
}

pub fn asset_rules() -> Vec<Rule> {
    vec![
        Rule::Require("spec.assetEndpointProfileUri"),
        Rule::MaxItems { path: "spec.dataPoints", max: MAX_ASSET_ITEMS },
        Rule::ForEach {
            path: "spec.dataPoints",
            rules: vec![Rule::Require("dataSource")],
        },
        Rule::MaxItems { path: "spec.events", max: MAX_ASSET_ITEMS },
        Rule::ForEach {
            path: "spec.events",
            rules: vec![Rule::Require("eventNotifier")],
        },
        Rule::Empty("spec.status.errors"),
    ]
}

pub fn asset_endpoint_profile_rules() -> Vec<Rule> {
    vec![
        Rule::Require("spec.uuid"),
        Rule::IfPresent {
            path: "spec.transportAuthentication",
            rules: vec![Rule::IsArray("spec.transportAuthentication.ownCertificates")],
        },
        Rule::InSet {
            path: "spec.userAuthentication.mode",
            allowed: &["Anonymous", "Certificate", "UsernamePassword"],
        },
        Rule::When {
            path: "spec.userAuthentication.mode",
            equals: "Certificate",
            rules: vec![Rule::Require(
                "spec.userAuthentication.x509Credentials.certificateReference",
            )],
        },
        Rule::When {
            path: "spec.userAuthentication.mode",
            equals: "UsernamePassword",
            rules: vec![
                Rule::Require("spec.userAuthentication.usernamePasswordCredentials.usernameReference"),
                Rule::Require("spec.userAuthentication.usernamePasswordCredentials.passwordReference"),
            ],
        },
    ]
}

async fn evaluate_kind(ctx: &EvalContext<'_>, kind: &ResourceKind, rules: &[Rule]) -> CheckReport {
    let api = &DEVICE_REGISTRY_API;
    let mut check = kind_manager(api, kind);
    let target = target_name(api, kind);
    let conditions = kind_conditions(rules, &[]);

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
            let status = evaluate_rules(&mut check, &target, namespace, item, rules);
            resource_display(&mut check, &target, namespace, kind, item, status);
            walk_display(&mut check, ctx, &target, namespace, item.data.get("spec"));
        }
    }

    check.as_object(ctx.as_list)
}
