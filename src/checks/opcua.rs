//! OPC-UA connector evaluators

use super::pod::evaluate_pod_health;
use super::post::*;
use super::rules::lookup;
use super::types::{CheckReport, CheckStatus, DetailLevel, DisplayItem, Evaluation, Style};
use crate::resources::registry::{OPCUA, OPCUA_API};
use crate::resources::{ResourceKind, ServiceDef};
use async_trait::async_trait;
use kube::ResourceExt;
use serde_json::{json, Value};

const SCHEMA_PATH: &str = "spec.schema";

pub struct OpcuaChecks;

#[async_trait]
impl ServiceChecks for OpcuaChecks {
    fn service(&self) -> &'static ServiceDef {
        &OPCUA
    }

    async fn evaluate(&self, ctx: &EvalContext<'_>, kind: &'static ResourceKind) -> CheckReport {
        match kind.name {
            "assettype" => evaluate_asset_types(ctx, kind).await,
            _ => unsupported_kind(ctx, &OPCUA_API, kind),
        }
    }
}

/// `@id` and `@type` of a DTDL schema document
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSummary {
    pub id: Value,
    pub type_: Value,
    pub document: Value,
}

/// Parse an embedded DTDL schema; the error text is kept for the report
pub fn parse_schema(raw: &Value) -> Result<SchemaSummary, String> {
    let document = match raw {
        Value::String(text) => serde_json::from_str::<Value>(text).map_err(|e| e.to_string())?,
        Value::Object(_) => raw.clone(),
        other => return Err(format!("unexpected schema type: {other}")),
    };
    // A schema may be a single interface or a list of them
    let interface = match &document {
        Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    };
    Ok(SchemaSummary {
        id: interface.get("@id").cloned().unwrap_or(Value::Null),
        type_: interface.get("@type").cloned().unwrap_or(Value::Null),
        document,
    })
}

pub async fn evaluate_asset_types(ctx: &EvalContext<'_>, kind: &ResourceKind) -> CheckReport {
    let api = &OPCUA_API;
    let mut check = kind_manager(api, kind);
    let target = target_name(api, kind);
    let mut conditions = vec!["metadata.name".to_string()];
    if ctx.detail_level >= DetailLevel::Detail {
        conditions.push(format!("{SCHEMA_PATH} is valid DTDL"));
    }

    let Some(groups) = fetch_grouped(ctx, &mut check, api, kind, &target, &conditions).await else {
        return check.as_object(ctx.as_list);
    };

    for (namespace, asset_types) in &groups {
        if ctx.is_cancelled() {
            break;
        }
        check.add_target(&target, Some(namespace), &conditions);
        namespace_header(&mut check, &target, namespace, kind, asset_types.len());

        for asset_type in asset_types {
            let name = asset_type.name_any();

            if ctx.detail_level < DetailLevel::Detail {
                check.add_evaluation(
                    &target,
                    Some(namespace),
                    Evaluation::new(CheckStatus::Success)
                        .with_name(&name)
                        .with_value("metadata.name", json!(name)),
                );
                resource_display(&mut check, &target, namespace, kind, asset_type, CheckStatus::Success);
                continue;
            }

            let raw = lookup(&asset_type.data, SCHEMA_PATH).cloned().unwrap_or(Value::Null);
            let status = match parse_schema(&raw) {
                Ok(summary) => {
                    check.add_evaluation(
                        &target,
                        Some(namespace),
                        Evaluation::new(CheckStatus::Success)
                            .with_name(&name)
                            .with_value("@id", summary.id.clone())
                            .with_value("@type", summary.type_.clone()),
                    );
                    resource_display(&mut check, &target, namespace, kind, asset_type, CheckStatus::Success);
                    check.add_display(
                        &target,
                        Some(namespace),
                        DisplayItem::new(format!("@id: {}  @type: {}", summary.id, summary.type_)).padded(8),
                    );
                    if ctx.detail_level == DetailLevel::Verbose {
                        let pretty = serde_json::to_string_pretty(&summary.document).unwrap_or_default();
                        check.add_displays(
                            &target,
                            Some(namespace),
                            pretty
                                .lines()
                                .map(|line| DisplayItem::new(line).padded(10).styled(Style::Dim)),
                        );
                    }
                    CheckStatus::Success
                }
                Err(message) => {
                    check.add_evaluation(
                        &target,
                        Some(namespace),
                        Evaluation::new(CheckStatus::Warning)
                            .with_name(&name)
                            .with_value(SCHEMA_PATH, raw)
                            .with_description(format!("Unable to parse schema: {message}")),
                    );
                    resource_display(&mut check, &target, namespace, kind, asset_type, CheckStatus::Warning);
                    CheckStatus::Warning
                }
            };
            tracing::debug!("assettype {}/{} evaluated as {}", namespace, name, status);
        }

        evaluate_pod_health(&mut check, ctx.cluster, namespace, OPCUA.pod_prefixes, OPCUA_API.label, 6).await;
    }

    check.as_object(ctx.as_list)
}
