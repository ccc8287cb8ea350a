//! Post-deployment driver shared by every service module

use super::display::walk_properties;
use super::manager::CheckManager;
use super::rules::{apply_all, conditions, name_match, Rule};
use super::status::{has_provisioning_status, provisioning_evaluation};
use super::types::{CheckReport, CheckStatus, DetailLevel, DisplayItem, Evaluation, Style};
use crate::client::{group_by_namespace, ClusterAccess};
use crate::error::OpsError;
use crate::resources::{self, ResourceApi, ResourceKind, ServiceDef};
use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::ResourceExt;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Everything an evaluator needs besides the kind it evaluates
pub struct EvalContext<'a> {
    pub cluster: &'a dyn ClusterAccess,
    pub as_list: bool,
    pub detail_level: DetailLevel,
    /// Glob over resource names
    pub resource_name: Option<&'a str>,
    /// Broker listeners are expected to run without internal encryption
    pub mq_insecure: bool,
    pub cancel: &'a CancellationToken,
}

impl EvalContext<'_> {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Evaluators for one service
#[async_trait]
pub trait ServiceChecks: Send + Sync {
    fn service(&self) -> &'static ServiceDef;

    /// Evaluate one owned kind into a report
    async fn evaluate(&self, ctx: &EvalContext<'_>, kind: &'static ResourceKind) -> CheckReport;
}

/// Run the evaluators of `checks` for the selected kinds
///
/// Emits a single `skipped` report when the API is not deployed. Kinds must
/// already be validated against the API.
pub async fn check_post_deployment(
    ctx: &EvalContext<'_>,
    checks: &dyn ServiceChecks,
    kinds: &[&'static ResourceKind],
) -> Vec<CheckReport> {
    let api = &checks.service().api;
    let mut reports = Vec::new();

    let enumerate_name = format!("enumerate{}Api", api.upper_moniker());
    let enumerate_desc = format!("Enumerate {} API resources", api.upper_moniker());
    let mut enumerate = CheckManager::new(enumerate_name, enumerate_desc);
    let target = api.api_version();
    enumerate.add_target(&target, None, &["enumerate"]);

    match resources::is_deployed(ctx.cluster, api).await {
        Ok(true) => {
            let owned: Vec<Value> = api.kinds.iter().map(|k| Value::from(k.kind)).collect();
            enumerate.add_display(
                &target,
                None,
                DisplayItem::new(format!("{} API resources detected", target))
                    .padded(4)
                    .styled(Style::Status(CheckStatus::Success)),
            );
            enumerate.add_target_eval(
                &target,
                None,
                CheckStatus::Success,
                json!({ "kinds": owned }),
                None,
            );
            reports.push(enumerate.as_object(ctx.as_list));
        }
        Ok(false) => {
            enumerate.add_evaluation(
                &target,
                None,
                Evaluation::new(CheckStatus::Skipped)
                    .with_value("api", Value::from(target.clone()))
                    .with_description(format!("{} API resources not detected on cluster", target)),
            );
            reports.push(enumerate.as_object(ctx.as_list));
            return reports;
        }
        Err(e) => {
            enumerate.add_failure(&target, None, "api discovery", &e);
            reports.push(enumerate.as_object(ctx.as_list));
            return reports;
        }
    }

    for kind in kinds {
        if ctx.is_cancelled() {
            debug!("Cancelled before evaluating {}", kind.plural);
            break;
        }
        reports.push(checks.evaluate(ctx, *kind).await);
    }
    reports
}

/// Target name for a kind, e.g. `brokers.mq.iotoperations.azure.com`
pub fn target_name(api: &ResourceApi, kind: &ResourceKind) -> String {
    format!("{}.{}", kind.plural, api.group)
}

/// Report name for a kind, e.g. `evalBrokers`
pub fn check_name(kind: &ResourceKind) -> String {
    format!("eval{}s", kind.kind)
}

/// Fresh manager for a kind evaluator
pub fn kind_manager(api: &ResourceApi, kind: &ResourceKind) -> CheckManager {
    CheckManager::new(
        check_name(kind),
        format!("Evaluate {} {}s", api.upper_moniker(), kind.kind),
    )
}

/// Error report for a kind the service has no evaluator for
pub fn unsupported_kind(ctx: &EvalContext<'_>, api: &ResourceApi, kind: &ResourceKind) -> CheckReport {
    let mut check = kind_manager(api, kind);
    let target = target_name(api, kind);
    check.add_target(&target, None, &["kind is owned by the service"]);
    let err = OpsError::UserError(format!(
        "{} does not evaluate {}; allowed kinds: {}",
        api.moniker,
        kind.plural,
        api.kind_names().join(", ")
    ));
    check.add_failure(&target, None, kind.plural, &err);
    check.as_object(ctx.as_list)
}

/// Fetch and group all resources of a kind, honouring the name filter
///
/// Returns `None` after recording why when there is nothing to evaluate.
pub async fn fetch_grouped(
    ctx: &EvalContext<'_>,
    check: &mut CheckManager,
    api: &ResourceApi,
    kind: &ResourceKind,
    target: &str,
    conditions: &[String],
) -> Option<BTreeMap<String, Vec<DynamicObject>>> {
    let items = match resources::get_resources(ctx.cluster, api, kind, None).await {
        Ok(items) => items,
        Err(e) => {
            check.add_target(target, None, conditions);
            check.add_failure(target, None, kind.plural, &e);
            return None;
        }
    };

    let items: Vec<DynamicObject> = items
        .into_iter()
        .filter(|o| name_match(&o.name_any(), ctx.resource_name))
        .collect();

    if items.is_empty() {
        check.add_target(target, None, conditions);
        check.add_evaluation(
            target,
            None,
            Evaluation::new(CheckStatus::Success)
                .with_value(kind.plural, json!([]))
                .with_description(format!("No {} resources detected in any namespace", kind.kind)),
        );
        return None;
    }
    Some(group_by_namespace(items))
}

/// Apply rules to a resource and record one evaluation per outcome
pub fn evaluate_rules(
    check: &mut CheckManager,
    target: &str,
    namespace: &str,
    resource: &DynamicObject,
    rules: &[Rule],
) -> CheckStatus {
    let name = resource.name_any();
    let mut status = CheckStatus::Success;
    for outcome in apply_all(rules, &resource.data) {
        status = status.combine(outcome.status);
        check.add_evaluation(target, Some(namespace), outcome.into_evaluation(Some(&name)));
    }
    status
}

/// Record a provisioning status evaluation
///
/// With `required == false` a missing status block records nothing.
pub fn evaluate_provisioning(
    check: &mut CheckManager,
    target: &str,
    namespace: &str,
    resource: &DynamicObject,
    required: bool,
) -> Option<CheckStatus> {
    if !required && !has_provisioning_status(&resource.data) {
        return None;
    }
    let evaluation = provisioning_evaluation(&resource.data, &resource.name_any());
    let status = evaluation.status;
    check.add_evaluation(target, Some(namespace), evaluation);
    Some(status)
}

/// Namespace header display
pub fn namespace_header(check: &mut CheckManager, target: &str, namespace: &str, kind: &ResourceKind, count: usize) {
    check.add_display(
        target,
        Some(namespace),
        DisplayItem::new(format!("{} {} detected in namespace {}", count, kind.kind, namespace))
            .padded(4)
            .styled(Style::Header),
    );
}

/// Presence display for one resource
pub fn resource_display(
    check: &mut CheckManager,
    target: &str,
    namespace: &str,
    kind: &ResourceKind,
    resource: &DynamicObject,
    status: CheckStatus,
) {
    check.add_display(
        target,
        Some(namespace),
        DisplayItem::new(format!("{} {} {}", status.symbol(), kind.kind, resource.name_any()))
            .padded(6)
            .styled(Style::Status(status)),
    );
}

/// Property walk of `value` when the detail level asks for it
pub fn walk_display(
    check: &mut CheckManager,
    ctx: &EvalContext<'_>,
    target: &str,
    namespace: &str,
    value: Option<&Value>,
) {
    if ctx.detail_level < DetailLevel::Detail {
        return;
    }
    if let Some(value) = value {
        check.add_displays(target, Some(namespace), walk_properties(value, 8, ctx.detail_level));
    }
}

/// Rule conditions plus extra free-form ones
pub fn kind_conditions(rules: &[Rule], extra: &[&str]) -> Vec<String> {
    let mut all: Vec<String> = extra.iter().map(|s| s.to_string()).collect();
    all.extend(conditions(rules));
    all
}

/// Names of the resources of another kind in one namespace
pub async fn sibling_names(
    ctx: &EvalContext<'_>,
    api: &ResourceApi,
    kind: &ResourceKind,
    namespace: &str,
) -> crate::error::Result<Vec<String>> {
    let items = resources::get_resources(ctx.cluster, api, kind, Some(namespace)).await?;
    Ok(items.iter().map(|o| o.name_any()).collect())
}
