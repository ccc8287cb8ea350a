//! Check engine
//!
//! Evaluators read custom resources and their companion pods, apply per-kind
//! rules and record the outcome in a [`CheckManager`]. The orchestrator,
//! [`run_checks`], validates the request, dispatches pre- and post-deployment
//! evaluators and composes the [`RunResult`].

pub mod akri;
pub mod dataflow;
pub mod deviceregistry;
pub mod display;
pub mod manager;
pub mod mq;
pub mod opcua;
pub mod pod;
pub mod post;
pub mod pre;
pub mod report;
pub mod rules;
pub mod status;
pub mod types;

pub use manager::CheckManager;
pub use post::{check_post_deployment, EvalContext, ServiceChecks};
pub use pre::{check_pre_deployment, PreDeploymentOptions};
pub use types::*;

use crate::client::ClusterAccess;
use crate::config::{AppConfig, NodeRequirements};
use crate::error::{OpsError, Result};
use crate::resources::{select_kinds, ResourceKind, ServiceKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Evaluators for a service
pub fn service_checks(service: ServiceKind) -> &'static dyn ServiceChecks {
    match service {
        ServiceKind::Mq => &mq::MqChecks,
        ServiceKind::Opcua => &opcua::OpcuaChecks,
        ServiceKind::DeviceRegistry => &deviceregistry::DeviceRegistryChecks,
        ServiceKind::Akri => &akri::AkriChecks,
        ServiceKind::Dataflow => &dataflow::DataflowChecks,
    }
}

/// Options for one `check` run
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub ops_service: Option<ServiceKind>,
    /// Explicit `--pre`
    pub pre: bool,
    /// Explicit `--post`
    pub post: bool,
    pub as_list: bool,
    pub detail_level: DetailLevel,
    pub resource_kinds: Vec<String>,
    pub resource_name: Option<String>,
    pub mq_insecure: bool,
    pub min_k8s_version: String,
    pub node: NodeRequirements,
}

impl Default for CheckOptions {
    fn default() -> Self {
        let config = AppConfig::default();
        Self {
            ops_service: None,
            pre: false,
            post: false,
            as_list: true,
            detail_level: DetailLevel::Summary,
            resource_kinds: Vec::new(),
            resource_name: None,
            mq_insecure: false,
            min_k8s_version: config.min_k8s_version,
            node: config.node,
        }
    }
}

impl CheckOptions {
    /// Start from the configured thresholds
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            min_k8s_version: config.min_k8s_version.clone(),
            node: config.node.clone(),
            ..Self::default()
        }
    }

    /// Effective `(pre, post)`
    ///
    /// Without explicit flags, pre runs only when no service is named and post
    /// always runs. Explicit flags are honoured verbatim.
    pub fn phases(&self) -> (bool, bool) {
        if self.pre || self.post {
            (self.pre, self.post)
        } else {
            (self.ops_service.is_none(), true)
        }
    }

    /// Reject unknown kinds and conflicting flags before touching the cluster
    pub fn validate(&self) -> Result<()> {
        plan_post(self).map(|_| ())
    }

    fn title(&self) -> String {
        match self.ops_service {
            Some(service) => format!("Evaluation for {service} service deployment"),
            None => "Evaluation for IoT Operations readiness".to_string(),
        }
    }
}

/// Validate requested kinds; returns the services to evaluate with their kinds
fn plan_post(options: &CheckOptions) -> Result<Vec<(ServiceKind, Vec<&'static ResourceKind>)>> {
    match options.ops_service {
        Some(service) => {
            let kinds = select_kinds(&service.def().api, &options.resource_kinds)?;
            Ok(vec![(service, kinds)])
        }
        None if !options.resource_kinds.is_empty() => Err(OpsError::UserError(
            "--resources requires --ops-service to be set".to_string(),
        )),
        None => ServiceKind::ALL
            .into_iter()
            .map(|service| Ok((service, select_kinds(&service.def().api, &[])?)))
            .collect(),
    }
}

/// Run pre and/or post-deployment checks
///
/// Fails only with [`OpsError::UserError`] before dispatch; cluster failures
/// become evaluations.
pub async fn run_checks(
    cluster: &dyn ClusterAccess,
    options: &CheckOptions,
    cancel: &CancellationToken,
) -> Result<RunResult> {
    let plan = plan_post(options)?;
    let (pre, post) = options.phases();
    debug!("Running checks: pre={}, post={}", pre, post);

    let mut result = RunResult {
        title: options.title(),
        ..Default::default()
    };

    if pre && !cancel.is_cancelled() {
        let pre_options = PreDeploymentOptions {
            min_k8s_version: options.min_k8s_version.clone(),
            node: options.node.clone(),
            as_list: options.as_list,
        };
        result.pre_deployment = Some(check_pre_deployment(cluster, &pre_options).await);
    }

    if post {
        let ctx = EvalContext {
            cluster,
            as_list: options.as_list,
            detail_level: options.detail_level,
            resource_name: options.resource_name.as_deref(),
            mq_insecure: options.mq_insecure,
            cancel,
        };
        let mut reports = Vec::new();
        for (service, kinds) in &plan {
            if cancel.is_cancelled() {
                break;
            }
            info!("Evaluating {} service", service);
            reports.extend(check_post_deployment(&ctx, service_checks(*service), kinds).await);
        }
        result.post_deployment = Some(reports);
    }

    result.cancelled = cancel.is_cancelled();
    Ok(result)
}
