//! Resource API catalog
//!
//! A static table of services (see [`registry`]) plus a thin runtime probe over
//! API discovery.

pub mod registry;

pub use registry::{ResourceApi, ResourceKind, ServiceDef, ServiceKind};

use crate::client::ClusterAccess;
use crate::error::{OpsError, Result};
use kube::api::DynamicObject;
use tracing::debug;

/// Kinds owned by an API
pub fn list(api: &ResourceApi) -> &'static [ResourceKind] {
    api.kinds
}

/// True iff the cluster advertises `group/version` in API discovery
pub async fn is_deployed(cluster: &dyn ClusterAccess, api: &ResourceApi) -> Result<bool> {
    let wanted = api.api_version();
    let versions = cluster.api_versions().await?;
    let deployed = versions.iter().any(|v| *v == wanted);
    debug!("API {} deployed: {}", wanted, deployed);
    Ok(deployed)
}

/// Fetch custom resources of one kind; a missing kind or API yields an empty list
pub async fn get_resources(
    cluster: &dyn ClusterAccess,
    api: &ResourceApi,
    kind: &ResourceKind,
    namespace: Option<&str>,
) -> Result<Vec<DynamicObject>> {
    match cluster.list_custom(api, kind, namespace).await {
        Ok(items) => Ok(items),
        Err(OpsError::KindNotFound(msg)) => {
            debug!("{} not served: {}", kind.plural, msg);
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// Validate requested kinds against those owned by `api`
///
/// An empty request selects every owned kind.
pub fn select_kinds(
    api: &ResourceApi,
    requested: &[String],
) -> Result<Vec<&'static ResourceKind>> {
    if requested.is_empty() {
        return Ok(api.kinds.iter().collect());
    }

    let mut selected = Vec::new();
    for name in requested {
        let kind = api.kind(name).ok_or_else(|| {
            OpsError::UserError(format!(
                "Invalid resource kind '{}' for service '{}'. Allowed kinds: {}",
                name,
                api.moniker,
                api.kind_names().join(", ")
            ))
        })?;
        if !selected.contains(&kind) {
            selected.push(kind);
        }
    }
    Ok(selected)
}
