//! Command implementations

pub mod bundle;
pub mod check;

pub use bundle::*;
pub use check::*;

use crate::client::{create_client, KubeAccess, RetryPolicy, Retrying};
use crate::config::AppConfig;
use crate::error::Result;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Connect to the cluster behind the retry and timeout wrapper
pub async fn connect(context: Option<&str>, config: &AppConfig) -> Result<Retrying<KubeAccess>> {
    let client = create_client(context).await?;
    Ok(Retrying::new(
        KubeAccess::new(client),
        RetryPolicy::from_config(config),
    ))
}

/// A token that trips on Ctrl-C
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let tripped = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight work");
            tripped.cancel();
        }
    });
    token
}
