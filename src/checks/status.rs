//! Interpretation of `status.provisioningStatus`

use super::rules::lookup;
use super::types::{CheckStatus, Evaluation};
use serde_json::Value;

pub const PROVISIONING_STATUS_PATH: &str = "status.provisioningStatus.status";

/// Map a provisioning status to the lattice
///
/// `Succeeded` is success, `Failed` is an error, any other value is a
/// warning and an absent status is skipped.
pub fn provisioning_status(body: &Value) -> CheckStatus {
    match lookup(body, PROVISIONING_STATUS_PATH).and_then(Value::as_str) {
        Some("Succeeded") => CheckStatus::Success,
        Some("Failed") => CheckStatus::Error,
        Some(_) => CheckStatus::Warning,
        None => CheckStatus::Skipped,
    }
}

/// Whether the body carries a provisioning status block
pub fn has_provisioning_status(body: &Value) -> bool {
    lookup(body, "status.provisioningStatus").is_some_and(|v| !v.is_null())
}

/// Evaluation for a resource's provisioning status
pub fn provisioning_evaluation(body: &Value, resource_name: &str) -> Evaluation {
    let status = provisioning_status(body);
    let actual = lookup(body, PROVISIONING_STATUS_PATH)
        .cloned()
        .unwrap_or(Value::Null);
    let mut evaluation = Evaluation::new(status)
        .with_name(resource_name)
        .with_value(PROVISIONING_STATUS_PATH, actual);

    match status {
        CheckStatus::Skipped => {
            evaluation.description = Some("Provisioning status not reported".to_string());
        }
        CheckStatus::Error | CheckStatus::Warning => {
            let message = lookup(body, "status.provisioningStatus.error.message")
                .or_else(|| lookup(body, "status.provisioningStatus.output.message"))
                .and_then(Value::as_str);
            evaluation.description = message.map(String::from);
        }
        CheckStatus::Success => {}
    }
    evaluation
}
