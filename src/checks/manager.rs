//! Accumulator for a single evaluation run

use super::types::*;
use crate::error::OpsError;
use indexmap::IndexMap;
use serde_json::Value;

/// Builds one [`CheckReport`]
///
/// Targets are addressed by `(name, namespace)`; a `None` namespace maps to
/// [`ALL_NAMESPACES`]. A target's status only ever moves up the lattice as
/// evaluations are added.
#[derive(Debug, Clone)]
pub struct CheckManager {
    name: String,
    description: String,
    targets: IndexMap<String, std::collections::BTreeMap<String, Target>>,
}

fn ns_key(namespace: Option<&str>) -> String {
    namespace.unwrap_or(ALL_NAMESPACES).to_string()
}

impl CheckManager {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            targets: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn target_mut(&mut self, name: &str, namespace: Option<&str>) -> &mut Target {
        self.targets
            .entry(name.to_string())
            .or_default()
            .entry(ns_key(namespace))
            .or_default()
    }

    /// Add a target; idempotent for the same `(name, namespace)`
    ///
    /// Conditions are merged in order, skipping ones already present.
    pub fn add_target<S: AsRef<str>>(&mut self, name: &str, namespace: Option<&str>, conditions: &[S]) {
        self.target_mut(name, namespace);
        self.add_target_conditions(name, namespace, conditions);
    }

    /// Append conditions to a target, deduplicating
    pub fn add_target_conditions<S: AsRef<str>>(
        &mut self,
        name: &str,
        namespace: Option<&str>,
        conditions: &[S],
    ) {
        let target = self.target_mut(name, namespace);
        for condition in conditions {
            let condition = condition.as_ref();
            if !target.conditions.iter().any(|c| c == condition) {
                target.conditions.push(condition.to_string());
            }
        }
    }

    /// Append an evaluation built from a `{path: actual}` object
    ///
    /// A non-object `value` is stored under the key `"value"`.
    pub fn add_target_eval(
        &mut self,
        name: &str,
        namespace: Option<&str>,
        status: CheckStatus,
        value: Value,
        resource_name: Option<&str>,
    ) {
        let mut evaluation = Evaluation::new(status);
        match value {
            Value::Object(map) => evaluation.value.extend(map),
            Value::Null => {}
            other => {
                evaluation.value.insert("value".to_string(), other);
            }
        }
        if let Some(resource) = resource_name {
            evaluation.name = Some(resource.to_string());
        }
        self.add_evaluation(name, namespace, evaluation);
    }

    /// Append a prepared evaluation and advance the target status
    pub fn add_evaluation(&mut self, name: &str, namespace: Option<&str>, evaluation: Evaluation) {
        let target = self.target_mut(name, namespace);
        target.status = target.status.combine(evaluation.status);
        target.evaluations.push(evaluation);
    }

    /// Record a cluster failure as an evaluation instead of raising it
    pub fn add_failure(&mut self, name: &str, namespace: Option<&str>, what: &str, err: &OpsError) {
        let status = match err {
            OpsError::Forbidden(_) | OpsError::Transient(_) | OpsError::Timeout(_) => CheckStatus::Warning,
            OpsError::KindNotFound(_) => CheckStatus::Skipped,
            _ => CheckStatus::Error,
        };
        tracing::warn!("{}: failed to fetch {}: {}", self.name, what, err);
        self.add_evaluation(
            name,
            namespace,
            Evaluation::new(status)
                .with_value(what, Value::Null)
                .with_description(err.to_string()),
        );
    }

    /// Record a renderable; never affects status
    pub fn add_display(&mut self, name: &str, namespace: Option<&str>, item: DisplayItem) {
        self.target_mut(name, namespace).displays.push(item);
    }

    pub fn add_displays(
        &mut self,
        name: &str,
        namespace: Option<&str>,
        items: impl IntoIterator<Item = DisplayItem>,
    ) {
        self.target_mut(name, namespace).displays.extend(items);
    }

    /// Current status of a target, if it exists
    pub fn target_status(&self, name: &str, namespace: Option<&str>) -> Option<CheckStatus> {
        self.targets
            .get(name)
            .and_then(|ns| ns.get(namespace.unwrap_or(ALL_NAMESPACES)))
            .map(|t| t.status)
    }

    /// Roll-up over every target
    pub fn status(&self) -> CheckStatus {
        CheckStatus::combine_all(
            self.targets
                .values()
                .flat_map(|ns| ns.values())
                .map(|t| t.status),
        )
    }

    /// Structured form; displays are kept only for the list form
    pub fn as_object(&self, as_list: bool) -> CheckReport {
        let mut report = self.clone().into_report();
        if !as_list {
            for target in report.targets.values_mut().flat_map(|ns| ns.values_mut()) {
                target.displays.clear();
            }
        }
        report
    }

    pub fn into_report(self) -> CheckReport {
        let status = self.status();
        CheckReport {
            name: self.name,
            description: self.description,
            status,
            targets: self.targets,
        }
    }
}
