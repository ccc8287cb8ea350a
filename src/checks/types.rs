//! Check engine types

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Namespace key used for cluster-wide targets
pub const ALL_NAMESPACES: &str = "_all_";

/// Roll-up status of an evaluation, target or report
///
/// Ordered for roll-up: `Success < Skipped < Warning < Error`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    #[default]
    Success,
    Skipped,
    Warning,
    Error,
}

impl CheckStatus {
    /// Combine two statuses; the more severe one wins
    pub fn combine(self, other: CheckStatus) -> CheckStatus {
        self.max(other)
    }

    /// Combine many statuses; an empty sequence is `Success`
    pub fn combine_all(statuses: impl IntoIterator<Item = CheckStatus>) -> CheckStatus {
        statuses
            .into_iter()
            .fold(CheckStatus::Success, CheckStatus::combine)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Success => "success",
            CheckStatus::Skipped => "skipped",
            CheckStatus::Warning => "warning",
            CheckStatus::Error => "error",
        }
    }

    /// Emoji-free marker used by the list renderer
    pub fn symbol(&self) -> &'static str {
        match self {
            CheckStatus::Success => "[ok]",
            CheckStatus::Skipped => "[--]",
            CheckStatus::Warning => "[!!]",
            CheckStatus::Error => "[xx]",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much nested property walking is rendered
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    #[default]
    Summary,
    Detail,
    Verbose,
}

/// Advisory styling for display items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Header,
    Emphasis,
    Dim,
    Status(CheckStatus),
}

/// A renderable line attached to a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayItem {
    pub text: String,
    pub padding: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
}

impl DisplayItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            padding: 0,
            style: None,
        }
    }

    pub fn padded(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn styled(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }
}

/// A single `{status, value}` record attached to a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Name of the evaluated resource, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: CheckStatus,
    /// Property path to actual value
    pub value: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Evaluation {
    pub fn new(status: CheckStatus) -> Self {
        Self {
            name: None,
            status,
            value: BTreeMap::new(),
            description: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_value(mut self, path: impl Into<String>, value: Value) -> Self {
        self.value.insert(path.into(), value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Aggregation record for one `(target, namespace)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub conditions: Vec<String>,
    pub evaluations: Vec<Evaluation>,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub displays: Vec<DisplayItem>,
}

impl Target {
    /// Recompute status from evaluations
    pub fn rolled_up_status(&self) -> CheckStatus {
        CheckStatus::combine_all(self.evaluations.iter().map(|e| e.status))
    }
}

/// One evaluator's structured output for one API surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    pub name: String,
    pub description: String,
    pub status: CheckStatus,
    /// Target name to namespace to target; targets in insertion order
    pub targets: IndexMap<String, BTreeMap<String, Target>>,
}

impl CheckReport {
    /// Every evaluation in the report, targets then namespaces in order
    pub fn evaluations(&self) -> impl Iterator<Item = &Evaluation> {
        self.targets
            .values()
            .flat_map(|namespaces| namespaces.values())
            .flat_map(|target| target.evaluations.iter())
    }

    pub fn target(&self, name: &str, namespace: &str) -> Option<&Target> {
        self.targets.get(name).and_then(|ns| ns.get(namespace))
    }
}

/// Composed output of one `check` invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_deployment: Option<Vec<CheckReport>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_deployment: Option<Vec<CheckReport>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl RunResult {
    pub fn reports(&self) -> impl Iterator<Item = &CheckReport> {
        self.pre_deployment
            .iter()
            .flatten()
            .chain(self.post_deployment.iter().flatten())
    }

    /// Combined status over all reports
    pub fn status(&self) -> CheckStatus {
        CheckStatus::combine_all(self.reports().map(|r| r.status))
    }

    /// 1 when at least one report ended in `error`, otherwise 0
    pub fn exit_code(&self) -> i32 {
        if self.reports().any(|r| r.status == CheckStatus::Error) {
            1
        } else {
            0
        }
    }
}
