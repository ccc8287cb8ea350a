//! Declarative per-kind rules over untyped resource bodies
//!
//! A [`Rule`] is applied to a resource body (the JSON holding `spec` and
//! `status`) and yields one [`RuleOutcome`] per checked property. Outcomes
//! carry the full property path, so `ForEach` items read as
//! `spec.dataPoints[3].dataSource`.

use super::types::{CheckStatus, Evaluation};
use glob::{MatchOptions, Pattern};
use regex::Regex;
use serde_json::Value;

/// A single property rule
#[derive(Debug, Clone)]
pub enum Rule {
    /// Property must be present and non-empty
    Require(&'static str),
    /// Property must be a JSON array (possibly empty)
    IsArray(&'static str),
    /// Property must be a string in the allowed set
    InSet {
        path: &'static str,
        allowed: &'static [&'static str],
    },
    /// Property must be an integer within bounds
    InRange {
        path: &'static str,
        min: Option<i64>,
        max: Option<i64>,
    },
    /// Array property must have at most `max` items; absent counts as zero
    MaxItems { path: &'static str, max: usize },
    /// Array or object property must be empty or absent
    Empty(&'static str),
    /// Exactly one of the paths must be non-empty
    OneOf(&'static [&'static str]),
    /// String property must match the pattern
    Matches {
        path: &'static str,
        pattern: &'static Regex,
    },
    /// Apply rules to each element of an array property
    ForEach {
        path: &'static str,
        rules: Vec<Rule>,
    },
    /// Apply rules only when the property is present
    IfPresent {
        path: &'static str,
        rules: Vec<Rule>,
    },
    /// Apply rules only when the property equals `equals`
    When {
        path: &'static str,
        equals: &'static str,
        rules: Vec<Rule>,
    },
    /// Downgrade failures of the inner rules to warnings
    Warn(Vec<Rule>),
}

/// Result of one property check
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub status: CheckStatus,
    /// `(path, actual)` pairs
    pub values: Vec<(String, Value)>,
    pub message: Option<String>,
}

impl RuleOutcome {
    fn single(status: CheckStatus, path: String, actual: Option<&Value>) -> Self {
        Self {
            status,
            values: vec![(path, actual.cloned().unwrap_or(Value::Null))],
            message: None,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Convert into an evaluation for the named resource
    pub fn into_evaluation(self, resource_name: Option<&str>) -> Evaluation {
        let mut evaluation = Evaluation::new(self.status);
        evaluation.name = resource_name.map(String::from);
        evaluation.value.extend(self.values);
        evaluation.description = self.message;
        evaluation
    }
}

fn join(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{prefix}.{path}")
    }
}

fn pass_fail(ok: bool) -> CheckStatus {
    if ok {
        CheckStatus::Success
    } else {
        CheckStatus::Error
    }
}

impl Rule {
    /// Human-readable condition text for target headers
    pub fn condition(&self) -> String {
        match self {
            Rule::Require(path) => path.to_string(),
            Rule::IsArray(path) => format!("isinstance({path}, list)"),
            Rule::InSet { path, allowed } => format!("{path} in ({})", allowed.join(", ")),
            Rule::InRange { path, min, max } => match (min, max) {
                (Some(lo), Some(hi)) => format!("{lo}<={path}<={hi}"),
                (Some(lo), None) => format!("{path}>={lo}"),
                (None, Some(hi)) => format!("{path}<={hi}"),
                (None, None) => format!("isinstance({path}, int)"),
            },
            Rule::MaxItems { path, max } => format!("len({path})<={max}"),
            Rule::Empty(path) => format!("not {path}"),
            Rule::OneOf(paths) => format!("oneOf({})", paths.join(", ")),
            Rule::Matches { path, pattern } => format!("{path} matches {}", pattern.as_str()),
            Rule::ForEach { path, rules } => {
                let inner: Vec<_> = rules.iter().map(|r| r.condition()).collect();
                format!("{path}[*]: {}", inner.join("; "))
            }
            Rule::IfPresent { path, rules } => {
                let inner: Vec<_> = rules.iter().map(|r| r.condition()).collect();
                format!("if {path}: {}", inner.join("; "))
            }
            Rule::When { path, equals, rules } => {
                let inner: Vec<_> = rules.iter().map(|r| r.condition()).collect();
                format!("if {path}=={equals}: {}", inner.join("; "))
            }
            Rule::Warn(rules) => {
                let inner: Vec<_> = rules.iter().map(|r| r.condition()).collect();
                inner.join("; ")
            }
        }
    }

    /// Apply the rule to `root`; paths in outcomes are prefixed with `prefix`
    pub fn apply(&self, root: &Value, prefix: &str) -> Vec<RuleOutcome> {
        match self {
            Rule::Require(path) => {
                let actual = lookup(root, path);
                let ok = actual.is_some_and(is_non_empty);
                let outcome = RuleOutcome::single(pass_fail(ok), join(prefix, path), actual);
                vec![if ok {
                    outcome
                } else {
                    outcome.with_message(format!("{} is required", join(prefix, path)))
                }]
            }
            Rule::IsArray(path) => {
                let actual = lookup(root, path);
                let ok = actual.is_some_and(Value::is_array);
                let outcome = RuleOutcome::single(pass_fail(ok), join(prefix, path), actual);
                vec![if ok {
                    outcome
                } else {
                    outcome.with_message(format!("{} must be a list", join(prefix, path)))
                }]
            }
            Rule::InSet { path, allowed } => {
                let actual = lookup(root, path);
                let ok = actual
                    .and_then(Value::as_str)
                    .is_some_and(|s| allowed.contains(&s));
                let outcome = RuleOutcome::single(pass_fail(ok), join(prefix, path), actual);
                vec![if ok {
                    outcome
                } else {
                    outcome.with_message(format!(
                        "{} must be one of: {}",
                        join(prefix, path),
                        allowed.join(", ")
                    ))
                }]
            }
            Rule::InRange { path, min, max } => {
                let actual = lookup(root, path);
                let full = join(prefix, path);
                let outcome = match actual.and_then(Value::as_i64) {
                    None => RuleOutcome::single(CheckStatus::Error, full.clone(), actual)
                        .with_message(format!("{full} must be an integer")),
                    Some(n) => {
                        let ok = min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi);
                        let outcome = RuleOutcome::single(pass_fail(ok), full.clone(), actual);
                        if ok {
                            outcome
                        } else {
                            outcome.with_message(format!("{full} is out of range"))
                        }
                    }
                };
                vec![outcome]
            }
            Rule::MaxItems { path, max } => {
                let count = lookup(root, path)
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                let ok = count <= *max;
                let full = format!("len({})", join(prefix, path));
                let outcome = RuleOutcome::single(pass_fail(ok), full, Some(&Value::from(count)));
                vec![if ok {
                    outcome
                } else {
                    outcome.with_message(format!(
                        "{} has {count} items; at most {max} are allowed",
                        join(prefix, path)
                    ))
                }]
            }
            Rule::Empty(path) => {
                let actual = lookup(root, path);
                let ok = !actual.is_some_and(is_non_empty);
                let outcome = RuleOutcome::single(pass_fail(ok), join(prefix, path), actual);
                vec![if ok {
                    outcome
                } else {
                    outcome.with_message(format!("{} is not empty", join(prefix, path)))
                }]
            }
            Rule::OneOf(paths) => {
                let candidates: Vec<(String, Option<&Value>)> = paths
                    .iter()
                    .map(|p| (join(prefix, p), lookup(root, p)))
                    .collect();
                vec![one_of(&candidates)]
            }
            Rule::Matches { path, pattern } => {
                let actual = lookup(root, path);
                let ok = actual
                    .and_then(Value::as_str)
                    .is_some_and(|s| pattern.is_match(s));
                let outcome = RuleOutcome::single(pass_fail(ok), join(prefix, path), actual);
                vec![if ok {
                    outcome
                } else {
                    outcome.with_message(format!(
                        "{} must match {}",
                        join(prefix, path),
                        pattern.as_str()
                    ))
                }]
            }
            Rule::ForEach { path, rules } => {
                let Some(items) = lookup(root, path).and_then(Value::as_array) else {
                    return Vec::new();
                };
                items
                    .iter()
                    .enumerate()
                    .flat_map(|(i, item)| {
                        let item_prefix = format!("{}[{i}]", join(prefix, path));
                        rules
                            .iter()
                            .flat_map(|r| r.apply(item, &item_prefix))
                            .collect::<Vec<_>>()
                    })
                    .collect()
            }
            Rule::IfPresent { path, rules } => {
                if lookup(root, path).is_some_and(|v| !v.is_null()) {
                    rules.iter().flat_map(|r| r.apply(root, prefix)).collect()
                } else {
                    Vec::new()
                }
            }
            Rule::When { path, equals, rules } => {
                if lookup(root, path).and_then(Value::as_str) == Some(*equals) {
                    rules.iter().flat_map(|r| r.apply(root, prefix)).collect()
                } else {
                    Vec::new()
                }
            }
            Rule::Warn(rules) => rules
                .iter()
                .flat_map(|r| r.apply(root, prefix))
                .map(|mut o| {
                    if o.status == CheckStatus::Error {
                        o.status = CheckStatus::Warning;
                    }
                    o
                })
                .collect(),
        }
    }
}

/// Apply a rule set, returning outcomes in rule order
pub fn apply_all(rules: &[Rule], root: &Value) -> Vec<RuleOutcome> {
    rules.iter().flat_map(|r| r.apply(root, "")).collect()
}

/// Condition strings for a rule set
pub fn conditions(rules: &[Rule]) -> Vec<String> {
    rules.iter().map(Rule::condition).collect()
}

/// Exactly one candidate may be non-empty
pub fn one_of(candidates: &[(String, Option<&Value>)]) -> RuleOutcome {
    let names: Vec<&str> = candidates.iter().map(|(n, _)| n.as_str()).collect();
    let set = candidates
        .iter()
        .filter(|(_, v)| v.is_some_and(is_non_empty))
        .count();
    let values = candidates
        .iter()
        .map(|(n, v)| (n.clone(), v.cloned().unwrap_or(Value::Null)))
        .collect();
    let (status, message) = match set {
        1 => (CheckStatus::Success, None),
        0 => (
            CheckStatus::Error,
            Some(format!("one of {} must be specified", names.join(", "))),
        ),
        _ => (
            CheckStatus::Error,
            Some(format!("only one of {} may be specified", names.join(", "))),
        ),
    };
    RuleOutcome {
        status,
        values,
        message,
    }
}

/// Whether a value counts as specified
pub fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Look up a dotted path with optional `[i]` indices, e.g. `spec.items[0].name`
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        let (key, indices) = match segment.find('[') {
            Some(pos) => (&segment[..pos], &segment[pos..]),
            None => (segment, ""),
        };
        if !key.is_empty() {
            current = current.get(key)?;
        }
        for index in indices.split('[').filter(|s| !s.is_empty()) {
            let i: usize = index.trim_end_matches(']').parse().ok()?;
            current = current.get(i)?;
        }
    }
    Some(current)
}

/// Case-insensitive glob match with `*` and `?`; `None` or empty matches all
///
/// Brackets are literal, not character classes.
pub fn name_match(name: &str, pattern: Option<&str>) -> bool {
    let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
        return true;
    };
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    match Pattern::new(&escape_brackets(pattern)) {
        Ok(p) => p.matches_with(name, options),
        Err(_) => name.eq_ignore_ascii_case(pattern),
    }
}

fn escape_brackets(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '[' => escaped.push_str("[[]"),
            ']' => escaped.push_str("[]]"),
            _ => escaped.push(c),
        }
    }
    escaped
}
