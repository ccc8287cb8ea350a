//! Property walker producing display items for nested resource bodies

use super::types::{DetailLevel, DisplayItem, Style};
use serde_json::Value;

/// Strings longer than this break onto their own line
const INLINE_LIMIT: usize = 50;

/// Walk a property tree into indented display items
///
/// Scalars render inline as `key: value`; long strings break to their own
/// line; objects recurse with two more columns of padding; lists enumerate
/// their items with ordinals. At `Verbose`, strings holding JSON documents are
/// re-parsed and pretty-printed.
pub fn walk_properties(value: &Value, padding: usize, detail: DetailLevel) -> Vec<DisplayItem> {
    let mut items = Vec::new();
    walk_into(&mut items, value, padding, detail);
    items
}

fn walk_into(items: &mut Vec<DisplayItem>, value: &Value, padding: usize, detail: DetailLevel) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk_entry(items, key, child, padding, detail);
            }
        }
        Value::Array(list) => {
            for (i, child) in list.iter().enumerate() {
                walk_entry(items, &format!("{}.", i + 1), child, padding, detail);
            }
        }
        scalar => items.push(DisplayItem::new(scalar_text(scalar)).padded(padding)),
    }
}

fn walk_entry(
    items: &mut Vec<DisplayItem>,
    key: &str,
    value: &Value,
    padding: usize,
    detail: DetailLevel,
) {
    let label = key.trim_end_matches('.');
    let heading = if key.ends_with('.') {
        key.to_string()
    } else {
        format!("{label}:")
    };

    match value {
        Value::Object(map) if !map.is_empty() => {
            items.push(DisplayItem::new(heading).padded(padding).styled(Style::Emphasis));
            walk_into(items, value, padding + 2, detail);
        }
        Value::Array(list) if !list.is_empty() => {
            items.push(DisplayItem::new(heading).padded(padding).styled(Style::Emphasis));
            walk_into(items, value, padding + 2, detail);
        }
        Value::String(s) => {
            if detail == DetailLevel::Verbose {
                if let Some(pretty) = pretty_json(s) {
                    items.push(DisplayItem::new(heading).padded(padding).styled(Style::Emphasis));
                    items.extend(
                        pretty
                            .lines()
                            .map(|line| DisplayItem::new(line).padded(padding + 2).styled(Style::Dim)),
                    );
                    return;
                }
            }
            if s.chars().count() > INLINE_LIMIT {
                items.push(DisplayItem::new(heading).padded(padding));
                items.push(DisplayItem::new(s.as_str()).padded(padding + 2));
            } else {
                items.push(DisplayItem::new(format!("{heading} {s}")).padded(padding));
            }
        }
        other => {
            items.push(DisplayItem::new(format!("{heading} {}", scalar_text(other))).padded(padding));
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Object(_) => "{}".to_string(),
        Value::Array(_) => "[]".to_string(),
        other => other.to_string(),
    }
}

/// Pretty-print `text` when it holds a JSON object or array
fn pretty_json(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    let parsed: Value = serde_json::from_str(text).ok()?;
    serde_json::to_string_pretty(&parsed).ok()
}
