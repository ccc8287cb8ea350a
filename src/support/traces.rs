//! Broker trace collection from the diagnostics probe

use crate::error::{OpsError, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Pod serving the broker's OTLP trace export
pub const PROBE_POD_PREFIX: &str = "aio-mq-diagnostics-probe";
pub const PROBE_PORT: u16 = 9800;
pub const PROBE_PATH: &str = "/traces";

/// One trace, ready to be written as `<trace_id>.<root_span_id>.json`
#[derive(Debug, Clone, PartialEq)]
pub struct TraceGroup {
    pub trace_id: String,
    pub root_span_id: String,
    /// `(resource, span)` pairs in payload order
    pub spans: Vec<(Value, Value)>,
}

impl TraceGroup {
    pub fn file_name(&self) -> String {
        format!("{}.{}.json", sanitize(&self.trace_id), sanitize(&self.root_span_id))
    }

    /// Newline-delimited JSON, one `{"resource", "spans": [span]}` per line
    pub fn to_ndjson(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for (resource, span) in &self.spans {
            let line = json!({ "resource": resource, "spans": [span] });
            serde_json::to_writer(&mut out, &line)?;
            out.push(b'\n');
        }
        Ok(out)
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Group an OTLP/JSON `resourceSpans` payload by trace id
///
/// The root span is the one without a parent; a trace whose root was not
/// captured is named after its first span.
pub fn group_traces(payload: &[u8]) -> Result<Vec<TraceGroup>> {
    let document: Value = serde_json::from_slice(payload)
        .map_err(|e| OpsError::InvalidResponse(format!("trace payload is not JSON: {e}")))?;
    let resource_spans = document
        .get("resourceSpans")
        .and_then(Value::as_array)
        .ok_or_else(|| OpsError::InvalidResponse("trace payload has no resourceSpans".to_string()))?;

    let mut groups: BTreeMap<String, TraceGroup> = BTreeMap::new();
    for resource_span in resource_spans {
        let resource = resource_span.get("resource").cloned().unwrap_or(Value::Null);
        let scopes = resource_span
            .get("scopeSpans")
            .or_else(|| resource_span.get("instrumentationLibrarySpans"))
            .and_then(Value::as_array);

        for scope in scopes.into_iter().flatten() {
            let spans = scope.get("spans").and_then(Value::as_array);
            for span in spans.into_iter().flatten() {
                let Some(trace_id) = non_empty_str(span.get("traceId")) else {
                    continue;
                };
                let span_id = non_empty_str(span.get("spanId")).unwrap_or_default();
                let is_root = non_empty_str(span.get("parentSpanId")).is_none();

                let group = groups.entry(trace_id.to_string()).or_insert_with(|| TraceGroup {
                    trace_id: trace_id.to_string(),
                    root_span_id: span_id.to_string(),
                    spans: Vec::new(),
                });
                if is_root {
                    group.root_span_id = span_id.to_string();
                }
                group.spans.push((resource.clone(), span.clone()));
            }
        }
    }
    Ok(groups.into_values().collect())
}
