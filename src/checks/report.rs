//! Rendering of a [`RunResult`] as an object or as a styled line list

use super::types::*;
use crate::error::Result;

/// One rendered line of the list form
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedLine {
    pub text: String,
    pub style: Option<Style>,
    pub padding: usize,
}

impl RenderedLine {
    fn new(text: impl Into<String>, style: Option<Style>, padding: usize) -> Self {
        Self {
            text: text.into(),
            style,
            padding,
        }
    }
}

/// Object form: the result serialised verbatim
pub fn render_object(result: &RunResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// List form
///
/// For every report: a header, then each target in insertion order and each
/// namespace in lexical order, with the target's displays first and its
/// conditions and evaluations after them.
pub fn render_list(result: &RunResult) -> Vec<RenderedLine> {
    let mut lines = vec![RenderedLine::new(&result.title, Some(Style::Header), 0)];

    let sections = [
        ("Pre deployment checks", result.pre_deployment.as_ref()),
        ("Post deployment checks", result.post_deployment.as_ref()),
    ];
    for (heading, reports) in sections {
        let Some(reports) = reports else { continue };
        lines.push(RenderedLine::new(heading, Some(Style::Header), 0));
        for report in reports {
            render_report(&mut lines, report);
        }
    }

    if result.cancelled {
        lines.push(RenderedLine::new(
            "Run cancelled; results are incomplete",
            Some(Style::Status(CheckStatus::Warning)),
            0,
        ));
    }
    lines.push(summary_line(result));
    lines
}

fn render_report(lines: &mut Vec<RenderedLine>, report: &CheckReport) {
    lines.push(RenderedLine::new(
        format!("{} {} ({})", report.status.symbol(), report.description, report.name),
        Some(Style::Status(report.status)),
        2,
    ));

    for (target_name, namespaces) in &report.targets {
        lines.push(RenderedLine::new(target_name, Some(Style::Emphasis), 4));
        for (namespace, target) in namespaces {
            if namespace != ALL_NAMESPACES {
                lines.push(RenderedLine::new(
                    format!("namespace: {namespace}"),
                    Some(Style::Emphasis),
                    4,
                ));
            }
            render_target(lines, target);
        }
    }
}

fn render_target(lines: &mut Vec<RenderedLine>, target: &Target) {
    for item in &target.displays {
        lines.push(RenderedLine::new(&item.text, item.style, item.padding));
    }

    if !target.conditions.is_empty() {
        lines.push(RenderedLine::new("Conditions:", Some(Style::Dim), 6));
        for condition in &target.conditions {
            lines.push(RenderedLine::new(format!("- {condition}"), Some(Style::Dim), 8));
        }
    }

    for evaluation in &target.evaluations {
        let values: Vec<String> = evaluation
            .value
            .iter()
            .map(|(path, actual)| format!("{path}={actual}"))
            .collect();
        let subject = match &evaluation.name {
            Some(name) => format!("{name}: "),
            None => String::new(),
        };
        lines.push(RenderedLine::new(
            format!("{} {subject}{}", evaluation.status.symbol(), values.join(", ")),
            Some(Style::Status(evaluation.status)),
            6,
        ));
        if let Some(description) = &evaluation.description {
            lines.push(RenderedLine::new(description, Some(Style::Dim), 8));
        }
    }
}

fn summary_line(result: &RunResult) -> RenderedLine {
    let mut counts = [0usize; 4];
    for report in result.reports() {
        counts[report.status as usize] += 1;
    }
    let status = result.status();
    RenderedLine::new(
        format!(
            "{} success, {} skipped, {} warning, {} error; overall {}",
            counts[0], counts[1], counts[2], counts[3], status
        ),
        Some(Style::Status(status)),
        0,
    )
}
