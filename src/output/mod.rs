//! Terminal output for opsdiag

use crate::checks::report::RenderedLine;
use crate::checks::{CheckStatus, Style};
use crate::support::BundleSummary;
use owo_colors::{OwoColorize, Stream};

/// Format rendered check lines, indenting each by its padding
pub fn format_lines(lines: &[RenderedLine]) -> String {
    let mut output = String::new();
    for line in lines {
        output.push_str(&" ".repeat(line.padding));
        output.push_str(&style_text(&line.text, line.style));
        output.push('\n');
    }
    output.trim_end().to_string()
}

/// Apply an advisory style; plain text when stdout does not take colors
pub fn style_text(text: &str, style: Option<Style>) -> String {
    match style {
        Some(Style::Header) => text.if_supports_color(Stream::Stdout, |t| t.bold()).to_string(),
        Some(Style::Emphasis) => text.if_supports_color(Stream::Stdout, |t| t.cyan()).to_string(),
        Some(Style::Dim) => text.if_supports_color(Stream::Stdout, |t| t.dimmed()).to_string(),
        Some(Style::Status(status)) => colorize_status(text, status),
        None => text.to_string(),
    }
}

/// Colorize text by check status
pub fn colorize_status(text: &str, status: CheckStatus) -> String {
    match status {
        CheckStatus::Success => text.if_supports_color(Stream::Stdout, |t| t.green()).to_string(),
        CheckStatus::Skipped => text.if_supports_color(Stream::Stdout, |t| t.blue()).to_string(),
        CheckStatus::Warning => text.if_supports_color(Stream::Stdout, |t| t.yellow()).to_string(),
        CheckStatus::Error => text.if_supports_color(Stream::Stdout, |t| t.red()).to_string(),
    }
}

/// Human summary of a bundle run
pub fn format_bundle_summary(summary: &BundleSummary) -> String {
    let mut output = String::new();
    match &summary.path {
        Some(path) if summary.cancelled => output.push_str(&format!(
            "{} {}\n",
            colorize_status("Partial bundle kept at", CheckStatus::Warning),
            path.display()
        )),
        Some(path) => output.push_str(&format!(
            "{} {}\n",
            colorize_status("Support bundle written to", CheckStatus::Success),
            path.display()
        )),
        None => output.push_str(&format!(
            "{}\n",
            colorize_status("Bundle discarded", CheckStatus::Error)
        )),
    }
    output.push_str(&format!("  files: {}\n", summary.files));

    if !summary.skipped.is_empty() {
        let skipped: Vec<_> = summary.skipped.iter().map(|s| s.moniker()).collect();
        output.push_str(&format!(
            "  {} {}\n",
            style_text("not deployed:", Some(Style::Dim)),
            skipped.join(", ")
        ));
    }
    if !summary.errors.is_empty() {
        let heading = format!("{} collection errors (see .error files):", summary.errors.len());
        output.push_str(&format!("  {}\n", colorize_status(&heading, CheckStatus::Warning)));
        for error in &summary.errors {
            output.push_str(&format!("    - {error}\n"));
        }
    }
    output.trim_end().to_string()
}
