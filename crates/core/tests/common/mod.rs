//! Shared test helpers for `viz_toolchain_core` integration tests.

#![allow(unreachable_pub)]

use viz_toolchain_core::{ParseResult, VizCommand};
use viz_toolchain_diagnostics::{Diagnostic, Severity};

// ─── Payload builders ────────────────────────────────────────────────────────

/// Wrap a payload in the default fences.
#[allow(dead_code)]
pub fn fenced(payload: &str) -> String {
    format!("[[VIZ]]{payload}[[/VIZ]]")
}

/// A minimal well-formed pie payload with one slice per `(label, value)`.
#[allow(dead_code)]
pub fn pie_payload(slices: &[(&str, f64)]) -> String {
    let data: Vec<serde_json::Value> = slices
        .iter()
        .map(|(label, value)| serde_json::json!({ "label": label, "value": value }))
        .collect();
    serde_json::json!({ "type": "pie", "data": data }).to_string()
}

/// A minimal well-formed line chart payload with a single dataset.
#[allow(dead_code)]
pub fn chart_payload(labels: &[&str], values: &[f64]) -> String {
    serde_json::json!({
        "type": "chart",
        "data": {
            "labels": labels,
            "datasets": [{ "label": "series", "data": values }],
        },
    })
    .to_string()
}

// ─── Parse-result helpers ────────────────────────────────────────────────────

/// Collect diagnostic codes (in order).
#[allow(dead_code)]
pub fn extract_diag_codes(result: &ParseResult) -> Vec<String> {
    result.diagnostics.iter().map(|d| d.id.to_string()).collect()
}

/// Find the first diagnostic with the given code, panicking if absent.
#[allow(dead_code)]
pub fn find_diag<'a>(issues: &'a [Diagnostic], code: &str) -> &'a Diagnostic {
    issues
        .iter()
        .find(|d| d.id == code)
        .unwrap_or_else(|| panic!("expected diagnostic {code}, got {issues:?}"))
}

/// Collect `type` tags of accepted directives (in order).
#[allow(dead_code)]
pub fn extract_types(result: &ParseResult) -> Vec<&'static str> {
    result
        .directives
        .iter()
        .map(|d| d.command.viz_type().as_str())
        .collect()
}

/// Count diagnostics of the given severity.
#[allow(dead_code)]
pub fn count_severity(result: &ParseResult, severity: Severity) -> usize {
    result
        .diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .count()
}

/// Unwrap the chart command of directive `idx`, panicking on any other variant.
#[allow(dead_code)]
pub fn chart_at(result: &ParseResult, idx: usize) -> &viz_toolchain_core::ChartCommand {
    match &result.directives[idx].command {
        VizCommand::Chart(c) => c,
        other => panic!("expected chart at {idx}, got {other:?}"),
    }
}
