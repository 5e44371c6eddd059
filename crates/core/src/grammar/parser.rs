use super::{
    command::ParsedViz,
    decode::{DecodeError, Decoded, decode_payload},
    diag::{Diagnostic, Span, codes},
    repair::{Abandonment, Recovery, recover},
    scanner::{Candidate, scan},
};
use crate::config::ParserConfig;

/// Shorthand for building a `BTreeMap<String, String>` context from key-value pairs.
macro_rules! ctx {
    ($($k:expr => $v:expr),+ $(,)?) => {
        std::collections::BTreeMap::from([$(($k.into(), $v.into())),+])
    };
}

/// Result of parsing one buffer of model output.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ParseResult {
    /// Accepted directives, in text order.
    pub directives: Vec<ParsedViz>,
    /// Diagnostics (errors, warnings, info) produced during parsing, in text order.
    pub diagnostics: Vec<Diagnostic>,
    /// Offset where a directive may still be forming. Text from here on
    /// should be held back until more input arrives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<usize>,
}

impl ParseResult {
    /// Whether any directive was abandoned.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Number of directives that needed repairs.
    pub fn auto_fixed_count(&self) -> usize {
        self.directives.iter().filter(|d| d.auto_fixed).count()
    }
}

// ─── Public API ─────────────────────────────────────────────────────────────

/// Parse model output with the default fences and repair budget.
pub fn parse_str(input: &str) -> ParseResult {
    parse_with_config(input, &ParserConfig::default())
}

/// Parse model output with an explicit configuration.
///
/// Never fails: malformed directives are reported through diagnostics and
/// left in place as plain text.
pub fn parse_with_config(input: &str, config: &ParserConfig) -> ParseResult {
    let scanned = scan(input, &config.fences);
    let mut directives = Vec::with_capacity(scanned.candidates.len());
    let mut diagnostics = Vec::new();

    for span in &scanned.superseded {
        diagnostics.push(Diagnostic::from_code(
            codes::SUPERSEDED_FENCE,
            format!(
                "opening fence was superseded by another opening fence before `{}`",
                config.fences.close()
            ),
            Some(*span),
        ));
    }
    for span in &scanned.stray_closes {
        diagnostics.push(Diagnostic::from_code(
            codes::STRAY_CLOSE_FENCE,
            "closing fence without a matching opening fence",
            Some(*span),
        ));
    }

    for candidate in &scanned.candidates {
        if let Some(viz) = process_candidate(candidate, config, &mut diagnostics) {
            directives.push(viz);
        }
    }

    if let Some(offset) = scanned.pending {
        diagnostics.push(Diagnostic::from_code(
            codes::PENDING_DIRECTIVE,
            "directive is not yet complete",
            Some(Span::new(offset, input.len())),
        ));
    }

    // Stable: diagnostics at the same offset keep their emission order.
    diagnostics.sort_by_key(|d| d.span.map_or(usize::MAX, |s| s.start));

    ParseResult {
        directives,
        diagnostics,
        pending: scanned.pending,
    }
}

// ─── Candidate processing ───────────────────────────────────────────────────

fn process_candidate(
    candidate: &Candidate<'_>,
    config: &ParserConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<ParsedViz> {
    tracing::trace!(
        start = candidate.span.start,
        end = candidate.span.end,
        "decoding directive"
    );

    let error = match decode_payload(candidate.payload) {
        Ok(decoded) => return Some(accept(candidate, decoded, None, diagnostics)),
        Err(e) => e,
    };

    match recover(candidate.payload, error, config.max_repair_passes) {
        Ok(Recovery { decoded, fixes }) => {
            let description = fixes.join("; ");
            diagnostics.push(
                Diagnostic::from_code(
                    codes::AUTO_FIXED,
                    format!("directive repaired: {description}"),
                    Some(candidate.span),
                )
                .with_context(ctx! {
                    "repairs" => description.clone(),
                    "type" => decoded.command.viz_type().as_str(),
                }),
            );
            Some(accept(candidate, decoded, Some(description), diagnostics))
        }
        Err(Abandonment { error, fixes }) => {
            tracing::debug!(
                start = candidate.span.start,
                repairs = fixes.len(),
                %error,
                "directive abandoned"
            );
            diagnostics.push(abandoned(candidate, &error, &fixes));
            None
        }
    }
}

fn accept(
    candidate: &Candidate<'_>,
    decoded: Decoded,
    fix_description: Option<String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> ParsedViz {
    for row in &decoded.rejected_rows {
        diagnostics.push(
            Diagnostic::from_code(
                codes::TABLE_ROW_REJECTED,
                format!(
                    "table row {} has {} cells for {} headers; row dropped",
                    row.index, row.actual, row.expected
                ),
                Some(candidate.span),
            )
            .with_context(ctx! {
                "row" => row.index.to_string(),
                "expected" => row.expected.to_string(),
                "actual" => row.actual.to_string(),
            }),
        );
    }

    ParsedViz {
        command: decoded.command,
        span: candidate.span,
        auto_fixed: fix_description.is_some(),
        fix_description,
    }
}

fn abandoned(candidate: &Candidate<'_>, error: &DecodeError, fixes: &[String]) -> Diagnostic {
    let span = Some(candidate.span);
    let message = format!("directive left as text: {error}");

    let (code, mut context) = match error {
        DecodeError::Syntax {
            message,
            line,
            column,
            ..
        } => (
            codes::PAYLOAD_SYNTAX,
            ctx! {
                "error" => message.clone(),
                "at" => format!("line {line}, column {column}"),
            },
        ),
        DecodeError::UnknownType { found } => {
            (codes::UNKNOWN_VIZ_TYPE, ctx! { "type" => found.clone() })
        }
        DecodeError::MissingField { path } => {
            (codes::MISSING_FIELD, ctx! { "field" => path.clone() })
        }
        DecodeError::WrongType {
            path,
            expected,
            found,
        } => (
            codes::WRONG_FIELD_TYPE,
            ctx! {
                "field" => path.clone(),
                "expected" => *expected,
                "found" => found.clone(),
            },
        ),
        DecodeError::Invariant { path, .. } => {
            (codes::INVARIANT_VIOLATION, ctx! { "field" => path.clone() })
        }
    };

    if !matches!(error, DecodeError::Syntax { .. } | DecodeError::UnknownType { .. })
        && let Some(tag) = declared_type(candidate.payload)
    {
        context.insert("type".into(), tag);
    }
    if !fixes.is_empty() {
        context.insert("repairs".into(), fixes.join("; "));
    }

    Diagnostic::from_code(code, message, span).with_context(context)
}

/// The `type` tag of a payload that is valid JSON, if it has one.
fn declared_type(payload: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    value.get("type")?.as_str().map(str::to_owned)
}
