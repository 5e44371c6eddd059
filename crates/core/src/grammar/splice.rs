//! Rebuilding display text around accepted directives.
//!
//! A [`ParseResult`] only records where directives were; these helpers walk
//! the original input alongside it so a caller can interleave prose and
//! rendered widgets. Abandoned directives are ordinary text here.

use super::command::ParsedViz;
use super::parser::ParseResult;

/// One piece of the input, in text order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment<'a> {
    /// Prose to display as-is.
    Text(&'a str),
    /// An accepted directive; its fenced text is replaced by a widget.
    Viz(&'a ParsedViz),
    /// Trailing text that may still become a directive once more input arrives.
    Pending(&'a str),
}

/// Split `input` into text, directive and pending segments.
///
/// `result` must come from parsing this same `input`. Empty text segments
/// are omitted.
pub fn segments<'a>(input: &'a str, result: &'a ParseResult) -> Vec<Segment<'a>> {
    let text_end = result.pending.unwrap_or(input.len()).min(input.len());
    let mut out = Vec::with_capacity(result.directives.len() * 2 + 2);
    let mut cursor = 0;

    for viz in &result.directives {
        let (start, end) = (viz.span.start, viz.span.end);
        if start < cursor || end > text_end {
            continue;
        }
        if let Some(text) = input.get(cursor..start).filter(|t| !t.is_empty()) {
            out.push(Segment::Text(text));
        }
        out.push(Segment::Viz(viz));
        cursor = end;
    }

    if let Some(text) = input.get(cursor..text_end).filter(|t| !t.is_empty()) {
        out.push(Segment::Text(text));
    }
    if let Some(tail) = result.pending.and_then(|p| input.get(p..)) {
        out.push(Segment::Pending(tail));
    }
    out
}

/// Rebuild display text, replacing each accepted directive with `render(viz)`.
///
/// The pending tail is left out; it is shown once a later parse resolves it.
pub fn render_with<F>(input: &str, result: &ParseResult, mut render: F) -> String
where
    F: FnMut(&ParsedViz) -> String,
{
    let mut out = String::with_capacity(input.len());
    for segment in segments(input, result) {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Viz(viz) => out.push_str(&render(viz)),
            Segment::Pending(_) => {}
        }
    }
    out
}

/// The input with accepted directives (and any pending tail) removed.
pub fn strip_directives(input: &str, result: &ParseResult) -> String {
    render_with(input, result, |_| String::new())
}
