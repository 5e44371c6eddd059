use crate::config::Fences;
use viz_toolchain_diagnostics::Span;

/// A fenced block that looks like a directive but has not been decoded yet.
///
/// `payload` always borrows `&input[payload_span.start..payload_span.end]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<'a> {
    /// Opening fence through closing fence.
    pub span: Span,
    /// Text between the fences.
    pub payload: &'a str,
    /// Location of `payload` in the input.
    pub payload_span: Span,
}

/// Everything the scanner found in one pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanOutput<'a> {
    /// Complete candidates in text order.
    pub candidates: Vec<Candidate<'a>>,
    /// Opening fences abandoned because another opening fence came first.
    /// Each span runs from the abandoned fence to the fence that replaced it.
    pub superseded: Vec<Span>,
    /// Closing fences that had no opening fence.
    pub stray_closes: Vec<Span>,
    /// Start of an unterminated trailing block, or of a trailing partial
    /// opening fence. Everything from here on may still become a directive.
    pub pending: Option<usize>,
}

/// Scan `input` for fenced directive candidates.
///
/// Single pass: every byte is examined a bounded number of times, and the
/// first closing fence after the current position is searched for at most
/// once per position reached (the result is cached while it stays ahead).
pub fn scan<'a>(input: &'a str, fences: &Fences) -> ScanOutput<'a> {
    let open = fences.open();
    let close = fences.close();
    let mut out = ScanOutput::default();
    let mut pos = 0usize;
    // Cached `(searched_from, first close at/after searched_from)`.
    let mut close_cache: Option<(usize, Option<usize>)> = None;

    loop {
        let Some(rel) = input[pos..].find(open) else {
            collect_stray_closes(input, pos, input.len(), close, &mut out.stray_closes);
            out.pending = partial_open_suffix(&input[pos..], open).map(|len| input.len() - len);
            break;
        };
        let open_at = pos + rel;
        collect_stray_closes(input, pos, open_at, close, &mut out.stray_closes);

        let body_start = open_at + open.len();
        let close_at = match close_cache {
            Some((from, found)) if from <= body_start && found.is_none_or(|c| c >= body_start) => {
                found
            }
            _ => {
                let found = input[body_start..].find(close).map(|r| body_start + r);
                close_cache = Some((body_start, found));
                found
            }
        };

        let Some(close_at) = close_at else {
            // Still streaming; the caller re-scans once more text arrives.
            tracing::trace!(offset = open_at, "unterminated directive at end of input");
            out.pending = Some(open_at);
            break;
        };

        if let Some(rel_next) = input[body_start..close_at].find(open) {
            let next_open = body_start + rel_next;
            tracing::trace!(
                offset = open_at,
                next = next_open,
                "opening fence superseded before close"
            );
            out.superseded.push(Span::new(open_at, next_open));
            pos = next_open;
            continue;
        }

        let end = close_at + close.len();
        out.candidates.push(Candidate {
            span: Span::new(open_at, end),
            payload: &input[body_start..close_at],
            payload_span: Span::new(body_start, close_at),
        });
        pos = end;
    }

    out
}

fn collect_stray_closes(input: &str, from: usize, to: usize, close: &str, sink: &mut Vec<Span>) {
    sink.extend(
        input[from..to]
            .match_indices(close)
            .map(|(i, m)| Span::new(from + i, from + i + m.len())),
    );
}

/// Length of the longest proper prefix of `open` that `tail` ends with.
fn partial_open_suffix(tail: &str, open: &str) -> Option<usize> {
    (1..open.len())
        .rev()
        .filter(|&n| open.is_char_boundary(n))
        .find(|&n| tail.ends_with(&open[..n]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payloads<'a>(out: &ScanOutput<'a>) -> Vec<&'a str> {
        out.candidates.iter().map(|c| c.payload).collect()
    }

    #[test]
    fn no_fences_no_candidates() {
        let out = scan("just prose, [not] a directive", &Fences::default());
        assert!(out.candidates.is_empty());
        assert!(out.pending.is_none());
        assert!(out.stray_closes.is_empty());
    }

    #[test]
    fn finds_candidates_in_order_with_spans() {
        let input = "a [[VIZ]]{1}[[/VIZ]] b [[VIZ]]{2}[[/VIZ]] c";
        let out = scan(input, &Fences::default());
        assert_eq!(payloads(&out), vec!["{1}", "{2}"]);
        let first = &out.candidates[0];
        assert_eq!(&input[first.span.start..first.span.end], "[[VIZ]]{1}[[/VIZ]]");
        assert_eq!(&input[first.payload_span.start..first.payload_span.end], "{1}");
        assert_eq!(first.span, Span::new(2, 20));
    }

    #[test]
    fn second_open_supersedes_unterminated_first() {
        let input = "[[VIZ]]{broken [[VIZ]]{ok}[[/VIZ]]";
        let out = scan(input, &Fences::default());
        assert_eq!(payloads(&out), vec!["{ok}"]);
        assert_eq!(out.superseded, vec![Span::new(0, 15)]);
    }

    #[test]
    fn unterminated_trailing_block_is_pending() {
        let input = "text [[VIZ]]{\"type\": \"pie\"";
        let out = scan(input, &Fences::default());
        assert!(out.candidates.is_empty());
        assert_eq!(out.pending, Some(5));
    }

    #[test]
    fn trailing_partial_open_fence_is_pending() {
        let out = scan("hello [[VI", &Fences::default());
        assert_eq!(out.pending, Some(6));
        let out = scan("hello [", &Fences::default());
        assert_eq!(out.pending, Some(6));
        let out = scan("hello [x", &Fences::default());
        assert_eq!(out.pending, None);
    }

    #[test]
    fn stray_close_is_reported_and_skipped() {
        let input = "oops [[/VIZ]] then [[VIZ]]{}[[/VIZ]]";
        let out = scan(input, &Fences::default());
        assert_eq!(out.stray_closes, vec![Span::new(5, 13)]);
        assert_eq!(payloads(&out), vec!["{}"]);
    }

    #[test]
    fn many_opens_before_one_close_keeps_only_last() {
        let input = "[[VIZ]]a[[VIZ]]b[[VIZ]]c[[/VIZ]]";
        let out = scan(input, &Fences::default());
        assert_eq!(payloads(&out), vec!["c"]);
        assert_eq!(out.superseded.len(), 2);
    }

    #[test]
    fn custom_fences() {
        let fences = Fences::new("<viz>", "</viz>").unwrap();
        let out = scan("x <viz>{}</viz> y", &fences);
        assert_eq!(payloads(&out), vec!["{}"]);
    }

    #[test]
    fn multibyte_text_keeps_char_boundaries() {
        let input = "€ [[VIZ]]{\"a\":\"ü\"}[[/VIZ]] ✓";
        let out = scan(input, &Fences::default());
        let c = &out.candidates[0];
        assert!(input.is_char_boundary(c.span.start));
        assert!(input.is_char_boundary(c.span.end));
        assert_eq!(c.payload, "{\"a\":\"ü\"}");
    }
}
