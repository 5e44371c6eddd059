//! Streaming behaviour: the parser is stateless, so callers re-parse the
//! growing buffer. These tests pin what makes that safe.

mod common;

use common::{chart_payload, fenced, pie_payload};
use viz_toolchain_core::{
    Diagnostic, ParseResult, ParsedViz, ParserConfig, VizCommand, parse_str, render_with,
};

fn message() -> String {
    format!(
        "Sure! Here's the breakdown 📊\n{}\nand the trend:\n{}\n\
         an aside [[/VIZ]] then {} done.",
        fenced(&pie_payload(&[("équités", 70.0), ("bonds", 30.0)])),
        fenced(&chart_payload(&["Jan", "Feb", "Mar"], &[1.0, 2.5, 4.0])),
        fenced("{type:'pie', data:[{label:'cash', value:5}]}"),
    )
}

fn show(input: &str, result: &ParseResult) -> String {
    render_with(input, result, |viz| format!("[{}]", viz.command.summary()))
}

fn char_prefixes(s: &str) -> impl Iterator<Item = &str> {
    (0..=s.len())
        .filter(|&i| s.is_char_boundary(i))
        .map(move |i| &s[..i])
}

#[test]
fn parsing_is_idempotent() {
    let input = message();
    assert_eq!(parse_str(&input), parse_str(&input));
}

#[test]
fn appending_text_never_changes_earlier_directives() {
    let full_input = message();
    let full = parse_str(&full_input);
    assert_eq!(full.directives.len(), 3);
    assert_eq!(full.pending, None);

    for prefix in char_prefixes(&full_input) {
        let partial = parse_str(prefix);
        let n = partial.directives.len();
        assert_eq!(
            partial.directives[..],
            full.directives[..n],
            "prefix of {} bytes",
            prefix.len()
        );
    }
}

#[test]
fn displayed_text_only_grows() {
    let full_input = message();
    let mut previous = String::new();
    for prefix in char_prefixes(&full_input) {
        let shown = show(prefix, &parse_str(prefix));
        assert!(
            shown.starts_with(&previous),
            "display regressed at {} bytes:\n{previous:?}\n{shown:?}",
            prefix.len()
        );
        previous = shown;
    }
    assert_eq!(previous, show(&full_input, &parse_str(&full_input)));
}

#[test]
fn raw_fence_text_is_never_displayed_mid_stream() {
    let full_input = message();
    for prefix in char_prefixes(&full_input) {
        let r = parse_str(prefix);
        let shown = show(prefix, &r);
        // The only fence that may show is the stray close in the prose.
        assert!(!shown.contains("[[VIZ]]"), "{shown:?}");
        if let Some(p) = r.pending {
            assert!(p <= prefix.len());
        }
    }
}

#[test]
fn pending_resolves_once_the_close_fence_arrives() {
    let block = fenced(&pie_payload(&[("a", 1.0)]));
    let cut = block.len() - 3;
    let partial = parse_str(&block[..cut]);
    assert_eq!(partial.pending, Some(0));
    assert!(partial.directives.is_empty());

    let done = parse_str(&block);
    assert_eq!(done.pending, None);
    assert_eq!(done.directives.len(), 1);
}

#[test]
fn public_types_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ParseResult>();
    assert_send_sync::<ParsedViz>();
    assert_send_sync::<VizCommand>();
    assert_send_sync::<Diagnostic>();
    assert_send_sync::<ParserConfig>();
}

#[test]
fn concurrent_parses_match_sequential_ones() {
    let inputs: Vec<String> = (0..16)
        .map(|i| {
            format!(
                "stream {i}: {}",
                fenced(&pie_payload(&[("x", f64::from(i)), ("y", 1.0)]))
            )
        })
        .collect();
    let expected: Vec<ParseResult> = inputs.iter().map(|s| parse_str(s)).collect();
    let config = ParserConfig::default();

    let actual: Vec<ParseResult> = std::thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|input| {
                let config = &config;
                scope.spawn(move || viz_toolchain_core::parse_with_config(input, config))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("parser thread panicked"))
            .collect()
    });

    assert_eq!(actual, expected);
}
