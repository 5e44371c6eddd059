//! End-to-end tests for the directive parser.
//!
//! Covers: strict decoding of each variant, span tracking, the auto-fix
//! path, abandonment, table row rejection, and reconstruction of the
//! surrounding prose.

mod common;

use common::{chart_at, extract_diag_codes, extract_types, fenced, find_diag, pie_payload};
use viz_toolchain_core::{
    ChartKind, Scalar, Segment, TableRow, VizCommand, decode_payload, parse_str, render_with,
    segments,
};
use viz_toolchain_diagnostics::{Severity, codes};

// ─── Strict decoding ─────────────────────────────────────────────────────────

#[test]
fn chart_table_and_pie_in_one_message() {
    let input = format!(
        "Revenue:\n{}\nHoldings:\n{}\nSplit:\n{}\n",
        fenced(
            r#"{"type":"chart","chartType":"bar","data":{"labels":["Q1","Q2"],"datasets":[{"label":"rev","data":[1.5,2],"color":"teal"}]},"options":{"stacked":true}}"#
        ),
        fenced(
            r#"{"type":"table","headers":["Ticker","Price","Held"],"rows":[{"Ticker":"AAPL","Price":190.5,"Held":true},["MSFT",410,false]],"options":{"sortable":true,"caption":"Positions"}}"#
        ),
        fenced(&pie_payload(&[("stocks", 60.0), ("bonds", 40.0)])),
    );
    let r = parse_str(&input);

    assert_eq!(extract_types(&r), vec!["chart", "table", "pie"]);
    assert!(r.diagnostics.is_empty(), "{:?}", r.diagnostics);
    assert!(r.directives.iter().all(|d| !d.auto_fixed));

    let chart = chart_at(&r, 0);
    assert_eq!(chart.chart_type, ChartKind::Bar);
    assert_eq!(chart.data.datasets[0].color.as_deref(), Some("teal"));
    assert_eq!(chart.options.as_ref().unwrap()["stacked"], true);

    let VizCommand::Table(table) = &r.directives[1].command else {
        panic!("expected table");
    };
    assert_eq!(table.rows.len(), 2);
    assert_eq!(
        table.rows[1].cell(&table.headers, 0),
        Some(&Scalar::Text("MSFT".into()))
    );
    assert_eq!(
        table.rows[0].cell(&table.headers, 2),
        Some(&Scalar::Bool(true))
    );
    assert_eq!(table.options.as_ref().unwrap().caption.as_deref(), Some("Positions"));

    let VizCommand::Pie(pie) = &r.directives[2].command else {
        panic!("expected pie");
    };
    assert_eq!(pie.data.len(), 2);
    assert_eq!(pie.data[1].value, 40.0);
}

#[test]
fn span_equals_fence_boundaries() {
    let block = fenced(&pie_payload(&[("a", 1.0)]));
    let input = format!("intro {block} outro");
    let r = parse_str(&input);
    let d = &r.directives[0];
    assert_eq!(&input[d.start_index()..d.end_index()], block);
}

#[test]
fn chart_type_defaults_to_line() {
    let r = parse_str(&fenced(
        r#"{"type":"chart","data":{"labels":["a"],"datasets":[{"label":"s","data":[1]}]}}"#,
    ));
    assert_eq!(chart_at(&r, 0).chart_type, ChartKind::Line);
}

#[test]
fn keyed_rows_may_omit_headers_and_use_null() {
    let r = parse_str(&fenced(
        r#"{"type":"table","headers":["a","b"],"rows":[{"a":1},{"a":null,"b":"x"}]}"#,
    ));
    let VizCommand::Table(t) = &r.directives[0].command else {
        panic!("expected table");
    };
    assert_eq!(t.rows[0].cell(&t.headers, 1), None);
    assert_eq!(t.rows[1].cell(&t.headers, 0), None);
    assert!(matches!(&t.rows[1], TableRow::Keyed(m) if m.len() == 1));
}

// ─── Recovery ────────────────────────────────────────────────────────────────

#[test]
fn end_to_end_js_style_chart_in_prose() {
    let input = "Here is growth: [[VIZ]]{type:'chart', data:{labels:['Q1','Q2'], datasets:[{label:'rev', data:[10, 20]}]}}[[/VIZ]] nice.";
    let r = parse_str(input);

    assert_eq!(r.directives.len(), 1);
    let d = &r.directives[0];
    assert!(d.auto_fixed);
    assert_eq!(
        d.fix_description.as_deref(),
        Some("converted single-quoted strings to double quotes; quoted bare object keys")
    );
    assert_eq!(d.start_index(), "Here is growth: ".len());
    assert_eq!(d.end_index(), input.len() - " nice.".len());

    let chart = chart_at(&r, 0);
    assert_eq!(chart.data.labels, vec!["Q1", "Q2"]);
    assert_eq!(chart.data.datasets[0].label, "rev");
    assert_eq!(chart.data.datasets[0].data, vec![10.0, 20.0]);

    let shown = render_with(input, &r, |_| "<chart>".into());
    assert_eq!(shown, "Here is growth: <chart> nice.");
    assert_eq!(extract_diag_codes(&r), vec![codes::AUTO_FIXED]);
}

#[test]
fn repaired_command_equals_strict_decode_of_corrected_payload() {
    let sloppy = "{'type': 'pie', 'data': [{'label': 'a', 'value': 3}]}";
    let corrected = sloppy.replace('\'', "\"");
    let r = parse_str(&fenced(sloppy));
    let strict = decode_payload(&corrected).unwrap();
    assert_eq!(r.directives[0].command, strict.command);
    assert!(
        r.directives[0]
            .fix_description
            .as_deref()
            .unwrap()
            .contains("single-quoted")
    );
}

#[test]
fn comments_and_trailing_commas_in_payload() {
    let payload = r#"{
        // the model likes to annotate
        "type": "pie",
        "data": [
            {"label": "a", "value": 1}, /* first */
            {"label": "b", "value": 2},
        ],
    }"#;
    let r = parse_str(&fenced(payload));
    assert_eq!(r.directives.len(), 1);
    assert_eq!(
        r.directives[0].fix_description.as_deref(),
        Some("stripped comments; removed trailing commas")
    );
}

#[test]
fn markdown_code_fence_inside_directive() {
    let payload = format!("\n```json\n{}\n```\n", pie_payload(&[("x", 1.0)]));
    let r = parse_str(&fenced(&payload));
    assert_eq!(
        r.directives[0].fix_description.as_deref(),
        Some("removed code fence wrapper")
    );
}

// ─── Abandonment ─────────────────────────────────────────────────────────────

#[test]
fn unknown_type_keeps_raw_span_as_text() {
    let input = format!("a {} b", fenced(r#"{"type":"sankey","data":[]}"#));
    let r = parse_str(&input);
    assert!(r.directives.is_empty());
    let d = find_diag(&r.diagnostics, codes::UNKNOWN_VIZ_TYPE);
    assert_eq!(d.severity, Severity::Error);
    assert_eq!(render_with(&input, &r, |_| unreachable!()), input);
}

#[test]
fn length_mismatch_and_negative_values_are_always_rejected() {
    for payload in [
        r#"{"type":"chart","data":{"labels":["a","b","c"],"datasets":[{"label":"s","data":[1,2]}]}}"#,
        "{type:'chart', data:{labels:['a'], datasets:[{label:'s', data:[1,2],}]}}",
        r#"{"type":"pie","data":[{"label":"a","value":-1}]}"#,
        "{'type':'pie','data':[{'label':'a','value':'-0.5'}]}",
    ] {
        let r = parse_str(&fenced(payload));
        assert!(r.directives.is_empty(), "accepted {payload}");
        find_diag(&r.diagnostics, codes::INVARIANT_VIOLATION);
    }
}

#[test]
fn one_bad_directive_does_not_affect_its_neighbours() {
    let good = fenced(&pie_payload(&[("a", 1.0)]));
    let input = format!("{good} {} {good}", fenced("{not json at all"));
    let r = parse_str(&input);
    assert_eq!(r.directives.len(), 2);
    assert_eq!(extract_diag_codes(&r), vec![codes::PAYLOAD_SYNTAX]);

    let texts: Vec<&str> = segments(&input, &r)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Text(t) => Some(t),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec![format!(" {} ", fenced("{not json at all"))]);
}

#[test]
fn rejected_positional_rows_are_warned() {
    let r = parse_str(&fenced(
        r#"{"type":"table","headers":["a","b"],"rows":[["x","y"],["only"],["p","q","r"]]}"#,
    ));
    let VizCommand::Table(t) = &r.directives[0].command else {
        panic!("expected table");
    };
    assert_eq!(t.rows.len(), 1);
    let warnings: Vec<_> = r
        .diagnostics
        .iter()
        .filter(|d| d.id == codes::TABLE_ROW_REJECTED)
        .collect();
    assert_eq!(warnings.len(), 2);
    assert_eq!(warnings[1].context.as_ref().unwrap()["actual"], "3");
}

#[test]
fn diagnostics_explain_themselves() {
    let r = parse_str(&fenced(r#"{"type":"pie"}"#));
    let d = find_diag(&r.diagnostics, codes::MISSING_FIELD);
    assert_eq!(d.context.as_ref().unwrap()["field"], "data");
    assert!(d.explain().is_some());
}
