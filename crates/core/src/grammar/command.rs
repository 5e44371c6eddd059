use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use viz_toolchain_diagnostics::Span;

/// The closed set of visualization kinds a directive can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VizType {
    /// Line, bar or scatter chart over labelled datasets.
    Chart,
    /// Table of rows under named headers.
    Table,
    /// Pie breakdown of labelled values.
    Pie,
}

impl VizType {
    /// All variants, in tag order.
    pub const ALL: [VizType; 3] = [VizType::Chart, VizType::Table, VizType::Pie];

    /// Resolve an exact `type` tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }

    /// The wire tag for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            VizType::Chart => "chart",
            VizType::Table => "table",
            VizType::Pie => "pie",
        }
    }
}

impl fmt::Display for VizType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded visualization command, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VizCommand {
    /// `type: "chart"`.
    Chart(ChartCommand),
    /// `type: "table"`.
    Table(TableCommand),
    /// `type: "pie"`.
    Pie(PieCommand),
}

impl VizCommand {
    /// Which variant this command is.
    pub fn viz_type(&self) -> VizType {
        match self {
            VizCommand::Chart(_) => VizType::Chart,
            VizCommand::Table(_) => VizType::Table,
            VizCommand::Pie(_) => VizType::Pie,
        }
    }

    /// Short human-readable description, e.g. `"bar chart: 4 labels, 2 datasets"`.
    pub fn summary(&self) -> String {
        match self {
            VizCommand::Chart(c) => format!(
                "{} chart: {}, {}",
                c.chart_type,
                plural(c.data.labels.len(), "label"),
                plural(c.data.datasets.len(), "dataset"),
            ),
            VizCommand::Table(t) => format!(
                "table: {}, {}",
                plural(t.headers.len(), "column"),
                plural(t.rows.len(), "row"),
            ),
            VizCommand::Pie(p) => format!("pie: {}", plural(p.data.len(), "slice")),
        }
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

// ─── Chart ──────────────────────────────────────────────────────────────────

/// Chart directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartCommand {
    /// Labels and datasets.
    pub data: ChartData,
    /// Renderer options (display flags, axis configuration), passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Map<String, serde_json::Value>>,
    /// Chart style; `line` when omitted.
    #[serde(default, rename = "chartType")]
    pub chart_type: ChartKind,
}

/// Chart style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Connected points (default).
    #[default]
    Line,
    /// Vertical bars.
    Bar,
    /// Unconnected points.
    Scatter,
}

impl ChartKind {
    pub(crate) fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "line" => Some(ChartKind::Line),
            "bar" => Some(ChartKind::Bar),
            "scatter" => Some(ChartKind::Scatter),
            _ => None,
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Scatter => "scatter",
        })
    }
}

/// Chart payload. Every dataset has exactly one value per label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    /// X-axis labels, in order.
    pub labels: Vec<String>,
    /// One or more named series.
    pub datasets: Vec<Dataset>,
}

/// A named series of values aligned positionally to the chart labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Series name.
    pub label: String,
    /// Values, one per chart label.
    pub data: Vec<f64>,
    /// Optional color hint for the renderer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

// ─── Table ──────────────────────────────────────────────────────────────────

/// Table directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCommand {
    /// Column names, in display order. Non-empty, no duplicates.
    pub headers: Vec<String>,
    /// Rows in display order.
    pub rows: Vec<TableRow>,
    /// Optional table options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<TableOptions>,
}

/// One table row, keyed by header name or given positionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableRow {
    /// `{"Name": "AAPL", "Price": 190.5}`; headers without a key render as absent.
    Keyed(BTreeMap<String, Scalar>),
    /// `["AAPL", 190.5]`; exactly one cell per header, `null` cells are absent.
    Positional(Vec<Option<Scalar>>),
}

impl TableRow {
    /// The cell under column `col`, or `None` when absent.
    pub fn cell<'a>(&'a self, headers: &[String], col: usize) -> Option<&'a Scalar> {
        match self {
            TableRow::Keyed(map) => headers.get(col).and_then(|h| map.get(h)),
            TableRow::Positional(cells) => cells.get(col).and_then(Option::as_ref),
        }
    }
}

/// A table cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// `true` / `false`.
    Bool(bool),
    /// Any JSON number.
    Number(f64),
    /// Any JSON string.
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// Table options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableOptions {
    /// Whether the renderer should allow sorting by column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortable: Option<bool>,
    /// Caption shown with the table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

// ─── Pie ────────────────────────────────────────────────────────────────────

/// Pie directive. `data` is non-empty and every value is `>= 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieCommand {
    /// Slices in display order.
    pub data: Vec<PieSlice>,
    /// Optional pie options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<PieOptions>,
}

/// One labelled pie value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieSlice {
    /// Slice name.
    pub label: String,
    /// Non-negative magnitude.
    pub value: f64,
    /// Optional color hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Pie options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PieOptions {
    /// Title shown above the pie.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Whether to draw a legend.
    #[serde(
        default,
        rename = "showLegend",
        skip_serializing_if = "Option::is_none"
    )]
    pub show_legend: Option<bool>,
}

// ─── ParsedViz ──────────────────────────────────────────────────────────────

/// One accepted directive and the source span it owned.
///
/// Serializes the span as `startIndex`/`endIndex`. Both are UTF-8 byte
/// offsets into the source text, not character counts; they always fall on
/// char boundaries, so `&input[start..end]` is the fenced text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ParsedVizRepr", from = "ParsedVizRepr")]
pub struct ParsedViz {
    /// The decoded command.
    pub command: VizCommand,
    /// Half-open byte range covering the opening fence through the closing fence.
    pub span: Span,
    /// Whether the payload needed repairs before it decoded.
    pub auto_fixed: bool,
    /// The repairs that fired, in order; present only when `auto_fixed`.
    pub fix_description: Option<String>,
}

/// Wire shape of [`ParsedViz`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParsedVizRepr {
    command: VizCommand,
    start_index: usize,
    end_index: usize,
    auto_fixed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fix_description: Option<String>,
}

impl From<ParsedViz> for ParsedVizRepr {
    fn from(viz: ParsedViz) -> Self {
        Self {
            command: viz.command,
            start_index: viz.span.start,
            end_index: viz.span.end,
            auto_fixed: viz.auto_fixed,
            fix_description: viz.fix_description,
        }
    }
}

impl From<ParsedVizRepr> for ParsedViz {
    fn from(repr: ParsedVizRepr) -> Self {
        Self {
            command: repr.command,
            span: Span {
                start: repr.start_index,
                end: repr.end_index.max(repr.start_index),
            },
            auto_fixed: repr.auto_fixed,
            fix_description: repr.fix_description,
        }
    }
}

impl ParsedViz {
    /// Start offset (inclusive) of the directive in the source text.
    pub fn start_index(&self) -> usize {
        self.span.start
    }

    /// End offset (exclusive) of the directive in the source text.
    pub fn end_index(&self) -> usize {
        self.span.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_lookup_is_exact() {
        assert_eq!(VizType::from_tag("pie"), Some(VizType::Pie));
        assert_eq!(VizType::from_tag("Pie"), None);
        assert_eq!(VizType::from_tag("heatmap"), None);
    }

    #[test]
    fn summaries() {
        let chart = VizCommand::Chart(ChartCommand {
            data: ChartData {
                labels: vec!["Q1".into(), "Q2".into()],
                datasets: vec![Dataset {
                    label: "rev".into(),
                    data: vec![1.0, 2.0],
                    color: None,
                }],
            },
            options: None,
            chart_type: ChartKind::Bar,
        });
        assert_eq!(chart.summary(), "bar chart: 2 labels, 1 dataset");

        let pie = VizCommand::Pie(PieCommand {
            data: vec![PieSlice {
                label: "a".into(),
                value: 1.0,
                color: None,
            }],
            options: None,
        });
        assert_eq!(pie.summary(), "pie: 1 slice");
    }

    #[test]
    fn cell_lookup_handles_both_row_forms() {
        let headers = vec!["Name".to_string(), "Price".to_string()];
        let keyed = TableRow::Keyed(BTreeMap::from([(
            "Name".to_string(),
            Scalar::Text("AAPL".into()),
        )]));
        assert_eq!(keyed.cell(&headers, 0), Some(&Scalar::Text("AAPL".into())));
        assert_eq!(keyed.cell(&headers, 1), None);

        let positional = TableRow::Positional(vec![None, Some(Scalar::Number(3.5))]);
        assert_eq!(positional.cell(&headers, 0), None);
        assert_eq!(positional.cell(&headers, 1), Some(&Scalar::Number(3.5)));
        assert_eq!(positional.cell(&headers, 7), None);
    }

    #[test]
    fn serializes_with_type_tag_and_camel_case() {
        let viz = ParsedViz {
            command: VizCommand::Pie(PieCommand {
                data: vec![PieSlice {
                    label: "x".into(),
                    value: 2.0,
                    color: None,
                }],
                options: Some(PieOptions {
                    title: None,
                    show_legend: Some(true),
                }),
            }),
            span: Span::new(3, 40),
            auto_fixed: false,
            fix_description: None,
        };
        let json = serde_json::to_value(&viz).unwrap();
        assert_eq!(json["command"]["type"], "pie");
        assert_eq!(json["command"]["options"]["showLegend"], true);
        assert_eq!(json["autoFixed"], false);
        assert!(json.get("fixDescription").is_none());
        assert_eq!(json["startIndex"], 3);
        assert_eq!(json["endIndex"], 40);
        assert!(json.get("span").is_none());
        let back: ParsedViz = serde_json::from_value(json).unwrap();
        assert_eq!(back, viz);
    }
}
