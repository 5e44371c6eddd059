use super::command::{
    ChartCommand, ChartData, ChartKind, Dataset, PieCommand, PieOptions, PieSlice, Scalar,
    TableCommand, TableOptions, TableRow, VizCommand, VizType,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

/// Why a payload failed strict decoding.
///
/// The recovery engine dispatches on the variant to choose a repair, so each
/// one carries the location of the problem rather than just a message.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not well-formed JSON.
    #[error("malformed payload: {message}")]
    Syntax {
        /// Parser message, including line and column.
        message: String,
        /// 1-based line of the error within the payload.
        line: usize,
        /// 1-based column of the error within the payload.
        column: usize,
        /// Whether the payload ended before the value was complete.
        eof: bool,
    },

    /// `type` names a variant outside {chart, table, pie}.
    #[error("unknown visualization type `{found}`")]
    UnknownType {
        /// The tag as written.
        found: String,
    },

    /// A required field is absent (or `null`).
    #[error("missing required field `{path}`")]
    MissingField {
        /// Dotted path of the field, e.g. `data.datasets[0].label`.
        path: String,
    },

    /// A field holds the wrong kind of value.
    #[error("field `{path}` must be {expected}, found {found}")]
    WrongType {
        /// Dotted path of the field; `$` for the payload itself.
        path: String,
        /// What was expected, e.g. `"a number"`.
        expected: &'static str,
        /// What was found, e.g. `"string"`.
        found: String,
    },

    /// The payload is well-formed but structurally inconsistent.
    #[error("{path}: {message}")]
    Invariant {
        /// Dotted path of the offending field.
        path: String,
        /// What is wrong.
        message: String,
    },
}

impl DecodeError {
    pub(crate) fn from_json(err: &serde_json::Error) -> Self {
        DecodeError::Syntax {
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
            eof: err.is_eof(),
        }
    }

    /// Dotted path of the field involved, when there is one.
    pub fn path(&self) -> Option<&str> {
        match self {
            DecodeError::MissingField { path }
            | DecodeError::WrongType { path, .. }
            | DecodeError::Invariant { path, .. } => Some(path),
            DecodeError::UnknownType { .. } => Some("type"),
            DecodeError::Syntax { .. } => None,
        }
    }
}

/// A successfully decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// The command.
    pub command: VizCommand,
    /// Positional table rows dropped for having the wrong number of cells.
    pub rejected_rows: Vec<RejectedRow>,
}

/// A positional table row that did not match the header count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectedRow {
    /// Index of the row in the payload's `rows` array.
    pub index: usize,
    /// Number of headers.
    pub expected: usize,
    /// Number of cells the row had.
    pub actual: usize,
}

/// Strictly decode a payload string.
pub fn decode_payload(payload: &str) -> Result<Decoded, DecodeError> {
    let value: Value = serde_json::from_str(payload).map_err(|e| DecodeError::from_json(&e))?;
    decode_value(&value)
}

/// Strictly decode an already-parsed payload.
pub fn decode_value(value: &Value) -> Result<Decoded, DecodeError> {
    let root = Obj::root(value)?;
    let tag = root.required_str("type")?;
    let viz_type = VizType::from_tag(tag).ok_or_else(|| DecodeError::UnknownType {
        found: tag.to_owned(),
    })?;

    let mut rejected_rows = Vec::new();
    let command = match viz_type {
        VizType::Chart => VizCommand::Chart(decode_chart(&root)?),
        VizType::Table => VizCommand::Table(decode_table(&root, &mut rejected_rows)?),
        VizType::Pie => VizCommand::Pie(decode_pie(&root)?),
    };
    Ok(Decoded {
        command,
        rejected_rows,
    })
}

// ─── Variants ───────────────────────────────────────────────────────────────

fn decode_chart(root: &Obj<'_>) -> Result<ChartCommand, DecodeError> {
    let data = root.required_obj("data")?;

    let labels = data
        .required_array("labels")?
        .iter()
        .enumerate()
        .map(|(i, v)| expect_str(v, &index(&data.child_path("labels"), i)).map(str::to_owned))
        .collect::<Result<Vec<_>, _>>()?;

    let datasets_path = data.child_path("datasets");
    let raw_datasets = data.required_array("datasets")?;
    if raw_datasets.is_empty() {
        return Err(invariant(&datasets_path, "a chart needs at least one dataset"));
    }

    let mut datasets = Vec::with_capacity(raw_datasets.len());
    for (i, raw) in raw_datasets.iter().enumerate() {
        let ds = Obj::at(raw, index(&datasets_path, i))?;
        let label = ds.required_str("label")?.to_owned();
        let values_path = ds.child_path("data");
        let values = ds
            .required_array("data")?
            .iter()
            .enumerate()
            .map(|(j, v)| expect_number(v, &index(&values_path, j)))
            .collect::<Result<Vec<_>, _>>()?;
        if values.len() != labels.len() {
            return Err(invariant(
                &values_path,
                format!(
                    "dataset `{label}` has {} values for {} labels",
                    values.len(),
                    labels.len()
                ),
            ));
        }
        datasets.push(Dataset {
            label,
            data: values,
            color: ds.optional_str("color")?.map(str::to_owned),
        });
    }

    let options = root.optional_obj("options")?.map(|o| o.map.clone());

    let chart_type = match root.optional_str("chartType")? {
        None => ChartKind::default(),
        Some(tag) => ChartKind::from_tag(tag).ok_or_else(|| DecodeError::WrongType {
            path: "chartType".into(),
            expected: "one of `line`, `bar`, `scatter`",
            found: format!("`{tag}`"),
        })?,
    };

    Ok(ChartCommand {
        data: ChartData { labels, datasets },
        options,
        chart_type,
    })
}

fn decode_table(
    root: &Obj<'_>,
    rejected: &mut Vec<RejectedRow>,
) -> Result<TableCommand, DecodeError> {
    let headers = root
        .required_array("headers")?
        .iter()
        .enumerate()
        .map(|(i, v)| expect_str(v, &index("headers", i)).map(str::to_owned))
        .collect::<Result<Vec<_>, _>>()?;
    if headers.is_empty() {
        return Err(invariant("headers", "a table needs at least one header"));
    }
    let mut seen = HashSet::with_capacity(headers.len());
    if let Some(dup) = headers.iter().find(|h| !seen.insert(h.as_str())) {
        return Err(invariant("headers", format!("duplicate header `{dup}`")));
    }

    let mut rows = Vec::new();
    for (i, raw) in root.required_array("rows")?.iter().enumerate() {
        let row_path = index("rows", i);
        match raw {
            Value::Object(map) => {
                let mut cells = BTreeMap::new();
                for (key, v) in map {
                    if let Some(cell) = expect_cell(v, &format!("{row_path}.{key}"))? {
                        cells.insert(key.clone(), cell);
                    }
                }
                rows.push(TableRow::Keyed(cells));
            }
            Value::Array(items) => {
                if items.len() != headers.len() {
                    rejected.push(RejectedRow {
                        index: i,
                        expected: headers.len(),
                        actual: items.len(),
                    });
                    continue;
                }
                let cells = items
                    .iter()
                    .enumerate()
                    .map(|(j, v)| expect_cell(v, &index(&row_path, j)))
                    .collect::<Result<Vec<_>, _>>()?;
                rows.push(TableRow::Positional(cells));
            }
            other => return Err(wrong_type(&row_path, "an object or an array", other)),
        }
    }

    let options = match root.optional_obj("options")? {
        None => None,
        Some(o) => Some(TableOptions {
            sortable: o.optional_bool("sortable")?,
            caption: o.optional_str("caption")?.map(str::to_owned),
        }),
    };

    Ok(TableCommand {
        headers,
        rows,
        options,
    })
}

fn decode_pie(root: &Obj<'_>) -> Result<PieCommand, DecodeError> {
    let raw_slices = root.required_array("data")?;
    if raw_slices.is_empty() {
        return Err(invariant("data", "a pie needs at least one slice"));
    }

    let mut data = Vec::with_capacity(raw_slices.len());
    for (i, raw) in raw_slices.iter().enumerate() {
        let slice = Obj::at(raw, index("data", i))?;
        let label = slice.required_str("label")?.to_owned();
        let value_path = slice.child_path("value");
        let value = expect_number(slice.required("value")?, &value_path)?;
        if value < 0.0 {
            return Err(invariant(
                &value_path,
                format!("slice `{label}` has negative value {value}"),
            ));
        }
        data.push(PieSlice {
            label,
            value,
            color: slice.optional_str("color")?.map(str::to_owned),
        });
    }

    let options = match root.optional_obj("options")? {
        None => None,
        Some(o) => Some(PieOptions {
            title: o.optional_str("title")?.map(str::to_owned),
            show_legend: o.optional_bool("showLegend")?,
        }),
    };

    Ok(PieCommand { data, options })
}

// ─── Field access ───────────────────────────────────────────────────────────

/// A JSON object together with its path from the payload root.
struct Obj<'a> {
    map: &'a Map<String, Value>,
    path: String,
}

impl<'a> Obj<'a> {
    fn root(value: &'a Value) -> Result<Self, DecodeError> {
        Self::at(value, String::new())
    }

    fn at(value: &'a Value, path: String) -> Result<Self, DecodeError> {
        match value {
            Value::Object(map) => Ok(Self { map, path }),
            other => {
                let shown = if path.is_empty() { "$" } else { path.as_str() };
                Err(wrong_type(shown, "an object", other))
            }
        }
    }

    fn child_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_owned()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    /// `null` counts as absent.
    fn optional(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn required(&self, key: &str) -> Result<&'a Value, DecodeError> {
        self.optional(key).ok_or_else(|| DecodeError::MissingField {
            path: self.child_path(key),
        })
    }

    fn required_str(&self, key: &str) -> Result<&'a str, DecodeError> {
        expect_str(self.required(key)?, &self.child_path(key))
    }

    fn required_array(&self, key: &str) -> Result<&'a Vec<Value>, DecodeError> {
        match self.required(key)? {
            Value::Array(items) => Ok(items),
            other => Err(wrong_type(&self.child_path(key), "an array", other)),
        }
    }

    fn required_obj(&self, key: &str) -> Result<Obj<'a>, DecodeError> {
        Obj::at(self.required(key)?, self.child_path(key))
    }

    fn optional_obj(&self, key: &str) -> Result<Option<Obj<'a>>, DecodeError> {
        self.optional(key)
            .map(|v| Obj::at(v, self.child_path(key)))
            .transpose()
    }

    fn optional_str(&self, key: &str) -> Result<Option<&'a str>, DecodeError> {
        self.optional(key)
            .map(|v| expect_str(v, &self.child_path(key)))
            .transpose()
    }

    fn optional_bool(&self, key: &str) -> Result<Option<bool>, DecodeError> {
        match self.optional(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(wrong_type(&self.child_path(key), "a boolean", other)),
        }
    }
}

fn expect_str<'a>(value: &'a Value, path: &str) -> Result<&'a str, DecodeError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(wrong_type(path, "a string", other)),
    }
}

fn expect_number(value: &Value, path: &str) -> Result<f64, DecodeError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| wrong_type(path, "a finite number", value)),
        other => Err(wrong_type(path, "a number", other)),
    }
}

/// Table cell: `null` is an absent cell.
fn expect_cell(value: &Value, path: &str) -> Result<Option<Scalar>, DecodeError> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(Scalar::Bool(*b))),
        Value::String(s) => Ok(Some(Scalar::Text(s.clone()))),
        Value::Number(_) => expect_number(value, path).map(|n| Some(Scalar::Number(n))),
        other => Err(wrong_type(path, "a string, number or boolean", other)),
    }
}

fn index(path: &str, i: usize) -> String {
    format!("{path}[{i}]")
}

fn wrong_type(path: &str, expected: &'static str, found: &Value) -> DecodeError {
    DecodeError::WrongType {
        path: path.to_owned(),
        expected,
        found: kind_label(found).to_owned(),
    }
}

fn invariant(path: &str, message: impl Into<String>) -> DecodeError {
    DecodeError::Invariant {
        path: path.to_owned(),
        message: message.into(),
    }
}

/// Human-readable label for a JSON value kind.
pub(crate) fn kind_label(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
