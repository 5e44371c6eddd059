use super::command::{ChartKind, VizType};
use super::decode::{DecodeError, Decoded, decode_value};
use serde_json::{Map, Value};
use std::borrow::Cow;
use viz_toolchain_jsonc_strip::strip_comments;

/// A payload that decoded after one or more repairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovery {
    /// The decoded command.
    pub decoded: Decoded,
    /// Description of every repair that fired, in order.
    pub fixes: Vec<String>,
}

/// A payload that still failed after every applicable repair.
#[derive(Debug, Clone, PartialEq)]
pub struct Abandonment {
    /// The last decode failure.
    pub error: DecodeError,
    /// Repairs that fired without making the payload decodable.
    pub fixes: Vec<String>,
}

/// Text produced by a syntactic repair.
struct Fixed {
    text: String,
    description: String,
}

#[derive(Clone, Copy)]
enum Action {
    /// Rewrites payload text; only used while the payload is not yet JSON.
    Text(fn(&str) -> Option<Fixed>),
    /// Edits the parsed payload in place; only used once it is JSON.
    Tree(fn(&mut Value) -> Option<String>),
}

struct Repair {
    name: &'static str,
    applies: fn(&DecodeError) -> bool,
    action: Action,
}

/// The repair list, in the order repairs are tried within a round.
const REPAIRS: &[Repair] = &[
    Repair {
        name: "code-fence",
        applies: is_syntax,
        action: Action::Text(strip_code_fence),
    },
    Repair {
        name: "comments",
        applies: is_syntax,
        action: Action::Text(remove_comments),
    },
    Repair {
        name: "single-quotes",
        applies: is_syntax,
        action: Action::Text(normalize_single_quotes),
    },
    Repair {
        name: "bare-keys",
        applies: is_syntax,
        action: Action::Text(quote_bare_keys),
    },
    Repair {
        name: "trailing-commas",
        applies: is_syntax,
        action: Action::Text(remove_trailing_commas),
    },
    Repair {
        name: "unterminated",
        applies: is_syntax_eof,
        action: Action::Text(close_unterminated),
    },
    Repair {
        name: "stray-closer",
        applies: is_syntax_mid,
        action: Action::Text(remove_stray_closer),
    },
    Repair {
        name: "trailing-text",
        applies: is_syntax_mid,
        action: Action::Text(drop_trailing_text),
    },
    Repair {
        name: "tag-case",
        applies: is_bad_tag,
        action: Action::Tree(normalize_tag_case),
    },
    Repair {
        name: "hoist-chart-data",
        applies: is_missing_data,
        action: Action::Tree(hoist_chart_data),
    },
    Repair {
        name: "aliases",
        applies: is_missing_field,
        action: Action::Tree(rename_aliases),
    },
    Repair {
        name: "coerce",
        applies: is_wrong_type,
        action: Action::Tree(coerce_scalars),
    },
];

/// Try to make a failed payload decodable.
///
/// Walks the repair list in rounds. A repair runs only if it applies to the
/// current failure and counts only if it changed something; the payload is
/// re-decoded after each one and the first success is returned. Stops when a
/// round changes nothing or `max_passes` repairs have fired. Invariant
/// violations are never repaired.
pub fn recover(
    payload: &str,
    error: DecodeError,
    max_passes: usize,
) -> Result<Recovery, Abandonment> {
    let mut text: Cow<'_, str> = Cow::Borrowed(payload);
    let mut tree: Option<Value> = match error {
        DecodeError::Syntax { .. } => None,
        _ => serde_json::from_str(payload).ok(),
    };
    let mut error = error;
    let mut fixes: Vec<String> = Vec::new();

    'rounds: loop {
        let mut fired = false;
        for repair in REPAIRS {
            if fixes.len() >= max_passes {
                break 'rounds;
            }
            if !(repair.applies)(&error) {
                continue;
            }
            let description = match (repair.action, tree.as_mut()) {
                (Action::Text(f), None) => {
                    let Some(fixed) = f(&text) else { continue };
                    text = Cow::Owned(fixed.text);
                    fixed.description
                }
                (Action::Tree(f), Some(value)) => {
                    let Some(description) = f(value) else { continue };
                    description
                }
                _ => continue,
            };
            tracing::debug!(repair = repair.name, %description, "repair applied");
            fixes.push(description);
            fired = true;

            let parsed = match tree.take() {
                Some(value) => value,
                None => match serde_json::from_str::<Value>(&text) {
                    Ok(value) => value,
                    Err(e) => {
                        error = DecodeError::from_json(&e);
                        continue;
                    }
                },
            };
            let result = decode_value(&parsed);
            tree = Some(parsed);
            match result {
                Ok(decoded) => return Ok(Recovery { decoded, fixes }),
                Err(e) => error = e,
            }
        }
        if !fired {
            break;
        }
    }

    Err(Abandonment { error, fixes })
}

// ─── Applicability ──────────────────────────────────────────────────────────

fn is_syntax(e: &DecodeError) -> bool {
    matches!(e, DecodeError::Syntax { .. })
}

fn is_syntax_eof(e: &DecodeError) -> bool {
    matches!(e, DecodeError::Syntax { eof: true, .. })
}

fn is_syntax_mid(e: &DecodeError) -> bool {
    matches!(e, DecodeError::Syntax { eof: false, .. })
}

fn is_bad_tag(e: &DecodeError) -> bool {
    match e {
        DecodeError::UnknownType { .. } => true,
        DecodeError::WrongType { path, .. } => path == "chartType",
        _ => false,
    }
}

fn is_missing_data(e: &DecodeError) -> bool {
    matches!(e, DecodeError::MissingField { path } if path == "data")
}

fn is_missing_field(e: &DecodeError) -> bool {
    matches!(e, DecodeError::MissingField { .. })
}

fn is_wrong_type(e: &DecodeError) -> bool {
    matches!(e, DecodeError::WrongType { .. })
}

// ─── Text repairs ───────────────────────────────────────────────────────────

/// Where a character sits relative to string literals.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Lex {
    Outside,
    InString(char),
}

/// ```` ```json\n{...}\n``` ```` → `{...}`.
fn strip_code_fence(text: &str) -> Option<Fixed> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix("```")?;
    let body = match rest.find('\n') {
        Some(nl) => {
            let tag = rest[..nl].trim();
            if !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
                return None;
            }
            &rest[nl + 1..]
        }
        None => rest,
    };
    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body).trim();
    Some(Fixed {
        text: body.to_owned(),
        description: "removed code fence wrapper".into(),
    })
}

fn remove_comments(text: &str) -> Option<Fixed> {
    match strip_comments(text) {
        Cow::Owned(stripped) => Some(Fixed {
            text: stripped,
            description: "stripped comments".into(),
        }),
        Cow::Borrowed(_) => None,
    }
}

/// `'Q1'` → `"Q1"`, escaping inner double quotes and unescaping `\'`.
fn normalize_single_quotes(text: &str) -> Option<Fixed> {
    let mut out = String::with_capacity(text.len() + 8);
    let mut state = Lex::Outside;
    let mut changed = false;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match state {
            Lex::Outside => match c {
                '"' => {
                    state = Lex::InString('"');
                    out.push(c);
                }
                '\'' => {
                    state = Lex::InString('\'');
                    changed = true;
                    out.push('"');
                }
                _ => out.push(c),
            },
            Lex::InString('"') => {
                out.push(c);
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else if c == '"' {
                    state = Lex::Outside;
                }
            }
            Lex::InString(_) => match c {
                '\\' => match chars.next() {
                    Some('\'') => out.push('\''),
                    Some(next) => {
                        out.push('\\');
                        out.push(next);
                    }
                    None => out.push('\\'),
                },
                '"' => out.push_str("\\\""),
                '\'' => {
                    state = Lex::Outside;
                    out.push('"');
                }
                _ => out.push(c),
            },
        }
    }

    changed.then(|| Fixed {
        text: out,
        description: "converted single-quoted strings to double quotes".into(),
    })
}

/// `{type: "pie"}` → `{"type": "pie"}`.
fn quote_bare_keys(text: &str) -> Option<Fixed> {
    let mut out = String::with_capacity(text.len() + 16);
    let mut state = Lex::Outside;
    let mut prev_significant: Option<char> = None;
    let mut changed = false;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if let Lex::InString(q) = state {
            out.push(c);
            if c == '\\' {
                if let Some((_, next)) = iter.next() {
                    out.push(next);
                }
            } else if c == q {
                state = Lex::Outside;
                prev_significant = Some(q);
            }
            continue;
        }

        if c == '"' || c == '\'' {
            state = Lex::InString(c);
            out.push(c);
            continue;
        }

        let key_position = matches!(prev_significant, Some('{' | ','));
        if key_position && (c.is_alphabetic() || c == '_' || c == '$') {
            let mut end = i + c.len_utf8();
            while let Some(&(j, n)) = iter.peek() {
                if n.is_alphanumeric() || n == '_' || n == '$' || n == '-' {
                    end = j + n.len_utf8();
                    iter.next();
                } else {
                    break;
                }
            }
            let ident = &text[i..end];
            if text[end..].trim_start().starts_with(':') {
                out.push('"');
                out.push_str(ident);
                out.push('"');
                changed = true;
            } else {
                out.push_str(ident);
            }
            prev_significant = ident.chars().last();
            continue;
        }

        out.push(c);
        if !c.is_whitespace() {
            prev_significant = Some(c);
        }
    }

    changed.then(|| Fixed {
        text: out,
        description: "quoted bare object keys".into(),
    })
}

/// `[1, 2,]` → `[1, 2]`.
fn remove_trailing_commas(text: &str) -> Option<Fixed> {
    let mut out = String::with_capacity(text.len());
    let mut state = Lex::Outside;
    let mut changed = false;
    let mut iter = text.char_indices();

    while let Some((i, c)) = iter.next() {
        match state {
            Lex::InString(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some((_, next)) = iter.next() {
                        out.push(next);
                    }
                } else if c == q {
                    state = Lex::Outside;
                }
            }
            Lex::Outside => {
                if c == ',' {
                    let after = text[i + 1..].trim_start();
                    if after.starts_with('}') || after.starts_with(']') {
                        changed = true;
                        continue;
                    }
                }
                if c == '"' || c == '\'' {
                    state = Lex::InString(c);
                }
                out.push(c);
            }
        }
    }

    changed.then(|| Fixed {
        text: out,
        description: "removed trailing commas".into(),
    })
}

/// Append the closers implied by the nesting still open at end of input.
fn close_unterminated(text: &str) -> Option<Fixed> {
    let mut stack: Vec<char> = Vec::new();
    let mut state = Lex::Outside;
    let mut escaped = false;

    for c in text.chars() {
        match state {
            Lex::InString(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    state = Lex::Outside;
                }
            }
            Lex::Outside => match c {
                '"' | '\'' => state = Lex::InString(c),
                '{' => stack.push('}'),
                '[' => stack.push(']'),
                '}' | ']' => {
                    if stack.last() == Some(&c) {
                        stack.pop();
                    }
                }
                _ => {}
            },
        }
    }

    if stack.is_empty() && state == Lex::Outside {
        return None;
    }

    let mut out = text.trim_end().to_owned();
    let mut closed: Vec<&'static str> = Vec::new();
    if let Lex::InString(q) = state {
        if escaped {
            out.pop();
        }
        out.push(q);
        closed.push("string");
    }
    for closer in stack.iter().rev() {
        out.push(*closer);
        let kind = if *closer == ']' { "array" } else { "object" };
        if !closed.contains(&kind) {
            closed.push(kind);
        }
    }

    Some(Fixed {
        text: out,
        description: format!("closed unterminated {}", join_and(&closed)),
    })
}

/// Byte offset just past the closer that balances a leading `{`.
fn balanced_object_end(text: &str) -> Option<usize> {
    let start = text.len() - text.trim_start().len();
    if !text[start..].starts_with('{') {
        return None;
    }
    let mut depth = 0usize;
    let mut state = Lex::Outside;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        match state {
            Lex::InString(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    state = Lex::Outside;
                }
            }
            Lex::Outside => match c {
                '"' | '\'' => state = Lex::InString(c),
                '{' | '[' => depth += 1,
                '}' | ']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(start + i + 1);
                    }
                }
                _ => {}
            },
        }
    }
    None
}

/// Whether text after a closed object reads as more members of that object:
/// a key, optionally preceded by a comma.
fn continues_object(rest: &str) -> bool {
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(',').map_or(rest, str::trim_start);
    if rest.starts_with('"') || rest.starts_with('\'') {
        return true;
    }
    let key_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
        .unwrap_or(rest.len());
    key_len > 0 && rest[key_len..].trim_start().starts_with(':')
}

/// `{"a":{"b":1}},"c":2}` → `{"a":{"b":1},"c":2}`.
fn remove_stray_closer(text: &str) -> Option<Fixed> {
    let end = balanced_object_end(text)?;
    if !text[..end].ends_with('}') || !continues_object(&text[end..]) {
        return None;
    }
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..end - 1]);
    out.push_str(&text[end..]);
    Some(Fixed {
        text: out,
        description: "removed stray closing brace".into(),
    })
}

/// `{...} and that's the chart` → `{...}`.
///
/// Leaves the payload alone when the leftover looks like further members,
/// so well-formed fields are never dropped.
fn drop_trailing_text(text: &str) -> Option<Fixed> {
    let end = balanced_object_end(text)?;
    let rest = &text[end..];
    if rest.trim().is_empty() || continues_object(rest) {
        return None;
    }
    Some(Fixed {
        text: text[..end].to_owned(),
        description: "dropped trailing text after payload".into(),
    })
}

fn join_and(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => (*one).to_owned(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

// ─── Structural repairs ─────────────────────────────────────────────────────

/// `"Chart"` → `"chart"`, `"BAR"` → `"bar"`, only when the lowercase form is known.
fn normalize_tag_case(root: &mut Value) -> Option<String> {
    let obj = root.as_object_mut()?;
    let mut changes = Vec::new();
    for (key, known) in [
        ("type", (|t: &str| VizType::from_tag(t).is_some()) as fn(&str) -> bool),
        ("chartType", |t: &str| ChartKind::from_tag(t).is_some()),
    ] {
        let Some(Value::String(tag)) = obj.get_mut(key) else {
            continue;
        };
        let lower = tag.trim().to_ascii_lowercase();
        if lower != *tag && known(&lower) {
            changes.push(format!("`{tag}` to `{lower}`"));
            *tag = lower;
        }
    }
    if changes.is_empty() {
        None
    } else {
        Some(format!("normalized tag {}", changes.join(", ")))
    }
}

/// `{type: "chart", labels: [...], datasets: [...]}` → `{type: "chart", data: {labels, datasets}}`.
fn hoist_chart_data(root: &mut Value) -> Option<String> {
    let obj = root.as_object_mut()?;
    if obj.get("type").and_then(Value::as_str) != Some("chart") {
        return None;
    }
    if obj.get("data").is_some_and(|d| !d.is_null()) {
        return None;
    }
    let mut data = Map::new();
    for key in ["labels", "datasets", "series", "categories"] {
        if let Some(v) = obj.remove(key) {
            data.insert(key.to_owned(), v);
        }
    }
    if data.is_empty() {
        return None;
    }
    obj.insert("data".into(), Value::Object(data));
    Some("moved top-level labels and datasets under data".into())
}

const ROOT_ALIASES: &[(&str, &str)] = &[
    ("kind", "type"),
    ("vizType", "type"),
    ("viz_type", "type"),
];
const CHART_ALIASES: &[(&str, &str)] = &[("chart_type", "chartType")];
const CHART_DATA_ALIASES: &[(&str, &str)] = &[("series", "datasets"), ("categories", "labels")];
const DATASET_ALIASES: &[(&str, &str)] = &[
    ("name", "label"),
    ("title", "label"),
    ("values", "data"),
];
const TABLE_ALIASES: &[(&str, &str)] = &[("columns", "headers")];
const PIE_ALIASES: &[(&str, &str)] = &[("slices", "data")];
const SLICE_ALIASES: &[(&str, &str)] = &[("name", "label"), ("amount", "value")];

/// Rename near-synonym keys to their canonical names where the canonical key is absent.
fn rename_aliases(root: &mut Value) -> Option<String> {
    let mut renamed: Vec<(&'static str, &'static str)> = Vec::new();
    let obj = root.as_object_mut()?;
    rename_in(obj, ROOT_ALIASES, &mut renamed);

    match obj.get("type").and_then(Value::as_str) {
        Some("chart") => {
            rename_in(obj, CHART_ALIASES, &mut renamed);
            if let Some(Value::Object(data)) = obj.get_mut("data") {
                rename_in(data, CHART_DATA_ALIASES, &mut renamed);
                if let Some(Value::Array(datasets)) = data.get_mut("datasets") {
                    for ds in datasets.iter_mut().filter_map(Value::as_object_mut) {
                        rename_in(ds, DATASET_ALIASES, &mut renamed);
                    }
                }
            }
        }
        Some("table") => rename_in(obj, TABLE_ALIASES, &mut renamed),
        Some("pie") => {
            rename_in(obj, PIE_ALIASES, &mut renamed);
            if let Some(Value::Array(slices)) = obj.get_mut("data") {
                for slice in slices.iter_mut().filter_map(Value::as_object_mut) {
                    rename_in(slice, SLICE_ALIASES, &mut renamed);
                }
            }
        }
        _ => {}
    }

    if renamed.is_empty() {
        return None;
    }
    let list: Vec<String> = renamed
        .iter()
        .map(|(from, to)| format!("`{from}` to `{to}`"))
        .collect();
    Some(format!("renamed {}", list.join(", ")))
}

fn rename_in(
    obj: &mut Map<String, Value>,
    aliases: &[(&'static str, &'static str)],
    renamed: &mut Vec<(&'static str, &'static str)>,
) {
    for &(alias, canonical) in aliases {
        if obj.get(canonical).is_some_and(|v| !v.is_null()) {
            continue;
        }
        let Some(value) = obj.remove(alias) else {
            continue;
        };
        obj.insert(canonical.to_owned(), value);
        if !renamed.contains(&(alias, canonical)) {
            renamed.push((alias, canonical));
        }
    }
}

/// Numeric strings → numbers where numbers are required, and numbers →
/// strings where labels are required. Nothing else changes type.
fn coerce_scalars(root: &mut Value) -> Option<String> {
    let mut to_number: Vec<String> = Vec::new();
    let mut to_text = 0usize;
    let obj = root.as_object_mut()?;

    match obj.get("type").and_then(Value::as_str) {
        Some("chart") => {
            let Some(Value::Object(data)) = obj.get_mut("data") else {
                return None;
            };
            if let Some(Value::Array(labels)) = data.get_mut("labels") {
                to_text += labels.iter_mut().map(number_to_text).filter(|changed| *changed).count();
            }
            if let Some(Value::Array(datasets)) = data.get_mut("datasets") {
                for (i, ds) in datasets.iter_mut().enumerate() {
                    let Some(ds) = ds.as_object_mut() else {
                        continue;
                    };
                    if let Some(label) = ds.get_mut("label") {
                        to_text += usize::from(number_to_text(label));
                    }
                    if let Some(Value::Array(values)) = ds.get_mut("data") {
                        for (j, v) in values.iter_mut().enumerate() {
                            if text_to_number(v) {
                                to_number.push(format!("data.datasets[{i}].data[{j}]"));
                            }
                        }
                    }
                }
            }
        }
        Some("pie") => {
            if let Some(Value::Array(slices)) = obj.get_mut("data") {
                for (i, slice) in slices.iter_mut().enumerate() {
                    let Some(slice) = slice.as_object_mut() else {
                        continue;
                    };
                    if let Some(label) = slice.get_mut("label") {
                        to_text += usize::from(number_to_text(label));
                    }
                    if let Some(v) = slice.get_mut("value")
                        && text_to_number(v)
                    {
                        to_number.push(format!("data[{i}].value"));
                    }
                }
            }
        }
        _ => return None,
    }

    let mut parts = Vec::new();
    match to_number.as_slice() {
        [] => {}
        [one] => parts.push(format!("coerced string value at {one} to number")),
        many => parts.push(format!("coerced {} string values to numbers", many.len())),
    }
    match to_text {
        0 => {}
        1 => parts.push("converted numeric label to string".to_owned()),
        n => parts.push(format!("converted {n} numeric labels to strings")),
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Replace a cleanly parsing, finite numeric string with the number.
fn text_to_number(v: &mut Value) -> bool {
    let Value::String(s) = v else {
        return false;
    };
    let trimmed = s.trim();
    let number = if let Ok(i) = trimmed.parse::<i64>() {
        serde_json::Number::from(i)
    } else {
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => match serde_json::Number::from_f64(f) {
                Some(n) => n,
                None => return false,
            },
            _ => return false,
        }
    };
    *v = Value::Number(number);
    true
}

fn number_to_text(v: &mut Value) -> bool {
    let Value::Number(n) = v else {
        return false;
    };
    *v = Value::String(n.to_string());
    true
}
