//! JSON → CSV flattening.
//!
//! Nested object keys are joined with `.`, array elements are addressed by
//! index (`items.0.name`). A top-level array becomes one row per element
//! with the union of all columns, in first-seen order; anything else is a
//! single row.

use serde_json::{Map, Value};

/// Flatten one value into `(column, cell)` pairs.
pub fn flatten(value: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    walk(value, String::new(), &mut out);
    out
}

fn walk(value: &Value, prefix: String, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) if !map.is_empty() => walk_object(map, &prefix, out),
        Value::Array(items) if !items.is_empty() => {
            for (i, item) in items.iter().enumerate() {
                walk(item, join(&prefix, &i.to_string()), out);
            }
        }
        leaf => out.push((prefix, cell(leaf))),
    }
}

fn walk_object(map: &Map<String, Value>, prefix: &str, out: &mut Vec<(String, String)>) {
    for (key, child) in map {
        walk(child, join(prefix, key), out);
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn cell(leaf: &Value) -> String {
    match leaf {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(_) => "{}".into(),
        Value::Array(_) => "[]".into(),
        other => other.to_string(),
    }
}

/// Render `doc` as CSV with a header row.
pub fn to_csv(doc: &Value) -> String {
    let rows: Vec<Vec<(String, String)>> = match doc {
        Value::Array(items) => items.iter().map(flatten).collect(),
        other => vec![flatten(other)],
    };

    let mut columns: Vec<String> = Vec::new();
    for row in &rows {
        for (col, _) in row {
            if !columns.contains(col) {
                columns.push(col.clone());
            }
        }
    }

    let mut csv = String::new();
    push_record(&mut csv, columns.iter().map(String::as_str));
    for row in &rows {
        push_record(
            &mut csv,
            columns.iter().map(|col| {
                row.iter()
                    .find(|(c, _)| c == col)
                    .map(|(_, v)| v.as_str())
                    .unwrap_or("")
            }),
        );
    }
    csv
}

fn push_record<'a>(csv: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            csv.push(',');
        }
        csv.push_str(&quote(field));
    }
    csv.push_str("\r\n");
}

/// RFC 4180 quoting.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
