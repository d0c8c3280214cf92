//! Token-Oriented Object Notation encoder.
//!
//! Objects become indented `key: value` lines. Arrays declare their length:
//! primitives go inline (`tags[2]: a,b`), arrays of flat objects sharing the
//! same keys become tables (`rows[2]{id,name}:` followed by one
//! comma-separated row per item), and anything else is listed with `- `
//! items. Strings that could be misread are written as JSON strings.

use serde_json::{Map, Value};

const INDENT: &str = "  ";

/// Encodes a JSON value as TOON text.
#[must_use]
pub fn encode(value: &Value) -> String {
    let mut lines = Vec::new();
    match value {
        Value::Object(map) => write_object(&mut lines, map, 0),
        Value::Array(items) => write_array(&mut lines, "", items, 0),
        scalar => lines.push(format_scalar(scalar)),
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn write_object(lines: &mut Vec<String>, map: &Map<String, Value>, depth: usize) {
    let prefix = INDENT.repeat(depth);

    for (key, value) in map {
        let key = format_key(key);
        match value {
            Value::Array(items) => write_array(lines, &key, items, depth),
            Value::Object(inner) => {
                lines.push(format!("{prefix}{key}:"));
                write_object(lines, inner, depth + 1);
            }
            scalar => lines.push(format!("{prefix}{key}: {}", format_scalar(scalar))),
        }
    }
}

fn write_array(lines: &mut Vec<String>, key: &str, items: &[Value], depth: usize) {
    let prefix = INDENT.repeat(depth);
    let len = items.len();

    if items.is_empty() {
        lines.push(format!("{prefix}{key}[0]:"));
        return;
    }

    if items.iter().all(is_primitive) {
        let values: Vec<_> = items.iter().map(format_scalar).collect();
        lines.push(format!("{prefix}{key}[{len}]: {}", values.join(",")));
        return;
    }

    if let Some(fields) = table_fields(items) {
        let header: Vec<_> = fields.iter().map(|field| format_key(field)).collect();
        lines.push(format!("{prefix}{key}[{len}]{{{}}}:", header.join(",")));

        let row_prefix = INDENT.repeat(depth + 1);
        for item in items {
            if let Value::Object(map) = item {
                let row: Vec<_> = fields
                    .iter()
                    .map(|field| map.get(*field).map_or_else(String::new, format_scalar))
                    .collect();
                lines.push(format!("{row_prefix}{}", row.join(",")));
            }
        }
        return;
    }

    lines.push(format!("{prefix}{key}[{len}]:"));
    for item in items {
        write_list_item(lines, item, depth + 1);
    }
}

/// Writes `- item` at `depth`; nested content starts on the dash line.
fn write_list_item(lines: &mut Vec<String>, item: &Value, depth: usize) {
    let prefix = INDENT.repeat(depth);

    let mut nested = Vec::new();
    match item {
        Value::Object(map) => write_object(&mut nested, map, depth + 1),
        Value::Array(inner) => write_array(&mut nested, "", inner, depth + 1),
        scalar => {
            lines.push(format!("{prefix}- {}", format_scalar(scalar)));
            return;
        }
    }

    let inner_prefix = INDENT.repeat(depth + 1);
    let mut nested = nested.into_iter();
    match nested.next() {
        Some(first) => {
            let first = first.strip_prefix(&inner_prefix).unwrap_or(&first);
            lines.push(format!("{prefix}- {first}"));
        }
        None => lines.push(format!("{prefix}-")),
    }
    lines.extend(nested);
}

/// Field names when every item is an object with the same keys, in the
/// same order, holding only primitives.
fn table_fields(items: &[Value]) -> Option<Vec<&str>> {
    let Value::Object(first) = items.first()? else {
        return None;
    };
    if first.is_empty() {
        return None;
    }
    let fields: Vec<&str> = first.keys().map(String::as_str).collect();

    let uniform = items.iter().all(|item| match item {
        Value::Object(map) => {
            map.len() == fields.len()
                && map.keys().zip(&fields).all(|(key, field)| key == field)
                && map.values().all(is_primitive)
        }
        _ => false,
    });

    uniform.then_some(fields)
}

fn is_primitive(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn format_key(key: &str) -> String {
    let mut chars = key.chars();
    let bare = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.'));

    if bare {
        key.to_string()
    } else {
        quote(key)
    }
}

fn format_scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if needs_quotes(s) => quote(s),
        Value::String(s) => s.clone(),
        // callers only pass primitives
        other => quote(&other.to_string()),
    }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.trim() != s
        || s.starts_with('-')
        || matches!(s, "true" | "false" | "null")
        || s.parse::<f64>().is_ok()
        || s
            .chars()
            .any(|c| matches!(c, ',' | ':' | '"' | '\\' | '[' | ']' | '{' | '}') || c.is_control())
}

fn quote(s: &str) -> String {
    // serializing a str cannot fail
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_objects() {
        let value = json!({
            "project": { "name": "demo", "files": 2 },
            "ok": true
        });

        assert_eq!(encode(&value), "project:\n  name: demo\n  files: 2\nok: true\n");
    }

    #[test]
    fn test_primitive_array_inline() {
        let value = json!({ "headers": ["Intro", "Usage"], "empty": [] });
        assert_eq!(encode(&value), "headers[2]: Intro,Usage\nempty[0]:\n");
    }

    #[test]
    fn test_uniform_objects_become_table() {
        let value = json!({
            "commits": [
                { "hash": "abc1234", "author": "alice", "message": "Fix, then test" },
                { "hash": "def5678", "author": "bob", "message": "Init" }
            ]
        });

        assert_eq!(
            encode(&value),
            "commits[2]{hash,author,message}:\n  abc1234,alice,\"Fix, then test\"\n  def5678,bob,Init\n"
        );
    }

    #[test]
    fn test_non_uniform_objects_become_list() {
        let value = json!({
            "items": [
                { "path": "a.py", "chunks": [{ "index": 0 }] },
                "plain"
            ]
        });

        assert_eq!(
            encode(&value),
            "items[2]:\n  - path: a.py\n    chunks[1]{index}:\n      0\n  - plain\n"
        );
    }

    #[test]
    fn test_string_quoting() {
        assert_eq!(format_scalar(&json!("plain text")), "plain text");
        assert_eq!(format_scalar(&json!("")), "\"\"");
        assert_eq!(format_scalar(&json!(" padded")), "\" padded\"");
        assert_eq!(format_scalar(&json!("a\nb")), "\"a\\nb\"");
        assert_eq!(format_scalar(&json!("42")), "\"42\"");
        assert_eq!(format_scalar(&json!("true")), "\"true\"");
        assert_eq!(format_scalar(&json!("key: value")), "\"key: value\"");
        assert_eq!(format_scalar(&json!("- item")), "\"- item\"");
        assert_eq!(format_scalar(&json!(null)), "null");
    }

    #[test]
    fn test_keys_quoted_when_unusual() {
        let value = json!({ "PYTHONPATH": "/srv", "my key": 1 });
        assert_eq!(encode(&value), "PYTHONPATH: /srv\n\"my key\": 1\n");
    }
}
