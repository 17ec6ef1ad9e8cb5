//! CSV rendering for row samples.
//!
//! Fixed policy: comma delimiter, LF line endings, RFC 4180 quoting, NULL
//! as the empty field. The header is always present, so a zero-row table
//! produces a header-only file.

use crate::models::TableSample;
use serde_json::Value as JsonValue;

/// Renders a table sample as CSV text.
pub fn render_sample_csv(sample: &TableSample) -> String {
    let mut output = String::new();

    let header: Vec<String> = sample.columns.iter().map(|c| escape_field(c)).collect();
    output.push_str(&header.join(","));
    output.push('\n');

    for row in &sample.rows {
        let cells: Vec<String> = sample
            .columns
            .iter()
            .map(|column| {
                let value = match row {
                    JsonValue::Object(map) => map.get(column).cloned().unwrap_or(JsonValue::Null),
                    _ => JsonValue::Null,
                };
                value_to_field(&value)
            })
            .collect();
        output.push_str(&cells.join(","));
        output.push('\n');
    }

    output
}

/// Converts a JSON value to a CSV field.
fn value_to_field(value: &JsonValue) -> String {
    let field = match value {
        JsonValue::Null => String::new(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        // Nested values (pg json/array columns) stay JSON-encoded
        JsonValue::Array(_) | JsonValue::Object(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
    };
    escape_field(&field)
}

/// Escapes a field according to RFC 4180: quote when the field contains the
/// delimiter, a quote, or a line break, doubling embedded quotes.
fn escape_field(field: &str) -> String {
    let needs_quoting = field.contains(',')
        || field.contains('"')
        || field.contains('\n')
        || field.contains('\r');

    if needs_quoting {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(rows: Vec<JsonValue>) -> TableSample {
        TableSample {
            table: "users".to_string(),
            schema: "main".to_string(),
            columns: vec!["id".to_string(), "name".to_string()],
            rows,
        }
    }

    #[test]
    fn test_render_header_and_rows() {
        let csv = render_sample_csv(&sample(vec![
            json!({"id": 1, "name": "alice"}),
            json!({"id": 2, "name": "bob"}),
            json!({"id": 3, "name": null}),
        ]));

        assert_eq!(csv, "id,name\n1,alice\n2,bob\n3,\n");
    }

    #[test]
    fn test_render_header_only_for_empty_table() {
        let csv = render_sample_csv(&sample(Vec::new()));
        assert_eq!(csv, "id,name\n");
    }

    #[test]
    fn test_escape_comma_quote_and_newline() {
        let csv = render_sample_csv(&sample(vec![
            json!({"id": 1, "name": "Doe, Jane"}),
            json!({"id": 2, "name": "say \"hi\""}),
            json!({"id": 3, "name": "two\nlines"}),
        ]));

        let lines: Vec<&str> = csv.splitn(2, '\n').collect();
        assert_eq!(lines[0], "id,name");
        assert!(csv.contains("1,\"Doe, Jane\"\n"));
        assert!(csv.contains("2,\"say \"\"hi\"\"\"\n"));
        assert!(csv.contains("3,\"two\nlines\"\n"));
    }

    #[test]
    fn test_missing_column_renders_empty() {
        let csv = render_sample_csv(&sample(vec![json!({"id": 7})]));
        assert_eq!(csv, "id,name\n7,\n");
    }

    #[test]
    fn test_bool_and_nested_values() {
        let mut s = sample(vec![json!({"id": true, "name": {"a": 1}})]);
        s.columns = vec!["id".to_string(), "name".to_string()];
        let csv = render_sample_csv(&s);
        assert_eq!(csv, "id,name\ntrue,\"{\"\"a\"\":1}\"\n");
    }
}
