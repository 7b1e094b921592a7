// =====================================================
// OFFLINE SCRIPT GENERATION
// =====================================================
//
// Values are inlined as escaped literals, never bound. This path exists for
// generating migration scripts; it must not be reused for live queries
// against untrusted input.

use serde_json::{Map, Value};

/// Render one scalar as an inline SQL literal.
pub fn fix_data(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(v) => {
            if *v {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        Value::Number(number) => number.to_string(),
        Value::String(raw) => format!("'{}'", escape_string(raw)),
        other => format!("'{}'", escape_string(&other.to_string())),
    }
}

fn escape_string(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Build one multi-row `INSERT` statement for a batch of records.
///
/// Records may carry heterogeneous key sets; the column list is the union of
/// all keys in first-appearance order, and absent values render as `NULL`.
pub fn insert(table_name: &str, records: &[Map<String, Value>]) -> String {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|existing| existing == key) {
                columns.push(key.clone());
            }
        }
    }

    let rows: Vec<String> = records
        .iter()
        .map(|record| {
            let values: Vec<String> = columns
                .iter()
                .map(|column| {
                    record
                        .get(column)
                        .map(fix_data)
                        .unwrap_or_else(|| "NULL".to_string())
                })
                .collect();
            format!("({})", values.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES \r\n{};",
        table_name,
        columns.join(", "),
        rows.join(",\r\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn single_quote_is_escaped_and_statement_balanced() {
        let sql = insert("t", &[record(&[("name", json!("O'Brien"))])]);
        assert!(sql.contains("O\\'Brien"), "{}", sql);
        assert_eq!(
            sql.matches('(').count(),
            sql.matches(')').count(),
            "{}",
            sql
        );
    }

    #[test]
    fn backslash_is_doubled() {
        let sql = insert("t", &[record(&[("path", json!("C:\\music"))])]);
        assert!(sql.contains("C:\\\\music"));
    }

    #[test]
    fn heterogeneous_records_use_key_union() {
        let sql = insert(
            "t",
            &[
                record(&[("a", json!(1))]),
                record(&[("b", json!("x"))]),
            ],
        );
        assert!(sql.contains("(a, b)"));
        assert!(sql.contains("(1, NULL)"));
        assert!(sql.contains("(NULL, 'x')"));
    }

    #[test]
    fn scalar_rendering() {
        assert_eq!(fix_data(&Value::Null), "NULL");
        assert_eq!(fix_data(&json!(true)), "true");
        assert_eq!(fix_data(&json!(false)), "false");
        assert_eq!(fix_data(&json!(42)), "42");
        assert_eq!(fix_data(&json!(1.5)), "1.5");
        assert_eq!(fix_data(&json!("hi")), "'hi'");
    }

    #[test]
    fn row_count_matches_input() {
        let records: Vec<Map<String, Value>> = (0..3)
            .map(|i| record(&[("n", json!(i))]))
            .collect();
        let sql = insert("t", &records);
        assert_eq!(sql.matches("),\r\n(").count(), 2);
    }
}
