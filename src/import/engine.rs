use crate::db::Database;
use crate::import::models::{ImportConfig, ImportMapping, ImportRunSummary};
use crate::import::script;
use serde_json::{Map, Value};
use std::collections::HashMap;

// --- Type Coercion ---

fn is_boolean_type(column_type: &str) -> bool {
    let lowered = column_type.to_ascii_lowercase();
    lowered.contains("tinyint(1)") || lowered.contains("boolean") || base_type(&lowered) == "bool"
}

fn is_integer_type(column_type: &str) -> bool {
    let lowered = column_type.to_ascii_lowercase();
    lowered.contains("integer") || lowered.contains("int(") || base_type(&lowered).ends_with("int")
}

fn is_float_type(column_type: &str) -> bool {
    let lowered = column_type.to_ascii_lowercase();
    ["float", "double", "decimal"]
        .iter()
        .any(|token| lowered.contains(token))
}

fn base_type(column_type: &str) -> &str {
    column_type
        .split('(')
        .next()
        .unwrap_or(column_type)
        .trim()
}

/// Coerce one value to the target column's declared SQL type.
///
/// Never fails: values no rule matches pass through unchanged. Empty strings
/// bound for numeric or boolean columns become NULL.
pub fn coerce_value(value: &Value, target_type: &str) -> Value {
    if value.is_null() {
        return Value::Null;
    }

    if is_boolean_type(target_type) {
        return match value {
            Value::Bool(_) => value.clone(),
            Value::Number(number) => Value::Bool(number.as_f64().unwrap_or(0.0) != 0.0),
            Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Value::Null
                } else {
                    Value::Bool(trimmed == "1" || trimmed.eq_ignore_ascii_case("true"))
                }
            }
            _ => value.clone(),
        };
    }

    if is_integer_type(target_type) {
        return match value {
            Value::Number(_) => value.clone(),
            Value::Bool(v) => Value::Number(if *v { 1.into() } else { 0.into() }),
            Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Value::Null
                } else {
                    match trimmed.parse::<i64>() {
                        Ok(parsed) => Value::Number(parsed.into()),
                        Err(_) => value.clone(),
                    }
                }
            }
            _ => value.clone(),
        };
    }

    if is_float_type(target_type) {
        return match value {
            Value::Number(_) => value.clone(),
            Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Value::Null
                } else {
                    match trimmed.parse::<f64>() {
                        Ok(parsed) => serde_json::Number::from_f64(parsed)
                            .map(Value::Number)
                            .unwrap_or_else(|| value.clone()),
                        Err(_) => value.clone(),
                    }
                }
            }
            _ => value.clone(),
        };
    }

    value.clone()
}

/// Rename row keys per `(target, source)` column pairs; keys without a pair
/// keep their source name.
pub fn remap_row(row: &Map<String, Value>, pairs: &[(String, String)]) -> Map<String, Value> {
    let mut renamed = Map::new();
    for (key, value) in row {
        let target_name = pairs
            .iter()
            .find(|(_, source)| source.eq_ignore_ascii_case(key))
            .map(|(target, _)| target.clone())
            .unwrap_or_else(|| key.clone());
        renamed.insert(target_name, value.clone());
    }
    renamed
}

/// Drop columns the target table does not have and coerce the rest to the
/// target column types.
pub fn fix_import_data(
    row: &Map<String, Value>,
    target_types: &HashMap<String, String>,
) -> Map<String, Value> {
    let mut fixed = Map::new();
    for (key, value) in row {
        let target_type = target_types
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, column_type)| column_type.as_str());
        if let Some(target_type) = target_type {
            fixed.insert(key.clone(), coerce_value(value, target_type));
        }
    }
    fixed
}

/// Flush prepared rows in batches of `max_record` through `callback`, one
/// multi-row INSERT per batch. Returns the number of rows flushed.
pub fn flush_batches<F>(
    rows: &[Map<String, Value>],
    source_table: &str,
    target_table: &str,
    max_record: usize,
    callback: &mut F,
) -> usize
where
    F: FnMut(&str, &str, &str),
{
    let max_record = max_record.max(1);
    let mut flushed = 0usize;
    for chunk in rows.chunks(max_record) {
        if chunk.is_empty() {
            continue;
        }
        let sql = script::insert(target_table, chunk);
        callback(&sql, source_table, target_table);
        flushed += chunk.len();
    }
    flushed
}

// --- Table Transfer ---

/// Copy all rows of one table. Rows are read in the source cursor's fetch
/// order, remapped, filtered to the target's column set, coerced and handed
/// to `callback` as INSERT statements in batches. Returns the number of rows
/// transferred.
pub async fn import_data_table<F>(
    source: &Database,
    target: &Database,
    source_table: &str,
    target_table: &str,
    mapping: Option<&ImportMapping>,
    maximum_record: usize,
    callback: &mut F,
) -> Result<usize, String>
where
    F: FnMut(&str, &str, &str),
{
    let max_record = mapping
        .map(|m| m.max_record(maximum_record))
        .unwrap_or(maximum_record)
        .max(1);

    let target_types = target.show_columns(target_table).await?;
    let result = source
        .fetch_all(&format!("SELECT * FROM {}", source_table))
        .await?;

    let pairs = mapping.map(|m| m.column_map()).unwrap_or_default();
    let prepared: Vec<Map<String, Value>> = result
        .rows_as_objects()
        .iter()
        .map(|row| fix_import_data(&remap_row(row, &pairs), &target_types))
        .collect();

    Ok(flush_batches(
        &prepared,
        source_table,
        target_table,
        max_record,
        callback,
    ))
}

async fn run_import<F>(config: &ImportConfig, callback: &mut F) -> Result<ImportRunSummary, String>
where
    F: FnMut(&str, &str, &str),
{
    config.validate()?;

    let source = Database::connect(&config.database_source).await?;
    let target = Database::connect(&config.database_target).await?;

    let mut summary = ImportRunSummary::start(config.table.len());

    for mapping in &config.table {
        let source_table = mapping.normalized_source_table();
        let target_table = mapping.normalized_target_table();

        for sql in &mapping.pre_import_script {
            callback(sql, &source_table, &target_table);
        }

        summary.total_rows += import_data_table(
            &source,
            &target,
            &source_table,
            &target_table,
            Some(mapping),
            config.maximum_record,
            callback,
        )
        .await?;

        for sql in &mapping.post_import_script {
            callback(sql, &source_table, &target_table);
        }

        summary.processed_tables += 1;
    }

    summary.succeed();
    Ok(summary)
}

/// Run a whole configured import. Every pre-script, generated INSERT batch
/// and post-script goes through `callback(sql, source_table, target_table)`.
///
/// A failure on any table aborts the remainder of the run; there is no
/// partial-failure recovery and no retry. Errors are logged and surfaced as
/// a `false` return.
pub async fn import_data<F>(config: &ImportConfig, callback: &mut F) -> bool
where
    F: FnMut(&str, &str, &str),
{
    match run_import(config, callback).await {
        Ok(summary) => {
            log::debug!(
                "Import {} finished: {} tables, {} rows",
                summary.operation_id,
                summary.processed_tables,
                summary.total_rows
            );
            true
        }
        Err(error) => {
            log::error!("Import failed: {}", error);
            false
        }
    }
}

/// Append default 1:1 mappings for tables present in both schemas that the
/// configuration does not mention yet.
pub async fn auto_configure_import_data(
    mut config: ImportConfig,
    source: &Database,
    target: &Database,
) -> Result<ImportConfig, String> {
    let source_tables = source.get_tables().await?;
    let target_tables = target.get_tables().await?;

    for table in source_tables {
        let in_target = target_tables
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(&table));
        if in_target && !config.is_table_configured(&table) {
            config.table.push(ImportMapping::new(&table));
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target_types() -> HashMap<String, String> {
        let mut types = HashMap::new();
        types.insert("active".to_string(), "tinyint(1)".to_string());
        types.insert("play_count".to_string(), "int".to_string());
        types.insert("rating".to_string(), "double".to_string());
        types.insert("title".to_string(), "varchar(255)".to_string());
        types
    }

    #[test]
    fn string_one_coerces_to_boolean_true() {
        assert_eq!(coerce_value(&json!("1"), "tinyint(1)"), json!(true));
        assert_eq!(coerce_value(&json!("0"), "tinyint(1)"), json!(false));
    }

    #[test]
    fn empty_string_coerces_to_null_for_numeric_targets() {
        assert_eq!(coerce_value(&json!(""), "int"), Value::Null);
        assert_eq!(coerce_value(&json!(""), "double"), Value::Null);
        assert_eq!(coerce_value(&json!(""), "tinyint(1)"), Value::Null);
    }

    #[test]
    fn numeric_strings_parse_for_int_and_float_targets() {
        assert_eq!(coerce_value(&json!("42"), "int(11)"), json!(42));
        assert_eq!(coerce_value(&json!("2.5"), "decimal(10,2)"), json!(2.5));
    }

    #[test]
    fn unmatched_type_passes_value_through() {
        assert_eq!(
            coerce_value(&json!("as-is"), "varchar(50)"),
            json!("as-is")
        );
        assert_eq!(coerce_value(&json!("not-a-number"), "int"), json!("not-a-number"));
    }

    #[test]
    fn tinyint_width_one_is_boolean_not_integer() {
        assert!(is_boolean_type("tinyint(1)"));
        assert!(!is_boolean_type("tinyint(4)"));
        assert!(is_integer_type("tinyint(4)"));
    }

    #[test]
    fn remap_renames_per_target_source_pairs() {
        let mut row = Map::new();
        row.insert("id".to_string(), json!(7));
        row.insert("name".to_string(), json!("Encore"));

        let pairs = vec![("song_id".to_string(), "id".to_string())];
        let renamed = remap_row(&row, &pairs);
        assert!(renamed.contains_key("song_id"));
        assert!(renamed.contains_key("name"));
        assert!(!renamed.contains_key("id"));
    }

    #[test]
    fn fix_import_data_drops_unknown_columns() {
        let mut row = Map::new();
        row.insert("title".to_string(), json!("Encore"));
        row.insert("legacy_field".to_string(), json!("x"));

        let fixed = fix_import_data(&row, &target_types());
        assert!(fixed.contains_key("title"));
        assert!(!fixed.contains_key("legacy_field"));
    }

    #[test]
    fn batching_boundary_is_exact() {
        let rows: Vec<Map<String, Value>> = (0..250)
            .map(|i| {
                let mut row = Map::new();
                row.insert("n".to_string(), json!(i));
                row
            })
            .collect();

        let mut statements: Vec<String> = Vec::new();
        let flushed = flush_batches(&rows, "src", "tgt", 100, &mut |sql: &str, _, _| {
            statements.push(sql.to_string())
        });

        assert_eq!(flushed, 250);
        assert_eq!(statements.len(), 3);

        let row_counts: Vec<usize> = statements
            .iter()
            .map(|sql| sql.matches("),\r\n(").count() + 1)
            .collect();
        assert_eq!(row_counts, vec![100, 100, 50]);
        assert_eq!(row_counts.iter().sum::<usize>(), 250);
    }

    #[test]
    fn batch_size_floors_at_one() {
        let rows: Vec<Map<String, Value>> = (0..3)
            .map(|i| {
                let mut row = Map::new();
                row.insert("n".to_string(), json!(i));
                row
            })
            .collect();

        let mut calls = 0usize;
        flush_batches(&rows, "src", "tgt", 0, &mut |_: &str, _, _| calls += 1);
        assert_eq!(calls, 3);
    }

}
