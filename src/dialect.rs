// =====================================================
// DIALECT-SPECIFIC DDL / DML GENERATION
// =====================================================
//
// One shared generator parameterized by a small DialectRules value instead
// of one generator per engine. Output is plain SQL text intended for
// migration scripts; nothing here executes queries.

use crate::db_types::{ColumnDefinition, DatabaseType, TableDefinition};
use serde_json::Value;
use std::collections::HashMap;

/// Unrecognized SQLite column types degrade to this type instead of failing.
pub const SQLITE_FALLBACK_TYPE: &str = "VARCHAR(255)";

/// Column types SQLite rendering keeps as-is; anything else falls back to
/// [`SQLITE_FALLBACK_TYPE`].
const SQLITE_KNOWN_TYPES: &[&str] = &[
    "timestamp", "tinyint", "bigint", "text", "varchar", "char", "real",
    "float", "integer", "int", "datetime", "date", "double", "boolean",
    "blob", "numeric", "decimal", "nvarchar",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoIncrementStrategy {
    /// Follow-up `ALTER TABLE … MODIFY … AUTO_INCREMENT` statement (MySQL).
    AlterModify,
    /// `SERIAL`/`BIGSERIAL` type substitution (PostgreSQL).
    SerialType,
    /// Inline `INTEGER PRIMARY KEY AUTOINCREMENT` (SQLite).
    InlineRowid,
}

/// The per-engine knobs of the shared generator.
#[derive(Debug, Clone)]
pub struct DialectRules {
    pub database_type: DatabaseType,
    pub quote: char,
    pub auto_increment: AutoIncrementStrategy,
    /// MySQL also single-quotes int/float/double default values.
    pub quotes_numeric_defaults: bool,
    /// Primary keys rendered inline as `PRIMARY KEY (…)` before the closing
    /// parenthesis instead of a follow-up `ALTER TABLE`.
    pub inline_primary_key: bool,
    /// `ENGINE=… DEFAULT CHARSET=…` table options.
    pub supports_table_options: bool,
    pub fallback_type: Option<&'static str>,
}

impl DialectRules {
    pub fn for_database(database_type: DatabaseType) -> Self {
        match database_type {
            DatabaseType::MySQL => Self {
                database_type,
                quote: '`',
                auto_increment: AutoIncrementStrategy::AlterModify,
                quotes_numeric_defaults: true,
                inline_primary_key: false,
                supports_table_options: true,
                fallback_type: None,
            },
            DatabaseType::PostgreSQL => Self {
                database_type,
                quote: '"',
                auto_increment: AutoIncrementStrategy::SerialType,
                quotes_numeric_defaults: false,
                inline_primary_key: false,
                supports_table_options: false,
                fallback_type: None,
            },
            DatabaseType::SQLite => Self {
                database_type,
                quote: '"',
                auto_increment: AutoIncrementStrategy::InlineRowid,
                quotes_numeric_defaults: false,
                inline_primary_key: true,
                supports_table_options: false,
                fallback_type: Some(SQLITE_FALLBACK_TYPE),
            },
        }
    }

    pub fn quote_identifier(&self, name: &str) -> String {
        let doubled = name.replace(self.quote, &format!("{}{}", self.quote, self.quote));
        format!("{}{}{}", self.quote, doubled, self.quote)
    }

    /// SQL string escaping for inline literals: backslashes doubled, single
    /// quotes doubled.
    pub fn escape_value(&self, raw: &str) -> String {
        raw.replace('\\', "\\\\").replace('\'', "''")
    }

    fn qualified_table_name(&self, table: &TableDefinition) -> String {
        match &table.schema {
            Some(schema) if !schema.is_empty() => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(&table.name)
            ),
            _ => self.quote_identifier(&table.name),
        }
    }

    /// Effective rendered type for one column.
    fn resolve_column_type(&self, column: &ColumnDefinition) -> String {
        if column.auto_increment {
            match self.auto_increment {
                AutoIncrementStrategy::SerialType => {
                    return if column.column_type.to_ascii_lowercase().contains("big") {
                        "BIGSERIAL".to_string()
                    } else {
                        "SERIAL".to_string()
                    };
                }
                AutoIncrementStrategy::InlineRowid => {
                    return "INTEGER".to_string();
                }
                AutoIncrementStrategy::AlterModify => {}
            }
        }

        if let Some(fallback) = self.fallback_type {
            let base = column.base_type().to_ascii_lowercase();
            if !SQLITE_KNOWN_TYPES.iter().any(|known| base == *known) {
                return fallback.to_string();
            }
        }

        column.column_type.clone()
    }
}

/// One column's `"name" TYPE [NULL|NOT NULL] [DEFAULT …]` fragment.
pub fn create_column(
    rules: &DialectRules,
    column: &ColumnDefinition,
    auto_increment_keys: &[String],
) -> String {
    let is_auto_increment = column.auto_increment
        || auto_increment_keys
            .iter()
            .any(|key| key.eq_ignore_ascii_case(&column.name));

    if is_auto_increment && rules.auto_increment == AutoIncrementStrategy::InlineRowid {
        return format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT",
            rules.quote_identifier(&column.name)
        );
    }

    let mut parts = vec![
        rules.quote_identifier(&column.name),
        rules.resolve_column_type(column),
    ];

    if column.nullable {
        parts.push("NULL".to_string());
    } else {
        parts.push("NOT NULL".to_string());
    }

    if let Some(default) = &column.default_value {
        parts.push("DEFAULT".to_string());
        parts.push(fix_default_value(rules, default, &column.column_type));
    }

    parts.join(" ")
}

/// Normalize a raw default value into a dialect-correct SQL literal.
///
/// Bare `true`/`false`/`null` tokens pass through unchanged regardless of
/// case. String-like types are quoted and escaped; MySQL additionally quotes
/// int/float/double defaults.
pub fn fix_default_value(rules: &DialectRules, value: &str, column_type: &str) -> String {
    let lowered = value.trim().to_ascii_lowercase();
    if lowered == "true" || lowered == "false" || lowered == "null" {
        return value.trim().to_string();
    }

    let type_lowered = column_type.to_ascii_lowercase();
    let string_like = ["char", "varchar", "text", "enum"]
        .iter()
        .any(|token| type_lowered.contains(token));
    let numeric_quirk = rules.quotes_numeric_defaults
        && ["int", "float", "double"]
            .iter()
            .any(|token| type_lowered.contains(token));

    if string_like || numeric_quirk {
        format!("'{}'", rules.escape_value(value.trim()))
    } else {
        value.trim().to_string()
    }
}

/// Full structure dump for one table: optional commented drop, the CREATE
/// TABLE statement, and any follow-up ALTER TABLE statements the dialect
/// needs for primary keys and auto-increment columns.
pub fn dump_structure(
    rules: &DialectRules,
    table: &TableDefinition,
    create_if_not_exists: bool,
    drop_if_exists: bool,
    engine: Option<&str>,
    charset: Option<&str>,
) -> String {
    let table_ref = rules.qualified_table_name(table);
    let auto_increment_keys: Vec<String> = table
        .auto_increment_columns()
        .iter()
        .map(|c| c.name.clone())
        .collect();

    let mut lines: Vec<String> = Vec::new();

    if drop_if_exists {
        lines.push(format!("-- DROP TABLE IF EXISTS {};", table_ref));
        lines.push(String::new());
    }

    let create_clause = if create_if_not_exists {
        "CREATE TABLE IF NOT EXISTS"
    } else {
        "CREATE TABLE"
    };
    lines.push(format!("{} {} (", create_clause, table_ref));

    let mut column_lines: Vec<String> = table
        .columns
        .iter()
        .map(|column| format!("\t{}", create_column(rules, column, &auto_increment_keys)))
        .collect();

    // SQLite takes its primary key inline; rowid columns already carry it.
    let primary_keys: Vec<String> = table
        .primary_key_columns()
        .iter()
        .filter(|c| {
            !(rules.auto_increment == AutoIncrementStrategy::InlineRowid && c.auto_increment)
        })
        .map(|c| rules.quote_identifier(&c.name))
        .collect();

    if rules.inline_primary_key && !primary_keys.is_empty() {
        column_lines.push(format!("\tPRIMARY KEY ({})", primary_keys.join(", ")));
    }

    lines.push(column_lines.join(",\r\n"));

    let mut table_suffix = String::from(")");
    if rules.supports_table_options {
        if let Some(engine) = engine {
            table_suffix.push_str(&format!(" ENGINE={}", engine));
        }
        if let Some(charset) = charset {
            table_suffix.push_str(&format!(" DEFAULT CHARSET={}", charset));
        }
    }
    table_suffix.push(';');
    lines.push(table_suffix);

    if !rules.inline_primary_key && !primary_keys.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "ALTER TABLE {} ADD PRIMARY KEY ({});",
            table_ref,
            primary_keys.join(", ")
        ));
    }

    if rules.auto_increment == AutoIncrementStrategy::AlterModify {
        for column in table.auto_increment_columns() {
            lines.push(String::new());
            lines.push(format!(
                "ALTER TABLE {} MODIFY {} {} NOT NULL AUTO_INCREMENT;",
                table_ref,
                rules.quote_identifier(&column.name),
                column.column_type
            ));
        }
    }

    lines.join("\r\n")
}

fn sql_literal(rules: &DialectRules, value: &Value) -> String {
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
        Value::String(raw) => format!("'{}'", rules.escape_value(raw)),
        other => format!("'{}'", rules.escape_value(&other.to_string())),
    }
}

/// Render one record as an `INSERT` statement.
///
/// `columns` maps record property names to physical column names; record
/// fields with no mapping are silently dropped.
pub fn dump_record(
    rules: &DialectRules,
    columns: &HashMap<String, String>,
    table_name: &str,
    record: &serde_json::Map<String, Value>,
) -> String {
    let mut names: Vec<String> = Vec::new();
    let mut values: Vec<String> = Vec::new();

    for (property, value) in record {
        if let Some(column_name) = columns.get(property) {
            names.push(rules.quote_identifier(column_name));
            values.push(sql_literal(rules, value));
        }
    }

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        rules.quote_identifier(table_name),
        names.join(", "),
        values.join(", ")
    )
}

/// Concatenated `dump_record` output for a record list, `;\r\n`-separated.
/// Returns `None` for an empty input.
pub fn dump_data(
    rules: &DialectRules,
    columns: &HashMap<String, String>,
    table_name: &str,
    records: &[serde_json::Map<String, Value>],
) -> Option<String> {
    if records.is_empty() {
        return None;
    }

    let statements: Vec<String> = records
        .iter()
        .map(|record| dump_record(rules, columns, table_name, record))
        .collect();

    Some(format!("{};\r\n", statements.join(";\r\n")))
}

/// Streaming variant of [`dump_data`]: batches of `max_record` records are
/// rendered and handed to `callback` instead of accumulated in memory.
pub fn dump_data_with_callback<F>(
    rules: &DialectRules,
    columns: &HashMap<String, String>,
    table_name: &str,
    records: &[serde_json::Map<String, Value>],
    max_record: usize,
    callback: &mut F,
) where
    F: FnMut(&str),
{
    let max_record = max_record.max(1);
    for chunk in records.chunks(max_record) {
        if let Some(sql) = dump_data(rules, columns, table_name, chunk) {
            callback(&sql);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_types::ColumnDefinition;

    fn sample_table() -> TableDefinition {
        TableDefinition::new(
            "song",
            vec![
                ColumnDefinition::new("song_id", "bigint")
                    .primary_key(true)
                    .auto_increment(true),
                ColumnDefinition::new("title", "varchar(255)").nullable(true),
                ColumnDefinition::new("duration", "float").nullable(true),
            ],
        )
    }

    #[test]
    fn create_if_not_exists_marker_all_dialects() {
        for db in [
            DatabaseType::MySQL,
            DatabaseType::PostgreSQL,
            DatabaseType::SQLite,
        ] {
            let rules = DialectRules::for_database(db);
            let sql = dump_structure(&rules, &sample_table(), true, false, None, None);
            assert!(
                sql.contains("CREATE TABLE IF NOT EXISTS"),
                "missing marker for {:?}: {}",
                db,
                sql
            );
        }
    }

    #[test]
    fn drop_if_exists_is_commented_out() {
        let rules = DialectRules::for_database(DatabaseType::MySQL);
        let sql = dump_structure(&rules, &sample_table(), true, true, None, None);
        assert!(sql.starts_with("-- DROP TABLE IF EXISTS `song`;"));
    }

    #[test]
    fn postgres_serial_substitution() {
        let rules = DialectRules::for_database(DatabaseType::PostgreSQL);
        let big = ColumnDefinition::new("id", "bigint")
            .primary_key(true)
            .auto_increment(true);
        let small = ColumnDefinition::new("id", "int")
            .primary_key(true)
            .auto_increment(true);

        assert!(create_column(&rules, &big, &[]).contains("BIGSERIAL"));
        assert!(create_column(&rules, &small, &[]).contains("SERIAL"));
        assert!(!create_column(&rules, &small, &[]).contains("BIGSERIAL"));
    }

    #[test]
    fn mysql_auto_increment_via_alter_modify() {
        let rules = DialectRules::for_database(DatabaseType::MySQL);
        let sql = dump_structure(&rules, &sample_table(), true, false, None, None);
        assert!(sql.contains("ALTER TABLE `song` MODIFY `song_id` bigint NOT NULL AUTO_INCREMENT;"));
        assert!(sql.contains("ALTER TABLE `song` ADD PRIMARY KEY (`song_id`);"));
    }

    #[test]
    fn sqlite_inline_rowid_and_no_alter() {
        let rules = DialectRules::for_database(DatabaseType::SQLite);
        let sql = dump_structure(&rules, &sample_table(), true, false, None, None);
        assert!(sql.contains("\"song_id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(!sql.contains("ALTER TABLE"));
    }

    #[test]
    fn sqlite_inline_primary_key_clause() {
        let rules = DialectRules::for_database(DatabaseType::SQLite);
        let table = TableDefinition::new(
            "producer",
            vec![
                ColumnDefinition::new("producer_id", "varchar(40)").primary_key(true),
                ColumnDefinition::new("name", "varchar(100)").nullable(true),
            ],
        );
        let sql = dump_structure(&rules, &table, true, false, None, None);
        assert!(sql.contains("PRIMARY KEY (\"producer_id\")"));
    }

    #[test]
    fn sqlite_unknown_type_falls_back() {
        let rules = DialectRules::for_database(DatabaseType::SQLite);
        let column = ColumnDefinition::new("payload", "geometry").nullable(true);
        let fragment = create_column(&rules, &column, &[]);
        assert!(fragment.contains(SQLITE_FALLBACK_TYPE), "{}", fragment);
    }

    #[test]
    fn mysql_table_options_are_rendered() {
        let rules = DialectRules::for_database(DatabaseType::MySQL);
        let sql = dump_structure(
            &rules,
            &sample_table(),
            true,
            false,
            Some("InnoDB"),
            Some("utf8mb4"),
        );
        assert!(sql.contains(") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;"));
    }

    #[test]
    fn default_value_keywords_pass_through() {
        let rules = DialectRules::for_database(DatabaseType::PostgreSQL);
        assert_eq!(fix_default_value(&rules, "TRUE", "boolean"), "TRUE");
        assert_eq!(fix_default_value(&rules, "null", "varchar(20)"), "null");
    }

    #[test]
    fn default_value_string_types_are_quoted() {
        let rules = DialectRules::for_database(DatabaseType::PostgreSQL);
        assert_eq!(
            fix_default_value(&rules, "O'Brien", "varchar(50)"),
            "'O''Brien'"
        );
        // Numerics stay bare outside MySQL.
        assert_eq!(fix_default_value(&rules, "42", "int"), "42");
    }

    #[test]
    fn mysql_quotes_numeric_defaults() {
        let rules = DialectRules::for_database(DatabaseType::MySQL);
        assert_eq!(fix_default_value(&rules, "42", "int"), "'42'");
        assert_eq!(fix_default_value(&rules, "1.5", "double"), "'1.5'");
    }

    #[test]
    fn dump_record_drops_unmapped_fields() {
        let rules = DialectRules::for_database(DatabaseType::MySQL);
        let mut columns = HashMap::new();
        columns.insert("title".to_string(), "title".to_string());

        let mut record = serde_json::Map::new();
        record.insert("title".to_string(), Value::String("Encore".to_string()));
        record.insert("ignored".to_string(), Value::Bool(true));

        let sql = dump_record(&rules, &columns, "song", &record);
        assert_eq!(sql, "INSERT INTO `song` (`title`) VALUES ('Encore')");
    }

    #[test]
    fn dump_data_separator_and_empty_input() {
        let rules = DialectRules::for_database(DatabaseType::MySQL);
        let mut columns = HashMap::new();
        columns.insert("title".to_string(), "title".to_string());

        assert!(dump_data(&rules, &columns, "song", &[]).is_none());

        let records: Vec<serde_json::Map<String, Value>> = (0..2)
            .map(|i| {
                let mut record = serde_json::Map::new();
                record.insert("title".to_string(), Value::String(format!("track-{}", i)));
                record
            })
            .collect();
        let sql = dump_data(&rules, &columns, "song", &records).unwrap();
        assert_eq!(sql.matches(";\r\n").count(), 2);
    }

    #[test]
    fn dump_data_with_callback_batches() {
        let rules = DialectRules::for_database(DatabaseType::MySQL);
        let mut columns = HashMap::new();
        columns.insert("title".to_string(), "title".to_string());

        let records: Vec<serde_json::Map<String, Value>> = (0..5)
            .map(|i| {
                let mut record = serde_json::Map::new();
                record.insert("title".to_string(), Value::String(format!("track-{}", i)));
                record
            })
            .collect();

        let mut batches = Vec::new();
        dump_data_with_callback(&rules, &columns, "song", &records, 2, &mut |sql: &str| {
            batches.push(sql.to_string())
        });
        assert_eq!(batches.len(), 3);
    }
}
