// =====================================================
// CREATE TABLE TEXT PARSING
// =====================================================
//
// Best-effort parser for the dialect subset this crate generates. It is not
// a SQL grammar: nested parentheses in DEFAULT expressions, CHECK bodies and
// quoted identifiers containing keywords are out of scope.

use crate::db_types::ColumnDefinition;
use regex::Regex;

/// Recognized column type keywords; field-looking lines whose type token is
/// not in this list are skipped.
const TYPE_KEYWORDS: &[&str] = &[
    "timestamp", "serial4", "bigserial", "int2", "int4", "int8", "tinyint",
    "bigint", "text", "varchar", "char", "real", "float", "integer", "int",
    "datetime", "date", "double",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub table_name: String,
    pub columns: Vec<ColumnDefinition>,
    /// Raw captured table-level primary-key column list, when present.
    pub primary_key: Option<String>,
}

fn create_table_pattern() -> Regex {
    Regex::new(r#"(?i)create\s+table\s+(?:if\s+not\s+exists\s+)?("?[A-Za-z0-9_.]+"?)\s*\("#)
        .unwrap()
}

fn strip_identifier_quotes(raw: &str) -> String {
    raw.trim().trim_matches('"').trim_matches('`').to_string()
}

/// Parse every `CREATE TABLE` statement found in `sql_text`.
pub fn parse_all(sql_text: &str) -> Vec<ParsedTable> {
    let cleaned = sql_text.replace('`', "");
    let pattern = create_table_pattern();

    let mut tables = Vec::new();
    for found in pattern.find_iter(&cleaned) {
        let statement = statement_at(&cleaned, found.start());
        if let Some(table) = parse_table(statement) {
            tables.push(table);
        }
    }
    tables
}

/// Slice one statement: from `start` through the first depth-zero `;`, or to
/// the end of the text.
fn statement_at(sql_text: &str, start: usize) -> &str {
    let mut depth = 0i32;
    for (offset, ch) in sql_text[start..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ';' if depth <= 0 => return &sql_text[start..start + offset + 1],
            _ => {}
        }
    }
    &sql_text[start..]
}

/// Parse a single `CREATE TABLE …;` statement.
///
/// Returns `None` when the text does not look like a CREATE TABLE statement
/// at all; unparseable pieces inside an otherwise valid statement are
/// skipped, never an error.
pub fn parse_table(statement_sql: &str) -> Option<ParsedTable> {
    let cleaned = statement_sql.replace('`', "");
    let truncated = match cleaned.find(';') {
        Some(position) => &cleaned[..position],
        None => cleaned.as_str(),
    };

    let pattern = create_table_pattern();
    let capture = pattern.captures(truncated)?;
    let table_name = strip_identifier_quotes(&capture[1]);
    let body_start = capture.get(0)?.end();

    let body = column_list_body(&truncated[body_start..]);
    let pieces = split_top_level(body);

    let mut columns: Vec<ColumnDefinition> = Vec::new();
    let mut primary_key: Option<String> = None;
    let mut key_columns: Vec<String> = Vec::new();

    for piece in &pieces {
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            continue;
        }

        let lowered = trimmed.to_ascii_lowercase();
        if lowered.starts_with("primary key") || lowered.starts_with("unique key") {
            if let Some(list) = parenthesized_list(trimmed) {
                if lowered.starts_with("primary key") && primary_key.is_none() {
                    primary_key = Some(list.clone());
                }
                key_columns.extend(
                    list.split(',')
                        .map(|name| strip_identifier_quotes(name))
                        .filter(|name| !name.is_empty()),
                );
            }
            continue;
        }
        if lowered.starts_with("constraint")
            || lowered.starts_with("foreign key")
            || lowered.starts_with("key ")
            || lowered.starts_with("index ")
            || lowered.starts_with("check")
        {
            continue;
        }

        if let Some(column) = parse_field(trimmed) {
            // First occurrence wins.
            if !columns
                .iter()
                .any(|existing| existing.name.eq_ignore_ascii_case(&column.name))
            {
                columns.push(column);
            }
        }
    }

    // Back-apply table-level key membership to the matching columns.
    for key_column in &key_columns {
        for column in columns.iter_mut() {
            if column.name.eq_ignore_ascii_case(key_column) {
                column.primary_key = true;
            }
        }
    }

    Some(ParsedTable {
        table_name,
        columns,
        primary_key,
    })
}

/// Body of the column list: everything up to the parenthesis matching the
/// opening one.
fn column_list_body(after_open: &str) -> &str {
    let mut depth = 1i32;
    for (offset, ch) in after_open.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return &after_open[..offset];
                }
            }
            _ => {}
        }
    }
    after_open
}

fn split_top_level(body: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_string = false;

    for ch in body.chars() {
        match ch {
            '\'' => {
                in_string = !in_string;
                current.push(ch);
            }
            '(' if !in_string => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_string => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 && !in_string => {
                pieces.push(current.clone());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        pieces.push(current);
    }
    pieces
}

fn parenthesized_list(piece: &str) -> Option<String> {
    let open = piece.find('(')?;
    let close = piece.rfind(')')?;
    if close <= open {
        return None;
    }
    Some(piece[open + 1..close].trim().to_string())
}

fn field_pattern() -> Regex {
    Regex::new(r#"^\s*"?([A-Za-z0-9_]+)"?\s+([A-Za-z0-9_]+(?:\s*\(\s*[0-9,\s]+\s*\))?)"#).unwrap()
}

fn default_pattern() -> Regex {
    Regex::new(r"(?i)\bdefault\s+('(?:[^']|'')*'|[^\s,]+)").unwrap()
}

/// Parse one field definition piece into a column, or `None` when the type
/// token is not recognized.
fn parse_field(piece: &str) -> Option<ColumnDefinition> {
    let capture = field_pattern().captures(piece)?;
    let name = capture[1].to_string();
    let raw_type = capture[2].trim().to_string();

    let base_type = raw_type
        .split('(')
        .next()
        .unwrap_or(&raw_type)
        .trim()
        .to_ascii_lowercase();
    if !TYPE_KEYWORDS.contains(&base_type.as_str()) {
        return None;
    }

    let length = parenthesized_list(&raw_type).map(|list| list.replace(' ', ""));
    let lowered = piece.to_ascii_lowercase();
    let nullable = !lowered.contains("not null");
    let primary_key = lowered.contains("primary key");
    let auto_increment = lowered.contains("auto_increment")
        || lowered.contains("autoincrement")
        || base_type.contains("serial");

    let default_value = default_pattern()
        .captures(piece)
        .map(|c| c[1].trim().trim_matches('\'').to_string());

    let mut column = ColumnDefinition::new(&name, &raw_type);
    column.length = length;
    column.nullable = nullable;
    column.primary_key = primary_key;
    column.auto_increment = auto_increment;
    column.default_value = default_value;
    Some(column)
}
