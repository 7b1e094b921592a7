// =====================================================
// NATIVE QUERY BINDING
// =====================================================
//
// Resolves a `@query("…")`-annotated query definition into executable SQL
// text and shapes the fetched result per the declared `@return` type.
// Entity mapping goes through an explicit registry instead of reflection.

use crate::db_types::{DatabaseType, QueryResult};
use crate::dialect::DialectRules;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NativeQueryError {
    #[error("Invalid query input: {0}")]
    InvalidQueryInput(String),
    #[error("Invalid return type: {0}")]
    InvalidReturnType(String),
}

// --- Pagination / Sorting ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pageable {
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sortable {
    pub sorts: Vec<(String, SortDirection)>,
}

/// One named query argument.
///
/// Scalars stay as `:name` placeholders for the driver to bind; lists are
/// expanded inline as literals, so this path must never see untrusted
/// input; page and sort arguments are set aside and appended as clauses.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArg {
    Scalar(Value),
    List(Vec<Value>),
    Page(Pageable),
    Sort(Sortable),
}

// --- Extraction ---

fn query_single_line_pattern() -> Regex {
    Regex::new(r#"@query\s*\(\s*"([^"\r\n]*)"\s*\)"#).unwrap()
}

fn query_multi_line_pattern() -> Regex {
    Regex::new(r#"(?s)@query\s*\(\s*"(.*?)"\s*\)"#).unwrap()
}

fn return_pattern() -> Regex {
    Regex::new(r"@return\s+([^\s*]+)").unwrap()
}

/// Extract the SQL text of a `@query("…")` annotation.
pub fn extract_query_string(doc_comment: &str) -> Result<String, NativeQueryError> {
    if let Some(capture) = query_single_line_pattern().captures(doc_comment) {
        return Ok(capture[1].trim().to_string());
    }
    if let Some(capture) = query_multi_line_pattern().captures(doc_comment) {
        return Ok(capture[1].trim().to_string());
    }
    Err(NativeQueryError::InvalidQueryInput(
        "No @query annotation found".to_string(),
    ))
}

/// Extract the `@return` token, rewriting `self`/`self[]` to the caller's
/// own name. Defaults to `void` when absent.
pub fn extract_return_type(doc_comment: &str, caller_name: &str) -> String {
    let token = return_pattern()
        .captures(doc_comment)
        .map(|capture| capture[1].trim().to_string())
        .unwrap_or_else(|| "void".to_string());

    match token.as_str() {
        "self" => caller_name.to_string(),
        "self[]" => format!("{}[]", caller_name),
        _ => token,
    }
}

// --- Parameter Application ---

fn inline_literal(rules: &DialectRules, value: &Value) -> String {
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

/// Substitute list parameters and append pagination/sorting clauses.
///
/// Scalar parameters are left as `:name` placeholders; only the last page
/// and sort argument win when several are supplied.
pub fn apply_query_parameters(
    db_type: DatabaseType,
    sql: &str,
    params: &[(String, QueryArg)],
) -> String {
    let rules = DialectRules::for_database(db_type);
    let mut text = sql.to_string();
    let mut page: Option<Pageable> = None;
    let mut sort: Option<Sortable> = None;

    for (name, arg) in params {
        match arg {
            QueryArg::Page(value) => page = Some(*value),
            QueryArg::Sort(value) => sort = Some(value.clone()),
            QueryArg::List(values) => {
                let literals: Vec<String> = values
                    .iter()
                    .map(|value| inline_literal(&rules, value))
                    .collect();
                let pattern =
                    Regex::new(&format!(r":{}\b", regex::escape(name))).unwrap();
                text = pattern
                    .replace_all(&text, literals.join(", ").as_str())
                    .into_owned();
            }
            QueryArg::Scalar(_) => {}
        }
    }

    if let Some(sort) = sort {
        if !sort.sorts.is_empty() {
            let order_clause: Vec<String> = sort
                .sorts
                .iter()
                .map(|(column, direction)| {
                    format!("{} {}", rules.quote_identifier(column), direction.as_str())
                })
                .collect();
            text = format!("{} ORDER BY {}", text.trim_end(), order_clause.join(", "));
        }
    }

    if let Some(page) = page {
        text = format!(
            "{} LIMIT {} OFFSET {}",
            text.trim_end(),
            page.limit,
            page.offset
        );
    }

    text
}

// --- Return Shaping ---

#[derive(Debug, Clone, PartialEq)]
pub enum ReturnShape {
    Void,
    Native,
    AffectedRows,
    Object,
    ObjectList,
    JsonString,
    Entity(String),
    EntityList(String),
}

impl ReturnShape {
    pub fn parse(token: &str) -> Self {
        match token.trim() {
            "" | "void" => ReturnShape::Void,
            "PDOStatement" | "native" => ReturnShape::Native,
            "int" | "integer" => ReturnShape::AffectedRows,
            "object" | "stdClass" => ReturnShape::Object,
            "array" | "stdClass[]" => ReturnShape::ObjectList,
            "string" => ReturnShape::JsonString,
            other => {
                if let Some(base) = other.strip_suffix("[]") {
                    ReturnShape::EntityList(base.to_string())
                } else {
                    ReturnShape::Entity(other.to_string())
                }
            }
        }
    }
}

type EntityMapper = Box<dyn Fn(&Map<String, Value>) -> Value + Send + Sync>;

/// Explicit entity registration: the declared return type name must be
/// registered here before `handle_return` can map rows to it.
#[derive(Default)]
pub struct EntityRegistry {
    mappers: HashMap<String, EntityMapper>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` with a serde round-trip mapper for `T`. Rows that do
    /// not deserialize cleanly into `T` keep their raw object form.
    pub fn register<T>(&mut self, name: &str)
    where
        T: DeserializeOwned + Serialize + 'static,
    {
        self.mappers.insert(
            name.to_string(),
            Box::new(|row: &Map<String, Value>| {
                let raw = Value::Object(row.clone());
                match serde_json::from_value::<T>(raw.clone()) {
                    Ok(entity) => serde_json::to_value(entity).unwrap_or(raw),
                    Err(_) => raw,
                }
            }),
        );
    }

    /// Register `name` with a custom row mapper.
    pub fn register_with<F>(&mut self, name: &str, mapper: F)
    where
        F: Fn(&Map<String, Value>) -> Value + Send + Sync + 'static,
    {
        self.mappers.insert(name.to_string(), Box::new(mapper));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.mappers.contains_key(name)
    }

    fn map(&self, name: &str, row: &Map<String, Value>) -> Result<Value, NativeQueryError> {
        let mapper = self
            .mappers
            .get(name)
            .ok_or_else(|| NativeQueryError::InvalidReturnType(name.to_string()))?;
        Ok(mapper(row))
    }
}

/// Shaped result of a native query.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeQueryValue {
    None,
    Rows(QueryResult),
    Count(u64),
    Object(Option<Map<String, Value>>),
    Array(Vec<Map<String, Value>>),
    Json(String),
    Entity(Option<Value>),
    EntityList(Vec<Value>),
}

/// Convert a fetched result set into the declared return shape.
pub fn handle_return(
    result: &QueryResult,
    affected_rows: u64,
    return_type: &str,
    registry: &EntityRegistry,
) -> Result<NativeQueryValue, NativeQueryError> {
    match ReturnShape::parse(return_type) {
        ReturnShape::Void => Ok(NativeQueryValue::None),
        ReturnShape::Native => Ok(NativeQueryValue::Rows(result.clone())),
        ReturnShape::AffectedRows => Ok(NativeQueryValue::Count(affected_rows)),
        ReturnShape::Object => Ok(NativeQueryValue::Object(
            result.rows_as_objects().into_iter().next(),
        )),
        ReturnShape::ObjectList => Ok(NativeQueryValue::Array(result.rows_as_objects())),
        ReturnShape::JsonString => {
            let objects = result.rows_as_objects();
            let text = serde_json::to_string(&objects)
                .map_err(|e| NativeQueryError::InvalidQueryInput(e.to_string()))?;
            Ok(NativeQueryValue::Json(text))
        }
        ReturnShape::Entity(name) => {
            let mapped = result
                .rows_as_objects()
                .into_iter()
                .next()
                .map(|row| registry.map(&name, &row))
                .transpose()?;
            Ok(NativeQueryValue::Entity(mapped))
        }
        ReturnShape::EntityList(name) => {
            let mut mapped = Vec::new();
            for row in result.rows_as_objects() {
                mapped.push(registry.map(&name, &row)?);
            }
            Ok(NativeQueryValue::EntityList(mapped))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    const DOC: &str = r#"
     * Find all songs for one genre.
     *
     * @query("SELECT * FROM song WHERE genre_id IN (:genreIds)")
     * @return self[]
    "#;

    fn result_with_rows(rows: Vec<Vec<Value>>) -> QueryResult {
        QueryResult {
            columns: vec!["song_id".to_string(), "title".to_string()],
            rows,
        }
    }

    #[test]
    fn query_string_is_extracted() {
        let sql = extract_query_string(DOC).unwrap();
        assert_eq!(sql, "SELECT * FROM song WHERE genre_id IN (:genreIds)");
    }

    #[test]
    fn multi_line_query_falls_back_to_dotall() {
        let doc = "@query(\"SELECT *\n  FROM song\n  WHERE active = true\")";
        let sql = extract_query_string(doc).unwrap();
        assert!(sql.starts_with("SELECT *"));
        assert!(sql.contains("WHERE active = true"));
    }

    #[test]
    fn missing_query_is_invalid_input() {
        let result = extract_query_string("/** @return void */");
        assert!(matches!(
            result,
            Err(NativeQueryError::InvalidQueryInput(_))
        ));
    }

    #[test]
    fn self_return_type_is_rewritten() {
        assert_eq!(extract_return_type("@return self[]", "Song"), "Song[]");
        assert_eq!(extract_return_type("@return self", "Song"), "Song");
        assert_eq!(extract_return_type("@return Album", "Song"), "Album");
        assert_eq!(extract_return_type("no annotations here", "Song"), "void");
    }

    #[test]
    fn list_parameter_expands_inline() {
        let sql = apply_query_parameters(
            DatabaseType::MySQL,
            "SELECT * FROM song WHERE genre_id IN (:genreIds)",
            &[(
                "genreIds".to_string(),
                QueryArg::List(vec![json!("pop"), json!("rock")]),
            )],
        );
        assert_eq!(sql, "SELECT * FROM song WHERE genre_id IN ('pop', 'rock')");
    }

    #[test]
    fn scalar_parameter_stays_a_placeholder() {
        let sql = apply_query_parameters(
            DatabaseType::MySQL,
            "SELECT * FROM song WHERE song_id = :songId",
            &[("songId".to_string(), QueryArg::Scalar(json!(7)))],
        );
        assert!(sql.contains(":songId"));
    }

    #[test]
    fn list_expansion_respects_name_boundaries() {
        let sql = apply_query_parameters(
            DatabaseType::MySQL,
            "WHERE a IN (:ids) AND b = :idsExtra",
            &[("ids".to_string(), QueryArg::List(vec![json!(1)]))],
        );
        assert_eq!(sql, "WHERE a IN (1) AND b = :idsExtra");
    }

    #[test]
    fn page_and_sort_are_appended() {
        let sql = apply_query_parameters(
            DatabaseType::PostgreSQL,
            "SELECT * FROM song",
            &[
                (
                    "page".to_string(),
                    QueryArg::Page(Pageable {
                        offset: 40,
                        limit: 20,
                    }),
                ),
                (
                    "sort".to_string(),
                    QueryArg::Sort(Sortable {
                        sorts: vec![("title".to_string(), SortDirection::Asc)],
                    }),
                ),
            ],
        );
        assert_eq!(
            sql,
            "SELECT * FROM song ORDER BY \"title\" ASC LIMIT 20 OFFSET 40"
        );
    }

    #[test]
    fn return_shape_tokens() {
        assert_eq!(ReturnShape::parse("void"), ReturnShape::Void);
        assert_eq!(ReturnShape::parse("int"), ReturnShape::AffectedRows);
        assert_eq!(ReturnShape::parse("array"), ReturnShape::ObjectList);
        assert_eq!(
            ReturnShape::parse("Song[]"),
            ReturnShape::EntityList("Song".to_string())
        );
        assert_eq!(
            ReturnShape::parse("Song"),
            ReturnShape::Entity("Song".to_string())
        );
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Song {
        song_id: i64,
        title: String,
    }

    #[test]
    fn entity_list_maps_registered_type() {
        let mut registry = EntityRegistry::new();
        registry.register::<Song>("Song");

        let result = result_with_rows(vec![
            vec![json!(1), json!("Intro")],
            vec![json!(2), json!("Encore")],
        ]);
        let value = handle_return(&result, 0, "Song[]", &registry).unwrap();
        match value {
            NativeQueryValue::EntityList(entities) => {
                assert_eq!(entities.len(), 2);
                assert_eq!(entities[1]["title"], json!("Encore"));
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn unknown_entity_is_invalid_return_type() {
        let registry = EntityRegistry::new();
        let result = result_with_rows(vec![vec![json!(1), json!("Intro")]]);
        let mapped = handle_return(&result, 0, "Ghost[]", &registry);
        assert!(matches!(
            mapped,
            Err(NativeQueryError::InvalidReturnType(_))
        ));
    }

    #[test]
    fn affected_rows_and_void_shapes() {
        let registry = EntityRegistry::new();
        let result = QueryResult::empty();
        assert_eq!(
            handle_return(&result, 5, "int", &registry).unwrap(),
            NativeQueryValue::Count(5)
        );
        assert_eq!(
            handle_return(&result, 5, "void", &registry).unwrap(),
            NativeQueryValue::None
        );
    }

    #[test]
    fn json_string_shape_encodes_rows() {
        let registry = EntityRegistry::new();
        let result = result_with_rows(vec![vec![json!(1), json!("Intro")]]);
        match handle_return(&result, 0, "string", &registry).unwrap() {
            NativeQueryValue::Json(text) => {
                assert!(text.contains("\"title\":\"Intro\""));
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }
}
