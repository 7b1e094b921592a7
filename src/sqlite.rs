// =====================================================
// SQLITE SPECIFIC DATABASE OPERATIONS
// =====================================================

use crate::db_types::*;
use futures::StreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::ConnectOptions;
use sqlx::{Column, Pool, Row, Sqlite};

const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

// --- Connection ---

fn build_connect_options(db_path: &str) -> SqliteConnectOptions {
    let mut options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    options = options.log_statements(log::LevelFilter::Debug);

    options
}

/// The connection config's `host` field carries the database file path.
pub async fn create_pool(db_path: &str) -> Result<Pool<Sqlite>, String> {
    if db_path.is_empty() {
        return Err("Database file path is required".to_string());
    }

    let options = build_connect_options(db_path);

    SqlitePoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .idle_timeout(std::time::Duration::from_secs(300))
        .max_lifetime(std::time::Duration::from_secs(1800))
        .connect_with(options)
        .await
        .map_err(|e| format!("Failed to create SQLite pool: {}", e))
}

// --- Query Execution ---

pub async fn execute_query(pool: &Pool<Sqlite>, query: &str) -> Result<Vec<QueryResult>, String> {
    let mut results = Vec::new();

    let stream_future = async {
        let mut stream = sqlx::raw_sql(query).fetch_many(pool);

        let mut current_rows = Vec::new();
        let mut current_columns = Vec::new();

        while let Some(result) = stream.next().await {
            match result {
                Ok(either) => {
                    use sqlx::Either;
                    match either {
                        Either::Left(_done) => {
                            if !current_rows.is_empty() || !current_columns.is_empty() {
                                results.push(QueryResult {
                                    columns: current_columns.clone(),
                                    rows: current_rows.clone(),
                                });
                                current_rows.clear();
                                current_columns.clear();
                            }
                        }
                        Either::Right(row) => {
                            if current_columns.is_empty() {
                                current_columns =
                                    row.columns().iter().map(|c| c.name().to_string()).collect();
                            }

                            let mut row_data = Vec::new();
                            for (i, _) in current_columns.iter().enumerate() {
                                let val: serde_json::Value = row
                                    .try_get_unchecked::<i64, _>(i)
                                    .map(|v| serde_json::json!(v))
                                    .or_else(|_| {
                                        row.try_get_unchecked::<f64, _>(i)
                                            .map(|v| serde_json::json!(v))
                                    })
                                    .or_else(|_| {
                                        row.try_get_unchecked::<bool, _>(i)
                                            .map(|v| serde_json::json!(v))
                                    })
                                    .or_else(|_| {
                                        row.try_get_unchecked::<String, _>(i)
                                            .map(|v| serde_json::json!(v))
                                    })
                                    .or_else(|_| {
                                        row.try_get_unchecked::<Vec<u8>, _>(i).map(|bytes| {
                                            serde_json::json!(
                                                String::from_utf8_lossy(&bytes).to_string()
                                            )
                                        })
                                    })
                                    .unwrap_or(serde_json::Value::Null);
                                row_data.push(val);
                            }
                            current_rows.push(row_data);
                        }
                    }
                }
                Err(e) => return Err(format!("Query error: {}", e)),
            }
        }

        if !current_rows.is_empty() {
            results.push(QueryResult {
                columns: current_columns,
                rows: current_rows,
            });
        }

        Ok::<_, String>(())
    };

    tokio::time::timeout(
        std::time::Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        stream_future,
    )
    .await
    .map_err(|_| {
        format!(
            "Query timed out after {} seconds",
            DEFAULT_QUERY_TIMEOUT_SECS
        )
    })??;

    if results.is_empty() {
        return Ok(vec![QueryResult {
            columns: vec![],
            rows: vec![],
        }]);
    }

    Ok(results)
}

// --- Introspection ---

pub async fn get_tables(pool: &Pool<Sqlite>) -> Result<Vec<String>, String> {
    let rows = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
    )
    .fetch_all(pool)
    .await
    .map_err(|e| format!("Failed to fetch tables: {}", e))?;

    Ok(rows
        .iter()
        .filter_map(|r| r.try_get::<String, _>("name").ok())
        .collect())
}

pub async fn get_table_schema(
    pool: &Pool<Sqlite>,
    table: &str,
) -> Result<Vec<ColumnSchema>, String> {
    let rows = sqlx::query(&format!("PRAGMA table_info(\"{}\")", table))
        .fetch_all(pool)
        .await
        .map_err(|e| format!("Failed to fetch table schema: {}", e))?;

    Ok(rows
        .iter()
        .map(|r| {
            let name = r.try_get::<String, _>("name").unwrap_or_default();
            let full_type = r.try_get::<String, _>("type").unwrap_or_default();
            let notnull = r.try_get::<i32, _>("notnull").unwrap_or(0);
            let pk = r.try_get::<i32, _>("pk").unwrap_or(0);
            let dflt_value: Option<String> = r.try_get("dflt_value").ok();

            let data_type = full_type.split('(').next().unwrap_or(&full_type).to_string();

            ColumnSchema {
                name,
                data_type,
                column_type: full_type,
                is_nullable: notnull == 0,
                column_key: if pk > 0 { "PRI".to_string() } else { String::new() },
                column_default: dflt_value,
                extra: String::new(),
            }
        })
        .collect())
}
