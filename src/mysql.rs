// =====================================================
// MySQL SPECIFIC DATABASE OPERATIONS
// =====================================================

use crate::db_types::*;
use futures::StreamExt;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::ConnectOptions;
use sqlx::{Column, MySql, Pool, Row};

const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

// --- Connection ---

pub async fn create_pool(config: &ConnectionConfig) -> Result<Pool<MySql>, String> {
    let mut options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.username);

    if let Some(pwd) = &config.password {
        options = options.password(pwd);
    }

    if let Some(db) = &config.database {
        if !db.is_empty() {
            options = options.database(db);
        }
    }

    options = options.log_statements(log::LevelFilter::Debug).to_owned();

    sqlx::mysql::MySqlPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .idle_timeout(std::time::Duration::from_secs(300))
        .max_lifetime(std::time::Duration::from_secs(1800))
        .connect_with(options)
        .await
        .map_err(|e| {
            let err_msg = e.to_string();
            if err_msg.contains("os error 111") {
                return format!(
                    "Connection Refused ({})\\n\\nCheck if MySQL is running on {}:{}",
                    err_msg, config.host, config.port
                );
            }
            format!("Failed to create pool: {}", e)
        })
}

// --- Query Execution ---

pub async fn execute_query(pool: &Pool<MySql>, query: &str) -> Result<Vec<QueryResult>, String> {
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
                                        row.try_get_unchecked::<i32, _>(i)
                                            .map(|v| serde_json::json!(v))
                                    })
                                    .or_else(|_| {
                                        row.try_get_unchecked::<i16, _>(i)
                                            .map(|v| serde_json::json!(v))
                                    })
                                    .or_else(|_| {
                                        row.try_get_unchecked::<i8, _>(i)
                                            .map(|v| serde_json::json!(v))
                                    })
                                    .or_else(|_| {
                                        row.try_get_unchecked::<u64, _>(i)
                                            .map(|v| serde_json::json!(v))
                                    })
                                    .or_else(|_| {
                                        row.try_get_unchecked::<f64, _>(i)
                                            .map(|v| serde_json::json!(v))
                                    })
                                    .or_else(|_| {
                                        row.try_get_unchecked::<f32, _>(i)
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

pub async fn get_tables(pool: &Pool<MySql>, database: &str) -> Result<Vec<String>, String> {
    let query = format!("SHOW TABLES FROM `{}`", database);
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .await
        .map_err(|e| format!("Failed to fetch tables: {}", e))?;

    let tables: Vec<String> = rows
        .iter()
        .map(|row| {
            row.try_get::<String, _>(0).unwrap_or_else(|_| {
                let bytes: Vec<u8> = row.get(0);
                String::from_utf8_lossy(&bytes).to_string()
            })
        })
        .collect();

    Ok(tables)
}

pub async fn get_table_schema(
    pool: &Pool<MySql>,
    database: &str,
    table: &str,
) -> Result<Vec<ColumnSchema>, String> {
    let query = format!("SHOW COLUMNS FROM `{}`.`{}`", database, table);

    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .await
        .map_err(|e| format!("Failed to fetch table schema: {}", e))?;

    let mut columns = Vec::new();
    for row in rows {
        let name: String = row.try_get("Field").unwrap_or_default();

        let full_type: String = match row.try_get::<Vec<u8>, _>("Type") {
            Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
            Err(_) => row.try_get::<String, _>("Type").unwrap_or_default(),
        };

        let is_nullable_str: String = row.try_get("Null").unwrap_or_default();
        let is_nullable = is_nullable_str == "YES";
        let column_key: String = row.try_get("Key").unwrap_or_default();
        let column_default: Option<String> = row.try_get("Default").ok();
        let extra: String = row.try_get("Extra").unwrap_or_default();

        let data_type = full_type.split('(').next().unwrap_or(&full_type).to_string();

        columns.push(ColumnSchema {
            name,
            data_type,
            column_type: full_type,
            is_nullable,
            column_key,
            column_default,
            extra,
        });
    }

    Ok(columns)
}
