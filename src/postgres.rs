// =====================================================
// PostgreSQL SPECIFIC DATABASE OPERATIONS
// =====================================================

use crate::db_types::*;
use futures::StreamExt;
use sqlx::postgres::PgConnectOptions;
use sqlx::ConnectOptions;
use sqlx::{Column, Pool, Postgres, Row};

const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

// --- Connection ---

pub async fn create_pool(config: &ConnectionConfig) -> Result<Pool<Postgres>, String> {
    let mut options = PgConnectOptions::new()
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

    sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .idle_timeout(std::time::Duration::from_secs(300))
        .max_lifetime(std::time::Duration::from_secs(1800))
        .connect_with(options)
        .await
        .map_err(|e| {
            let err_msg = e.to_string();
            if err_msg.contains("connection refused") {
                return format!(
                    "Connection Refused\\n\\nCheck if PostgreSQL is running on {}:{}",
                    config.host, config.port
                );
            }
            format!("Failed to create pool: {}", e)
        })
}

// --- Query Execution ---

pub async fn execute_query(
    pool: &Pool<Postgres>,
    query: &str,
) -> Result<Vec<QueryResult>, String> {
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

pub async fn get_tables(pool: &Pool<Postgres>, schema: &str) -> Result<Vec<String>, String> {
    let query = format!(
        "SELECT tablename FROM pg_tables WHERE schemaname = '{}' ORDER BY tablename",
        schema
    );

    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .await
        .map_err(|e| format!("Failed to fetch tables: {}", e))?;

    let tables: Vec<String> = rows
        .iter()
        .map(|row| row.try_get::<String, _>("tablename").unwrap_or_default())
        .collect();

    Ok(tables)
}

pub async fn get_table_schema(
    pool: &Pool<Postgres>,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnSchema>, String> {
    let query = format!(
        r#"
        SELECT
            c.column_name,
            c.data_type,
            c.udt_name,
            c.character_maximum_length,
            c.numeric_precision,
            c.numeric_scale,
            c.is_nullable,
            c.column_default,
            CASE WHEN pk.column_name IS NOT NULL THEN 'PRI' ELSE '' END as column_key
        FROM information_schema.columns c
        LEFT JOIN (
            SELECT kcu.column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
            WHERE tc.table_schema = '{}'
                AND tc.table_name = '{}'
                AND tc.constraint_type = 'PRIMARY KEY'
        ) pk ON c.column_name = pk.column_name
        WHERE c.table_schema = '{}'
            AND c.table_name = '{}'
        ORDER BY c.ordinal_position
    "#,
        schema, table, schema, table
    );

    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .await
        .map_err(|e| format!("Failed to fetch table schema: {}", e))?;

    let mut columns = Vec::new();
    for row in rows {
        let name: String = row.try_get("column_name").unwrap_or_default();
        let data_type: String = row.try_get("data_type").unwrap_or_default();
        let udt_name: String = row.try_get("udt_name").unwrap_or_default();
        let max_length: Option<i32> = row.try_get("character_maximum_length").ok();
        let numeric_precision: Option<i32> = row.try_get("numeric_precision").ok();
        let numeric_scale: Option<i32> = row.try_get("numeric_scale").ok();
        let is_nullable_str: String = row.try_get("is_nullable").unwrap_or_default();
        let is_nullable = is_nullable_str == "YES";
        let column_key: String = row.try_get("column_key").unwrap_or_default();
        let column_default: Option<String> = row.try_get("column_default").ok();

        let column_type = if let Some(len) = max_length {
            format!("{}({})", udt_name, len)
        } else if let Some(precision) = numeric_precision {
            if let Some(scale) = numeric_scale {
                format!("{}({},{})", udt_name, precision, scale)
            } else {
                format!("{}({})", udt_name, precision)
            }
        } else {
            udt_name.clone()
        };

        let extra = if let Some(ref def) = column_default {
            if def.contains("nextval") {
                "auto_increment".to_string()
            } else {
                String::new()
            }
        } else {
            String::new()
        };

        columns.push(ColumnSchema {
            name,
            data_type,
            column_type,
            is_nullable,
            column_key,
            column_default,
            extra,
        });
    }

    Ok(columns)
}
