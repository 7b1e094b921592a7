// =====================================================
// DISPATCH OVER THE ACTIVE DATABASE TYPE
// =====================================================

use crate::db_types::*;
use crate::{mysql, postgres, sqlite};
use sqlx::{MySql, Pool, Postgres, Sqlite};
use std::collections::HashMap;

enum DatabasePool {
    MySql(Pool<MySql>),
    Postgres(Pool<Postgres>),
    Sqlite(Pool<Sqlite>),
}

/// One open connection, dispatching every operation to its dialect module.
pub struct Database {
    config: ConnectionConfig,
    pool: DatabasePool,
}

impl Database {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, String> {
        let pool = match config.db_type {
            DatabaseType::MySQL => DatabasePool::MySql(mysql::create_pool(config).await?),
            DatabaseType::PostgreSQL => {
                DatabasePool::Postgres(postgres::create_pool(config).await?)
            }
            // SQLite carries its file path in the host field.
            DatabaseType::SQLite => DatabasePool::Sqlite(sqlite::create_pool(&config.host).await?),
        };

        Ok(Self {
            config: config.clone(),
            pool,
        })
    }

    pub fn db_type(&self) -> DatabaseType {
        self.config.db_type
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn database_name(&self) -> String {
        self.config.database.clone().unwrap_or_default()
    }

    pub async fn execute_query(&self, sql: &str) -> Result<Vec<QueryResult>, String> {
        match &self.pool {
            DatabasePool::MySql(pool) => mysql::execute_query(pool, sql).await,
            DatabasePool::Postgres(pool) => postgres::execute_query(pool, sql).await,
            DatabasePool::Sqlite(pool) => sqlite::execute_query(pool, sql).await,
        }
    }

    /// First result set of `sql`, or an empty result.
    pub async fn fetch_all(&self, sql: &str) -> Result<QueryResult, String> {
        let results = self.execute_query(sql).await?;
        Ok(results.into_iter().next().unwrap_or_else(QueryResult::empty))
    }

    pub async fn get_tables(&self) -> Result<Vec<String>, String> {
        match &self.pool {
            DatabasePool::MySql(pool) => mysql::get_tables(pool, &self.database_name()).await,
            DatabasePool::Postgres(pool) => {
                postgres::get_tables(pool, &self.config.database_schema()).await
            }
            DatabasePool::Sqlite(pool) => sqlite::get_tables(pool).await,
        }
    }

    /// Rich per-column introspection for one table.
    pub async fn get_column_list(&self, table: &str) -> Result<Vec<ColumnSchema>, String> {
        match &self.pool {
            DatabasePool::MySql(pool) => {
                mysql::get_table_schema(pool, &self.database_name(), table).await
            }
            DatabasePool::Postgres(pool) => {
                postgres::get_table_schema(pool, &self.config.database_schema(), table).await
            }
            DatabasePool::Sqlite(pool) => sqlite::get_table_schema(pool, table).await,
        }
    }

    /// Column name to declared type, normalized across dialects.
    pub async fn show_columns(&self, table: &str) -> Result<HashMap<String, String>, String> {
        let columns = self.get_column_list(table).await?;
        Ok(columns
            .into_iter()
            .map(|column| (column.name, column.column_type))
            .collect())
    }
}
