//! Annotation-driven SQL schema tooling and offline data migration for
//! MySQL, PostgreSQL and SQLite.
//!
//! The crate parses docblock-style annotation metadata, renders
//! dialect-correct DDL/DML text, reverse-engineers table definitions from
//! `CREATE TABLE` statements, copies table data between live connections in
//! batches, and binds `@query`-annotated native queries to shaped results.

// Database modules
pub mod db;
pub mod db_types;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

// Schema and annotation tooling
pub mod annotation;
pub mod dialect;
pub mod table_parser;

// Data movement and query binding
pub mod import;
pub mod native_query;

pub use db::Database;
pub use db_types::{
    ColumnDefinition, ColumnSchema, ConnectionConfig, DatabaseType, QueryResult, TableDefinition,
};
pub use dialect::{DialectRules, SQLITE_FALLBACK_TYPE};
pub use import::{ImportConfig, ImportMapping};
pub use table_parser::ParsedTable;
