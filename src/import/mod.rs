// =====================================================
// TABLE DATA IMPORT
// =====================================================
//
// Copies table rows from a source connection to a target connection in
// caller-controlled batches, with column remapping, type coercion and
// pre/post SQL hooks. Generated INSERT statements are handed to a caller
// callback; execution, transactions and error handling stay with the caller.

pub mod engine;
pub mod models;
pub mod script;

pub use engine::{auto_configure_import_data, import_data, import_data_table};
pub use models::{ImportConfig, ImportMapping, ImportRunStatus, ImportRunSummary};
