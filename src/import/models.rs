use crate::db_types::ConnectionConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_maximum_record() -> usize {
    100
}

/// Per-table-pair import configuration.
///
/// `map` entries are `"target:source"` column name pairs; columns without an
/// entry keep their source name.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImportMapping {
    pub source_table: String,
    pub target_table: Option<String>,
    #[serde(default)]
    pub map: Vec<String>,
    pub maximum_record: Option<usize>,
    #[serde(default)]
    pub pre_import_script: Vec<String>,
    #[serde(default)]
    pub post_import_script: Vec<String>,
}

impl ImportMapping {
    pub fn new(source_table: &str) -> Self {
        Self {
            source_table: source_table.to_string(),
            ..Default::default()
        }
    }

    pub fn normalized_source_table(&self) -> String {
        self.source_table.trim().to_string()
    }

    pub fn normalized_target_table(&self) -> String {
        self.target_table
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.normalized_source_table())
    }

    /// Parsed `(target, source)` column pairs; entries with no `:` or an
    /// empty side are skipped.
    pub fn column_map(&self) -> Vec<(String, String)> {
        self.map
            .iter()
            .filter_map(|entry| {
                let (target, source) = entry.split_once(':')?;
                let target = target.trim();
                let source = source.trim();
                if target.is_empty() || source.is_empty() {
                    return None;
                }
                Some((target.to_string(), source.to_string()))
            })
            .collect()
    }

    /// Effective batch size for this table: the mapping override when
    /// present, else `fallback`, floored at 1.
    pub fn max_record(&self, fallback: usize) -> usize {
        self.maximum_record.unwrap_or(fallback).max(1)
    }
}

/// Whole-run import configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfig {
    pub database_source: ConnectionConfig,
    pub database_target: ConnectionConfig,
    #[serde(default)]
    pub table: Vec<ImportMapping>,
    #[serde(default = "default_maximum_record")]
    pub maximum_record: usize,
}

impl ImportConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.table.is_empty() {
            return Err("At least one table mapping is required".to_string());
        }

        for (index, mapping) in self.table.iter().enumerate() {
            if mapping.normalized_source_table().is_empty() {
                return Err(format!(
                    "Table mapping {} has an empty sourceTable value",
                    index + 1
                ));
            }
            for entry in &mapping.map {
                if entry.split_once(':').is_none() {
                    return Err(format!(
                        "Table mapping {} ({}) has a malformed map entry '{}'; expected 'target:source'",
                        index + 1,
                        mapping.normalized_source_table(),
                        entry
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn is_table_configured(&self, source_table: &str) -> bool {
        self.table
            .iter()
            .any(|mapping| mapping.normalized_source_table().eq_ignore_ascii_case(source_table))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImportRunStatus {
    #[default]
    Running,
    Success,
    Failed,
}

/// Accounting for one `import_data` run.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImportRunSummary {
    pub operation_id: String,
    pub status: ImportRunStatus,
    pub table_count: usize,
    pub processed_tables: usize,
    pub total_rows: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ImportRunSummary {
    pub fn start(table_count: usize) -> Self {
        Self {
            operation_id: uuid::Uuid::new_v4().to_string(),
            status: ImportRunStatus::Running,
            table_count,
            processed_tables: 0,
            total_rows: 0,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    pub fn succeed(&mut self) {
        self.status = ImportRunStatus::Success;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: String) {
        self.status = ImportRunStatus::Failed;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_types::DatabaseType;

    fn connection() -> ConnectionConfig {
        ConnectionConfig {
            id: None,
            name: None,
            db_type: DatabaseType::MySQL,
            host: "localhost".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: None,
            database: Some("music".to_string()),
            schema: None,
        }
    }

    #[test]
    fn column_map_parses_target_source_pairs() {
        let mapping = ImportMapping {
            source_table: "song".to_string(),
            map: vec![
                "song_id:id".to_string(),
                "title : name".to_string(),
                "broken".to_string(),
            ],
            ..Default::default()
        };
        let pairs = mapping.column_map();
        assert_eq!(
            pairs,
            vec![
                ("song_id".to_string(), "id".to_string()),
                ("title".to_string(), "name".to_string()),
            ]
        );
    }

    #[test]
    fn max_record_floors_at_one() {
        let mapping = ImportMapping {
            source_table: "song".to_string(),
            maximum_record: Some(0),
            ..Default::default()
        };
        assert_eq!(mapping.max_record(100), 1);
        assert_eq!(ImportMapping::new("song").max_record(250), 250);
    }

    #[test]
    fn target_table_defaults_to_source() {
        let mapping = ImportMapping::new("album");
        assert_eq!(mapping.normalized_target_table(), "album");
    }

    #[test]
    fn validate_rejects_malformed_map_entries() {
        let config = ImportConfig {
            database_source: connection(),
            database_target: connection(),
            table: vec![ImportMapping {
                source_table: "song".to_string(),
                map: vec!["no_colon_here".to_string()],
                ..Default::default()
            }],
            maximum_record: 100,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_tables() {
        let config = ImportConfig {
            database_source: connection(),
            database_target: connection(),
            table: vec![],
            maximum_record: 100,
        };
        assert!(config.validate().is_err());
    }
}
