use std::{fs, path::Path};

use serde::Deserialize;

/// Maximum number of rows placed in one INSERT statement.
pub const DEFAULT_MAX_ROWS: usize = 1000;

/// Maximum estimated length in bytes of one INSERT statement.
pub const DEFAULT_MAX_STATEMENT_BYTES: usize = 1_048_576;

/// PostgreSQL refuses statements with more bind parameters than this.
pub const POSTGRES_MAX_PARAMS: usize = 65_535;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Could not read batch insert config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse batch insert config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid batch insert config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchInsertConfig {
    pub max_rows: usize,

    pub max_statement_bytes: usize,

    /// Upper bound on bind parameters (rows × columns) per statement.
    pub max_params: usize,

    /// Prepended to every table name.
    pub table_prefix: String,

    /// Auto-generated key column stripped from records before insert. `None` inserts
    /// every field as given.
    pub sequence_column: Option<String>,
}

impl Default for BatchInsertConfig {
    fn default() -> Self {
        BatchInsertConfig {
            max_rows: DEFAULT_MAX_ROWS,
            max_statement_bytes: DEFAULT_MAX_STATEMENT_BYTES,
            max_params: POSTGRES_MAX_PARAMS,
            table_prefix: String::new(),
            sequence_column: Some("id".to_string()),
        }
    }
}

impl BatchInsertConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: BatchInsertConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_max_statement_bytes(mut self, max_statement_bytes: usize) -> Self {
        self.max_statement_bytes = max_statement_bytes;
        self
    }

    pub fn with_table_prefix(mut self, table_prefix: impl Into<String>) -> Self {
        self.table_prefix = table_prefix.into();
        self
    }

    pub fn with_sequence_column(mut self, sequence_column: Option<&str>) -> Self {
        self.sequence_column = sequence_column.map(str::to_string);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rows == 0 {
            return Err(ConfigError::Invalid("max_rows must be at least 1".to_string()));
        }
        if self.max_statement_bytes == 0 {
            return Err(ConfigError::Invalid("max_statement_bytes must be at least 1".to_string()));
        }
        if self.max_params == 0 {
            return Err(ConfigError::Invalid("max_params must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Rows allowed per statement once the bind parameter limit is applied, `None` when
    /// a single row already has more columns than parameters allowed.
    pub fn row_limit_for(&self, column_count: usize) -> Option<usize> {
        let by_params = self.max_params / column_count.max(1);
        if by_params == 0 {
            None
        } else {
            Some(self.max_rows.min(by_params))
        }
    }
}
