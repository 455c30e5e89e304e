//! Bulk record insertion with size-bounded multi-row INSERT statements.
//!
//! Records are drained from any iterator one at a time, serialized into tuples and
//! flushed whenever the next tuple would push the statement past the row or byte
//! limit from [`BatchInsertConfig`].

mod config;
mod inserter;
mod query_builder;

pub use config::{
    BatchInsertConfig, ConfigError, DEFAULT_MAX_ROWS, DEFAULT_MAX_STATEMENT_BYTES,
    POSTGRES_MAX_PARAMS,
};
pub use inserter::{BatchInserter, InsertSummary};
pub use query_builder::{
    build_insert_header, build_placeholder_rows, format_table_name, quote_identifier,
    sql_length_for_params, UnevenParamsError,
};

#[derive(thiserror::Error, Debug)]
pub enum BatchInsertError<E> {
    #[error("Batch insert input is malformed: {0}")]
    InputShape(String),

    #[error("Batch insert item {index} failed validation: {validator}")]
    Validation { validator: String, index: usize },

    #[error(
        "Batch insert item {index} serializes to {size} bytes which does not fit in a statement of at most {limit} bytes"
    )]
    SizeLimitExceeded { index: usize, size: usize, limit: usize },

    #[error(transparent)]
    Execution(E),

    #[error("Batch insert source failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}
