//! Lazy, validated recordsets over forward-only cursors and size-bounded bulk
//! inserts into PostgreSQL.

mod database;
mod logger;

pub use database::{
    batch_insert::{
        build_insert_header, build_placeholder_rows, format_table_name, quote_identifier,
        sql_length_for_params, BatchInsertConfig, BatchInsertError, BatchInserter, ConfigError,
        InsertSummary, UnevenParamsError, DEFAULT_MAX_ROWS, DEFAULT_MAX_STATEMENT_BYTES,
        POSTGRES_MAX_PARAMS,
    },
    executor::StatementExecutor,
    postgres::{
        connection_string, PgType, PostgresClient, PostgresConnectionError, PostgresCursor,
        PostgresError, ToSql,
    },
    record::{Record, RecordError, RecordSchema},
    recordset::{
        CursorError, CursorState, LazyRecordCursor, MemoryCursor, ParseCursorStateError,
        RawCursor,
    },
    transform::{Transformer, Validator},
    value::Value,
};
pub use logger::{setup_info_logger, setup_logger, LOG_FILTER_ENV};
pub use tracing::level_filters::LevelFilter;
