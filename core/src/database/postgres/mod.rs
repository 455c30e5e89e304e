mod client;
mod cursor;

pub use client::{
    connection_string, PgType, PostgresClient, PostgresConnectionError, PostgresError, ToSql,
};
pub use cursor::PostgresCursor;
