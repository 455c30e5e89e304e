use std::{
    env,
    future::Future,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use dotenv::dotenv;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio::{
    runtime::{Builder, Runtime},
    time::timeout,
};
pub use tokio_postgres::types::{ToSql, Type as PgType};
use tokio_postgres::{config::SslMode, Client, Config, Error as PgError, Row};
use tracing::{debug, error};

use super::cursor::PostgresCursor;
use crate::database::{executor::StatementExecutor, record::Record, value::Value};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

pub fn connection_string() -> Result<String, env::VarError> {
    dotenv().ok();
    let connection = env::var("DATABASE_URL")?;
    Ok(connection)
}

#[derive(thiserror::Error, Debug)]
pub enum PostgresConnectionError {
    #[error("The database connection string is wrong please check your environment: {0}")]
    DatabaseConnectionConfigWrong(#[from] env::VarError),

    #[error("Could not start the database runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Can not connect to the database please make sure your connection string is correct")]
    CanNotConnectToDatabase,

    #[error("Could not parse connection string make sure it is correctly formatted")]
    CouldNotParseConnectionString,

    #[error("Could not create tls connector")]
    CouldNotCreateTlsConnector,
}

#[derive(thiserror::Error, Debug)]
pub enum PostgresError {
    #[error("PgError {0}")]
    PgError(#[from] PgError),
}

/// Blocking PostgreSQL client.
///
/// Owns a current-thread runtime that drives the async driver; every call blocks
/// until the server answers.
pub struct PostgresClient {
    runtime: Runtime,
    client: Client,
    cursor_seq: AtomicUsize,
}

impl PostgresClient {
    /// Connects using `DATABASE_URL`, read from the environment or a `.env` file.
    pub fn new() -> Result<Self, PostgresConnectionError> {
        let connection_str = connection_string()?;
        Self::connect(&connection_str)
    }

    pub fn connect(connection_str: &str) -> Result<Self, PostgresConnectionError> {
        fn _connect(
            runtime: &Runtime,
            connection_str: &str,
            disable_ssl: bool,
        ) -> Result<Client, PostgresConnectionError> {
            let mut config: Config = connection_str
                .parse()
                .map_err(|_| PostgresConnectionError::CouldNotParseConnectionString)?;

            if disable_ssl {
                config.ssl_mode(SslMode::Disable);
            }

            let connector = TlsConnector::builder()
                .build()
                .map_err(|_| PostgresConnectionError::CouldNotCreateTlsConnector)?;
            let tls_connector = MakeTlsConnector::new(connector);

            let connected = runtime
                .block_on(async { timeout(CONNECT_TIMEOUT, config.connect(tls_connector)).await });

            let (client, connection) = match connected {
                Ok(Ok((client, connection))) => (client, connection),
                Ok(Err(e)) => {
                    // retry without ssl if ssl has been attempted and failed
                    if !disable_ssl &&
                        config.get_ssl_mode() != SslMode::Disable &&
                        !connection_str.contains("sslmode=require")
                    {
                        debug!("TLS connection failed, retrying without TLS: {}", e);
                        return _connect(runtime, connection_str, true);
                    }
                    error!("Error connecting to database: {}", e);
                    return Err(PostgresConnectionError::CanNotConnectToDatabase);
                }
                Err(e) => {
                    error!("Timeout connecting to database: {}", e);
                    return Err(PostgresConnectionError::CanNotConnectToDatabase);
                }
            };

            // The connection only makes progress while the runtime is inside block_on.
            runtime.spawn(async move {
                if let Err(e) = connection.await {
                    error!("Database connection closed with error: {}", e);
                }
            });

            Ok(client)
        }

        let runtime = Builder::new_current_thread().enable_all().build()?;
        let client = _connect(&runtime, connection_str, false)?;

        // Perform a simple query to check the connection
        if runtime.block_on(client.simple_query("SELECT 1")).is_err() {
            return Err(PostgresConnectionError::CanNotConnectToDatabase);
        }

        Ok(PostgresClient { runtime, client, cursor_seq: AtomicUsize::new(0) })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn batch_execute(&self, sql: &str) -> Result<(), PostgresError> {
        self.block_on(self.client.batch_execute(sql)).map_err(PostgresError::PgError)
    }

    pub fn execute(&self, query: &str, params: &[Value]) -> Result<u64, PostgresError> {
        let params = as_sql_params(params);
        self.block_on(self.client.execute(query, &params)).map_err(PostgresError::PgError)
    }

    pub fn query(&self, query: &str, params: &[Value]) -> Result<Vec<Record>, PostgresError> {
        let params = as_sql_params(params);
        let rows = self.block_on(self.client.query(query, &params))?;
        rows.iter().map(row_to_record).collect()
    }

    /// Opens a server-side cursor over `query` fetching `fetch_size` rows per round trip.
    ///
    /// No transaction is opened or committed. Wrap the cursor and any writes made while
    /// reading it in a transaction to get all-or-nothing behaviour.
    pub fn cursor(
        &self,
        query: &str,
        params: &[Value],
        fetch_size: usize,
    ) -> Result<PostgresCursor<'_>, PostgresError> {
        let name = format!("recordset_cursor_{}", self.cursor_seq.fetch_add(1, Ordering::Relaxed));
        PostgresCursor::open(self, name, query, params, fetch_size)
    }
}

impl StatementExecutor for &PostgresClient {
    type Error = PostgresError;

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Self::Error> {
        PostgresClient::execute(*self, sql, params)
    }
}

fn as_sql_params(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|param| param as &(dyn ToSql + Sync)).collect()
}

pub(crate) fn row_to_record(row: &Row) -> Result<Record, PostgresError> {
    let mut record = Record::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let value: Value = row.try_get(index)?;
        record.set(column.name(), value);
    }
    Ok(record)
}
