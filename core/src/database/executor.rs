use crate::database::value::Value;

/// Runs one parameterized statement and reports the affected row count.
///
/// `params` are positional: `params[0]` binds to `$1`.
pub trait StatementExecutor {
    type Error: std::error::Error + Send + Sync + 'static;

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Self::Error>;
}

impl<X: StatementExecutor + ?Sized> StatementExecutor for &mut X {
    type Error = X::Error;

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Self::Error> {
        (**self).execute(sql, params)
    }
}
