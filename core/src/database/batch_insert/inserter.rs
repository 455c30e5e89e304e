use std::convert::Infallible;

use tracing::{debug, info};

use super::{
    config::BatchInsertConfig,
    query_builder::{
        build_insert_header, build_placeholder_rows, format_table_name, tuple_literal_len,
        TUPLE_SEPARATOR_LEN,
    },
    BatchInsertError,
};
use crate::database::{
    executor::StatementExecutor,
    record::Record,
    transform::{Transformer, Validator},
    value::Value,
};

/// Outcome of one [`BatchInserter::insert_all`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertSummary {
    /// Executed INSERT statements.
    pub statements: usize,
    /// Sum of the affected row counts reported by the executor.
    pub rows: u64,
}

/// Column layout of one insert call, fixed by the first record.
struct StatementLayout {
    table: String,
    columns: Vec<String>,
    header: String,
    row_limit: usize,
}

impl StatementLayout {
    fn from_first<E>(
        table: String,
        first: &Record,
        config: &BatchInsertConfig,
    ) -> Result<Self, BatchInsertError<E>> {
        let columns: Vec<String> = first.field_names().map(str::to_string).collect();
        let row_limit = config.row_limit_for(columns.len()).ok_or_else(|| {
            BatchInsertError::InputShape(format!(
                "records have {} fields, more than the {} bind parameters allowed per statement",
                columns.len(),
                config.max_params
            ))
        })?;
        let header = build_insert_header(&table, &columns);

        Ok(StatementLayout { table, columns, header, row_limit })
    }

    /// Pulls the record's values out in column order.
    fn tuple<E>(&self, index: usize, mut record: Record) -> Result<Vec<Value>, BatchInsertError<E>> {
        let mut values = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            match record.remove(column) {
                Some(value) => values.push(value),
                None => {
                    return Err(BatchInsertError::InputShape(format!(
                        "item {} is missing field `{}`",
                        index, column
                    )))
                }
            }
        }

        if let Some(unexpected) = record.field_names().next() {
            return Err(BatchInsertError::InputShape(format!(
                "item {} has field `{}` which the first item does not have",
                index, unexpected
            )));
        }

        Ok(values)
    }

    fn statement_sql(&self, rows: usize) -> String {
        let mut sql = self.header.clone();
        sql.push_str(&build_placeholder_rows(rows, self.columns.len()));
        sql
    }
}

/// Tuples waiting to be flushed as one statement.
struct PendingBatch {
    values: Vec<Value>,
    rows: usize,
    size: usize,
}

impl PendingBatch {
    fn new(header_len: usize) -> Self {
        PendingBatch { values: Vec::new(), rows: 0, size: header_len }
    }

    fn size_with(&self, tuple_size: usize) -> usize {
        if self.rows == 0 {
            self.size + tuple_size
        } else {
            self.size + TUPLE_SEPARATOR_LEN + tuple_size
        }
    }

    fn push(&mut self, tuple: Vec<Value>, tuple_size: usize) {
        self.size = self.size_with(tuple_size);
        self.rows += 1;
        self.values.extend(tuple);
    }

    fn reset(&mut self, header_len: usize) {
        self.values.clear();
        self.rows = 0;
        self.size = header_len;
    }
}

/// Inserts records in as few multi-row INSERT statements as the limits allow.
///
/// ```no_run
/// use recordset::{BatchInserter, PostgresClient, Record};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = PostgresClient::new()?;
/// let records = (1..=3).map(|i| Record::new().with("course", i).with("name", format!("Course {}", i)));
///
/// let summary = BatchInserter::new(&client).insert_all("course", records)?;
/// assert_eq!(summary.statements, 1);
/// # Ok(())
/// # }
/// ```
pub struct BatchInserter<X> {
    executor: X,
    config: BatchInsertConfig,
    transformer: Option<Transformer>,
    validator: Option<Validator>,
}

impl<X: StatementExecutor> BatchInserter<X> {
    pub fn new(executor: X) -> Self {
        Self::with_config(executor, BatchInsertConfig::default())
    }

    pub fn with_config(executor: X, config: BatchInsertConfig) -> Self {
        BatchInserter { executor, config, transformer: None, validator: None }
    }

    /// Applied to every record before validation and serialization.
    pub fn with_transformer(mut self, transformer: Transformer) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// A rejected record aborts the whole call. The validator runs after the
    /// transformer and before the sequence column is stripped, so it still sees `id`.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn config(&self) -> &BatchInsertConfig {
        &self.config
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn into_inner(self) -> X {
        self.executor
    }

    pub fn insert_all<I>(
        &mut self,
        table: &str,
        records: I,
    ) -> Result<InsertSummary, BatchInsertError<X::Error>>
    where
        I: IntoIterator,
        I::Item: Into<Record>,
    {
        self.insert_all_fallible(table, records.into_iter().map(Ok::<_, Infallible>))
    }

    /// Like [`BatchInserter::insert_all`] for sources that can fail while being drained,
    /// such as a [`crate::LazyRecordCursor`]. A source error aborts the call.
    pub fn insert_all_fallible<I, R, S>(
        &mut self,
        table: &str,
        records: I,
    ) -> Result<InsertSummary, BatchInsertError<X::Error>>
    where
        I: IntoIterator<Item = Result<R, S>>,
        R: Into<Record>,
        S: std::error::Error + Send + Sync + 'static,
    {
        let mut summary = InsertSummary::default();
        let mut records = records.into_iter().enumerate();

        let Some((_, first)) = records.next() else {
            debug!("Batch insert into {} skipped, no records", table);
            return Ok(summary);
        };
        let first = self.prepare(0, first)?;

        let table_name = format_table_name(&self.config.table_prefix, table);
        let layout = StatementLayout::from_first(table_name, &first, &self.config)?;
        let mut batch = PendingBatch::new(layout.header.len());

        self.push(&layout, &mut batch, 0, first, &mut summary)?;
        for (index, item) in records {
            let record = self.prepare(index, item)?;
            self.push(&layout, &mut batch, index, record, &mut summary)?;
        }
        self.flush(&layout, &mut batch, &mut summary)?;

        info!(
            "Batch insert into {} wrote {} rows using {} statements",
            layout.table, summary.rows, summary.statements
        );

        Ok(summary)
    }

    fn prepare<R, S>(
        &self,
        index: usize,
        item: Result<R, S>,
    ) -> Result<Record, BatchInsertError<X::Error>>
    where
        R: Into<Record>,
        S: std::error::Error + Send + Sync + 'static,
    {
        let mut record: Record = item.map_err(|e| BatchInsertError::Source(Box::new(e)))?.into();

        if let Some(transformer) = &self.transformer {
            record = transformer.apply(record);
        }

        if let Some(validator) = &self.validator {
            if !validator.accepts(&record) {
                return Err(BatchInsertError::Validation {
                    validator: validator.name().to_string(),
                    index,
                });
            }
        }

        if let Some(sequence_column) = &self.config.sequence_column {
            record.remove(sequence_column);
        }

        if record.is_empty() {
            return Err(BatchInsertError::InputShape(format!(
                "item {} has no fields to insert",
                index
            )));
        }

        Ok(record)
    }

    fn push(
        &mut self,
        layout: &StatementLayout,
        batch: &mut PendingBatch,
        index: usize,
        record: Record,
        summary: &mut InsertSummary,
    ) -> Result<(), BatchInsertError<X::Error>> {
        let tuple = layout.tuple(index, record)?;
        let tuple_size = tuple_literal_len(&tuple);
        let limit = self.config.max_statement_bytes;

        if layout.header.len() + tuple_size > limit {
            return Err(BatchInsertError::SizeLimitExceeded { index, size: tuple_size, limit });
        }

        if batch.rows > 0 && (batch.size_with(tuple_size) > limit || batch.rows + 1 > layout.row_limit)
        {
            self.flush(layout, batch, summary)?;
        }

        batch.push(tuple, tuple_size);
        Ok(())
    }

    fn flush(
        &mut self,
        layout: &StatementLayout,
        batch: &mut PendingBatch,
        summary: &mut InsertSummary,
    ) -> Result<(), BatchInsertError<X::Error>> {
        if batch.rows == 0 {
            return Ok(());
        }

        let sql = layout.statement_sql(batch.rows);
        debug!(
            "Flushing {} rows ({} bytes estimated) into {}",
            batch.rows, batch.size, layout.table
        );

        let affected =
            self.executor.execute(&sql, &batch.values).map_err(BatchInsertError::Execution)?;

        summary.statements += 1;
        summary.rows += affected;
        batch.reset(layout.header.len());
        Ok(())
    }
}
