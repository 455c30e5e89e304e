use std::collections::VecDeque;

use tracing::{debug, warn};

use super::client::{PostgresClient, PostgresError};
use crate::database::{record::Record, recordset::RawCursor, value::Value};

/// Server-side `NO SCROLL` cursor read in batches of `fetch_size` rows.
///
/// Declared `WITH HOLD` and never opens or ends a transaction itself. Inside a caller
/// transaction it streams and is committed or rolled back with that transaction;
/// outside one the server materializes the result when the cursor is declared.
/// Release only closes the cursor, and dropping an unreleased cursor releases it.
pub struct PostgresCursor<'a> {
    client: &'a PostgresClient,
    name: String,
    fetch_size: usize,
    buffer: VecDeque<Record>,
    current: Option<Record>,
    drained: bool,
    released: bool,
}

impl<'a> PostgresCursor<'a> {
    pub(super) fn open(
        client: &'a PostgresClient,
        name: String,
        query: &str,
        params: &[Value],
        fetch_size: usize,
    ) -> Result<Self, PostgresError> {
        let declare = format!("DECLARE {} NO SCROLL CURSOR WITH HOLD FOR {}", name, query);
        client.execute(&declare, params)?;
        debug!("Declared cursor {}", name);

        let mut cursor = PostgresCursor {
            client,
            name,
            fetch_size: fetch_size.max(1),
            buffer: VecDeque::new(),
            current: None,
            drained: false,
            released: false,
        };

        // a failed first fetch drops the cursor here, which closes it
        cursor.advance()?;
        Ok(cursor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self) -> Result<(), PostgresError> {
        let fetch = format!("FETCH FORWARD {} FROM {}", self.fetch_size, self.name);
        let rows = self.client.query(&fetch, &[])?;
        debug!("Fetched {} rows from cursor {}", rows.len(), self.name);
        if rows.len() < self.fetch_size {
            self.drained = true;
        }
        self.buffer.extend(rows);
        Ok(())
    }
}

impl RawCursor for PostgresCursor<'_> {
    type Error = PostgresError;

    fn advance(&mut self) -> Result<(), Self::Error> {
        if self.buffer.is_empty() && !self.drained && !self.released {
            self.fetch()?;
        }
        self.current = self.buffer.pop_front();
        Ok(())
    }

    fn current_raw(&self) -> Option<&Record> {
        self.current.as_ref()
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.buffer.clear();
        self.current = None;

        self.client.batch_execute(&format!("CLOSE {}", self.name))?;
        debug!("Closed cursor {}", self.name);
        Ok(())
    }
}

impl Drop for PostgresCursor<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.release() {
                warn!("Failed to close cursor {} on drop: {}", self.name, e);
            }
        }
    }
}
