use tracing::{trace, warn};

use super::{CursorError, CursorState, RawCursor};
use crate::database::{
    record::Record,
    transform::{Transformer, Validator},
};

/// Filtered and mapped view over a [`RawCursor`].
///
/// The validator sees each raw record as the source produced it; the processor only
/// shapes what [`LazyRecordCursor::current`] returns. Nothing is read ahead beyond
/// what is needed to answer [`LazyRecordCursor::valid`].
///
/// The source is released exactly once, by [`LazyRecordCursor::close`] or on drop.
pub struct LazyRecordCursor<C: RawCursor> {
    inner: C,
    validator: Option<Validator>,
    processor: Option<Transformer>,
    state: CursorState,
    position: usize,
    errored: bool,
}

impl<C: RawCursor> LazyRecordCursor<C> {
    pub fn new(inner: C) -> Self {
        LazyRecordCursor {
            inner,
            validator: None,
            processor: None,
            state: CursorState::Created,
            position: 0,
            errored: false,
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.set_validator(validator);
        self
    }

    pub fn with_processor(mut self, processor: Transformer) -> Self {
        self.set_processor(processor);
        self
    }

    pub fn set_validator(&mut self, validator: Validator) {
        self.validator = Some(validator);
    }

    pub fn set_processor(&mut self, processor: Transformer) {
        self.processor = Some(processor);
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Zero-based position of the current raw record in the source.
    pub fn key(&self) -> usize {
        self.position
    }

    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    /// The current record passed through the processor, `None` past the end.
    pub fn current(&self) -> Result<Option<Record>, CursorError<C::Error>> {
        self.ensure_open()?;

        let record = self.inner.current_raw().cloned();
        Ok(match &self.processor {
            Some(processor) => record.map(|record| processor.apply(record)),
            None => record,
        })
    }

    /// Whether the cursor sits on an accepted record. Records the validator rejects are
    /// skipped here, so this can move the cursor forward.
    pub fn valid(&mut self) -> Result<bool, CursorError<C::Error>> {
        self.ensure_open()?;

        loop {
            if !self.inner.has_current() {
                self.state = CursorState::Exhausted;
                return Ok(false);
            }

            let accepted = match (self.inner.current_raw(), &self.validator) {
                (Some(raw), Some(validator)) => validator.accepts(raw),
                (Some(_), None) => true,
                (None, _) => false,
            };

            if accepted {
                self.state = CursorState::Iterating;
                return Ok(true);
            }

            trace!("Recordset skipping record {} rejected by validator", self.position);
            self.step()?;
        }
    }

    /// Moves forward by exactly one raw record without validating it.
    pub fn advance(&mut self) -> Result<(), CursorError<C::Error>> {
        self.ensure_open()?;

        if self.inner.has_current() {
            self.step()?;
        }
        if self.state == CursorState::Created {
            self.state = CursorState::Iterating;
        }
        Ok(())
    }

    /// Recordsets are forward only, this does nothing.
    pub fn rewind(&mut self) {}

    /// Releases the source. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<(), CursorError<C::Error>> {
        if self.state.is_closed() {
            return Ok(());
        }
        self.state = CursorState::Closed;
        self.inner.release().map_err(CursorError::Source)
    }

    fn next_accepted(&mut self) -> Result<Option<Record>, CursorError<C::Error>> {
        if !self.valid()? {
            return Ok(None);
        }
        let record = self.current()?;
        self.advance()?;
        Ok(record)
    }

    fn step(&mut self) -> Result<(), CursorError<C::Error>> {
        self.inner.advance().map_err(CursorError::Source)?;
        self.position += 1;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), CursorError<C::Error>> {
        if self.state.is_closed() {
            Err(CursorError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Yields accepted records in source order. The first error ends the iteration.
impl<C: RawCursor> Iterator for LazyRecordCursor<C> {
    type Item = Result<Record, CursorError<C::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.errored {
            return None;
        }

        let item = self.next_accepted().transpose();
        if matches!(item, Some(Err(_))) {
            self.errored = true;
        }
        item
    }
}

impl<C: RawCursor> Drop for LazyRecordCursor<C> {
    fn drop(&mut self) {
        if !self.state.is_closed() {
            self.state = CursorState::Closed;
            if let Err(e) = self.inner.release() {
                warn!("Failed to release recordset on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::database::{recordset::MemoryCursor, value::Value};

    fn users() -> Vec<Record> {
        vec![
            Record::new().with("id", 1).with("username", "guest"),
            Record::new().with("id", 2).with("username", "admin"),
        ]
    }

    fn recordset(records: Vec<Record>) -> LazyRecordCursor<MemoryCursor<std::vec::IntoIter<Record>>> {
        LazyRecordCursor::new(MemoryCursor::from_records(records))
    }

    fn drain<C: RawCursor>(cursor: &mut LazyRecordCursor<C>) -> Vec<Record> {
        cursor.by_ref().collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[derive(thiserror::Error, Debug)]
    #[error("server closed the connection")]
    struct ConnectionLost;

    /// Fails once `remaining` advances have been used up.
    struct FlakyCursor {
        current: Option<Record>,
        remaining: usize,
        releases: Rc<Cell<usize>>,
    }

    impl RawCursor for FlakyCursor {
        type Error = ConnectionLost;

        fn advance(&mut self) -> Result<(), Self::Error> {
            if self.remaining == 0 {
                return Err(ConnectionLost);
            }
            self.remaining -= 1;
            self.current = Some(Record::new().with("n", self.remaining as i64));
            Ok(())
        }

        fn current_raw(&self) -> Option<&Record> {
            self.current.as_ref()
        }

        fn release(&mut self) -> Result<(), Self::Error> {
            self.releases.set(self.releases.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_constructor() {
        let mut cursor = recordset(users());
        assert_eq!(cursor.state(), CursorState::Created);
        cursor.close().unwrap();

        let mut empty = recordset(Vec::new());
        assert!(!empty.valid().unwrap());
        assert_eq!(empty.state(), CursorState::Exhausted);
        assert_eq!(empty.current().unwrap(), None);
        empty.close().unwrap();
    }

    #[test]
    fn test_validator_accepting_everything_changes_nothing() {
        let mut cursor = recordset(users()).with_validator(Validator::new("all", |_| true));

        assert_eq!(drain(&mut cursor), users());
        cursor.close().unwrap();
    }

    #[test]
    fn test_validator_rejecting_everything_yields_nothing() {
        let mut cursor = recordset(users()).with_validator(Validator::new("none", |_| false));

        assert!(drain(&mut cursor).is_empty());
        assert_eq!(cursor.state(), CursorState::Exhausted);
        assert_eq!(cursor.key(), 2);
        cursor.close().unwrap();
    }

    #[test]
    fn test_validator_filters_records() {
        let mut cursor = recordset(users()).with_validator(Validator::new("is_admin", |item| {
            item.get("username") == Some(&Value::from("admin"))
        }));

        let items = drain(&mut cursor);
        cursor.close().unwrap();

        assert_eq!(items, vec![users()[1].clone()]);
    }

    #[test]
    fn test_validator_args() {
        let check_username = Validator::with_args(
            "check_username",
            |item, args| item.get("username") == args.first(),
            vec![Value::from("guest")],
        );
        let mut cursor = recordset(users()).with_validator(check_username);

        let items = drain(&mut cursor);
        cursor.close().unwrap();

        assert_eq!(items, vec![users()[0].clone()]);
    }

    #[test]
    fn test_processor() {
        let mut cursor = recordset(users())
            .with_processor(Transformer::new("add_property", |item| item.with("newproperty", true)));

        let items = drain(&mut cursor);
        cursor.close().unwrap();

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.get("newproperty") == Some(&Value::Bool(true))));
    }

    #[test]
    fn test_processor_args() {
        let processor = Transformer::with_args(
            "set_property",
            |item, args| item.with("newproperty", args[0].clone()),
            vec![Value::from("data")],
        );
        let mut cursor = recordset(users()).with_processor(processor);

        for item in drain(&mut cursor) {
            assert_eq!(item.get("newproperty"), Some(&Value::from("data")));
        }
        cursor.close().unwrap();
    }

    #[test]
    fn test_processor_uses_record_contents() {
        let mut cursor = recordset(users()).with_processor(Transformer::new("first_initial", |item| {
            let initial = item
                .get("username")
                .and_then(Value::as_str)
                .and_then(|name| name.chars().next())
                .map(String::from);
            item.with("firstinitial", initial)
        }));

        let initials: Vec<Value> =
            drain(&mut cursor).iter().filter_map(|item| item.get("firstinitial").cloned()).collect();
        cursor.close().unwrap();

        assert_eq!(initials, vec![Value::from("g"), Value::from("a")]);
    }

    #[test]
    fn test_validator_sees_raw_record() {
        let mut cursor = recordset(users())
            .with_processor(Transformer::new("rename", |mut item| {
                let username = item.remove("username");
                item.with("login", username)
            }))
            .with_validator(Validator::new("raw_username", |item| item.contains("username")));

        let items = drain(&mut cursor);
        cursor.close().unwrap();

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.contains("login") && !item.contains("username")));
    }

    #[test]
    fn test_subset_in_original_order() {
        let records: Vec<Record> = (0..20).map(|i| Record::new().with("n", i)).collect();
        let mut cursor = recordset(records)
            .with_validator(Validator::new("multiple_of_three", |item| {
                item.get("n").and_then(Value::as_i64).is_some_and(|n| n % 3 == 0)
            }))
            .with_processor(Transformer::new("negate", |item| {
                item.map_values(|_, value| Value::Int(-value.as_i64().unwrap_or_default()))
            }));

        let values: Vec<i64> =
            drain(&mut cursor).iter().filter_map(|item| item.get("n").and_then(Value::as_i64)).collect();
        cursor.close().unwrap();

        assert_eq!(values, vec![0, -3, -6, -9, -12, -15, -18]);
    }

    #[test]
    fn test_long_run_of_rejected_records() {
        let records = (0..200_000).map(|i| Record::new().with("n", i as i64));
        let mut cursor = LazyRecordCursor::new(MemoryCursor::new(records))
            .with_validator(Validator::new("last_only", |item| {
                item.get("n") == Some(&Value::Int(199_999))
            }));

        assert!(cursor.valid().unwrap());
        assert_eq!(cursor.key(), 199_999);
        cursor.close().unwrap();
    }

    #[test]
    fn test_valid_skips_as_side_effect_but_advance_does_not_validate() {
        let mut cursor = recordset(users()).with_validator(Validator::new("is_admin", |item| {
            item.get("username") == Some(&Value::from("admin"))
        }));

        // Raw position before any validation is the rejected guest row.
        assert_eq!(cursor.current().unwrap(), Some(users()[0].clone()));
        assert!(cursor.valid().unwrap());
        assert_eq!(cursor.key(), 1);
        assert_eq!(cursor.current().unwrap(), Some(users()[1].clone()));

        cursor.advance().unwrap();
        assert_eq!(cursor.current().unwrap(), None);
        assert!(!cursor.valid().unwrap());
        cursor.close().unwrap();
    }

    #[test]
    fn test_validator_set_during_iteration() {
        let records: Vec<Record> = (0..4).map(|i| Record::new().with("n", i)).collect();
        let mut cursor = recordset(records);

        let first = cursor.next().unwrap().unwrap();
        cursor.set_validator(Validator::new("odd", |item| {
            item.get("n").and_then(Value::as_i64).is_some_and(|n| n % 2 == 1)
        }));
        let rest = drain(&mut cursor);
        cursor.close().unwrap();

        assert_eq!(first.get("n"), Some(&Value::Int(0)));
        assert_eq!(rest, vec![Record::new().with("n", 1), Record::new().with("n", 3)]);
    }

    #[test]
    fn test_no_records_after_exhausted() {
        let mut cursor = recordset(users());

        assert_eq!(drain(&mut cursor).len(), 2);
        cursor.rewind();
        assert!(drain(&mut cursor).is_empty());
        assert_eq!(cursor.state(), CursorState::Exhausted);
        cursor.close().unwrap();
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut cursor = recordset(users());

        cursor.close().unwrap();
        cursor.close().unwrap();

        assert_eq!(cursor.state(), CursorState::Closed);
        assert_eq!(cursor.get_ref().release_count(), 1);
    }

    #[test]
    fn test_use_after_close_fails() {
        let mut cursor = recordset(users());
        cursor.close().unwrap();

        assert!(matches!(cursor.valid(), Err(CursorError::Closed)));
        assert!(matches!(cursor.current(), Err(CursorError::Closed)));
        assert!(matches!(cursor.advance(), Err(CursorError::Closed)));
        assert!(matches!(cursor.next(), Some(Err(CursorError::Closed))));
        assert!(cursor.next().is_none());
    }

    #[test]
    fn test_drop_releases_once() {
        let releases = Rc::new(Cell::new(0));

        let cursor = LazyRecordCursor::new(FlakyCursor {
            current: Some(Record::new().with("n", 3)),
            remaining: 3,
            releases: Rc::clone(&releases),
        });
        drop(cursor);
        assert_eq!(releases.get(), 1);

        let mut closed = LazyRecordCursor::new(FlakyCursor {
            current: None,
            remaining: 0,
            releases: Rc::clone(&releases),
        });
        closed.close().unwrap();
        drop(closed);
        assert_eq!(releases.get(), 2);
    }

    #[test]
    fn test_source_error_propagates() {
        let releases = Rc::new(Cell::new(0));
        let mut cursor = LazyRecordCursor::new(FlakyCursor {
            current: Some(Record::new().with("n", 1)),
            remaining: 1,
            releases: Rc::clone(&releases),
        });

        assert!(cursor.next().unwrap().is_ok());
        let error = cursor.next().unwrap().unwrap_err();

        assert!(matches!(error, CursorError::Source(ConnectionLost)));
        assert_eq!(error.to_string(), "server closed the connection");
        cursor.close().unwrap();
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn test_iteration_stops_after_source_error() {
        let releases = Rc::new(Cell::new(0));
        let cursor = LazyRecordCursor::new(FlakyCursor {
            current: Some(Record::new().with("n", 1)),
            remaining: 0,
            releases: Rc::clone(&releases),
        });

        // a loop that drops errors must still terminate
        let results: Vec<_> = cursor.take(10).collect();

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(CursorError::Source(ConnectionLost))));
        assert_eq!(releases.get(), 1);
    }
}
