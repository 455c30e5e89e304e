use std::convert::Infallible;

use super::RawCursor;
use crate::database::record::Record;

/// Raw cursor over any in-process record iterator.
///
/// Pulls one record ahead so the cursor is positioned on the first record as soon
/// as it is created, the way a driver cursor is after the query has executed.
pub struct MemoryCursor<I: Iterator<Item = Record>> {
    source: Option<I>,
    current: Option<Record>,
    releases: usize,
}

impl MemoryCursor<std::vec::IntoIter<Record>> {
    pub fn from_records(records: Vec<Record>) -> Self {
        Self::new(records.into_iter())
    }
}

impl<I: Iterator<Item = Record>> MemoryCursor<I> {
    pub fn new(mut source: I) -> Self {
        let current = source.next();
        MemoryCursor { source: Some(source), current, releases: 0 }
    }

    /// Number of times [`RawCursor::release`] was called.
    pub fn release_count(&self) -> usize {
        self.releases
    }
}

impl<I: Iterator<Item = Record>> RawCursor for MemoryCursor<I> {
    type Error = Infallible;

    fn advance(&mut self) -> Result<(), Self::Error> {
        self.current = self.source.as_mut().and_then(Iterator::next);
        Ok(())
    }

    fn current_raw(&self) -> Option<&Record> {
        self.current.as_ref()
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        self.releases += 1;
        self.source = None;
        self.current = None;
        Ok(())
    }
}
