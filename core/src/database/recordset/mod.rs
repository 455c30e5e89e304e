//! Forward-only recordsets with lazy validation and transformation.

mod lazy;
mod memory;

use std::{fmt, str::FromStr};

pub use lazy::LazyRecordCursor;
pub use memory::MemoryCursor;

use crate::database::record::Record;

/// A forward-only streaming result positioned on its first record once opened.
///
/// Implemented once per driver. `release` is called at most once by
/// [`LazyRecordCursor`].
pub trait RawCursor {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Moves to the next raw record. Past the end this leaves the cursor without a
    /// current record.
    fn advance(&mut self) -> Result<(), Self::Error>;

    fn current_raw(&self) -> Option<&Record>;

    fn has_current(&self) -> bool {
        self.current_raw().is_some()
    }

    /// Frees the server-side or in-memory resources behind the cursor.
    fn release(&mut self) -> Result<(), Self::Error>;
}

#[derive(thiserror::Error, Debug)]
pub enum CursorError<E> {
    #[error("Recordset has already been closed")]
    Closed,

    #[error(transparent)]
    Source(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorState {
    Created,
    Iterating,
    Exhausted,
    Closed,
}

impl CursorState {
    pub const ALL: [CursorState; 4] =
        [CursorState::Created, CursorState::Iterating, CursorState::Exhausted, CursorState::Closed];

    pub fn as_str(&self) -> &'static str {
        match self {
            CursorState::Created => "created",
            CursorState::Iterating => "iterating",
            CursorState::Exhausted => "exhausted",
            CursorState::Closed => "closed",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, CursorState::Closed)
    }
}

impl fmt::Display for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("Unknown recordset state: {0}")]
pub struct ParseCursorStateError(String);

impl FromStr for CursorState {
    type Err = ParseCursorStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CursorState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ParseCursorStateError(s.to_string()))
    }
}
