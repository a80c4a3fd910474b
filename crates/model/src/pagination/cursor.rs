use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in a record source: the number of data rows consumed so far.
///
/// Skipped and malformed rows count, so a cursor always points just past
/// the last row the job has looked at.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct Cursor {
    pub offset: u64,
}

impl Cursor {
    pub const START: Cursor = Cursor { offset: 0 };

    pub fn new(offset: u64) -> Self {
        Cursor { offset }
    }

    pub fn advance(self, rows: u64) -> Self {
        Cursor {
            offset: self.offset + rows,
        }
    }

    pub fn is_start(&self) -> bool {
        self.offset == 0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.offset)
    }
}
