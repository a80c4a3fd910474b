use async_trait::async_trait;
use model::{pagination::cursor::Cursor, records::record::Record};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// A row that cannot be mapped onto the configured fields. The source has
    /// already moved past it, so the caller may skip it.
    #[error("Malformed record at line {line}: expected {expected} fields, found {found}")]
    Malformed {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A row whose bytes are not valid UTF-8. Like [`SourceError::Malformed`]
    /// the source has already moved past it.
    #[error("Invalid UTF-8 in record at line {line}")]
    InvalidUtf8 { line: u64 },

    #[error("I/O error reading source: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV decoding error: {0}")]
    Csv(#[from] csv::Error),
}

impl SourceError {
    /// Only bad rows can be skipped; anything else leaves the source in an
    /// unknown position.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            SourceError::Malformed { .. } | SourceError::InvalidUtf8 { .. }
        )
    }
}

/// Lazily produces input records and can resume from a [`Cursor`].
#[async_trait]
pub trait RecordSource: Send {
    /// Returns the next record, or `None` at end of input.
    async fn next(&mut self) -> Result<Option<Record>, SourceError>;

    /// Positions the source so the next record is the one at `cursor`.
    /// Seeking past the end leaves the source exhausted.
    async fn seek(&mut self, cursor: &Cursor) -> Result<(), SourceError>;

    /// Rows consumed so far, including skipped and malformed ones.
    fn position(&self) -> Cursor;
}
