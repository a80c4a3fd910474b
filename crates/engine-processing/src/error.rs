use crate::transform::error::TransformError;
use connectors::{sink::SinkError, source::SourceError};
use engine_core::error::StoreError;
use model::pagination::cursor::Cursor;
use thiserror::Error;

/// Why a job stopped.
#[derive(Error, Debug)]
pub enum JobErrorKind {
    #[error("{0}")]
    SourceRead(#[from] SourceError),

    #[error("{0}")]
    Transform(#[from] TransformError),

    #[error("{error} (after {attempts} attempt(s))")]
    Write {
        #[source]
        error: SinkError,
        attempts: usize,
    },

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("skipped {skipped} records, over the limit of {limit}")]
    SkipLimitExceeded { limit: u64, skipped: u64 },

    #[error("cancelled")]
    Cancelled,
}

impl JobErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobErrorKind::SourceRead(_) => "SourceReadError",
            JobErrorKind::Transform(_) => "TransformError",
            JobErrorKind::Write { .. } => "WriteError",
            JobErrorKind::Store(StoreError::Unavailable(_)) => "StoreUnavailable",
            JobErrorKind::Store(_) => "StoreError",
            JobErrorKind::SkipLimitExceeded { .. } => "SkipLimitExceeded",
            JobErrorKind::Cancelled => "Cancelled",
        }
    }

    /// Message stored on the failed run.
    pub fn exit_message(&self) -> String {
        match self {
            JobErrorKind::Cancelled => "cancelled".to_string(),
            other => format!("{}: {}", other.name(), other),
        }
    }
}

/// A failed run: what went wrong and where the job stopped.
#[derive(Error, Debug)]
#[error(
    "{} in job '{job_id}' at chunk {chunk_sequence} (resume cursor {cursor}): {kind}",
    .kind.name()
)]
pub struct JobFailure {
    pub job_id: String,
    pub run_number: u64,
    /// The chunk being assembled or written when the run stopped.
    pub chunk_sequence: u64,
    /// Last committed cursor; the next run resumes here.
    pub cursor: Cursor,
    #[source]
    pub kind: JobErrorKind,
}

impl JobFailure {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, JobErrorKind::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_names_kind_job_chunk_and_cursor() {
        let failure = JobFailure {
            job_id: "people".into(),
            run_number: 1,
            chunk_sequence: 2,
            cursor: Cursor::new(4),
            kind: JobErrorKind::Transform(TransformError::MissingField {
                rule: "uppercase",
                field: "lastName".into(),
            }),
        };

        let text = failure.to_string();
        assert!(text.starts_with("TransformError in job 'people' at chunk 2 (resume cursor 4)"));
        assert!(text.contains("lastName"));
        assert!(!failure.is_cancelled());
    }

    #[test]
    fn cancelled_exit_message() {
        assert_eq!(JobErrorKind::Cancelled.exit_message(), "cancelled");
        assert_eq!(
            JobErrorKind::Store(StoreError::Unavailable("disk".into())).name(),
            "StoreUnavailable"
        );
    }
}
