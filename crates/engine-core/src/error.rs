use crate::state::models::JobStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store could not be read or written. Always fatal for a job.
    #[error("Job store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt job store entry '{key}': {message}")]
    Corrupt { key: String, message: String },

    #[error(
        "Checkpoint for job '{job_id}' would move from chunk {current_sequence} (cursor {current_cursor}) to chunk {attempted_sequence} (cursor {attempted_cursor})"
    )]
    Regression {
        job_id: String,
        current_sequence: u64,
        current_cursor: u64,
        attempted_sequence: u64,
        attempted_cursor: u64,
    },

    #[error("Run {run_number} of job '{job_id}' is already {status}")]
    TerminalRun {
        job_id: String,
        run_number: u64,
        status: JobStatus,
    },

    #[error("Invalid job id '{0}': only ASCII letters, digits, '-', '_' and '.' are allowed")]
    InvalidJobId(String),

    #[error("No run has been started for job '{0}'")]
    NoRun(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Unavailable(format!("serialization failed: {err}"))
    }
}
