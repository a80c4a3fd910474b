use chrono::{DateTime, Utc};
use model::pagination::cursor::Cursor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Durable progress marker for one job. Saved once per committed chunk.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub job_id: String,
    pub last_committed_chunk_sequence: u64,
    pub source_cursor: Cursor,
    pub rows_written: u64,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(job_id: &str, sequence: u64, cursor: Cursor, rows_written: u64) -> Self {
        Checkpoint {
            job_id: job_id.to_string(),
            last_committed_chunk_sequence: sequence,
            source_cursor: cursor,
            rows_written,
            updated_at: Utc::now(),
        }
    }

    /// A checkpoint may only replace one it is strictly ahead of: neither the
    /// sequence nor the cursor may move back, and at least one must move forward.
    pub fn is_ahead_of(&self, current: &Checkpoint) -> bool {
        self.last_committed_chunk_sequence >= current.last_committed_chunk_sequence
            && self.source_cursor >= current.source_cursor
            && (self.last_committed_chunk_sequence > current.last_committed_chunk_sequence
                || self.source_cursor > current.source_cursor)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution attempt of a job.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct JobRun {
    pub job_id: String,
    pub run_number: u64,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_message: Option<String>,
}

impl JobRun {
    pub fn started(job_id: &str, run_number: u64) -> Self {
        JobRun {
            job_id: job_id.to_string(),
            run_number,
            status: JobStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            exit_message: None,
        }
    }

    /// Moves the run to `status`. Returns `false` when the run is already terminal.
    pub fn transition(&mut self, status: JobStatus, message: Option<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        if status.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        if message.is_some() {
            self.exit_message = message;
        }
        true
    }
}
