use crate::{
    error::StoreError,
    state::models::{Checkpoint, JobRun, JobStatus},
};
use async_trait::async_trait;

pub mod memory;
pub mod models;
pub mod sled_store;

/// Durable record of job progress and run history.
///
/// Implementations must be usable before any source or sink activity starts
/// and must survive a process restart (except the in-memory store).
#[async_trait]
pub trait JobExecutionStore: Send + Sync {
    /// Persists `cp`, rejecting it with [`StoreError::Regression`] unless it is
    /// strictly ahead of the stored checkpoint.
    async fn save(&self, cp: &Checkpoint) -> Result<(), StoreError>;

    async fn load(&self, job_id: &str) -> Result<Option<Checkpoint>, StoreError>;

    /// Creates the next run for `job_id` in the RUNNING state.
    ///
    /// A previous run still marked RUNNING was abandoned by a crashed process;
    /// it is closed as FAILED before the new run is created.
    async fn start_run(&self, job_id: &str) -> Result<JobRun, StoreError>;

    /// Transitions the latest run of `job_id`.
    async fn mark_status(
        &self,
        job_id: &str,
        status: JobStatus,
        message: Option<String>,
    ) -> Result<JobRun, StoreError>;

    /// All runs of `job_id`, oldest first.
    async fn runs(&self, job_id: &str) -> Result<Vec<JobRun>, StoreError>;

    /// Removes the checkpoint and the run history of `job_id`.
    async fn clear(&self, job_id: &str) -> Result<(), StoreError>;
}

/// Job ids end up inside store keys, so they are limited to ASCII letters,
/// digits, `-`, `_` and `.`.
pub fn check_job_id(job_id: &str) -> Result<(), StoreError> {
    let valid = !job_id.is_empty()
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidJobId(job_id.to_string()))
    }
}

pub(crate) const ABANDONED: &str = "abandoned: superseded by a new run";

pub(crate) fn check_advance(current: Option<&Checkpoint>, next: &Checkpoint) -> Result<(), StoreError> {
    match current {
        Some(current) if !next.is_ahead_of(current) => Err(StoreError::Regression {
            job_id: next.job_id.clone(),
            current_sequence: current.last_committed_chunk_sequence,
            current_cursor: current.source_cursor.offset,
            attempted_sequence: next.last_committed_chunk_sequence,
            attempted_cursor: next.source_cursor.offset,
        }),
        _ => Ok(()),
    }
}
