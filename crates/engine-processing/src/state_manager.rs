use engine_core::{
    error::StoreError,
    state::{
        JobExecutionStore,
        models::{Checkpoint, JobRun, JobStatus},
    },
};
use model::pagination::cursor::Cursor;
use std::sync::Arc;
use tracing::{info, warn};

/// Run lifecycle and checkpoint bookkeeping for one job.
pub struct StateManager {
    job_id: String,
    store: Arc<dyn JobExecutionStore>,
}

impl StateManager {
    pub fn new(job_id: &str, store: Arc<dyn JobExecutionStore>) -> Self {
        Self {
            job_id: job_id.to_string(),
            store,
        }
    }

    pub async fn begin_run(&self) -> Result<JobRun, StoreError> {
        let run = self.store.start_run(&self.job_id).await?;
        info!(job_id = %self.job_id, run = run.run_number, "Job run started");
        Ok(run)
    }

    pub async fn load_checkpoint(&self) -> Result<Option<Checkpoint>, StoreError> {
        let checkpoint = self.store.load(&self.job_id).await?;
        match &checkpoint {
            Some(cp) => info!(
                job_id = %self.job_id,
                chunk = cp.last_committed_chunk_sequence,
                cursor = %cp.source_cursor,
                rows_written = cp.rows_written,
                "Resuming from checkpoint"
            ),
            None => info!(job_id = %self.job_id, "No checkpoint found, starting from the beginning"),
        }
        Ok(checkpoint)
    }

    /// Records that everything up to `cursor` is durably in the sink.
    pub async fn commit(
        &self,
        sequence: u64,
        cursor: Cursor,
        rows_written: u64,
    ) -> Result<Checkpoint, StoreError> {
        let checkpoint = Checkpoint::new(&self.job_id, sequence, cursor, rows_written);
        self.store.save(&checkpoint).await?;
        Ok(checkpoint)
    }

    pub async fn finish(&self, status: JobStatus, message: Option<String>) -> Result<JobRun, StoreError> {
        self.store.mark_status(&self.job_id, status, message).await
    }

    /// Marks the run as failed, logging instead of returning a store error so
    /// the original failure is the one reported.
    pub async fn finish_failed(&self, message: String) -> Option<JobRun> {
        match self.finish(JobStatus::Failed, Some(message)).await {
            Ok(run) => Some(run),
            Err(err) => {
                warn!(job_id = %self.job_id, error = %err, "Failed to record run failure");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::state::memory::MemoryJobStore;

    #[tokio::test]
    async fn commits_and_finishes() {
        let store = Arc::new(MemoryJobStore::new());
        let manager = StateManager::new("people", store.clone());

        let run = manager.begin_run().await.unwrap();
        assert_eq!(run.run_number, 1);
        assert!(manager.load_checkpoint().await.unwrap().is_none());

        manager.commit(1, Cursor::new(2), 2).await.unwrap();
        let err = manager.commit(1, Cursor::new(2), 2).await.unwrap_err();
        assert!(matches!(err, StoreError::Regression { .. }));

        let run = manager.finish_failed("boom".into()).await.unwrap();
        assert_eq!(run.status, JobStatus::Failed);

        let cp = manager.load_checkpoint().await.unwrap().unwrap();
        assert_eq!(cp.source_cursor, Cursor::new(2));
    }
}
