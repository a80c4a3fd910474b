use crate::{
    error::StoreError,
    state::{
        ABANDONED, JobExecutionStore, check_advance, check_job_id,
        models::{Checkpoint, JobRun, JobStatus},
    },
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Jobs {
    checkpoints: HashMap<String, Checkpoint>,
    runs: HashMap<String, Vec<JobRun>>,
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Jobs>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobExecutionStore for MemoryJobStore {
    async fn save(&self, cp: &Checkpoint) -> Result<(), StoreError> {
        check_job_id(&cp.job_id)?;
        let mut jobs = self.jobs.lock().await;
        check_advance(jobs.checkpoints.get(&cp.job_id), cp)?;
        jobs.checkpoints.insert(cp.job_id.clone(), cp.clone());
        Ok(())
    }

    async fn load(&self, job_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        check_job_id(job_id)?;
        Ok(self.jobs.lock().await.checkpoints.get(job_id).cloned())
    }

    async fn start_run(&self, job_id: &str) -> Result<JobRun, StoreError> {
        check_job_id(job_id)?;
        let mut jobs = self.jobs.lock().await;
        let runs = jobs.runs.entry(job_id.to_string()).or_default();
        if let Some(last) = runs.last_mut() {
            last.transition(JobStatus::Failed, Some(ABANDONED.to_string()));
        }
        let run = JobRun::started(job_id, runs.len() as u64 + 1);
        runs.push(run.clone());
        Ok(run)
    }

    async fn mark_status(
        &self,
        job_id: &str,
        status: JobStatus,
        message: Option<String>,
    ) -> Result<JobRun, StoreError> {
        check_job_id(job_id)?;
        let mut jobs = self.jobs.lock().await;
        let run = jobs
            .runs
            .get_mut(job_id)
            .and_then(|runs| runs.last_mut())
            .ok_or_else(|| StoreError::NoRun(job_id.to_string()))?;

        if !run.transition(status, message) {
            return Err(StoreError::TerminalRun {
                job_id: job_id.to_string(),
                run_number: run.run_number,
                status: run.status,
            });
        }
        Ok(run.clone())
    }

    async fn runs(&self, job_id: &str) -> Result<Vec<JobRun>, StoreError> {
        check_job_id(job_id)?;
        Ok(self
            .jobs
            .lock()
            .await
            .runs
            .get(job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear(&self, job_id: &str) -> Result<(), StoreError> {
        check_job_id(job_id)?;
        let mut jobs = self.jobs.lock().await;
        jobs.checkpoints.remove(job_id);
        jobs.runs.remove(job_id);
        Ok(())
    }
}
