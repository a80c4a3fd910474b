use crate::orchestrator::JobReport;
use async_trait::async_trait;
use connectors::sink::ChunkWriter;
use engine_core::state::models::{JobRun, JobStatus};
use std::sync::Arc;
use tracing::{info, warn};

/// Hooks around a job run. Listener failures never change the run outcome.
#[async_trait]
pub trait JobListener: Send + Sync {
    async fn before_job(&self, _run: &JobRun) {}

    async fn after_job(&self, _report: &JobReport) {}
}

/// After a completed run, reads back a sample of the sink table and logs it.
pub struct SinkVerificationListener {
    writer: Arc<dyn ChunkWriter>,
    limit: usize,
}

impl SinkVerificationListener {
    pub fn new(writer: Arc<dyn ChunkWriter>, limit: usize) -> Self {
        Self { writer, limit }
    }
}

#[async_trait]
impl JobListener for SinkVerificationListener {
    async fn after_job(&self, report: &JobReport) {
        if report.status != JobStatus::Completed {
            return;
        }

        info!("!!! JOB FINISHED! Time to verify the results");

        match self.writer.sample_rows(self.limit).await {
            Ok(rows) => {
                for row in rows {
                    info!("Found <{row}> in the database.");
                }
            }
            Err(err) => warn!(
                job_id = %report.job_id,
                sink = %self.writer.describe(),
                error = %err,
                "Could not read back sink rows"
            ),
        }
    }
}
