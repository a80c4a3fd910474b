use crate::{
    error::{JobErrorKind, JobFailure},
    listener::JobListener,
    reader::{ChunkReader, SkipPolicy},
    state_manager::StateManager,
    transform::RecordTransformer,
    writer::ChunkWriterService,
};
use connectors::{sink::ChunkWriter, source::RecordSource};
use engine_config::settings::validated::ValidatedSettings;
use engine_core::{
    metrics::Metrics,
    retry::RetryPolicy,
    state::{JobExecutionStore, models::JobStatus},
};
use model::{pagination::cursor::Cursor, records::chunk::Chunk};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    LoadingCheckpoint,
    Running,
    Completed,
    Failed,
}

/// Summary of one run, returned on success and handed to listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub run_number: u64,
    pub status: JobStatus,
    pub chunks_committed: u64,
    pub chunks_already_applied: u64,
    pub records_read: u64,
    /// Rows committed by this run.
    pub records_written: u64,
    pub records_skipped: u64,
    pub records_filtered: u64,
    pub retry_count: u64,
    /// Rows in the sink for this job across all runs.
    pub rows_written: u64,
    pub last_chunk_sequence: u64,
    pub cursor: Cursor,
}

impl JobReport {
    pub fn new(job_id: &str, run_number: u64) -> Self {
        Self {
            job_id: job_id.to_string(),
            run_number,
            status: JobStatus::Running,
            chunks_committed: 0,
            chunks_already_applied: 0,
            records_read: 0,
            records_written: 0,
            records_skipped: 0,
            records_filtered: 0,
            retry_count: 0,
            rows_written: 0,
            last_chunk_sequence: 0,
            cursor: Cursor::START,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub job_id: String,
    pub chunk_size: usize,
    pub skip: SkipPolicy,
    pub retry: RetryPolicy,
}

impl OrchestratorConfig {
    pub fn new(job_id: &str, chunk_size: usize) -> Self {
        Self {
            job_id: job_id.to_string(),
            chunk_size: chunk_size.max(1),
            skip: SkipPolicy::default(),
            retry: RetryPolicy::no_retry(),
        }
    }

    pub fn with_skip_policy(mut self, skip: SkipPolicy) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl From<&ValidatedSettings> for OrchestratorConfig {
    fn from(settings: &ValidatedSettings) -> Self {
        let retry = match settings.write_retries() {
            0 => RetryPolicy::no_retry(),
            n => RetryPolicy::with_retries(n, settings.retry_backoff),
        };
        OrchestratorConfig::new(&settings.job_id, settings.chunk_size)
            .with_skip_policy(SkipPolicy::from_settings(settings))
            .with_retry(retry)
    }
}

/// Committed position of the job, as last saved to the store.
#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    sequence: u64,
    cursor: Cursor,
    rows_written: u64,
}

/// Drives one job: read a chunk, transform it, write it, checkpoint, repeat.
pub struct ChunkOrchestrator {
    config: OrchestratorConfig,
    reader: ChunkReader,
    writer: ChunkWriterService,
    state: StateManager,
    listeners: Vec<Arc<dyn JobListener>>,
    cancel: CancellationToken,
    metrics: Metrics,
    phase: Phase,
    progress: Progress,
    report: JobReport,
}

impl ChunkOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        source: Box<dyn RecordSource>,
        transformer: Arc<dyn RecordTransformer>,
        writer: Arc<dyn ChunkWriter>,
        store: Arc<dyn JobExecutionStore>,
    ) -> Self {
        let metrics = Metrics::new();
        let reader = ChunkReader::new(source, transformer, config.skip, metrics.clone());
        let writer = ChunkWriterService::new(writer, config.retry.clone(), metrics.clone());
        let state = StateManager::new(&config.job_id, store);
        let report = JobReport::new(&config.job_id, 0);

        Self {
            config,
            reader,
            writer,
            state,
            listeners: Vec::new(),
            cancel: CancellationToken::new(),
            metrics,
            phase: Phase::Init,
            progress: Progress::default(),
            report,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn JobListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub async fn run(&mut self) -> Result<JobReport, JobFailure> {
        self.phase = Phase::Init;
        let run = match self.state.begin_run().await {
            Ok(run) => run,
            Err(err) => {
                // No run exists to mark failed.
                self.phase = Phase::Failed;
                self.report.status = JobStatus::Failed;
                return Err(self.failure(err.into()));
            }
        };
        self.report.run_number = run.run_number;

        for listener in &self.listeners {
            listener.before_job(&run).await;
        }

        match self.execute().await {
            Ok(()) => self.complete().await,
            Err(kind) => Err(self.fail(kind).await),
        }
    }

    async fn execute(&mut self) -> Result<(), JobErrorKind> {
        self.phase = Phase::LoadingCheckpoint;
        if let Some(cp) = self.state.load_checkpoint().await? {
            self.progress = Progress {
                sequence: cp.last_committed_chunk_sequence,
                cursor: cp.source_cursor,
                rows_written: cp.rows_written,
            };
        }
        self.sync_report();
        self.reader.seek(&self.progress.cursor).await?;

        self.phase = Phase::Running;
        loop {
            if self.cancel.is_cancelled() {
                return Err(JobErrorKind::Cancelled);
            }

            let assembled = self.reader.read_chunk(self.config.chunk_size).await?;

            if !assembled.records.is_empty() {
                let sequence = self.progress.sequence + 1;
                let chunk = Chunk::new(
                    &self.config.job_id,
                    sequence,
                    assembled.records,
                    self.progress.cursor,
                    assembled.end,
                );

                self.writer.write_chunk(&chunk).await?;

                let rows_written = self.progress.rows_written + chunk.len() as u64;
                self.state.commit(sequence, chunk.end, rows_written).await?;
                self.progress = Progress {
                    sequence,
                    cursor: chunk.end,
                    rows_written,
                };
            } else if assembled.end > self.progress.cursor {
                // Only skipped or filtered rows remain; move past them.
                let Progress {
                    sequence,
                    rows_written,
                    ..
                } = self.progress;
                self.state.commit(sequence, assembled.end, rows_written).await?;
                self.progress.cursor = assembled.end;
            }

            self.sync_report();

            if assembled.exhausted {
                return Ok(());
            }
        }
    }

    async fn complete(&mut self) -> Result<JobReport, JobFailure> {
        if let Err(err) = self.state.finish(JobStatus::Completed, None).await {
            return Err(self.fail(err.into()).await);
        }

        self.phase = Phase::Completed;
        self.report.status = JobStatus::Completed;
        self.sync_report();

        info!(
            job_id = %self.report.job_id,
            run = self.report.run_number,
            chunks = self.report.chunks_committed,
            already_applied = self.report.chunks_already_applied,
            read = self.report.records_read,
            written = self.report.records_written,
            skipped = self.report.records_skipped,
            filtered = self.report.records_filtered,
            cursor = %self.report.cursor,
            "Job completed"
        );

        for listener in &self.listeners {
            listener.after_job(&self.report).await;
        }

        Ok(self.report.clone())
    }

    async fn fail(&mut self, kind: JobErrorKind) -> JobFailure {
        self.phase = Phase::Failed;
        self.report.status = JobStatus::Failed;
        self.sync_report();

        self.state.finish_failed(kind.exit_message()).await;

        let failure = self.failure(kind);
        if failure.is_cancelled() {
            info!(
                job_id = %failure.job_id,
                cursor = %failure.cursor,
                "Job cancelled, progress saved at last committed chunk"
            );
        } else {
            error!(
                job_id = %failure.job_id,
                chunk = failure.chunk_sequence,
                cursor = %failure.cursor,
                error = %failure,
                "Job failed"
            );
        }

        for listener in &self.listeners {
            listener.after_job(&self.report).await;
        }

        failure
    }

    fn failure(&self, kind: JobErrorKind) -> JobFailure {
        JobFailure {
            job_id: self.config.job_id.clone(),
            run_number: self.report.run_number,
            chunk_sequence: self.progress.sequence + 1,
            cursor: self.progress.cursor,
            kind,
        }
    }

    fn sync_report(&mut self) {
        let snap = self.metrics.snapshot();
        let report = &mut self.report;
        report.chunks_committed = snap.chunks_committed;
        report.chunks_already_applied = snap.chunks_already_applied;
        report.records_read = snap.records_read;
        report.records_written = snap.records_written;
        report.records_skipped = snap.records_skipped;
        report.records_filtered = snap.records_filtered;
        report.retry_count = snap.retry_count;
        report.rows_written = self.progress.rows_written;
        report.last_chunk_sequence = self.progress.sequence;
        report.cursor = self.progress.cursor;
    }
}
