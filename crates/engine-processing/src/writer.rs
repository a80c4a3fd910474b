use crate::{error::JobErrorKind, retry::classify_sink_error};
use connectors::sink::{ChunkWriter, WriteOutcome};
use engine_core::{
    metrics::Metrics,
    retry::{RetryError, RetryPolicy},
};
use model::records::chunk::Chunk;
use std::{sync::Arc, time::Instant};
use tracing::{info, warn};

/// Hands chunks to a [`ChunkWriter`] under the job's retry policy.
pub struct ChunkWriterService {
    writer: Arc<dyn ChunkWriter>,
    retry: RetryPolicy,
    metrics: Metrics,
}

impl ChunkWriterService {
    pub fn new(writer: Arc<dyn ChunkWriter>, retry: RetryPolicy, metrics: Metrics) -> Self {
        Self {
            writer,
            retry,
            metrics,
        }
    }

    pub async fn write_chunk(&self, chunk: &Chunk) -> Result<WriteOutcome, JobErrorKind> {
        let start = Instant::now();
        let mut retries = 0usize;

        info!(
            job_id = %chunk.job_id,
            chunk = chunk.sequence,
            rows = chunk.len(),
            start = %chunk.start,
            end = %chunk.end,
            "Writing chunk"
        );

        let result = self
            .retry
            .run(
                || self.writer.write(chunk),
                classify_sink_error,
                |attempt, err| {
                    retries += 1;
                    self.metrics.increment_retries(1);
                    warn!(
                        job_id = %chunk.job_id,
                        chunk = chunk.sequence,
                        attempt,
                        error = %err,
                        "Chunk write failed, retrying"
                    );
                },
            )
            .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(RetryError::Fatal(error)) => {
                return Err(JobErrorKind::Write {
                    error,
                    attempts: retries + 1,
                });
            }
            Err(RetryError::AttemptsExceeded { attempts, last }) => {
                return Err(JobErrorKind::Write {
                    error: last,
                    attempts,
                });
            }
        };

        let duration = start.elapsed();
        match outcome {
            WriteOutcome::Committed { rows } => {
                self.metrics.increment_written(rows as u64);
                self.metrics.increment_committed(1);
                info!(
                    job_id = %chunk.job_id,
                    chunk = chunk.sequence,
                    rows,
                    duration_ms = duration.as_millis() as u64,
                    "Chunk committed"
                );
            }
            WriteOutcome::AlreadyApplied => {
                self.metrics.increment_already_applied(1);
                info!(
                    job_id = %chunk.job_id,
                    chunk = chunk.sequence,
                    "Chunk was already applied by an earlier run, skipping write"
                );
            }
        }

        Ok(outcome)
    }
}
