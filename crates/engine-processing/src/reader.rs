use crate::{
    error::JobErrorKind,
    transform::{RecordTransformer, Transformed},
};
use connectors::source::RecordSource;
use engine_config::settings::{ErrorPolicy, validated::ValidatedSettings};
use engine_core::metrics::Metrics;
use model::{pagination::cursor::Cursor, records::record::Record};
use std::{fmt::Display, sync::Arc};
use tracing::warn;

/// What to do with records that cannot be read or transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkipPolicy {
    pub on_read_error: ErrorPolicy,
    pub on_transform_error: ErrorPolicy,
    /// Skips tolerated per run; `None` means unlimited.
    pub skip_limit: Option<u64>,
}

impl SkipPolicy {
    pub fn from_settings(settings: &ValidatedSettings) -> Self {
        Self {
            on_read_error: settings.on_read_error,
            on_transform_error: settings.on_transform_error,
            skip_limit: settings.skip_limit,
        }
    }
}

/// Transformed records gathered for one chunk.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub records: Vec<Record>,
    /// Source position after the last row consumed for this chunk.
    pub end: Cursor,
    /// The source returned end of input while assembling.
    pub exhausted: bool,
}

/// Pulls records from a source through the transformer until a chunk is full.
pub struct ChunkReader {
    source: Box<dyn RecordSource>,
    transformer: Arc<dyn RecordTransformer>,
    policy: SkipPolicy,
    metrics: Metrics,
}

impl ChunkReader {
    pub fn new(
        source: Box<dyn RecordSource>,
        transformer: Arc<dyn RecordTransformer>,
        policy: SkipPolicy,
        metrics: Metrics,
    ) -> Self {
        Self {
            source,
            transformer,
            policy,
            metrics,
        }
    }

    pub async fn seek(&mut self, cursor: &Cursor) -> Result<(), JobErrorKind> {
        self.source.seek(cursor).await?;
        Ok(())
    }

    /// Reads until `chunk_size` records survive the transformer or the source
    /// runs dry. Skipped and filtered rows still advance the returned cursor.
    pub async fn read_chunk(&mut self, chunk_size: usize) -> Result<Assembled, JobErrorKind> {
        let mut records = Vec::with_capacity(chunk_size);
        let mut exhausted = false;

        while records.len() < chunk_size {
            let record = match self.source.next().await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    exhausted = true;
                    break;
                }
                Err(err) if err.is_skippable() && self.policy.on_read_error == ErrorPolicy::Skip => {
                    self.skip("read", &err)?;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            self.metrics.increment_read(1);

            match self.transformer.transform(&record) {
                Ok(Transformed::Emit(out)) => records.push(out),
                Ok(Transformed::Skip) => self.metrics.increment_filtered(1),
                Err(err) if self.policy.on_transform_error == ErrorPolicy::Skip => {
                    self.skip("transform", &err)?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Assembled {
            records,
            end: self.source.position(),
            exhausted,
        })
    }

    fn skip(&self, stage: &str, err: &dyn Display) -> Result<(), JobErrorKind> {
        self.metrics.increment_skipped(1);
        let skipped = self.metrics.skipped();
        warn!(
            stage,
            position = %self.source.position(),
            skipped,
            error = %err,
            "Skipping record"
        );

        match self.policy.skip_limit {
            Some(limit) if skipped > limit => Err(JobErrorKind::SkipLimitExceeded { limit, skipped }),
            _ => Ok(()),
        }
    }
}
