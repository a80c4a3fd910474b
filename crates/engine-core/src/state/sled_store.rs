use crate::{
    error::StoreError,
    state::{
        ABANDONED, JobExecutionStore, check_advance, check_job_id,
        models::{Checkpoint, JobRun, JobStatus},
    },
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionResult,
};
use std::path::Path;
use tracing::debug;

/// Job store backed by an embedded sled database.
///
/// Layout:
/// - `chk:<job>`: latest [`Checkpoint`]
/// - `seq:<job>`: last issued run number (big-endian u64)
/// - `run:<job>:<run number, zero padded>`: [`JobRun`]
pub struct SledJobStore {
    db: sled::Db,
}

impl SledJobStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn chk_key(job_id: &str) -> Result<String, StoreError> {
        check_job_id(job_id)?;
        Ok(format!("chk:{}", job_id))
    }

    fn seq_key(job_id: &str) -> Result<String, StoreError> {
        check_job_id(job_id)?;
        Ok(format!("seq:{}", job_id))
    }

    #[inline]
    fn run_key(job_id: &str, run_number: u64) -> String {
        format!("run:{}:{:010}", job_id, run_number)
    }

    fn run_prefix(job_id: &str) -> Result<String, StoreError> {
        check_job_id(job_id)?;
        Ok(format!("run:{}:", job_id))
    }

    fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    fn decode_seq(key: &str, bytes: &[u8]) -> Result<u64, StoreError> {
        let raw: [u8; 8] = bytes.try_into().map_err(|_| StoreError::Corrupt {
            key: key.to_string(),
            message: format!("expected 8 bytes, found {}", bytes.len()),
        })?;
        Ok(u64::from_be_bytes(raw))
    }

    fn abort(err: StoreError) -> ConflictableTransactionError<StoreError> {
        ConflictableTransactionError::Abort(err)
    }

    fn finish<T>(result: TransactionResult<T, StoreError>) -> Result<T, StoreError> {
        match result {
            Ok(value) => Ok(value),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl JobExecutionStore for SledJobStore {
    async fn save(&self, cp: &Checkpoint) -> Result<(), StoreError> {
        let key = Self::chk_key(&cp.job_id)?;
        let new_bytes = bincode::serialize(cp)?;

        // Check-then-set inside one transaction so a stale writer cannot
        // overwrite a newer checkpoint.
        let result = self
            .db
            .transaction(|tx_db| -> ConflictableTransactionResult<(), StoreError> {
                let current = match tx_db.get(&key)? {
                    Some(bytes) => {
                        Some(Self::decode::<Checkpoint>(&key, &bytes).map_err(Self::abort)?)
                    }
                    None => None,
                };
                check_advance(current.as_ref(), cp).map_err(Self::abort)?;

                tx_db.insert(key.as_bytes(), new_bytes.as_slice())?;
                Ok(())
            });

        Self::finish(result)?;
        self.flush().await?;
        debug!(
            job_id = %cp.job_id,
            chunk = cp.last_committed_chunk_sequence,
            cursor = %cp.source_cursor,
            "Checkpoint saved"
        );
        Ok(())
    }

    async fn load(&self, job_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        let key = Self::chk_key(job_id)?;
        match self.db.get(&key)? {
            Some(bytes) => Ok(Some(Self::decode(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    async fn start_run(&self, job_id: &str) -> Result<JobRun, StoreError> {
        let seq_key = Self::seq_key(job_id)?;

        let result = self
            .db
            .transaction(|tx_db| -> ConflictableTransactionResult<JobRun, StoreError> {
                let last = match tx_db.get(&seq_key)? {
                    Some(bytes) => Self::decode_seq(&seq_key, &bytes).map_err(Self::abort)?,
                    None => 0,
                };

                if last > 0 {
                    let prev_key = Self::run_key(job_id, last);
                    if let Some(bytes) = tx_db.get(&prev_key)? {
                        let mut prev: JobRun =
                            Self::decode(&prev_key, &bytes).map_err(Self::abort)?;
                        if prev.transition(JobStatus::Failed, Some(ABANDONED.to_string())) {
                            let encoded = bincode::serialize(&prev)
                                .map_err(|e| Self::abort(e.into()))?;
                            tx_db.insert(prev_key.as_bytes(), encoded)?;
                        }
                    }
                }

                let run = JobRun::started(job_id, last + 1);
                let encoded = bincode::serialize(&run).map_err(|e| Self::abort(e.into()))?;
                tx_db.insert(
                    Self::run_key(job_id, run.run_number).as_bytes(),
                    encoded,
                )?;
                tx_db.insert(seq_key.as_bytes(), &run.run_number.to_be_bytes()[..])?;
                Ok(run)
            });

        let run = Self::finish(result)?;
        self.flush().await?;
        Ok(run)
    }

    async fn mark_status(
        &self,
        job_id: &str,
        status: JobStatus,
        message: Option<String>,
    ) -> Result<JobRun, StoreError> {
        let seq_key = Self::seq_key(job_id)?;

        let result = self
            .db
            .transaction(|tx_db| -> ConflictableTransactionResult<JobRun, StoreError> {
                let last = match tx_db.get(&seq_key)? {
                    Some(bytes) => Self::decode_seq(&seq_key, &bytes).map_err(Self::abort)?,
                    None => return Err(Self::abort(StoreError::NoRun(job_id.to_string()))),
                };

                let run_key = Self::run_key(job_id, last);
                let bytes = tx_db
                    .get(&run_key)?
                    .ok_or_else(|| Self::abort(StoreError::NoRun(job_id.to_string())))?;
                let mut run: JobRun = Self::decode(&run_key, &bytes).map_err(Self::abort)?;

                if !run.transition(status, message.clone()) {
                    return Err(Self::abort(StoreError::TerminalRun {
                        job_id: job_id.to_string(),
                        run_number: run.run_number,
                        status: run.status,
                    }));
                }

                let encoded = bincode::serialize(&run).map_err(|e| Self::abort(e.into()))?;
                tx_db.insert(run_key.as_bytes(), encoded)?;
                Ok(run)
            });

        let run = Self::finish(result)?;
        self.flush().await?;
        Ok(run)
    }

    async fn runs(&self, job_id: &str) -> Result<Vec<JobRun>, StoreError> {
        let mut runs = Vec::new();
        for item in self.db.scan_prefix(Self::run_prefix(job_id)?) {
            let (key, value) = item?;
            let key = String::from_utf8_lossy(&key).into_owned();
            runs.push(Self::decode(&key, &value)?);
        }
        Ok(runs)
    }

    async fn clear(&self, job_id: &str) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        batch.remove(Self::chk_key(job_id)?.as_bytes());
        batch.remove(Self::seq_key(job_id)?.as_bytes());
        for item in self.db.scan_prefix(Self::run_prefix(job_id)?) {
            let (key, _) = item?;
            batch.remove(key);
        }
        self.db.apply_batch(batch)?;
        self.flush().await
    }
}
