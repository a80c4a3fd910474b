use crate::{
    memory::MemoryChunkWriter,
    sql::{
        postgres::writer::PgChunkWriter, sqlite::writer::SqliteChunkWriter,
        statements::checksum_hex,
    },
};
use async_trait::async_trait;
use model::{
    core::value::Value,
    records::{chunk::Chunk, record::Record},
};
use std::{path::Path, sync::Arc};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The chunk's rows and its ledger entry were committed together.
    Committed { rows: usize },
    /// A ledger entry for this chunk already existed; nothing was written.
    AlreadyApplied,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Invalid sink URL: {0}")]
    InvalidUrl(String),

    /// The ledger records this chunk with a different cursor range or
    /// checksum, meaning the source or the checkpoint changed underneath the job.
    #[error(
        "Chunk {sequence} of job '{job_id}' was committed as {recorded} but is being replayed as {replayed}"
    )]
    Conflict {
        job_id: String,
        sequence: u64,
        recorded: String,
        replayed: String,
    },

    /// Missing table or column, or a type the sink cannot accept.
    #[error("Sink schema error: {0}")]
    Schema(String),

    /// A row was rejected by a constraint on the sink table.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Sink connection lock poisoned")]
    LockPoisoned,

    #[error("Sink task failed: {0}")]
    Task(String),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

impl SinkError {
    /// Errors that will fail the same way on every attempt.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            SinkError::Conflict { .. }
                | SinkError::Schema(_)
                | SinkError::Constraint(_)
                | SinkError::InvalidUrl(_)
                | SinkError::LockPoisoned
        )
    }
}

/// Where records go: the table and the column each record field lands in.
#[derive(Debug, Clone)]
pub struct TableMapping {
    pub table: String,
    /// Record field names, paired positionally with `columns`.
    pub fields: Vec<String>,
    pub columns: Vec<String>,
    /// Issue `CREATE TABLE IF NOT EXISTS` with one text column per field.
    pub create_table: bool,
}

impl TableMapping {
    pub fn new(table: &str, fields: Vec<String>, columns: Vec<String>) -> Self {
        Self {
            table: table.to_string(),
            fields,
            columns,
            create_table: true,
        }
    }

    pub fn with_create_table(mut self, create_table: bool) -> Self {
        self.create_table = create_table;
        self
    }

    /// The record's values in column order. Absent fields become NULL.
    pub fn row_values(&self, record: &Record) -> Vec<Value> {
        self.fields
            .iter()
            .map(|field| record.get(field).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

/// Durably persists chunks, one transaction per chunk.
#[async_trait]
pub trait ChunkWriter: Send + Sync {
    /// Writes every record of `chunk` or none of them.
    async fn write(&self, chunk: &Chunk) -> Result<WriteOutcome, SinkError>;

    /// Rows currently in the target table.
    async fn count_rows(&self) -> Result<u64, SinkError>;

    /// Up to `limit` rows of the target table, keyed by column name.
    async fn sample_rows(&self, limit: usize) -> Result<Vec<Record>, SinkError>;

    /// Short human-readable description of the target, for logs.
    fn describe(&self) -> String;
}

/// Opens a writer for `url`:
/// - `postgres://…` / `postgresql://…`
/// - `sqlite://<path>`, `sqlite::memory:` or a bare file path
/// - `memory://`
pub async fn open_writer(
    url: &str,
    mapping: TableMapping,
) -> Result<Arc<dyn ChunkWriter>, SinkError> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return Ok(Arc::new(PgChunkWriter::connect(url, mapping).await?));
    }
    if url == "memory://" {
        return Ok(Arc::new(MemoryChunkWriter::new(mapping)));
    }
    if url == "sqlite::memory:" {
        return Ok(Arc::new(SqliteChunkWriter::in_memory(mapping)?));
    }

    let path = url.strip_prefix("sqlite://").unwrap_or(url);
    if path.is_empty() || path.contains("://") {
        return Err(SinkError::InvalidUrl(url.to_string()));
    }
    Ok(Arc::new(SqliteChunkWriter::open(Path::new(path), mapping)?))
}

/// What the ledger holds for one committed chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LedgerEntry {
    pub start: u64,
    pub end: u64,
    /// Hex-encoded xxh3 of the chunk's records.
    pub checksum: String,
}

impl LedgerEntry {
    pub fn for_chunk(chunk: &Chunk) -> Self {
        Self {
            start: chunk.start.offset,
            end: chunk.end.offset,
            checksum: checksum_hex(chunk.manifest.checksum_xxh3),
        }
    }
}

impl std::fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rows {}..{} (checksum {})", self.start, self.end, self.checksum)
    }
}

/// Outcome of comparing a replayed chunk against its ledger entry. Range and
/// checksum must both match for the replay to count as already applied.
pub(crate) fn check_replay(chunk: &Chunk, recorded: &LedgerEntry) -> Result<WriteOutcome, SinkError> {
    let replayed = LedgerEntry::for_chunk(chunk);
    if *recorded == replayed {
        Ok(WriteOutcome::AlreadyApplied)
    } else {
        Err(SinkError::Conflict {
            job_id: chunk.job_id.clone(),
            sequence: chunk.sequence,
            recorded: recorded.to_string(),
            replayed: replayed.to_string(),
        })
    }
}
