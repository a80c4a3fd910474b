use async_trait::async_trait;
use connectors::{
    file::csv::{settings::CsvSettings, source::CsvRecordSource},
    sink::{ChunkWriter, SinkError, TableMapping, WriteOutcome},
    sql::sqlite::writer::SqliteChunkWriter,
};
use engine_config::settings::{
    JobSettings, validated::ValidatedSettings, validator::SettingsValidator,
};
use engine_core::{
    error::StoreError,
    state::{
        JobExecutionStore,
        models::{Checkpoint, JobRun, JobStatus},
    },
};
use engine_processing::{
    orchestrator::{ChunkOrchestrator, OrchestratorConfig},
    transform::{
        RecordTransformer, Transformed, error::TransformError, pipeline::TransformPipeline,
    },
};
use model::records::{chunk::Chunk, record::Record};
use rusqlite::Connection;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};
use tokio_util::sync::CancellationToken;

pub const PEOPLE_FIELDS: [&str; 2] = ["firstName", "lastName"];

/// The tutorial's three people.
pub const PEOPLE: [(&str, &str); 3] = [("ann", "lee"), ("bo", "kim"), ("cy", "roe")];

/// `people` with a CHECK constraint that rejects any first name starting with `X`.
pub const PEOPLE_CHECKED_DDL: &str = r#"
    CREATE TABLE people (
        first_name TEXT CHECK (first_name NOT LIKE 'X%'),
        last_name TEXT
    );
"#;

/// Writes `rows` as a headerless, comma-separated file.
pub fn write_csv(dir: &Path, name: &str, rows: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    let body: String = rows
        .iter()
        .map(|(first, last)| format!("{first},{last}\n"))
        .collect();
    fs::write(&path, body).expect("write csv");
    path
}

/// `n` generated people: `first0,last0` ...
pub fn generated_people(n: usize) -> Vec<(String, String)> {
    (0..n)
        .map(|i| (format!("first{i}"), format!("last{i}")))
        .collect()
}

pub fn write_generated_csv(dir: &Path, name: &str, n: usize) -> PathBuf {
    let rows = generated_people(n);
    let borrowed: Vec<(&str, &str)> = rows
        .iter()
        .map(|(a, b)| (a.as_str(), b.as_str()))
        .collect();
    write_csv(dir, name, &borrowed)
}

pub fn settings(job_id: &str, chunk_size: usize) -> JobSettings {
    JobSettings {
        chunk_size,
        ..JobSettings::new(job_id, &PEOPLE_FIELDS)
    }
}

pub fn validated(settings: &JobSettings) -> ValidatedSettings {
    SettingsValidator::validate(settings).expect("valid settings")
}

pub fn mapping(settings: &ValidatedSettings) -> TableMapping {
    TableMapping::new(
        &settings.table,
        settings.field_names.clone(),
        settings.columns.clone(),
    )
    .with_create_table(settings.create_table)
}

pub fn sqlite_writer(db: &Path, settings: &ValidatedSettings) -> Arc<SqliteChunkWriter> {
    Arc::new(SqliteChunkWriter::open(db, mapping(settings)).expect("open sqlite sink"))
}

/// SQLite sink whose `people` table carries [`PEOPLE_CHECKED_DDL`].
pub fn checked_sqlite_writer(db: &Path, settings: &ValidatedSettings) -> Arc<SqliteChunkWriter> {
    let conn = Connection::open(db).expect("open sqlite");
    conn.execute_batch(PEOPLE_CHECKED_DDL).expect("create people");
    let mapping = mapping(settings).with_create_table(false);
    Arc::new(
        SqliteChunkWriter::from_connection(conn, mapping, db.display().to_string())
            .expect("wrap sqlite"),
    )
}

/// Every `(first_name, last_name)` row, in insertion order.
pub fn sqlite_rows(db: &Path) -> Vec<(String, String)> {
    let conn = Connection::open(db).expect("open sqlite");
    let mut stmt = conn
        .prepare("SELECT first_name, last_name FROM people ORDER BY rowid")
        .expect("prepare select");
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .expect("query people")
        .collect::<Result<Vec<_>, _>>()
        .expect("read people")
}

pub fn ledger_count(db: &Path) -> i64 {
    let conn = Connection::open(db).expect("open sqlite");
    conn.query_row("SELECT COUNT(*) FROM ferry_chunk_ledger", [], |row| {
        row.get(0)
    })
    .expect("count ledger")
}

pub fn upper(rows: &[(&str, &str)]) -> Vec<(String, String)> {
    rows.iter()
        .map(|(a, b)| (a.to_uppercase(), b.to_uppercase()))
        .collect()
}

pub fn csv_source(path: &Path, settings: &ValidatedSettings) -> CsvRecordSource {
    let csv = CsvSettings::new(settings.field_names.clone())
        .with_delimiter(settings.delimiter)
        .with_header(settings.has_header);
    CsvRecordSource::open(path, csv).expect("open csv")
}

/// Wires CSV source, configured transform rules, `writer` and `store`.
pub fn orchestrator(
    settings: &ValidatedSettings,
    csv: &Path,
    writer: Arc<dyn ChunkWriter>,
    store: Arc<dyn JobExecutionStore>,
) -> ChunkOrchestrator {
    orchestrator_with(
        settings,
        csv,
        Arc::new(TransformPipeline::from_rules(&settings.transform)),
        writer,
        store,
    )
}

pub fn orchestrator_with(
    settings: &ValidatedSettings,
    csv: &Path,
    transformer: Arc<dyn RecordTransformer>,
    writer: Arc<dyn ChunkWriter>,
    store: Arc<dyn JobExecutionStore>,
) -> ChunkOrchestrator {
    ChunkOrchestrator::new(
        OrchestratorConfig::from(settings),
        Box::new(csv_source(csv, settings)),
        transformer,
        writer,
        store,
    )
}

/// Uppercases like the default pipeline but rejects one first name.
pub struct RejectFirstName {
    pub rejected: &'static str,
    inner: TransformPipeline,
}

impl RejectFirstName {
    pub fn new(rejected: &'static str, settings: &ValidatedSettings) -> Self {
        Self {
            rejected,
            inner: TransformPipeline::from_rules(&settings.transform),
        }
    }
}

impl RecordTransformer for RejectFirstName {
    fn transform(&self, record: &Record) -> Result<Transformed, TransformError> {
        if record.get("firstName").and_then(|v| v.as_str()) == Some(self.rejected) {
            return Err(TransformError::WrongType {
                rule: "reject",
                field: "firstName".into(),
                found: "string",
            });
        }
        self.inner.transform(record)
    }
}

/// How a [`FaultyWriter`] misbehaves.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// The next `n` writes fail with a transient error, then writes succeed.
    Transient(usize),
    /// Every write of this chunk sequence fails with a transient error.
    FailChunk(u64),
    /// Cancels the token once this many chunks have been written.
    CancelAfter(usize),
}

/// Delegates to an inner writer, injecting the configured fault.
pub struct FaultyWriter {
    inner: Arc<dyn ChunkWriter>,
    fault: Fault,
    writes: AtomicUsize,
    cancel: CancellationToken,
}

impl FaultyWriter {
    pub fn new(inner: Arc<dyn ChunkWriter>, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            writes: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn attempts(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkWriter for FaultyWriter {
    async fn write(&self, chunk: &Chunk) -> Result<WriteOutcome, SinkError> {
        let attempt = self.writes.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::Transient(n) if attempt < n => {
                return Err(SinkError::Unavailable("injected transient failure".into()));
            }
            Fault::FailChunk(sequence) if chunk.sequence == sequence => {
                return Err(SinkError::Unavailable(format!(
                    "injected failure on chunk {sequence}"
                )));
            }
            _ => {}
        }

        let outcome = self.inner.write(chunk).await?;
        if let Fault::CancelAfter(n) = self.fault
            && attempt + 1 >= n
        {
            self.cancel.cancel();
        }
        Ok(outcome)
    }

    async fn count_rows(&self) -> Result<u64, SinkError> {
        self.inner.count_rows().await
    }

    async fn sample_rows(&self, limit: usize) -> Result<Vec<Record>, SinkError> {
        self.inner.sample_rows(limit).await
    }

    fn describe(&self) -> String {
        format!("faulty({})", self.inner.describe())
    }
}

/// Store whose `fail_on`-th checkpoint save fails, simulating a crash
/// after a chunk committed but before its checkpoint was recorded.
pub struct CrashingStore {
    inner: Arc<dyn JobExecutionStore>,
    fail_on: u64,
    saves: AtomicU64,
}

impl CrashingStore {
    pub fn new(inner: Arc<dyn JobExecutionStore>, fail_on: u64) -> Self {
        Self {
            inner,
            fail_on,
            saves: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl JobExecutionStore for CrashingStore {
    async fn save(&self, cp: &Checkpoint) -> Result<(), StoreError> {
        if self.saves.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return Err(StoreError::Unavailable("injected crash before checkpoint".into()));
        }
        self.inner.save(cp).await
    }

    async fn load(&self, job_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        self.inner.load(job_id).await
    }

    async fn start_run(&self, job_id: &str) -> Result<JobRun, StoreError> {
        self.inner.start_run(job_id).await
    }

    async fn mark_status(
        &self,
        job_id: &str,
        status: JobStatus,
        message: Option<String>,
    ) -> Result<JobRun, StoreError> {
        self.inner.mark_status(job_id, status, message).await
    }

    async fn runs(&self, job_id: &str) -> Result<Vec<JobRun>, StoreError> {
        self.inner.runs(job_id).await
    }

    async fn clear(&self, job_id: &str) -> Result<(), StoreError> {
        self.inner.clear(job_id).await
    }
}
