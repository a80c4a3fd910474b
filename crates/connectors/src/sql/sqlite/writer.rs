//! SQLite-backed [`ChunkWriter`].
//!
//! A single `Mutex<Connection>` serializes chunk transactions; the blocking
//! work runs on the tokio blocking pool.

use crate::{
    sink::{ChunkWriter, LedgerEntry, SinkError, TableMapping, WriteOutcome, check_replay},
    sql::{
        sqlite::params::{from_value_ref, to_sql_value},
        statements::Statements,
    },
};
use async_trait::async_trait;
use chrono::Utc;
use model::{
    core::value::FieldValue,
    records::{chunk::Chunk, record::Record},
};
use planner::query::dialect::Sqlite;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params, params_from_iter};
use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{debug, info};

pub struct SqliteChunkWriter {
    conn: Arc<Mutex<Connection>>,
    mapping: Arc<TableMapping>,
    statements: Arc<Statements>,
    label: String,
}

impl SqliteChunkWriter {
    /// Opens or creates the database at `path`, creating parent directories.
    pub fn open(path: &Path, mapping: TableMapping) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| SinkError::Unavailable(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn, mapping, path.display().to_string())
    }

    pub fn in_memory(mapping: TableMapping) -> Result<Self, SinkError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, mapping, ":memory:".to_string())
    }

    /// Wraps an existing connection; the ledger (and, if configured, the
    /// target table) are created when missing.
    pub fn from_connection(
        conn: Connection,
        mapping: TableMapping,
        label: String,
    ) -> Result<Self, SinkError> {
        let statements = Statements::new(&mapping, &Sqlite);
        conn.execute_batch(&statements.create_ledger)?;
        if let Some(create) = &statements.create_table {
            conn.execute_batch(create)?;
        }
        debug!(table = %mapping.table, db = %label, "SQLite sink ready");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            mapping: Arc::new(mapping),
            statements: Arc::new(statements),
            label,
        })
    }

    fn lock_conn(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, SinkError> {
        conn.lock().map_err(|_| SinkError::LockPoisoned)
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, SinkError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &TableMapping, &Statements) -> Result<T, SinkError>
            + Send
            + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let mapping = Arc::clone(&self.mapping);
        let statements = Arc::clone(&self.statements);

        tokio::task::spawn_blocking(move || {
            let mut guard = Self::lock_conn(&conn)?;
            f(&mut guard, &mapping, &statements)
        })
        .await
        .map_err(|e| SinkError::Task(e.to_string()))?
    }
}

fn write_chunk(
    conn: &mut Connection,
    mapping: &TableMapping,
    statements: &Statements,
    chunk: &Chunk,
) -> Result<WriteOutcome, SinkError> {
    // Dropping the transaction without commit rolls it back.
    let tx = conn.transaction()?;

    let recorded = tx
        .query_row(
            &statements.lookup_chunk,
            params![chunk.job_id, chunk.sequence as i64],
            |row| {
                Ok(LedgerEntry {
                    start: row.get::<_, i64>(0)? as u64,
                    end: row.get::<_, i64>(1)? as u64,
                    checksum: row.get(2)?,
                })
            },
        )
        .optional()?;
    if let Some(entry) = recorded {
        return check_replay(chunk, &entry);
    }

    {
        let mut stmt = tx.prepare_cached(&statements.insert_row)?;
        for record in &chunk.records {
            let values = mapping.row_values(record).into_iter().map(to_sql_value);
            stmt.execute(params_from_iter(values))?;
        }
    }

    tx.execute(
        &statements.record_chunk,
        params![
            chunk.job_id,
            chunk.sequence as i64,
            chunk.start.offset as i64,
            chunk.end.offset as i64,
            chunk.manifest.row_count as i64,
            LedgerEntry::for_chunk(chunk).checksum,
            Utc::now().to_rfc3339(),
        ],
    )?;
    tx.commit()?;

    Ok(WriteOutcome::Committed {
        rows: chunk.records.len(),
    })
}

/// Separates errors that will never succeed on retry from transient ones.
fn classify(err: SinkError) -> SinkError {
    let SinkError::Sqlite(inner) = &err else {
        return err;
    };
    let message = inner.to_string();
    if inner.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
        SinkError::Constraint(message)
    } else if message.contains("no such table")
        || message.contains("no such column")
        || message.contains("has no column named")
    {
        SinkError::Schema(message)
    } else {
        err
    }
}

#[async_trait]
impl ChunkWriter for SqliteChunkWriter {
    async fn write(&self, chunk: &Chunk) -> Result<WriteOutcome, SinkError> {
        let owned = chunk.clone();
        let outcome = self
            .with_conn(move |conn, mapping, statements| {
                write_chunk(conn, mapping, statements, &owned)
            })
            .await
            .map_err(classify)?;

        if let WriteOutcome::Committed { rows } = outcome {
            info!(
                job_id = %chunk.job_id,
                chunk = chunk.sequence,
                rows,
                table = %self.mapping.table,
                "Chunk committed to SQLite"
            );
        }
        Ok(outcome)
    }

    async fn count_rows(&self) -> Result<u64, SinkError> {
        self.with_conn(|conn, _, statements| {
            let count: i64 = conn.query_row(&statements.count_rows, [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
        .map_err(classify)
    }

    async fn sample_rows(&self, limit: usize) -> Result<Vec<Record>, SinkError> {
        self.with_conn(move |conn, mapping, statements| {
            let mut stmt = conn.prepare(&statements.sample_rows)?;
            let rows = stmt.query_map([limit as i64], |row| {
                let mut fields = Vec::with_capacity(mapping.columns.len());
                for (i, column) in mapping.columns.iter().enumerate() {
                    fields.push(FieldValue::new(column.as_str(), from_value_ref(row.get_ref(i)?)));
                }
                Ok(Record::new(fields))
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
        .map_err(classify)
    }

    fn describe(&self) -> String {
        format!("sqlite:{} table {}", self.label, self.mapping.table)
    }
}
