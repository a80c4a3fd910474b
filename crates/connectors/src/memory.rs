//! In-process source and writer, used for embedding and tests.

use crate::{
    sink::{ChunkWriter, LedgerEntry, SinkError, TableMapping, WriteOutcome, check_replay},
    source::{RecordSource, SourceError},
};
use async_trait::async_trait;
use model::{
    core::value::FieldValue,
    pagination::cursor::Cursor,
    records::{chunk::Chunk, record::Record},
};
use std::collections::HashMap;
use tokio::sync::Mutex;

pub struct MemorySource {
    records: Vec<Record>,
    pos: usize,
}

impl MemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records, pos: 0 }
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn next(&mut self) -> Result<Option<Record>, SourceError> {
        let record = self.records.get(self.pos).cloned();
        if record.is_some() {
            self.pos += 1;
        }
        Ok(record)
    }

    async fn seek(&mut self, cursor: &Cursor) -> Result<(), SourceError> {
        self.pos = (cursor.offset as usize).min(self.records.len());
        Ok(())
    }

    fn position(&self) -> Cursor {
        Cursor::new(self.pos as u64)
    }
}

#[derive(Default)]
struct Table {
    rows: Vec<Record>,
    ledger: HashMap<(String, u64), LedgerEntry>,
}

/// Keeps rows in memory. A chunk is staged in full before it is appended,
/// so a failure never leaves part of it behind.
pub struct MemoryChunkWriter {
    mapping: TableMapping,
    table: Mutex<Table>,
}

impl MemoryChunkWriter {
    pub fn new(mapping: TableMapping) -> Self {
        Self {
            mapping,
            table: Mutex::new(Table::default()),
        }
    }

    /// Snapshot of every stored row.
    pub async fn rows(&self) -> Vec<Record> {
        self.table.lock().await.rows.clone()
    }

    fn to_row(&self, record: &Record) -> Record {
        let fields = self
            .mapping
            .columns
            .iter()
            .zip(self.mapping.row_values(record))
            .map(|(column, value)| FieldValue::new(column.as_str(), value))
            .collect();
        Record::new(fields)
    }
}

#[async_trait]
impl ChunkWriter for MemoryChunkWriter {
    async fn write(&self, chunk: &Chunk) -> Result<WriteOutcome, SinkError> {
        let mut table = self.table.lock().await;

        let key = (chunk.job_id.clone(), chunk.sequence);
        if let Some(entry) = table.ledger.get(&key) {
            return check_replay(chunk, entry);
        }

        let staged: Vec<Record> = chunk.records.iter().map(|r| self.to_row(r)).collect();
        table.rows.extend(staged);
        table.ledger.insert(key, LedgerEntry::for_chunk(chunk));

        Ok(WriteOutcome::Committed {
            rows: chunk.records.len(),
        })
    }

    async fn count_rows(&self) -> Result<u64, SinkError> {
        Ok(self.table.lock().await.rows.len() as u64)
    }

    async fn sample_rows(&self, limit: usize) -> Result<Vec<Record>, SinkError> {
        let table = self.table.lock().await;
        Ok(table.rows.iter().take(limit).cloned().collect())
    }

    fn describe(&self) -> String {
        format!("memory table {}", self.mapping.table)
    }
}
