use crate::{
    sink::{ChunkWriter, LedgerEntry, SinkError, TableMapping, WriteOutcome, check_replay},
    sql::{
        postgres::{
            params::{PgParamStore, value_from_row},
            utils::{connect_client, rows_per_statement},
        },
        statements::Statements,
    },
};
use async_trait::async_trait;
use chrono::Utc;
use model::{
    core::value::FieldValue,
    records::{chunk::Chunk, record::Record},
};
use planner::query::{ast::common::TableRef, builder::insert::InsertBuilder, dialect::Postgres};
use tokio::sync::Mutex;
use tokio_postgres::{Client, error::SqlState};
use tracing::{debug, info};

/// Postgres-backed [`ChunkWriter`] issuing multi-row inserts.
pub struct PgChunkWriter {
    client: Mutex<Client>,
    mapping: TableMapping,
    statements: Statements,
}

impl PgChunkWriter {
    pub async fn connect(url: &str, mapping: TableMapping) -> Result<Self, SinkError> {
        let client = connect_client(url).await?;
        let statements = Statements::new(&mapping, &Postgres);

        client.batch_execute(&statements.create_ledger).await?;
        if let Some(create) = &statements.create_table {
            client.batch_execute(create).await.map_err(classify)?;
        }
        debug!(table = %mapping.table, "Postgres sink ready");

        Ok(Self {
            client: Mutex::new(client),
            mapping,
            statements,
        })
    }
}

/// Separates errors that will never succeed on retry from transient ones.
fn classify(err: tokio_postgres::Error) -> SinkError {
    let Some(state) = err.code() else {
        return SinkError::Postgres(err);
    };
    if *state == SqlState::UNDEFINED_TABLE
        || *state == SqlState::UNDEFINED_COLUMN
        || *state == SqlState::DATATYPE_MISMATCH
    {
        SinkError::Schema(err.to_string())
    } else if state.code().starts_with("23") {
        // Class 23: integrity constraint violation.
        SinkError::Constraint(err.to_string())
    } else {
        SinkError::Postgres(err)
    }
}

#[async_trait]
impl ChunkWriter for PgChunkWriter {
    async fn write(&self, chunk: &Chunk) -> Result<WriteOutcome, SinkError> {
        let mut client = self.client.lock().await;
        let tx = client.transaction().await?;

        let recorded = tx
            .query_opt(
                &self.statements.lookup_chunk,
                &[&chunk.job_id, &(chunk.sequence as i64)],
            )
            .await?;
        if let Some(row) = recorded {
            let entry = LedgerEntry {
                start: row.try_get::<_, i64>(0)? as u64,
                end: row.try_get::<_, i64>(1)? as u64,
                checksum: row.try_get(2)?,
            };
            return check_replay(chunk, &entry);
        }

        let per_statement = rows_per_statement(self.mapping.columns.len());
        for slice in chunk.records.chunks(per_statement) {
            let builder = slice.iter().fold(
                InsertBuilder::new(TableRef::new(&self.mapping.table)).columns(&self.mapping.columns),
                |b, record| b.values(self.mapping.row_values(record)),
            );
            let (sql, values) = builder.render(&Postgres);
            let params = PgParamStore::from_values(values);
            tx.execute(&sql, &params.as_refs()).await.map_err(classify)?;
        }

        tx.execute(
            &self.statements.record_chunk,
            &[
                &chunk.job_id,
                &(chunk.sequence as i64),
                &(chunk.start.offset as i64),
                &(chunk.end.offset as i64),
                &(chunk.manifest.row_count as i64),
                &LedgerEntry::for_chunk(chunk).checksum,
                &Utc::now(),
            ],
        )
        .await?;
        tx.commit().await?;

        info!(
            job_id = %chunk.job_id,
            chunk = chunk.sequence,
            rows = chunk.records.len(),
            table = %self.mapping.table,
            "Chunk committed to Postgres"
        );
        Ok(WriteOutcome::Committed {
            rows: chunk.records.len(),
        })
    }

    async fn count_rows(&self) -> Result<u64, SinkError> {
        let client = self.client.lock().await;
        let row = client
            .query_one(&self.statements.count_rows, &[])
            .await
            .map_err(classify)?;
        let count: i64 = row.try_get(0)?;
        Ok(count as u64)
    }

    async fn sample_rows(&self, limit: usize) -> Result<Vec<Record>, SinkError> {
        let client = self.client.lock().await;
        let rows = client
            .query(&self.statements.sample_rows, &[&(limit as i64)])
            .await
            .map_err(classify)?;

        Ok(rows
            .iter()
            .map(|row| {
                let fields = self
                    .mapping
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(i, column)| FieldValue::new(column.as_str(), value_from_row(row, i)))
                    .collect();
                Record::new(fields)
            })
            .collect())
    }

    fn describe(&self) -> String {
        format!("postgres table {}", self.mapping.table)
    }
}
