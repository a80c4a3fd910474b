//! SQL shared by the relational writers: the target table and the chunk ledger.

use crate::sink::TableMapping;
use planner::query::{
    ast::{common::TableRef, create_table::ColumnType},
    builder::{create_table::CreateTableBuilder, insert::InsertBuilder},
    dialect::Dialect,
};

/// Table recording every committed chunk, written in the same transaction
/// as the chunk's rows.
pub const LEDGER_TABLE: &str = "ferry_chunk_ledger";

pub(crate) const LEDGER_COLUMNS: [&str; 7] = [
    "job_id",
    "chunk_sequence",
    "start_cursor",
    "end_cursor",
    "row_count",
    "checksum",
    "committed_at",
];

pub(crate) struct Statements {
    pub create_table: Option<String>,
    pub create_ledger: String,
    /// Single-row insert with one placeholder per column.
    pub insert_row: String,
    pub lookup_chunk: String,
    pub record_chunk: String,
    pub count_rows: String,
    pub sample_rows: String,
}

impl Statements {
    pub fn new(mapping: &TableMapping, dialect: &dyn Dialect) -> Self {
        let table = TableRef::new(&mapping.table);
        let quoted_table = dialect.quote_identifier(&mapping.table);
        let quoted_ledger = dialect.quote_identifier(LEDGER_TABLE);
        let column_list = mapping
            .columns
            .iter()
            .map(|c| dialect.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");

        let create_table = mapping.create_table.then(|| {
            mapping
                .columns
                .iter()
                .fold(CreateTableBuilder::new(table.clone()), |b, col| {
                    b.column(col, ColumnType::Text, true)
                })
                .render(dialect)
        });

        let create_ledger = CreateTableBuilder::new(TableRef::new(LEDGER_TABLE))
            .column("job_id", ColumnType::Text, false)
            .column("chunk_sequence", ColumnType::BigInt, false)
            .column("start_cursor", ColumnType::BigInt, false)
            .column("end_cursor", ColumnType::BigInt, false)
            .column("row_count", ColumnType::BigInt, false)
            .column("checksum", ColumnType::Text, false)
            .column("committed_at", ColumnType::Timestamp, false)
            .primary_key(&["job_id", "chunk_sequence"])
            .render(dialect);

        let (insert_row, _) = InsertBuilder::new(table)
            .columns(&mapping.columns)
            .placeholders()
            .render(dialect);

        let ledger_columns: Vec<String> = LEDGER_COLUMNS.iter().map(|c| c.to_string()).collect();
        let (record_chunk, _) = InsertBuilder::new(TableRef::new(LEDGER_TABLE))
            .columns(&ledger_columns)
            .placeholders()
            .render(dialect);

        let lookup_chunk = format!(
            "SELECT {}, {}, {} FROM {} WHERE {} = {} AND {} = {}",
            dialect.quote_identifier("start_cursor"),
            dialect.quote_identifier("end_cursor"),
            dialect.quote_identifier("checksum"),
            quoted_ledger,
            dialect.quote_identifier("job_id"),
            dialect.get_placeholder(0),
            dialect.quote_identifier("chunk_sequence"),
            dialect.get_placeholder(1),
        );

        Statements {
            create_table,
            create_ledger,
            insert_row,
            lookup_chunk,
            record_chunk,
            count_rows: format!("SELECT COUNT(*) FROM {quoted_table}"),
            sample_rows: format!(
                "SELECT {column_list} FROM {quoted_table} LIMIT {}",
                dialect.get_placeholder(0)
            ),
        }
    }
}

pub(crate) fn checksum_hex(checksum: u64) -> String {
    format!("{checksum:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use planner::query::dialect::{Postgres, Sqlite};

    fn mapping() -> TableMapping {
        TableMapping::new(
            "people",
            vec!["firstName".into(), "lastName".into()],
            vec!["first_name".into(), "last_name".into()],
        )
    }

    #[test]
    fn sqlite_statements() {
        let stmts = Statements::new(&mapping(), &Sqlite);

        assert_eq!(
            stmts.create_table.as_deref(),
            Some(r#"CREATE TABLE IF NOT EXISTS "people" ("first_name" TEXT, "last_name" TEXT);"#)
        );
        assert_eq!(
            stmts.insert_row,
            r#"INSERT INTO "people" ("first_name", "last_name") VALUES (?1, ?2);"#
        );
        assert_eq!(
            stmts.lookup_chunk,
            r#"SELECT "start_cursor", "end_cursor", "checksum" FROM "ferry_chunk_ledger" WHERE "job_id" = ?1 AND "chunk_sequence" = ?2"#
        );
        assert!(stmts.record_chunk.ends_with("VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);"));
    }

    #[test]
    fn postgres_statements() {
        let stmts = Statements::new(&mapping().with_create_table(false), &Postgres);

        assert!(stmts.create_table.is_none());
        assert!(stmts.create_ledger.contains(r#""committed_at" TIMESTAMPTZ NOT NULL"#));
        assert_eq!(
            stmts.sample_rows,
            r#"SELECT "first_name", "last_name" FROM "people" LIMIT $1"#
        );
    }

    #[test]
    fn checksum_is_fixed_width() {
        assert_eq!(checksum_hex(255), "00000000000000ff");
    }
}
