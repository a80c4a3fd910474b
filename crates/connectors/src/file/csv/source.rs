use crate::{
    file::csv::settings::CsvSettings,
    source::{RecordSource, SourceError},
};
use async_trait::async_trait;
use csv::StringRecord;
use model::{
    core::value::{FieldValue, Value},
    pagination::cursor::Cursor,
    records::record::Record,
};
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Reads records from a delimited text file, mapping columns positionally
/// onto the configured field names.
pub struct CsvRecordSource {
    path: PathBuf,
    settings: CsvSettings,
    reader: csv::Reader<File>,
    buf: StringRecord,
    /// Data rows consumed from the file (header excluded).
    rows_read: u64,
}

impl CsvRecordSource {
    pub fn open(path: impl AsRef<Path>, settings: CsvSettings) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let reader = settings.reader_builder().from_path(&path)?;
        Ok(CsvRecordSource {
            path,
            settings,
            reader,
            buf: StringRecord::new(),
            rows_read: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.reader = self.settings.reader_builder().from_path(&self.path)?;
        self.rows_read = 0;
        Ok(())
    }

    /// Reads the next row into `buf`, counting it as consumed even when its
    /// bytes fail to decode.
    fn advance(&mut self) -> Result<bool, SourceError> {
        match self.reader.read_record(&mut self.buf) {
            Ok(more) => {
                if more {
                    self.rows_read += 1;
                }
                Ok(more)
            }
            Err(err) => match err.kind() {
                csv::ErrorKind::Utf8 { pos, .. } => {
                    self.rows_read += 1;
                    let line = pos.as_ref().map(|p| p.line()).unwrap_or(self.rows_read);
                    Err(SourceError::InvalidUtf8 { line })
                }
                _ => Err(err.into()),
            },
        }
    }

    fn to_record(&self) -> Record {
        let fields = self
            .settings
            .field_names
            .iter()
            .zip(self.buf.iter())
            .map(|(name, cell)| FieldValue::new(name.as_str(), Value::String(cell.to_string())))
            .collect();
        Record::new(fields)
    }
}

#[async_trait]
impl RecordSource for CsvRecordSource {
    async fn next(&mut self) -> Result<Option<Record>, SourceError> {
        if !self.advance()? {
            return Ok(None);
        }

        let expected = self.settings.field_names.len();
        let found = self.buf.len();
        if found != expected {
            let line = self
                .buf
                .position()
                .map(|p| p.line())
                .unwrap_or(self.rows_read);
            return Err(SourceError::Malformed {
                line,
                expected,
                found,
            });
        }

        Ok(Some(self.to_record()))
    }

    async fn seek(&mut self, cursor: &Cursor) -> Result<(), SourceError> {
        if cursor.offset < self.rows_read {
            self.rewind()?;
        }

        while self.rows_read < cursor.offset {
            let more = match self.advance() {
                Err(SourceError::InvalidUtf8 { .. }) => true,
                other => other?,
            };
            if !more {
                debug!(
                    path = %self.path.display(),
                    cursor = %cursor,
                    rows = self.rows_read,
                    "Seek went past end of input"
                );
                break;
            }
        }
        Ok(())
    }

    fn position(&self) -> Cursor {
        Cursor::new(self.rows_read)
    }
}
