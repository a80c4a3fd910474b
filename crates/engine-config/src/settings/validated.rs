use crate::settings::{
    DEFAULT_CHUNK_SIZE, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_TABLE, ErrorPolicy, TransformRule,
    WritePolicy,
};
use std::time::Duration;

/// Immutable, validated configuration for one job.
#[derive(Debug, Clone)]
pub struct ValidatedSettings {
    pub job_id: String,
    /// Transformed records per committed chunk
    pub chunk_size: usize,
    /// Source columns, positionally
    pub field_names: Vec<String>,
    pub delimiter: u8,
    pub has_header: bool,
    /// Rules applied in order to each record
    pub transform: Vec<TransformRule>,
    pub on_transform_error: ErrorPolicy,
    pub on_read_error: ErrorPolicy,
    /// Skipped records tolerated before the run fails
    pub skip_limit: Option<u64>,
    pub on_write_error: WritePolicy,
    pub retry_backoff: Duration,
    pub table: String,
    /// Sink column per field, same order as `field_names`
    pub columns: Vec<String>,
    pub create_table: bool,
}

impl ValidatedSettings {
    pub fn from_builder(builder: ValidatedSettingsBuilder) -> Self {
        let field_names = builder.field_names;
        let columns = builder.columns.unwrap_or_else(|| field_names.clone());
        Self {
            job_id: builder.job_id,
            chunk_size: builder.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            transform: builder.transform.unwrap_or_else(|| {
                vec![TransformRule::Uppercase {
                    fields: field_names.clone(),
                }]
            }),
            field_names,
            delimiter: builder.delimiter.unwrap_or(b','),
            has_header: builder.has_header.unwrap_or(false),
            on_transform_error: builder.on_transform_error.unwrap_or_default(),
            on_read_error: builder.on_read_error.unwrap_or_default(),
            skip_limit: builder.skip_limit,
            on_write_error: builder.on_write_error.unwrap_or_default(),
            retry_backoff: builder
                .retry_backoff
                .unwrap_or(Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS)),
            table: builder.table.unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            columns,
            create_table: builder.create_table.unwrap_or(true),
        }
    }

    pub fn write_retries(&self) -> usize {
        self.on_write_error.retries()
    }

    /// True when some record may be dropped instead of failing the run.
    pub fn tolerates_skips(&self) -> bool {
        self.on_transform_error == ErrorPolicy::Skip || self.on_read_error == ErrorPolicy::Skip
    }
}

#[derive(Debug, Default)]
pub struct ValidatedSettingsBuilder {
    pub job_id: String,
    pub field_names: Vec<String>,
    pub chunk_size: Option<usize>,
    pub delimiter: Option<u8>,
    pub has_header: Option<bool>,
    pub transform: Option<Vec<TransformRule>>,
    pub on_transform_error: Option<ErrorPolicy>,
    pub on_read_error: Option<ErrorPolicy>,
    pub skip_limit: Option<u64>,
    pub on_write_error: Option<WritePolicy>,
    pub retry_backoff: Option<Duration>,
    pub table: Option<String>,
    pub columns: Option<Vec<String>>,
    pub create_table: Option<bool>,
}

impl ValidatedSettingsBuilder {
    pub fn new(job_id: &str, field_names: Vec<String>) -> Self {
        Self {
            job_id: job_id.to_string(),
            field_names,
            ..Default::default()
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn on_transform_error(mut self, policy: ErrorPolicy) -> Self {
        self.on_transform_error = Some(policy);
        self
    }

    pub fn on_read_error(mut self, policy: ErrorPolicy) -> Self {
        self.on_read_error = Some(policy);
        self
    }

    pub fn skip_limit(mut self, limit: u64) -> Self {
        self.skip_limit = Some(limit);
        self
    }

    pub fn on_write_error(mut self, policy: WritePolicy) -> Self {
        self.on_write_error = Some(policy);
        self
    }

    pub fn transform(mut self, rules: Vec<TransformRule>) -> Self {
        self.transform = Some(rules);
        self
    }

    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn build(self) -> ValidatedSettings {
        ValidatedSettings::from_builder(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let settings =
            ValidatedSettingsBuilder::new("job", vec!["firstName".into(), "lastName".into()])
                .build();

        assert_eq!(settings.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(settings.delimiter, b',');
        assert_eq!(settings.table, "people");
        assert_eq!(settings.write_retries(), 0);
        assert!(!settings.tolerates_skips());
        assert_eq!(
            settings.transform,
            vec![TransformRule::Uppercase {
                fields: vec!["firstName".into(), "lastName".into()]
            }]
        );
    }

    #[test]
    fn test_builder_overrides() {
        let settings = ValidatedSettingsBuilder::new("job", vec!["a".into()])
            .chunk_size(2)
            .on_transform_error(ErrorPolicy::Skip)
            .on_write_error(WritePolicy::Retry(2))
            .skip_limit(1)
            .build();

        assert_eq!(settings.chunk_size, 2);
        assert_eq!(settings.write_retries(), 2);
        assert_eq!(settings.skip_limit, Some(1));
        assert!(settings.tolerates_skips());
    }
}
