use crate::settings::{
    ErrorPolicy, JobSettings, WritePolicy,
    error::SettingsError,
    validated::{ValidatedSettings, ValidatedSettingsBuilder},
};
use model::core::utils::to_snake_case;
use std::{collections::HashSet, time::Duration};
use tracing::{info, warn};

const LARGE_CHUNK_SIZE: usize = 100_000;

/// Validates raw job settings, collecting every problem before failing.
pub struct SettingsValidator;

impl SettingsValidator {
    pub fn validate(settings: &JobSettings) -> Result<ValidatedSettings, SettingsError> {
        let mut builder =
            ValidatedSettingsBuilder::new(&settings.job_id, settings.field_names.clone());
        let mut errors: Vec<String> = Vec::new();

        Self::validate_job_id(settings, &mut errors);
        Self::validate_chunk_size(settings, &mut builder, &mut errors);
        Self::validate_fields(settings, &mut errors);
        Self::validate_delimiter(settings, &mut builder, &mut errors);
        Self::validate_transform(settings, &mut builder, &mut errors);
        Self::validate_policies(settings, &mut builder);
        Self::validate_sink(settings, &mut builder, &mut errors);

        if !errors.is_empty() {
            return Err(SettingsError::ValidationFailed(errors));
        }

        let validated = builder.build();
        info!(
            job_id = %validated.job_id,
            chunk_size = validated.chunk_size,
            table = %validated.table,
            "Settings validated"
        );
        Ok(validated)
    }

    fn validate_job_id(settings: &JobSettings, errors: &mut Vec<String>) {
        let id = &settings.job_id;
        if id.is_empty() {
            errors.push("job_id must not be empty".to_string());
        } else if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            errors.push(format!(
                "job_id '{id}' may only contain ASCII letters, digits, '-', '_' and '.'"
            ));
        }
    }

    fn validate_chunk_size(
        settings: &JobSettings,
        builder: &mut ValidatedSettingsBuilder,
        errors: &mut Vec<String>,
    ) {
        if settings.chunk_size == 0 {
            errors.push("chunk_size must be a positive integer".to_string());
            return;
        }
        if settings.chunk_size > LARGE_CHUNK_SIZE {
            warn!(
                "Chunk size {} is very large, a failed chunk rolls back all of it",
                settings.chunk_size
            );
        }
        builder.chunk_size = Some(settings.chunk_size);
    }

    fn validate_fields(settings: &JobSettings, errors: &mut Vec<String>) {
        if settings.field_names.is_empty() {
            errors.push("field_names must list at least one field".to_string());
        }

        let mut seen = HashSet::new();
        for name in &settings.field_names {
            if name.trim().is_empty() {
                errors.push("field_names must not contain empty names".to_string());
            } else if !seen.insert(name.to_ascii_lowercase()) {
                errors.push(format!("duplicate field name '{name}'"));
            }
        }
    }

    fn validate_delimiter(
        settings: &JobSettings,
        builder: &mut ValidatedSettingsBuilder,
        errors: &mut Vec<String>,
    ) {
        let delimiter = settings.delimiter;
        if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' || delimiter == '\r' {
            errors.push(format!(
                "delimiter {delimiter:?} must be a single ASCII character other than quote or newline"
            ));
            return;
        }
        builder.delimiter = Some(delimiter as u8);
        builder.has_header = Some(settings.has_header);
    }

    fn validate_transform(
        settings: &JobSettings,
        builder: &mut ValidatedSettingsBuilder,
        errors: &mut Vec<String>,
    ) {
        let Some(rules) = &settings.transform else {
            return;
        };

        for rule in rules {
            for field in rule.referenced_fields() {
                let known = settings
                    .field_names
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(field));
                if !known {
                    errors.push(format!(
                        "transform rule '{}' refers to unknown field '{field}'",
                        rule.name()
                    ));
                }
            }
        }
        builder.transform = Some(rules.clone());
    }

    fn validate_policies(settings: &JobSettings, builder: &mut ValidatedSettingsBuilder) {
        builder.on_transform_error = Some(settings.on_transform_error);
        builder.on_read_error = Some(settings.on_read_error);

        if settings.skip_limit.is_some()
            && settings.on_transform_error == ErrorPolicy::Abort
            && settings.on_read_error == ErrorPolicy::Abort
        {
            warn!("skip_limit is set but no error policy skips records; it has no effect");
        }
        builder.skip_limit = settings.skip_limit;

        let write_policy = match settings.on_write_error {
            WritePolicy::Retry(0) => {
                warn!("on_write_error retry count is 0, treating as abort");
                WritePolicy::Abort
            }
            policy => policy,
        };
        builder.on_write_error = Some(write_policy);
        builder.retry_backoff = Some(Duration::from_millis(settings.retry_backoff_ms));
    }

    fn validate_sink(
        settings: &JobSettings,
        builder: &mut ValidatedSettingsBuilder,
        errors: &mut Vec<String>,
    ) {
        if settings.table.trim().is_empty() {
            errors.push("table must not be empty".to_string());
        }
        builder.table = Some(settings.table.clone());
        builder.create_table = Some(settings.create_table);

        let columns = match &settings.columns {
            Some(columns) => {
                if columns.len() != settings.field_names.len() {
                    errors.push(format!(
                        "columns lists {} names but field_names lists {}",
                        columns.len(),
                        settings.field_names.len()
                    ));
                }
                columns.clone()
            }
            None => settings
                .field_names
                .iter()
                .map(|f| to_snake_case(f))
                .collect(),
        };
        builder.columns = Some(columns);
    }
}
