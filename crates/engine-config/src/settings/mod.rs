//! Job configuration as loaded from JSON or assembled by the CLI.

use crate::settings::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod error;
pub mod validated;
pub mod validator;

pub const DEFAULT_CHUNK_SIZE: usize = 10;
pub const DEFAULT_TABLE: &str = "people";
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;

/// What to do with a record that fails to read or transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Fail the run without writing the chunk being assembled.
    #[default]
    Abort,
    /// Drop the offending record, log it, and keep going.
    Skip,
}

/// What to do when a chunk write fails.
///
/// Serialized as `"abort"` or `{ "retry": 3 }`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    #[default]
    Abort,
    /// Additional attempts after the first failure.
    Retry(usize),
}

impl WritePolicy {
    pub fn retries(&self) -> usize {
        match self {
            WritePolicy::Abort => 0,
            WritePolicy::Retry(n) => *n,
        }
    }
}

/// A single transform step. An empty `fields` list applies the rule to every
/// string field of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum TransformRule {
    Uppercase {
        #[serde(default)]
        fields: Vec<String>,
    },
    Lowercase {
        #[serde(default)]
        fields: Vec<String>,
    },
    Trim {
        #[serde(default)]
        fields: Vec<String>,
    },
    /// Filters out records whose `field` is empty or null.
    SkipIfEmpty { field: String },
}

impl TransformRule {
    pub fn name(&self) -> &'static str {
        match self {
            TransformRule::Uppercase { .. } => "uppercase",
            TransformRule::Lowercase { .. } => "lowercase",
            TransformRule::Trim { .. } => "trim",
            TransformRule::SkipIfEmpty { .. } => "skip_if_empty",
        }
    }

    /// Field names the rule refers to explicitly.
    pub fn referenced_fields(&self) -> Vec<&str> {
        match self {
            TransformRule::Uppercase { fields }
            | TransformRule::Lowercase { fields }
            | TransformRule::Trim { fields } => fields.iter().map(String::as_str).collect(),
            TransformRule::SkipIfEmpty { field } => vec![field.as_str()],
        }
    }
}

/// Raw job settings. Everything except `job_id` and `field_names` has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSettings {
    pub job_id: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    pub field_names: Vec<String>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub has_header: bool,
    /// `None` means uppercase every field.
    #[serde(default)]
    pub transform: Option<Vec<TransformRule>>,
    #[serde(default)]
    pub on_transform_error: ErrorPolicy,
    #[serde(default)]
    pub on_read_error: ErrorPolicy,
    #[serde(default)]
    pub skip_limit: Option<u64>,
    #[serde(default)]
    pub on_write_error: WritePolicy,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_table")]
    pub table: String,
    /// Sink column per field, positionally. Defaults to snake_case field names.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default = "default_create_table")]
    pub create_table: bool,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_delimiter() -> char {
    ','
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_create_table() -> bool {
    true
}

impl JobSettings {
    /// Settings with every optional value at its default.
    pub fn new(job_id: &str, field_names: &[&str]) -> Self {
        JobSettings {
            job_id: job_id.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            field_names: field_names.iter().map(|f| f.to_string()).collect(),
            delimiter: default_delimiter(),
            has_header: false,
            transform: None,
            on_transform_error: ErrorPolicy::Abort,
            on_read_error: ErrorPolicy::Abort,
            skip_limit: None,
            on_write_error: WritePolicy::Abort,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            table: default_table(),
            columns: None,
            create_table: true,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_uses_defaults() {
        let settings =
            JobSettings::from_json_str(r#"{"job_id":"people","field_names":["firstName","lastName"]}"#)
                .unwrap();

        assert_eq!(settings, JobSettings::new("people", &["firstName", "lastName"]));
    }

    #[test]
    fn parses_policies_and_rules() {
        let settings = JobSettings::from_json_str(
            r#"{
                "job_id": "people",
                "field_names": ["firstName", "lastName"],
                "chunk_size": 2,
                "delimiter": ";",
                "transform": [
                    {"rule": "trim"},
                    {"rule": "skip_if_empty", "field": "lastName"},
                    {"rule": "uppercase", "fields": ["firstName"]}
                ],
                "on_transform_error": "skip",
                "skip_limit": 5,
                "on_write_error": {"retry": 3}
            }"#,
        )
        .unwrap();

        assert_eq!(settings.chunk_size, 2);
        assert_eq!(settings.delimiter, ';');
        assert_eq!(settings.on_transform_error, ErrorPolicy::Skip);
        assert_eq!(settings.on_read_error, ErrorPolicy::Abort);
        assert_eq!(settings.on_write_error, WritePolicy::Retry(3));
        assert_eq!(settings.on_write_error.retries(), 3);
        assert_eq!(settings.skip_limit, Some(5));

        let rules = settings.transform.unwrap();
        assert_eq!(rules[0], TransformRule::Trim { fields: vec![] });
        assert_eq!(
            rules[1],
            TransformRule::SkipIfEmpty {
                field: "lastName".into()
            }
        );
        assert_eq!(rules[2].referenced_fields(), vec!["firstName"]);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = JobSettings::from_json_str(
            r#"{"job_id":"a","field_names":["x"],"chunksize":3}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}
