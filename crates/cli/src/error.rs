use connectors::{sink::SinkError, source::SourceError};
use engine_config::settings::error::SettingsError;
use engine_core::error::StoreError;
use engine_processing::error::JobFailure;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid job settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to open the input: {0}")]
    Source(#[from] SourceError),

    #[error("Failed to open the sink: {0}")]
    Sink(#[from] SinkError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Job(#[from] JobFailure),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl CliError {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, CliError::Job(failure) if failure.is_cancelled())
    }
}
