use std::path::PathBuf;
use thiserror::Error;

/// Errors raised when loading or validating job settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Every problem found in one validation pass.
    #[error("Settings validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
}
