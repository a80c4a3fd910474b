use crate::transform::error::TransformError;
use model::records::record::Record;

pub mod error;
pub mod pipeline;
pub mod rules;

/// Result of transforming one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    Emit(Record),
    /// Intentionally filtered out; not an error.
    Skip,
}

/// Maps one input record to zero or one output records.
///
/// Implementations must be pure: the same input always yields the same output.
pub trait RecordTransformer: Send + Sync {
    fn transform(&self, record: &Record) -> Result<Transformed, TransformError>;
}
