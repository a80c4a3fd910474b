use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Rule '{rule}' requires field '{field}', which the record does not have")]
    MissingField { rule: &'static str, field: String },

    #[error("Rule '{rule}' expects a string in field '{field}', found {found}")]
    WrongType {
        rule: &'static str,
        field: String,
        found: &'static str,
    },
}
