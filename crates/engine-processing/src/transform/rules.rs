use crate::transform::{Transformed, error::TransformError, pipeline::Transform};
use model::{core::value::Value, records::record::Record};

/// Rewrites string fields with `f`. With no explicit fields every string
/// field is rewritten and other values are left alone; an explicit field
/// must exist and hold a string (or null, which passes through).
fn map_strings(
    rule: &'static str,
    record: Record,
    fields: &[String],
    f: impl Fn(&str) -> String,
) -> Result<Record, TransformError> {
    if fields.is_empty() {
        let names: Vec<String> = record.names().map(str::to_string).collect();
        return Ok(names.iter().fold(record, |acc, name| {
            match acc.get(name).and_then(Value::as_str).map(&f) {
                Some(mapped) => acc.with_value(name, Value::String(mapped)),
                None => acc,
            }
        }));
    }

    let mut out = record;
    for field in fields {
        let mapped = match out.get(field) {
            None => {
                return Err(TransformError::MissingField {
                    rule,
                    field: field.clone(),
                });
            }
            Some(Value::Null) => continue,
            Some(Value::String(s)) => f(s),
            Some(other) => {
                return Err(TransformError::WrongType {
                    rule,
                    field: field.clone(),
                    found: other.type_name(),
                });
            }
        };
        out = out.with_value(field, Value::String(mapped));
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Upper,
    Lower,
}

#[derive(Debug, Clone)]
pub struct CaseRule {
    case: Case,
    fields: Vec<String>,
}

impl CaseRule {
    pub fn upper(fields: Vec<String>) -> Self {
        Self {
            case: Case::Upper,
            fields,
        }
    }

    pub fn lower(fields: Vec<String>) -> Self {
        Self {
            case: Case::Lower,
            fields,
        }
    }
}

impl Transform for CaseRule {
    fn apply(&self, record: Record) -> Result<Transformed, TransformError> {
        let out = match self.case {
            Case::Upper => map_strings("uppercase", record, &self.fields, str::to_uppercase)?,
            Case::Lower => map_strings("lowercase", record, &self.fields, str::to_lowercase)?,
        };
        Ok(Transformed::Emit(out))
    }
}

#[derive(Debug, Clone)]
pub struct TrimRule {
    fields: Vec<String>,
}

impl TrimRule {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }
}

impl Transform for TrimRule {
    fn apply(&self, record: Record) -> Result<Transformed, TransformError> {
        let out = map_strings("trim", record, &self.fields, |s| s.trim().to_string())?;
        Ok(Transformed::Emit(out))
    }
}

/// Filters out records whose field is null or an empty string.
#[derive(Debug, Clone)]
pub struct SkipIfEmpty {
    field: String,
}

impl SkipIfEmpty {
    pub fn new(field: String) -> Self {
        Self { field }
    }
}

impl Transform for SkipIfEmpty {
    fn apply(&self, record: Record) -> Result<Transformed, TransformError> {
        let empty = match record.get(&self.field) {
            None => {
                return Err(TransformError::MissingField {
                    rule: "skip_if_empty",
                    field: self.field.clone(),
                });
            }
            Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        };

        if empty {
            Ok(Transformed::Skip)
        } else {
            Ok(Transformed::Emit(record))
        }
    }
}
