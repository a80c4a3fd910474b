use crate::core::value::{FieldValue, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of data: an ordered list of named scalar fields.
///
/// Records are never mutated in place; transforms derive new records
/// through [`Record::with_value`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Record {
    fields: Vec<FieldValue>,
}

impl Record {
    pub fn new(fields: Vec<FieldValue>) -> Self {
        Record { fields }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Record {
            fields: pairs
                .into_iter()
                .map(|(name, value)| FieldValue::new(name, value))
                .collect(),
        }
    }

    /// Case-insensitive field lookup.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| &f.value)
    }

    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|f| &f.value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns a copy of this record with `name` set to `value`.
    /// The field keeps its position when present and is appended otherwise.
    pub fn with_value(&self, name: &str, value: Value) -> Record {
        let mut fields = self.fields.clone();
        match fields
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(name))
        {
            Some(field) => field.value = value,
            None => fields.push(FieldValue::new(name, value)),
        }
        Record { fields }
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.fields.len() * 16);
        for field in &self.fields {
            out.extend_from_slice(field.name.as_bytes());
            out.push(0);
            field.value.canonical_bytes(&mut out);
        }
        out
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|field| format!("{}={}", field.name, field.value))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
