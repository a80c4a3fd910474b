use model::core::value::Value;
use rusqlite::types::{Value as SqlValue, ValueRef};

pub(crate) fn to_sql_value(value: Value) -> SqlValue {
    match value {
        Value::Int(v) => SqlValue::Integer(v),
        Value::Float(v) => SqlValue::Real(v),
        Value::String(v) => SqlValue::Text(v),
        Value::Boolean(v) => SqlValue::Integer(v as i64),
        Value::Null => SqlValue::Null,
    }
}

pub(crate) fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}
