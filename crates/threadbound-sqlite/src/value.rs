// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversions between threadbound values and SQLite values.

use rusqlite::types::Value as SqlValue;
use threadbound_core::{DriverError, Value};

/// Convert a scalar binding. Lists only make sense in batch mode, where the
/// caller splits them per row before binding.
pub(crate) fn to_sql(value: &Value) -> Result<SqlValue, DriverError> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(r) => SqlValue::Real(*r),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
        Value::List(_) => {
            return Err(DriverError::new(
                "list values can only be bound in batch mode",
            ));
        }
    })
}

pub(crate) fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(i),
        SqlValue::Real(r) => Value::Real(r),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(b) => Value::Blob(b),
    }
}

/// Map a rusqlite error, keeping SQLite's extended result code.
pub(crate) fn driver_error(err: rusqlite::Error) -> DriverError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let text = message.clone().unwrap_or_else(|| failure.to_string());
            DriverError::new(text).with_code(failure.extended_code)
        }
        _ => DriverError::new(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_convert_both_ways() {
        for value in [
            Value::Null,
            Value::Integer(-3),
            Value::Real(0.5),
            Value::Text("ada".into()),
            Value::Blob(vec![1, 2]),
        ] {
            assert_eq!(from_sql(to_sql(&value).unwrap()), value);
        }
    }

    #[test]
    fn list_is_rejected_outside_batch() {
        let err = to_sql(&Value::List(vec![Value::Integer(1)])).unwrap_err();
        assert!(err.message.contains("batch"));
    }
}
