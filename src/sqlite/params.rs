use rusqlite::types::Value;

use crate::types::SqlValue;

/// Convert a single bound value to a rusqlite `Value`. Timestamps are written
/// in the same `YYYY-MM-DD HH:MM:SS` form `datetime()` produces.
#[must_use]
pub fn sql_value_to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Timestamp(dt) => Value::Text(dt.format("%F %T").to_string()),
        SqlValue::Null => Value::Null,
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Bound parameters of one statement handle.
#[derive(Debug, Clone, Default)]
pub struct Params(pub Vec<Value>);

impl Params {
    #[must_use]
    pub fn convert(params: &[SqlValue]) -> Self {
        Params(params.iter().map(sql_value_to_sqlite_value).collect())
    }

    /// Build a borrowed params slice suitable for rusqlite execution.
    #[must_use]
    pub fn as_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.0.iter().map(|v| v as &dyn rusqlite::ToSql).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn timestamps_bind_as_datetime_text() {
        let dt = NaiveDate::from_ymd_opt(2024, 11, 3)
            .and_then(|d| d.and_hms_opt(1, 30, 5))
            .expect("valid date");
        assert_eq!(
            sql_value_to_sqlite_value(&SqlValue::Timestamp(dt)),
            Value::Text("2024-11-03 01:30:05".into())
        );
        assert_eq!(sql_value_to_sqlite_value(&SqlValue::Null), Value::Null);
    }
}
