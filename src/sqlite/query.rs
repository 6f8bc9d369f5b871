use std::collections::VecDeque;

use rusqlite::types::Value;
use rusqlite::{Statement, ToSql};

use crate::types::SqlValue;

/// Extract a `SqlValue` from a `SQLite` row.
///
/// # Errors
///
/// Returns the rusqlite error if the column cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row, idx: usize) -> Result<SqlValue, rusqlite::Error> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Int(i),
        Value::Real(f) => SqlValue::Float(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    })
}

/// Run `stmt` and buffer every row it yields. DML without `RETURNING` runs to
/// completion and yields nothing.
///
/// # Errors
/// Returns the rusqlite error from execution or row extraction.
pub fn buffer_rows(
    stmt: &mut Statement,
    params: &[&dyn ToSql],
) -> Result<VecDeque<Vec<SqlValue>>, rusqlite::Error> {
    let col_count = stmt.column_count();
    let mut rows_iter = stmt.query(params)?;
    let mut rows = VecDeque::new();

    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value(row, i)?);
        }
        rows.push_back(row_values);
    }

    Ok(rows)
}
