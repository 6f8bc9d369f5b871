//! Typed reads from an executed statement.

use chrono::{Local, LocalResult, NaiveDateTime, TimeDelta, TimeZone};
use tracing::warn;

use crate::connection::log_records;
use crate::driver::DriverStatement;
use crate::error::{CplError, DriverError, Status};
use crate::model::{ObjectType, RelationType};
use crate::queries::Query;
use crate::types::SqlValue;

/// Outcome of reading one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    Value(T),
    /// No row.
    NotFound,
    /// A row whose column was NULL.
    Null,
}

impl<T> Fetched<T> {
    /// `NotFound` and `Null` become the matching errors.
    ///
    /// # Errors
    /// [`CplError::NotFound`] or [`CplError::DbNull`].
    pub fn into_result(self) -> Result<T, CplError> {
        match self {
            Fetched::Value(value) => Ok(value),
            Fetched::NotFound => Err(CplError::NotFound),
            Fetched::Null => Err(CplError::DbNull),
        }
    }

    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Fetched::Value(value) => Some(value),
            Fetched::NotFound | Fetched::Null => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Value(value) => Fetched::Value(f(value)),
            Fetched::NotFound => Fetched::NotFound,
            Fetched::Null => Fetched::Null,
        }
    }
}

/// How [`RowReader::fetch_single`] treats the cursor and NULLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Advance to the next row before reading; off when the caller already
    /// positioned the cursor.
    pub fetch_row: bool,
    pub close_cursor_on_success: bool,
    /// Report NULL as [`Fetched::Null`] instead of folding it into
    /// [`Fetched::NotFound`].
    pub null_as_distinct: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            fetch_row: true,
            close_cursor_on_success: true,
            null_as_distinct: false,
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn null_as_distinct(mut self) -> Self {
        self.null_as_distinct = true;
        self
    }

    #[must_use]
    pub fn keep_cursor(mut self) -> Self {
        self.close_cursor_on_success = false;
        self
    }

    #[must_use]
    pub fn current_row(mut self) -> Self {
        self.fetch_row = false;
        self
    }
}

/// Epoch seconds read from a timestamp column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpochSeconds(pub i64);

/// Conversion from a non-NULL column value.
pub trait FromSqlValue: Sized {
    /// # Errors
    /// Returns [`CplError::InvalidType`] when the column holds the wrong kind
    /// of value.
    fn from_sql_value(value: SqlValue, max_string_len: usize) -> Result<Self, CplError>;
}

fn invalid(expected: &str, value: &SqlValue) -> CplError {
    CplError::InvalidType(format!("expected {expected}, got {value:?}"))
}

impl FromSqlValue for i64 {
    fn from_sql_value(value: SqlValue, _: usize) -> Result<Self, CplError> {
        value.as_int().ok_or_else(|| invalid("integer", &value))
    }
}

impl FromSqlValue for u64 {
    fn from_sql_value(value: SqlValue, _: usize) -> Result<Self, CplError> {
        value
            .as_int()
            .and_then(|i| u64::try_from(i).ok())
            .ok_or_else(|| invalid("non-negative integer", &value))
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue, max_string_len: usize) -> Result<Self, CplError> {
        match value {
            SqlValue::Text(text) => Ok(truncate_at_char_boundary(text, max_string_len)),
            other => Err(invalid("text", &other)),
        }
    }
}

impl FromSqlValue for EpochSeconds {
    fn from_sql_value(value: SqlValue, _: usize) -> Result<Self, CplError> {
        if let Some(naive) = value.as_timestamp() {
            return Ok(EpochSeconds(local_to_epoch(naive)));
        }
        value
            .as_int()
            .map(EpochSeconds)
            .ok_or_else(|| invalid("timestamp", &value))
    }
}

impl FromSqlValue for ObjectType {
    fn from_sql_value(value: SqlValue, max_string_len: usize) -> Result<Self, CplError> {
        ObjectType::from_code(i64::from_sql_value(value, max_string_len)?)
    }
}

impl FromSqlValue for RelationType {
    fn from_sql_value(value: SqlValue, max_string_len: usize) -> Result<Self, CplError> {
        RelationType::from_code(i64::from_sql_value(value, max_string_len)?)
    }
}

/// Keep at most `max_len` bytes without splitting a character.
#[must_use]
pub fn truncate_at_char_boundary(mut text: String, max_len: usize) -> String {
    if text.len() > max_len {
        let mut end = max_len;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

/// Convert a local wall-clock time to epoch seconds.
///
/// A time repeated by a DST fall-back resolves to its later instant. A time
/// skipped by a spring-forward is read an hour earlier and shifted back by
/// an hour, landing on the same instant as the wall clock after the jump.
#[must_use]
pub fn local_to_epoch(naive: NaiveDateTime) -> i64 {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.timestamp(),
        LocalResult::Ambiguous(_, latest) => latest.timestamp(),
        LocalResult::None => {
            let hour = TimeDelta::hours(1);
            Local
                .from_local_datetime(&(naive - hour))
                .latest()
                .map_or_else(|| naive.and_utc().timestamp(), |dt| dt.timestamp() + 3600)
        }
    }
}

/// Cursor over the rows of one executed statement.
pub struct RowReader<'a> {
    stmt: &'a mut dyn DriverStatement,
    query: Query,
    max_string_len: usize,
}

impl<'a> RowReader<'a> {
    pub(crate) fn new(stmt: &'a mut dyn DriverStatement, query: Query, max_string_len: usize) -> Self {
        Self {
            stmt,
            query,
            max_string_len,
        }
    }

    fn fail(&mut self, err: &DriverError) -> CplError {
        log_records(self.query.name(), err);
        self.close_quietly();
        CplError::Statement(self.query.name().to_owned())
    }

    pub(crate) fn close_quietly(&mut self) {
        close_cursor_quietly(self.stmt, self.query);
    }

    /// Advance to the next row. `Ok(false)` when the rows are exhausted.
    ///
    /// # Errors
    /// [`CplError::Statement`] if the driver fails; the records are logged.
    pub fn next_row(&mut self) -> Result<bool, CplError> {
        match self.stmt.fetch() {
            Ok(more) => Ok(more),
            Err(err) => Err(self.fail(&err)),
        }
    }

    /// Read `column` of the current row.
    ///
    /// # Errors
    /// [`CplError::Statement`] if the driver fails, or
    /// [`CplError::InvalidType`] if the value has the wrong type.
    pub fn column<T: FromSqlValue>(&mut self, column: usize) -> Result<Fetched<T>, CplError> {
        let value = match self.stmt.get_data(column) {
            Ok(value) => value,
            Err(err) => return Err(self.fail(&err)),
        };
        if value.is_null() {
            return Ok(Fetched::Null);
        }
        T::from_sql_value(value, self.max_string_len).map(Fetched::Value)
    }

    /// A column that may not be NULL.
    ///
    /// # Errors
    /// As [`column`](Self::column), plus [`CplError::DbNull`] for NULL.
    pub fn required<T: FromSqlValue>(&mut self, column: usize) -> Result<T, CplError> {
        self.column(column)?.into_result()
    }

    /// A column that may be NULL.
    ///
    /// # Errors
    /// As [`column`](Self::column).
    pub fn optional<T: FromSqlValue>(&mut self, column: usize) -> Result<Option<T>, CplError> {
        Ok(self.column(column)?.into_option())
    }

    /// Read a single value, distinguishing "no row" from "NULL" when asked.
    ///
    /// # Errors
    /// As [`column`](Self::column).
    pub fn fetch_single<T: FromSqlValue>(
        &mut self,
        column: usize,
        options: FetchOptions,
    ) -> Result<Fetched<T>, CplError> {
        if options.fetch_row && !self.next_row()? {
            self.close_quietly();
            return Ok(Fetched::NotFound);
        }
        let fetched = match self.column(column)? {
            Fetched::Null if !options.null_as_distinct => Fetched::NotFound,
            other => other,
        };
        if options.close_cursor_on_success {
            self.close_quietly();
        }
        Ok(fetched)
    }

    /// Map every remaining row with `row`, then close the cursor.
    ///
    /// # Errors
    /// The first error from the driver or from `row`.
    pub fn collect_rows<T>(
        &mut self,
        mut row: impl FnMut(&mut Self) -> Result<T, CplError>,
    ) -> Result<Vec<T>, CplError> {
        let mut rows = Vec::new();
        while self.next_row()? {
            rows.push(row(self)?);
        }
        self.close_quietly();
        Ok(rows)
    }
}

pub(crate) fn close_cursor_quietly(stmt: &mut dyn DriverStatement, query: Query) {
    if let Err(err) = stmt.close_cursor() {
        warn!(query = query.name(), "closing cursor failed: {err}");
    }
}

/// Hand buffered rows to a caller callback, stopping at its first error.
///
/// # Errors
/// Whatever the callback returns.
pub fn deliver<T>(
    rows: Vec<T>,
    callback: &mut dyn FnMut(T) -> Result<(), CplError>,
) -> Result<Status, CplError> {
    if rows.is_empty() {
        return Ok(Status::NoData);
    }
    for row in rows {
        callback(row)?;
    }
    Ok(Status::Ok)
}
