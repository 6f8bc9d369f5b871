use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::driver::{DriverConnection, DriverStatement};
use crate::error::DriverError;
use crate::types::SqlValue;

use super::diagnostics::{
    SQLSTATE_CONNECTION_NOT_OPEN, SQLSTATE_INVALID_CURSOR_STATE,
    SQLSTATE_INVALID_DESCRIPTOR_INDEX, from_rusqlite,
};
use super::params::Params;
use super::query::buffer_rows;

/// `None` once the connection has been closed.
pub(crate) type SharedSqliteConnection = Arc<Mutex<Option<rusqlite::Connection>>>;

fn lock(conn: &SharedSqliteConnection) -> MutexGuard<'_, Option<rusqlite::Connection>> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_open() -> DriverError {
    DriverError::single(SQLSTATE_CONNECTION_NOT_OPEN, 0, "connection is closed")
}

/// A rusqlite connection shared by the statement handles prepared from it.
pub struct SqliteConnection {
    conn: SharedSqliteConnection,
}

impl SqliteConnection {
    pub(crate) fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("open", &lock(&self.conn).is_some())
            .finish()
    }
}

impl DriverConnection for SqliteConnection {
    fn prepare(&self, sql: &str) -> Result<Box<dyn DriverStatement>, DriverError> {
        {
            let guard = lock(&self.conn);
            let conn = guard.as_ref().ok_or_else(not_open)?;
            // Compile once up front so bad statement text fails here rather
            // than on first execute.
            conn.prepare_cached(sql).map_err(|e| from_rusqlite(&e))?;
        }
        Ok(Box::new(SqliteStatement {
            conn: Arc::clone(&self.conn),
            sql: sql.to_owned(),
            params: Params::default(),
            cursor: None,
            current: None,
        }))
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        let Some(conn) = lock(&self.conn).take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| from_rusqlite(&e))
    }
}

/// Statement handle over the connection's statement cache.
///
/// rusqlite statements borrow their connection, so the handle keeps the SQL
/// text and re-fetches the compiled statement from the cache on every
/// execute. The result set is buffered at execute time and served through an
/// emulated cursor.
pub struct SqliteStatement {
    conn: SharedSqliteConnection,
    sql: String,
    params: Params,
    cursor: Option<VecDeque<Vec<SqlValue>>>,
    current: Option<Vec<SqlValue>>,
}

impl fmt::Debug for SqliteStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStatement")
            .field("sql", &self.sql)
            .field("cursor_open", &self.cursor.is_some())
            .finish_non_exhaustive()
    }
}

impl DriverStatement for SqliteStatement {
    fn bind(&mut self, params: &[SqlValue]) -> Result<(), DriverError> {
        if self.cursor.is_some() {
            return Err(DriverError::single(
                SQLSTATE_INVALID_CURSOR_STATE,
                0,
                "cannot bind while a cursor is open",
            ));
        }
        self.params = Params::convert(params);
        Ok(())
    }

    fn execute(&mut self) -> Result<(), DriverError> {
        if self.cursor.is_some() {
            return Err(DriverError::single(
                SQLSTATE_INVALID_CURSOR_STATE,
                0,
                "cursor still open from a previous execute",
            ));
        }
        let guard = lock(&self.conn);
        let conn = guard.as_ref().ok_or_else(not_open)?;
        let mut stmt = conn.prepare_cached(&self.sql).map_err(|e| from_rusqlite(&e))?;
        let rows = buffer_rows(&mut stmt, &self.params.as_refs()).map_err(|e| from_rusqlite(&e))?;
        self.cursor = Some(rows);
        self.current = None;
        Ok(())
    }

    fn fetch(&mut self) -> Result<bool, DriverError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(DriverError::single(
                SQLSTATE_INVALID_CURSOR_STATE,
                0,
                "fetch without an open cursor",
            ));
        };
        self.current = cursor.pop_front();
        Ok(self.current.is_some())
    }

    fn get_data(&mut self, column: usize) -> Result<SqlValue, DriverError> {
        let Some(row) = self.current.as_ref() else {
            return Err(DriverError::single(
                SQLSTATE_INVALID_CURSOR_STATE,
                0,
                "no current row",
            ));
        };
        row.get(column).cloned().ok_or_else(|| {
            DriverError::single(
                SQLSTATE_INVALID_DESCRIPTOR_INDEX,
                0,
                format!("column {column} out of range ({} columns)", row.len()),
            )
        })
    }

    fn close_cursor(&mut self) -> Result<(), DriverError> {
        self.cursor = None;
        self.current = None;
        Ok(())
    }
}
