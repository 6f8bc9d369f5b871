//! The seam between the backend and a concrete store.
//!
//! The traits follow the ODBC handle hierarchy: a [`Driver`] opens
//! connections, a [`DriverConnection`] prepares statements, and a
//! [`DriverStatement`] is bound, executed and then read row by row through an
//! open cursor. Every failure is a [`DriverError`] carrying the diagnostic
//! records the store produced, which is what the retry classifier inspects.

use crate::error::DriverError;
use crate::types::SqlValue;

/// Opens connections from an ODBC-style connection string.
pub trait Driver: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// # Errors
    /// Returns the driver's diagnostics when the store cannot be reached.
    fn connect(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>, DriverError>;
}

/// A live connection to the store.
pub trait DriverConnection: Send + Sync {
    /// Prepare `sql` once; the returned handle can be executed any number of
    /// times with fresh parameters.
    ///
    /// # Errors
    /// Returns the driver's diagnostics when the statement text is rejected.
    fn prepare(&self, sql: &str) -> Result<Box<dyn DriverStatement>, DriverError>;

    /// Close the connection. Statements prepared from it must be dropped first.
    ///
    /// # Errors
    /// Returns the driver's diagnostics if the close itself fails.
    fn disconnect(&mut self) -> Result<(), DriverError>;
}

/// A prepared statement handle.
///
/// Parameters bound with [`bind`](Self::bind) stay bound until the next call
/// to `bind`. [`execute`](Self::execute) opens a cursor; it must be closed with
/// [`close_cursor`](Self::close_cursor) before the handle executes again.
pub trait DriverStatement: Send {
    /// # Errors
    /// Returns the driver's diagnostics if a value cannot be bound.
    fn bind(&mut self, params: &[SqlValue]) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver's diagnostics if execution fails.
    fn execute(&mut self) -> Result<(), DriverError>;

    /// Advance the cursor. `Ok(false)` once the rows are exhausted.
    ///
    /// # Errors
    /// Returns the driver's diagnostics if no cursor is open.
    fn fetch(&mut self) -> Result<bool, DriverError>;

    /// Read column `column` (zero-based) of the current row.
    ///
    /// # Errors
    /// Returns the driver's diagnostics if there is no current row or the
    /// column does not exist.
    fn get_data(&mut self, column: usize) -> Result<SqlValue, DriverError>;

    /// Close the cursor, discarding unread rows. Closing a statement without
    /// an open cursor is not an error.
    ///
    /// # Errors
    /// Returns the driver's diagnostics if the close fails.
    fn close_cursor(&mut self) -> Result<(), DriverError>;
}
