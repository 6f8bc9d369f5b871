// SQLite driver - the one concrete store shipped with the crate
//
// - config: driver options and the bundled schema
// - params: bound values into rusqlite values
// - query: row extraction and buffering
// - connection: connection and statement handles
// - diagnostics: rusqlite errors into SQLSTATE records

pub mod config;
pub mod connection;
mod diagnostics;
pub mod params;
pub mod query;

use tracing::debug;

use crate::connection_string::ConnectionString;
use crate::driver::{Driver, DriverConnection};
use crate::error::DriverError;

pub use config::{SCHEMA_SQL, SqliteOptions, SqliteOptionsBuilder};
pub use connection::{SqliteConnection, SqliteStatement};
use diagnostics::{SQLSTATE_DSN_NOT_FOUND, SQLSTATE_UNABLE_TO_CONNECT, from_rusqlite};

/// Driver opening `SQLite` databases through rusqlite.
///
/// Connection strings name the file with `Database=<path>` (aliases `DB`,
/// `DBQ`) or a registered data source with `DSN=<name>`:
///
/// ```rust,no_run
/// use prov_cpl::sqlite::SqliteDriver;
/// use prov_cpl::driver::Driver;
///
/// let driver = SqliteDriver::new_default().with_schema().with_dsn("prov", "/tmp/prov.db");
/// let conn = driver.connect("DSN=prov;")?;
/// # drop(conn);
/// # Ok::<(), prov_cpl::DriverError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SqliteDriver {
    opts: SqliteOptions,
}

impl SqliteDriver {
    #[must_use]
    pub fn new(opts: SqliteOptions) -> Self {
        Self { opts }
    }

    #[must_use]
    pub fn new_default() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new()
    }

    /// Create the provenance tables and triggers on every connect.
    #[must_use]
    pub fn with_schema(mut self) -> Self {
        self.opts.apply_schema = true;
        self
    }

    #[must_use]
    pub fn with_dsn(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.opts.dsns.insert(name.into(), path.into());
        self
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.opts
    }

    fn resolve_path<'a>(&'a self, parsed: &'a ConnectionString) -> Result<&'a str, DriverError> {
        if let Some(dsn) = parsed.dsn() {
            return self.opts.dsns.get(dsn).map(String::as_str).ok_or_else(|| {
                DriverError::single(
                    SQLSTATE_DSN_NOT_FOUND,
                    0,
                    format!("data source name not found: {dsn}"),
                )
            });
        }
        parsed.database().ok_or_else(|| {
            DriverError::single(
                SQLSTATE_UNABLE_TO_CONNECT,
                0,
                "connection string names neither DSN nor Database",
            )
        })
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn connect(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>, DriverError> {
        let parsed = ConnectionString::parse(connection_string)
            .map_err(|e| DriverError::single(SQLSTATE_UNABLE_TO_CONNECT, 0, e.to_string()))?;
        let path = self.resolve_path(&parsed)?;

        let conn = rusqlite::Connection::open(path).map_err(|e| from_rusqlite(&e))?;
        conn.busy_timeout(self.opts.busy_timeout)
            .map_err(|e| from_rusqlite(&e))?;
        conn.set_prepared_statement_cache_capacity(self.opts.statement_cache_capacity);
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| from_rusqlite(&e))?;
        if self.opts.apply_schema {
            conn.execute_batch(SCHEMA_SQL).map_err(|e| from_rusqlite(&e))?;
        }
        debug!(path, schema = self.opts.apply_schema, "opened SQLite connection");

        Ok(Box::new(SqliteConnection::new(conn)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlValue;

    #[test]
    fn statement_cursor_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("cursor.db");
        let driver = SqliteDriver::new_default().with_schema();
        let conn = driver.connect(&format!("Database={};", path.display()))?;

        let mut stmt = conn.prepare("SELECT ?1 + 1, 'x'")?;
        stmt.bind(&[SqlValue::Int(41)])?;
        stmt.execute()?;
        // a second execute on an open cursor is refused
        assert!(stmt.execute().unwrap_err().has_state("24000"));
        assert!(stmt.fetch()?);
        assert_eq!(stmt.get_data(0)?, SqlValue::Int(42));
        assert_eq!(stmt.get_data(1)?, SqlValue::Text("x".into()));
        assert!(stmt.get_data(2).unwrap_err().has_state("07009"));
        assert!(!stmt.fetch()?);
        stmt.close_cursor()?;
        stmt.execute()?;
        stmt.close_cursor()?;
        Ok(())
    }

    #[test]
    fn unknown_dsn_and_bad_sql_are_reported() -> Result<(), Box<dyn std::error::Error>> {
        let driver = SqliteDriver::new_default();
        let err = driver.connect("DSN=missing;").err().expect("unknown dsn");
        assert!(err.has_state("IM002"));

        let conn = driver.connect("Database=:memory:;")?;
        assert!(conn.prepare("SELEC nothing").is_err());
        Ok(())
    }

    #[test]
    fn statements_fail_after_disconnect() -> Result<(), Box<dyn std::error::Error>> {
        let driver = SqliteDriver::new_default();
        let mut conn = driver.connect("Database=:memory:;")?;
        let mut stmt = conn.prepare("SELECT 1")?;
        conn.disconnect()?;
        assert!(stmt.execute().unwrap_err().has_state("08003"));
        Ok(())
    }
}
