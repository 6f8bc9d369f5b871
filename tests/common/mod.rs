#![allow(dead_code)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use prov_cpl::sqlite::SqliteDriver;
use prov_cpl::test_utils::{FaultInjectingDriver, FaultPlan};
use prov_cpl::{
    BackendOptions, CplError, DbType, ProvenanceBackend, RelationalBackend, RowCallback,
    SessionDescriptor, SessionId, Status,
};
use tempfile::TempDir;

pub type TestResult = Result<(), Box<dyn Error>>;

/// A throwaway `SQLite` store that lives as long as the value.
pub struct Store {
    _dir: TempDir,
    path: PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("prov.db");
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection_string(&self) -> String {
        format!("Database={};", self.path.display())
    }

    pub fn driver() -> SqliteDriver {
        SqliteDriver::new_default().with_schema()
    }

    pub fn backend(&self, pool_size: usize) -> Result<RelationalBackend, Box<dyn Error>> {
        let options = BackendOptions::builder()
            .pool_size(pool_size)
            .db_type(DbType::Sqlite)
            .finish();
        Ok(RelationalBackend::connect(
            Arc::new(Self::driver()),
            &self.connection_string(),
            options,
        )?)
    }

    /// Backend behind a fault-injecting driver, with the driver's plan.
    pub fn faulty_backend(
        &self,
        options: BackendOptions,
    ) -> Result<(RelationalBackend, Arc<FaultPlan>), Box<dyn Error>> {
        let driver = FaultInjectingDriver::new(Arc::new(Self::driver()));
        let plan = driver.plan();
        let backend =
            RelationalBackend::connect(Arc::new(driver), &self.connection_string(), options)?;
        Ok((backend, plan))
    }

    /// Direct access for arranging rows the backend never writes itself.
    pub fn raw(&self) -> Result<rusqlite::Connection, Box<dyn Error>> {
        Ok(rusqlite::Connection::open(&self.path)?)
    }
}

pub fn session(backend: &dyn ProvenanceBackend) -> Result<SessionId, Box<dyn Error>> {
    let descriptor = SessionDescriptor::new("tester", 4242, "prov-tests")
        .with_mac_address("00:11:22:33:44:55")
        .with_cmdline("prov-tests --all");
    Ok(backend.create_session(&descriptor)?)
}

/// Collect every row of an enumeration.
pub fn collect<T>(
    run: impl FnOnce(RowCallback<'_, T>) -> Result<Status, CplError>,
) -> Result<(Status, Vec<T>), CplError> {
    let mut rows = Vec::new();
    let status = run(&mut |row| {
        rows.push(row);
        Ok(())
    })?;
    Ok((status, rows))
}
