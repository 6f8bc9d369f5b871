//! Relational backend for the Prov-CPL provenance library.
//!
//! Objects, relations, bundles, sessions and their properties are stored in a
//! relational database reached through an ODBC-shaped [`driver`]. Each query
//! runs on one of a fixed number of prepared statement handles, and a call
//! that loses the link to the store is retried on a rebuilt connection.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use prov_cpl::prelude::*;
//! use prov_cpl::sqlite::SqliteDriver;
//!
//! let driver = Arc::new(SqliteDriver::new_default().with_schema());
//! let backend = create_backend(driver, "Database=/tmp/prov.db;", DbType::Sqlite)?;
//! let session = backend.create_session(&SessionDescriptor::for_current_process())?;
//! let input = backend.create_object("ns", "input.csv", ObjectType::Entity, session)?;
//! let run = backend.create_object("ns", "run-1", ObjectType::Activity, session)?;
//! backend.add_relation(run, input, RelationType::Used)?;
//! assert!(backend.has_immediate_ancestor(run, input)?);
//! # Ok::<(), CplError>(())
//! ```

pub mod backend;
pub mod config;
pub mod connection;
pub mod connection_string;
pub mod context;
pub mod driver;
pub mod error;
pub mod executor;
pub mod model;
pub mod pool;
pub mod prelude;
pub mod queries;
pub mod results;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use backend::{
    ProvenanceBackend, RelationalBackend, RowCallback, create_backend, create_backend_dsn,
};
pub use config::{BackendOptions, BackendOptionsBuilder};
pub use context::CplContext;
pub use error::{CplError, DiagnosticRecord, DriverError, Status, return_code};
pub use model::*;
pub use queries::Query;
pub use types::{DbType, SqlValue};
