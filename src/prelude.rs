//! Convenient imports for common functionality.
//!
//! This module re-exports the backend trait, its constructors and the model
//! types most callers need.

pub use crate::backend::{
    ProvenanceBackend, RelationalBackend, RowCallback, create_backend, create_backend_dsn,
};
pub use crate::config::{BackendOptions, BackendOptionsBuilder};
pub use crate::context::CplContext;
pub use crate::driver::{Driver, DriverConnection, DriverStatement};
pub use crate::error::{CplError, DriverError, Status};
pub use crate::model::{
    BundleId, BundleInfo, CPL_NONE, CplId, Direction, LookupEntry, LookupFlags, ObjectId,
    ObjectInfo, ObjectType, PrefixEntry, PropertyEntry, PropertyFilter, RelationId, RelationInfo,
    RelationType, SessionDescriptor, SessionId, SessionInfo,
};
pub use crate::types::{DbType, SqlValue};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteDriver;
