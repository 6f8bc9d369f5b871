//! The provenance backend interface and its relational implementation.

mod bundles;
mod objects;
mod relations;
mod sessions;

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::config::BackendOptions;
use crate::connection::{ConnectionManager, LiveConnection};
use crate::connection_string::dsn_connection_string;
use crate::driver::Driver;
use crate::error::{CplError, Status};
use crate::model::{
    BundleId, BundleInfo, CPL_NONE, CplId, Direction, LookupEntry, LookupFlags, ObjectId,
    ObjectInfo, ObjectType, PrefixEntry, PropertyEntry, PropertyFilter, RelationId, RelationInfo,
    RelationType, SessionDescriptor, SessionId, SessionInfo,
};
use crate::queries::Query;
use crate::results::{RowReader, deliver};
use crate::types::{DbType, SqlValue};

/// Callback receiving one row of an enumeration. Returning an error stops the
/// enumeration and the error is passed back to the caller unchanged.
pub type RowCallback<'a, T> = &'a mut dyn FnMut(T) -> Result<(), CplError>;

/// Operations every provenance backend provides.
///
/// Enumerations buffer their rows, release the statement and only then call
/// the callback, so a callback may call back into the backend. They return
/// [`Status::NoData`] when there was nothing to enumerate.
pub trait ProvenanceBackend: Send + Sync {
    /// # Errors
    /// [`CplError::InvalidArgument`] if a field is too long.
    fn create_session(&self, session: &SessionDescriptor) -> Result<SessionId, CplError>;

    /// # Errors
    /// [`CplError::NotFound`] if there is no such session.
    fn get_session_info(&self, id: SessionId) -> Result<SessionInfo, CplError>;

    /// # Errors
    /// [`CplError::InvalidArgument`] for an over-long prefix or name.
    fn create_object(
        &self,
        prefix: &str,
        name: &str,
        object_type: ObjectType,
        session: SessionId,
    ) -> Result<ObjectId, CplError>;

    /// The most recently created object with this name.
    ///
    /// # Errors
    /// [`CplError::NotFound`] if there is none.
    fn lookup_object(
        &self,
        prefix: &str,
        name: &str,
        object_type: Option<ObjectType>,
    ) -> Result<ObjectId, CplError>;

    /// Every object with this name, oldest first.
    ///
    /// # Errors
    /// [`CplError::NotFound`] if there is none, unless `flags` has
    /// [`LookupFlags::NO_FAIL`].
    fn lookup_object_ext(
        &self,
        prefix: &str,
        name: &str,
        object_type: Option<ObjectType>,
        flags: LookupFlags,
        callback: RowCallback<'_, LookupEntry>,
    ) -> Result<Status, CplError>;

    /// # Errors
    /// [`CplError::NotFound`] if there is no such object.
    fn get_object_info(&self, id: ObjectId) -> Result<ObjectInfo, CplError>;

    /// Every object, optionally only those with `prefix`. Bundles are not
    /// included.
    ///
    /// # Errors
    /// Statement errors, or the callback's error.
    fn get_all_objects(
        &self,
        prefix: Option<&str>,
        callback: RowCallback<'_, ObjectInfo>,
    ) -> Result<Status, CplError>;

    /// # Errors
    /// [`CplError::InvalidArgument`] for a zero id or over-long strings.
    fn add_object_property(
        &self,
        id: ObjectId,
        prefix: &str,
        key: &str,
        value: &str,
    ) -> Result<(), CplError>;

    /// # Errors
    /// Statement errors, or the callback's error.
    fn get_object_properties(
        &self,
        id: ObjectId,
        filter: PropertyFilter<'_>,
        callback: RowCallback<'_, PropertyEntry>,
    ) -> Result<Status, CplError>;

    /// Objects carrying exactly this property.
    ///
    /// # Errors
    /// As [`lookup_object_ext`](Self::lookup_object_ext).
    fn lookup_object_by_property(
        &self,
        prefix: &str,
        key: &str,
        value: &str,
        flags: LookupFlags,
        callback: RowCallback<'_, ObjectId>,
    ) -> Result<Status, CplError>;

    /// Objects with a property value matching a `LIKE` pattern.
    ///
    /// # Errors
    /// As [`lookup_object_ext`](Self::lookup_object_ext).
    fn lookup_object_property_wildcard(
        &self,
        value_pattern: &str,
        flags: LookupFlags,
        callback: RowCallback<'_, ObjectId>,
    ) -> Result<Status, CplError>;

    /// # Errors
    /// [`CplError::Statement`] if either endpoint does not exist.
    fn add_relation(
        &self,
        from: CplId,
        to: CplId,
        relation_type: RelationType,
    ) -> Result<RelationId, CplError>;

    /// # Errors
    /// [`CplError::NotFound`] if there is no such relation.
    fn lookup_relation(
        &self,
        from: ObjectId,
        to: ObjectId,
        relation_type: RelationType,
    ) -> Result<RelationId, CplError>;

    /// Whether some non-bundle relation leads from `object` to
    /// `query_object`.
    ///
    /// # Errors
    /// Statement errors only.
    fn has_immediate_ancestor(
        &self,
        object: ObjectId,
        query_object: ObjectId,
    ) -> Result<bool, CplError>;

    /// Relations leaving (`Ancestors`) or entering (`Descendants`) the object.
    ///
    /// # Errors
    /// Statement errors, or the callback's error.
    fn get_object_relations(
        &self,
        id: ObjectId,
        direction: Direction,
        callback: RowCallback<'_, RelationInfo>,
    ) -> Result<Status, CplError>;

    /// # Errors
    /// [`CplError::InvalidArgument`] for a zero id or over-long strings.
    fn add_relation_property(
        &self,
        id: RelationId,
        prefix: &str,
        key: &str,
        value: &str,
    ) -> Result<(), CplError>;

    /// # Errors
    /// Statement errors, or the callback's error.
    fn get_relation_properties(
        &self,
        id: RelationId,
        filter: PropertyFilter<'_>,
        callback: RowCallback<'_, PropertyEntry>,
    ) -> Result<Status, CplError>;

    /// # Errors
    /// [`CplError::InvalidArgument`] for an over-long name or prefix.
    fn create_bundle(
        &self,
        name: &str,
        prefix: &str,
        session: SessionId,
    ) -> Result<BundleId, CplError>;

    /// # Errors
    /// [`CplError::NotFound`] if there is no such bundle.
    fn lookup_bundle(&self, name: &str, prefix: &str) -> Result<BundleId, CplError>;

    /// # Errors
    /// As [`lookup_object_ext`](Self::lookup_object_ext).
    fn lookup_bundle_ext(
        &self,
        name: &str,
        prefix: &str,
        flags: LookupFlags,
        callback: RowCallback<'_, LookupEntry>,
    ) -> Result<Status, CplError>;

    /// Delete a bundle with its member objects and relations.
    ///
    /// # Errors
    /// [`CplError::NotFound`] if there is no such bundle.
    fn delete_bundle(&self, id: BundleId) -> Result<(), CplError>;

    /// # Errors
    /// [`CplError::NotFound`] if there is no such bundle.
    fn get_bundle_info(&self, id: BundleId) -> Result<BundleInfo, CplError>;

    /// # Errors
    /// Statement errors, or the callback's error.
    fn get_bundle_objects(
        &self,
        id: BundleId,
        callback: RowCallback<'_, ObjectInfo>,
    ) -> Result<Status, CplError>;

    /// # Errors
    /// Statement errors, or the callback's error.
    fn get_bundle_relations(
        &self,
        id: BundleId,
        callback: RowCallback<'_, RelationInfo>,
    ) -> Result<Status, CplError>;

    /// # Errors
    /// [`CplError::InvalidArgument`] for a zero id or over-long strings.
    fn add_bundle_property(
        &self,
        id: BundleId,
        prefix: &str,
        key: &str,
        value: &str,
    ) -> Result<(), CplError>;

    /// # Errors
    /// Statement errors, or the callback's error.
    fn get_bundle_properties(
        &self,
        id: BundleId,
        filter: PropertyFilter<'_>,
        callback: RowCallback<'_, PropertyEntry>,
    ) -> Result<Status, CplError>;

    /// # Errors
    /// [`CplError::InvalidArgument`] for a zero id or over-long strings.
    fn add_prefix(&self, bundle: BundleId, prefix: &str, iri: &str) -> Result<(), CplError>;

    /// # Errors
    /// Statement errors, or the callback's error.
    fn get_prefixes(
        &self,
        bundle: BundleId,
        prefix: Option<&str>,
        callback: RowCallback<'_, PrefixEntry>,
    ) -> Result<Status, CplError>;
}

/// Backend over a relational store reached through a [`Driver`].
///
/// Dropping it frees every prepared statement, then closes the connection.
pub struct RelationalBackend {
    pub(crate) manager: ConnectionManager,
    pub(crate) options: BackendOptions,
}

impl RelationalBackend {
    /// # Errors
    /// [`CplError::Connection`] or [`CplError::Prepare`] if the store cannot
    /// be reached or a statement cannot be prepared; nothing is left open.
    pub fn connect(
        driver: Arc<dyn Driver>,
        connection_string: &str,
        options: BackendOptions,
    ) -> Result<Self, CplError> {
        let manager = ConnectionManager::connect(driver, connection_string, options.pool_size)?;
        info!(
            driver = manager.driver_name(),
            db_type = ?options.db_type,
            pool_size = options.pool_size,
            "relational backend ready"
        );
        Ok(Self { manager, options })
    }

    #[must_use]
    pub fn options(&self) -> &BackendOptions {
        &self.options
    }

    #[must_use]
    pub fn db_type(&self) -> DbType {
        self.options.db_type
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.manager.pool_size()
    }

    /// Handles of `query` not currently checked out.
    ///
    /// # Errors
    /// [`CplError::Connection`] when disconnected.
    pub fn available_statements(&self, query: Query) -> Result<usize, CplError> {
        self.manager
            .with_live(|live| live.pool(query).map(|pool| pool.available()))?
    }

    /// Generation of the live connection; it grows by one per reconnect.
    ///
    /// # Errors
    /// [`CplError::Connection`] when disconnected.
    pub fn connection_generation(&self) -> Result<u64, CplError> {
        self.manager.with_live(LiveConnection::generation)
    }

    #[must_use]
    pub fn reconnect_count(&self) -> u64 {
        self.manager.reconnect_count()
    }

    /// Rebuild the connection and every statement pool.
    ///
    /// # Errors
    /// As [`connect`](Self::connect).
    #[cfg(any(test, feature = "test-utils"))]
    pub fn reconnect(&self) -> Result<(), CplError> {
        self.manager.reconnect()
    }
}

impl fmt::Debug for RelationalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationalBackend")
            .field("manager", &self.manager)
            .field("options", &self.options)
            .finish()
    }
}

/// Connect a relational backend with default options.
///
/// # Errors
/// As [`RelationalBackend::connect`].
pub fn create_backend(
    driver: Arc<dyn Driver>,
    connection_string: &str,
    db_type: DbType,
) -> Result<RelationalBackend, CplError> {
    RelationalBackend::connect(driver, connection_string, BackendOptions::new(db_type))
}

/// Connect through a named data source.
///
/// # Errors
/// [`CplError::InvalidArgument`] if `dsn` contains `;`, `{` or `}`, otherwise
/// as [`RelationalBackend::connect`].
pub fn create_backend_dsn(
    driver: Arc<dyn Driver>,
    dsn: &str,
    db_type: DbType,
) -> Result<RelationalBackend, CplError> {
    let connection_string = dsn_connection_string(dsn)?;
    create_backend(driver, &connection_string, db_type)
}

fn check_len(what: &str, value: &str, max: usize) -> Result<(), CplError> {
    if value.len() > max {
        return Err(CplError::InvalidArgument(format!(
            "{what} is {} bytes, longer than {max}",
            value.len()
        )));
    }
    Ok(())
}

fn id_param(what: &str, id: CplId) -> Result<SqlValue, CplError> {
    if id == CPL_NONE {
        return Err(CplError::InvalidArgument(format!("{what} id must not be zero")));
    }
    i64::try_from(id)
        .map(SqlValue::Int)
        .map_err(|_| CplError::InvalidArgument(format!("{what} id {id} out of range")))
}

/// Deliver `*_ext` lookup results, turning an empty set into `NotFound`
/// unless the caller asked not to fail.
fn deliver_lookup<T>(
    rows: Vec<T>,
    flags: LookupFlags,
    callback: RowCallback<'_, T>,
) -> Result<Status, CplError> {
    if rows.is_empty() && !flags.contains(LookupFlags::NO_FAIL) {
        return Err(CplError::NotFound);
    }
    deliver(rows, callback)
}

impl ProvenanceBackend for RelationalBackend {
    fn create_session(&self, session: &SessionDescriptor) -> Result<SessionId, CplError> {
        sessions::create_session(self, session)
    }

    fn get_session_info(&self, id: SessionId) -> Result<SessionInfo, CplError> {
        sessions::get_session_info(self, id)
    }

    fn create_object(
        &self,
        prefix: &str,
        name: &str,
        object_type: ObjectType,
        session: SessionId,
    ) -> Result<ObjectId, CplError> {
        objects::create_object(self, prefix, name, object_type, session)
    }

    fn lookup_object(
        &self,
        prefix: &str,
        name: &str,
        object_type: Option<ObjectType>,
    ) -> Result<ObjectId, CplError> {
        objects::lookup_object(self, prefix, name, object_type)
    }

    fn lookup_object_ext(
        &self,
        prefix: &str,
        name: &str,
        object_type: Option<ObjectType>,
        flags: LookupFlags,
        callback: RowCallback<'_, LookupEntry>,
    ) -> Result<Status, CplError> {
        objects::lookup_object_ext(self, prefix, name, object_type, flags, callback)
    }

    fn get_object_info(&self, id: ObjectId) -> Result<ObjectInfo, CplError> {
        objects::get_object_info(self, id)
    }

    fn get_all_objects(
        &self,
        prefix: Option<&str>,
        callback: RowCallback<'_, ObjectInfo>,
    ) -> Result<Status, CplError> {
        objects::get_all_objects(self, prefix, callback)
    }

    fn add_object_property(
        &self,
        id: ObjectId,
        prefix: &str,
        key: &str,
        value: &str,
    ) -> Result<(), CplError> {
        objects::add_object_property(self, id, prefix, key, value)
    }

    fn get_object_properties(
        &self,
        id: ObjectId,
        filter: PropertyFilter<'_>,
        callback: RowCallback<'_, PropertyEntry>,
    ) -> Result<Status, CplError> {
        objects::get_object_properties(self, id, filter, callback)
    }

    fn lookup_object_by_property(
        &self,
        prefix: &str,
        key: &str,
        value: &str,
        flags: LookupFlags,
        callback: RowCallback<'_, ObjectId>,
    ) -> Result<Status, CplError> {
        objects::lookup_object_by_property(self, prefix, key, value, flags, callback)
    }

    fn lookup_object_property_wildcard(
        &self,
        value_pattern: &str,
        flags: LookupFlags,
        callback: RowCallback<'_, ObjectId>,
    ) -> Result<Status, CplError> {
        objects::lookup_object_property_wildcard(self, value_pattern, flags, callback)
    }

    fn add_relation(
        &self,
        from: CplId,
        to: CplId,
        relation_type: RelationType,
    ) -> Result<RelationId, CplError> {
        relations::add_relation(self, from, to, relation_type)
    }

    fn lookup_relation(
        &self,
        from: ObjectId,
        to: ObjectId,
        relation_type: RelationType,
    ) -> Result<RelationId, CplError> {
        relations::lookup_relation(self, from, to, relation_type)
    }

    fn has_immediate_ancestor(
        &self,
        object: ObjectId,
        query_object: ObjectId,
    ) -> Result<bool, CplError> {
        relations::has_immediate_ancestor(self, object, query_object)
    }

    fn get_object_relations(
        &self,
        id: ObjectId,
        direction: Direction,
        callback: RowCallback<'_, RelationInfo>,
    ) -> Result<Status, CplError> {
        relations::get_object_relations(self, id, direction, callback)
    }

    fn add_relation_property(
        &self,
        id: RelationId,
        prefix: &str,
        key: &str,
        value: &str,
    ) -> Result<(), CplError> {
        relations::add_relation_property(self, id, prefix, key, value)
    }

    fn get_relation_properties(
        &self,
        id: RelationId,
        filter: PropertyFilter<'_>,
        callback: RowCallback<'_, PropertyEntry>,
    ) -> Result<Status, CplError> {
        relations::get_relation_properties(self, id, filter, callback)
    }

    fn create_bundle(
        &self,
        name: &str,
        prefix: &str,
        session: SessionId,
    ) -> Result<BundleId, CplError> {
        bundles::create_bundle(self, name, prefix, session)
    }

    fn lookup_bundle(&self, name: &str, prefix: &str) -> Result<BundleId, CplError> {
        bundles::lookup_bundle(self, name, prefix)
    }

    fn lookup_bundle_ext(
        &self,
        name: &str,
        prefix: &str,
        flags: LookupFlags,
        callback: RowCallback<'_, LookupEntry>,
    ) -> Result<Status, CplError> {
        bundles::lookup_bundle_ext(self, name, prefix, flags, callback)
    }

    fn delete_bundle(&self, id: BundleId) -> Result<(), CplError> {
        bundles::delete_bundle(self, id)
    }

    fn get_bundle_info(&self, id: BundleId) -> Result<BundleInfo, CplError> {
        bundles::get_bundle_info(self, id)
    }

    fn get_bundle_objects(
        &self,
        id: BundleId,
        callback: RowCallback<'_, ObjectInfo>,
    ) -> Result<Status, CplError> {
        bundles::get_bundle_objects(self, id, callback)
    }

    fn get_bundle_relations(
        &self,
        id: BundleId,
        callback: RowCallback<'_, RelationInfo>,
    ) -> Result<Status, CplError> {
        bundles::get_bundle_relations(self, id, callback)
    }

    fn add_bundle_property(
        &self,
        id: BundleId,
        prefix: &str,
        key: &str,
        value: &str,
    ) -> Result<(), CplError> {
        bundles::add_bundle_property(self, id, prefix, key, value)
    }

    fn get_bundle_properties(
        &self,
        id: BundleId,
        filter: PropertyFilter<'_>,
        callback: RowCallback<'_, PropertyEntry>,
    ) -> Result<Status, CplError> {
        bundles::get_bundle_properties(self, id, filter, callback)
    }

    fn add_prefix(&self, bundle: BundleId, prefix: &str, iri: &str) -> Result<(), CplError> {
        bundles::add_prefix(self, bundle, prefix, iri)
    }

    fn get_prefixes(
        &self,
        bundle: BundleId,
        prefix: Option<&str>,
        callback: RowCallback<'_, PrefixEntry>,
    ) -> Result<Status, CplError> {
        bundles::get_prefixes(self, bundle, prefix, callback)
    }
}

/// Shared helpers for the property tables, which all have the same shape.
mod properties {
    use super::{CplError, PropertyFilter, check_len};
    use crate::model::{CPL_KEY_LEN, CPL_PREFIX_LEN, CPL_VALUE_LEN, PropertyEntry};
    use crate::queries::Query;
    use crate::results::RowReader;
    use crate::types::SqlValue;

    pub(super) struct PropertyQueries {
        pub all: Query,
        pub with_prefix: Query,
        pub with_key: Query,
    }

    pub(super) fn check_property(prefix: &str, key: &str, value: &str) -> Result<(), CplError> {
        check_len("prefix", prefix, CPL_PREFIX_LEN)?;
        check_len("key", key, CPL_KEY_LEN)?;
        check_len("value", value, CPL_VALUE_LEN)
    }

    /// Pick the statement for `filter` and build its parameters after `id`.
    pub(super) fn select(
        queries: &PropertyQueries,
        id: SqlValue,
        filter: PropertyFilter<'_>,
    ) -> Result<(Query, Vec<SqlValue>), CplError> {
        Ok(match filter {
            PropertyFilter::All => (queries.all, vec![id]),
            PropertyFilter::Prefix(prefix) => {
                check_len("prefix", prefix, CPL_PREFIX_LEN)?;
                (queries.with_prefix, vec![id, prefix.into()])
            }
            PropertyFilter::Key { prefix, key } => {
                check_len("prefix", prefix, CPL_PREFIX_LEN)?;
                check_len("key", key, CPL_KEY_LEN)?;
                (queries.with_key, vec![id, prefix.into(), key.into()])
            }
        })
    }

    pub(super) fn read_entry(row: &mut RowReader<'_>) -> Result<PropertyEntry, CplError> {
        Ok(PropertyEntry {
            id: row.required(0)?,
            prefix: row.required(1)?,
            key: row.required(2)?,
            value: row.required(3)?,
        })
    }
}

/// Row shape shared by every object query.
fn read_object_info(row: &mut RowReader<'_>) -> Result<ObjectInfo, CplError> {
    use crate::queries::object_row;
    use crate::results::EpochSeconds;

    Ok(ObjectInfo {
        id: row.required(object_row::ID)?,
        creation_time: row.required::<EpochSeconds>(object_row::CREATION_TIME)?.0,
        prefix: row.required(object_row::PREFIX)?,
        name: row.optional(object_row::NAME)?.unwrap_or_default(),
        object_type: row.required(object_row::TYPE)?,
        creation_session: row.optional(object_row::SESSION)?.unwrap_or(CPL_NONE),
    })
}

fn read_lookup_entry(row: &mut RowReader<'_>) -> Result<LookupEntry, CplError> {
    use crate::results::EpochSeconds;

    Ok(LookupEntry {
        id: row.required(0)?,
        timestamp: row.required::<EpochSeconds>(1)?.0,
    })
}
