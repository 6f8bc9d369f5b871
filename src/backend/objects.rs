use crate::error::{CplError, Status};
use crate::model::{
    CPL_NAME_LEN, CPL_PREFIX_LEN, CPL_VALUE_LEN, LookupEntry, LookupFlags, ObjectId, ObjectInfo,
    ObjectType, PropertyEntry, PropertyFilter, SessionId,
};
use crate::queries::Query;
use crate::results::FetchOptions;
use crate::types::SqlValue;

use super::properties::{self, PropertyQueries};
use super::{
    RelationalBackend, RowCallback, check_len, deliver_lookup, id_param, read_lookup_entry,
    read_object_info,
};

const OBJECT_PROPERTIES: PropertyQueries = PropertyQueries {
    all: Query::GetObjectProperties,
    with_prefix: Query::GetObjectPropertiesWithPrefix,
    with_key: Query::GetObjectPropertiesWithKey,
};

fn check_name(prefix: &str, name: &str) -> Result<(), CplError> {
    check_len("prefix", prefix, CPL_PREFIX_LEN)?;
    check_len("name", name, CPL_NAME_LEN)
}

pub(super) fn create_object(
    backend: &RelationalBackend,
    prefix: &str,
    name: &str,
    object_type: ObjectType,
    session: SessionId,
) -> Result<ObjectId, CplError> {
    check_name(prefix, name)?;
    let params: [SqlValue; 4] = [
        prefix.into(),
        name.into(),
        SqlValue::Int(object_type.code()),
        id_param("session", session)?,
    ];
    backend
        .query_single(Query::CreateObject, &params, 0, FetchOptions::default())?
        .into_result()
}

/// Statement and parameters for a name lookup, by whether a type was given.
fn name_lookup(
    prefix: &str,
    name: &str,
    object_type: Option<ObjectType>,
    untyped: Query,
    typed: Query,
) -> (Query, Vec<SqlValue>) {
    match object_type {
        Some(object_type) => (
            typed,
            vec![prefix.into(), name.into(), SqlValue::Int(object_type.code())],
        ),
        None => (untyped, vec![prefix.into(), name.into()]),
    }
}

pub(super) fn lookup_object(
    backend: &RelationalBackend,
    prefix: &str,
    name: &str,
    object_type: Option<ObjectType>,
) -> Result<ObjectId, CplError> {
    check_name(prefix, name)?;
    let (query, params) = name_lookup(
        prefix,
        name,
        object_type,
        Query::LookupObject,
        Query::LookupObjectByType,
    );
    backend
        .query_single(query, &params, 0, FetchOptions::default())?
        .into_result()
}

pub(super) fn lookup_object_ext(
    backend: &RelationalBackend,
    prefix: &str,
    name: &str,
    object_type: Option<ObjectType>,
    flags: LookupFlags,
    callback: RowCallback<'_, LookupEntry>,
) -> Result<Status, CplError> {
    check_name(prefix, name)?;
    let (query, params) = name_lookup(
        prefix,
        name,
        object_type,
        Query::LookupObjectExt,
        Query::LookupObjectExtByType,
    );
    let rows = backend.query_rows(query, &params, read_lookup_entry)?;
    deliver_lookup(rows, flags, callback)
}

pub(super) fn get_object_info(
    backend: &RelationalBackend,
    id: ObjectId,
) -> Result<ObjectInfo, CplError> {
    let params = [id_param("object", id)?];
    let rows = backend.query_rows(Query::GetObjectInfo, &params, read_object_info)?;
    rows.into_iter().next().ok_or(CplError::NotFound)
}

pub(super) fn get_all_objects(
    backend: &RelationalBackend,
    prefix: Option<&str>,
    callback: RowCallback<'_, ObjectInfo>,
) -> Result<Status, CplError> {
    let (query, params): (Query, Vec<SqlValue>) = match prefix {
        Some(prefix) => {
            check_len("prefix", prefix, CPL_PREFIX_LEN)?;
            (Query::GetAllObjectsWithPrefix, vec![prefix.into()])
        }
        None => (Query::GetAllObjects, Vec::new()),
    };
    backend.query_each(query, &params, read_object_info, callback)
}

pub(super) fn add_object_property(
    backend: &RelationalBackend,
    id: ObjectId,
    prefix: &str,
    key: &str,
    value: &str,
) -> Result<(), CplError> {
    properties::check_property(prefix, key, value)?;
    let params: [SqlValue; 4] = [id_param("object", id)?, prefix.into(), key.into(), value.into()];
    backend.execute(Query::AddObjectProperty, &params)
}

pub(super) fn get_object_properties(
    backend: &RelationalBackend,
    id: ObjectId,
    filter: PropertyFilter<'_>,
    callback: RowCallback<'_, PropertyEntry>,
) -> Result<Status, CplError> {
    let (query, params) = properties::select(&OBJECT_PROPERTIES, id_param("object", id)?, filter)?;
    backend.query_each(query, &params, properties::read_entry, callback)
}

pub(super) fn lookup_object_by_property(
    backend: &RelationalBackend,
    prefix: &str,
    key: &str,
    value: &str,
    flags: LookupFlags,
    callback: RowCallback<'_, ObjectId>,
) -> Result<Status, CplError> {
    properties::check_property(prefix, key, value)?;
    let params: [SqlValue; 3] = [prefix.into(), key.into(), value.into()];
    let rows = backend.query_rows(Query::LookupObjectByProperty, &params, |row| {
        row.required::<ObjectId>(0)
    })?;
    deliver_lookup(rows, flags, callback)
}

pub(super) fn lookup_object_property_wildcard(
    backend: &RelationalBackend,
    value_pattern: &str,
    flags: LookupFlags,
    callback: RowCallback<'_, ObjectId>,
) -> Result<Status, CplError> {
    check_len("value pattern", value_pattern, CPL_VALUE_LEN)?;
    let params = [SqlValue::from(value_pattern)];
    let rows = backend.query_rows(Query::LookupObjectPropertyWildcard, &params, |row| {
        row.required::<ObjectId>(0)
    })?;
    deliver_lookup(rows, flags, callback)
}
