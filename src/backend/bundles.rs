use crate::error::{CplError, Status};
use crate::model::{
    BundleId, BundleInfo, CPL_NAME_LEN, CPL_PREFIX_LEN, CPL_VALUE_LEN, LookupEntry, LookupFlags,
    ObjectInfo, PrefixEntry, PropertyEntry, PropertyFilter, RelationInfo, SessionId,
};
use crate::queries::Query;
use crate::results::{EpochSeconds, FetchOptions, Fetched};
use crate::types::SqlValue;

use super::properties::{self, PropertyQueries};
use super::{
    RelationalBackend, RowCallback, check_len, deliver_lookup, id_param, read_lookup_entry,
    read_object_info,
};

const BUNDLE_PROPERTIES: PropertyQueries = PropertyQueries {
    all: Query::GetBundleProperties,
    with_prefix: Query::GetBundlePropertiesWithPrefix,
    with_key: Query::GetBundlePropertiesWithKey,
};

fn name_params(name: &str, prefix: &str) -> Result<[SqlValue; 2], CplError> {
    check_len("prefix", prefix, CPL_PREFIX_LEN)?;
    check_len("name", name, CPL_NAME_LEN)?;
    Ok([prefix.into(), name.into()])
}

pub(super) fn create_bundle(
    backend: &RelationalBackend,
    name: &str,
    prefix: &str,
    session: SessionId,
) -> Result<BundleId, CplError> {
    let [prefix, name] = name_params(name, prefix)?;
    let params = [prefix, name, id_param("session", session)?];
    backend
        .query_single(Query::CreateBundle, &params, 0, FetchOptions::default())?
        .into_result()
}

pub(super) fn lookup_bundle(
    backend: &RelationalBackend,
    name: &str,
    prefix: &str,
) -> Result<BundleId, CplError> {
    let params = name_params(name, prefix)?;
    backend
        .query_single(Query::LookupBundle, &params, 0, FetchOptions::default())?
        .into_result()
}

pub(super) fn lookup_bundle_ext(
    backend: &RelationalBackend,
    name: &str,
    prefix: &str,
    flags: LookupFlags,
    callback: RowCallback<'_, LookupEntry>,
) -> Result<Status, CplError> {
    let params = name_params(name, prefix)?;
    let rows = backend.query_rows(Query::LookupBundleExt, &params, read_lookup_entry)?;
    deliver_lookup(rows, flags, callback)
}

pub(super) fn delete_bundle(backend: &RelationalBackend, id: BundleId) -> Result<(), CplError> {
    let params = [id_param("bundle", id)?];
    let deleted: BundleId = backend
        .query_single(Query::DeleteBundle, &params, 0, FetchOptions::default())?
        .into_result()?;
    tracing::debug!(bundle = deleted, "deleted bundle");
    Ok(())
}

pub(super) fn get_bundle_info(
    backend: &RelationalBackend,
    id: BundleId,
) -> Result<BundleInfo, CplError> {
    let params = [id_param("bundle", id)?];
    backend.run_statement(Query::GetBundleInfo, &params, |row| {
        let same_row = FetchOptions::default().current_row().keep_cursor();
        let id = row
            .fetch_single::<BundleId>(0, FetchOptions::default().keep_cursor())?
            .into_result()?;
        let creation_time = row.fetch_single::<EpochSeconds>(1, same_row)?.into_result()?.0;
        let prefix = row.fetch_single::<String>(2, same_row)?.into_result()?;
        let name = match row.fetch_single::<String>(3, same_row.null_as_distinct())? {
            Fetched::Value(name) => name,
            Fetched::Null => String::new(),
            Fetched::NotFound => return Err(CplError::NotFound),
        };
        let creation_session = row
            .fetch_single::<SessionId>(4, FetchOptions::default().current_row())?
            .into_option()
            .unwrap_or_default();
        Ok(BundleInfo {
            id,
            creation_time,
            prefix,
            name,
            creation_session,
        })
    })
}

pub(super) fn get_bundle_objects(
    backend: &RelationalBackend,
    id: BundleId,
    callback: RowCallback<'_, ObjectInfo>,
) -> Result<Status, CplError> {
    let params = [id_param("bundle", id)?];
    backend.query_each(Query::GetBundleObjects, &params, read_object_info, callback)
}

pub(super) fn get_bundle_relations(
    backend: &RelationalBackend,
    id: BundleId,
    callback: RowCallback<'_, RelationInfo>,
) -> Result<Status, CplError> {
    let params = [id_param("bundle", id)?];
    backend.query_each(
        Query::GetBundleRelations,
        &params,
        |row| {
            Ok(RelationInfo {
                id: row.required(0)?,
                query_object_id: row.required(1)?,
                other_object_id: row.required(2)?,
                relation_type: row.required(3)?,
            })
        },
        callback,
    )
}

pub(super) fn add_bundle_property(
    backend: &RelationalBackend,
    id: BundleId,
    prefix: &str,
    key: &str,
    value: &str,
) -> Result<(), CplError> {
    properties::check_property(prefix, key, value)?;
    let params: [SqlValue; 4] = [id_param("bundle", id)?, prefix.into(), key.into(), value.into()];
    backend.execute(Query::AddBundleProperty, &params)
}

pub(super) fn get_bundle_properties(
    backend: &RelationalBackend,
    id: BundleId,
    filter: PropertyFilter<'_>,
    callback: RowCallback<'_, PropertyEntry>,
) -> Result<Status, CplError> {
    let (query, params) = properties::select(&BUNDLE_PROPERTIES, id_param("bundle", id)?, filter)?;
    backend.query_each(query, &params, properties::read_entry, callback)
}

pub(super) fn add_prefix(
    backend: &RelationalBackend,
    bundle: BundleId,
    prefix: &str,
    iri: &str,
) -> Result<(), CplError> {
    check_len("prefix", prefix, CPL_PREFIX_LEN)?;
    check_len("IRI", iri, CPL_VALUE_LEN)?;
    let params: [SqlValue; 3] = [id_param("bundle", bundle)?, prefix.into(), iri.into()];
    backend.execute(Query::AddPrefix, &params)
}

pub(super) fn get_prefixes(
    backend: &RelationalBackend,
    bundle: BundleId,
    prefix: Option<&str>,
    callback: RowCallback<'_, PrefixEntry>,
) -> Result<Status, CplError> {
    let id = id_param("bundle", bundle)?;
    let (query, params) = match prefix {
        Some(prefix) => {
            check_len("prefix", prefix, CPL_PREFIX_LEN)?;
            (Query::GetPrefixesWithPrefix, vec![id, SqlValue::from(prefix)])
        }
        None => (Query::GetPrefixes, vec![id]),
    };
    backend.query_each(
        query,
        &params,
        |row| {
            Ok(PrefixEntry {
                id: row.required(0)?,
                prefix: row.required(1)?,
                iri: row.required(2)?,
            })
        },
        callback,
    )
}
