use crate::error::{CplError, Status};
use crate::model::{
    CplId, Direction, ObjectId, PropertyEntry, PropertyFilter, RelationId, RelationInfo,
    RelationType,
};
use crate::queries::Query;
use crate::results::{FetchOptions, Fetched};
use crate::types::SqlValue;

use super::properties::{self, PropertyQueries};
use super::{RelationalBackend, RowCallback, id_param};

const RELATION_PROPERTIES: PropertyQueries = PropertyQueries {
    all: Query::GetRelationProperties,
    with_prefix: Query::GetRelationPropertiesWithPrefix,
    with_key: Query::GetRelationPropertiesWithKey,
};

pub(super) fn add_relation(
    backend: &RelationalBackend,
    from: CplId,
    to: CplId,
    relation_type: RelationType,
) -> Result<RelationId, CplError> {
    let params = [
        id_param("source", from)?,
        id_param("destination", to)?,
        SqlValue::Int(relation_type.code()),
    ];
    backend
        .query_single(Query::AddRelation, &params, 0, FetchOptions::default())?
        .into_result()
}

pub(super) fn lookup_relation(
    backend: &RelationalBackend,
    from: ObjectId,
    to: ObjectId,
    relation_type: RelationType,
) -> Result<RelationId, CplError> {
    let params = [
        id_param("source", from)?,
        id_param("destination", to)?,
        SqlValue::Int(relation_type.code()),
    ];
    backend
        .query_single(Query::LookupRelation, &params, 0, FetchOptions::default())?
        .into_result()
}

pub(super) fn has_immediate_ancestor(
    backend: &RelationalBackend,
    object: ObjectId,
    query_object: ObjectId,
) -> Result<bool, CplError> {
    let params = [id_param("object", object)?, id_param("query object", query_object)?];
    let found: Fetched<u64> =
        backend.query_single(Query::HasImmediateAncestor, &params, 0, FetchOptions::default())?;
    Ok(matches!(found, Fetched::Value(_)))
}

pub(super) fn get_object_relations(
    backend: &RelationalBackend,
    id: ObjectId,
    direction: Direction,
    callback: RowCallback<'_, RelationInfo>,
) -> Result<Status, CplError> {
    let query = match direction {
        Direction::Ancestors => Query::GetObjectAncestors,
        Direction::Descendants => Query::GetObjectDescendants,
    };
    let params = [id_param("object", id)?];
    backend.query_each(
        query,
        &params,
        |row| {
            Ok(RelationInfo {
                id: row.required(0)?,
                query_object_id: id,
                other_object_id: row.required(1)?,
                relation_type: row.required(2)?,
            })
        },
        callback,
    )
}

pub(super) fn add_relation_property(
    backend: &RelationalBackend,
    id: RelationId,
    prefix: &str,
    key: &str,
    value: &str,
) -> Result<(), CplError> {
    properties::check_property(prefix, key, value)?;
    let params: [SqlValue; 4] = [id_param("relation", id)?, prefix.into(), key.into(), value.into()];
    backend.execute(Query::AddRelationProperty, &params)
}

pub(super) fn get_relation_properties(
    backend: &RelationalBackend,
    id: RelationId,
    filter: PropertyFilter<'_>,
    callback: RowCallback<'_, PropertyEntry>,
) -> Result<Status, CplError> {
    let (query, params) =
        properties::select(&RELATION_PROPERTIES, id_param("relation", id)?, filter)?;
    backend.query_each(query, &params, properties::read_entry, callback)
}
