//! Every statement the backend prepares, one pool per variant.
//!
//! Bundles are rows of `cpl_objects` with type 4. Relation type 19 links a
//! bundle to a member object and type 20 links it to a member relation.

macro_rules! queries {
    ($($(#[$doc:meta])* $variant:ident => $sql:expr,)+) => {
        /// Identifies one prepared statement template.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Query {
            $($(#[$doc])* $variant,)+
        }

        impl Query {
            /// Every query, in declaration order.
            pub const ALL: &'static [Query] = &[$(Query::$variant,)+];

            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(Query::$variant => stringify!($variant),)+
                }
            }

            #[must_use]
            pub fn sql(self) -> &'static str {
                match self {
                    $(Query::$variant => $sql,)+
                }
            }
        }
    };
}

queries! {
    CreateSession =>
        "INSERT INTO cpl_sessions (mac_address, username, pid, program, cmdline) \
         VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
    GetSessionInfo =>
        "SELECT mac_address, username, pid, program, cmdline, initialization_time \
         FROM cpl_sessions WHERE id = ?1",

    CreateObject =>
        "INSERT INTO cpl_objects (prefix, name, type, session_id) \
         VALUES (?1, ?2, ?3, ?4) RETURNING id",
    /// Most recent non-bundle object with the name.
    LookupObject =>
        "SELECT id FROM cpl_objects WHERE prefix = ?1 AND name = ?2 AND type <> 4 \
         ORDER BY id DESC LIMIT 1",
    LookupObjectByType =>
        "SELECT id FROM cpl_objects WHERE prefix = ?1 AND name = ?2 AND type = ?3 \
         ORDER BY id DESC LIMIT 1",
    LookupObjectExt =>
        "SELECT id, creation_time FROM cpl_objects \
         WHERE prefix = ?1 AND name = ?2 AND type <> 4 ORDER BY id",
    LookupObjectExtByType =>
        "SELECT id, creation_time FROM cpl_objects \
         WHERE prefix = ?1 AND name = ?2 AND type = ?3 ORDER BY id",
    GetObjectInfo =>
        "SELECT id, creation_time, prefix, name, type, session_id \
         FROM cpl_objects WHERE id = ?1",
    GetAllObjects =>
        "SELECT id, creation_time, prefix, name, type, session_id \
         FROM cpl_objects WHERE type <> 4 ORDER BY id",
    GetAllObjectsWithPrefix =>
        "SELECT id, creation_time, prefix, name, type, session_id \
         FROM cpl_objects WHERE type <> 4 AND prefix = ?1 ORDER BY id",

    AddObjectProperty =>
        "INSERT INTO cpl_object_properties (id, prefix, name, value) VALUES (?1, ?2, ?3, ?4)",
    GetObjectProperties =>
        "SELECT id, prefix, name, value FROM cpl_object_properties \
         WHERE id = ?1 ORDER BY rowid",
    GetObjectPropertiesWithPrefix =>
        "SELECT id, prefix, name, value FROM cpl_object_properties \
         WHERE id = ?1 AND prefix = ?2 ORDER BY rowid",
    GetObjectPropertiesWithKey =>
        "SELECT id, prefix, name, value FROM cpl_object_properties \
         WHERE id = ?1 AND prefix = ?2 AND name = ?3 ORDER BY rowid",
    LookupObjectByProperty =>
        "SELECT DISTINCT id FROM cpl_object_properties \
         WHERE prefix = ?1 AND name = ?2 AND value = ?3 ORDER BY id",
    /// `%` and `_` in the pattern are passed through to `LIKE`.
    LookupObjectPropertyWildcard =>
        "SELECT DISTINCT id FROM cpl_object_properties WHERE value LIKE ?1 ORDER BY id",

    AddRelation =>
        "INSERT INTO cpl_relations (from_id, to_id, type) VALUES (?1, ?2, ?3) RETURNING id",
    LookupRelation =>
        "SELECT id FROM cpl_relations WHERE from_id = ?1 AND to_id = ?2 AND type = ?3 \
         ORDER BY id LIMIT 1",
    HasImmediateAncestor =>
        "SELECT id FROM cpl_relations WHERE from_id = ?1 AND to_id = ?2 AND type < 19 LIMIT 1",
    GetObjectAncestors =>
        "SELECT id, to_id, type FROM cpl_relations WHERE from_id = ?1 AND type < 19 ORDER BY id",
    GetObjectDescendants =>
        "SELECT id, from_id, type FROM cpl_relations WHERE to_id = ?1 AND type < 19 ORDER BY id",
    AddRelationProperty =>
        "INSERT INTO cpl_relation_properties (id, prefix, name, value) VALUES (?1, ?2, ?3, ?4)",
    GetRelationProperties =>
        "SELECT id, prefix, name, value FROM cpl_relation_properties \
         WHERE id = ?1 ORDER BY rowid",
    GetRelationPropertiesWithPrefix =>
        "SELECT id, prefix, name, value FROM cpl_relation_properties \
         WHERE id = ?1 AND prefix = ?2 ORDER BY rowid",
    GetRelationPropertiesWithKey =>
        "SELECT id, prefix, name, value FROM cpl_relation_properties \
         WHERE id = ?1 AND prefix = ?2 AND name = ?3 ORDER BY rowid",

    CreateBundle =>
        "INSERT INTO cpl_objects (prefix, name, type, session_id) \
         VALUES (?1, ?2, 4, ?3) RETURNING id",
    LookupBundle =>
        "SELECT id FROM cpl_objects WHERE prefix = ?1 AND name = ?2 AND type = 4 \
         ORDER BY id DESC LIMIT 1",
    LookupBundleExt =>
        "SELECT id, creation_time FROM cpl_objects \
         WHERE prefix = ?1 AND name = ?2 AND type = 4 ORDER BY id",
    GetBundleInfo =>
        "SELECT id, creation_time, prefix, name, session_id \
         FROM cpl_objects WHERE id = ?1 AND type = 4",
    /// The triggers remove members, memberships and properties.
    DeleteBundle =>
        "DELETE FROM cpl_objects WHERE id = ?1 AND type = 4 RETURNING id",
    /// Direct members plus both endpoints of every member relation.
    GetBundleObjects =>
        "SELECT id, creation_time, prefix, name, type, session_id FROM cpl_objects \
         WHERE id IN ( \
             SELECT to_id FROM cpl_relations WHERE from_id = ?1 AND type = 19 \
             UNION SELECT r.from_id FROM cpl_relations b JOIN cpl_relations r ON r.id = b.to_id \
                 WHERE b.from_id = ?1 AND b.type = 20 \
             UNION SELECT r.to_id FROM cpl_relations b JOIN cpl_relations r ON r.id = b.to_id \
                 WHERE b.from_id = ?1 AND b.type = 20) \
         ORDER BY id",
    GetBundleRelations =>
        "SELECT r.id, r.from_id, r.to_id, r.type FROM cpl_relations b \
         JOIN cpl_relations r ON r.id = b.to_id \
         WHERE b.from_id = ?1 AND b.type = 20 ORDER BY r.id",
    AddBundleProperty =>
        "INSERT INTO cpl_bundle_properties (id, prefix, name, value) VALUES (?1, ?2, ?3, ?4)",
    GetBundleProperties =>
        "SELECT id, prefix, name, value FROM cpl_bundle_properties \
         WHERE id = ?1 ORDER BY rowid",
    GetBundlePropertiesWithPrefix =>
        "SELECT id, prefix, name, value FROM cpl_bundle_properties \
         WHERE id = ?1 AND prefix = ?2 ORDER BY rowid",
    GetBundlePropertiesWithKey =>
        "SELECT id, prefix, name, value FROM cpl_bundle_properties \
         WHERE id = ?1 AND prefix = ?2 AND name = ?3 ORDER BY rowid",
    AddPrefix =>
        "INSERT INTO cpl_prefixes (id, prefix, iri) VALUES (?1, ?2, ?3)",
    GetPrefixes =>
        "SELECT id, prefix, iri FROM cpl_prefixes WHERE id = ?1 ORDER BY rowid",
    GetPrefixesWithPrefix =>
        "SELECT id, prefix, iri FROM cpl_prefixes WHERE id = ?1 AND prefix = ?2 ORDER BY rowid",
}

/// Column layout shared by every object-row query.
pub(crate) mod object_row {
    pub const ID: usize = 0;
    pub const CREATION_TIME: usize = 1;
    pub const PREFIX: usize = 2;
    pub const NAME: usize = 3;
    pub const TYPE: usize = 4;
    pub const SESSION: usize = 5;
}
