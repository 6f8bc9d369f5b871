//! Provenance entities as they cross the backend interface.

use serde::{Deserialize, Serialize};

use crate::error::CplError;

/// Identifier of an object, relation, bundle or session.
pub type CplId = u64;
pub type ObjectId = CplId;
pub type RelationId = CplId;
pub type BundleId = CplId;
pub type SessionId = CplId;

/// "No object". Never assigned by the store.
pub const CPL_NONE: CplId = 0;

/// Maximum lengths accepted for the short string columns.
pub const CPL_MAC_ADDR_LEN: usize = 18;
pub const CPL_USER_LEN: usize = 255;
pub const CPL_PROGRAM_LEN: usize = 4095;
pub const CPL_CMDLINE_LEN: usize = 4095;
pub const CPL_PREFIX_LEN: usize = 255;
pub const CPL_NAME_LEN: usize = 255;
pub const CPL_KEY_LEN: usize = 255;
pub const CPL_VALUE_LEN: usize = 4095;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    Entity,
    Activity,
    Agent,
    Bundle,
}

impl ObjectType {
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            ObjectType::Entity => 1,
            ObjectType::Activity => 2,
            ObjectType::Agent => 3,
            ObjectType::Bundle => 4,
        }
    }

    /// # Errors
    /// Returns [`CplError::InvalidType`] for codes outside `1..=4`.
    pub fn from_code(code: i64) -> Result<Self, CplError> {
        match code {
            1 => Ok(ObjectType::Entity),
            2 => Ok(ObjectType::Activity),
            3 => Ok(ObjectType::Agent),
            4 => Ok(ObjectType::Bundle),
            other => Err(CplError::InvalidType(format!("object type {other}"))),
        }
    }
}

/// The 18 PROV relation kinds followed by the two bookkeeping kinds used for
/// bundle membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    AlternateOf,
    DerivedByInsertionFrom,
    DerivedByRemovalFrom,
    HadMember,
    HadDictionaryMember,
    SpecializationOf,
    WasDerivedFrom,
    WasGeneratedBy,
    WasInvalidatedBy,
    WasAttributedTo,
    Used,
    WasInformedBy,
    WasStartedBy,
    WasEndedBy,
    HadPlan,
    WasAssociatedWith,
    ActedOnBehalfOf,
    WasInfluencedBy,
    /// Bundle → member object.
    InBundle,
    /// Bundle → member relation.
    BundleRelation,
}

impl RelationType {
    pub const ALL: [RelationType; 20] = [
        RelationType::AlternateOf,
        RelationType::DerivedByInsertionFrom,
        RelationType::DerivedByRemovalFrom,
        RelationType::HadMember,
        RelationType::HadDictionaryMember,
        RelationType::SpecializationOf,
        RelationType::WasDerivedFrom,
        RelationType::WasGeneratedBy,
        RelationType::WasInvalidatedBy,
        RelationType::WasAttributedTo,
        RelationType::Used,
        RelationType::WasInformedBy,
        RelationType::WasStartedBy,
        RelationType::WasEndedBy,
        RelationType::HadPlan,
        RelationType::WasAssociatedWith,
        RelationType::ActedOnBehalfOf,
        RelationType::WasInfluencedBy,
        RelationType::InBundle,
        RelationType::BundleRelation,
    ];

    #[must_use]
    pub fn code(self) -> i64 {
        // ALL is in code order starting at 1
        Self::ALL
            .iter()
            .position(|candidate| *candidate == self)
            .map_or(0, |index| index as i64 + 1)
    }

    /// # Errors
    /// Returns [`CplError::InvalidType`] for codes outside `1..=20`.
    pub fn from_code(code: i64) -> Result<Self, CplError> {
        usize::try_from(code)
            .ok()
            .and_then(|code| code.checked_sub(1))
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or_else(|| CplError::InvalidType(format!("relation type {code}")))
    }

    /// Whether this is one of the two bundle-membership kinds.
    #[must_use]
    pub fn is_bookkeeping(self) -> bool {
        matches!(self, RelationType::InBundle | RelationType::BundleRelation)
    }

    /// The PROV-N name, e.g. `wasGeneratedBy`.
    #[must_use]
    pub fn prov_name(self) -> &'static str {
        match self {
            RelationType::AlternateOf => "alternateOf",
            RelationType::DerivedByInsertionFrom => "derivedByInsertionFrom",
            RelationType::DerivedByRemovalFrom => "derivedByRemovalFrom",
            RelationType::HadMember => "hadMember",
            RelationType::HadDictionaryMember => "hadDictionaryMember",
            RelationType::SpecializationOf => "specializationOf",
            RelationType::WasDerivedFrom => "wasDerivedFrom",
            RelationType::WasGeneratedBy => "wasGeneratedBy",
            RelationType::WasInvalidatedBy => "wasInvalidatedBy",
            RelationType::WasAttributedTo => "wasAttributedTo",
            RelationType::Used => "used",
            RelationType::WasInformedBy => "wasInformedBy",
            RelationType::WasStartedBy => "wasStartedBy",
            RelationType::WasEndedBy => "wasEndedBy",
            RelationType::HadPlan => "hadPlan",
            RelationType::WasAssociatedWith => "wasAssociatedWith",
            RelationType::ActedOnBehalfOf => "actedOnBehalfOf",
            RelationType::WasInfluencedBy => "wasInfluencedBy",
            RelationType::InBundle => "inBundle",
            RelationType::BundleRelation => "bundleRelation",
        }
    }
}

/// Direction of an ancestry query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Relations whose source is the queried object.
    Ancestors,
    /// Relations whose destination is the queried object.
    Descendants,
}

/// Flags accepted by the `*_ext` lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LookupFlags(u32);

impl LookupFlags {
    pub const NONE: LookupFlags = LookupFlags(0);
    /// Report an empty result as [`Status::NoData`](crate::Status::NoData)
    /// instead of failing with `NotFound`.
    pub const NO_FAIL: LookupFlags = LookupFlags(1);

    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn contains(self, other: LookupFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for LookupFlags {
    type Output = LookupFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        LookupFlags(self.0 | rhs.0)
    }
}

/// Which properties of an owner to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyFilter<'a> {
    All,
    Prefix(&'a str),
    Key { prefix: &'a str, key: &'a str },
}

/// What a process records about itself when it attaches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub mac_address: String,
    pub user: String,
    pub pid: i64,
    pub program: String,
    pub cmdline: String,
}

impl SessionDescriptor {
    #[must_use]
    pub fn new(user: impl Into<String>, pid: i64, program: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pid,
            program: program.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_mac_address(mut self, mac_address: impl Into<String>) -> Self {
        self.mac_address = mac_address.into();
        self
    }

    #[must_use]
    pub fn with_cmdline(mut self, cmdline: impl Into<String>) -> Self {
        self.cmdline = cmdline.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub mac_address: String,
    pub user: String,
    pub pid: i64,
    pub program: String,
    pub cmdline: String,
    /// Epoch seconds.
    pub start_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub creation_session: SessionId,
    /// Epoch seconds.
    pub creation_time: i64,
    pub prefix: String,
    pub name: String,
    pub object_type: ObjectType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleInfo {
    pub id: BundleId,
    pub creation_session: SessionId,
    /// Epoch seconds.
    pub creation_time: i64,
    pub prefix: String,
    /// Empty when the store holds NULL.
    pub name: String,
}

/// One edge reported by an ancestry or bundle-relation query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationInfo {
    pub id: RelationId,
    pub query_object_id: ObjectId,
    pub other_object_id: ObjectId,
    pub relation_type: RelationType,
}

/// One match from a `*_ext` lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupEntry {
    pub id: CplId,
    /// Epoch seconds.
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyEntry {
    pub id: CplId,
    pub prefix: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixEntry {
    pub id: BundleId,
    pub prefix: String,
    pub iri: String,
}
