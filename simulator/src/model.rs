use std::collections::{BTreeMap, BTreeSet};

use prov_cpl::{BundleId, ObjectId, ObjectType, RelationId, RelationType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    CreateObject,
    LookupObject,
    AddRelation,
    AddProperty,
    ListAncestors,
    CreateBundle,
    AddToBundle,
    ListBundle,
    DeleteBundle,
    Reconnect,
}

#[derive(Debug, Clone)]
pub(crate) struct ObjectRecord {
    pub(crate) name: String,
    pub(crate) object_type: ObjectType,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RelationRecord {
    pub(crate) from: ObjectId,
    pub(crate) to: ObjectId,
    pub(crate) relation_type: RelationType,
}

/// What one worker expects the store to hold for the rows it wrote.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    pub(crate) prefix: String,
    pub(crate) objects: BTreeMap<ObjectId, ObjectRecord>,
    pub(crate) relations: BTreeMap<RelationId, RelationRecord>,
    pub(crate) bundles: BTreeMap<BundleId, BTreeSet<ObjectId>>,
    pub(crate) deleted_objects: BTreeSet<ObjectId>,
    pub(crate) deleted_bundles: BTreeSet<BundleId>,
}

impl Ledger {
    pub(crate) fn new(worker: usize) -> Self {
        Self {
            prefix: format!("sim{worker}"),
            ..Self::default()
        }
    }

    /// Forget a deleted bundle together with everything it took along.
    pub(crate) fn delete_bundle(&mut self, bundle: BundleId) {
        let Some(members) = self.bundles.remove(&bundle) else {
            return;
        };
        self.deleted_bundles.insert(bundle);
        for member in &members {
            if self.objects.remove(member).is_some() {
                self.deleted_objects.insert(*member);
            }
        }
        self.relations
            .retain(|_, r| !members.contains(&r.from) && !members.contains(&r.to));
        for other in self.bundles.values_mut() {
            other.retain(|member| !members.contains(member));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleting_a_bundle_drops_members_and_their_relations() {
        let mut ledger = Ledger::new(0);
        for id in 1..=3 {
            ledger.objects.insert(
                id,
                ObjectRecord {
                    name: id.to_string(),
                    object_type: ObjectType::Entity,
                },
            );
        }
        ledger.relations.insert(
            10,
            RelationRecord {
                from: 1,
                to: 3,
                relation_type: RelationType::Used,
            },
        );
        ledger.bundles.insert(20, BTreeSet::from([1, 2]));
        ledger.bundles.insert(21, BTreeSet::from([2, 3]));

        ledger.delete_bundle(20);

        assert_eq!(ledger.objects.keys().copied().collect::<Vec<_>>(), [3]);
        assert!(ledger.relations.is_empty());
        assert_eq!(ledger.bundles[&21], BTreeSet::from([3]));
        assert!(ledger.deleted_bundles.contains(&20));
        assert_eq!(ledger.deleted_objects, BTreeSet::from([1, 2]));
    }
}
