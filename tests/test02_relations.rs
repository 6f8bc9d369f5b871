#![cfg(feature = "sqlite")]

mod common;

use common::{Store, TestResult, collect, session};
use prov_cpl::{
    CplError, Direction, ObjectType, PropertyFilter, ProvenanceBackend, RelationType, Status,
};

#[test]
fn relations_link_objects_in_both_directions() -> TestResult {
    let store = Store::new()?;
    let backend = store.backend(2)?;
    let session = session(&backend)?;

    let input = backend.create_object("ns", "input", ObjectType::Entity, session)?;
    let run = backend.create_object("ns", "run", ObjectType::Activity, session)?;
    let output = backend.create_object("ns", "output", ObjectType::Entity, session)?;

    let used = backend.add_relation(run, input, RelationType::Used)?;
    let generated = backend.add_relation(output, run, RelationType::WasGeneratedBy)?;

    assert_eq!(backend.lookup_relation(run, input, RelationType::Used)?, used);
    assert_eq!(
        backend.lookup_relation(run, input, RelationType::WasInformedBy),
        Err(CplError::NotFound)
    );

    assert!(backend.has_immediate_ancestor(run, input)?);
    assert!(backend.has_immediate_ancestor(output, run)?);
    assert!(!backend.has_immediate_ancestor(input, run)?);
    assert!(!backend.has_immediate_ancestor(output, input)?);

    let (_, ancestors) = collect(|cb| backend.get_object_relations(run, Direction::Ancestors, cb))?;
    assert_eq!(ancestors.len(), 1);
    assert_eq!(ancestors[0].id, used);
    assert_eq!(ancestors[0].query_object_id, run);
    assert_eq!(ancestors[0].other_object_id, input);
    assert_eq!(ancestors[0].relation_type, RelationType::Used);

    let (_, descendants) =
        collect(|cb| backend.get_object_relations(run, Direction::Descendants, cb))?;
    assert_eq!(descendants.len(), 1);
    assert_eq!(descendants[0].id, generated);
    assert_eq!(descendants[0].other_object_id, output);

    let (status, _) = collect(|cb| backend.get_object_relations(input, Direction::Ancestors, cb))?;
    assert_eq!(status, Status::NoData);
    Ok(())
}

#[test]
fn relation_to_a_missing_object_fails() -> TestResult {
    let store = Store::new()?;
    let backend = store.backend(1)?;
    let session = session(&backend)?;
    let only = backend.create_object("ns", "only", ObjectType::Entity, session)?;

    assert!(matches!(
        backend.add_relation(only, only + 50, RelationType::WasDerivedFrom),
        Err(CplError::Statement(_))
    ));
    assert!(matches!(
        backend.add_relation(only + 50, only, RelationType::WasDerivedFrom),
        Err(CplError::Statement(_))
    ));
    assert!(matches!(
        backend.add_relation(0, only, RelationType::WasDerivedFrom),
        Err(CplError::InvalidArgument(_))
    ));

    // the statement went back to its pool
    let again = backend.create_object("ns", "other", ObjectType::Entity, session)?;
    backend.add_relation(again, only, RelationType::WasDerivedFrom)?;
    Ok(())
}

#[test]
fn bundle_membership_is_not_ancestry() -> TestResult {
    let store = Store::new()?;
    let backend = store.backend(1)?;
    let session = session(&backend)?;
    let bundle = backend.create_bundle("b", "ns", session)?;
    let member = backend.create_object("ns", "m", ObjectType::Entity, session)?;

    backend.add_relation(bundle, member, RelationType::InBundle)?;
    assert!(!backend.has_immediate_ancestor(bundle, member)?);
    let (status, _) =
        collect(|cb| backend.get_object_relations(member, Direction::Descendants, cb))?;
    assert_eq!(status, Status::NoData);
    Ok(())
}

#[test]
fn relation_properties() -> TestResult {
    let store = Store::new()?;
    let backend = store.backend(1)?;
    let session = session(&backend)?;
    let a = backend.create_object("ns", "a", ObjectType::Entity, session)?;
    let b = backend.create_object("ns", "b", ObjectType::Entity, session)?;
    let relation = backend.add_relation(a, b, RelationType::WasDerivedFrom)?;

    backend.add_relation_property(relation, "tool", "name", "cp")?;
    backend.add_relation_property(relation, "tool", "version", "9.1")?;
    backend.add_relation_property(relation, "note", "text", "copied")?;

    let (_, all) = collect(|cb| backend.get_relation_properties(relation, PropertyFilter::All, cb))?;
    assert_eq!(all.len(), 3);

    let (_, tool) = collect(|cb| {
        backend.get_relation_properties(relation, PropertyFilter::Prefix("tool"), cb)
    })?;
    assert_eq!(tool.len(), 2);

    let (_, version) = collect(|cb| {
        backend.get_relation_properties(
            relation,
            PropertyFilter::Key {
                prefix: "tool",
                key: "version",
            },
            cb,
        )
    })?;
    assert_eq!(version.len(), 1);
    assert_eq!(version[0].value, "9.1");
    assert_eq!(version[0].id, relation);
    Ok(())
}
