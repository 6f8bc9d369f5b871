#![cfg(feature = "sqlite")]

mod common;

use common::{Store, TestResult, collect, session};
use prov_cpl::{
    CPL_NAME_LEN, CplError, LookupFlags, ObjectType, PropertyFilter, ProvenanceBackend, Status,
};

#[test]
fn create_then_lookup_returns_the_newest_object() -> TestResult {
    let store = Store::new()?;
    let backend = store.backend(2)?;
    let session = session(&backend)?;

    let first = backend.create_object("ns", "data.csv", ObjectType::Entity, session)?;
    let second = backend.create_object("ns", "data.csv", ObjectType::Entity, session)?;
    assert!(second > first);

    // repeated lookups are stable
    assert_eq!(backend.lookup_object("ns", "data.csv", None)?, second);
    assert_eq!(backend.lookup_object("ns", "data.csv", None)?, second);
    assert_eq!(
        backend.lookup_object("ns", "data.csv", Some(ObjectType::Entity))?,
        second
    );
    assert_eq!(
        backend.lookup_object("ns", "data.csv", Some(ObjectType::Activity)),
        Err(CplError::NotFound)
    );
    assert_eq!(
        backend.lookup_object("other", "data.csv", None),
        Err(CplError::NotFound)
    );
    Ok(())
}

#[test]
fn untyped_lookup_picks_the_newest_of_mixed_types() -> TestResult {
    let store = Store::new()?;
    let backend = store.backend(1)?;
    let session = session(&backend)?;

    let entity = backend.create_object("ns", "shared", ObjectType::Entity, session)?;
    let activity = backend.create_object("ns", "shared", ObjectType::Activity, session)?;

    assert_eq!(backend.lookup_object("ns", "shared", None)?, activity);
    assert_eq!(
        backend.lookup_object("ns", "shared", Some(ObjectType::Entity))?,
        entity
    );
    Ok(())
}

#[test]
fn object_info_round_trips() -> TestResult {
    let store = Store::new()?;
    let backend = store.backend(1)?;
    let session = session(&backend)?;

    let before = chrono::Utc::now().timestamp();
    let id = backend.create_object("ns", "run-7", ObjectType::Activity, session)?;
    let info = backend.get_object_info(id)?;

    assert_eq!(info.id, id);
    assert_eq!(info.prefix, "ns");
    assert_eq!(info.name, "run-7");
    assert_eq!(info.object_type, ObjectType::Activity);
    assert_eq!(info.creation_session, session);
    let after = chrono::Utc::now().timestamp();
    // stored as local wall-clock time with whole seconds
    assert!(
        before <= info.creation_time && info.creation_time <= after,
        "creation time {} outside {before}..={after}",
        info.creation_time
    );

    assert_eq!(backend.get_object_info(id + 100), Err(CplError::NotFound));
    assert!(matches!(
        backend.get_object_info(0),
        Err(CplError::InvalidArgument(_))
    ));
    Ok(())
}

#[test]
fn ext_lookup_reports_every_match_in_creation_order() -> TestResult {
    let store = Store::new()?;
    let backend = store.backend(2)?;
    let session = session(&backend)?;

    let ids = [
        backend.create_object("ns", "x", ObjectType::Entity, session)?,
        backend.create_object("ns", "x", ObjectType::Agent, session)?,
        backend.create_object("ns", "x", ObjectType::Entity, session)?,
    ];

    let (status, found) =
        collect(|cb| backend.lookup_object_ext("ns", "x", None, LookupFlags::NONE, cb))?;
    assert_eq!(status, Status::Ok);
    assert_eq!(found.iter().map(|e| e.id).collect::<Vec<_>>(), ids);
    assert!(found.iter().all(|e| e.timestamp > 0));

    let (_, agents) = collect(|cb| {
        backend.lookup_object_ext("ns", "x", Some(ObjectType::Agent), LookupFlags::NONE, cb)
    })?;
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].id, ids[1]);

    assert_eq!(
        collect(|cb| backend.lookup_object_ext("ns", "y", None, LookupFlags::NONE, cb)).err(),
        Some(CplError::NotFound)
    );
    let (status, none) =
        collect(|cb| backend.lookup_object_ext("ns", "y", None, LookupFlags::NO_FAIL, cb))?;
    assert_eq!(status, Status::NoData);
    assert!(none.is_empty());
    Ok(())
}

#[test]
fn all_objects_skip_bundles_and_filter_by_prefix() -> TestResult {
    let store = Store::new()?;
    let backend = store.backend(1)?;
    let session = session(&backend)?;

    let a = backend.create_object("alpha", "a", ObjectType::Entity, session)?;
    let b = backend.create_object("beta", "b", ObjectType::Agent, session)?;
    let _bundle = backend.create_bundle("bundle", "alpha", session)?;

    let (_, all) = collect(|cb| backend.get_all_objects(None, cb))?;
    assert_eq!(all.iter().map(|o| o.id).collect::<Vec<_>>(), [a, b]);

    let (_, alpha) = collect(|cb| backend.get_all_objects(Some("alpha"), cb))?;
    assert_eq!(alpha.len(), 1);
    assert_eq!(alpha[0].name, "a");

    let (status, _) = collect(|cb| backend.get_all_objects(Some("gamma"), cb))?;
    assert_eq!(status, Status::NoData);
    Ok(())
}

#[test]
fn properties_filter_by_prefix_and_key() -> TestResult {
    let store = Store::new()?;
    let backend = store.backend(1)?;
    let session = session(&backend)?;
    let id = backend.create_object("ns", "file", ObjectType::Entity, session)?;

    backend.add_object_property(id, "fs", "path", "/tmp/file")?;
    backend.add_object_property(id, "fs", "mode", "0644")?;
    backend.add_object_property(id, "app", "label", "input")?;

    let (_, all) = collect(|cb| backend.get_object_properties(id, PropertyFilter::All, cb))?;
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|p| p.id == id));

    let (_, fs) = collect(|cb| backend.get_object_properties(id, PropertyFilter::Prefix("fs"), cb))?;
    assert_eq!(
        fs.iter().map(|p| p.key.as_str()).collect::<Vec<_>>(),
        ["path", "mode"]
    );

    let (_, mode) = collect(|cb| {
        backend.get_object_properties(id, PropertyFilter::Key { prefix: "fs", key: "mode" }, cb)
    })?;
    assert_eq!(mode.len(), 1);
    assert_eq!(mode[0].value, "0644");

    let (status, _) =
        collect(|cb| backend.get_object_properties(id, PropertyFilter::Prefix("nope"), cb))?;
    assert_eq!(status, Status::NoData);
    Ok(())
}

#[test]
fn property_lookups_find_owners() -> TestResult {
    let store = Store::new()?;
    let backend = store.backend(1)?;
    let session = session(&backend)?;
    let a = backend.create_object("ns", "a", ObjectType::Entity, session)?;
    let b = backend.create_object("ns", "b", ObjectType::Entity, session)?;

    backend.add_object_property(a, "app", "label", "input-1")?;
    backend.add_object_property(b, "app", "label", "input-2")?;
    backend.add_object_property(b, "app", "owner", "input-1")?;

    let (_, exact) = collect(|cb| {
        backend.lookup_object_by_property("app", "label", "input-1", LookupFlags::NONE, cb)
    })?;
    assert_eq!(exact, [a]);

    let (_, wildcard) = collect(|cb| {
        backend.lookup_object_property_wildcard("input-%", LookupFlags::NONE, cb)
    })?;
    assert_eq!(wildcard, [a, b]);

    assert_eq!(
        collect(|cb| backend.lookup_object_property_wildcard("zzz%", LookupFlags::NONE, cb)).err(),
        Some(CplError::NotFound)
    );
    let (status, _) = collect(|cb| {
        backend.lookup_object_by_property("app", "label", "missing", LookupFlags::NO_FAIL, cb)
    })?;
    assert_eq!(status, Status::NoData);
    Ok(())
}

#[test]
fn over_long_arguments_are_rejected_before_the_store() -> TestResult {
    let store = Store::new()?;
    let backend = store.backend(1)?;
    let session = session(&backend)?;
    let long = "n".repeat(CPL_NAME_LEN + 1);

    assert!(matches!(
        backend.create_object("ns", &long, ObjectType::Entity, session),
        Err(CplError::InvalidArgument(_))
    ));
    let (_, all) = collect(|cb| backend.get_all_objects(None, cb))?;
    assert!(all.is_empty());
    Ok(())
}

#[test]
fn callback_error_stops_the_enumeration() -> TestResult {
    let store = Store::new()?;
    let backend = store.backend(1)?;
    let session = session(&backend)?;
    for name in ["a", "b", "c"] {
        backend.create_object("ns", name, ObjectType::Entity, session)?;
    }

    let mut seen = 0;
    let result = backend.get_all_objects(None, &mut |_| {
        seen += 1;
        Err(CplError::Callback(7))
    });
    assert_eq!(result, Err(CplError::Callback(7)));
    assert_eq!(seen, 1);

    // callbacks may call back in; the statement is already released
    let mut names = Vec::new();
    backend.get_all_objects(None, &mut |info| {
        names.push(backend.get_object_info(info.id)?.name);
        Ok(())
    })?;
    assert_eq!(names, ["a", "b", "c"]);
    Ok(())
}

#[test]
fn sessions_record_the_descriptor() -> TestResult {
    let store = Store::new()?;
    let backend = store.backend(1)?;
    let id = session(&backend)?;

    let info = backend.get_session_info(id)?;
    assert_eq!(info.id, id);
    assert_eq!(info.user, "tester");
    assert_eq!(info.pid, 4242);
    assert_eq!(info.program, "prov-tests");
    assert_eq!(info.cmdline, "prov-tests --all");
    assert_eq!(info.mac_address, "00:11:22:33:44:55");
    assert!(info.start_time > 0);

    assert_eq!(backend.get_session_info(id + 1), Err(CplError::NotFound));
    Ok(())
}
