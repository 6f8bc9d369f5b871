#![cfg(all(feature = "sqlite", feature = "test-utils"))]

mod common;

use std::thread;

use common::{Store, TestResult, collect, session};
use prov_cpl::test_utils::{FaultPlan, FaultPoint};
use prov_cpl::{
    BackendOptions, CplError, DiagnosticRecord, DriverError, ObjectType, ProvenanceBackend, Query,
};

fn options(pool_size: usize) -> BackendOptions {
    BackendOptions::builder().pool_size(pool_size).finish()
}

#[test]
fn three_link_failures_are_retried() -> TestResult {
    let store = Store::new()?;
    let (backend, plan) = store.faulty_backend(options(2))?;
    let session = session(&backend)?;

    plan.fail_next_n(FaultPoint::Execute, 3, &FaultPlan::link_failure());
    let id = backend.create_object("ns", "survivor", ObjectType::Entity, session)?;

    assert_eq!(backend.lookup_object("ns", "survivor", None)?, id);
    assert_eq!(backend.reconnect_count(), 3);
    assert_eq!(backend.connection_generation()?, 4);
    assert_eq!(plan.connects(), 4);
    assert_eq!(plan.open_connections(), 1);
    assert_eq!(plan.live_statements(), Query::ALL.len() * 2);
    assert_eq!(backend.available_statements(Query::CreateObject)?, 2);
    Ok(())
}

#[test]
fn a_fourth_link_failure_gives_up() -> TestResult {
    let store = Store::new()?;
    let (backend, plan) = store.faulty_backend(options(2))?;
    let session = session(&backend)?;

    plan.fail_next_n(FaultPoint::Execute, 4, &FaultPlan::link_failure());
    let result = backend.create_object("ns", "lost", ObjectType::Entity, session);

    assert_eq!(result, Err(CplError::Statement("CreateObject".into())));
    assert_eq!(plan.pending(FaultPoint::Execute), 0);
    assert_eq!(backend.reconnect_count(), 3);
    assert_eq!(backend.available_statements(Query::CreateObject)?, 2);
    // the failed attempts never reached the store
    let (_, all) = collect(|cb| backend.get_all_objects(None, cb))?;
    assert!(all.is_empty());
    Ok(())
}

#[test]
fn bind_failures_are_retried_too() -> TestResult {
    let store = Store::new()?;
    let (backend, plan) = store.faulty_backend(options(1))?;
    let session = session(&backend)?;

    plan.fail_next(FaultPoint::Bind, FaultPlan::link_failure());
    backend.create_object("ns", "bound", ObjectType::Entity, session)?;
    assert_eq!(backend.reconnect_count(), 1);

    plan.fail_next(FaultPoint::Bind, DriverError::single("07006", 0, "bad type"));
    assert!(matches!(
        backend.create_object("ns", "unbound", ObjectType::Entity, session),
        Err(CplError::Statement(_))
    ));
    assert_eq!(backend.reconnect_count(), 1);
    assert_eq!(backend.available_statements(Query::CreateObject)?, 1);
    assert_eq!(plan.live_statements(), Query::ALL.len());
    Ok(())
}

#[test]
fn only_a_lone_link_failure_triggers_a_reconnect() -> TestResult {
    let store = Store::new()?;
    let (backend, plan) = store.faulty_backend(options(1))?;
    let session = session(&backend)?;

    let failures = [
        DriverError::single("08001", 0, "refused"),
        DriverError::single("23000", 19, "constraint"),
        DriverError::new(vec![]),
        DriverError::new(vec![
            DiagnosticRecord::new("08S01", 0, "link down"),
            DiagnosticRecord::new("01000", 0, "general warning"),
        ]),
    ];
    for failure in failures {
        plan.fail_next(FaultPoint::Execute, failure);
        assert!(matches!(
            backend.create_object("ns", "x", ObjectType::Entity, session),
            Err(CplError::Statement(_))
        ));
    }

    assert_eq!(backend.reconnect_count(), 0);
    assert_eq!(plan.connects(), 1);
    assert_eq!(backend.available_statements(Query::CreateObject)?, 1);
    Ok(())
}

#[test]
fn fetch_failures_are_not_retried() -> TestResult {
    let store = Store::new()?;
    let (backend, plan) = store.faulty_backend(options(2))?;
    let session = session(&backend)?;
    backend.create_object("ns", "row", ObjectType::Entity, session)?;

    plan.fail_next(FaultPoint::Fetch, FaultPlan::link_failure());
    assert_eq!(
        backend.lookup_object("ns", "row", None),
        Err(CplError::Statement("LookupObject".into()))
    );
    assert_eq!(backend.reconnect_count(), 0);
    assert_eq!(backend.available_statements(Query::LookupObject)?, 2);

    // the handle is usable again
    backend.lookup_object("ns", "row", None)?;
    Ok(())
}

#[test]
fn failed_reconnect_recovers_on_the_next_call() -> TestResult {
    let store = Store::new()?;
    let (backend, plan) = store.faulty_backend(options(1))?;
    let session = session(&backend)?;

    plan.fail_next(FaultPoint::Execute, FaultPlan::link_failure());
    plan.fail_next(FaultPoint::Connect, DriverError::single("08001", 0, "refused"));

    assert!(matches!(
        backend.create_object("ns", "a", ObjectType::Entity, session),
        Err(CplError::Connection(_))
    ));
    assert_eq!(plan.open_connections(), 0);
    assert_eq!(plan.live_statements(), 0);

    // the store is reachable again
    assert_eq!(backend.lookup_object("ns", "a", None), Err(CplError::NotFound));
    assert_eq!(plan.open_connections(), 1);
    assert_eq!(plan.live_statements(), Query::ALL.len());
    assert_eq!(backend.reconnect_count(), 1);

    let id = backend.create_object("ns", "a", ObjectType::Entity, session)?;
    assert_eq!(backend.lookup_object("ns", "a", None)?, id);
    Ok(())
}

#[test]
fn a_store_still_down_keeps_failing_with_connection_errors() -> TestResult {
    let store = Store::new()?;
    let (backend, plan) = store.faulty_backend(options(1))?;
    let session = session(&backend)?;

    plan.fail_next(FaultPoint::Execute, FaultPlan::link_failure());
    plan.fail_next_n(
        FaultPoint::Connect,
        2,
        &DriverError::single("08001", 0, "refused"),
    );

    for _ in 0..2 {
        assert!(matches!(
            backend.create_object("ns", "b", ObjectType::Entity, session),
            Err(CplError::Connection(_))
        ));
        assert_eq!(plan.open_connections(), 0);
    }

    backend.create_object("ns", "b", ObjectType::Entity, session)?;
    assert_eq!(plan.open_connections(), 1);
    assert_eq!(backend.reconnect_count(), 1);
    Ok(())
}

#[test]
fn concurrent_callers_share_reconnects() -> TestResult {
    let store = Store::new()?;
    let (backend, plan) = store.faulty_backend(options(2))?;
    let session = session(&backend)?;

    plan.fail_next_n(FaultPoint::Execute, 3, &FaultPlan::link_failure());
    thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let backend = &backend;
                scope.spawn(move || -> Result<(), CplError> {
                    for i in 0..20 {
                        let name = format!("w{worker}-{i}");
                        backend.create_object("ns", &name, ObjectType::Entity, session)?;
                    }
                    Ok(())
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().ok(), Some(Ok(())));
        }
    });

    let (_, all) = collect(|cb| backend.get_all_objects(Some("ns"), cb))?;
    assert_eq!(all.len(), 80);
    assert!((1..=3).contains(&backend.reconnect_count()));
    assert_eq!(plan.open_connections(), 1);
    assert_eq!(plan.live_statements(), Query::ALL.len() * 2);
    Ok(())
}
