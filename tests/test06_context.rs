#![cfg(feature = "sqlite")]

mod common;

use std::sync::Arc;

use common::{Store, TestResult};
use prov_cpl::{CplContext, CplError, ObjectType, ProvenanceBackend, SessionDescriptor};

#[test]
fn attach_once_detach_once() -> TestResult {
    let store = Store::new()?;
    let backend = Arc::new(store.backend(1)?);
    let mut ctx = CplContext::new();
    assert!(!ctx.is_attached());
    assert_eq!(ctx.session(), Err(CplError::NotInitialized));

    let descriptor = SessionDescriptor::new("ctx-user", 7, "ctx-test");
    let session = ctx.attach(backend.clone(), &descriptor)?;
    assert!(ctx.is_attached());
    assert_eq!(ctx.session()?, session);
    assert_eq!(ctx.backend()?.get_session_info(session)?.user, "ctx-user");

    assert_eq!(
        ctx.attach(backend.clone(), &descriptor),
        Err(CplError::AlreadyInitialized)
    );

    ctx.detach()?;
    assert_eq!(ctx.detach(), Err(CplError::NotInitialized));
    assert!(matches!(ctx.backend(), Err(CplError::NotInitialized)));
    assert_eq!(
        ctx.create_object("ns", "x", ObjectType::Entity),
        Err(CplError::NotInitialized)
    );
    Ok(())
}

#[test]
fn lookup_or_create_is_idempotent() -> TestResult {
    let store = Store::new()?;
    let mut ctx = CplContext::new();
    let session = ctx.attach(
        Arc::new(store.backend(1)?),
        &SessionDescriptor::for_current_process(),
    )?;

    let id = ctx.lookup_or_create_object("ns", "config.toml", ObjectType::Entity)?;
    assert_eq!(
        ctx.lookup_or_create_object("ns", "config.toml", ObjectType::Entity)?,
        id
    );
    // a different type is a different object
    let agent = ctx.lookup_or_create_object("ns", "config.toml", ObjectType::Agent)?;
    assert_ne!(agent, id);

    let info = ctx.backend()?.get_object_info(id)?;
    assert_eq!(info.creation_session, session);

    let bundle = ctx.create_bundle("run", "ns")?;
    assert_eq!(ctx.backend()?.get_bundle_info(bundle)?.creation_session, session);
    Ok(())
}
