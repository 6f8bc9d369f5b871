use std::sync::Arc;

use tracing::debug;

use crate::backend::ProvenanceBackend;
use crate::error::CplError;
use crate::model::{BundleId, ObjectId, ObjectType, SessionDescriptor, SessionId};

/// An attached backend together with the session this process recorded in it.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use prov_cpl::prelude::*;
/// use prov_cpl::sqlite::SqliteDriver;
///
/// let driver = Arc::new(SqliteDriver::new_default().with_schema());
/// let backend = create_backend(driver, "Database=/tmp/prov.db;", DbType::Sqlite)?;
/// let mut ctx = CplContext::new();
/// ctx.attach(Arc::new(backend), &SessionDescriptor::for_current_process())?;
/// let id = ctx.lookup_or_create_object("ns", "input.csv", ObjectType::Entity)?;
/// # let _ = id;
/// ctx.detach()?;
/// # Ok::<(), CplError>(())
/// ```
#[derive(Default)]
pub struct CplContext {
    attached: Option<Attached>,
}

struct Attached {
    backend: Arc<dyn ProvenanceBackend>,
    session: SessionId,
}

impl CplContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `backend` and record a session for `session`.
    ///
    /// # Errors
    /// [`CplError::AlreadyInitialized`] if a backend is attached, or the
    /// backend's error from creating the session.
    pub fn attach(
        &mut self,
        backend: Arc<dyn ProvenanceBackend>,
        session: &SessionDescriptor,
    ) -> Result<SessionId, CplError> {
        if self.attached.is_some() {
            return Err(CplError::AlreadyInitialized);
        }
        let session = backend.create_session(session)?;
        debug!(session, "attached provenance backend");
        self.attached = Some(Attached { backend, session });
        Ok(session)
    }

    /// Drop the backend reference. The backend itself closes once the last
    /// reference is gone.
    ///
    /// # Errors
    /// [`CplError::NotInitialized`] if nothing is attached.
    pub fn detach(&mut self) -> Result<(), CplError> {
        let attached = self.attached.take().ok_or(CplError::NotInitialized)?;
        debug!(session = attached.session, "detached provenance backend");
        Ok(())
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    /// # Errors
    /// [`CplError::NotInitialized`] if nothing is attached.
    pub fn backend(&self) -> Result<&dyn ProvenanceBackend, CplError> {
        self.attached
            .as_ref()
            .map(|attached| attached.backend.as_ref())
            .ok_or(CplError::NotInitialized)
    }

    /// # Errors
    /// [`CplError::NotInitialized`] if nothing is attached.
    pub fn session(&self) -> Result<SessionId, CplError> {
        self.attached
            .as_ref()
            .map(|attached| attached.session)
            .ok_or(CplError::NotInitialized)
    }

    /// Create an object owned by this context's session.
    ///
    /// # Errors
    /// [`CplError::NotInitialized`], or the backend's error.
    pub fn create_object(
        &self,
        prefix: &str,
        name: &str,
        object_type: ObjectType,
    ) -> Result<ObjectId, CplError> {
        self.backend()?
            .create_object(prefix, name, object_type, self.session()?)
    }

    /// The most recent object with this name, created if there is none.
    ///
    /// # Errors
    /// [`CplError::NotInitialized`], or the backend's error.
    pub fn lookup_or_create_object(
        &self,
        prefix: &str,
        name: &str,
        object_type: ObjectType,
    ) -> Result<ObjectId, CplError> {
        match self.backend()?.lookup_object(prefix, name, Some(object_type)) {
            Err(CplError::NotFound) => self.create_object(prefix, name, object_type),
            other => other,
        }
    }

    /// # Errors
    /// [`CplError::NotInitialized`], or the backend's error.
    pub fn create_bundle(&self, name: &str, prefix: &str) -> Result<BundleId, CplError> {
        self.backend()?.create_bundle(name, prefix, self.session()?)
    }
}

impl std::fmt::Debug for CplContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CplContext")
            .field("session", &self.attached.as_ref().map(|a| a.session))
            .finish()
    }
}

impl SessionDescriptor {
    /// Describe the running process: user from `$USER`, the executable name
    /// and the process id. MAC address and command line are left empty.
    #[must_use]
    pub fn for_current_process() -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_default();
        let program = std::env::current_exe()
            .ok()
            .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_default();
        SessionDescriptor::new(user, i64::from(std::process::id()), program)
    }
}
