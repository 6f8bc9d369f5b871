//! Fixed-size pools of prepared statement handles.
//!
//! Each query gets `N` interchangeable handles. A counting semaphore bounds
//! how many callers hold one at a time and a mutex guards the slot array, so
//! at most `N` callers use a query concurrently and the rest block.

pub mod semaphore;

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

use tracing::error;

use crate::error::CplError;
pub use semaphore::Semaphore;

/// Default number of handles per query.
pub const CPL_STMT_MAX: usize = 4;

/// `N` prepared handles of one statement.
pub struct StatementPool<H> {
    name: String,
    slots: Mutex<Vec<Option<H>>>,
    semaphore: Semaphore,
}

impl<H> StatementPool<H> {
    /// Pool over `handles`; its size is the number of handles given.
    #[must_use]
    pub fn new(name: impl Into<String>, handles: Vec<H>) -> Self {
        let size = handles.len();
        Self {
            name: name.into(),
            slots: Mutex::new(handles.into_iter().map(Some).collect()),
            semaphore: Semaphore::new(size),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Handles currently sitting in the pool.
    #[must_use]
    pub fn available(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    /// Block until a handle is free and take it. The handle goes back to the
    /// pool when the returned guard drops.
    ///
    /// # Errors
    /// Returns [`CplError::Internal`] if a permit was granted but every slot
    /// was empty, which means the pool's accounting is broken.
    pub fn acquire(&self) -> Result<PooledStatement<'_, H>, CplError> {
        self.semaphore.wait();
        self.take()
    }

    /// Take a handle only if one is free right now.
    ///
    /// # Errors
    /// See [`acquire`](Self::acquire).
    pub fn try_acquire(&self) -> Result<Option<PooledStatement<'_, H>>, CplError> {
        if !self.semaphore.try_wait() {
            return Ok(None);
        }
        self.take().map(Some)
    }

    fn take(&self) -> Result<PooledStatement<'_, H>, CplError> {
        let handle = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.iter_mut().find_map(Option::take)
        };
        match handle {
            Some(handle) => Ok(PooledStatement {
                pool: self,
                handle: Some(handle),
            }),
            None => {
                self.semaphore.post();
                error!(pool = %self.name, "semaphore granted a permit but no handle was free");
                Err(CplError::Internal(format!(
                    "statement pool {} has no free handle",
                    self.name
                )))
            }
        }
    }

    /// Put `handle` into the first vacant slot and signal one waiter.
    fn release(&self, handle: H) {
        let inserted = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            match slots.iter_mut().find(|slot| slot.is_none()) {
                Some(slot) => {
                    *slot = Some(handle);
                    true
                }
                None => false,
            }
        };
        if inserted {
            self.semaphore.post();
        } else {
            error!(pool = %self.name, "released a handle into a full statement pool");
            debug_assert!(inserted, "statement pool {} over-released", self.name);
        }
    }

    /// Take every handle out of the pool, e.g. to free them in order. Handles
    /// still checked out are not included; their slots stay vacant.
    pub fn drain(&self) -> Vec<H> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.iter_mut().filter_map(Option::take).collect()
    }
}

impl<H> fmt::Debug for StatementPool<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementPool")
            .field("name", &self.name)
            .field("size", &self.size())
            .field("available", &self.available())
            .finish()
    }
}

/// A handle checked out of a [`StatementPool`]. Dropping it returns the
/// handle.
pub struct PooledStatement<'a, H> {
    pool: &'a StatementPool<H>,
    handle: Option<H>,
}

impl<H> PooledStatement<'_, H> {
    #[must_use]
    pub fn pool_name(&self) -> &str {
        self.pool.name()
    }
}

impl<H> Deref for PooledStatement<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        // Only `Drop` empties the option.
        match &self.handle {
            Some(handle) => handle,
            None => unreachable!("pooled statement used after release"),
        }
    }
}

impl<H> DerefMut for PooledStatement<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        match &mut self.handle {
            Some(handle) => handle,
            None => unreachable!("pooled statement used after release"),
        }
    }
}

impl<H> Drop for PooledStatement<'_, H> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.release(handle);
        }
    }
}

/// One [`StatementPool`] per query key.
pub struct StatementPools<K, H> {
    pools: HashMap<K, StatementPool<H>>,
}

impl<K: Eq + Hash, H> StatementPools<K, H> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pools: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: K, pool: StatementPool<H>) {
        self.pools.insert(key, pool);
    }

    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&StatementPool<H>>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.pools.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &StatementPool<H>)> {
        self.pools.iter()
    }

    /// Empty every pool, returning all handles that were checked in.
    pub fn drain_all(&mut self) -> Vec<H> {
        let handles = self.pools.values().flat_map(StatementPool::drain).collect();
        self.pools.clear();
        handles
    }
}

impl<K: Eq + Hash, H> Default for StatementPools<K, H> {
    fn default() -> Self {
        Self::new()
    }
}
