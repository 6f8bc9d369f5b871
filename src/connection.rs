use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, warn};

use crate::driver::{Driver, DriverConnection, DriverStatement};
use crate::error::{CplError, DriverError};
use crate::pool::{StatementPool, StatementPools};
use crate::queries::Query;

/// A prepared statement as held by the pools.
pub type StatementHandle = Box<dyn DriverStatement>;

/// One open connection and the statement pools prepared against it.
pub struct LiveConnection {
    pools: StatementPools<Query, StatementHandle>,
    connection: Box<dyn DriverConnection>,
    generation: u64,
}

impl LiveConnection {
    /// Connect and prepare `pool_size` handles for every query. On failure
    /// everything prepared so far is freed and the connection closed.
    fn open(
        driver: &dyn Driver,
        connection_string: &str,
        pool_size: usize,
        generation: u64,
    ) -> Result<Self, CplError> {
        let connection = driver.connect(connection_string).map_err(|err| {
            log_records("connect", &err);
            CplError::Connection(format!("{} driver could not connect", driver.name()))
        })?;
        let mut live = LiveConnection {
            pools: StatementPools::new(),
            connection,
            generation,
        };

        for &query in Query::ALL {
            let mut handles = Vec::with_capacity(pool_size);
            for _ in 0..pool_size {
                // `live` drops on the early return and frees what was prepared
                let handle = live.connection.prepare(query.sql()).map_err(|err| {
                    log_records(query.name(), &err);
                    CplError::Prepare(query.name().to_owned())
                })?;
                handles.push(handle);
            }
            live.pools
                .insert(query, StatementPool::new(query.name(), handles));
        }

        debug!(
            generation,
            queries = live.pools.len(),
            pool_size,
            "connected and prepared statement pools"
        );
        Ok(live)
    }

    /// # Errors
    /// Returns [`CplError::Internal`] if the query was never prepared.
    pub fn pool(&self, query: Query) -> Result<&StatementPool<StatementHandle>, CplError> {
        self.pools
            .get(&query)
            .ok_or_else(|| CplError::Internal(format!("no statement pool for {}", query.name())))
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        // statements before the connection
        let handles = self.pools.drain_all();
        let freed = handles.len();
        drop(handles);
        if let Err(err) = self.connection.disconnect() {
            warn!(generation = self.generation, "disconnect failed: {err}");
        }
        debug!(generation = self.generation, freed, "closed connection");
    }
}

impl fmt::Debug for LiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveConnection")
            .field("generation", &self.generation)
            .field("queries", &self.pools.len())
            .finish_non_exhaustive()
    }
}

/// Owns the live connection and rebuilds it on demand.
///
/// Operations run against the connection under a read guard; a reconnect
/// takes the write guard, so it waits for in-flight attempts to release their
/// statements. Each connection carries a generation number, and
/// [`reconnect_if_current`](Self::reconnect_if_current) only rebuilds when the
/// caller saw the failure on the connection that is still current.
pub struct ConnectionManager {
    driver: Arc<dyn Driver>,
    connection_string: String,
    pool_size: usize,
    live: RwLock<Option<LiveConnection>>,
    last_generation: AtomicU64,
    reconnects: AtomicU64,
}

impl ConnectionManager {
    /// # Errors
    /// Returns [`CplError::Connection`] or [`CplError::Prepare`] if the store
    /// cannot be reached or a statement cannot be prepared.
    pub fn connect(
        driver: Arc<dyn Driver>,
        connection_string: &str,
        pool_size: usize,
    ) -> Result<Self, CplError> {
        if pool_size == 0 {
            return Err(CplError::InvalidArgument("pool size must be at least 1".into()));
        }
        let live = LiveConnection::open(driver.as_ref(), connection_string, pool_size, 1)?;
        Ok(Self {
            driver,
            connection_string: connection_string.to_owned(),
            pool_size,
            live: RwLock::new(Some(live)),
            last_generation: AtomicU64::new(1),
            reconnects: AtomicU64::new(0),
        })
    }

    /// Run `f` against the live connection under the read guard.
    ///
    /// # Errors
    /// Returns [`CplError::Connection`] if no connection is open.
    pub fn with_live<R>(&self, f: impl FnOnce(&LiveConnection) -> R) -> Result<R, CplError> {
        let guard = self.live.read().unwrap_or_else(PoisonError::into_inner);
        let live = guard
            .as_ref()
            .ok_or_else(|| CplError::Connection("not connected".into()))?;
        Ok(f(live))
    }

    /// Disconnect and connect again, unless the connection of `generation`
    /// has already been replaced.
    ///
    /// # Errors
    /// Returns the connect error; the manager is then left without a
    /// connection until the next operation reconnects.
    pub fn reconnect_if_current(&self, generation: u64) -> Result<(), CplError> {
        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = live.as_ref() {
            if current.generation != generation {
                debug!(
                    seen = generation,
                    current = current.generation,
                    "connection already rebuilt"
                );
                return Ok(());
            }
        }
        // old statements and connection go before the new ones are made
        *live = None;
        self.open_into(&mut live)
    }

    /// Connect again if the last reconnect failed and nothing is open. A
    /// no-op when some other caller has already restored the connection.
    ///
    /// # Errors
    /// Returns the connect error and stays disconnected.
    pub fn reconnect_if_disconnected(&self) -> Result<(), CplError> {
        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
        if live.is_some() {
            return Ok(());
        }
        self.open_into(&mut live)
    }

    fn open_into(&self, live: &mut Option<LiveConnection>) -> Result<(), CplError> {
        let next = self.last_generation.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(generation = next, "reconnecting");
        let fresh =
            LiveConnection::open(self.driver.as_ref(), &self.connection_string, self.pool_size, next)?;
        *live = Some(fresh);
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Unconditionally rebuild the connection.
    ///
    /// # Errors
    /// See [`reconnect_if_current`](Self::reconnect_if_current).
    pub fn reconnect(&self) -> Result<(), CplError> {
        let generation = self.with_live(LiveConnection::generation).unwrap_or(0);
        self.reconnect_if_current(generation)
    }

    /// Free all statements and close the connection. The next operation
    /// connects again.
    pub fn disconnect(&self) {
        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
        *live = None;
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Successful reconnects since construction.
    #[must_use]
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("driver", &self.driver.name())
            .field("pool_size", &self.pool_size)
            .field("reconnects", &self.reconnect_count())
            .finish_non_exhaustive()
    }
}

/// Log every diagnostic record of a failed driver call.
pub(crate) fn log_records(context: &str, err: &DriverError) {
    for (index, record) in err.records.iter().enumerate() {
        error!(
            context,
            index,
            state = %record.state,
            native = record.native,
            "{}",
            record.message
        );
    }
}
