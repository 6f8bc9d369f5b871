//! Fault injection and handle accounting for tests and the simulator.
//!
//! [`FaultInjectingDriver`] wraps another driver. Failures queued on its
//! shared [`FaultPlan`] are returned, one per call, from the matching driver
//! step before the real driver is reached. The plan also counts connections
//! and statement handles that are still alive.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::driver::{Driver, DriverConnection, DriverStatement};
use crate::error::{DriverError, SQLSTATE_COMMUNICATION_LINK_FAILURE};
use crate::types::SqlValue;

/// Driver call that a queued failure replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Connect,
    Prepare,
    Bind,
    Execute,
    Fetch,
}

/// Queued failures plus live-handle counters, shared by every connection and
/// statement the driver hands out.
#[derive(Debug, Default)]
pub struct FaultPlan {
    queues: Mutex<HashMap<FaultPoint, VecDeque<DriverError>>>,
    connects: AtomicUsize,
    open_connections: AtomicUsize,
    live_statements: AtomicUsize,
    injected: AtomicUsize,
}

impl FaultPlan {
    /// The single-record `08S01` failure the backend retries on.
    #[must_use]
    pub fn link_failure() -> DriverError {
        DriverError::single(SQLSTATE_COMMUNICATION_LINK_FAILURE, 0, "injected link failure")
    }

    /// Fail the next call at `point` with `err`.
    pub fn fail_next(&self, point: FaultPoint, err: DriverError) {
        self.fail_next_n(point, 1, &err);
    }

    pub fn fail_next_n(&self, point: FaultPoint, count: usize, err: &DriverError) {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = queues.entry(point).or_default();
        queue.extend(std::iter::repeat_n(err.clone(), count));
    }

    /// Failures still queued at `point`.
    #[must_use]
    pub fn pending(&self, point: FaultPoint) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&point)
            .map_or(0, VecDeque::len)
    }

    pub fn clear(&self) {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn take(&self, point: FaultPoint) -> Result<(), DriverError> {
        let next = self
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&point)
            .and_then(VecDeque::pop_front);
        match next {
            Some(err) => {
                self.injected.fetch_add(1, Ordering::SeqCst);
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Successful connects so far.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    /// Statement handles prepared and not yet dropped.
    #[must_use]
    pub fn live_statements(&self) -> usize {
        self.live_statements.load(Ordering::SeqCst)
    }

    /// Failures handed out so far.
    #[must_use]
    pub fn injected(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }
}

/// Driver wrapper that injects queued failures.
pub struct FaultInjectingDriver {
    inner: Arc<dyn Driver>,
    plan: Arc<FaultPlan>,
}

impl FaultInjectingDriver {
    #[must_use]
    pub fn new(inner: Arc<dyn Driver>) -> Self {
        Self {
            inner,
            plan: Arc::new(FaultPlan::default()),
        }
    }

    #[must_use]
    pub fn plan(&self) -> Arc<FaultPlan> {
        Arc::clone(&self.plan)
    }
}

impl Driver for FaultInjectingDriver {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn connect(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>, DriverError> {
        self.plan.take(FaultPoint::Connect)?;
        let inner = self.inner.connect(connection_string)?;
        self.plan.connects.fetch_add(1, Ordering::SeqCst);
        self.plan.open_connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FaultyConnection {
            inner,
            plan: Arc::clone(&self.plan),
            open: true,
        }))
    }
}

struct FaultyConnection {
    inner: Box<dyn DriverConnection>,
    plan: Arc<FaultPlan>,
    open: bool,
}

impl FaultyConnection {
    fn mark_closed(&mut self) {
        if self.open {
            self.open = false;
            self.plan.open_connections.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl DriverConnection for FaultyConnection {
    fn prepare(&self, sql: &str) -> Result<Box<dyn DriverStatement>, DriverError> {
        self.plan.take(FaultPoint::Prepare)?;
        let inner = self.inner.prepare(sql)?;
        self.plan.live_statements.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FaultyStatement {
            inner,
            plan: Arc::clone(&self.plan),
        }))
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        self.mark_closed();
        self.inner.disconnect()
    }
}

impl Drop for FaultyConnection {
    fn drop(&mut self) {
        self.mark_closed();
    }
}

struct FaultyStatement {
    inner: Box<dyn DriverStatement>,
    plan: Arc<FaultPlan>,
}

impl DriverStatement for FaultyStatement {
    fn bind(&mut self, params: &[SqlValue]) -> Result<(), DriverError> {
        self.plan.take(FaultPoint::Bind)?;
        self.inner.bind(params)
    }

    fn execute(&mut self) -> Result<(), DriverError> {
        self.plan.take(FaultPoint::Execute)?;
        self.inner.execute()
    }

    fn fetch(&mut self) -> Result<bool, DriverError> {
        self.plan.take(FaultPoint::Fetch)?;
        self.inner.fetch()
    }

    fn get_data(&mut self, column: usize) -> Result<SqlValue, DriverError> {
        self.inner.get_data(column)
    }

    fn close_cursor(&mut self) -> Result<(), DriverError> {
        self.inner.close_cursor()
    }
}

impl Drop for FaultyStatement {
    fn drop(&mut self) {
        self.plan.live_statements.fetch_sub(1, Ordering::SeqCst);
    }
}
