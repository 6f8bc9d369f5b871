//! Statement execution with reconnect-and-retry.
//!
//! A failure during bind or execute whose diagnostics are exactly one record
//! with state `08S01` means the link to the store dropped: the statement goes
//! back to its pool, the connection and every pool are rebuilt, and the call
//! starts over on a fresh handle. Any other failure, or one past the retry
//! limit, is logged with all of its records and surfaces as
//! [`CplError::Statement`]. Fetch failures are never retried. A backend left
//! without a connection by a failed reconnect connects again on its next call.

use tracing::{error, warn};

use crate::backend::RelationalBackend;
use crate::connection::{LiveConnection, log_records};
use crate::error::{CplError, DriverError, SQLSTATE_COMMUNICATION_LINK_FAILURE, Status};
use crate::queries::Query;
use crate::results::{FetchOptions, Fetched, FromSqlValue, RowReader, close_cursor_quietly};
use crate::types::SqlValue;

/// Whether a failed bind or execute should be retried on a new connection.
#[must_use]
pub fn is_retryable(err: &DriverError) -> bool {
    matches!(
        err.records.as_slice(),
        [record] if record.state == SQLSTATE_COMMUNICATION_LINK_FAILURE
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Bind,
    Execute,
}

impl Step {
    fn as_str(self) -> &'static str {
        match self {
            Step::Bind => "bind",
            Step::Execute => "execute",
        }
    }
}

enum Attempt<T> {
    Done(Result<T, CplError>),
    Failed {
        generation: u64,
        step: Step,
        error: DriverError,
    },
}

/// One acquire → bind → execute → consume pass against `live`. The handle
/// is back in its pool when this returns.
fn attempt<T>(
    live: &LiveConnection,
    query: Query,
    params: &[SqlValue],
    max_string_len: usize,
    consume: &mut impl FnMut(&mut RowReader<'_>) -> Result<T, CplError>,
) -> Attempt<T> {
    let mut stmt = match live.pool(query).and_then(|pool| pool.acquire()) {
        Ok(stmt) => stmt,
        Err(err) => return Attempt::Done(Err(err)),
    };

    let step_result = stmt
        .bind(params)
        .map_err(|err| (Step::Bind, err))
        .and_then(|()| stmt.execute().map_err(|err| (Step::Execute, err)));
    if let Err((step, error)) = step_result {
        close_cursor_quietly(&mut **stmt, query);
        return Attempt::Failed {
            generation: live.generation(),
            step,
            error,
        };
    }

    let result = {
        let mut reader = RowReader::new(&mut **stmt, query, max_string_len);
        let result = consume(&mut reader);
        reader.close_quietly();
        result
    };
    Attempt::Done(result)
}

impl RelationalBackend {
    /// Run `query` with `params` and hand the open cursor to `consume`,
    /// retrying on a dropped link.
    ///
    /// # Errors
    /// [`CplError::Statement`] once bind or execute fails for good,
    /// [`CplError::Connection`] if a reconnect fails, or whatever `consume`
    /// returns.
    pub(crate) fn run_statement<T>(
        &self,
        query: Query,
        params: &[SqlValue],
        mut consume: impl FnMut(&mut RowReader<'_>) -> Result<T, CplError>,
    ) -> Result<T, CplError> {
        let max_retries = self.options.max_retries;
        let max_string_len = self.options.max_string_len;
        let mut retries = 0;
        loop {
            let outcome = match self.manager.with_live(|live| {
                attempt(live, query, params, max_string_len, &mut consume)
            }) {
                Ok(outcome) => outcome,
                Err(CplError::Connection(_)) if retries < max_retries => {
                    // an earlier reconnect failed
                    retries += 1;
                    warn!(query = query.name(), retries, "not connected, reconnecting");
                    self.manager.reconnect_if_disconnected()?;
                    continue;
                }
                Err(err) => return Err(err),
            };
            match outcome {
                Attempt::Done(result) => return result,
                Attempt::Failed {
                    generation,
                    step,
                    error,
                } => {
                    if is_retryable(&error) && retries < max_retries {
                        retries += 1;
                        warn!(
                            query = query.name(),
                            step = step.as_str(),
                            retries,
                            "communication link failure, reconnecting"
                        );
                        self.manager.reconnect_if_current(generation)?;
                        continue;
                    }
                    log_records(query.name(), &error);
                    error!(
                        query = query.name(),
                        step = step.as_str(),
                        retries,
                        "statement failed"
                    );
                    return Err(CplError::Statement(query.name().to_owned()));
                }
            }
        }
    }

    /// Run a statement that returns no rows the caller needs.
    pub(crate) fn execute(&self, query: Query, params: &[SqlValue]) -> Result<(), CplError> {
        self.run_statement(query, params, |_| Ok(()))
    }

    /// Run a statement and read one value from its first row.
    pub(crate) fn query_single<T: FromSqlValue>(
        &self,
        query: Query,
        params: &[SqlValue],
        column: usize,
        options: FetchOptions,
    ) -> Result<Fetched<T>, CplError> {
        self.run_statement(query, params, |reader| reader.fetch_single(column, options))
    }

    /// Run a statement and map every row it returns.
    pub(crate) fn query_rows<T>(
        &self,
        query: Query,
        params: &[SqlValue],
        mut row: impl FnMut(&mut RowReader<'_>) -> Result<T, CplError>,
    ) -> Result<Vec<T>, CplError> {
        self.run_statement(query, params, |reader| reader.collect_rows(&mut row))
    }

    /// [`query_rows`](Self::query_rows), then hand the rows to `callback`
    /// after the statement is back in its pool.
    pub(crate) fn query_each<T>(
        &self,
        query: Query,
        params: &[SqlValue],
        row: impl FnMut(&mut RowReader<'_>) -> Result<T, CplError>,
        callback: &mut dyn FnMut(T) -> Result<(), CplError>,
    ) -> Result<Status, CplError> {
        let rows = self.query_rows(query, params, row)?;
        crate::results::deliver(rows, callback)
    }
}
