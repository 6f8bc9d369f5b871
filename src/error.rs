use std::fmt;

use thiserror::Error;

/// SQLSTATE reported by a driver when the link to the store dropped mid-call.
pub const SQLSTATE_COMMUNICATION_LINK_FAILURE: &str = "08S01";

/// One facet of a driver failure, in the shape of an ODBC diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    /// Five-character SQLSTATE.
    pub state: String,
    /// Driver-native error code.
    pub native: i32,
    pub message: String,
}

impl DiagnosticRecord {
    #[must_use]
    pub fn new(state: impl Into<String>, native: i32, message: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            native,
            message: message.into(),
        }
    }
}

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.state, self.native, self.message)
    }
}

/// A failed driver call together with every diagnostic record it produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("driver reported {} diagnostic record(s){}", .records.len(), first_message(.records))]
pub struct DriverError {
    pub records: Vec<DiagnosticRecord>,
}

fn first_message(records: &[DiagnosticRecord]) -> String {
    records
        .first()
        .map(|record| format!(": {record}"))
        .unwrap_or_default()
}

impl DriverError {
    #[must_use]
    pub fn new(records: Vec<DiagnosticRecord>) -> Self {
        Self { records }
    }

    /// Shorthand for a failure carrying exactly one diagnostic record.
    #[must_use]
    pub fn single(state: &str, native: i32, message: impl Into<String>) -> Self {
        Self {
            records: vec![DiagnosticRecord::new(state, native, message)],
        }
    }

    /// Whether any record carries the given SQLSTATE.
    #[must_use]
    pub fn has_state(&self, state: &str) -> bool {
        self.records.iter().any(|record| record.state == state)
    }
}

/// Errors surfaced by the provenance backend.
///
/// Rich driver diagnostics are logged where they occur and are not carried
/// here; callers only branch on the variant (or its integer [`code`](Self::code)).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CplError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Insufficient resources: {0}")]
    InsufficientResources(String),

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("A backend is already attached")]
    AlreadyInitialized,

    #[error("No backend is attached")]
    NotInitialized,

    #[error("Failed to prepare statement {0}")]
    Prepare(String),

    #[error("Statement {0} failed")]
    Statement(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Backend internal error: {0}")]
    BackendInternal(String),

    #[error("Not found")]
    NotFound,

    #[error("Already exists")]
    AlreadyExists,

    #[error("Unexpected NULL value")]
    DbNull,

    #[error("Invalid value type: {0}")]
    InvalidType(String),

    /// A caller-supplied callback stopped the iteration with its own code.
    #[error("Iteration aborted by callback with code {0}")]
    Callback(i32),
}

impl CplError {
    /// The integer error code used at the C-compatible boundary. Always negative
    /// except for a callback that aborted with a non-negative code of its own.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            CplError::InvalidArgument(_) => -1,
            CplError::InsufficientResources(_) => -2,
            CplError::Connection(_) => -3,
            CplError::NotImplemented(_) => -4,
            CplError::AlreadyInitialized => -5,
            CplError::NotInitialized => -6,
            CplError::Prepare(_) => -7,
            CplError::Statement(_) => -8,
            CplError::Internal(_) => -9,
            CplError::BackendInternal(_) => -10,
            CplError::NotFound => -11,
            CplError::AlreadyExists => -12,
            CplError::DbNull => -15,
            CplError::InvalidType(_) => -17,
            CplError::Callback(code) => *code,
        }
    }

    /// `NotFound` and `DbNull` are ordinary outcomes rather than faults.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CplError::NotFound | CplError::DbNull)
    }
}

/// Non-error outcomes of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    DuplicateIgnored,
    /// The operation succeeded but produced no rows.
    NoData,
}

impl Status {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::DuplicateIgnored => 1,
            Status::NoData => 2,
        }
    }
}

/// Encode an operation result into the signed integer convention: `>= 0` on
/// success, negative on failure.
#[must_use]
pub fn return_code(result: &Result<Status, CplError>) -> i32 {
    match result {
        Ok(status) => status.code(),
        Err(err) => err.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_keep_sign_convention() {
        assert_eq!(return_code(&Ok(Status::Ok)), 0);
        assert_eq!(return_code(&Ok(Status::NoData)), 2);
        assert_eq!(return_code(&Err(CplError::NotFound)), -11);
        assert_eq!(CplError::Statement("x".into()).code(), -8);
        assert_eq!(CplError::Prepare("x".into()).code(), -7);
        assert_eq!(CplError::DbNull.code(), -15);
    }

    #[test]
    fn driver_error_display_mentions_first_record() {
        let err = DriverError::single("08S01", 7, "link down");
        let text = err.to_string();
        assert!(text.contains("08S01:7:link down"), "{text}");
        assert!(err.has_state(SQLSTATE_COMMUNICATION_LINK_FAILURE));
    }

    #[test]
    fn has_state_looks_past_the_first_record() {
        let err = DriverError::new(vec![
            DiagnosticRecord::new("01000", 0, "general warning"),
            DiagnosticRecord::new("23000", 19, "constraint"),
        ]);
        assert!(err.has_state("23000"));
        assert!(err.has_state("01000"));
        assert!(!err.has_state("08S01"));
        assert!(!DriverError::new(vec![]).has_state("08S01"));
    }
}
