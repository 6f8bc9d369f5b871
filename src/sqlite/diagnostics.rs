use rusqlite::ErrorCode;

use crate::error::{DriverError, SQLSTATE_COMMUNICATION_LINK_FAILURE};

pub(crate) const SQLSTATE_GENERAL_ERROR: &str = "HY000";
pub(crate) const SQLSTATE_INVALID_CURSOR_STATE: &str = "24000";
pub(crate) const SQLSTATE_INVALID_DESCRIPTOR_INDEX: &str = "07009";
pub(crate) const SQLSTATE_CONNECTION_NOT_OPEN: &str = "08003";
pub(crate) const SQLSTATE_UNABLE_TO_CONNECT: &str = "08001";
pub(crate) const SQLSTATE_DSN_NOT_FOUND: &str = "IM002";

/// Translate a rusqlite error into the SQLSTATE vocabulary the backend
/// classifies on. The native code is the extended `SQLite` result code.
pub(crate) fn from_rusqlite(err: &rusqlite::Error) -> DriverError {
    match err {
        rusqlite::Error::SqliteFailure(ffi_err, msg) => {
            let state = match ffi_err.code {
                ErrorCode::ConstraintViolation => "23000",
                ErrorCode::CannotOpen | ErrorCode::NotADatabase => SQLSTATE_UNABLE_TO_CONNECT,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => "HYT00",
                ErrorCode::OutOfMemory => "HY001",
                ErrorCode::SystemIoFailure => SQLSTATE_COMMUNICATION_LINK_FAILURE,
                ErrorCode::ReadOnly | ErrorCode::PermissionDenied => "42000",
                _ => SQLSTATE_GENERAL_ERROR,
            };
            let message = msg.clone().unwrap_or_else(|| err.to_string());
            DriverError::single(state, ffi_err.extended_code, message)
        }
        rusqlite::Error::InvalidParameterCount(..) => DriverError::single("07002", 0, err.to_string()),
        rusqlite::Error::InvalidColumnIndex(_) => {
            DriverError::single(SQLSTATE_INVALID_DESCRIPTOR_INDEX, 0, err.to_string())
        }
        _ => DriverError::single(SQLSTATE_GENERAL_ERROR, 0, err.to_string()),
    }
}
