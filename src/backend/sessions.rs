use crate::error::CplError;
use crate::model::{
    CPL_CMDLINE_LEN, CPL_MAC_ADDR_LEN, CPL_PROGRAM_LEN, CPL_USER_LEN, SessionDescriptor,
    SessionId, SessionInfo,
};
use crate::queries::Query;
use crate::results::{EpochSeconds, FetchOptions};
use crate::types::SqlValue;

use super::{RelationalBackend, check_len, id_param};

pub(super) fn create_session(
    backend: &RelationalBackend,
    session: &SessionDescriptor,
) -> Result<SessionId, CplError> {
    check_len("MAC address", &session.mac_address, CPL_MAC_ADDR_LEN)?;
    check_len("user", &session.user, CPL_USER_LEN)?;
    check_len("program", &session.program, CPL_PROGRAM_LEN)?;
    check_len("command line", &session.cmdline, CPL_CMDLINE_LEN)?;

    let params = [
        SqlValue::from(session.mac_address.as_str()),
        SqlValue::from(session.user.as_str()),
        SqlValue::Int(session.pid),
        SqlValue::from(session.program.as_str()),
        SqlValue::from(session.cmdline.as_str()),
    ];
    backend
        .query_single(Query::CreateSession, &params, 0, FetchOptions::default())?
        .into_result()
}

pub(super) fn get_session_info(
    backend: &RelationalBackend,
    id: SessionId,
) -> Result<SessionInfo, CplError> {
    let params = [id_param("session", id)?];
    let rows = backend.query_rows(Query::GetSessionInfo, &params, |row| {
        Ok(SessionInfo {
            id,
            mac_address: row.optional(0)?.unwrap_or_default(),
            user: row.optional(1)?.unwrap_or_default(),
            pid: row.optional(2)?.unwrap_or_default(),
            program: row.optional(3)?.unwrap_or_default(),
            cmdline: row.optional(4)?.unwrap_or_default(),
            start_time: row.required::<EpochSeconds>(5)?.0,
        })
    })?;
    rows.into_iter().next().ok_or(CplError::NotFound)
}
