use serde::{Deserialize, Serialize};

use crate::error::CplError;
use crate::model::CPL_VALUE_LEN;
use crate::pool::CPL_STMT_MAX;
use crate::types::DbType;

/// Retries allowed after the first attempt of one statement.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Tuning for a [`RelationalBackend`](crate::RelationalBackend).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendOptions {
    /// Prepared handles per query.
    pub pool_size: usize,
    /// Reconnect-and-retry rounds per statement on a dropped link.
    pub max_retries: u32,
    /// Longest string, in bytes, read back from a text column.
    pub max_string_len: usize,
    pub db_type: DbType,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            pool_size: CPL_STMT_MAX,
            max_retries: DEFAULT_MAX_RETRIES,
            max_string_len: CPL_VALUE_LEN,
            db_type: DbType::Generic,
        }
    }
}

impl BackendOptions {
    #[must_use]
    pub fn new(db_type: DbType) -> Self {
        Self {
            db_type,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn builder() -> BackendOptionsBuilder {
        BackendOptionsBuilder::default()
    }

    /// Parse options from JSON. Missing fields keep their defaults.
    ///
    /// # Errors
    /// Returns [`CplError::InvalidArgument`] for malformed JSON or a zero
    /// pool size.
    pub fn from_json(json: &str) -> Result<Self, CplError> {
        let opts: BackendOptions = serde_json::from_str(json)
            .map_err(|e| CplError::InvalidArgument(format!("backend options: {e}")))?;
        if opts.pool_size == 0 {
            return Err(CplError::InvalidArgument("pool size must be at least 1".into()));
        }
        Ok(opts)
    }
}

/// Fluent builder for [`BackendOptions`].
#[derive(Debug, Clone, Default)]
pub struct BackendOptionsBuilder {
    opts: BackendOptions,
}

impl BackendOptionsBuilder {
    #[must_use]
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.opts.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.opts.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn max_string_len(mut self, max_string_len: usize) -> Self {
        self.opts.max_string_len = max_string_len;
        self
    }

    #[must_use]
    pub fn db_type(mut self, db_type: DbType) -> Self {
        self.opts.db_type = db_type;
        self
    }

    #[must_use]
    pub fn finish(self) -> BackendOptions {
        self.opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let opts = BackendOptions::from_json(r#"{"pool_size": 2, "db_type": "sqlite"}"#)
            .expect("json");
        assert_eq!(opts.pool_size, 2);
        assert_eq!(opts.db_type, DbType::Sqlite);
        assert_eq!(opts.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(opts.max_string_len, CPL_VALUE_LEN);
    }

    #[test]
    fn bad_json_is_an_invalid_argument() {
        assert!(matches!(
            BackendOptions::from_json("{\"pool_size\": 0}"),
            Err(CplError::InvalidArgument(_))
        ));
        assert!(matches!(
            BackendOptions::from_json("not json"),
            Err(CplError::InvalidArgument(_))
        ));
    }

    #[test]
    fn builder_overrides() {
        let opts = BackendOptions::builder()
            .pool_size(1)
            .max_retries(0)
            .db_type(DbType::Postgres)
            .finish();
        assert_eq!(opts.pool_size, 1);
        assert_eq!(opts.max_retries, 0);
        assert_eq!(opts.db_type, DbType::Postgres);
    }
}
