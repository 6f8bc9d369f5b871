use std::collections::HashMap;
use std::time::Duration;

/// Schema applied by [`SqliteDriver::with_schema`](super::SqliteDriver::with_schema).
pub const SCHEMA_SQL: &str = include_str!("../schema/sqlite.sql");

/// Default number of compiled statements rusqlite keeps per connection. Each
/// pooled handle of each query shares this cache.
pub const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 64;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for the `SQLite` driver.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// Create the provenance tables and triggers on every connect.
    pub apply_schema: bool,
    pub busy_timeout: Duration,
    pub statement_cache_capacity: usize,
    /// Named data sources resolved from `DSN=<name>`.
    pub dsns: HashMap<String, String>,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            apply_schema: false,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
            dsns: HashMap::new(),
        }
    }
}

/// Fluent builder for `SQLite` driver options.
#[derive(Debug, Clone, Default)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn schema(mut self, apply_schema: bool) -> Self {
        self.opts.apply_schema = apply_schema;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.opts.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.opts.statement_cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn dsn(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.opts.dsns.insert(name.into(), path.into());
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    #[must_use]
    pub fn build(self) -> super::SqliteDriver {
        super::SqliteDriver::new(self.finish())
    }
}
