use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Values bound as statement parameters or read back from result columns.
///
/// Every driver speaks this one enum so the backend operations never branch
/// on driver types:
/// ```rust
/// use prov_cpl::SqlValue;
///
/// let params = vec![SqlValue::Text("ns".into()), SqlValue::Int(3)];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Timestamp without sub-second precision or zone
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// Binary data
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let SqlValue::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Timestamps come back either natively or as `YYYY-MM-DD HH:MM:SS` text,
    /// depending on the driver.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let SqlValue::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            // Some stores append fractional seconds
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let SqlValue::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

/// The kind of store behind the connection string.
///
/// Recorded on the backend and reported in logs; the statement text itself is
/// not dialect-specific.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// A generic SQL database
    #[default]
    Generic,
    /// `MySQL`
    Mysql,
    /// `PostgreSQL`
    Postgres,
    /// `SQLite`
    Sqlite,
}

impl DbType {
    /// Integer identifier used by existing callers of the C interface.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            DbType::Generic => 0,
            DbType::Mysql => 1,
            DbType::Postgres => 2,
            DbType::Sqlite => 3,
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(DbType::Generic),
            1 => Some(DbType::Mysql),
            2 => Some(DbType::Postgres),
            3 => Some(DbType::Sqlite),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_parses_from_text() {
        let value = SqlValue::Text("2024-03-10 02:30:00".into());
        let ts = value.as_timestamp().expect("timestamp");
        assert_eq!(ts.to_string(), "2024-03-10 02:30:00");
        assert!(SqlValue::Text("yesterday".into()).as_timestamp().is_none());
    }

    #[test]
    fn db_type_codes_round_trip() {
        for db_type in DbType::value_variants() {
            assert_eq!(DbType::from_code(db_type.code()), Some(*db_type));
        }
        assert_eq!(DbType::from_code(42), None);
    }
}
