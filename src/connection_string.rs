use std::sync::LazyLock;

use regex::Regex;

use crate::error::CplError;

static PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*([^=;]+?)\s*=\s*(?:\{((?:[^}]|\}\})*)\}|([^;]*?))\s*(?:;|$)")
        .unwrap_or_else(|_| unreachable!("connection string pattern is valid"))
});

/// An ODBC-style `key=value;...` connection string.
///
/// Keys compare case-insensitively. A value may be wrapped in braces to carry
/// `;` or `=`; a literal `}` inside braces is written `}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionString {
    pairs: Vec<(String, String)>,
}

impl ConnectionString {
    /// # Errors
    /// Returns [`CplError::InvalidArgument`] if the string contains text that
    /// is not part of a `key=value` pair.
    pub fn parse(input: &str) -> Result<Self, CplError> {
        let mut pairs = Vec::new();
        let mut last_end = 0;
        for caps in PAIR_RE.captures_iter(input) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.as_str().is_empty() {
                continue;
            }
            check_gap(&input[last_end..whole.start()])?;
            last_end = whole.end();

            let key = caps.get(1).map_or("", |m| m.as_str()).trim();
            let value = match (caps.get(2), caps.get(3)) {
                (Some(braced), _) => braced.as_str().replace("}}", "}"),
                (None, Some(plain)) => plain.as_str().trim().to_owned(),
                (None, None) => String::new(),
            };
            pairs.push((key.to_owned(), value));
        }
        check_gap(&input[last_end..])?;
        Ok(Self { pairs })
    }

    /// Value of the first pair whose key matches any of `keys`.
    #[must_use]
    pub fn get(&self, keys: &[&str]) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| keys.iter().any(|k| key.eq_ignore_ascii_case(k)))
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn dsn(&self) -> Option<&str> {
        self.get(&["DSN"])
    }

    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.get(&["Database", "DB", "DBQ"])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn check_gap(gap: &str) -> Result<(), CplError> {
    if gap.chars().all(|c| c == ';' || c.is_whitespace()) {
        Ok(())
    } else {
        Err(CplError::InvalidArgument(format!(
            "unexpected text in connection string: {gap:?}"
        )))
    }
}

/// Build `DSN=<dsn>;`, rejecting names that would break out of the pair.
///
/// # Errors
/// Returns [`CplError::InvalidArgument`] for an empty name or one containing
/// `;`, `{` or `}`.
pub fn dsn_connection_string(dsn: &str) -> Result<String, CplError> {
    if dsn.is_empty() {
        return Err(CplError::InvalidArgument("empty DSN".into()));
    }
    if dsn.contains([';', '{', '}']) {
        return Err(CplError::InvalidArgument(format!(
            "DSN may not contain ';', '{{' or '}}': {dsn}"
        )));
    }
    Ok(format!("DSN={dsn};"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_braced_values() {
        let parsed =
            ConnectionString::parse("Driver={SQLite3 ODBC};database = /tmp/a b.db; Mode=rw")
                .expect("parse");
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.get(&["driver"]), Some("SQLite3 ODBC"));
        assert_eq!(parsed.database(), Some("/tmp/a b.db"));
        assert_eq!(parsed.get(&["MODE"]), Some("rw"));
        assert_eq!(parsed.dsn(), None);
    }

    #[test]
    fn braces_protect_separators() {
        let parsed = ConnectionString::parse("PWD={a;b=c}}d};DSN=prov").expect("parse");
        assert_eq!(parsed.get(&["pwd"]), Some("a;b=c}d"));
        assert_eq!(parsed.dsn(), Some("prov"));
    }

    #[test]
    fn rejects_stray_text() {
        assert!(ConnectionString::parse("DSN=prov;garbage").is_err());
        assert!(ConnectionString::parse("").expect("empty parses").is_empty());
    }

    #[test]
    fn dsn_validation() {
        assert_eq!(dsn_connection_string("prov").as_deref(), Ok("DSN=prov;"));
        for bad in ["a;b", "{a", "a}", ""] {
            assert!(matches!(
                dsn_connection_string(bad),
                Err(CplError::InvalidArgument(_))
            ));
        }
    }
}
