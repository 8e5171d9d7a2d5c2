//! Database dialect rules: placeholder tokens, identifier quoting and
//! capability probes for the three supported families.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Recognizes the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Result<Self> {
        if url.starts_with("mysql://") || url.starts_with("mariadb://") {
            Ok(Dialect::MySql)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Dialect::Postgres)
        } else if url.starts_with("sqlite://") || url.starts_with("sqlite:") {
            Ok(Dialect::Sqlite)
        } else {
            Err(Error::UnsupportedUrl(url.to_string()))
        }
    }

    /// Placeholder token for the zero-based parameter `index`.
    ///
    /// MySQL and SQLite take positional `?`; PostgreSQL numbers its
    /// placeholders starting at `$1`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${}", index + 1),
        }
    }

    /// Wraps `name` in the dialect's identifier-quoting character.
    ///
    /// Never applied implicitly; builders call this only after the caller
    /// opted in via `quote_identifiers()`.
    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", name),
        }
    }

    /// Whether mutation statements may carry a `RETURNING` clause.
    pub fn supports_returning(&self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::Sqlite)
    }
}
