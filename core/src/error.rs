use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A referenced column is not part of the entry's column list.
    #[error("Invalid column: {0}")]
    InvalidColumn(String),
    /// The statement is structurally invalid; rejected before any I/O.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// An id-keyed lookup completed successfully but matched no row.
    #[error("Entity not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Unsupported database URL: {0}")]
    UnsupportedUrl(String),
    #[error("No connection pool available for the active database")]
    PoolUnavailable,
}

pub type Result<T> = std::result::Result<T, Error>;
