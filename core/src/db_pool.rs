//! Runtime-dispatched connection pooling over the enabled sqlx backends.
//!
//! `DbPool` holds one reference-counted pool for whichever backend the
//! process connected to, plus the [`Dialect`] derived from the URL. Every
//! statement funnels through here, so each backend has exactly one bind and
//! one execute path.

#[cfg(any(feature = "mysql", feature = "postgres", feature = "sqlite"))]
use sqlx::Pool;
#[cfg(any(feature = "mysql", feature = "postgres", feature = "sqlite"))]
use std::sync::Arc;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::query_builder::BindValue;

/// Applies one [`BindValue`] to an sqlx `Query`, `QueryAs` or `QueryScalar`.
/// Exported for callers that drop down to raw sqlx but still carry
/// [`BindValue`] lists.
#[macro_export]
macro_rules! bind_value {
    ($query:expr, $bind:expr) => {
        match $bind {
            $crate::query_builder::BindValue::String(v) => {
                $query = $query.bind(v);
            }
            $crate::query_builder::BindValue::Int64(v) => {
                $query = $query.bind(v);
            }
            $crate::query_builder::BindValue::Int32(v) => {
                $query = $query.bind(v);
            }
            $crate::query_builder::BindValue::Int16(v) => {
                $query = $query.bind(v);
            }
            $crate::query_builder::BindValue::Float64(v) => {
                $query = $query.bind(v);
            }
            $crate::query_builder::BindValue::Float32(v) => {
                $query = $query.bind(v);
            }
            $crate::query_builder::BindValue::Bool(v) => {
                $query = $query.bind(v);
            }
            $crate::query_builder::BindValue::Bytes(v) => {
                $query = $query.bind(v);
            }
            $crate::query_builder::BindValue::DateTime(v) => {
                $query = $query.bind(v);
            }
            $crate::query_builder::BindValue::Null => {
                $query = $query.bind(Option::<String>::None);
            }
        }
    };
}

#[cfg(feature = "mysql")]
pub trait FromMySqlRow: for<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> {}
#[cfg(feature = "mysql")]
impl<T> FromMySqlRow for T where T: for<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> {}

#[cfg(not(feature = "mysql"))]
pub trait FromMySqlRow {}
#[cfg(not(feature = "mysql"))]
impl<T> FromMySqlRow for T {}

#[cfg(feature = "postgres")]
pub trait FromPgRow: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> {}
#[cfg(feature = "postgres")]
impl<T> FromPgRow for T where T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> {}

#[cfg(not(feature = "postgres"))]
pub trait FromPgRow {}
#[cfg(not(feature = "postgres"))]
impl<T> FromPgRow for T {}

#[cfg(feature = "sqlite")]
pub trait FromSqliteRow: for<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> {}
#[cfg(feature = "sqlite")]
impl<T> FromSqliteRow for T where T: for<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> {}

#[cfg(not(feature = "sqlite"))]
pub trait FromSqliteRow {}
#[cfg(not(feature = "sqlite"))]
impl<T> FromSqliteRow for T {}

/// Row mapping across every enabled backend.
///
/// Blanket-implemented: a type implementing `sqlx::FromRow` for each enabled
/// backend's row satisfies it automatically, and disabled backends demand
/// nothing.
pub trait FromAnyRow: FromMySqlRow + FromPgRow + FromSqliteRow {}
impl<T> FromAnyRow for T where T: FromMySqlRow + FromPgRow + FromSqliteRow {}

/// Outcome of a mutation statement.
#[derive(Debug, Clone, Copy)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Auto-increment id reported by MySQL/SQLite, `None` when the backend
    /// reported none (PostgreSQL never reports one; use `RETURNING`).
    pub last_insert_id: Option<i64>,
}

/// Runtime-dispatched handle over the active backend's connection pool.
///
/// Cloning is cheap; the inner pool is reference counted and safe to share
/// across tasks. Each call leases one pooled connection for the statement's
/// duration.
#[derive(Debug, Clone)]
pub struct DbPool {
    dialect: Dialect,
    #[cfg(feature = "mysql")]
    mysql: Option<Arc<Pool<sqlx::MySql>>>,
    #[cfg(feature = "postgres")]
    pg: Option<Arc<Pool<sqlx::Postgres>>>,
    #[cfg(feature = "sqlite")]
    sqlite: Option<Arc<Pool<sqlx::Sqlite>>>,
}

impl DbPool {
    fn empty(dialect: Dialect) -> Self {
        Self {
            dialect,
            #[cfg(feature = "mysql")]
            mysql: None,
            #[cfg(feature = "postgres")]
            pg: None,
            #[cfg(feature = "sqlite")]
            sqlite: None,
        }
    }

    /// Connects with default pool options, deriving the dialect from the
    /// URL scheme. Use the `from_*_pool` constructors to wrap a pool built
    /// with custom options.
    pub async fn connect(url: &str) -> Result<Self> {
        let dialect = Dialect::from_url(url)?;
        let mut this = Self::empty(dialect);
        match dialect {
            #[cfg(feature = "mysql")]
            Dialect::MySql => {
                this.mysql = Some(Arc::new(Pool::<sqlx::MySql>::connect(url).await?));
            }
            #[cfg(feature = "postgres")]
            Dialect::Postgres => {
                this.pg = Some(Arc::new(Pool::<sqlx::Postgres>::connect(url).await?));
            }
            #[cfg(feature = "sqlite")]
            Dialect::Sqlite => {
                this.sqlite = Some(Arc::new(Pool::<sqlx::Sqlite>::connect(url).await?));
            }
            #[allow(unreachable_patterns)]
            _ => return Err(Error::PoolUnavailable),
        }
        Ok(this)
    }

    #[cfg(feature = "mysql")]
    pub fn from_mysql_pool(pool: Pool<sqlx::MySql>) -> Self {
        let mut this = Self::empty(Dialect::MySql);
        this.mysql = Some(Arc::new(pool));
        this
    }

    #[cfg(feature = "postgres")]
    pub fn from_postgres_pool(pool: Pool<sqlx::Postgres>) -> Self {
        let mut this = Self::empty(Dialect::Postgres);
        this.pg = Some(Arc::new(pool));
        this
    }

    #[cfg(feature = "sqlite")]
    pub fn from_sqlite_pool(pool: Pool<sqlx::Sqlite>) -> Self {
        let mut this = Self::empty(Dialect::Sqlite);
        this.sqlite = Some(Arc::new(pool));
        this
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[cfg(feature = "mysql")]
    pub fn mysql_pool(&self) -> Option<&Pool<sqlx::MySql>> {
        self.mysql.as_deref()
    }

    #[cfg(feature = "postgres")]
    pub fn pg_pool(&self) -> Option<&Pool<sqlx::Postgres>> {
        self.pg.as_deref()
    }

    #[cfg(feature = "sqlite")]
    pub fn sqlite_pool(&self) -> Option<&Pool<sqlx::Sqlite>> {
        self.sqlite.as_deref()
    }

    /// Runs a mutation, binding `binds` in order.
    pub async fn execute(&self, sql: &str, binds: &[BindValue]) -> Result<ExecResult> {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql, bind_count = binds.len(), "executing statement");
        match self.dialect {
            #[cfg(feature = "mysql")]
            Dialect::MySql => {
                let pool = self.mysql.as_deref().ok_or(Error::PoolUnavailable)?;
                let mut query = sqlx::query(sql);
                for bind in binds {
                    bind_value!(query, bind);
                }
                let done = query.execute(pool).await?;
                let id = done.last_insert_id();
                Ok(ExecResult {
                    rows_affected: done.rows_affected(),
                    last_insert_id: if id == 0 { None } else { Some(id as i64) },
                })
            }
            #[cfg(feature = "postgres")]
            Dialect::Postgres => {
                let pool = self.pg.as_deref().ok_or(Error::PoolUnavailable)?;
                let mut query = sqlx::query(sql);
                for bind in binds {
                    bind_value!(query, bind);
                }
                let done = query.execute(pool).await?;
                Ok(ExecResult {
                    rows_affected: done.rows_affected(),
                    last_insert_id: None,
                })
            }
            #[cfg(feature = "sqlite")]
            Dialect::Sqlite => {
                let pool = self.sqlite.as_deref().ok_or(Error::PoolUnavailable)?;
                let mut query = sqlx::query(sql);
                for bind in binds {
                    bind_value!(query, bind);
                }
                let done = query.execute(pool).await?;
                let id = done.last_insert_rowid();
                Ok(ExecResult {
                    rows_affected: done.rows_affected(),
                    last_insert_id: if id == 0 { None } else { Some(id) },
                })
            }
            #[allow(unreachable_patterns)]
            _ => Err(Error::PoolUnavailable),
        }
    }

    /// Runs a query and maps every row into `T`.
    pub async fn fetch_all<T>(&self, sql: &str, binds: &[BindValue]) -> Result<Vec<T>>
    where
        T: FromAnyRow + Send + Unpin,
    {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql, bind_count = binds.len(), "fetching rows");
        match self.dialect {
            #[cfg(feature = "mysql")]
            Dialect::MySql => {
                let pool = self.mysql.as_deref().ok_or(Error::PoolUnavailable)?;
                let mut query = sqlx::query_as::<_, T>(sql);
                for bind in binds {
                    bind_value!(query, bind);
                }
                Ok(query.fetch_all(pool).await?)
            }
            #[cfg(feature = "postgres")]
            Dialect::Postgres => {
                let pool = self.pg.as_deref().ok_or(Error::PoolUnavailable)?;
                let mut query = sqlx::query_as::<_, T>(sql);
                for bind in binds {
                    bind_value!(query, bind);
                }
                Ok(query.fetch_all(pool).await?)
            }
            #[cfg(feature = "sqlite")]
            Dialect::Sqlite => {
                let pool = self.sqlite.as_deref().ok_or(Error::PoolUnavailable)?;
                let mut query = sqlx::query_as::<_, T>(sql);
                for bind in binds {
                    bind_value!(query, bind);
                }
                Ok(query.fetch_all(pool).await?)
            }
            #[allow(unreachable_patterns)]
            _ => Err(Error::PoolUnavailable),
        }
    }

    /// Runs a query expected to match at most one row.
    pub async fn fetch_optional<T>(&self, sql: &str, binds: &[BindValue]) -> Result<Option<T>>
    where
        T: FromAnyRow + Send + Unpin,
    {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql, bind_count = binds.len(), "fetching optional row");
        match self.dialect {
            #[cfg(feature = "mysql")]
            Dialect::MySql => {
                let pool = self.mysql.as_deref().ok_or(Error::PoolUnavailable)?;
                let mut query = sqlx::query_as::<_, T>(sql);
                for bind in binds {
                    bind_value!(query, bind);
                }
                Ok(query.fetch_optional(pool).await?)
            }
            #[cfg(feature = "postgres")]
            Dialect::Postgres => {
                let pool = self.pg.as_deref().ok_or(Error::PoolUnavailable)?;
                let mut query = sqlx::query_as::<_, T>(sql);
                for bind in binds {
                    bind_value!(query, bind);
                }
                Ok(query.fetch_optional(pool).await?)
            }
            #[cfg(feature = "sqlite")]
            Dialect::Sqlite => {
                let pool = self.sqlite.as_deref().ok_or(Error::PoolUnavailable)?;
                let mut query = sqlx::query_as::<_, T>(sql);
                for bind in binds {
                    bind_value!(query, bind);
                }
                Ok(query.fetch_optional(pool).await?)
            }
            #[allow(unreachable_patterns)]
            _ => Err(Error::PoolUnavailable),
        }
    }

    /// Like [`fetch_optional`](Self::fetch_optional) but a missing row is
    /// [`Error::NotFound`]. Driver failures stay [`Error::Database`]; the
    /// two are never conflated.
    pub async fn fetch_one<T>(&self, sql: &str, binds: &[BindValue]) -> Result<T>
    where
        T: FromAnyRow + Send + Unpin,
    {
        self.fetch_optional(sql, binds).await?.ok_or(Error::NotFound)
    }

    /// Runs a `SELECT COUNT(*)`-shaped query returning a single integer.
    pub async fn fetch_count(&self, sql: &str, binds: &[BindValue]) -> Result<u64> {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql, bind_count = binds.len(), "fetching count");
        match self.dialect {
            #[cfg(feature = "mysql")]
            Dialect::MySql => {
                let pool = self.mysql.as_deref().ok_or(Error::PoolUnavailable)?;
                let mut query = sqlx::query_scalar::<_, i64>(sql);
                for bind in binds {
                    bind_value!(query, bind);
                }
                Ok(query.fetch_one(pool).await? as u64)
            }
            #[cfg(feature = "postgres")]
            Dialect::Postgres => {
                let pool = self.pg.as_deref().ok_or(Error::PoolUnavailable)?;
                let mut query = sqlx::query_scalar::<_, i64>(sql);
                for bind in binds {
                    bind_value!(query, bind);
                }
                Ok(query.fetch_one(pool).await? as u64)
            }
            #[cfg(feature = "sqlite")]
            Dialect::Sqlite => {
                let pool = self.sqlite.as_deref().ok_or(Error::PoolUnavailable)?;
                let mut query = sqlx::query_scalar::<_, i64>(sql);
                for bind in binds {
                    bind_value!(query, bind);
                }
                Ok(query.fetch_one(pool).await? as u64)
            }
            #[allow(unreachable_patterns)]
            _ => Err(Error::PoolUnavailable),
        }
    }
}
