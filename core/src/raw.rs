//! Escape hatch for hand-written SQL.

use crate::db_pool::{DbPool, ExecResult, FromAnyRow};
use crate::error::Result;
use crate::query_builder::BindValue;

/// A hand-written SQL statement with its bound values.
///
/// Nothing is validated or rewritten here: the caller owns placeholder
/// syntax and dialect correctness. Binding still goes through [`BindValue`],
/// so typed values flow the same way as in the builders.
///
/// ```no_run
/// # use sqlxentry::{DbPool, RawQuery};
/// # async fn demo(pool: &DbPool) -> sqlxentry::Result<()> {
/// let touched = RawQuery::new("UPDATE users SET age = age + 1")
///     .append("WHERE last_seen < ?")
///     .bind("2024-01-01")
///     .execute(pool)
///     .await?;
/// # let _ = touched;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RawQuery {
    sql: String,
    binds: Vec<BindValue>,
}

impl RawQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    /// Appends a fragment, separated from the current text by one space.
    pub fn append(mut self, fragment: &str) -> Self {
        if !self.sql.is_empty() && !fragment.is_empty() {
            self.sql.push(' ');
        }
        self.sql.push_str(fragment);
        self
    }

    /// Pushes one bound value; call in placeholder order.
    pub fn bind<V: Into<BindValue>>(mut self, value: V) -> Self {
        self.binds.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn binds(&self) -> &[BindValue] {
        &self.binds
    }

    pub fn bind_count(&self) -> usize {
        self.binds.len()
    }

    // ---------- execution ----------

    pub async fn execute(&self, pool: &DbPool) -> Result<ExecResult> {
        pool.execute(&self.sql, &self.binds).await
    }

    pub async fn fetch_all<R>(&self, pool: &DbPool) -> Result<Vec<R>>
    where
        R: FromAnyRow + Send + Unpin,
    {
        pool.fetch_all(&self.sql, &self.binds).await
    }

    pub async fn fetch_optional<R>(&self, pool: &DbPool) -> Result<Option<R>>
    where
        R: FromAnyRow + Send + Unpin,
    {
        pool.fetch_optional(&self.sql, &self.binds).await
    }

    /// Expects exactly one row; zero rows is [`Error::NotFound`].
    ///
    /// [`Error::NotFound`]: crate::error::Error::NotFound
    pub async fn fetch_one<R>(&self, pool: &DbPool) -> Result<R>
    where
        R: FromAnyRow + Send + Unpin,
    {
        pool.fetch_one(&self.sql, &self.binds).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_inserts_single_space() {
        let raw = RawQuery::new("SELECT * FROM users")
            .append("WHERE age > ?")
            .append("ORDER BY name");
        assert_eq!(raw.sql(), "SELECT * FROM users WHERE age > ? ORDER BY name");
    }

    #[test]
    fn test_append_to_empty() {
        let raw = RawQuery::new("").append("SELECT 1");
        assert_eq!(raw.sql(), "SELECT 1");
    }

    #[test]
    fn test_binds_keep_call_order() {
        let raw = RawQuery::new("SELECT * FROM users WHERE age > ? AND name = ?")
            .bind(18)
            .bind("ali");
        assert_eq!(raw.bind_count(), 2);
        assert_eq!(
            raw.binds(),
            &[BindValue::Int64(18), BindValue::String("ali".into())]
        );
    }

    #[cfg(feature = "sqlite")]
    mod sqlite {
        use super::*;

        #[derive(sqlx::FromRow)]
        struct Row {
            body: String,
        }

        #[tokio::test]
        async fn test_round_trip_against_sqlite() {
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .unwrap();
            let pool = DbPool::from_sqlite_pool(pool);

            RawQuery::new("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL)")
                .execute(&pool)
                .await
                .unwrap();
            RawQuery::new("INSERT INTO notes (body) VALUES (?), (?)")
                .bind("first")
                .bind("second")
                .execute(&pool)
                .await
                .unwrap();

            let rows: Vec<Row> = RawQuery::new("SELECT body FROM notes")
                .append("WHERE body LIKE ?")
                .bind("f%")
                .fetch_all(&pool)
                .await
                .unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].body, "first");
        }
    }
}
