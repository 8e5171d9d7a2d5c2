//! DELETE statement builder.

use std::marker::PhantomData;

use crate::db_pool::{DbPool, ExecResult, FromAnyRow};
use crate::dialect::Dialect;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::query_builder::{BindValue, QueryBuilder};

/// Builds `DELETE FROM <table> WHERE <conditions>`.
///
/// A delete with no WHERE conditions is rejected unless
/// [`allow_delete_all`](Self::allow_delete_all) was called.
pub struct DeleteBuilder<T: Entry> {
    filter: Option<QueryBuilder<T>>,
    allow_delete_all: bool,
    returning: Vec<String>,
    returning_all: bool,
    quote_identifiers: bool,
    _entry: PhantomData<T>,
}

impl<T: Entry> Default for DeleteBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entry> DeleteBuilder<T> {
    pub fn new() -> Self {
        Self {
            filter: None,
            allow_delete_all: false,
            returning: Vec::new(),
            returning_all: false,
            quote_identifiers: false,
            _entry: PhantomData,
        }
    }

    /// Builds the WHERE conditions through a nested [`QueryBuilder`].
    /// Replaces any previously configured filter.
    pub fn filter<F>(mut self, f: F) -> Result<Self>
    where
        F: FnOnce(QueryBuilder<T>) -> Result<QueryBuilder<T>>,
    {
        self.filter = Some(f(QueryBuilder::new())?);
        Ok(self)
    }

    /// Permits a DELETE with no WHERE clause, removing every row.
    pub fn allow_delete_all(mut self) -> Self {
        self.allow_delete_all = true;
        self
    }

    /// Requests `RETURNING` for the named (validated) columns.
    pub fn returning(mut self, columns: &[&str]) -> Result<Self> {
        for column in columns {
            if !T::has_column(column) {
                return Err(Error::InvalidColumn(column.to_string()));
            }
            self.returning.push(column.to_string());
        }
        Ok(self)
    }

    pub fn returning_all(mut self) -> Self {
        self.returning_all = true;
        self
    }

    pub fn quote_identifiers(mut self) -> Self {
        self.quote_identifiers = true;
        self
    }

    fn has_returning(&self) -> bool {
        self.returning_all || !self.returning.is_empty()
    }

    fn ident(&self, dialect: Dialect, name: &str) -> String {
        if self.quote_identifiers {
            dialect.quote_identifier(name)
        } else {
            name.to_string()
        }
    }

    fn returning_sql(&self, dialect: Dialect) -> Result<String> {
        if !self.has_returning() {
            return Ok(String::new());
        }
        if !dialect.supports_returning() {
            return Err(Error::InvalidQuery(
                "RETURNING is not supported by this database".to_string(),
            ));
        }
        if self.returning_all {
            return Ok(" RETURNING *".to_string());
        }
        let columns: Vec<String> = self
            .returning
            .iter()
            .map(|c| self.ident(dialect, c))
            .collect();
        Ok(format!(" RETURNING {}", columns.join(", ")))
    }

    pub fn to_sql(&self, dialect: Dialect) -> Result<String> {
        let has_conditions = self.filter.as_ref().is_some_and(|f| f.has_conditions());
        if !has_conditions && !self.allow_delete_all {
            return Err(Error::InvalidQuery(
                "DELETE without a WHERE clause; call allow_delete_all() to delete every row"
                    .to_string(),
            ));
        }
        let mut sql = format!("DELETE FROM {}", self.ident(dialect, T::table_name()));
        if has_conditions {
            if let Some(filter) = &self.filter {
                let mut index = 0usize;
                let clause = filter.where_clause(dialect, &mut index, self.quote_identifiers);
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
        }
        sql.push_str(&self.returning_sql(dialect)?);
        Ok(sql)
    }

    pub fn binds(&self) -> Vec<BindValue> {
        self.filter.as_ref().map(|f| f.binds()).unwrap_or_default()
    }

    // ---------- execution ----------

    pub async fn execute(&self, pool: &DbPool) -> Result<ExecResult> {
        let sql = self.to_sql(pool.dialect())?;
        pool.execute(&sql, &self.binds()).await
    }

    /// Executes and maps the single `RETURNING` row.
    pub async fn fetch_one<R>(&self, pool: &DbPool) -> Result<R>
    where
        R: FromAnyRow + Send + Unpin,
    {
        if !self.has_returning() {
            return Err(Error::InvalidQuery(
                "fetch_one requires a RETURNING clause".to_string(),
            ));
        }
        let sql = self.to_sql(pool.dialect())?;
        pool.fetch_one(&sql, &self.binds()).await
    }

    pub async fn fetch_all<R>(&self, pool: &DbPool) -> Result<Vec<R>>
    where
        R: FromAnyRow + Send + Unpin,
    {
        if !self.has_returning() {
            return Err(Error::InvalidQuery(
                "fetch_all requires a RETURNING clause".to_string(),
            ));
        }
        let sql = self.to_sql(pool.dialect())?;
        pool.fetch_all(&sql, &self.binds()).await
    }
}
