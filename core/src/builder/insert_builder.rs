//! INSERT statement builder.

use std::marker::PhantomData;

use crate::db_pool::{DbPool, ExecResult, FromAnyRow};
use crate::dialect::Dialect;
use crate::entry::{Entry, EntryFields};
use crate::error::{Error, Result};
use crate::query_builder::BindValue;

/// Builds `INSERT INTO <table> (<columns>) VALUES (<placeholders>)`.
///
/// Columns render in first-set order; re-setting a column replaces its value
/// in place. Binding order equals column order.
pub struct InsertBuilder<T: Entry> {
    values: Vec<(String, BindValue)>,
    returning: Vec<String>,
    returning_all: bool,
    quote_identifiers: bool,
    _entry: PhantomData<T>,
}

impl<T: Entry> Default for InsertBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entry> InsertBuilder<T> {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            returning: Vec::new(),
            returning_all: false,
            quote_identifiers: false,
            _entry: PhantomData,
        }
    }

    fn set_value(&mut self, column: &str, value: BindValue) {
        if let Some(slot) = self.values.iter_mut().find(|(c, _)| c == column) {
            slot.1 = value;
        } else {
            self.values.push((column.to_string(), value));
        }
    }

    /// Sets one column. The column is validated against `T::columns()`.
    pub fn value<V: Into<BindValue>>(mut self, column: &str, value: V) -> Result<Self> {
        if !T::has_column(column) {
            return Err(Error::InvalidColumn(column.to_string()));
        }
        self.set_value(column, value.into());
        Ok(self)
    }

    /// Populates columns from an entity in `T::columns()` order. Columns
    /// whose `field_value` is `None` are omitted so server defaults apply;
    /// that includes an absent identifier.
    pub fn entity(mut self, entity: &T) -> Self
    where
        T: EntryFields,
    {
        for column in T::columns() {
            if let Some(value) = entity.field_value(column) {
                self.set_value(column, value);
            }
        }
        self
    }

    /// Requests `RETURNING` for the named (validated) columns. Rejected at
    /// render time on databases without RETURNING support.
    pub fn returning(mut self, columns: &[&str]) -> Result<Self> {
        for column in columns {
            if !T::has_column(column) {
                return Err(Error::InvalidColumn(column.to_string()));
            }
            self.returning.push(column.to_string());
        }
        Ok(self)
    }

    /// Requests `RETURNING *`.
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

    fn ident(&self, dialect: Dialect, name: &str) -> String {
        if self.quote_identifiers {
            dialect.quote_identifier(name)
        } else {
            name.to_string()
        }
    }

    pub fn to_sql(&self, dialect: Dialect) -> Result<String> {
        if self.values.is_empty() {
            return Err(Error::InvalidQuery(
                "INSERT requires at least one column".to_string(),
            ));
        }
        let columns: Vec<String> = self
            .values
            .iter()
            .map(|(c, _)| self.ident(dialect, c))
            .collect();
        let mut index = 0usize;
        let placeholders: Vec<String> = self
            .values
            .iter()
            .map(|_| {
                let token = dialect.placeholder(index);
                index += 1;
                token
            })
            .collect();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.ident(dialect, T::table_name()),
            columns.join(", "),
            placeholders.join(", ")
        );
        sql.push_str(&self.returning_sql(dialect)?);
        Ok(sql)
    }

    /// Bound values in column order.
    pub fn binds(&self) -> Vec<BindValue> {
        self.values.iter().map(|(_, v)| v.clone()).collect()
    }

    // ---------- execution ----------

    pub async fn execute(&self, pool: &DbPool) -> Result<ExecResult> {
        let sql = self.to_sql(pool.dialect())?;
        pool.execute(&sql, &self.binds()).await
    }

    /// Executes and maps the single `RETURNING` row. Fails with
    /// [`Error::InvalidQuery`] when no RETURNING clause was configured.
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
