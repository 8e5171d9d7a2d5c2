//! UPDATE statement builder.

use std::marker::PhantomData;

use crate::db_pool::{DbPool, ExecResult, FromAnyRow};
use crate::dialect::Dialect;
use crate::entry::{Entry, EntryFields};
use crate::error::{Error, Result};
use crate::query_builder::{BindValue, QueryBuilder};

/// Builds `UPDATE <table> SET <assignments> WHERE <conditions>`.
///
/// An update with no WHERE conditions is rejected unless
/// [`allow_update_all`](Self::allow_update_all) was called; binding order is
/// SET assignments first, then WHERE values.
pub struct UpdateBuilder<T: Entry> {
    sets: Vec<(String, BindValue)>,
    filter: Option<QueryBuilder<T>>,
    allow_update_all: bool,
    returning: Vec<String>,
    returning_all: bool,
    quote_identifiers: bool,
    _entry: PhantomData<T>,
}

impl<T: Entry> Default for UpdateBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entry> UpdateBuilder<T> {
    pub fn new() -> Self {
        Self {
            sets: Vec::new(),
            filter: None,
            allow_update_all: false,
            returning: Vec::new(),
            returning_all: false,
            quote_identifiers: false,
            _entry: PhantomData,
        }
    }

    fn set_assignment(&mut self, column: &str, value: BindValue) {
        if let Some(slot) = self.sets.iter_mut().find(|(c, _)| c == column) {
            slot.1 = value;
        } else {
            self.sets.push((column.to_string(), value));
        }
    }

    /// Adds one assignment. The column is validated against `T::columns()`;
    /// the identifier column cannot be assigned.
    pub fn set<V: Into<BindValue>>(mut self, column: &str, value: V) -> Result<Self> {
        if !T::has_column(column) {
            return Err(Error::InvalidColumn(column.to_string()));
        }
        if column == T::id_column() {
            return Err(Error::InvalidQuery(format!(
                "cannot assign the identifier column '{}'",
                column
            )));
        }
        self.set_assignment(column, value.into());
        Ok(self)
    }

    /// Populates assignments from an entity in `T::columns()` order,
    /// skipping the identifier column and columns whose `field_value` is
    /// `None` (patch semantics: absent fields stay untouched).
    pub fn entity(mut self, entity: &T) -> Self
    where
        T: EntryFields,
    {
        for column in T::columns() {
            if *column == T::id_column() {
                continue;
            }
            if let Some(value) = entity.field_value(column) {
                self.set_assignment(column, value);
            }
        }
        self
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

    /// Permits an UPDATE with no WHERE clause, touching every row.
    pub fn allow_update_all(mut self) -> Self {
        self.allow_update_all = true;
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
        if self.sets.is_empty() {
            return Err(Error::InvalidQuery(
                "UPDATE requires at least one assignment".to_string(),
            ));
        }
        let has_conditions = self.filter.as_ref().is_some_and(|f| f.has_conditions());
        if !has_conditions && !self.allow_update_all {
            return Err(Error::InvalidQuery(
                "UPDATE without a WHERE clause; call allow_update_all() to update every row"
                    .to_string(),
            ));
        }
        let mut index = 0usize;
        let assignments: Vec<String> = self
            .sets
            .iter()
            .map(|(c, _)| {
                let token = dialect.placeholder(index);
                index += 1;
                format!("{} = {}", self.ident(dialect, c), token)
            })
            .collect();
        let mut sql = format!(
            "UPDATE {} SET {}",
            self.ident(dialect, T::table_name()),
            assignments.join(", ")
        );
        if has_conditions {
            if let Some(filter) = &self.filter {
                let clause = filter.where_clause(dialect, &mut index, self.quote_identifiers);
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
        }
        sql.push_str(&self.returning_sql(dialect)?);
        Ok(sql)
    }

    /// Bound values: SET assignments in order, then WHERE values in
    /// placeholder order.
    pub fn binds(&self) -> Vec<BindValue> {
        let mut out: Vec<BindValue> = self.sets.iter().map(|(_, v)| v.clone()).collect();
        if let Some(filter) = &self.filter {
            out.extend(filter.binds());
        }
        out
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
