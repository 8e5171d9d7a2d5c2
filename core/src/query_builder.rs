//! Dynamic SELECT construction: bind values, the condition tree, grouping
//! and dialect-aware clause rendering.

use std::marker::PhantomData;

use crate::db_pool::{DbPool, FromAnyRow};
use crate::dialect::Dialect;
use crate::entry::{Direction, Entry};
use crate::error::{Error, Result};

/// One bound parameter value.
///
/// The closed set of types a statement can bind. Everything a builder
/// accepts converts into this first, so binding takes one code path per
/// backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    String(String),
    Int64(i64),
    Int32(i32),
    Int16(i16),
    Float64(f64),
    Float32(f32),
    Bool(bool),
    Bytes(Vec<u8>),
    DateTime(chrono::DateTime<chrono::Utc>),
    Null,
}

impl From<String> for BindValue {
    fn from(v: String) -> Self {
        BindValue::String(v)
    }
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        BindValue::String(v.to_string())
    }
}

impl From<i64> for BindValue {
    fn from(v: i64) -> Self {
        BindValue::Int64(v)
    }
}

impl From<i32> for BindValue {
    fn from(v: i32) -> Self {
        BindValue::Int32(v)
    }
}

impl From<i16> for BindValue {
    fn from(v: i16) -> Self {
        BindValue::Int16(v)
    }
}

impl From<f64> for BindValue {
    fn from(v: f64) -> Self {
        BindValue::Float64(v)
    }
}

impl From<f32> for BindValue {
    fn from(v: f32) -> Self {
        BindValue::Float32(v)
    }
}

impl From<bool> for BindValue {
    fn from(v: bool) -> Self {
        BindValue::Bool(v)
    }
}

impl From<Vec<u8>> for BindValue {
    fn from(v: Vec<u8>) -> Self {
        BindValue::Bytes(v)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for BindValue {
    fn from(v: chrono::DateTime<chrono::Utc>) -> Self {
        BindValue::DateTime(v)
    }
}

impl<T: Into<BindValue>> From<Option<T>> for BindValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => BindValue::Null,
        }
    }
}

/// JSON scalars bind directly; arrays and objects fall back to their JSON
/// text. Handy when filter values arrive from an HTTP payload.
impl From<serde_json::Value> for BindValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => BindValue::Null,
            serde_json::Value::Bool(b) => BindValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    BindValue::Int64(i)
                } else {
                    BindValue::Float64(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => BindValue::String(s),
            other => BindValue::String(other.to_string()),
        }
    }
}

/// Logical connective joining a condition to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    fn keyword(&self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }
}

/// A comparison operator together with its bound value(s).
#[derive(Debug, Clone)]
pub enum Operator {
    Eq(BindValue),
    Ne(BindValue),
    Gt(BindValue),
    Gte(BindValue),
    Lt(BindValue),
    Lte(BindValue),
    Like(BindValue),
    /// Case-insensitive LIKE. Renders `ILIKE` on PostgreSQL; MySQL and
    /// SQLite already compare case-insensitively under their default
    /// collations, so plain `LIKE` is emitted there.
    ILike(BindValue),
    In(Vec<BindValue>),
    NotIn(Vec<BindValue>),
    IsNull,
    IsNotNull,
    Between(BindValue, BindValue),
}

fn next_placeholder(dialect: Dialect, index: &mut usize) -> String {
    let token = dialect.placeholder(*index);
    *index += 1;
    token
}

impl Operator {
    /// Renders `<operator> <placeholder(s)>`, advancing `index` once per
    /// emitted placeholder.
    fn to_sql(&self, dialect: Dialect, index: &mut usize) -> String {
        match self {
            Operator::Eq(_) => format!("= {}", next_placeholder(dialect, index)),
            Operator::Ne(_) => format!("!= {}", next_placeholder(dialect, index)),
            Operator::Gt(_) => format!("> {}", next_placeholder(dialect, index)),
            Operator::Gte(_) => format!(">= {}", next_placeholder(dialect, index)),
            Operator::Lt(_) => format!("< {}", next_placeholder(dialect, index)),
            Operator::Lte(_) => format!("<= {}", next_placeholder(dialect, index)),
            Operator::Like(_) => format!("LIKE {}", next_placeholder(dialect, index)),
            Operator::ILike(_) => match dialect {
                Dialect::Postgres => format!("ILIKE {}", next_placeholder(dialect, index)),
                Dialect::MySql | Dialect::Sqlite => {
                    format!("LIKE {}", next_placeholder(dialect, index))
                }
            },
            Operator::In(values) => {
                let tokens: Vec<String> = values
                    .iter()
                    .map(|_| next_placeholder(dialect, index))
                    .collect();
                format!("IN ({})", tokens.join(", "))
            }
            Operator::NotIn(values) => {
                let tokens: Vec<String> = values
                    .iter()
                    .map(|_| next_placeholder(dialect, index))
                    .collect();
                format!("NOT IN ({})", tokens.join(", "))
            }
            Operator::IsNull => "IS NULL".to_string(),
            Operator::IsNotNull => "IS NOT NULL".to_string(),
            Operator::Between(_, _) => format!(
                "BETWEEN {} AND {}",
                next_placeholder(dialect, index),
                next_placeholder(dialect, index)
            ),
        }
    }

    fn collect_binds(&self, out: &mut Vec<BindValue>) {
        match self {
            Operator::Eq(v)
            | Operator::Ne(v)
            | Operator::Gt(v)
            | Operator::Gte(v)
            | Operator::Lt(v)
            | Operator::Lte(v)
            | Operator::Like(v)
            | Operator::ILike(v) => out.push(v.clone()),
            Operator::In(values) | Operator::NotIn(values) => {
                out.extend(values.iter().cloned());
            }
            Operator::Between(low, high) => {
                out.push(low.clone());
                out.push(high.clone());
            }
            Operator::IsNull | Operator::IsNotNull => {}
        }
    }
}

/// One node of the condition tree.
pub enum Condition<T: Entry> {
    /// `column <operator>`, joined to the previous sibling by the stored
    /// connective.
    Leaf(String, Operator, Connective),
    /// A parenthesized sub-tree.
    Group(Box<QueryBuilder<T>>, Connective),
}

// manual impl: the entry type itself need not be Clone
impl<T: Entry> Clone for Condition<T> {
    fn clone(&self) -> Self {
        match self {
            Condition::Leaf(column, op, connective) => {
                Condition::Leaf(column.clone(), op.clone(), *connective)
            }
            Condition::Group(group, connective) => Condition::Group(group.clone(), *connective),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: String,
    on: String,
}

#[derive(Debug, Clone)]
enum SelectItem {
    /// Validated column; subject to identifier quoting.
    Column(String),
    /// Opaque expression (aggregates, computed columns); passed through.
    Raw(String),
}

/// Fluent, validated SELECT builder for an [`Entry`] type.
///
/// Every column-referencing call checks the name against `T::columns()` and
/// fails with [`Error::InvalidColumn`] before any I/O. Rendering is
/// per-dialect and side-effect free; [`binds`](Self::binds) returns values
/// in exactly the order their placeholders appear in the rendered text.
pub struct QueryBuilder<T: Entry> {
    select_items: Vec<SelectItem>,
    distinct: bool,
    joins: Vec<Join>,
    conditions: Vec<Condition<T>>,
    pending: Connective,
    group_by: Vec<String>,
    having: Vec<String>,
    order_by: Vec<(String, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
    quote_identifiers: bool,
    _entry: PhantomData<T>,
}

// manual impl for the same reason as Condition
impl<T: Entry> Clone for QueryBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            select_items: self.select_items.clone(),
            distinct: self.distinct,
            joins: self.joins.clone(),
            conditions: self.conditions.clone(),
            pending: self.pending,
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            quote_identifiers: self.quote_identifiers,
            _entry: PhantomData,
        }
    }
}

impl<T: Entry> Default for QueryBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn render_ident(dialect: Dialect, name: &str, quote: bool) -> String {
    if quote {
        dialect.quote_identifier(name)
    } else {
        name.to_string()
    }
}

impl<T: Entry> QueryBuilder<T> {
    pub fn new() -> Self {
        Self {
            select_items: Vec::new(),
            distinct: false,
            joins: Vec::new(),
            conditions: Vec::new(),
            pending: Connective::And,
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            quote_identifiers: false,
            _entry: PhantomData,
        }
    }

    fn check_column(column: &str) -> Result<()> {
        if T::has_column(column) {
            Ok(())
        } else {
            Err(Error::InvalidColumn(column.to_string()))
        }
    }

    // ---------- projection ----------

    /// Adds validated columns to the projection. With no projection
    /// configured the builder selects `*`.
    pub fn select(mut self, columns: &[&str]) -> Result<Self> {
        for column in columns {
            Self::check_column(column)?;
            self.select_items.push(SelectItem::Column(column.to_string()));
        }
        Ok(self)
    }

    /// Adds an opaque expression to the projection, e.g. `COUNT(*) AS total`.
    /// Not validated and never quoted.
    pub fn select_raw(mut self, expr: &str) -> Self {
        self.select_items.push(SelectItem::Raw(expr.to_string()));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ---------- joins ----------

    fn join(mut self, kind: JoinKind, table: &str, on: &str) -> Self {
        self.joins.push(Join {
            kind,
            table: table.to_string(),
            on: on.to_string(),
        });
        self
    }

    /// `INNER JOIN table ON on`. The joined table and the ON predicate are
    /// opaque text; they are not validated or rewritten.
    pub fn inner_join(self, table: &str, on: &str) -> Self {
        self.join(JoinKind::Inner, table, on)
    }

    pub fn left_join(self, table: &str, on: &str) -> Self {
        self.join(JoinKind::Left, table, on)
    }

    pub fn right_join(self, table: &str, on: &str) -> Self {
        self.join(JoinKind::Right, table, on)
    }

    pub fn full_join(self, table: &str, on: &str) -> Self {
        self.join(JoinKind::Full, table, on)
    }

    // ---------- predicates ----------

    fn push_condition(mut self, column: &str, op: Operator) -> Result<Self> {
        Self::check_column(column)?;
        let connective = self.pending;
        self.pending = Connective::And;
        self.conditions
            .push(Condition::Leaf(column.to_string(), op, connective));
        Ok(self)
    }

    pub fn where_eq<V: Into<BindValue>>(self, column: &str, value: V) -> Result<Self> {
        self.push_condition(column, Operator::Eq(value.into()))
    }

    pub fn where_ne<V: Into<BindValue>>(self, column: &str, value: V) -> Result<Self> {
        self.push_condition(column, Operator::Ne(value.into()))
    }

    pub fn where_gt<V: Into<BindValue>>(self, column: &str, value: V) -> Result<Self> {
        self.push_condition(column, Operator::Gt(value.into()))
    }

    pub fn where_gte<V: Into<BindValue>>(self, column: &str, value: V) -> Result<Self> {
        self.push_condition(column, Operator::Gte(value.into()))
    }

    pub fn where_lt<V: Into<BindValue>>(self, column: &str, value: V) -> Result<Self> {
        self.push_condition(column, Operator::Lt(value.into()))
    }

    pub fn where_lte<V: Into<BindValue>>(self, column: &str, value: V) -> Result<Self> {
        self.push_condition(column, Operator::Lte(value.into()))
    }

    /// The pattern is bound exactly as supplied; `%` and `_` placement is
    /// the caller's concern.
    pub fn where_like<V: Into<BindValue>>(self, column: &str, pattern: V) -> Result<Self> {
        self.push_condition(column, Operator::Like(pattern.into()))
    }

    /// Case-insensitive variant of [`where_like`](Self::where_like); see
    /// [`Operator::ILike`] for the per-dialect rendering.
    pub fn where_ilike<V: Into<BindValue>>(self, column: &str, pattern: V) -> Result<Self> {
        self.push_condition(column, Operator::ILike(pattern.into()))
    }

    /// Fails with [`Error::InvalidQuery`] when `values` is empty; `IN ()`
    /// is not valid SQL.
    pub fn where_in<V: Into<BindValue>>(self, column: &str, values: Vec<V>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::InvalidQuery(format!(
                "IN on column '{}' requires at least one value",
                column
            )));
        }
        let values = values.into_iter().map(Into::into).collect();
        self.push_condition(column, Operator::In(values))
    }

    pub fn where_not_in<V: Into<BindValue>>(self, column: &str, values: Vec<V>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::InvalidQuery(format!(
                "NOT IN on column '{}' requires at least one value",
                column
            )));
        }
        let values = values.into_iter().map(Into::into).collect();
        self.push_condition(column, Operator::NotIn(values))
    }

    pub fn where_between<V: Into<BindValue>>(self, column: &str, low: V, high: V) -> Result<Self> {
        self.push_condition(column, Operator::Between(low.into(), high.into()))
    }

    pub fn where_is_null(self, column: &str) -> Result<Self> {
        self.push_condition(column, Operator::IsNull)
    }

    pub fn where_is_not_null(self, column: &str) -> Result<Self> {
        self.push_condition(column, Operator::IsNotNull)
    }

    // ---------- connectives and groups ----------

    /// Joins the next condition with `AND` (the default).
    pub fn and(mut self) -> Self {
        self.pending = Connective::And;
        self
    }

    /// Joins the next condition with `OR`. Applies to the next appended
    /// condition only; afterwards the connective resets to `AND`.
    pub fn or(mut self) -> Self {
        self.pending = Connective::Or;
        self
    }

    fn push_group<F>(mut self, connective: Connective, f: F) -> Result<Self>
    where
        F: FnOnce(QueryBuilder<T>) -> Result<QueryBuilder<T>>,
    {
        let group = f(QueryBuilder::new())?;
        self.pending = Connective::And;
        if group.conditions.is_empty() {
            // nothing to parenthesize
            return Ok(self);
        }
        self.conditions
            .push(Condition::Group(Box::new(group), connective));
        Ok(self)
    }

    /// Opens a parenthesized group joined to the preceding conditions with
    /// `AND`. The connective in the method name wins over any pending
    /// `.or()`. A group that ends up empty is omitted entirely.
    pub fn where_group_and<F>(self, f: F) -> Result<Self>
    where
        F: FnOnce(QueryBuilder<T>) -> Result<QueryBuilder<T>>,
    {
        self.push_group(Connective::And, f)
    }

    /// Opens a parenthesized group joined with `OR`.
    pub fn where_group_or<F>(self, f: F) -> Result<Self>
    where
        F: FnOnce(QueryBuilder<T>) -> Result<QueryBuilder<T>>,
    {
        self.push_group(Connective::Or, f)
    }

    // ---------- grouping, ordering, pagination ----------

    pub fn group_by(mut self, column: &str) -> Result<Self> {
        Self::check_column(column)?;
        self.group_by.push(column.to_string());
        Ok(self)
    }

    /// Raw HAVING text, passed through opaquely. Multiple calls join with
    /// `AND`. Placeholders are not supported here; use [`RawQuery`] when a
    /// HAVING clause needs bound values.
    ///
    /// [`RawQuery`]: crate::raw::RawQuery
    pub fn having(mut self, raw: &str) -> Self {
        self.having.push(raw.to_string());
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Result<Self> {
        Self::check_column(column)?;
        self.order_by.push((column.to_string(), direction));
        Ok(self)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets `limit = page_size` and `offset = (page - 1) * page_size`.
    /// Pages start at 1; page 0 fails with [`Error::InvalidQuery`].
    pub fn paginate(self, page: u64, page_size: u64) -> Result<Self> {
        if page == 0 {
            return Err(Error::InvalidQuery("page numbers start at 1".to_string()));
        }
        Ok(self.limit(page_size).offset((page - 1) * page_size))
    }

    /// Applies the dialect's identifier quoting to the table name and every
    /// validated column this builder renders. Raw expressions, join text and
    /// HAVING text are never touched.
    pub fn quote_identifiers(mut self) -> Self {
        self.quote_identifiers = true;
        self
    }

    // ---------- rendering ----------

    fn conditions_sql(&self, dialect: Dialect, index: &mut usize, quote: bool) -> String {
        let mut sql = String::new();
        let mut first = true;
        for condition in &self.conditions {
            match condition {
                Condition::Leaf(column, op, connective) => {
                    if !first {
                        sql.push(' ');
                        sql.push_str(connective.keyword());
                        sql.push(' ');
                    }
                    sql.push_str(&render_ident(dialect, column, quote));
                    sql.push(' ');
                    sql.push_str(&op.to_sql(dialect, index));
                    first = false;
                }
                Condition::Group(group, connective) => {
                    let inner = group.conditions_sql(dialect, index, quote);
                    if inner.is_empty() {
                        continue;
                    }
                    if !first {
                        sql.push(' ');
                        sql.push_str(connective.keyword());
                        sql.push(' ');
                    }
                    sql.push('(');
                    sql.push_str(&inner);
                    sql.push(')');
                    first = false;
                }
            }
        }
        sql
    }

    fn joins_sql(&self, sql: &mut String) {
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join.kind.keyword());
            sql.push(' ');
            sql.push_str(&join.table);
            sql.push_str(" ON ");
            sql.push_str(&join.on);
        }
    }

    fn tail_sql(&self, dialect: Dialect, quote: bool, with_pagination: bool) -> String {
        let mut sql = String::new();
        if !self.group_by.is_empty() {
            let columns: Vec<String> = self
                .group_by
                .iter()
                .map(|c| render_ident(dialect, c, quote))
                .collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&columns.join(", "));
        }
        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&self.having.join(" AND "));
        }
        if !with_pagination {
            return sql;
        }
        if !self.order_by.is_empty() {
            let columns: Vec<String> = self
                .order_by
                .iter()
                .map(|(c, d)| format!("{} {}", render_ident(dialect, c, quote), d.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&columns.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
            }
            (Some(limit), None) => {
                sql.push_str(&format!(" LIMIT {}", limit));
            }
            (None, Some(offset)) => match dialect {
                // MySQL and SQLite have no bare OFFSET; emit their
                // all-rows LIMIT sentinel first
                Dialect::MySql => {
                    sql.push_str(&format!(" LIMIT 18446744073709551615 OFFSET {}", offset));
                }
                Dialect::Sqlite => {
                    sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset));
                }
                Dialect::Postgres => {
                    sql.push_str(&format!(" OFFSET {}", offset));
                }
            },
            (None, None) => {}
        }
        sql
    }

    /// Renders the full SELECT for `dialect`. Placeholders appear in the
    /// same left-to-right order as the values returned by
    /// [`binds`](Self::binds).
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let quote = self.quote_identifiers;
        let mut index = 0usize;
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if self.select_items.is_empty() {
            sql.push('*');
        } else {
            let items: Vec<String> = self
                .select_items
                .iter()
                .map(|item| match item {
                    SelectItem::Column(c) => render_ident(dialect, c, quote),
                    SelectItem::Raw(e) => e.clone(),
                })
                .collect();
            sql.push_str(&items.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(&render_ident(dialect, T::table_name(), quote));
        self.joins_sql(&mut sql);
        let conditions = self.conditions_sql(dialect, &mut index, quote);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions);
        }
        sql.push_str(&self.tail_sql(dialect, quote, true));
        sql
    }

    /// Renders the `SELECT COUNT(*)` sibling: same FROM, joins, WHERE,
    /// GROUP BY and HAVING; no ordering or pagination.
    pub fn count_sql(&self, dialect: Dialect) -> String {
        let quote = self.quote_identifiers;
        let mut index = 0usize;
        let mut sql = String::from("SELECT COUNT(*) FROM ");
        sql.push_str(&render_ident(dialect, T::table_name(), quote));
        self.joins_sql(&mut sql);
        let conditions = self.conditions_sql(dialect, &mut index, quote);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions);
        }
        sql.push_str(&self.tail_sql(dialect, quote, false));
        sql
    }

    /// Bound values in placeholder order (depth-first, left to right over
    /// the condition tree).
    pub fn binds(&self) -> Vec<BindValue> {
        let mut out = Vec::new();
        self.collect_binds(&mut out);
        out
    }

    fn collect_binds(&self, out: &mut Vec<BindValue>) {
        for condition in &self.conditions {
            match condition {
                Condition::Leaf(_, op, _) => op.collect_binds(out),
                Condition::Group(group, _) => group.collect_binds(out),
            }
        }
    }

    pub fn bind_count(&self) -> usize {
        self.binds().len()
    }

    pub(crate) fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    pub(crate) fn where_clause(&self, dialect: Dialect, index: &mut usize, quote: bool) -> String {
        self.conditions_sql(dialect, index, quote)
    }

    // ---------- execution ----------

    pub async fn fetch_all<R>(&self, pool: &DbPool) -> Result<Vec<R>>
    where
        R: FromAnyRow + Send + Unpin,
    {
        let sql = self.to_sql(pool.dialect());
        let binds = self.binds();
        pool.fetch_all(&sql, &binds).await
    }

    pub async fn fetch_optional<R>(&self, pool: &DbPool) -> Result<Option<R>>
    where
        R: FromAnyRow + Send + Unpin,
    {
        let sql = self.to_sql(pool.dialect());
        let binds = self.binds();
        pool.fetch_optional(&sql, &binds).await
    }

    /// Like [`fetch_optional`](Self::fetch_optional) but a missing row is
    /// [`Error::NotFound`].
    pub async fn fetch_one<R>(&self, pool: &DbPool) -> Result<R>
    where
        R: FromAnyRow + Send + Unpin,
    {
        self.fetch_optional(pool).await?.ok_or(Error::NotFound)
    }

    /// Executes the [`count_sql`](Self::count_sql) sibling.
    pub async fn count(&self, pool: &DbPool) -> Result<u64> {
        let sql = self.count_sql(pool.dialect());
        let binds = self.binds();
        pool.fetch_count(&sql, &binds).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct User;

    impl Entry for User {
        type Id = i64;

        fn table_name() -> &'static str {
            "users"
        }

        fn columns() -> &'static [&'static str] {
            &["id", "name", "age", "status", "email", "score", "created_at"]
        }
    }

    fn qb() -> QueryBuilder<User> {
        QueryBuilder::new()
    }

    // ========== Basic predicates ==========

    #[test]
    fn test_select_all_without_conditions() {
        assert_eq!(qb().to_sql(Dialect::MySql), "SELECT * FROM users");
        assert_eq!(qb().to_sql(Dialect::Postgres), "SELECT * FROM users");
        assert_eq!(qb().to_sql(Dialect::Sqlite), "SELECT * FROM users");
    }

    #[test]
    fn test_where_eq_mysql() {
        let builder = qb().where_eq("age", 18).unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE age = ?"
        );
        assert_eq!(builder.binds(), vec![BindValue::Int64(18)]);
    }

    #[test]
    fn test_where_eq_postgres() {
        let builder = qb().where_eq("age", 18).unwrap();
        assert_eq!(
            builder.to_sql(Dialect::Postgres),
            "SELECT * FROM users WHERE age = $1"
        );
    }

    #[test]
    fn test_comparison_operators() {
        let builder = qb()
            .where_ne("status", "closed")
            .unwrap()
            .where_gt("age", 18)
            .unwrap()
            .where_gte("score", 60.0)
            .unwrap()
            .where_lt("age", 65)
            .unwrap()
            .where_lte("score", 100.0)
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE status != ? AND age > ? AND score >= ? AND age < ? AND score <= ?"
        );
        assert_eq!(builder.bind_count(), 5);
    }

    #[test]
    fn test_like_binds_pattern_verbatim() {
        let builder = qb().where_like("name", "%ali%").unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE name LIKE ?"
        );
        assert_eq!(builder.binds(), vec![BindValue::String("%ali%".into())]);
    }

    #[test]
    fn test_ilike_per_dialect() {
        let builder = qb().where_ilike("name", "%ali%").unwrap();
        assert_eq!(
            builder.to_sql(Dialect::Postgres),
            "SELECT * FROM users WHERE name ILIKE $1"
        );
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE name LIKE ?"
        );
        assert_eq!(
            builder.to_sql(Dialect::Sqlite),
            "SELECT * FROM users WHERE name LIKE ?"
        );
    }

    #[test]
    fn test_null_checks_bind_nothing() {
        let builder = qb()
            .where_is_null("email")
            .unwrap()
            .where_is_not_null("name")
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::Postgres),
            "SELECT * FROM users WHERE email IS NULL AND name IS NOT NULL"
        );
        assert_eq!(builder.bind_count(), 0);
    }

    #[test]
    fn test_where_in() {
        let builder = qb().where_in("status", vec!["a", "b", "c"]).unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE status IN (?, ?, ?)"
        );
        assert_eq!(
            builder.to_sql(Dialect::Postgres),
            "SELECT * FROM users WHERE status IN ($1, $2, $3)"
        );
        assert_eq!(builder.bind_count(), 3);
    }

    #[test]
    fn test_where_not_in() {
        let builder = qb().where_not_in("age", vec![1, 2]).unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE age NOT IN (?, ?)"
        );
    }

    #[test]
    fn test_empty_in_rejected() {
        let err = qb().where_in("age", Vec::<i64>::new()).err().unwrap();
        assert!(matches!(err, Error::InvalidQuery(_)));
        let err = qb().where_not_in("age", Vec::<i64>::new()).err().unwrap();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }

    #[test]
    fn test_where_between() {
        let builder = qb().where_between("age", 18, 30).unwrap();
        assert_eq!(
            builder.to_sql(Dialect::Postgres),
            "SELECT * FROM users WHERE age BETWEEN $1 AND $2"
        );
        assert_eq!(
            builder.binds(),
            vec![BindValue::Int64(18), BindValue::Int64(30)]
        );
    }

    #[test]
    fn test_invalid_column_rejected_before_render() {
        let err = qb().where_eq("nickname", "x").err().unwrap();
        match err {
            Error::InvalidColumn(name) => assert_eq!(name, "nickname"),
            other => panic!("unexpected error: {other}"),
        }
    }

    // ========== Connectives ==========

    #[test]
    fn test_chained_conditions_default_to_and() {
        let builder = qb()
            .where_eq("age", 18)
            .unwrap()
            .where_eq("status", "active")
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE age = ? AND status = ?"
        );
    }

    #[test]
    fn test_or_joins_next_condition() {
        let builder = qb()
            .where_eq("age", 18)
            .unwrap()
            .or()
            .where_eq("status", "vip")
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::Postgres),
            "SELECT * FROM users WHERE age = $1 OR status = $2"
        );
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE age = ? OR status = ?"
        );
        assert_eq!(
            builder.binds(),
            vec![BindValue::Int64(18), BindValue::String("vip".into())]
        );
    }

    #[test]
    fn test_or_applies_to_next_condition_only() {
        let builder = qb()
            .where_eq("age", 18)
            .unwrap()
            .or()
            .where_eq("status", "vip")
            .unwrap()
            .where_eq("name", "ali")
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE age = ? OR status = ? AND name = ?"
        );
    }

    #[test]
    fn test_explicit_and_matches_default() {
        let builder = qb()
            .where_eq("age", 18)
            .unwrap()
            .and()
            .where_eq("status", "x")
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE age = ? AND status = ?"
        );
    }

    // ========== Groups ==========

    #[test]
    fn test_group_joined_with_and() {
        let builder = qb()
            .where_eq("name", "ali")
            .unwrap()
            .where_group_and(|g| g.where_eq("age", 18)?.or().where_eq("status", "vip"))
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE name = ? AND (age = ? OR status = ?)"
        );
        assert_eq!(builder.bind_count(), 3);
    }

    #[test]
    fn test_group_joined_with_or() {
        let builder = qb()
            .where_eq("name", "ali")
            .unwrap()
            .where_group_or(|g| g.where_eq("age", 18)?.where_eq("status", "vip"))
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE name = ? OR (age = ? AND status = ?)"
        );
    }

    #[test]
    fn test_group_as_first_condition() {
        let builder = qb()
            .where_group_and(|g| g.where_eq("age", 18)?.or().where_eq("age", 65))
            .unwrap()
            .where_eq("status", "active")
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE (age = ? OR age = ?) AND status = ?"
        );
    }

    #[test]
    fn test_nested_groups() {
        let builder = qb()
            .where_eq("status", "active")
            .unwrap()
            .where_group_and(|g| {
                g.where_eq("age", 18)?
                    .where_group_or(|inner| inner.where_eq("name", "a")?.where_eq("name", "b"))
            })
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE status = ? AND (age = ? OR (name = ? AND name = ?))"
        );
        assert_eq!(builder.bind_count(), 4);
    }

    #[test]
    fn test_empty_group_is_omitted() {
        let builder = qb()
            .where_eq("age", 18)
            .unwrap()
            .where_group_and(Ok)
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE age = ?"
        );
        assert_eq!(builder.bind_count(), 1);
    }

    #[test]
    fn test_group_placeholder_numbering_postgres() {
        let builder = qb()
            .where_eq("name", "ali")
            .unwrap()
            .where_group_and(|g| g.where_eq("age", 18)?.or().where_eq("status", "vip"))
            .unwrap()
            .where_gt("score", 50.0)
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::Postgres),
            "SELECT * FROM users WHERE name = $1 AND (age = $2 OR status = $3) AND score > $4"
        );
        assert_eq!(
            builder.binds(),
            vec![
                BindValue::String("ali".into()),
                BindValue::Int64(18),
                BindValue::String("vip".into()),
                BindValue::Float64(50.0),
            ]
        );
    }

    #[test]
    fn test_invalid_column_inside_group_propagates() {
        let err = qb()
            .where_group_and(|g| g.where_eq("nope", 1))
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidColumn(_)));
    }

    // ========== Projection and joins ==========

    #[test]
    fn test_select_columns() {
        let builder = qb().select(&["id", "name"]).unwrap();
        assert_eq!(builder.to_sql(Dialect::MySql), "SELECT id, name FROM users");
    }

    #[test]
    fn test_select_rejects_unknown_column() {
        let err = qb().select(&["id", "nope"]).err().unwrap();
        assert!(matches!(err, Error::InvalidColumn(_)));
    }

    #[test]
    fn test_select_raw_expression() {
        let builder = qb()
            .select(&["status"])
            .unwrap()
            .select_raw("COUNT(*) AS total")
            .group_by("status")
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT status, COUNT(*) AS total FROM users GROUP BY status"
        );
    }

    #[test]
    fn test_distinct() {
        let builder = qb().distinct().select(&["status"]).unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT DISTINCT status FROM users"
        );
    }

    #[test]
    fn test_inner_join() {
        let builder = qb()
            .inner_join("orders", "orders.user_id = users.id")
            .where_eq("status", "active")
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users INNER JOIN orders ON orders.user_id = users.id WHERE status = ?"
        );
    }

    #[test]
    fn test_join_kinds() {
        assert_eq!(
            qb().left_join("orders", "orders.user_id = users.id")
                .to_sql(Dialect::MySql),
            "SELECT * FROM users LEFT JOIN orders ON orders.user_id = users.id"
        );
        assert_eq!(
            qb().right_join("orders", "orders.user_id = users.id")
                .to_sql(Dialect::MySql),
            "SELECT * FROM users RIGHT JOIN orders ON orders.user_id = users.id"
        );
        assert_eq!(
            qb().full_join("orders", "orders.user_id = users.id")
                .to_sql(Dialect::Postgres),
            "SELECT * FROM users FULL JOIN orders ON orders.user_id = users.id"
        );
    }

    // ========== Grouping and ordering ==========

    #[test]
    fn test_group_by_and_having() {
        let builder = qb()
            .select(&["status"])
            .unwrap()
            .select_raw("COUNT(*) AS n")
            .group_by("status")
            .unwrap()
            .having("COUNT(*) > 1");
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT status, COUNT(*) AS n FROM users GROUP BY status HAVING COUNT(*) > 1"
        );
    }

    #[test]
    fn test_multiple_having_clauses_join_with_and() {
        let builder = qb()
            .group_by("status")
            .unwrap()
            .having("COUNT(*) > 1")
            .having("MAX(age) < 99");
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users GROUP BY status HAVING COUNT(*) > 1 AND MAX(age) < 99"
        );
    }

    #[test]
    fn test_group_by_rejects_unknown_column() {
        let err = qb().group_by("nope").err().unwrap();
        assert!(matches!(err, Error::InvalidColumn(_)));
    }

    #[test]
    fn test_order_by_directions() {
        let builder = qb()
            .order_by("age", Direction::Desc)
            .unwrap()
            .order_by("name", Direction::Asc)
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users ORDER BY age DESC, name ASC"
        );
    }

    #[test]
    fn test_order_by_rejects_unknown_column() {
        let err = qb().order_by("nope", Direction::Asc).err().unwrap();
        assert!(matches!(err, Error::InvalidColumn(_)));
    }

    // ========== Pagination ==========

    #[test]
    fn test_limit_offset() {
        let builder = qb().limit(10).offset(5);
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users LIMIT 10 OFFSET 5"
        );
    }

    #[test]
    fn test_paginate_computes_offset() {
        let builder = qb().paginate(3, 10).unwrap();
        assert_eq!(
            builder.to_sql(Dialect::Postgres),
            "SELECT * FROM users LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_paginate_first_page_offset_zero() {
        let builder = qb().paginate(1, 10).unwrap();
        assert_eq!(
            builder.to_sql(Dialect::Postgres),
            "SELECT * FROM users LIMIT 10 OFFSET 0"
        );
    }

    #[test]
    fn test_paginate_rejects_page_zero() {
        let err = qb().paginate(0, 10).err().unwrap();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }

    #[test]
    fn test_offset_without_limit_per_dialect() {
        assert_eq!(
            qb().offset(5).to_sql(Dialect::Postgres),
            "SELECT * FROM users OFFSET 5"
        );
        assert_eq!(
            qb().offset(5).to_sql(Dialect::MySql),
            "SELECT * FROM users LIMIT 18446744073709551615 OFFSET 5"
        );
        assert_eq!(
            qb().offset(5).to_sql(Dialect::Sqlite),
            "SELECT * FROM users LIMIT -1 OFFSET 5"
        );
    }

    // ========== Count sibling ==========

    #[test]
    fn test_count_sql_shares_where() {
        let builder = qb()
            .where_gt("age", 18)
            .unwrap()
            .order_by("name", Direction::Asc)
            .unwrap()
            .paginate(2, 10)
            .unwrap();
        assert_eq!(
            builder.count_sql(Dialect::Postgres),
            "SELECT COUNT(*) FROM users WHERE age > $1"
        );
        assert_eq!(builder.binds(), vec![BindValue::Int64(18)]);
    }

    #[test]
    fn test_count_sql_keeps_joins() {
        let builder = qb()
            .inner_join("orders", "orders.user_id = users.id")
            .where_eq("status", "active")
            .unwrap();
        assert_eq!(
            builder.count_sql(Dialect::MySql),
            "SELECT COUNT(*) FROM users INNER JOIN orders ON orders.user_id = users.id WHERE status = ?"
        );
    }

    // ========== Identifier quoting ==========

    #[test]
    fn test_identifiers_bare_by_default() {
        let builder = qb()
            .select(&["name"])
            .unwrap()
            .where_eq("age", 18)
            .unwrap()
            .order_by("age", Direction::Asc)
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT name FROM users WHERE age = ? ORDER BY age ASC"
        );
    }

    #[test]
    fn test_quote_identifiers_mysql() {
        let builder = qb()
            .quote_identifiers()
            .select(&["name"])
            .unwrap()
            .where_eq("age", 18)
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT `name` FROM `users` WHERE `age` = ?"
        );
    }

    #[test]
    fn test_quote_identifiers_postgres() {
        let builder = qb()
            .quote_identifiers()
            .select(&["name"])
            .unwrap()
            .where_eq("age", 18)
            .unwrap()
            .order_by("age", Direction::Desc)
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::Postgres),
            "SELECT \"name\" FROM \"users\" WHERE \"age\" = $1 ORDER BY \"age\" DESC"
        );
    }

    #[test]
    fn test_quoting_applies_inside_groups() {
        let builder = qb()
            .quote_identifiers()
            .where_group_and(|g| g.where_eq("age", 1)?.or().where_eq("age", 2))
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM `users` WHERE (`age` = ? OR `age` = ?)"
        );
    }

    // ========== Dialect swaps ==========

    #[test]
    fn test_dialect_swap_changes_tokens_only() {
        let builder = qb()
            .where_eq("age", 18)
            .unwrap()
            .where_in("status", vec!["a", "b"])
            .unwrap()
            .where_between("score", 1.0, 2.0)
            .unwrap();
        assert_eq!(
            builder.to_sql(Dialect::MySql),
            "SELECT * FROM users WHERE age = ? AND status IN (?, ?) AND score BETWEEN ? AND ?"
        );
        assert_eq!(
            builder.to_sql(Dialect::Postgres),
            "SELECT * FROM users WHERE age = $1 AND status IN ($2, $3) AND score BETWEEN $4 AND $5"
        );
        assert_eq!(builder.bind_count(), 5);
    }

    // ========== Bind values ==========

    #[test]
    fn test_bind_value_conversions() {
        assert_eq!(BindValue::from("x"), BindValue::String("x".into()));
        assert_eq!(BindValue::from(5i64), BindValue::Int64(5));
        assert_eq!(BindValue::from(5i32), BindValue::Int32(5));
        assert_eq!(BindValue::from(true), BindValue::Bool(true));
        assert_eq!(BindValue::from(Option::<i64>::None), BindValue::Null);
        assert_eq!(BindValue::from(Some("y")), BindValue::String("y".into()));
    }

    #[test]
    fn test_bind_value_from_json_scalars() {
        assert_eq!(
            BindValue::from(serde_json::json!("abc")),
            BindValue::String("abc".into())
        );
        assert_eq!(BindValue::from(serde_json::json!(7)), BindValue::Int64(7));
        assert_eq!(
            BindValue::from(serde_json::json!(1.5)),
            BindValue::Float64(1.5)
        );
        assert_eq!(
            BindValue::from(serde_json::json!(false)),
            BindValue::Bool(false)
        );
        assert_eq!(BindValue::from(serde_json::Value::Null), BindValue::Null);
    }
}
