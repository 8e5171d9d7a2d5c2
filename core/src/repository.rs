//! Generic repository built on the statement builders.
//!
//! [`Repository`] packages the common persistence operations for one
//! [`Entry`] type; every method is a provided default on top of
//! [`pool`](Repository::pool), so a handle type only has to say where its
//! connections come from. [`SqlRepository`] is that handle for the common
//! case of one pool per repository.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;

use crate::builder::{DeleteBuilder, InsertBuilder, UpdateBuilder};
use crate::db_pool::{DbPool, FromAnyRow};
use crate::entry::{Direction, Entry, EntryFields};
use crate::error::{Error, Result};
use crate::query_builder::{BindValue, QueryBuilder};

/// One page of results plus the totals needed to render a pager.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total row count across all pages.
    pub total: u64,
    /// 1-based page number this slice came from.
    pub page: u64,
    pub size: u64,
    /// Total page count at this size.
    pub pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, size: u64) -> Self {
        let pages = if size > 0 { (total + size - 1) / size } else { 0 };
        Self {
            items,
            total,
            page,
            size,
            pages,
        }
    }
}

/// CRUD and lookup operations for one entity type.
///
/// All methods are provided; implementors supply [`pool`](Repository::pool).
/// Missing rows surface as [`Error::NotFound`] from the lookup methods and
/// from [`update`](Repository::update)/[`delete`](Repository::delete), never
/// as a driver error.
#[async_trait]
pub trait Repository<T>
where
    T: Entry + EntryFields + FromAnyRow + Send + Sync + Unpin,
    T::Id: 'static,
{
    /// The pool every default method runs against.
    fn pool(&self) -> &DbPool;

    async fn find_all(&self) -> Result<Vec<T>> {
        QueryBuilder::<T>::new().fetch_all(self.pool()).await
    }

    async fn find_by_id(&self, id: T::Id) -> Result<T> {
        QueryBuilder::<T>::new()
            .where_eq(T::id_column(), id)?
            .fetch_one(self.pool())
            .await
    }

    async fn find_optional(&self, id: T::Id) -> Result<Option<T>> {
        QueryBuilder::<T>::new()
            .where_eq(T::id_column(), id)?
            .fetch_optional(self.pool())
            .await
    }

    /// All rows where `column = value`. The column is validated against
    /// `T::columns()`.
    async fn find_by_column<V>(&self, column: &str, value: V) -> Result<Vec<T>>
    where
        V: Into<BindValue> + Send,
    {
        QueryBuilder::<T>::new()
            .where_eq(column, value)?
            .fetch_all(self.pool())
            .await
    }

    async fn exists(&self, id: T::Id) -> Result<bool> {
        let count = QueryBuilder::<T>::new()
            .where_eq(T::id_column(), id)?
            .count(self.pool())
            .await?;
        Ok(count > 0)
    }

    /// Inserts the entity and returns the stored row.
    ///
    /// On backends with `RETURNING` the row comes back from the insert
    /// itself. On MySQL the insert runs first and the row is read back by
    /// the submitted identifier, or by the generated one when the entity
    /// left it unset.
    async fn create(&self, entity: &T) -> Result<T> {
        let pool = self.pool();
        let builder = InsertBuilder::new().entity(entity);
        if pool.dialect().supports_returning() {
            return builder.returning_all().fetch_one(pool).await;
        }
        let submitted = entity.field_value(T::id_column());
        let result = builder.execute(pool).await?;
        let id = match submitted {
            Some(value) => value,
            None => result.last_insert_id.map(BindValue::from).ok_or_else(|| {
                Error::InvalidQuery(
                    "INSERT reported no generated id; supply the identifier explicitly"
                        .to_string(),
                )
            })?,
        };
        QueryBuilder::<T>::new()
            .where_eq(T::id_column(), id)?
            .fetch_one(pool)
            .await
    }

    /// Patches the row with the entity's populated fields and returns the
    /// stored row.
    ///
    /// Fields whose value is absent stay untouched; the identifier column
    /// is never assigned. A missing row is [`Error::NotFound`]. On MySQL
    /// the row is read back after the update, since the driver reports
    /// changed rows rather than matched rows.
    async fn update(&self, id: T::Id, entity: &T) -> Result<T> {
        let pool = self.pool();
        let filter_id = id.clone();
        let builder = UpdateBuilder::new()
            .entity(entity)
            .filter(move |q| q.where_eq(T::id_column(), filter_id))?;
        if pool.dialect().supports_returning() {
            return builder.returning_all().fetch_one(pool).await;
        }
        builder.execute(pool).await?;
        self.find_by_id(id).await
    }

    /// Deletes the row; [`Error::NotFound`] when no row matched.
    async fn delete(&self, id: T::Id) -> Result<()> {
        let result = DeleteBuilder::<T>::new()
            .filter(|q| q.where_eq(T::id_column(), id))?
            .execute(self.pool())
            .await?;
        if result.rows_affected == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    /// Lookup with equality filters (ANDed in order), optional sort and
    /// window.
    async fn find_advanced(
        &self,
        filters: &[(&str, BindValue)],
        sort: Option<(&str, Direction)>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Vec<T>> {
        let mut query = QueryBuilder::<T>::new();
        for (column, value) in filters {
            query = query.where_eq(*column, value.clone())?;
        }
        if let Some((column, direction)) = sort {
            query = query.order_by(column, direction)?;
        }
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        if let Some(offset) = offset {
            query = query.offset(offset);
        }
        query.fetch_all(self.pool()).await
    }

    /// One page of rows plus totals. `page` is 1-based.
    async fn paginate_sorted(
        &self,
        page: u64,
        page_size: u64,
        sort: Option<(&str, Direction)>,
    ) -> Result<Page<T>> {
        let mut query = QueryBuilder::<T>::new();
        if let Some((column, direction)) = sort {
            query = query.order_by(column, direction)?;
        }
        let total = query.count(self.pool()).await?;
        let items = query
            .paginate(page, page_size)?
            .fetch_all(self.pool())
            .await?;
        Ok(Page::new(items, total, page, page_size))
    }

    /// Row count under equality filters (ANDed in order).
    async fn count(&self, filters: &[(&str, BindValue)]) -> Result<u64> {
        let mut query = QueryBuilder::<T>::new();
        for (column, value) in filters {
            query = query.where_eq(*column, value.clone())?;
        }
        query.count(self.pool()).await
    }
}

/// Pool-backed [`Repository`] handle for one entity type.
pub struct SqlRepository<T> {
    pool: DbPool,
    _entry: PhantomData<T>,
}

impl<T> SqlRepository<T> {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            _entry: PhantomData,
        }
    }
}

// manual impl: the entry type itself need not be Clone
impl<T> Clone for SqlRepository<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entry: PhantomData,
        }
    }
}

#[async_trait]
impl<T> Repository<T> for SqlRepository<T>
where
    T: Entry + EntryFields + FromAnyRow + Send + Sync + Unpin,
    T::Id: 'static,
{
    fn pool(&self) -> &DbPool {
        &self.pool
    }
}
