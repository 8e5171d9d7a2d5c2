//! Entry descriptors: the per-entity contract every builder consults.

use crate::query_builder::BindValue;

/// Sort direction for `order_by` and the advanced finders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Descriptor binding an entity type to its table.
///
/// The order of `columns()` is the default projection order and the INSERT
/// column order. Implemented by hand or through `#[derive(Entry)]`.
pub trait Entry: Sized {
    /// Identifier type; must convert into a bind value.
    type Id: Into<BindValue> + Clone + Send + Sync;

    fn table_name() -> &'static str;

    /// Ordered column list. Membership here is what every predicate,
    /// projection and ordering call validates against.
    fn columns() -> &'static [&'static str];

    /// Identifier column, `"id"` unless overridden.
    fn id_column() -> &'static str {
        "id"
    }

    fn has_column(column: &str) -> bool {
        Self::columns().contains(&column)
    }
}

/// Per-instance value extraction for generic INSERT/UPDATE.
///
/// Returning `None` for a column means "omit it from the statement", leaving
/// server defaults in charge.
pub trait EntryFields {
    fn field_value(&self, column: &str) -> Option<BindValue>;
}
