// lets code generated by the derive macro name this crate by its published
// name, including inside this crate's own tests
extern crate self as sqlxentry;

pub mod builder;
pub mod db_pool;
pub mod dialect;
pub mod entry;
pub mod error;
pub mod query_builder;
pub mod raw;
pub mod repository;

pub use builder::{DeleteBuilder, InsertBuilder, UpdateBuilder};
pub use db_pool::{DbPool, ExecResult, FromAnyRow};
pub use dialect::Dialect;
pub use entry::{Direction, Entry, EntryFields};
pub use error::{Error, Result};
pub use query_builder::{BindValue, Condition, Connective, Operator, QueryBuilder};
pub use raw::RawQuery;
pub use repository::{Page, Repository, SqlRepository};

// re-export the derive macros under the crate root
pub use sqlxentry_derive::*;
