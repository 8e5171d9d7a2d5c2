//! Mutation builders: INSERT, UPDATE and DELETE statements with the same
//! validation and binding rules as the SELECT builder.

pub mod delete_builder;
pub mod insert_builder;
pub mod update_builder;

pub use delete_builder::DeleteBuilder;
pub use insert_builder::InsertBuilder;
pub use update_builder::UpdateBuilder;
