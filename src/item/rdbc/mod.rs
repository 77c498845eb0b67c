use sqlx::{Database, query_builder::Separated};

/// This module contains the SQLite writer implementation.
pub mod sqlite_writer;

/// Trait for binding item data to database query parameters.
///
/// The binder pushes one bind per configured column, in column order.
///
/// # Example
///
/// ```no_run
/// use bookstore_batch::item::rdbc::DatabaseItemBinder;
/// use sqlx::{Sqlite, query_builder::Separated};
///
/// struct User {
///     id: i32,
///     name: String,
/// }
///
/// struct UserBinder;
/// impl DatabaseItemBinder<User, Sqlite> for UserBinder {
///     fn bind(&self, item: &User, mut query_builder: Separated<Sqlite, &str>) {
///         query_builder.push_bind(item.id);
///         query_builder.push_bind(item.name.clone());
///     }
/// }
/// ```
pub trait DatabaseItemBinder<O, DB: Database> {
    /// Binds the properties of an item to a separated query builder.
    fn bind(&self, item: &O, query_builder: Separated<DB, &str>);
}

pub use sqlite_writer::{SqliteItemWriter, SqliteItemWriterBuilder};
