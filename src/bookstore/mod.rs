//! # Bookstore jobs
//!
//! The two batch jobs of the bookstore:
//!
//! - **Chunk job**: reads `title;isbn` lines, uppercases titles, trims ISBNs
//!   and inserts the books into the `books` table, chunk by chunk
//! - **Delete file job**: removes a file, tolerating its absence
//!
//! ```no_run
//! use bookstore_batch::bookstore::{create_schema, jobs::run_import_job};
//! use bookstore_batch::config::BatchConfig;
//! use std::path::PathBuf;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let pool = sqlx::SqlitePool::connect("sqlite://bookstore.db").await?;
//! create_schema(&pool).await?;
//!
//! let mut config = BatchConfig::default();
//! config.input.path = Some(PathBuf::from("books.csv"));
//!
//! let execution = run_import_job(&config, &pool, None)?;
//! println!("{} books imported", execution.step_executions[0].write_count);
//! # Ok(())
//! # }
//! ```

use sqlx::{Pool, Sqlite};

pub mod book;
pub mod jobs;

pub const BOOKS_TABLE: &str = "books";

/// Creates the `books` table when it does not exist yet.
pub async fn create_schema(pool: &Pool<Sqlite>) -> Result<(), sqlx::Error> {
    sqlx::query("CREATE TABLE IF NOT EXISTS books (title TEXT, isbn TEXT)")
        .execute(pool)
        .await?;
    Ok(())
}
