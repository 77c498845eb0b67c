#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use bookstore_batch::bookstore::create_schema;
use sqlx::{
    Pool, Sqlite,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

/// Writes `content` to `books.csv` in `dir` and returns its path.
pub fn books_file(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("books.csv");
    fs::write(&path, content).expect("Failed to write books file");
    path
}

/// Opens a fresh database file in `dir` with the `books` table.
pub async fn bookstore_database(dir: &Path) -> Pool<Sqlite> {
    let url = format!("sqlite://{}", dir.join("bookstore.db").display());
    let options = SqliteConnectOptions::from_str(&url)
        .expect("Invalid database url")
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
        .expect("Failed to open database");

    create_schema(&pool).await.expect("Failed to create schema");
    pool
}

/// Books stored in insertion order.
pub async fn stored_books(pool: &Pool<Sqlite>) -> Vec<(String, String)> {
    sqlx::query_as("SELECT title, isbn FROM books ORDER BY rowid")
        .fetch_all(pool)
        .await
        .expect("Failed to query books")
}
