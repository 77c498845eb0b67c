use serde::{Deserialize, Deserializer, Serialize, de};
use sqlx::{Sqlite, query_builder::Separated};

use crate::{
    core::item::{ItemProcessor, ItemProcessorResult},
    item::rdbc::DatabaseItemBinder,
};

/// One line of the book file: `title;isbn`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Book {
    #[serde(deserialize_with = "non_blank")]
    pub title: String,
    #[serde(deserialize_with = "non_blank")]
    pub isbn: String,
}

impl Book {
    pub fn new(title: &str, isbn: &str) -> Self {
        Self {
            title: title.to_string(),
            isbn: isbn.to_string(),
        }
    }
}

fn non_blank<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    if value.trim().is_empty() {
        return Err(de::Error::custom("required field is blank"));
    }
    Ok(value)
}

/// Uppercases the title and trims the ISBN.
#[derive(Default)]
pub struct BookProcessor;

impl ItemProcessor<Book, Book> for BookProcessor {
    fn process(&self, item: &Book) -> ItemProcessorResult<Book> {
        Ok(Book {
            title: item.title.to_uppercase(),
            isbn: item.isbn.trim().to_string(),
        })
    }
}

/// Binds a book to the `(title, isbn)` columns of the `books` table.
#[derive(Default)]
pub struct BookBinder;

impl DatabaseItemBinder<Book, Sqlite> for BookBinder {
    fn bind(&self, item: &Book, mut query_builder: Separated<Sqlite, &str>) {
        query_builder.push_bind(item.title.clone());
        query_builder.push_bind(item.isbn.clone());
    }
}
