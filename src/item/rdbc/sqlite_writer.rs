use std::{cell::RefCell, time::Duration};

use log::{debug, error};
use sqlx::{Connection, Pool, QueryBuilder, Sqlite, SqliteConnection, pool::PoolConnection};

use crate::BatchError;
use crate::core::item::{ItemWriter, ItemWriterResult};
use crate::item::rdbc::DatabaseItemBinder;

// SQLite rejects statements with more bind parameters than this.
const BIND_LIMIT: usize = 32766;

/// A writer inserting each chunk into a SQLite table with bulk inserts.
///
/// # Design
///
/// - One `INSERT INTO table (columns) VALUES (..), (..), ...` per chunk,
///   built with SQLx's query builder and bound through a
///   [`DatabaseItemBinder`]
/// - The chunk is written inside one transaction: a constraint violation on
///   any row rolls back every row of the chunk
/// - Chunks needing more bind parameters than SQLite accepts are split into
///   several statements of the same transaction
/// - An optional timeout bounds each chunk; when it elapses the transaction
///   is rolled back and the write fails
///
/// # Connection
///
/// The writer takes one connection from the pool when opened and gives it
/// back when closed, so every chunk of a step goes through the same
/// connection. A write without `open` takes the connection on the spot. A
/// failed write gives its connection back and the next write takes a fresh
/// one.
///
/// # Runtime
///
/// `open`, `write` and `close` are synchronous and bridge into the current
/// tokio runtime with `block_in_place`, so they must run inside a
/// multi-threaded runtime.
pub struct SqliteItemWriter<'a, O> {
    pool: &'a Pool<Sqlite>,
    table: &'a str,
    columns: Vec<&'a str>,
    item_binder: &'a dyn DatabaseItemBinder<O, Sqlite>,
    write_timeout: Option<Duration>,
    connection: RefCell<Option<PoolConnection<Sqlite>>>,
}

impl<O> SqliteItemWriter<'_, O> {
    fn block_on<F: Future>(&self, future: F) -> Result<F::Output, BatchError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            BatchError::ItemWriter(format!("SQLite writer needs a tokio runtime: {}", e))
        })?;

        Ok(tokio::task::block_in_place(|| handle.block_on(future)))
    }

    async fn insert(
        &self,
        connection: &mut SqliteConnection,
        items: &[O],
    ) -> Result<(), sqlx::Error> {
        let rows_per_statement = BIND_LIMIT / self.columns.len();
        let mut transaction = connection.begin().await?;

        for rows in items.chunks(rows_per_statement) {
            let mut query_builder = QueryBuilder::<Sqlite>::new("INSERT INTO ");
            query_builder.push(self.table);
            query_builder.push(" (");
            query_builder.push(self.columns.join(", "));
            query_builder.push(") ");

            query_builder.push_values(rows, |separated, item| {
                self.item_binder.bind(item, separated);
            });

            query_builder.build().execute(&mut *transaction).await?;
        }

        transaction.commit().await
    }

    async fn insert_within_timeout(
        &self,
        slot: &mut Option<PoolConnection<Sqlite>>,
        items: &[O],
    ) -> ItemWriterResult {
        let insert = async {
            let connection = match slot.take() {
                Some(connection) => connection,
                None => self.pool.acquire().await?,
            };
            let connection = slot.insert(connection);
            self.insert(connection, items).await
        };

        let result = match self.write_timeout {
            Some(limit) => match tokio::time::timeout(limit, insert).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(BatchError::ItemWriter(format!(
                        "SQLite write to {} timed out after {:?}",
                        self.table, limit
                    )));
                }
            },
            None => insert.await,
        };

        result.map_err(|e| BatchError::ItemWriter(format!("SQLite write failed: {}", e)))
    }
}

impl<O> ItemWriter<O> for SqliteItemWriter<'_, O> {
    /// Writes one chunk to the SQLite table.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::ItemWriter` when the chunk is rejected (constraint
    /// violation, missing table, timeout...). Nothing of the chunk is kept.
    fn write(&self, items: &[O]) -> ItemWriterResult {
        if items.is_empty() {
            return Ok(());
        }

        let mut slot = self.connection.borrow_mut();
        let result = self.block_on(self.insert_within_timeout(&mut slot, items))?;

        match &result {
            Ok(()) => debug!(
                "Successfully wrote {} items to SQLite table {}",
                items.len(),
                self.table
            ),
            Err(e) => {
                slot.take();
                error!(
                    "Failed to write {} items to SQLite table {}: {}",
                    items.len(),
                    self.table,
                    e
                )
            }
        }

        result
    }

    fn open(&self) -> Result<(), BatchError> {
        let mut slot = self.connection.borrow_mut();
        if slot.is_none() {
            let connection = self.block_on(self.pool.acquire())?.map_err(|e| {
                BatchError::ItemWriter(format!("SQLite connection unavailable: {}", e))
            })?;
            *slot = Some(connection);
            debug!("SQLite writer for table {} opened", self.table);
        }
        Ok(())
    }

    fn close(&self) -> Result<(), BatchError> {
        if self.connection.borrow_mut().take().is_some() {
            debug!("SQLite writer for table {} closed", self.table);
        }
        Ok(())
    }
}

/// Builder for [`SqliteItemWriter`].
///
/// # Examples
///
/// ```no_run
/// use bookstore_batch::item::rdbc::{DatabaseItemBinder, SqliteItemWriterBuilder};
/// use sqlx::{Sqlite, SqlitePool, query_builder::Separated};
/// use std::time::Duration;
///
/// struct Product {
///     id: i32,
///     name: String,
/// }
///
/// struct ProductBinder;
/// impl DatabaseItemBinder<Product, Sqlite> for ProductBinder {
///     fn bind(&self, item: &Product, mut query_builder: Separated<Sqlite, &str>) {
///         query_builder.push_bind(item.id);
///         query_builder.push_bind(item.name.clone());
///     }
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = SqlitePool::connect("sqlite::memory:").await?;
///
/// let writer = SqliteItemWriterBuilder::new()
///     .pool(&pool)
///     .table("products")
///     .add_column("id")
///     .add_column("name")
///     .item_binder(&ProductBinder)
///     .write_timeout(Duration::from_secs(5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteItemWriterBuilder<'a, O> {
    pool: Option<&'a Pool<Sqlite>>,
    table: Option<&'a str>,
    columns: Vec<&'a str>,
    item_binder: Option<&'a dyn DatabaseItemBinder<O, Sqlite>>,
    write_timeout: Option<Duration>,
}

impl<O> Default for SqliteItemWriterBuilder<'_, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, O> SqliteItemWriterBuilder<'a, O> {
    pub fn new() -> Self {
        Self {
            pool: None,
            table: None,
            columns: Vec::new(),
            item_binder: None,
            write_timeout: None,
        }
    }

    pub fn pool(mut self, pool: &'a Pool<Sqlite>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn table(mut self, table: &'a str) -> Self {
        self.table = Some(table);
        self
    }

    /// Adds a column. Columns are bound in the order they are added.
    pub fn add_column(mut self, column: &'a str) -> Self {
        self.columns.push(column);
        self
    }

    pub fn item_binder(mut self, item_binder: &'a dyn DatabaseItemBinder<O, Sqlite>) -> Self {
        self.item_binder = Some(item_binder);
        self
    }

    pub fn write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = Some(write_timeout);
        self
    }

    pub fn build(self) -> Result<SqliteItemWriter<'a, O>, BatchError> {
        let pool = self
            .pool
            .ok_or_else(|| BatchError::Configuration("Pool is mandatory".to_string()))?;

        let table = self
            .table
            .ok_or_else(|| BatchError::Configuration("Table name is mandatory".to_string()))?;

        if self.columns.is_empty() {
            return Err(BatchError::Configuration(
                "One or more columns are required".to_string(),
            ));
        }

        let item_binder = self
            .item_binder
            .ok_or_else(|| BatchError::Configuration("Item binder is mandatory".to_string()))?;

        Ok(SqliteItemWriter {
            pool,
            table,
            columns: self.columns,
            item_binder,
            write_timeout: self.write_timeout,
            connection: RefCell::new(None),
        })
    }
}
