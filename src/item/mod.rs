#[cfg(feature = "csv")]
/// This module provides a CSV item reader.
pub mod csv;

#[cfg(feature = "rdbc-sqlite")]
/// This module provides a SQLite item writer.
pub mod rdbc;

/// This module provides a retrying item writer decorator.
pub mod retry;
