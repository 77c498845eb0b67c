//! Delimited text support.
//!
//! [`csv_reader::CsvItemReader`] deserializes delimited records into Rust
//! structs with serde, one record per `read`, and can restart from a record
//! position so that a chunk-oriented step can resume after a failure.
//!
//! # Example
//!
//! ```
//! use bookstore_batch::item::csv::csv_reader::CsvItemReaderBuilder;
//! use bookstore_batch::core::item::ItemReader;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize, PartialEq)]
//! struct City {
//!     city: String,
//!     country: String,
//!     pop: u32,
//! }
//!
//! let csv_data = "\
//! Boston;United States;4628910
//! Concord;United States;42695
//! ";
//!
//! let reader = CsvItemReaderBuilder::new()
//!     .delimiter(b';')
//!     .names(&["city", "country", "pop"])
//!     .from_reader(csv_data.as_bytes());
//!
//! let mut cities: Vec<City> = Vec::new();
//! while let Some(city) = reader.read().unwrap() {
//!     cities.push(city);
//! }
//!
//! assert_eq!(cities.len(), 2);
//! assert_eq!(cities[0].city, "Boston");
//! assert_eq!(cities[1].pop, 42695);
//! ```

/// A module providing facilities for reading CSV data records.
pub mod csv_reader;
