#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # Bookstore Batch

 Chunk-oriented batch jobs for the bookstore: import a semicolon-delimited
 file of books into SQLite, and clean up files afterwards.

 ## Core Concepts

- **Job:** Represents the entire batch process. A `Job` is composed of one or more `Step`s, run in order. Running the same job instance again is a restart.
- **Step:** An independent, sequential phase of a job. A chunk-oriented step reads, processes and writes items; a tasklet step runs a single task.
- **ItemReader:** Retrieves the input of a `Step`, one item at a time, and can be reopened at a position to resume a failed run.
- **ItemProcessor:** The business logic applied to every item read.
- **ItemWriter:** Writes the output of a `Step`, one chunk of items at a time.
- **Tasklet:** A single task, such as deleting a file.

 ## Chunk processing

Items are read and processed one by one and written in chunks of `chunk_size` items.
The step execution keeps a cursor: the number of source records consumed up to the
last chunk the writer accepted. A failed step restarts from there, so rows of a
committed chunk are never written twice.

Malformed records fail the step unless a skip limit is set.

 ## Features

| **Feature**   | **Description**                                               |
|---------------|---------------------------------------------------------------|
| csv           | Enables the CSV `ItemReader`                                  |
| rdbc-sqlite   | Enables the SQLite `ItemWriter`                               |
| full          | Enables all available features and the bookstore jobs         |

 ## Getting Started

```rust
# use serde::Deserialize;
# use bookstore_batch::{
#     core::{
#         item::{ItemProcessor, ItemProcessorResult, ItemWriter, ItemWriterResult},
#         job::{Job, JobBuilder},
#         step::StepBuilder,
#     },
#     item::csv::csv_reader::CsvItemReaderBuilder,
#     BatchError,
# };
# #[derive(Deserialize, Debug, Clone)]
# struct Book {
#     title: String,
#     isbn: String,
# }
# #[derive(Default)]
# struct UpperCaseProcessor {}
# impl ItemProcessor<Book, Book> for UpperCaseProcessor {
#     fn process(&self, item: &Book) -> ItemProcessorResult<Book> {
#         Ok(Book {
#             title: item.title.to_uppercase(),
#             isbn: item.isbn.trim().to_string(),
#         })
#     }
# }
# struct ConsoleWriter;
# impl ItemWriter<Book> for ConsoleWriter {
#     fn write(&self, items: &[Book]) -> ItemWriterResult {
#         items.iter().for_each(|book| println!("{:?}", book));
#         Ok(())
#     }
# }

fn main() -> Result<(), BatchError> {
    let csv = "Dune;978-0441013593
Hyperion; 978-0553283686
Foundation;978-0553293357";

    let reader = CsvItemReaderBuilder::new()
        .delimiter(b';')
        .names(&["title", "isbn"])
        .from_reader(csv.as_bytes());

    let processor = UpperCaseProcessor::default();
    let writer = ConsoleWriter;

    let step = StepBuilder::new("import")
        .chunk::<Book, Book>(2) // set commit interval
        .reader(&reader)
        .processor(&processor)
        .writer(&writer)
        .skip_limit(1) // set fault tolerance
        .build()?;

    let job = JobBuilder::new().start(&step).build();
    let execution = job.run()?;

    assert_eq!(execution.step_executions[0].write_count, 3);
    assert_eq!(execution.step_executions[0].commit_count, 2);

    Ok(())
}
```

 ## Command line

The `bookstore-batch` binary runs the bookstore jobs:

```text
bookstore-batch import --input books.csv --chunk-size 100
bookstore-batch delete --path books.csv
```

Settings come from `bookstore-batch.toml` (or `--config`), then `BOOKSTORE_*`
environment variables, then flags. Logging is configured with `RUST_LOG`.

 ## License
 Licensed under either of

 -   Apache License, Version 2.0
     ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
 -   MIT license
     ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)

 at your option.
 */

/// Core module for batch operations
pub mod core;

/// Error types for batch operations
pub mod error;

#[doc(inline)]
pub use error::*;

/// Layered configuration of the bookstore jobs
pub mod config;

/// Set of item readers and writers (csv reader, sqlite writer)
pub mod item;

/// Set of tasklets
pub mod tasklet;

#[cfg(all(feature = "csv", feature = "rdbc-sqlite"))]
/// The bookstore import and cleanup jobs
pub mod bookstore;
