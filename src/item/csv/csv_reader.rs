use csv::{ErrorKind, ReaderBuilder, StringRecord};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use std::{
    cell::{Cell, RefCell},
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use crate::{
    core::item::{ItemReader, ItemReaderResult},
    error::BatchError,
};

type SourceOpener<R> = Box<dyn Fn() -> Result<R, BatchError>>;

/// A CSV item reader that implements the `ItemReader` trait.
///
/// The source holds one record per line. Each line is split with the `csv`
/// parser and deserialized into a Rust struct using Serde. Fields are handed
/// over untouched: trimming and other normalization belong to the processor.
/// Lines end with `\n` or `\r\n`; a quoted field cannot span lines.
///
/// Every line is accounted for: a blank line is a record with no field and
/// is reported like any other malformed record.
///
/// # Restart
///
/// The reader counts every record it consumes, malformed ones included.
/// [`ItemReader::open`] with a position reopens the source and skips that
/// many records. Readers created with [`CsvItemReaderBuilder::from_path`]
/// reopen the file and can restart anywhere; readers created with
/// [`CsvItemReaderBuilder::from_reader`] can only move forward.
///
/// # Examples
///
/// ```
/// use bookstore_batch::item::csv::csv_reader::CsvItemReaderBuilder;
/// use bookstore_batch::core::item::ItemReader;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Record {
///     name: String,
///     value: i32,
/// }
///
/// let data = "foo;123\nbar;456\n";
///
/// let reader = CsvItemReaderBuilder::new()
///     .delimiter(b';')
///     .names(&["name", "value"])
///     .from_reader(data.as_bytes());
///
/// let record: Record = reader.read().unwrap().unwrap();
/// assert_eq!(record.name, "foo");
/// assert_eq!(record.value, 123);
///
/// let record: Record = reader.read().unwrap().unwrap();
/// assert_eq!(record.name, "bar");
///
/// assert!(ItemReader::<Record>::read(&reader).unwrap().is_none());
/// ```
pub struct CsvItemReader<R> {
    /// Buffered source, `None` while closed
    source: RefCell<Option<BufReader<R>>>,
    /// Reopens the source from its beginning, when the source allows it
    opener: Option<SourceOpener<R>>,
    settings: CsvItemReaderBuilder,
    /// Header row of the current source, when the source has one
    headers: RefCell<Option<StringRecord>>,
    /// Lines read since the source was (re)opened, header included
    line: Cell<u64>,
    /// Records consumed since the source was (re)opened
    consumed: Cell<usize>,
}

impl<R: Read> CsvItemReader<R> {
    fn new(
        source: Option<R>,
        opener: Option<SourceOpener<R>>,
        settings: CsvItemReaderBuilder,
    ) -> Self {
        Self {
            source: RefCell::new(source.map(BufReader::new)),
            opener,
            settings,
            headers: RefCell::new(None),
            line: Cell::new(0),
            consumed: Cell::new(0),
        }
    }

    /// Reads the next record line, without its terminator.
    fn next_line(&self) -> Result<Option<(u64, Vec<u8>)>, BatchError> {
        let mut source = self.source.borrow_mut();
        let source = source
            .as_mut()
            .ok_or_else(|| BatchError::ItemReader("CSV source is closed".to_string()))?;

        loop {
            let mut line = Vec::new();
            let read = source.read_until(b'\n', &mut line).map_err(|error| {
                BatchError::ItemReader(format!("line {}: {}", self.line.get() + 1, error))
            })?;
            if read == 0 {
                return Ok(None);
            }

            self.line.set(self.line.get() + 1);
            while matches!(line.last(), Some(b'\n' | b'\r')) {
                line.pop();
            }

            if self.settings.has_headers && self.line.get() == 1 {
                let headers = self.settings.split(&line).map_err(|error| {
                    BatchError::ItemReader(format!("line 1: invalid header: {}", error))
                })?;
                *self.headers.borrow_mut() = Some(headers);
                continue;
            }

            self.consumed.set(self.consumed.get() + 1);
            return Ok(Some((self.line.get(), line)));
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, line: u64, content: &[u8]) -> ItemReaderResult<T> {
        let malformed =
            |reason: String| BatchError::ItemReader(format!("line {}: {}", line, reason));

        let record = if content.is_empty() {
            StringRecord::new()
        } else {
            self.settings
                .split(content)
                .map_err(|error| malformed(error.to_string()))?
        };

        let headers = self.headers.borrow();
        let names = self.settings.names.as_ref().or(headers.as_ref());

        match names {
            Some(names) if record.len() != names.len() => {
                return Err(malformed(format!(
                    "expected {} fields, found {}",
                    names.len(),
                    record.len()
                )));
            }
            None if record.is_empty() => return Err(malformed("empty record".to_string())),
            _ => {}
        }

        record.deserialize(names).map(Some).map_err(|error| {
            let reason = match error.kind() {
                ErrorKind::Deserialize { err, .. } => err.to_string(),
                _ => error.to_string(),
            };
            malformed(reason)
        })
    }
}

impl<R: Read, T: DeserializeOwned> ItemReader<T> for CsvItemReader<R> {
    /// Reads the next item from the CSV source.
    ///
    /// # Returns
    /// - `Ok(Some(record))` if a record is successfully read
    /// - `Ok(None)` if there are no more records to read
    /// - `Err(BatchError::ItemReader(error))` naming the line of a malformed record
    fn read(&self) -> ItemReaderResult<T> {
        if self.source.borrow().is_none() && self.opener.is_some() {
            ItemReader::<T>::open(self, 0)?;
        }

        match self.next_line()? {
            Some((line, content)) => self.deserialize(line, &content),
            None => Ok(None),
        }
    }

    fn open(&self, position: usize) -> Result<(), BatchError> {
        match &self.opener {
            Some(opener) => {
                *self.source.borrow_mut() = Some(BufReader::new(opener()?));
                self.headers.borrow_mut().take();
                self.line.set(0);
                self.consumed.set(0);
            }
            None => {
                if self.source.borrow().is_none() {
                    return Err(BatchError::Configuration(
                        "CSV source was closed and cannot be reopened".to_string(),
                    ));
                }
                if position < self.consumed.get() {
                    return Err(BatchError::Configuration(format!(
                        "CSV source cannot rewind from record {} to record {}",
                        self.consumed.get(),
                        position
                    )));
                }
            }
        }

        while self.consumed.get() < position {
            if self.next_line()?.is_none() {
                warn!(
                    "CSV source ended after {} records, before restart position {}",
                    self.consumed.get(),
                    position
                );
                break;
            }
        }

        debug!("CSV source opened at record {}", self.consumed.get());
        Ok(())
    }

    fn close(&self) -> Result<(), BatchError> {
        self.source.borrow_mut().take();
        Ok(())
    }
}

/// A builder for configuring CSV item reading.
///
/// # Default Configuration
///
/// - Delimiter: comma (,)
/// - Headers: disabled
/// - Names: none, fields are matched by position
///
/// # Examples
///
/// ```
/// use bookstore_batch::item::csv::csv_reader::CsvItemReaderBuilder;
///
/// let reader = CsvItemReaderBuilder::new()
///     .delimiter(b';')
///     .names(&["title", "isbn"])
///     .from_reader("Dune;978-0441013593".as_bytes());
/// ```
#[derive(Clone)]
pub struct CsvItemReaderBuilder {
    /// The delimiter character (default: comma ',')
    delimiter: u8,
    /// Whether the CSV has headers (default: false)
    has_headers: bool,
    /// Column names in source order
    names: Option<StringRecord>,
}

impl Default for CsvItemReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvItemReaderBuilder {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            has_headers: false,
            names: None,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets whether the first row is a header row to be skipped.
    ///
    /// Without [`CsvItemReaderBuilder::names`], fields are matched by the
    /// header names.
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.has_headers = yes;
        self
    }

    /// Names the columns in source order.
    ///
    /// Fields are deserialized by name, and a record whose field count differs
    /// from the number of names is rejected.
    pub fn names(mut self, names: &[&str]) -> Self {
        self.names = Some(StringRecord::from(names.to_vec()));
        self
    }

    /// Splits one line into its fields.
    fn split(&self, line: &[u8]) -> csv::Result<StringRecord> {
        let mut record = StringRecord::new();
        ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(line)
            .read_record(&mut record)?;
        Ok(record)
    }

    /// Creates a `CsvItemReader` from any source implementing `Read`.
    ///
    /// Such a reader can skip forward when opened at a position but cannot
    /// rewind.
    pub fn from_reader<R: Read>(self, rdr: R) -> CsvItemReader<R> {
        CsvItemReader::new(Some(rdr), None, self)
    }

    /// Creates a `CsvItemReader` reading the file at `path`.
    ///
    /// The file is opened when the reader is opened, or on the first read,
    /// and reopened on every restart.
    ///
    /// ```no_run
    /// use bookstore_batch::item::csv::csv_reader::CsvItemReaderBuilder;
    /// use bookstore_batch::core::item::ItemReader;
    ///
    /// let reader = CsvItemReaderBuilder::new()
    ///     .delimiter(b';')
    ///     .from_path("books.csv");
    ///
    /// // Resume after the first ten records
    /// ItemReader::<(String, String)>::open(&reader, 10).unwrap();
    /// ```
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> CsvItemReader<File> {
        let path = path.as_ref().to_path_buf();
        let opener: SourceOpener<File> = Box::new(move || {
            File::open(&path).map_err(|error| {
                BatchError::ItemReader(format!("unable to open {}: {}", path.display(), error))
            })
        });

        CsvItemReader::new(None, Some(opener), self)
    }
}
