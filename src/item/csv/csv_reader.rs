use std::{
    cell::{Cell, RefCell},
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use encoding_rs::Encoding;
use log::{debug, warn};
use serde_json::Value;

use crate::{
    core::item::{ItemReader, ItemReaderResult, Record},
    encoding::{DecodeReader, EncodingResolver, Sniffed, DEFAULT_SAMPLE_SIZE},
    error::TabError,
    item::sanitize::{generated_keys, sanitize_keys},
};

use super::row_splitter::{Row, RowSplitter};

type Rows<R> = RowSplitter<BufReader<DecodeReader<Sniffed<R>>>>;

/// A delimited-text reader producing one [`Record`] per row.
///
/// The input is decoded lazily with the encoding resolved when the reader was
/// built, so a decoding problem past the inspected sample surfaces as
/// [`TabError::Decode`] on the record that contains it.
///
/// Rows shorter than the header are padded with empty strings, longer rows
/// are truncated. Both cases are logged; in strict mode they fail with
/// [`TabError::ColumnCount`] instead.
///
/// The source is dropped as soon as the reader is exhausted, fails, or is
/// closed. Later calls to `read` return `Ok(None)`.
///
/// # Examples
///
/// ```
/// use tabutils::item::csv::csv_reader::CsvItemReaderBuilder;
/// use tabutils::core::item::ItemReader;
///
/// let data: &[u8] = b"Name,Home Town\nAlice,Boston\n";
///
/// let reader = CsvItemReaderBuilder::new()
///     .sanitize(true)
///     .from_reader(data)
///     .unwrap();
///
/// let record = reader.read().unwrap().unwrap();
/// assert_eq!(record["name"], "Alice");
/// assert_eq!(record["home_town"], "Boston");
/// assert!(reader.read().unwrap().is_none());
/// ```
pub struct CsvItemReader<R> {
    rows: RefCell<Option<Rows<R>>>,
    encoding: &'static Encoding,
    keys: RefCell<Option<Vec<String>>>,
    has_headers: bool,
    sanitize: bool,
    first_row: usize,
    first_col: usize,
    trim: bool,
    strict: bool,
    count: Cell<usize>,
}

impl<R: Read> CsvItemReader<R> {
    /// The encoding the input is decoded with.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Number of records produced so far.
    pub fn count(&self) -> usize {
        self.count.get()
    }

    fn next_record(&self, rows: &mut Rows<R>) -> Result<Option<Record>, TabError> {
        if self.keys.borrow().is_none() {
            for _ in 0..self.first_row {
                if rows.next_physical_row()?.is_none() {
                    return Ok(None);
                }
            }

            if self.has_headers {
                let Some(header) = rows.next_row()? else {
                    return Ok(None);
                };
                let cells = skip_columns(header.fields, self.first_col);
                self.set_keys(cells);
            }
        }

        let Some(row) = rows.next_row()? else {
            return Ok(None);
        };
        let line = row.line;
        let cells = self.cells(row);

        if self.keys.borrow().is_none() {
            self.set_keys(generated_keys(cells.len()));
        }

        let keys = self.keys.borrow();
        let keys = keys.as_deref().unwrap_or_default();
        self.check_width(line, keys.len(), cells.len())?;

        let mut cells = cells.into_iter();
        let record: Record = keys
            .iter()
            .map(|key| {
                let value = cells.next().unwrap_or_default();
                (key.clone(), Value::String(value))
            })
            .collect();

        Ok(Some(record))
    }

    fn set_keys(&self, keys: Vec<String>) {
        let keys = if self.sanitize {
            sanitize_keys(&keys)
        } else {
            keys
        };
        debug!("Csv keys: {:?}", keys);
        *self.keys.borrow_mut() = Some(keys);
    }

    fn cells(&self, row: Row) -> Vec<String> {
        let cells = skip_columns(row.fields, self.first_col);
        if self.trim {
            cells.into_iter().map(|cell| cell.trim().to_string()).collect()
        } else {
            cells
        }
    }

    fn check_width(&self, line: u64, expected: usize, found: usize) -> Result<(), TabError> {
        if expected == found {
            return Ok(());
        }
        if self.strict {
            return Err(TabError::ColumnCount {
                line,
                expected,
                found,
            });
        }
        if found < expected {
            warn!(
                "Line {}: {} fields for {} keys, padding with empty values",
                line, found, expected
            );
        } else {
            warn!(
                "Line {}: {} fields for {} keys, dropping the extra cells",
                line, found, expected
            );
        }
        Ok(())
    }
}

fn skip_columns(mut fields: Vec<String>, first_col: usize) -> Vec<String> {
    fields.drain(..first_col.min(fields.len()));
    fields
}

impl<R: Read> ItemReader<Record> for CsvItemReader<R> {
    /// Reads the next row as a record.
    ///
    /// # Returns
    /// - `Ok(Some(record))` for each data row
    /// - `Ok(None)` once the input is exhausted or the reader was closed
    /// - `Err(_)` for undecodable bytes, an unterminated quoted field, or a
    ///   width mismatch in strict mode
    fn read(&self) -> ItemReaderResult<Record> {
        let mut slot = self.rows.borrow_mut();
        let Some(rows) = slot.as_mut() else {
            return Ok(None);
        };

        match self.next_record(rows) {
            Ok(Some(record)) => {
                self.count.set(self.count.get() + 1);
                Ok(Some(record))
            }
            Ok(None) => {
                debug!("Csv source exhausted after {} records", self.count.get());
                *slot = None;
                Ok(None)
            }
            Err(error) => {
                *slot = None;
                Err(error)
            }
        }
    }

    fn close(&self) {
        if self.rows.borrow_mut().take().is_some() {
            debug!("Csv source closed after {} records", self.count.get());
        }
    }
}

/// A builder for configuring delimited-text reading.
///
/// # Default Configuration
///
/// - Delimiter: comma (,)
/// - Quote: double quote (")
/// - Headers: enabled
/// - Encoding: detected
/// - Sanitize, trim, strict: disabled
/// - First row / first column: 0
pub struct CsvItemReaderBuilder {
    delimiter: u8,
    quote: u8,
    has_headers: bool,
    encoding: Option<String>,
    sanitize: bool,
    first_row: usize,
    first_col: usize,
    trim: bool,
    strict: bool,
    sample_size: usize,
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
            quote: b'"',
            has_headers: true,
            encoding: None,
            sanitize: false,
            first_row: 0,
            first_col: 0,
            trim: false,
            strict: false,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }

    /// Sets the field delimiter. Must be an ASCII byte.
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the quote character. Must be an ASCII byte.
    pub fn quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    /// Whether the first row read holds the keys.
    ///
    /// Without headers, keys are `column_1`, `column_2`, ... sized after the
    /// first data row.
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.has_headers = yes;
        self
    }

    /// Declares the input encoding. It is still checked against a sample and
    /// replaced by the detected one when it does not fit.
    pub fn encoding(mut self, label: &str) -> Self {
        self.encoding = Some(label.to_string());
        self
    }

    /// Normalizes keys with [`sanitize_keys`].
    pub fn sanitize(mut self, yes: bool) -> Self {
        self.sanitize = yes;
        self
    }

    /// Number of leading physical rows to skip before the header, blank lines
    /// included, as for a spreadsheet sheet.
    pub fn first_row(mut self, first_row: usize) -> Self {
        self.first_row = first_row;
        self
    }

    /// Number of leading columns to skip in every row.
    pub fn first_col(mut self, first_col: usize) -> Self {
        self.first_col = first_col;
        self
    }

    /// Trims whitespace around values.
    pub fn trim(mut self, yes: bool) -> Self {
        self.trim = yes;
        self
    }

    /// Fails on rows whose width differs from the header.
    pub fn strict(mut self, yes: bool) -> Self {
        self.strict = yes;
        self
    }

    /// Number of leading bytes inspected to resolve the encoding.
    pub fn sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Creates a reader over any byte source.
    ///
    /// Fails with [`TabError::Encoding`] when no supported encoding decodes
    /// the leading sample, or [`TabError::MalformedRow`] for a non-ASCII
    /// delimiter or quote.
    pub fn from_reader<R: Read>(self, rdr: R) -> Result<CsvItemReader<R>, TabError> {
        for (name, byte) in [("delimiter", self.delimiter), ("quote", self.quote)] {
            if !byte.is_ascii() {
                return Err(TabError::MalformedRow {
                    line: 0,
                    message: format!("{} must be an ASCII character", name),
                });
            }
        }

        let decoder = EncodingResolver::default()
            .sample_size(self.sample_size)
            .decode(rdr, self.encoding.as_deref())?;
        let encoding = decoder.encoding();
        debug!("Reading csv as {}", encoding.name());

        let rows = RowSplitter::new(BufReader::new(decoder), self.delimiter, self.quote);

        Ok(CsvItemReader {
            rows: RefCell::new(Some(rows)),
            encoding,
            keys: RefCell::new(None),
            has_headers: self.has_headers,
            sanitize: self.sanitize,
            first_row: self.first_row,
            first_col: self.first_col,
            trim: self.trim,
            strict: self.strict,
            count: Cell::new(0),
        })
    }

    /// Creates a reader over a file.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tabutils::item::csv::csv_reader::CsvItemReaderBuilder;
    /// use tabutils::core::item::{iter, ItemReader};
    ///
    /// let reader = CsvItemReaderBuilder::new()
    ///     .encoding("latin1")
    ///     .sanitize(true)
    ///     .from_path("data.csv")
    ///     .unwrap();
    ///
    /// for record in iter(&reader) {
    ///     println!("{:?}", record.unwrap());
    /// }
    /// ```
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvItemReader<File>, TabError> {
        let file = File::open(path.as_ref())?;
        debug!("Opened {}", path.as_ref().display());
        self.from_reader(file)
    }
}
