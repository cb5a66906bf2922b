use std::{
    cell::{Cell, RefCell},
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use serde::Serialize;

use crate::{
    core::item::{iter, ItemReader, ItemWriter, Record},
    error::TabError,
};

/// Writes items as JSON.
///
/// Two layouts are supported:
///
/// - array (default): `open` writes `[`, items are separated by `,` and
///   `close` writes `]`. Items may be pretty-printed.
/// - newline-delimited: one compact JSON object per line, nothing written on
///   `open`/`close`.
pub struct JsonItemWriter<W: Write> {
    stream: RefCell<BufWriter<W>>,
    newline: bool,
    use_pretty_formatter: bool,
    is_first_item: Cell<bool>,
}

impl<W: Write> JsonItemWriter<W> {
    fn put(&self, bytes: &[u8]) -> Result<(), TabError> {
        self.stream
            .borrow_mut()
            .write_all(bytes)
            .map_err(|error| TabError::ItemWriter(error.to_string()))
    }

    /// Flushes and returns the underlying sink.
    pub fn into_inner(self) -> Result<W, TabError> {
        self.stream
            .into_inner()
            .into_inner()
            .map_err(|error| TabError::ItemWriter(error.to_string()))
    }
}

impl<W: Write, R: Serialize> ItemWriter<R> for JsonItemWriter<W> {
    fn write(&self, items: &[R]) -> Result<(), TabError> {
        for item in items {
            let json = if self.use_pretty_formatter && !self.newline {
                serde_json::to_vec_pretty(item)?
            } else {
                serde_json::to_vec(item)?
            };

            if self.newline {
                self.put(&json)?;
                self.put(b"\n")?;
                continue;
            }

            if !self.is_first_item.get() {
                let separator: &[u8] = if self.use_pretty_formatter { b",\n" } else { b"," };
                self.put(separator)?;
            }
            self.is_first_item.set(false);
            self.put(&json)?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), TabError> {
        self.stream
            .borrow_mut()
            .flush()
            .map_err(|error| TabError::ItemWriter(error.to_string()))
    }

    fn open(&self) -> Result<(), TabError> {
        if self.newline {
            return Ok(());
        }
        self.is_first_item.set(true);
        let start: &[u8] = if self.use_pretty_formatter { b"[\n" } else { b"[" };
        self.put(start)
    }

    fn close(&self) -> Result<(), TabError> {
        if !self.newline {
            let end: &[u8] = if self.use_pretty_formatter { b"\n]\n" } else { b"]" };
            self.put(end)?;
        }
        ItemWriter::<R>::flush(self)
    }
}

#[derive(Default)]
pub struct JsonItemWriterBuilder {
    newline: bool,
    pretty_formatter: bool,
}

impl JsonItemWriterBuilder {
    pub fn new() -> JsonItemWriterBuilder {
        JsonItemWriterBuilder {
            newline: false,
            pretty_formatter: false,
        }
    }

    /// Writes one object per line instead of an array.
    pub fn newline(mut self, yes: bool) -> JsonItemWriterBuilder {
        self.newline = yes;
        self
    }

    /// Pretty-prints array items. Ignored for newline-delimited output.
    pub fn pretty_formatter(mut self, yes: bool) -> JsonItemWriterBuilder {
        self.pretty_formatter = yes;
        self
    }

    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<JsonItemWriter<File>, TabError> {
        let file = File::create(path)?;
        Ok(self.from_writer(file))
    }

    pub fn from_writer<W: Write>(self, wtr: W) -> JsonItemWriter<W> {
        JsonItemWriter {
            stream: RefCell::new(BufWriter::new(wtr)),
            newline: self.newline,
            use_pretty_formatter: self.pretty_formatter,
            is_first_item: Cell::new(true),
        }
    }
}

/// Lazily renders every record of `reader` as one compact JSON line.
///
/// Lines carry no trailing newline. The first read error is yielded and ends
/// the sequence.
///
/// ```
/// use tabutils::item::csv::csv_reader::CsvItemReaderBuilder;
/// use tabutils::item::json::json_writer::to_json_lines;
///
/// let data: &[u8] = b"a,b\n2,3\n";
/// let reader = CsvItemReaderBuilder::new().from_reader(data).unwrap();
///
/// let mut lines = to_json_lines(&reader);
/// assert_eq!(lines.next().unwrap().unwrap(), r#"{"a":"2","b":"3"}"#);
/// assert!(lines.next().is_none());
/// ```
pub fn to_json_lines(
    reader: &dyn ItemReader<Record>,
) -> impl Iterator<Item = Result<String, TabError>> + '_ {
    iter(reader).map(|record| -> Result<String, TabError> {
        Ok(serde_json::to_string(&record?)?)
    })
}
