use std::{
    cell::{Cell, RefCell},
    fs::File,
    io::Write,
    path::Path,
};

use csv::{Writer, WriterBuilder};
use serde_json::Value;

use crate::{
    core::item::{ItemWriter, Record},
    error::TabError,
};

/// Writes records as delimited text.
///
/// The header row is taken from the keys of the first record written.
/// Later records are written in that key order; missing keys become empty
/// cells and unknown keys are ignored.
pub struct CsvItemWriter<T: Write> {
    wrapper: RefCell<Writer<T>>,
    has_headers: bool,
    keys: RefCell<Option<Vec<String>>>,
    header_written: Cell<bool>,
}

impl<T: Write> ItemWriter<Record> for CsvItemWriter<T> {
    fn write(&self, items: &[Record]) -> Result<(), TabError> {
        let mut wrapper = self.wrapper.borrow_mut();

        for item in items {
            let mut keys = self.keys.borrow_mut();
            let keys = keys.get_or_insert_with(|| item.keys().cloned().collect());

            if self.has_headers && !self.header_written.get() {
                wrapper.write_record(keys.iter()).map_err(to_writer_error)?;
                self.header_written.set(true);
            }

            let cells = keys
                .iter()
                .map(|key| item.get(key).map(cell).unwrap_or_default());
            wrapper.write_record(cells).map_err(to_writer_error)?;
        }
        Ok(())
    }

    /// Flushes the internal buffer and the underlying writer.
    fn flush(&self) -> Result<(), TabError> {
        self.wrapper
            .borrow_mut()
            .flush()
            .map_err(|error| TabError::ItemWriter(error.to_string()))
    }
}

impl<T: Write> CsvItemWriter<T> {
    pub fn into_inner(self) -> Result<T, TabError> {
        self.wrapper
            .into_inner()
            .into_inner()
            .map_err(|error| TabError::ItemWriter(error.to_string()))
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn to_writer_error(error: csv::Error) -> TabError {
    TabError::ItemWriter(error.to_string())
}

pub struct CsvItemWriterBuilder {
    delimiter: u8,
    has_headers: bool,
}

impl Default for CsvItemWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvItemWriterBuilder {
    pub fn new() -> CsvItemWriterBuilder {
        CsvItemWriterBuilder {
            delimiter: b',',
            has_headers: true,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> CsvItemWriterBuilder {
        self.delimiter = delimiter;
        self
    }

    pub fn has_headers(mut self, yes: bool) -> CsvItemWriterBuilder {
        self.has_headers = yes;
        self
    }

    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvItemWriter<File>, TabError> {
        let file = File::create(path)?;
        Ok(self.from_writer(file))
    }

    /// Creates a writer over any sink.
    ///
    /// ```
    /// use serde_json::json;
    /// use tabutils::core::item::{ItemWriter, Record};
    /// use tabutils::item::csv::csv_writer::CsvItemWriterBuilder;
    ///
    /// let record: Record = json!({"city": "Boston", "pop": 4628910})
    ///     .as_object()
    ///     .cloned()
    ///     .unwrap();
    ///
    /// let wtr = CsvItemWriterBuilder::new().from_writer(vec![]);
    /// wtr.write(&[record]).unwrap();
    ///
    /// let data = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
    /// assert_eq!(data, "city,pop\nBoston,4628910\n");
    /// ```
    pub fn from_writer<W: Write>(self, wtr: W) -> CsvItemWriter<W> {
        let wtr = WriterBuilder::new()
            .flexible(false)
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_writer(wtr);

        CsvItemWriter {
            wrapper: RefCell::new(wtr),
            has_headers: self.has_headers,
            keys: RefCell::new(None),
            header_written: Cell::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn records_should_follow_first_record_key_order() -> Result<(), Box<dyn Error>> {
        let wtr = CsvItemWriterBuilder::new().from_writer(vec![]);

        wtr.write(&[record(json!({"city": "Boston", "country": "United States"}))])?;
        wtr.write(&[record(json!({"country": "France", "city": "Paris, TX", "extra": 1}))])?;
        wtr.write(&[record(json!({"city": null}))])?;

        let data = String::from_utf8(wtr.into_inner()?)?;
        assert_eq!(
            data,
            "city,country\nBoston,United States\n\"Paris, TX\",France\n,\n"
        );
        Ok(())
    }

    #[test]
    fn headers_can_be_disabled() -> Result<(), Box<dyn Error>> {
        let wtr = CsvItemWriterBuilder::new()
            .has_headers(false)
            .delimiter(b';')
            .from_writer(vec![]);

        wtr.write(&[record(json!({"a": 1.5, "b": true}))])?;

        let data = String::from_utf8(wtr.into_inner()?)?;
        assert_eq!(data, "1.5;true\n");
        Ok(())
    }
}
