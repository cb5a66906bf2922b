/// Delimited-text support for reading and writing records.
///
/// # Module Architecture
///
/// 1. **CsvItemReader**: decodes the input with a resolved encoding, splits it
///    into rows with a quote-aware state machine and turns every row after the
///    header into a [`Record`](crate::core::item::Record). One row is parsed
///    per `read` call.
///
/// 2. **CsvItemWriter**: writes records back as delimited text, the header
///    taken from the first record.
///
/// Both components follow the builder pattern.
///
/// # Examples
///
/// ## Reading Latin-1 data with sanitized keys
///
/// ```
/// use tabutils::item::csv::csv_reader::CsvItemReaderBuilder;
/// use tabutils::core::item::ItemReader;
///
/// let data: &[u8] = b"A,B,C\n1,2,3\n4,5,\xa9\n";
///
/// let reader = CsvItemReaderBuilder::new()
///     .encoding("latin1")
///     .sanitize(true)
///     .from_reader(data)
///     .unwrap();
///
/// let first = reader.read().unwrap().unwrap();
/// assert_eq!(first["a"], "1");
///
/// let second = reader.read().unwrap().unwrap();
/// assert_eq!(second["c"], "©");
///
/// assert!(reader.read().unwrap().is_none());
/// ```
///
/// ## Converting CSV into newline-delimited JSON
///
/// ```
/// use tabutils::item::csv::csv_reader::CsvItemReaderBuilder;
/// use tabutils::item::json::json_writer::JsonItemWriterBuilder;
/// use tabutils::core::step::StepBuilder;
///
/// let data: &[u8] = b"id,name\n1,Alice\n2,Bob\n";
/// let reader = CsvItemReaderBuilder::new().from_reader(data).unwrap();
/// let writer = JsonItemWriterBuilder::new().newline(true).from_writer(Vec::new());
///
/// let step = StepBuilder::new().reader(&reader).writer(&writer).chunk(10).build().unwrap();
/// step.execute().unwrap();
///
/// let json = String::from_utf8(writer.into_inner().unwrap()).unwrap();
/// assert_eq!(json, "{\"id\":\"1\",\"name\":\"Alice\"}\n{\"id\":\"2\",\"name\":\"Bob\"}\n");
/// ```

/// A module providing facilities for reading delimited records.
pub mod csv_reader;

/// A module providing facilities for writing delimited records.
pub mod csv_writer;

/// Quote-aware splitting of decoded text into rows.
pub mod row_splitter;

pub use csv_reader::{CsvItemReader, CsvItemReaderBuilder};
pub use csv_writer::{CsvItemWriter, CsvItemWriterBuilder};
