/// JSON support for reading and writing records.
///
/// # Module Architecture
///
/// 1. **JsonItemReader**: a streaming reader over a JSON array of objects, or
///    over newline-delimited JSON. It tracks nesting depth and string state
///    byte by byte so only one object is buffered at a time, then hands it to
///    `serde_json`.
///
/// 2. **JsonItemWriter**: serializes items as a JSON array (compact or
///    pretty) or as newline-delimited JSON.
///
/// Each component follows the builder pattern.
///
/// # Examples
///
/// ## Reading newline-delimited JSON
///
/// ```
/// use tabutils::core::item::{ItemReader, Record};
/// use tabutils::item::json::json_reader::JsonItemReaderBuilder;
///
/// let data: &[u8] = b"{\"a\": 2, \"b\": 3}\n{\"a\": 4, \"b\": 5}\n";
///
/// let reader = JsonItemReaderBuilder::<Record>::new()
///     .newline(true)
///     .from_reader(data)
///     .unwrap();
///
/// let record = reader.read().unwrap().unwrap();
/// assert_eq!(record["a"], 2);
/// assert_eq!(record["b"], 3);
/// ```
///
/// ## Re-emitting an array as pretty JSON
///
/// ```
/// use tabutils::core::item::Record;
/// use tabutils::core::step::StepBuilder;
/// use tabutils::item::json::json_reader::JsonItemReaderBuilder;
/// use tabutils::item::json::json_writer::JsonItemWriterBuilder;
///
/// let data: &[u8] = br#"[{"id": 1}, {"id": 2}]"#;
/// let reader = JsonItemReaderBuilder::<Record>::new().from_reader(data).unwrap();
/// let writer = JsonItemWriterBuilder::new().pretty_formatter(true).from_writer(Vec::new());
///
/// let step = StepBuilder::new().reader(&reader).writer(&writer).chunk(1).build().unwrap();
/// let result = step.execute().unwrap();
/// assert_eq!(result.write_count, 2);
///
/// let json = String::from_utf8(writer.into_inner().unwrap()).unwrap();
/// assert_eq!(json, "[\n{\n  \"id\": 1\n},\n{\n  \"id\": 2\n}\n]\n");
/// ```

/// A module providing facilities for reading JSON records.
pub mod json_reader;

/// A module providing facilities for writing JSON records.
pub mod json_writer;

pub use json_reader::{JsonItemReader, JsonItemReaderBuilder};
pub use json_writer::{to_json_lines, JsonItemWriter, JsonItemWriterBuilder};
