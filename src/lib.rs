#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # tabutils

 Reading and writing tabular data: delimited text, spreadsheets, JSON and
 GeoJSON, turned into a common [`Record`](core::item::Record) shape and
 written back out as JSON, CSV or a GeoJSON FeatureCollection.

 ## Core Concepts

- **Record:** an ordered map from field name to JSON value. Column order is
  kept end to end.
- **ItemReader:** pulls one record per `read` call. Text inputs are decoded
  lazily, so a bad byte deep in a file fails only the record that contains it.
- **ItemWriter:** receives records chunk by chunk.
- **Step:** drains a reader into a writer.
- **GeoJsonEncoder:** folds a reader into one FeatureCollection, computing
  its bounding box, or fails without producing anything.

 ## Features

| **Feature** | **Description**                                                   |
|-------------|-------------------------------------------------------------------|
| csv         | Delimited-text `ItemReader` and `ItemWriter`                      |
| json        | JSON array / newline-delimited JSON `ItemReader` and `ItemWriter` |
| geojson     | GeoJSON `ItemReader`, geometry validation and the encoder         |
| xls         | Spreadsheet `ItemReader` (xls, xlsx, xlsb, ods)                   |
| full        | Enables all available features                                    |

 ## Getting Started

```toml
[dependencies]
tabutils = { version = "<version>", features = ["<full|csv|json|geojson|xls>"] }
```

```rust
# use tabutils::{
#     core::step::StepBuilder,
#     error::TabError,
#     item::csv::csv_reader::CsvItemReaderBuilder,
#     item::json::json_writer::JsonItemWriterBuilder,
# };
fn main() -> Result<(), TabError> {
    let csv = "Sepal Length,Sepal Width,Species\n5.1,3.5,Iris-setosa\n4.9,3.0,Iris-setosa\n";

    let reader = CsvItemReaderBuilder::new()
        .sanitize(true)
        .from_reader(csv.as_bytes())?;

    let writer = JsonItemWriterBuilder::new()
        .newline(true)
        .from_writer(Vec::new());

    let step = StepBuilder::new()
        .reader(&reader)
        .writer(&writer)
        .chunk(100)
        .build()?;
    let result = step.execute()?;
    assert_eq!(result.write_count, 2);

    let json = String::from_utf8(writer.into_inner()?).unwrap_or_default();
    assert!(json.starts_with(r#"{"sepal_length":"5.1","sepal_width":"3.5","species":"Iris-setosa"}"#));
    Ok(())
}
```
 */

/// Reader and writer traits, plus the step that connects them
pub mod core;

/// Error types for reading, validating and writing
pub mod error;

#[doc(inline)]
pub use error::*;

/// Encoding detection and strict decoding to UTF-8
pub mod encoding;

#[cfg(feature = "geojson")]
/// Geometry validation and GeoJSON encoding
pub mod geo;

/// Set of items readers / writers (for example: csv reader and writer)
pub mod item;
