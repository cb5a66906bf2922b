use thiserror::Error;

#[cfg(feature = "geojson")]
use crate::geo::geometry::DepthError;

#[derive(Error, Debug)]
/// Error raised while reading, validating or writing tabular records
pub enum TabError {
    /// No supported encoding decodes the leading sample of the input.
    #[error("Encoding: {0}")]
    Encoding(String),

    /// The resolved encoding stopped decoding past the sample.
    #[error("Decode: {encoding} cannot decode input at byte {offset}")]
    Decode {
        encoding: &'static str,
        offset: u64,
    },

    /// Structural break in delimited text, such as an unterminated quoted field.
    #[error("MalformedRow at line {line}: {message}")]
    MalformedRow { line: u64, message: String },

    /// Row width differs from the header while strict mode is on.
    #[error("ColumnCount at line {line}: expected {expected} fields, found {found}")]
    ColumnCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[cfg(feature = "geojson")]
    #[error(transparent)]
    Depth(#[from] DepthError),

    #[cfg(feature = "geojson")]
    #[error("Validation of record {index}: {source}")]
    Validation {
        index: usize,
        #[source]
        source: DepthError,
    },

    #[error("MissingField: {0}")]
    MissingField(String),

    #[error("ItemWriter from: {0}")]
    ItemWriter(String),

    #[error("ItemReader from: {0}")]
    ItemReader(String),

    #[cfg(feature = "xls")]
    #[error("Excel: {0}")]
    Excel(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
