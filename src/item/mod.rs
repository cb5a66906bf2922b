#[cfg(feature = "csv")]
/// This module provides a delimited-text item reader and writer.
pub mod csv;

#[cfg(feature = "json")]
/// This module provides a JSON item reader and writer.
pub mod json;

#[cfg(feature = "geojson")]
/// This module provides a GeoJSON item reader.
pub mod geojson;

#[cfg(feature = "xls")]
/// This module provides a spreadsheet item reader.
pub mod xls;

/// Header normalization shared by the tabular readers.
pub mod sanitize;
