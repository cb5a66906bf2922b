/// Reader and writer traits shared by every format.
pub mod item;

/// Chunked transfer of items from a reader into a writer.
pub mod step;
