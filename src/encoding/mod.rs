/// Text encoding detection and strict transcoding to UTF-8.
///
/// Every text reader of the crate goes through this module: a leading sample
/// of the input is inspected by the [`EncodingResolver`], then the whole input
/// is decoded lazily by a [`DecodeReader`] as records are pulled.
///
/// Supported out of the box: UTF-8, UTF-16BE, UTF-16LE and Latin-1.
///
/// # Examples
///
/// ```
/// use std::io::Read;
/// use tabutils::encoding::EncodingResolver;
///
/// let bytes: &[u8] = b"a,b,c\n4,5,\xa9\n";
/// let mut reader = EncodingResolver::default().decode(bytes, Some("latin1")).unwrap();
///
/// let mut text = String::new();
/// reader.read_to_string(&mut text).unwrap();
/// assert_eq!(text, "a,b,c\n4,5,©\n");
/// ```
pub mod decode_reader;

pub mod resolver;

pub use decode_reader::{DecodeFailure, DecodeReader};
pub use resolver::{lookup, EncodingResolver, Sniffed, DEFAULT_SAMPLE_SIZE};
