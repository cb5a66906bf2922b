use std::io::{Chain, Cursor, Read, Seek, SeekFrom};

use encoding_rs::{DecoderResult, Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use log::{debug, warn};

use crate::error::TabError;

use super::decode_reader::DecodeReader;

/// Number of leading bytes inspected when no size is configured.
pub const DEFAULT_SAMPLE_SIZE: usize = 64 * 1024;

/// A byte source whose leading sample has been read and put back in front.
pub type Sniffed<R> = Chain<Cursor<Vec<u8>>, R>;

/// Looks up an encoding by label.
///
/// Accepts the WHATWG labels understood by `encoding_rs` (`utf-8`, `latin1`,
/// `utf-16be`, ...) as well as the spellings `utf-16-be`, `utf_16_le` and
/// `latin-1`. Latin-1 resolves to `windows-1252`, its WHATWG superset.
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    let normalized = label.trim().to_ascii_lowercase().replace('_', "-");

    Encoding::for_label(normalized.as_bytes()).or(match normalized.as_str() {
        "utf-16-be" => Some(UTF_16BE),
        "utf-16-le" => Some(UTF_16LE),
        "latin-1" | "iso-8859-1" | "iso8859-1" => Some(WINDOWS_1252),
        _ => None,
    })
}

/// Detects or validates the text encoding of a byte source by inspecting
/// a leading sample.
///
/// Resolution order when nothing is declared:
///
/// 1. byte-order mark
/// 2. NUL-byte pattern of BOM-less UTF-16
/// 3. the remaining candidates in order, UTF-16 variants last
///
/// Every guess must decode the sample without error to be accepted. A
/// decoding full of control characters is only kept when nothing reads as
/// plain text, which catches BOM-less UTF-16 made mostly of non-Latin
/// characters.
///
/// # Examples
///
/// ```
/// use tabutils::encoding::EncodingResolver;
///
/// let resolver = EncodingResolver::default();
///
/// let encoding = resolver.resolve(b"a,b,c\n4,5,\xa9\n", true, None).unwrap();
/// assert_eq!(encoding.name(), "windows-1252");
///
/// let encoding = resolver.resolve(b"\xff\xfea\x00,\x00b\x00", true, None).unwrap();
/// assert_eq!(encoding.name(), "UTF-16LE");
/// ```
pub struct EncodingResolver {
    sample_size: usize,
    candidates: Vec<&'static Encoding>,
}

impl Default for EncodingResolver {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            candidates: vec![UTF_8, UTF_16BE, UTF_16LE, WINDOWS_1252],
        }
    }
}

impl EncodingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many leading bytes are inspected.
    pub fn sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size.max(1);
        self
    }

    /// Restricts detection to the given encodings.
    pub fn candidates(mut self, candidates: Vec<&'static Encoding>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Resolves the encoding of `sample`.
    ///
    /// `complete` tells whether the sample holds the whole input; when it does
    /// not, a multi-byte sequence cut at the end of the sample is accepted.
    ///
    /// A declared encoding is kept when it decodes the sample. An unknown
    /// label or a declared encoding that fails falls back to detection.
    pub fn resolve(
        &self,
        sample: &[u8],
        complete: bool,
        declared: Option<&str>,
    ) -> Result<&'static Encoding, TabError> {
        if let Some(label) = declared {
            match lookup(label) {
                Some(encoding) if decodes(encoding, sample, complete) => {
                    debug!("Declared encoding {} accepted", encoding.name());
                    return Ok(encoding);
                }
                Some(encoding) => warn!(
                    "Declared encoding {} does not decode the sample, detecting instead",
                    encoding.name()
                ),
                None => warn!("Unknown encoding label {:?}, detecting instead", label),
            }
        }

        self.detect(sample, complete)
    }

    /// Resolves the encoding of a seekable stream and restores its position.
    pub fn resolve_stream<S: Read + Seek>(
        &self,
        stream: &mut S,
        declared: Option<&str>,
    ) -> Result<&'static Encoding, TabError> {
        let position = stream.stream_position()?;
        let (sample, complete) = read_sample(stream, self.sample_size)?;
        stream.seek(SeekFrom::Start(position))?;

        self.resolve(&sample, complete, declared)
    }

    /// Resolves the encoding of `rdr` and wraps it into a reader yielding UTF-8.
    ///
    /// The sample is chained back in front of the remaining bytes, so any
    /// `Read` works without seeking.
    pub fn decode<R: Read>(
        &self,
        mut rdr: R,
        declared: Option<&str>,
    ) -> Result<DecodeReader<Sniffed<R>>, TabError> {
        let (sample, complete) = read_sample(&mut rdr, self.sample_size)?;
        let encoding = self.resolve(&sample, complete, declared)?;

        Ok(DecodeReader::new(Cursor::new(sample).chain(rdr), encoding))
    }

    fn detect(&self, sample: &[u8], complete: bool) -> Result<&'static Encoding, TabError> {
        let guess = Encoding::for_bom(sample)
            .map(|(encoding, _)| encoding)
            .or_else(|| utf16_by_nul_pattern(sample));

        let ordered = guess
            .into_iter()
            .filter(|encoding| self.candidates.contains(encoding))
            .chain(self.candidates.iter().copied().filter(|e| !is_utf16(e)))
            .chain(self.candidates.iter().copied().filter(|e| is_utf16(e)));

        let mut fallback = None;
        let mut best_utf16: Option<(&'static Encoding, usize)> = None;

        for encoding in ordered {
            let Some(text) = decode_sample(encoding, sample, complete) else {
                continue;
            };
            if !looks_like_text(&text) {
                fallback.get_or_insert(encoding);
                continue;
            }
            if guess == Some(encoding) || !is_utf16(&encoding) {
                debug!("Detected encoding {}", encoding.name());
                return Ok(encoding);
            }

            // Both byte orders of BOM-less UTF-16 usually decode; delimiters
            // and line breaks only come out as ASCII in the right one.
            let ascii = text.chars().filter(char::is_ascii).count();
            if best_utf16.is_none_or(|(_, best)| ascii > best) {
                best_utf16 = Some((encoding, ascii));
            }
        }

        if let Some((encoding, _)) = best_utf16 {
            debug!("Detected encoding {}", encoding.name());
            return Ok(encoding);
        }
        if let Some(encoding) = fallback {
            warn!(
                "Sample decodes as {} but holds control characters",
                encoding.name()
            );
            return Ok(encoding);
        }

        let tried: Vec<&str> = self.candidates.iter().map(|e| e.name()).collect();
        Err(TabError::Encoding(format!(
            "none of {} decodes the first {} bytes",
            tried.join(", "),
            sample.len()
        )))
    }
}

fn is_utf16(encoding: &&'static Encoding) -> bool {
    *encoding == UTF_16BE || *encoding == UTF_16LE
}

pub(crate) fn read_sample<R: Read>(rdr: &mut R, size: usize) -> std::io::Result<(Vec<u8>, bool)> {
    let mut sample = Vec::with_capacity(size);
    rdr.by_ref().take(size as u64).read_to_end(&mut sample)?;
    let complete = sample.len() < size;
    Ok((sample, complete))
}

fn decodes(encoding: &'static Encoding, sample: &[u8], complete: bool) -> bool {
    decode_sample(encoding, sample, complete).is_some()
}

/// Strictly decodes `sample`, skipping a leading BOM of the same encoding.
fn decode_sample(encoding: &'static Encoding, sample: &[u8], complete: bool) -> Option<String> {
    let mut decoder = encoding.new_decoder_with_bom_removal();
    let capacity = decoder.max_utf8_buffer_length_without_replacement(sample.len())?;

    let mut out = String::with_capacity(capacity);
    let (result, _) = decoder.decode_to_string_without_replacement(sample, &mut out, complete);
    matches!(result, DecoderResult::InputEmpty).then_some(out)
}

/// At most one character in a hundred may be a control character other
/// than tab, line feed, carriage return or form feed.
fn looks_like_text(text: &str) -> bool {
    let mut total = 0usize;
    let mut control = 0usize;
    for c in text.chars() {
        total += 1;
        if c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\x0c') {
            control += 1;
        }
    }
    control * 100 <= total
}

/// Guesses BOM-less UTF-16 from where NUL bytes fall.
///
/// Text made mostly of Latin characters has a zero high byte in nearly every
/// code unit: at even offsets for big-endian, at odd offsets for little-endian.
fn utf16_by_nul_pattern(sample: &[u8]) -> Option<&'static Encoding> {
    let units = sample.len() / 2;
    if units == 0 {
        return None;
    }

    let (mut even, mut odd) = (0usize, 0usize);
    for unit in sample.chunks_exact(2) {
        if unit[0] == 0 {
            even += 1;
        }
        if unit[1] == 0 {
            odd += 1;
        }
    }

    let threshold = (units * 3 / 10).max(1);
    if even >= threshold && odd * 10 < even {
        Some(UTF_16BE)
    } else if odd >= threshold && even * 10 < odd {
        Some(UTF_16LE)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn utf16(text: &str, big_endian: bool) -> Vec<u8> {
        text.encode_utf16()
            .flat_map(|unit| {
                if big_endian {
                    unit.to_be_bytes()
                } else {
                    unit.to_le_bytes()
                }
            })
            .collect()
    }

    #[test]
    fn lookup_should_accept_python_style_labels() {
        assert_eq!(lookup("utf-16-be"), Some(UTF_16BE));
        assert_eq!(lookup("UTF_16_LE"), Some(UTF_16LE));
        assert_eq!(lookup("latin1"), Some(WINDOWS_1252));
        assert_eq!(lookup("latin-1"), Some(WINDOWS_1252));
        assert_eq!(lookup("utf8"), Some(UTF_8));
        assert_eq!(lookup("klingon"), None);
    }

    #[test]
    fn bom_should_win_over_statistics() {
        let mut sample = vec![0xFE, 0xFF];
        sample.extend(utf16("a,b\n1,2\n", true));

        let encoding = EncodingResolver::default().resolve(&sample, true, None).unwrap();
        assert_eq!(encoding, UTF_16BE);
    }

    #[test]
    fn bomless_utf16_should_be_detected_from_nul_pattern() {
        let resolver = EncodingResolver::default();
        let text = "a,b,c\n1,2,3\n4,5,ʤ\n";

        assert_eq!(resolver.resolve(&utf16(text, true), true, None).unwrap(), UTF_16BE);
        assert_eq!(resolver.resolve(&utf16(text, false), true, None).unwrap(), UTF_16LE);
    }

    #[test]
    fn bomless_non_latin_utf16_should_not_pass_as_utf8() {
        let resolver = EncodingResolver::default();
        let text = "имя,город\nИван,Москва\nПётр,Санкт-Петербург\n";

        assert_eq!(resolver.resolve(&utf16(text, false), true, None).unwrap(), UTF_16LE);
        assert_eq!(resolver.resolve(&utf16(text, true), true, None).unwrap(), UTF_16BE);
    }

    #[test]
    fn control_characters_alone_still_resolve() {
        let encoding = EncodingResolver::default()
            .candidates(vec![UTF_8])
            .resolve(b"\x01\x02,\x03\n", true, None)
            .unwrap();
        assert_eq!(encoding, UTF_8);
    }

    #[test]
    fn latin1_bytes_should_fall_through_utf8() {
        let encoding = EncodingResolver::default()
            .resolve(b"a,b,c\n4,5,\xa9\n", true, None)
            .unwrap();
        assert_eq!(encoding, WINDOWS_1252);
    }

    #[test]
    fn failing_declared_encoding_should_fall_back_to_detection() {
        let encoding = EncodingResolver::default()
            .resolve(b"4,5,\xa9\n", true, Some("utf-8"))
            .unwrap();
        assert_eq!(encoding, WINDOWS_1252);
    }

    #[test]
    fn unknown_label_should_fall_back_to_detection() {
        let encoding = EncodingResolver::default()
            .resolve("4,5,ʤ\n".as_bytes(), true, Some("not-an-encoding"))
            .unwrap();
        assert_eq!(encoding, UTF_8);
    }

    #[test]
    fn multibyte_sequence_cut_by_the_sample_is_accepted() {
        let bytes = "abc©".as_bytes();
        let cut = &bytes[..bytes.len() - 1];

        let resolver = EncodingResolver::default().candidates(vec![UTF_8]);
        assert_eq!(resolver.resolve(cut, false, None).unwrap(), UTF_8);
        assert!(matches!(
            resolver.resolve(cut, true, None),
            Err(TabError::Encoding(_))
        ));
    }

    #[test]
    fn no_decoding_candidate_should_be_an_encoding_error() {
        let resolver = EncodingResolver::default().candidates(vec![UTF_8]);
        let result = resolver.resolve(b"\xa9\xa9\xa9", true, None);

        assert!(matches!(result, Err(TabError::Encoding(_))));
    }

    #[test]
    fn resolve_stream_should_restore_position() {
        let mut stream = Cursor::new(b"skip|4,5,\xa9\n".to_vec());
        stream.set_position(5);

        let encoding = EncodingResolver::default()
            .sample_size(4)
            .resolve_stream(&mut stream, None)
            .unwrap();

        assert_eq!(encoding, UTF_8);
        assert_eq!(stream.position(), 5);
    }
}
