use std::io::{self, ErrorKind, Read};

use encoding_rs::{Decoder, DecoderResult, Encoding};
use thiserror::Error;

use crate::error::TabError;

const INPUT_CAPACITY: usize = 8 * 1024;

/// The input stopped decoding under the resolved encoding.
///
/// Travels inside an [`io::Error`] of kind `InvalidData` through the
/// `Read`-based parsers and is turned back into [`TabError::Decode`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{encoding} cannot decode input at byte {offset}")]
pub struct DecodeFailure {
    pub encoding: &'static str,
    pub offset: u64,
}

impl From<DecodeFailure> for TabError {
    fn from(failure: DecodeFailure) -> Self {
        TabError::Decode {
            encoding: failure.encoding,
            offset: failure.offset,
        }
    }
}

/// Converts an I/O error raised while reading decoded text into a `TabError`,
/// recovering a [`DecodeFailure`] when there is one.
pub fn map_read_error(error: io::Error) -> TabError {
    let failure = error
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<DecodeFailure>())
        .copied();

    match failure {
        Some(failure) => failure.into(),
        None => TabError::Io(error),
    }
}

/// Streaming transcoder from any supported encoding to UTF-8.
///
/// Decoding is strict: the first malformed sequence ends the stream with a
/// [`DecodeFailure`] carrying its byte offset. Text decoded before that
/// point is still handed out first. A leading BOM of the resolved encoding
/// is dropped.
pub struct DecodeReader<R> {
    inner: R,
    encoding: &'static Encoding,
    decoder: Decoder,
    input: Box<[u8]>,
    start: usize,
    end: usize,
    eof: bool,
    finished: bool,
    consumed: u64,
    failed_at: Option<u64>,
    pending: Vec<u8>,
    pos: usize,
}

impl<R: Read> DecodeReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            decoder: encoding.new_decoder_with_bom_removal(),
            input: vec![0; INPUT_CAPACITY].into_boxed_slice(),
            start: 0,
            end: 0,
            eof: false,
            finished: false,
            consumed: 0,
            failed_at: None,
            pending: Vec::new(),
            pos: 0,
        }
    }

    /// The encoding the input is decoded with.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    fn refill(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.pos = 0;

        while self.pending.is_empty() {
            if let Some(offset) = self.failed_at {
                return Err(io::Error::new(
                    ErrorKind::InvalidData,
                    DecodeFailure {
                        encoding: self.encoding.name(),
                        offset,
                    },
                ));
            }
            if self.finished {
                return Ok(());
            }

            if self.start == self.end && !self.eof {
                self.end = read_retrying(&mut self.inner, &mut self.input)?;
                self.start = 0;
                self.eof = self.end == 0;
            }

            let src = &self.input[self.start..self.end];
            let capacity = self
                .decoder
                .max_utf8_buffer_length_without_replacement(src.len())
                .unwrap_or(src.len() * 3 + 16);
            self.pending.resize(capacity.max(4), 0);

            let (result, read, written) =
                self.decoder
                    .decode_to_utf8_without_replacement(src, &mut self.pending, self.eof);
            self.pending.truncate(written);
            self.start += read;
            self.consumed += read as u64;

            match result {
                DecoderResult::InputEmpty => {
                    if self.eof {
                        self.finished = true;
                    }
                }
                DecoderResult::OutputFull => {}
                DecoderResult::Malformed(bad, extra) => {
                    self.failed_at = Some(self.consumed - u64::from(bad) - u64::from(extra));
                }
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for DecodeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos == self.pending.len() {
            self.refill()?;
        }

        let available = &self.pending[self.pos..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.pos += count;
        Ok(count)
    }
}

fn read_retrying<R: Read>(rdr: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match rdr.read(buf) {
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}
