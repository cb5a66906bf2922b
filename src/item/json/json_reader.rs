use std::{
    cell::{Cell, RefCell},
    fs::File,
    io::{BufRead, BufReader, Read},
    marker::PhantomData,
    path::Path,
};

use log::debug;
use serde::de::DeserializeOwned;

use crate::{
    core::item::{ItemReader, ItemReaderResult, Record},
    encoding::{decode_reader::map_read_error, DecodeReader, EncodingResolver, Sniffed},
    error::TabError,
};

type Source<R> = BufReader<DecodeReader<Sniffed<R>>>;

/// Splits decoded JSON text into one top-level object at a time.
///
/// Strings are tracked so braces inside them do not count, and escapes are
/// honoured so `\"` does not close a string.
struct ObjectScanner<B> {
    inner: B,
    newline: bool,
    line: u64,
    in_array: bool,
    buffer: Vec<u8>,
}

impl<B: BufRead> ObjectScanner<B> {
    fn new(inner: B, newline: bool) -> Self {
        Self {
            inner,
            newline,
            line: 1,
            in_array: false,
            buffer: Vec::new(),
        }
    }

    fn peek(&mut self) -> Result<Option<u8>, TabError> {
        let available = self.inner.fill_buf().map_err(map_read_error)?;
        Ok(available.first().copied())
    }

    fn bump(&mut self) -> Result<Option<u8>, TabError> {
        let byte = self.peek()?;
        if let Some(byte) = byte {
            self.inner.consume(1);
            if byte == b'\n' {
                self.line += 1;
            }
        }
        Ok(byte)
    }

    fn skip_whitespace(&mut self) -> Result<Option<u8>, TabError> {
        while let Some(byte) = self.peek()? {
            if !byte.is_ascii_whitespace() {
                return Ok(Some(byte));
            }
            self.bump()?;
        }
        Ok(None)
    }

    fn malformed(&self, message: &str) -> TabError {
        TabError::MalformedRow {
            line: self.line,
            message: message.to_string(),
        }
    }

    /// Returns the raw bytes of the next object, `None` at the end.
    fn next_object(&mut self) -> Result<Option<&[u8]>, TabError> {
        if self.newline {
            return self.next_line();
        }

        if !self.in_array {
            match self.skip_whitespace()? {
                None => return Ok(None),
                Some(b'[') => {
                    self.bump()?;
                    self.in_array = true;
                }
                Some(_) => return Err(self.malformed("expected a JSON array")),
            }
        }

        loop {
            match self.skip_whitespace()? {
                None => return Err(self.malformed("unterminated JSON array")),
                Some(b',') => {
                    self.bump()?;
                }
                Some(b']') => {
                    self.bump()?;
                    return Ok(None);
                }
                Some(b'{') => break,
                Some(_) => return Err(self.malformed("expected a JSON object")),
            }
        }

        self.buffer.clear();
        let start = self.line;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        while let Some(byte) = self.bump()? {
            self.buffer.push(byte);

            if in_string {
                match byte {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }

            match byte {
                b'"' => in_string = true,
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Some(&self.buffer));
                    }
                }
                _ => {}
            }
        }

        Err(TabError::MalformedRow {
            line: start,
            message: "unterminated JSON object".to_string(),
        })
    }

    fn next_line(&mut self) -> Result<Option<&[u8]>, TabError> {
        loop {
            self.buffer.clear();
            let read = self
                .inner
                .read_until(b'\n', &mut self.buffer)
                .map_err(map_read_error)?;
            if read == 0 {
                return Ok(None);
            }
            if !self.buffer.iter().all(u8::is_ascii_whitespace) {
                return Ok(Some(&self.buffer));
            }
        }
    }
}

/// A JSON reader producing one item per top-level object.
///
/// Accepts either a JSON array of objects, or newline-delimited JSON (one
/// object per line) when built with `newline(true)`. Only one object is held
/// in memory at a time. Scalars keep their JSON types: `{"a": 2}` reads as
/// the number `2`, not the string `"2"`.
///
/// The source is dropped once exhausted, on the first error, or on `close`.
pub struct JsonItemReader<R, T = Record> {
    pd: PhantomData<T>,
    scanner: RefCell<Option<ObjectScanner<Source<R>>>>,
    count: Cell<usize>,
}

impl<R: Read, T: DeserializeOwned> JsonItemReader<R, T> {
    /// Number of items produced so far.
    pub fn count(&self) -> usize {
        self.count.get()
    }

    fn next_item(scanner: &mut ObjectScanner<Source<R>>) -> Result<Option<T>, TabError> {
        match scanner.next_object()? {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }
}

impl<R: Read, T: DeserializeOwned> ItemReader<T> for JsonItemReader<R, T> {
    fn read(&self) -> ItemReaderResult<T> {
        let mut slot = self.scanner.borrow_mut();
        let Some(scanner) = slot.as_mut() else {
            return Ok(None);
        };

        match Self::next_item(scanner) {
            Ok(Some(item)) => {
                self.count.set(self.count.get() + 1);
                Ok(Some(item))
            }
            Ok(None) => {
                debug!("Json source exhausted after {} items", self.count.get());
                *slot = None;
                Ok(None)
            }
            Err(error) => {
                *slot = None;
                Err(error)
            }
        }
    }

    fn close(&self) {
        self.scanner.borrow_mut().take();
    }
}

pub struct JsonItemReaderBuilder<T = Record> {
    _pd: PhantomData<T>,
    capacity: usize,
    newline: bool,
    encoding: Option<String>,
}

impl<T: DeserializeOwned> Default for JsonItemReaderBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> JsonItemReaderBuilder<T> {
    pub fn new() -> JsonItemReaderBuilder<T> {
        Self {
            _pd: PhantomData,
            capacity: 8 * 1024,
            newline: false,
            encoding: None,
        }
    }

    /// Size of the read buffer.
    pub fn capacity(mut self, capacity: usize) -> JsonItemReaderBuilder<T> {
        self.capacity = capacity;
        self
    }

    /// Reads one object per line instead of an array.
    pub fn newline(mut self, yes: bool) -> JsonItemReaderBuilder<T> {
        self.newline = yes;
        self
    }

    /// Declared input encoding, checked against a sample like the csv reader.
    pub fn encoding(mut self, label: &str) -> JsonItemReaderBuilder<T> {
        self.encoding = Some(label.to_string());
        self
    }

    pub fn from_reader<R: Read>(self, rdr: R) -> Result<JsonItemReader<R, T>, TabError> {
        let decoder = EncodingResolver::default().decode(rdr, self.encoding.as_deref())?;
        debug!("Reading json as {}", decoder.encoding().name());

        let source = BufReader::with_capacity(self.capacity, decoder);
        Ok(JsonItemReader {
            pd: PhantomData,
            scanner: RefCell::new(Some(ObjectScanner::new(source, self.newline))),
            count: Cell::new(0),
        })
    }

    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<JsonItemReader<File, T>, TabError> {
        let file = File::open(path.as_ref())?;
        debug!("Opened {}", path.as_ref().display());
        self.from_reader(file)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Point {
        a: i64,
        b: i64,
    }

    #[test]
    fn array_items_keep_json_types() -> Result<(), TabError> {
        let data: &[u8] = br#"[ {"a": 2, "b": "x"},
            {"a": {"nested": [1, 2]}, "b": null} ]"#;
        let reader = JsonItemReaderBuilder::<Record>::new().from_reader(data)?;

        let first = reader.read()?.unwrap();
        assert_eq!(first["a"], json!(2));
        assert_eq!(first["b"], json!("x"));

        let second = reader.read()?.unwrap();
        assert_eq!(second["a"], json!({"nested": [1, 2]}));

        assert!(reader.read()?.is_none());
        assert!(reader.read()?.is_none());
        assert_eq!(reader.count(), 2);
        Ok(())
    }

    #[test]
    fn braces_inside_strings_are_ignored() -> Result<(), TabError> {
        let data: &[u8] = br#"[{"text": "} not the end {", "quote": "say \"}\""}]"#;
        let reader = JsonItemReaderBuilder::<Record>::new().from_reader(data)?;

        let record = reader.read()?.unwrap();
        assert_eq!(record["text"], "} not the end {");
        assert_eq!(record["quote"], "say \"}\"");
        Ok(())
    }

    #[test]
    fn newline_items_are_read_line_by_line() -> Result<(), TabError> {
        let data: &[u8] = b"{\"a\": 2, \"b\": 3}\n\n{\"a\": 4, \"b\": 5}\n";
        let reader = JsonItemReaderBuilder::<Point>::new()
            .newline(true)
            .capacity(4)
            .from_reader(data)?;

        assert_eq!(reader.read()?, Some(Point { a: 2, b: 3 }));
        assert_eq!(reader.read()?, Some(Point { a: 4, b: 5 }));
        assert_eq!(reader.read()?, None);
        Ok(())
    }

    #[test]
    fn key_order_is_preserved() -> Result<(), TabError> {
        let data: &[u8] = br#"[{"z": 1, "a": 2, "m": 3}]"#;
        let reader = JsonItemReaderBuilder::<Record>::new().from_reader(data)?;

        let record = reader.read()?.unwrap();
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);
        Ok(())
    }

    #[test]
    fn truncated_array_is_malformed() -> Result<(), TabError> {
        let data: &[u8] = b"[{\"a\": 1},\n{\"a\": ";
        let reader = JsonItemReaderBuilder::<Record>::new().from_reader(data)?;

        assert!(reader.read()?.is_some());
        assert!(matches!(reader.read(), Err(TabError::MalformedRow { line: 2, .. })));
        assert!(reader.read()?.is_none());
        Ok(())
    }

    #[test]
    fn invalid_object_is_a_json_error() -> Result<(), TabError> {
        let data: &[u8] = b"{\"a\": }\n";
        let reader = JsonItemReaderBuilder::<Record>::new()
            .newline(true)
            .from_reader(data)?;

        assert!(matches!(reader.read(), Err(TabError::Json(_))));
        Ok(())
    }

    #[test]
    fn empty_input_has_no_items() -> Result<(), TabError> {
        let data: &[u8] = b"  \n";
        let reader = JsonItemReaderBuilder::<Record>::new().from_reader(data)?;

        assert!(reader.read()?.is_none());
        Ok(())
    }
}
