use std::io::BufRead;

use crate::{encoding::decode_reader::map_read_error, error::TabError};

/// A physical row of delimited text.
#[derive(Debug, PartialEq)]
pub struct Row {
    /// 1-based line the row starts on.
    pub line: u64,
    pub fields: Vec<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Splits UTF-8 text into rows of fields.
///
/// Follows RFC 4180: fields may be wrapped in the quote character, a doubled
/// quote inside a quoted field is a literal quote, and quoted fields may span
/// lines. Rows end at `\n`, `\r` or `\r\n`. [`RowSplitter::next_row`] skips
/// blank lines, [`RowSplitter::next_physical_row`] reports them. Text
/// after a closing quote is appended to the field as-is.
///
/// Delimiter and quote must be ASCII, which keeps byte-level splitting safe
/// on UTF-8 input.
pub struct RowSplitter<R> {
    inner: R,
    delimiter: u8,
    quote: u8,
    line: u64,
    skip_lf: bool,
}

impl<R: BufRead> RowSplitter<R> {
    pub fn new(inner: R, delimiter: u8, quote: u8) -> Self {
        Self {
            inner,
            delimiter,
            quote,
            line: 1,
            skip_lf: false,
        }
    }

    /// Reads the next non-blank row.
    ///
    /// Fails with [`TabError::MalformedRow`] when the input ends inside a
    /// quoted field.
    pub fn next_row(&mut self) -> Result<Option<Row>, TabError> {
        self.split(false)
    }

    /// Reads the next physical row, a blank line being a row with one empty
    /// field.
    pub fn next_physical_row(&mut self) -> Result<Option<Row>, TabError> {
        self.split(true)
    }

    fn split(&mut self, keep_blank: bool) -> Result<Option<Row>, TabError> {
        let mut fields = Vec::new();
        let mut field = Vec::new();
        let mut state = State::FieldStart;
        let mut row_line: Option<u64> = None;

        loop {
            let buf = self.inner.fill_buf().map_err(map_read_error)?;

            if buf.is_empty() {
                let Some(line) = row_line else {
                    return Ok(None);
                };
                if state == State::Quoted {
                    return Err(TabError::MalformedRow {
                        line,
                        message: "unterminated quoted field".to_string(),
                    });
                }
                fields.push(into_field(field, line)?);
                return Ok(Some(Row { line, fields }));
            }

            let mut consumed = 0;
            let mut row_done = false;

            for &byte in buf {
                consumed += 1;

                if self.skip_lf {
                    self.skip_lf = false;
                    if byte == b'\n' {
                        continue;
                    }
                }

                if state == State::Quoted {
                    if byte == self.quote {
                        state = State::QuoteInQuoted;
                    } else {
                        if byte == b'\n' {
                            self.line += 1;
                        }
                        field.push(byte);
                    }
                    continue;
                }

                if state == State::QuoteInQuoted && byte == self.quote {
                    field.push(byte);
                    state = State::Quoted;
                    continue;
                }

                if byte == b'\n' || byte == b'\r' {
                    self.skip_lf = byte == b'\r';
                    if keep_blank && row_line.is_none() {
                        row_line = Some(self.line);
                    }
                    self.line += 1;
                    if let Some(line) = row_line {
                        fields.push(into_field(std::mem::take(&mut field), line)?);
                        row_done = true;
                        break;
                    }
                    continue;
                }

                let line = *row_line.get_or_insert(self.line);
                if byte == self.delimiter {
                    fields.push(into_field(std::mem::take(&mut field), line)?);
                    state = State::FieldStart;
                } else if byte == self.quote && state == State::FieldStart {
                    state = State::Quoted;
                } else {
                    field.push(byte);
                    state = State::Unquoted;
                }
            }

            self.inner.consume(consumed);

            if row_done {
                let line = row_line.unwrap_or(self.line);
                return Ok(Some(Row { line, fields }));
            }
        }
    }
}

fn into_field(bytes: Vec<u8>, line: u64) -> Result<String, TabError> {
    String::from_utf8(bytes).map_err(|error| TabError::MalformedRow {
        line,
        message: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor};

    use super::*;

    fn split(text: &str) -> Result<Vec<Vec<String>>, TabError> {
        split_with(text, 4)
    }

    fn split_with(text: &str, capacity: usize) -> Result<Vec<Vec<String>>, TabError> {
        let reader = BufReader::with_capacity(capacity, Cursor::new(text.as_bytes().to_vec()));
        let mut splitter = RowSplitter::new(reader, b',', b'"');
        let mut rows = Vec::new();
        while let Some(row) = splitter.next_row()? {
            rows.push(row.fields);
        }
        Ok(rows)
    }

    #[test]
    fn plain_rows_with_any_line_ending() {
        let rows = split("a,b,c\r\n1,2,3\n4,5,6\r7,8,9").unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["a", "b", "c"],
                vec!["1", "2", "3"],
                vec!["4", "5", "6"],
                vec!["7", "8", "9"],
            ]
        );
    }

    #[test]
    fn quoted_fields_keep_delimiters_newlines_and_quotes() {
        let rows = split("name,note\n\"Doe, J\",\"said \"\"hi\"\"\nthen left\"\n").unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["name", "note"],
                vec!["Doe, J", "said \"hi\"\nthen left"],
            ]
        );
    }

    #[test]
    fn blank_lines_are_skipped_and_empty_fields_kept() {
        let rows = split("a,b\n\n\r\n,\n\"\",x\n").unwrap();
        assert_eq!(rows, vec![vec!["a", "b"], vec!["", ""], vec!["", "x"]]);
    }

    #[test]
    fn multibyte_text_survives_small_buffers() {
        let rows = split_with("ʤ,©\nĀdam,Iñtërnâtiônàližætiøn\n", 1).unwrap();
        assert_eq!(
            rows,
            vec![vec!["ʤ", "©"], vec!["Ādam", "Iñtërnâtiônàližætiøn"]]
        );
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        let error = split("a,b\n1,\"open\n2,3\n").unwrap_err();
        match error {
            TabError::MalformedRow { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn physical_rows_include_blank_lines() {
        let reader = Cursor::new(b"\n\r\nh1,h2\n\n1,2\n".to_vec());
        let mut splitter = RowSplitter::new(reader, b',', b'"');

        let first = splitter.next_physical_row().unwrap().unwrap();
        assert_eq!(first, Row { line: 1, fields: vec![String::new()] });
        assert_eq!(splitter.next_physical_row().unwrap().unwrap().line, 2);

        let header = splitter.next_row().unwrap().unwrap();
        assert_eq!((header.line, header.fields), (3, vec!["h1".to_string(), "h2".to_string()]));
        assert_eq!(splitter.next_row().unwrap().unwrap().line, 5);
        assert!(splitter.next_physical_row().unwrap().is_none());
    }

    #[test]
    fn rows_report_their_starting_line() {
        let reader = Cursor::new(b"a\n\n\"x\ny\"\nz\n".to_vec());
        let mut splitter = RowSplitter::new(reader, b',', b'"');

        assert_eq!(splitter.next_row().unwrap().unwrap().line, 1);
        assert_eq!(splitter.next_row().unwrap().unwrap().line, 3);
        assert_eq!(splitter.next_row().unwrap().unwrap().line, 5);
        assert!(splitter.next_row().unwrap().is_none());
    }
}
