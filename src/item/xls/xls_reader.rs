use std::{
    cell::{Cell, RefCell},
    path::Path,
    vec,
};

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use log::debug;
use serde_json::Value;

use crate::{
    core::item::{ItemReader, ItemReaderResult, Record},
    error::TabError,
    item::sanitize::{generated_keys, sanitize_keys},
};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Reads one worksheet as records of strings.
///
/// `first_row` and `first_col` are absolute sheet coordinates: a table whose
/// header sits in `B2` is read with `first_row(1).first_col(1)` and gives the
/// same records as the same table placed in `A1`. Rows where every cell is
/// empty are skipped.
///
/// Cells are rendered as text: numbers as Rust prints an `f64` (`234.0`),
/// booleans as `true`/`false`, dates as `YYYY-MM-DD`, times as `HH:MM:SS`
/// and date-times as `YYYY-MM-DD HH:MM:SS`.
pub struct ExcelItemReader {
    rows: RefCell<Option<vec::IntoIter<Vec<String>>>>,
    keys: Vec<String>,
    count: Cell<usize>,
}

impl ExcelItemReader {
    /// Keys of every record, in column order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Number of records produced so far.
    pub fn count(&self) -> usize {
        self.count.get()
    }
}

impl ItemReader<Record> for ExcelItemReader {
    fn read(&self) -> ItemReaderResult<Record> {
        let mut slot = self.rows.borrow_mut();
        let Some(rows) = slot.as_mut() else {
            return Ok(None);
        };

        let Some(row) = rows.next() else {
            debug!("Sheet exhausted after {} records", self.count.get());
            *slot = None;
            return Ok(None);
        };

        let mut cells = row.into_iter();
        let record: Record = self
            .keys
            .iter()
            .map(|key| (key.clone(), Value::String(cells.next().unwrap_or_default())))
            .collect();

        self.count.set(self.count.get() + 1);
        Ok(Some(record))
    }

    fn close(&self) {
        self.rows.borrow_mut().take();
    }
}

/// Renders a cell the way it is shown to records.
pub fn format_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Float(number) => format!("{:?}", number),
        Data::Int(number) => number.to_string(),
        Data::Bool(flag) => flag.to_string(),
        Data::DateTime(datetime) => format_serial(datetime.as_f64()),
        Data::DateTimeIso(text) | Data::DurationIso(text) => text.clone(),
        Data::Error(error) => error.to_string(),
    }
}

/// Formats an Excel serial date (days since 1899-12-30).
fn format_serial(serial: f64) -> String {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|date| date.and_hms_opt(0, 0, 0));
    let offset = TimeDelta::try_milliseconds((serial * MILLIS_PER_DAY).round() as i64);
    let datetime: Option<NaiveDateTime> =
        offset.and_then(|offset| epoch?.checked_add_signed(offset));

    match datetime {
        None => format!("{:?}", serial),
        Some(datetime) if serial.abs() < 1.0 => datetime.format("%H:%M:%S").to_string(),
        Some(datetime) if datetime.time() == chrono::NaiveTime::MIN => {
            datetime.format("%Y-%m-%d").to_string()
        }
        Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

fn is_blank(row: &[Data]) -> bool {
    row.iter().all(|cell| matches!(cell, Data::Empty))
}

/// A builder for reading a worksheet.
///
/// # Default Configuration
///
/// - Sheet: the first one
/// - Headers: enabled
/// - Sanitize: disabled
/// - First row / first column: 0
pub struct ExcelItemReaderBuilder {
    sheet: usize,
    sheet_name: Option<String>,
    has_headers: bool,
    sanitize: bool,
    first_row: u32,
    first_col: u32,
}

impl Default for ExcelItemReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExcelItemReaderBuilder {
    pub fn new() -> Self {
        Self {
            sheet: 0,
            sheet_name: None,
            has_headers: true,
            sanitize: false,
            first_row: 0,
            first_col: 0,
        }
    }

    /// Zero-based sheet position.
    pub fn sheet(mut self, index: usize) -> Self {
        self.sheet = index;
        self
    }

    /// Selects the sheet by name, overriding [`sheet`](Self::sheet).
    pub fn sheet_name(mut self, name: &str) -> Self {
        self.sheet_name = Some(name.to_string());
        self
    }

    pub fn has_headers(mut self, yes: bool) -> Self {
        self.has_headers = yes;
        self
    }

    /// Normalizes keys with [`sanitize_keys`].
    pub fn sanitize(mut self, yes: bool) -> Self {
        self.sanitize = yes;
        self
    }

    /// Sheet row holding the header (or the first record without headers).
    pub fn first_row(mut self, first_row: u32) -> Self {
        self.first_row = first_row;
        self
    }

    /// Sheet column where the table starts.
    pub fn first_col(mut self, first_col: u32) -> Self {
        self.first_col = first_col;
        self
    }

    /// Opens any workbook format calamine understands (xls, xlsx, xlsb, ods).
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<ExcelItemReader, TabError> {
        let mut workbook =
            open_workbook_auto(path.as_ref()).map_err(|error| TabError::Excel(error.to_string()))?;
        debug!("Opened workbook {}", path.as_ref().display());

        let index = match &self.sheet_name {
            Some(name) => workbook
                .sheet_names()
                .iter()
                .position(|sheet| sheet == name)
                .ok_or_else(|| TabError::Excel(format!("no sheet named {:?}", name)))?,
            None => self.sheet,
        };

        let range = workbook
            .worksheet_range_at(index)
            .ok_or_else(|| TabError::Excel(format!("no sheet at position {}", index)))?
            .map_err(|error| TabError::Excel(error.to_string()))?;

        Ok(self.from_range(&range))
    }

    /// Builds a reader over an already loaded cell range.
    pub fn from_range(self, range: &Range<Data>) -> ExcelItemReader {
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let skip_rows = self.first_row.saturating_sub(start_row) as usize;
        let skip_cols = self.first_col.saturating_sub(start_col) as usize;
        debug!(
            "Sheet range starts at ({}, {}), skipping {} rows and {} columns",
            start_row, start_col, skip_rows, skip_cols
        );

        let mut rows = range
            .rows()
            .skip(skip_rows)
            .map(|row| row.get(skip_cols..).unwrap_or_default())
            .filter(|row| !is_blank(row))
            .map(|row| row.iter().map(format_cell).collect::<Vec<String>>());

        let (keys, first) = if self.has_headers {
            (rows.next().unwrap_or_default(), None)
        } else {
            let first = rows.next();
            (generated_keys(first.as_ref().map_or(0, Vec::len)), first)
        };
        let keys = if self.sanitize {
            sanitize_keys(&keys)
        } else {
            keys
        };
        debug!("Sheet keys: {:?}", keys);

        let records: Vec<Vec<String>> = first.into_iter().chain(rows).collect();

        ExcelItemReader {
            rows: RefCell::new(Some(records.into_iter())),
            keys,
            count: Cell::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use calamine::CellErrorType;

    use super::*;

    fn range(origin: (u32, u32), rows: Vec<Vec<Data>>) -> Range<Data> {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, Vec::len) as u32;
        let mut range = Range::new(origin, (origin.0 + height - 1, origin.1 + width - 1));
        for (r, row) in rows.into_iter().enumerate() {
            for (c, cell) in row.into_iter().enumerate() {
                range.set_value((origin.0 + r as u32, origin.1 + c as u32), cell);
            }
        }
        range
    }

    fn table() -> Vec<Vec<Data>> {
        vec![
            vec![Data::String("Some Value".into()), Data::String("Flag".into())],
            vec![Data::Float(234.0), Data::Bool(false)],
            vec![Data::Empty, Data::Empty],
            vec![Data::Int(164), Data::Bool(true)],
        ]
    }

    fn read_all(reader: &ExcelItemReader) -> Result<Vec<Record>, TabError> {
        let mut records = Vec::new();
        while let Some(record) = reader.read()? {
            records.push(record);
        }
        Ok(records)
    }

    #[test]
    fn header_row_gives_sanitized_keys() -> Result<(), TabError> {
        let reader = ExcelItemReaderBuilder::new()
            .sanitize(true)
            .from_range(&range((0, 0), table()));

        let records = read_all(&reader)?;
        assert_eq!(reader.keys(), ["some_value", "flag"]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["some_value"], "234.0");
        assert_eq!(records[0]["flag"], "false");
        assert_eq!(records[1]["some_value"], "164");
        Ok(())
    }

    #[test]
    fn offset_table_matches_table_at_origin() -> Result<(), TabError> {
        let at_origin = ExcelItemReaderBuilder::new().from_range(&range((0, 0), table()));

        let mut shifted_rows = vec![vec![Data::String("title".into()), Data::Empty, Data::Empty]];
        shifted_rows.extend(table().into_iter().map(|row| {
            let mut shifted = vec![Data::Empty];
            shifted.extend(row);
            shifted
        }));
        let shifted = ExcelItemReaderBuilder::new()
            .first_row(1)
            .first_col(1)
            .from_range(&range((0, 0), shifted_rows));

        assert_eq!(read_all(&at_origin)?, read_all(&shifted)?);
        Ok(())
    }

    #[test]
    fn offsets_are_absolute_when_range_is_trimmed() -> Result<(), TabError> {
        let reader = ExcelItemReaderBuilder::new()
            .first_row(1)
            .first_col(1)
            .from_range(&range((1, 1), table()));

        let records = read_all(&reader)?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["Flag"], "true");
        Ok(())
    }

    #[cfg(feature = "csv")]
    #[test]
    fn leading_blank_rows_skip_alike_in_sheets_and_csv() -> Result<(), TabError> {
        use crate::item::csv::csv_reader::CsvItemReaderBuilder;

        let mut rows = vec![vec![Data::Empty, Data::Empty], vec![Data::Empty, Data::Empty]];
        rows.push(vec![Data::String("h1".into()), Data::String("h2".into())]);
        rows.push(vec![Data::String("1".into()), Data::String("2".into())]);
        let sheet = ExcelItemReaderBuilder::new()
            .first_row(2)
            .from_range(&range((0, 0), rows));

        let data: &[u8] = b"\n\nh1,h2\n1,2\n";
        let csv = CsvItemReaderBuilder::new().first_row(2).from_reader(data)?;
        let mut from_csv = Vec::new();
        while let Some(record) = csv.read()? {
            from_csv.push(record);
        }

        let from_sheet = read_all(&sheet)?;
        assert_eq!(from_sheet.len(), 1);
        assert_eq!(from_sheet, from_csv);
        Ok(())
    }

    #[test]
    fn headerless_sheet_gets_generated_keys() -> Result<(), TabError> {
        let reader = ExcelItemReaderBuilder::new()
            .has_headers(false)
            .from_range(&range((0, 0), table()));

        let records = read_all(&reader)?;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["column_1"], "Some Value");
        assert!(reader.read()?.is_none());
        Ok(())
    }

    #[test]
    fn serial_dates_are_formatted_by_their_part() {
        assert_eq!(format_serial(5844.0), "1915-12-31");
        assert_eq!(format_serial(30075.0), "1982-05-04");
        assert_eq!(format_serial(0.0), "00:00:00");
        assert_eq!(format_serial(0.75), "18:00:00");
        assert_eq!(format_serial(30075.5), "1982-05-04 12:00:00");
    }

    #[test]
    fn error_and_empty_cells_render_as_text() {
        assert_eq!(format_cell(&Data::Empty), "");
        assert_eq!(format_cell(&Data::Float(41800000.01)), "41800000.01");
        assert_eq!(format_cell(&Data::Error(CellErrorType::Div0)), "#DIV/0!");
    }

    #[test]
    fn missing_workbook_is_an_excel_error() {
        let result = ExcelItemReaderBuilder::new().from_path("does/not/exist.xlsx");
        assert!(matches!(result, Err(TabError::Excel(_))));
    }
}
