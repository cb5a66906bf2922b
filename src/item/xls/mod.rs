/// Spreadsheet support through `calamine`.
///
/// A worksheet is loaded once when the reader is built, then handed out one
/// record per `read`, with the same `sanitize`, `has_headers`, `first_row`
/// and `first_col` options as the delimited-text reader.
///
/// # Examples
///
/// ```no_run
/// use tabutils::core::item::{iter, ItemReader};
/// use tabutils::item::xls::xls_reader::ExcelItemReaderBuilder;
///
/// let reader = ExcelItemReaderBuilder::new()
///     .sheet(2)
///     .first_row(1)
///     .first_col(1)
///     .sanitize(true)
///     .from_path("report.xlsx")
///     .unwrap();
///
/// for record in iter(&reader) {
///     println!("{:?}", record.unwrap());
/// }
/// ```
pub mod xls_reader;

pub use xls_reader::{ExcelItemReader, ExcelItemReaderBuilder};
