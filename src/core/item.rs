use serde_json::{Map, Value};

use crate::error::TabError;

/// One row of tabular data: field names mapped to values in column order.
pub type Record = Map<String, Value>;

/// Outcome of a single `read` call.
///
/// - `Ok(Some(item))` the next item
/// - `Ok(None)` the sequence is exhausted
/// - `Err(_)` the item at this position could not be produced
pub type ItemReaderResult<R> = Result<Option<R>, TabError>;

/// Pull-based source of items.
///
/// Each call performs one unit of work (decode + parse one row) and hands
/// control back to the caller. Implementations release their underlying
/// handle once they return `Ok(None)` or an error, so a second pass yields
/// nothing.
pub trait ItemReader<R> {
    fn read(&self) -> ItemReaderResult<R>;

    /// Releases the underlying source before exhaustion.
    fn close(&self) {}
}

/// Sink of items written chunk by chunk.
pub trait ItemWriter<W> {
    fn write(&self, items: &[W]) -> Result<(), TabError>;

    fn flush(&self) -> Result<(), TabError> {
        Ok(())
    }

    fn open(&self) -> Result<(), TabError> {
        Ok(())
    }

    fn close(&self) -> Result<(), TabError> {
        Ok(())
    }
}

/// Borrowing iterator over an [`ItemReader`].
///
/// Iteration stops after the first error has been yielded.
pub struct ItemReaderIter<'a, R> {
    reader: &'a dyn ItemReader<R>,
    done: bool,
}

impl<'a, R> ItemReaderIter<'a, R> {
    pub fn new(reader: &'a dyn ItemReader<R>) -> Self {
        Self {
            reader,
            done: false,
        }
    }
}

impl<R> Iterator for ItemReaderIter<'_, R> {
    type Item = Result<R, TabError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.read() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
        }
    }
}

/// Iterates any reader of `R` with `for` loops and iterator adapters.
pub fn iter<R>(reader: &dyn ItemReader<R>) -> ItemReaderIter<'_, R> {
    ItemReaderIter::new(reader)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct CountingReader {
        remaining: Cell<usize>,
        fail_at: Option<usize>,
    }

    impl ItemReader<usize> for CountingReader {
        fn read(&self) -> ItemReaderResult<usize> {
            let remaining = self.remaining.get();
            if Some(remaining) == self.fail_at {
                self.remaining.set(0);
                return Err(TabError::ItemReader(format!("failed at {}", remaining)));
            }
            if remaining == 0 {
                return Ok(None);
            }
            self.remaining.set(remaining - 1);
            Ok(Some(remaining))
        }
    }

    #[test]
    fn iterator_yields_every_item_then_stops() {
        let reader = CountingReader {
            remaining: Cell::new(3),
            fail_at: None,
        };

        let items: Vec<usize> = iter(&reader).map(Result::unwrap).collect();
        assert_eq!(items, vec![3, 2, 1]);
    }

    #[test]
    fn iterator_stops_after_first_error() {
        let reader = CountingReader {
            remaining: Cell::new(3),
            fail_at: Some(2),
        };

        let items: Vec<Result<usize, TabError>> = iter(&reader).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(TabError::ItemReader(_))));
    }
}
