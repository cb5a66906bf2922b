use std::time::{Duration, Instant};

use log::{debug, error};

use crate::error::TabError;

use super::item::{ItemReader, ItemWriter};

/// Counters gathered while a step drains its reader.
#[derive(Debug)]
pub struct StepResult {
    pub duration: Duration,
    pub read_count: usize,
    pub write_count: usize,
}

/// Moves every item of a reader into a writer, `chunk_size` items at a time.
///
/// The writer is opened before the first chunk and closed after the last one.
/// The first read or write error stops the step. Items read before a read
/// error are still written, the writer is closed so partial output is
/// terminated, and the error is returned.
pub struct Step<'a, T> {
    reader: &'a dyn ItemReader<T>,
    writer: &'a dyn ItemWriter<T>,
    chunk_size: usize,
}

impl<T> Step<'_, T> {
    pub fn execute(&self) -> Result<StepResult, TabError> {
        let start = Instant::now();
        debug!("Start of step");

        self.writer.open()?;

        let mut read_count = 0;
        let mut write_count = 0;
        let mut chunk: Vec<T> = Vec::with_capacity(self.chunk_size);

        let outcome = loop {
            let (finished, read_error) = match self.read_chunk(&mut chunk) {
                Ok(finished) => (finished, None),
                Err(err) => {
                    error!("Error occured during read item: {}", err);
                    (true, Some(err))
                }
            };
            read_count += chunk.len();

            if !chunk.is_empty() {
                if let Err(err) = self.writer.write(&chunk).and_then(|_| self.writer.flush()) {
                    error!("ItemWriter error: {}", err);
                    break Err(err);
                }
                write_count += chunk.len();
            }

            if let Some(err) = read_error {
                debug!("Step stopped: {} read, {} written", read_count, write_count);
                break Err(err);
            }
            if finished {
                break Ok(());
            }
        };

        self.reader.close();
        let closed = self.writer.close();
        outcome?;
        closed?;

        debug!("End of step: {} read, {} written", read_count, write_count);

        Ok(StepResult {
            duration: start.elapsed(),
            read_count,
            write_count,
        })
    }

    /// Fills `chunk`, returning `true` once the reader is exhausted. On error
    /// the items read so far stay in `chunk`.
    fn read_chunk(&self, chunk: &mut Vec<T>) -> Result<bool, TabError> {
        chunk.clear();

        while chunk.len() < self.chunk_size {
            match self.reader.read()? {
                Some(item) => chunk.push(item),
                None => return Ok(true),
            }
        }
        Ok(false)
    }
}

pub struct StepBuilder<'a, T> {
    reader: Option<&'a dyn ItemReader<T>>,
    writer: Option<&'a dyn ItemWriter<T>>,
    chunk_size: usize,
}

impl<T> Default for StepBuilder<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> StepBuilder<'a, T> {
    pub fn new() -> StepBuilder<'a, T> {
        Self {
            reader: None,
            writer: None,
            chunk_size: 1,
        }
    }

    pub fn reader(mut self, reader: &'a impl ItemReader<T>) -> StepBuilder<'a, T> {
        self.reader = Some(reader);
        self
    }

    pub fn writer(mut self, writer: &'a impl ItemWriter<T>) -> StepBuilder<'a, T> {
        self.writer = Some(writer);
        self
    }

    pub fn chunk(mut self, chunk_size: usize) -> StepBuilder<'a, T> {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn build(self) -> Result<Step<'a, T>, TabError> {
        let reader = self
            .reader
            .ok_or_else(|| TabError::MissingField("step reader".to_string()))?;
        let writer = self
            .writer
            .ok_or_else(|| TabError::MissingField("step writer".to_string()))?;

        Ok(Step {
            reader,
            writer,
            chunk_size: self.chunk_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::core::item::ItemReaderResult;

    struct VecReader {
        items: RefCell<Vec<u32>>,
        fail_on: Option<u32>,
    }

    impl ItemReader<u32> for VecReader {
        fn read(&self) -> ItemReaderResult<u32> {
            let mut items = self.items.borrow_mut();
            if items.is_empty() {
                return Ok(None);
            }
            let item = items.remove(0);
            if Some(item) == self.fail_on {
                return Err(TabError::ItemReader(format!("bad item {}", item)));
            }
            Ok(Some(item))
        }
    }

    #[derive(Default)]
    struct VecWriter {
        chunks: RefCell<Vec<Vec<u32>>>,
        closed: Cell<bool>,
    }

    impl ItemWriter<u32> for VecWriter {
        fn write(&self, items: &[u32]) -> Result<(), TabError> {
            self.chunks.borrow_mut().push(items.to_vec());
            Ok(())
        }

        fn close(&self) -> Result<(), TabError> {
            self.closed.set(true);
            Ok(())
        }
    }

    #[test]
    fn step_should_write_items_in_chunks() -> Result<(), TabError> {
        let reader = VecReader {
            items: RefCell::new(vec![1, 2, 3, 4, 5]),
            fail_on: None,
        };
        let writer = VecWriter::default();

        let step = StepBuilder::new()
            .reader(&reader)
            .writer(&writer)
            .chunk(2)
            .build()?;
        let result = step.execute()?;

        assert_eq!(result.read_count, 5);
        assert_eq!(result.write_count, 5);
        assert_eq!(
            *writer.chunks.borrow(),
            vec![vec![1, 2], vec![3, 4], vec![5]]
        );
        assert!(writer.closed.get());
        Ok(())
    }

    #[test]
    fn step_should_stop_at_first_read_error_and_close_writer() {
        let reader = VecReader {
            items: RefCell::new(vec![1, 2, 3]),
            fail_on: Some(1),
        };
        let writer = VecWriter::default();

        let step = StepBuilder::new()
            .reader(&reader)
            .writer(&writer)
            .chunk(10)
            .build()
            .unwrap();

        assert!(matches!(step.execute(), Err(TabError::ItemReader(_))));
        assert!(writer.chunks.borrow().is_empty());
        assert!(writer.closed.get());
    }

    #[test]
    fn step_should_write_items_read_before_an_error_in_the_chunk() {
        let reader = VecReader {
            items: RefCell::new(vec![1, 2, 3, 4, 5]),
            fail_on: Some(4),
        };
        let writer = VecWriter::default();

        let step = StepBuilder::new()
            .reader(&reader)
            .writer(&writer)
            .chunk(2)
            .build()
            .unwrap();

        assert!(matches!(step.execute(), Err(TabError::ItemReader(_))));
        assert_eq!(*writer.chunks.borrow(), vec![vec![1, 2], vec![3]]);
        assert!(writer.closed.get());
    }

    #[test]
    fn builder_without_writer_should_fail() {
        let reader = VecReader {
            items: RefCell::new(vec![]),
            fail_on: None,
        };

        let result = StepBuilder::<u32>::new().reader(&reader).build();
        assert!(matches!(result, Err(TabError::MissingField(_))));
    }
}
