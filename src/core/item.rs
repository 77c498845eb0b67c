use crate::error::BatchError;

/// Result of a single read: `Ok(None)` once the source is exhausted.
pub type ItemReaderResult<I> = Result<Option<I>, BatchError>;

pub type ItemProcessorResult<O> = Result<O, BatchError>;

pub type ItemWriterResult = Result<(), BatchError>;

/// Produces the input of a step, one item at a time.
///
/// Readers that can be restarted override [`ItemReader::open`] to reposition
/// themselves `position` items into their source.
pub trait ItemReader<I> {
    fn read(&self) -> ItemReaderResult<I>;

    /// Opens the source and skips the first `position` items.
    fn open(&self, position: usize) -> Result<(), BatchError> {
        if position == 0 {
            Ok(())
        } else {
            Err(BatchError::Configuration(format!(
                "reader cannot restart from position {}",
                position
            )))
        }
    }

    fn close(&self) -> Result<(), BatchError> {
        Ok(())
    }
}

pub trait ItemProcessor<I, O> {
    fn process(&self, item: &I) -> ItemProcessorResult<O>;
}

/// Receives the output of a step, one whole chunk at a time.
pub trait ItemWriter<O> {
    fn write(&self, items: &[O]) -> ItemWriterResult;

    fn flush(&self) -> ItemWriterResult {
        Ok(())
    }

    fn open(&self) -> ItemWriterResult {
        Ok(())
    }

    fn close(&self) -> ItemWriterResult {
        Ok(())
    }
}
