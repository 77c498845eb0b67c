use std::{thread, time::Duration};

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, warn};

use crate::{
    BatchError,
    core::item::{ItemWriter, ItemWriterResult},
};

/// Writer decorator retrying a failed chunk with exponential backoff.
///
/// The whole chunk is handed again to the delegate, so the delegate must
/// write chunks atomically (like [`crate::item::rdbc::SqliteItemWriter`]).
/// After `max_attempts` failed attempts the last error is returned.
///
/// ```
/// use bookstore_batch::core::item::{ItemWriter, ItemWriterResult};
/// use bookstore_batch::item::retry::RetryItemWriter;
/// use std::time::Duration;
///
/// struct Console;
/// impl ItemWriter<String> for Console {
///     fn write(&self, items: &[String]) -> ItemWriterResult {
///         items.iter().for_each(|item| println!("{}", item));
///         Ok(())
///     }
/// }
///
/// let writer = RetryItemWriter::new(&Console, 3, Duration::from_millis(100));
/// writer.write(&["hello".to_string()]).unwrap();
/// ```
pub struct RetryItemWriter<'a, O> {
    delegate: &'a dyn ItemWriter<O>,
    max_attempts: u32,
    backoff: Duration,
}

impl<'a, O> RetryItemWriter<'a, O> {
    /// `max_attempts` counts the first attempt; `0` is treated as `1`.
    pub fn new(delegate: &'a dyn ItemWriter<O>, max_attempts: u32, backoff: Duration) -> Self {
        Self {
            delegate,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Delays between attempts: `backoff`, then doubled on every retry.
    fn policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.backoff,
            initial_interval: self.backoff,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

impl<O> ItemWriter<O> for RetryItemWriter<'_, O> {
    fn write(&self, items: &[O]) -> ItemWriterResult {
        let mut backoff = self.policy();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.delegate.write(items) {
                Ok(()) => {
                    if attempt > 1 {
                        debug!("Chunk written after {} attempts", attempt);
                    }
                    return Ok(());
                }
                Err(error) if attempt < self.max_attempts => {
                    let Some(delay) = backoff.next_backoff() else {
                        return Err(error);
                    };
                    warn!(
                        "Write attempt {}/{} failed: {}, retrying in {:?}",
                        attempt, self.max_attempts, error, delay
                    );
                    thread::sleep(delay);
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn flush(&self) -> ItemWriterResult {
        self.delegate.flush()
    }

    fn open(&self) -> Result<(), BatchError> {
        self.delegate.open()
    }

    fn close(&self) -> Result<(), BatchError> {
        self.delegate.close()
    }
}
