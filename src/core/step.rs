use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::BatchError;

use super::{
    chunk::Chunk,
    item::{ItemProcessor, ItemReader, ItemWriter},
};

/// Status of a step execution.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum StepStatus {
    /// The step has not run yet.
    Starting,
    /// The step is running.
    Started,
    /// Every chunk was committed, or the tasklet finished.
    Success,
    /// Reading failed, or the skip limit was exceeded while reading.
    ReadError,
    /// Processing failed, or the skip limit was exceeded while processing.
    ProcessorError,
    /// A chunk could not be written.
    WriteError,
    /// The tasklet returned an error.
    TaskletError,
    /// A stop was requested between two chunks.
    Stopped,
}

/// Bookkeeping of one run of a step.
///
/// The `cursor` counts the source records consumed up to the last committed
/// chunk. A restarted execution keeps it so the reader can resume there.
#[derive(Debug, Clone)]
pub struct StepExecution {
    /// Unique identifier for this step execution
    pub id: Uuid,
    /// Human-readable name for the step
    pub name: String,
    /// Current status of the step execution
    pub status: StepStatus,
    pub start_time: Instant,
    pub end_time: Instant,
    pub duration: Duration,
    /// Number of items successfully read
    pub read_count: usize,
    /// Number of items successfully written
    pub write_count: usize,
    /// Number of errors encountered during reading
    pub read_error_count: usize,
    /// Number of errors encountered during processing
    pub process_error_count: usize,
    /// Number of items in chunks that failed to be written
    pub write_error_count: usize,
    /// Number of chunks committed
    pub commit_count: usize,
    /// Position of the reader after the last committed chunk
    pub cursor: usize,
}

impl StepExecution {
    pub fn new(name: &str) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status: StepStatus::Starting,
            start_time: now,
            end_time: now,
            duration: Duration::default(),
            read_count: 0,
            write_count: 0,
            read_error_count: 0,
            process_error_count: 0,
            write_error_count: 0,
            commit_count: 0,
            cursor: 0,
        }
    }

    /// Creates the next execution of the same step, resuming at the saved cursor.
    pub fn restart(&self) -> Self {
        let mut step_execution = Self::new(&self.name);
        step_execution.cursor = self.cursor;
        step_execution
    }
}

pub trait Step {
    /// Executes the step.
    ///
    /// # Returns
    /// - `Ok(())`: The step completed successfully
    /// - `Err(BatchError)`: The step failed or was stopped; `step_execution`
    ///   holds the failure status
    fn execute(&self, step_execution: &mut StepExecution) -> Result<(), BatchError>;

    fn get_name(&self) -> &str;

    /// Whether the step runs again once it has completed in a job instance.
    fn allow_start_if_complete(&self) -> bool {
        false
    }
}

#[derive(Debug, PartialEq)]
pub enum RepeatStatus {
    /// The tasklet can continue to execute.
    Continuable,
    /// The tasklet has finished executing.
    Finished,
}

/// Single-task unit of work run by a [`TaskletStep`].
pub trait Tasklet {
    fn execute(&self, step_execution: &StepExecution) -> Result<RepeatStatus, BatchError>;
}

pub struct TaskletStep<'a> {
    name: String,
    tasklet: &'a dyn Tasklet,
    allow_start_if_complete: bool,
}

impl Step for TaskletStep<'_> {
    fn execute(&self, step_execution: &mut StepExecution) -> Result<(), BatchError> {
        let start_time = Instant::now();
        step_execution.status = StepStatus::Started;

        info!(
            "Start of step: {}, id: {}",
            step_execution.name, step_execution.id
        );

        let result = loop {
            match self.tasklet.execute(step_execution) {
                Ok(RepeatStatus::Finished) => break Ok(()),
                Ok(RepeatStatus::Continuable) => debug!("Tasklet continuable, executing again"),
                Err(error) => break Err(error),
            }
        };

        step_execution.start_time = start_time;
        step_execution.end_time = Instant::now();
        step_execution.duration = start_time.elapsed();

        match result {
            Ok(()) => {
                step_execution.status = StepStatus::Success;
                info!(
                    "End of step: {}, id: {}",
                    step_execution.name, step_execution.id
                );
                Ok(())
            }
            Err(error) => {
                step_execution.status = StepStatus::TaskletError;
                error!("Step {} failed: {}", self.name, error);
                Err(BatchError::Step(self.name.clone()))
            }
        }
    }

    fn get_name(&self) -> &str {
        &self.name
    }

    fn allow_start_if_complete(&self) -> bool {
        self.allow_start_if_complete
    }
}

pub struct TaskletBuilder<'a> {
    name: String,
    tasklet: &'a dyn Tasklet,
    allow_start_if_complete: bool,
}

impl<'a> TaskletBuilder<'a> {
    fn new(name: String, tasklet: &'a dyn Tasklet) -> Self {
        Self {
            name,
            tasklet,
            allow_start_if_complete: false,
        }
    }

    pub fn allow_start_if_complete(mut self, allow: bool) -> Self {
        self.allow_start_if_complete = allow;
        self
    }

    pub fn build(self) -> TaskletStep<'a> {
        TaskletStep {
            name: self.name,
            tasklet: self.tasklet,
            allow_start_if_complete: self.allow_start_if_complete,
        }
    }
}

/// Step that reads, processes and writes items in chunks.
///
/// Each chunk holds at most `chunk_size` items and is handed to the writer in
/// a single call. The cursor of the step execution only moves once the writer
/// accepted the chunk, so a failed chunk is read again on restart.
pub struct ChunkOrientedStep<'a, I, O> {
    name: String,
    /// Component responsible for reading items from the source
    reader: &'a dyn ItemReader<I>,
    /// Component responsible for processing items
    processor: &'a dyn ItemProcessor<I, O>,
    /// Component responsible for writing items to the destination
    writer: &'a dyn ItemWriter<O>,
    /// Number of items to process in each chunk
    chunk_size: u16,
    /// Maximum number of read and process errors tolerated before failing the step
    skip_limit: u16,
    allow_start_if_complete: bool,
    /// Checked between chunks; the step stops once it is set
    stop_signal: Option<&'a AtomicBool>,
}

impl<I, O> Step for ChunkOrientedStep<'_, I, O> {
    fn execute(&self, step_execution: &mut StepExecution) -> Result<(), BatchError> {
        let start_time = Instant::now();
        step_execution.status = StepStatus::Started;

        info!(
            "Start of step: {}, id: {}, cursor: {}",
            step_execution.name, step_execution.id, step_execution.cursor
        );

        let result = self
            .open_streams(step_execution)
            .and_then(|()| self.process_chunks(step_execution));

        // Source and sink are released on every exit path.
        Self::manage_error(self.reader.close());
        Self::manage_error(self.writer.close());

        step_execution.start_time = start_time;
        step_execution.end_time = Instant::now();
        step_execution.duration = start_time.elapsed();

        match result {
            Ok(()) => {
                step_execution.status = StepStatus::Success;
                info!(
                    "End of step: {}, id: {}, read: {}, written: {}, chunks: {}",
                    step_execution.name,
                    step_execution.id,
                    step_execution.read_count,
                    step_execution.write_count,
                    step_execution.commit_count
                );
                Ok(())
            }
            Err(BatchError::Stopped(name)) => {
                warn!("Step {} stopped at cursor {}", name, step_execution.cursor);
                Err(BatchError::Stopped(name))
            }
            Err(error) => {
                error!(
                    "Step {} failed with status {:?} at cursor {}: {}",
                    self.name, step_execution.status, step_execution.cursor, error
                );
                Err(BatchError::Step(self.name.clone()))
            }
        }
    }

    fn get_name(&self) -> &str {
        &self.name
    }

    fn allow_start_if_complete(&self) -> bool {
        self.allow_start_if_complete
    }
}

impl<I, O> ChunkOrientedStep<'_, I, O> {
    fn open_streams(&self, step_execution: &mut StepExecution) -> Result<(), BatchError> {
        if let Err(error) = self.reader.open(step_execution.cursor) {
            step_execution.status = StepStatus::ReadError;
            return Err(error);
        }

        if let Err(error) = self.writer.open() {
            step_execution.status = StepStatus::WriteError;
            return Err(error);
        }

        Ok(())
    }

    fn process_chunks(&self, step_execution: &mut StepExecution) -> Result<(), BatchError> {
        loop {
            if self.is_stop_requested() {
                step_execution.status = StepStatus::Stopped;
                return Err(BatchError::Stopped(self.name.clone()));
            }

            let chunk = self.read_chunk(step_execution)?;

            if chunk.is_empty() {
                debug!("Nothing read in chunk, skipping processing");
            } else {
                let processed_items = self.process_chunk(step_execution, chunk.get_items())?;
                self.write_chunk(step_execution, &processed_items)?;
            }

            step_execution.cursor += chunk.consumed();

            if chunk.is_finished() {
                return Ok(());
            }
        }
    }

    /// Reads a chunk of items from the reader.
    ///
    /// Stops when the chunk is full, when the reader is exhausted, or when a
    /// read error exceeds the skip limit.
    fn read_chunk(&self, step_execution: &mut StepExecution) -> Result<Chunk<I>, BatchError> {
        debug!("Start reading chunk");

        let mut chunk = Chunk::new(self.chunk_size as usize);

        loop {
            match self.reader.read() {
                Ok(Some(item)) => {
                    chunk.add_item(item);
                    step_execution.read_count += 1;

                    if chunk.is_full() {
                        debug!("End reading chunk: FULL");
                        return Ok(chunk);
                    }
                }
                Ok(None) => {
                    debug!("End reading chunk: FINISHED");
                    chunk.finish();
                    return Ok(chunk);
                }
                Err(error) => {
                    warn!("Error reading item: {}", error);
                    chunk.skip_item();
                    step_execution.read_error_count += 1;

                    if self.is_skip_limit_reached(step_execution) {
                        step_execution.status = StepStatus::ReadError;
                        return Err(error);
                    }
                }
            }
        }
    }

    fn process_chunk(
        &self,
        step_execution: &mut StepExecution,
        read_items: &[I],
    ) -> Result<Vec<O>, BatchError> {
        debug!("Processing chunk of {} items", read_items.len());
        let mut result = Vec::with_capacity(read_items.len());

        for item in read_items {
            match self.processor.process(item) {
                Ok(processed_item) => result.push(processed_item),
                Err(error) => {
                    warn!("Error processing item: {}", error);
                    step_execution.process_error_count += 1;

                    if self.is_skip_limit_reached(step_execution) {
                        step_execution.status = StepStatus::ProcessorError;
                        return Err(error);
                    }
                }
            }
        }

        Ok(result)
    }

    /// Hands the whole chunk to the writer. Write errors are never skipped.
    fn write_chunk(
        &self,
        step_execution: &mut StepExecution,
        processed_items: &[O],
    ) -> Result<(), BatchError> {
        if processed_items.is_empty() {
            debug!("No items to write, skipping write call");
            return Ok(());
        }

        debug!("Writing chunk of {} items", processed_items.len());

        match self
            .writer
            .write(processed_items)
            .and_then(|()| self.writer.flush())
        {
            Ok(()) => {
                step_execution.write_count += processed_items.len();
                step_execution.commit_count += 1;
                debug!("Chunk {} committed", step_execution.commit_count);
                Ok(())
            }
            Err(error) => {
                warn!("Error writing items: {}", error);
                step_execution.write_error_count += processed_items.len();
                step_execution.status = StepStatus::WriteError;
                Err(error)
            }
        }
    }

    fn is_skip_limit_reached(&self, step_execution: &StepExecution) -> bool {
        step_execution.read_error_count + step_execution.process_error_count
            > self.skip_limit.into()
    }

    fn is_stop_requested(&self) -> bool {
        self.stop_signal
            .is_some_and(|signal| signal.load(Ordering::SeqCst))
    }

    /// Logs errors from operations that must not fail the step, like closing
    /// a stream.
    fn manage_error(result: Result<(), BatchError>) {
        if let Err(error) = result {
            warn!("Non-fatal error: {}", error);
        }
    }
}

pub struct ChunkOrientedStepBuilder<'a, I, O> {
    name: String,
    reader: Option<&'a dyn ItemReader<I>>,
    processor: Option<&'a dyn ItemProcessor<I, O>>,
    writer: Option<&'a dyn ItemWriter<O>>,
    chunk_size: u16,
    skip_limit: u16,
    allow_start_if_complete: bool,
    stop_signal: Option<&'a AtomicBool>,
}

impl<'a, I, O> ChunkOrientedStepBuilder<'a, I, O> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reader: None,
            processor: None,
            writer: None,
            chunk_size: 10,
            skip_limit: 0,
            allow_start_if_complete: false,
            stop_signal: None,
        }
    }

    pub fn reader(mut self, reader: &'a dyn ItemReader<I>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn processor(mut self, processor: &'a dyn ItemProcessor<I, O>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn writer(mut self, writer: &'a dyn ItemWriter<O>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn chunk_size(mut self, chunk_size: u16) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Number of read and process errors tolerated. `0` fails on the first one.
    pub fn skip_limit(mut self, skip_limit: u16) -> Self {
        self.skip_limit = skip_limit;
        self
    }

    /// Lets a completed step run again from the start of its source. Unless
    /// the writer is idempotent, this writes the same items twice.
    pub fn allow_start_if_complete(mut self, allow: bool) -> Self {
        self.allow_start_if_complete = allow;
        self
    }

    pub fn stop_signal(mut self, stop_signal: &'a AtomicBool) -> Self {
        self.stop_signal = Some(stop_signal);
        self
    }

    pub fn build(self) -> Result<ChunkOrientedStep<'a, I, O>, BatchError> {
        if self.chunk_size == 0 {
            return Err(BatchError::Configuration(
                "Chunk size must be greater than zero".to_string(),
            ));
        }

        Ok(ChunkOrientedStep {
            reader: self.reader.ok_or_else(|| {
                BatchError::Configuration(format!("Reader is required for step {}", self.name))
            })?,
            processor: self.processor.ok_or_else(|| {
                BatchError::Configuration(format!("Processor is required for step {}", self.name))
            })?,
            writer: self.writer.ok_or_else(|| {
                BatchError::Configuration(format!("Writer is required for step {}", self.name))
            })?,
            name: self.name,
            chunk_size: self.chunk_size,
            skip_limit: self.skip_limit,
            allow_start_if_complete: self.allow_start_if_complete,
            stop_signal: self.stop_signal,
        })
    }
}

pub struct StepBuilder {
    name: String,
}

impl StepBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn tasklet(self, tasklet: &dyn Tasklet) -> TaskletBuilder<'_> {
        TaskletBuilder::new(self.name, tasklet)
    }

    pub fn chunk<'a, I, O>(self, chunk_size: u16) -> ChunkOrientedStepBuilder<'a, I, O> {
        ChunkOrientedStepBuilder::new(&self.name).chunk_size(chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::core::item::{ItemProcessorResult, ItemReaderResult, ItemWriterResult};

    /// In-memory reader that can be repositioned like a file reader.
    struct VecReader {
        items: Vec<Result<&'static str, &'static str>>,
        position: Cell<usize>,
        closed: Cell<bool>,
    }

    impl VecReader {
        fn new(items: Vec<Result<&'static str, &'static str>>) -> Self {
            Self {
                items,
                position: Cell::new(0),
                closed: Cell::new(false),
            }
        }
    }

    impl ItemReader<String> for VecReader {
        fn read(&self) -> ItemReaderResult<String> {
            let index = self.position.get();
            match self.items.get(index) {
                Some(Ok(value)) => {
                    self.position.set(index + 1);
                    Ok(Some(value.to_string()))
                }
                Some(Err(message)) => {
                    self.position.set(index + 1);
                    Err(BatchError::ItemReader(message.to_string()))
                }
                None => Ok(None),
            }
        }

        fn open(&self, position: usize) -> Result<(), BatchError> {
            self.position.set(position);
            self.closed.set(false);
            Ok(())
        }

        fn close(&self) -> Result<(), BatchError> {
            self.closed.set(true);
            Ok(())
        }
    }

    struct UpperCaseProcessor;

    impl ItemProcessor<String, String> for UpperCaseProcessor {
        fn process(&self, item: &String) -> ItemProcessorResult<String> {
            if item.is_empty() {
                return Err(BatchError::ItemProcessor("empty item".to_string()));
            }
            Ok(item.to_uppercase())
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        chunks: RefCell<Vec<Vec<String>>>,
        fail_on_call: Cell<Option<usize>>,
        calls: Cell<usize>,
        closed: Cell<bool>,
    }

    impl RecordingWriter {
        fn chunk_sizes(&self) -> Vec<usize> {
            self.chunks.borrow().iter().map(Vec::len).collect()
        }
    }

    impl ItemWriter<String> for RecordingWriter {
        fn write(&self, items: &[String]) -> ItemWriterResult {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if self.fail_on_call.get() == Some(call) {
                return Err(BatchError::ItemWriter("constraint violation".to_string()));
            }
            self.chunks.borrow_mut().push(items.to_vec());
            Ok(())
        }

        fn close(&self) -> ItemWriterResult {
            self.closed.set(true);
            Ok(())
        }
    }

    fn build_step<'a>(
        reader: &'a VecReader,
        processor: &'a UpperCaseProcessor,
        writer: &'a RecordingWriter,
        chunk_size: u16,
    ) -> ChunkOrientedStep<'a, String, String> {
        StepBuilder::new("test")
            .chunk::<String, String>(chunk_size)
            .reader(reader)
            .processor(processor)
            .writer(writer)
            .build()
            .unwrap()
    }

    #[test]
    fn last_chunk_may_be_partial() {
        let reader = VecReader::new(vec![Ok("a"), Ok("b"), Ok("c")]);
        let writer = RecordingWriter::default();
        let step = build_step(&reader, &UpperCaseProcessor, &writer, 2);

        let mut step_execution = StepExecution::new("test");
        step.execute(&mut step_execution).unwrap();

        assert_eq!(writer.chunk_sizes(), vec![2, 1]);
        assert_eq!(*writer.chunks.borrow(), vec![vec!["A", "B"], vec!["C"]]);
        assert_eq!(step_execution.status, StepStatus::Success);
        assert_eq!(step_execution.read_count, 3);
        assert_eq!(step_execution.write_count, 3);
        assert_eq!(step_execution.commit_count, 2);
        assert_eq!(step_execution.cursor, 3);
        assert!(reader.closed.get());
        assert!(writer.closed.get());
    }

    #[test]
    fn full_chunks_when_input_is_a_multiple_of_chunk_size() {
        let reader = VecReader::new(vec![Ok("a"), Ok("b"), Ok("c"), Ok("d")]);
        let writer = RecordingWriter::default();
        let step = build_step(&reader, &UpperCaseProcessor, &writer, 2);

        let mut step_execution = StepExecution::new("test");
        step.execute(&mut step_execution).unwrap();

        assert_eq!(writer.chunk_sizes(), vec![2, 2]);
        assert_eq!(step_execution.commit_count, 2);
    }

    #[test]
    fn empty_source_never_calls_writer() {
        let reader = VecReader::new(vec![]);
        let writer = RecordingWriter::default();
        let step = build_step(&reader, &UpperCaseProcessor, &writer, 2);

        let mut step_execution = StepExecution::new("test");
        step.execute(&mut step_execution).unwrap();

        assert_eq!(writer.calls.get(), 0);
        assert_eq!(step_execution.status, StepStatus::Success);
        assert_eq!(step_execution.cursor, 0);
    }

    #[test]
    fn read_error_fails_step_before_any_commit() {
        let reader = VecReader::new(vec![Ok("dune"), Err("line 2: blank title")]);
        let writer = RecordingWriter::default();
        let step = build_step(&reader, &UpperCaseProcessor, &writer, 2);

        let mut step_execution = StepExecution::new("test");
        let result = step.execute(&mut step_execution);

        assert!(matches!(result, Err(BatchError::Step(name)) if name == "test"));
        assert_eq!(step_execution.status, StepStatus::ReadError);
        assert_eq!(step_execution.read_error_count, 1);
        assert_eq!(step_execution.commit_count, 0);
        assert_eq!(step_execution.cursor, 0);
        assert_eq!(writer.calls.get(), 0);
        assert!(reader.closed.get());
        assert!(writer.closed.get());
    }

    #[test]
    fn read_error_keeps_previously_committed_chunks() {
        let reader = VecReader::new(vec![Ok("a"), Ok("b"), Ok("c"), Err("bad"), Ok("e")]);
        let writer = RecordingWriter::default();
        let step = build_step(&reader, &UpperCaseProcessor, &writer, 2);

        let mut step_execution = StepExecution::new("test");
        assert!(step.execute(&mut step_execution).is_err());

        assert_eq!(writer.chunk_sizes(), vec![2]);
        assert_eq!(step_execution.cursor, 2);
    }

    #[test]
    fn skip_limit_tolerates_malformed_records() {
        let reader = VecReader::new(vec![Ok("a"), Err("bad"), Ok("c")]);
        let writer = RecordingWriter::default();
        let step: ChunkOrientedStep<String, String> = StepBuilder::new("test")
            .chunk(2)
            .reader(&reader)
            .processor(&UpperCaseProcessor)
            .writer(&writer)
            .skip_limit(1)
            .build()
            .unwrap();

        let mut step_execution = StepExecution::new("test");
        step.execute(&mut step_execution).unwrap();

        assert_eq!(*writer.chunks.borrow(), vec![vec!["A", "C"]]);
        assert_eq!(step_execution.read_error_count, 1);
        assert_eq!(step_execution.cursor, 3);
    }

    #[test]
    fn processor_error_fails_step_in_strict_mode() {
        let reader = VecReader::new(vec![Ok("a"), Ok("")]);
        let writer = RecordingWriter::default();
        let step = build_step(&reader, &UpperCaseProcessor, &writer, 2);

        let mut step_execution = StepExecution::new("test");
        assert!(step.execute(&mut step_execution).is_err());

        assert_eq!(step_execution.status, StepStatus::ProcessorError);
        assert_eq!(step_execution.process_error_count, 1);
        assert_eq!(writer.calls.get(), 0);
    }

    #[test]
    fn write_error_stops_step_and_keeps_cursor_at_last_commit() {
        let reader = VecReader::new(vec![Ok("a"), Ok("b"), Ok("c"), Ok("d")]);
        let writer = RecordingWriter::default();
        writer.fail_on_call.set(Some(2));
        let step = build_step(&reader, &UpperCaseProcessor, &writer, 2);

        let mut step_execution = StepExecution::new("test");
        assert!(step.execute(&mut step_execution).is_err());

        assert_eq!(step_execution.status, StepStatus::WriteError);
        assert_eq!(step_execution.commit_count, 1);
        assert_eq!(step_execution.write_count, 2);
        assert_eq!(step_execution.write_error_count, 2);
        assert_eq!(step_execution.cursor, 2);
        assert!(writer.closed.get());
    }

    #[test]
    fn restart_resumes_from_cursor() {
        let reader = VecReader::new(vec![Ok("a"), Ok("b"), Ok("c"), Ok("d")]);
        let writer = RecordingWriter::default();
        writer.fail_on_call.set(Some(2));
        let step = build_step(&reader, &UpperCaseProcessor, &writer, 2);

        let mut first = StepExecution::new("test");
        assert!(step.execute(&mut first).is_err());

        writer.fail_on_call.set(None);
        let mut second = first.restart();
        assert_eq!(second.cursor, 2);
        step.execute(&mut second).unwrap();

        assert_eq!(*writer.chunks.borrow(), vec![vec!["A", "B"], vec!["C", "D"]]);
        assert_eq!(second.read_count, 2);
        assert_eq!(second.cursor, 4);
    }

    #[test]
    fn stop_signal_is_honoured_between_chunks() {
        let reader = VecReader::new(vec![Ok("a"), Ok("b"), Ok("c")]);
        let writer = RecordingWriter::default();
        let stop = AtomicBool::new(true);
        let step: ChunkOrientedStep<String, String> = StepBuilder::new("test")
            .chunk(2)
            .reader(&reader)
            .processor(&UpperCaseProcessor)
            .writer(&writer)
            .stop_signal(&stop)
            .build()
            .unwrap();

        let mut step_execution = StepExecution::new("test");
        let result = step.execute(&mut step_execution);

        assert!(matches!(result, Err(BatchError::Stopped(_))));
        assert_eq!(step_execution.status, StepStatus::Stopped);
        assert_eq!(writer.calls.get(), 0);
        assert!(reader.closed.get());
    }

    #[test]
    fn builder_rejects_invalid_configuration() {
        let reader = VecReader::new(vec![]);
        let writer = RecordingWriter::default();

        let zero_chunk = StepBuilder::new("zero")
            .chunk::<String, String>(0)
            .reader(&reader)
            .processor(&UpperCaseProcessor)
            .writer(&writer)
            .build();
        assert!(matches!(zero_chunk, Err(BatchError::Configuration(_))));

        let missing_writer = StepBuilder::new("no-writer")
            .chunk::<String, String>(2)
            .reader(&reader)
            .processor(&UpperCaseProcessor)
            .build();
        assert!(matches!(missing_writer, Err(BatchError::Configuration(_))));
    }

    struct CountingTasklet {
        remaining: Cell<usize>,
        fail: bool,
    }

    impl Tasklet for CountingTasklet {
        fn execute(&self, _step_execution: &StepExecution) -> Result<RepeatStatus, BatchError> {
            if self.fail {
                return Err(BatchError::Io(std::io::Error::other("boom")));
            }
            match self.remaining.get() {
                0 => Ok(RepeatStatus::Finished),
                remaining => {
                    self.remaining.set(remaining - 1);
                    Ok(RepeatStatus::Continuable)
                }
            }
        }
    }

    #[test]
    fn tasklet_step_repeats_until_finished() {
        let tasklet = CountingTasklet {
            remaining: Cell::new(3),
            fail: false,
        };
        let step = StepBuilder::new("tasklet")
            .tasklet(&tasklet)
            .allow_start_if_complete(true)
            .build();

        let mut step_execution = StepExecution::new("tasklet");
        step.execute(&mut step_execution).unwrap();

        assert_eq!(tasklet.remaining.get(), 0);
        assert_eq!(step_execution.status, StepStatus::Success);
        assert!(step.allow_start_if_complete());
    }

    #[test]
    fn tasklet_error_fails_step() {
        let tasklet = CountingTasklet {
            remaining: Cell::new(0),
            fail: true,
        };
        let step = StepBuilder::new("tasklet").tasklet(&tasklet).build();

        let mut step_execution = StepExecution::new("tasklet");
        let result = step.execute(&mut step_execution);

        assert!(matches!(result, Err(BatchError::Step(name)) if name == "tasklet"));
        assert_eq!(step_execution.status, StepStatus::TaskletError);
    }
}
