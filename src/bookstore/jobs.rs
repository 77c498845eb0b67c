use std::sync::atomic::AtomicBool;

use log::{debug, info};
use sqlx::{Pool, Sqlite};

use crate::{
    BatchError,
    config::BatchConfig,
    core::{
        job::{Job, JobBuilder, JobExecution},
        step::StepBuilder,
    },
    item::{
        csv::csv_reader::CsvItemReaderBuilder, rdbc::SqliteItemWriterBuilder,
        retry::RetryItemWriter,
    },
    tasklet::delete::DeleteFileTaskletBuilder,
};

use super::{
    BOOKS_TABLE,
    book::{Book, BookBinder, BookProcessor},
};

pub const IMPORT_JOB: &str = "Chunk job";
pub const IMPORT_STEP: &str = "Step chunk csv to jdbc";
pub const DELETE_JOB: &str = "Delete file job";
pub const DELETE_STEP: &str = "Delete file step";

/// Imports `input.path` into the `books` table, `chunk.size` books per
/// transaction.
///
/// Must be called from a multi-threaded tokio runtime. The table has to
/// exist, see [`super::create_schema`]. When `stop_signal` is raised the
/// step stops after the chunk in progress.
///
/// # Errors
///
/// `BatchError::Configuration` when the configuration is incomplete,
/// `BatchError::Step` naming the import step when a line is malformed (past
/// the skip limit) or a chunk is rejected by the database, and
/// `BatchError::Stopped` when a stop was requested.
pub fn run_import_job(
    config: &BatchConfig,
    pool: &Pool<Sqlite>,
    stop_signal: Option<&AtomicBool>,
) -> Result<JobExecution, BatchError> {
    let input = config.input_path()?;
    info!(
        "Importing books from {} in chunks of {}",
        input.display(),
        config.chunk.size
    );

    let reader = CsvItemReaderBuilder::new()
        .delimiter(b';')
        .names(&["title", "isbn"])
        .from_path(input);
    debug!("Reader ready for {}", input.display());

    let processor = BookProcessor;
    let binder = BookBinder;
    debug!("Processor ready: uppercase titles, trim ISBNs");

    let mut writer = SqliteItemWriterBuilder::<Book>::new()
        .pool(pool)
        .table(BOOKS_TABLE)
        .add_column("title")
        .add_column("isbn")
        .item_binder(&binder);
    if let Some(write_timeout) = config.write_timeout() {
        writer = writer.write_timeout(write_timeout);
    }
    let writer = writer.build()?;
    let writer = RetryItemWriter::new(
        &writer,
        config.chunk.write_attempts,
        config.write_backoff(),
    );
    debug!(
        "Writer ready for table {}, timeout {:?}, {} attempts per chunk",
        BOOKS_TABLE,
        config.write_timeout(),
        config.chunk.write_attempts
    );

    let mut step = StepBuilder::new(IMPORT_STEP)
        .chunk::<Book, Book>(config.chunk.size)
        .reader(&reader)
        .processor(&processor)
        .writer(&writer)
        .skip_limit(config.chunk.skip_limit);
    if let Some(stop_signal) = stop_signal {
        step = step.stop_signal(stop_signal);
    }
    let step = step.build()?;
    debug!("Step {} ready, skip limit {}", IMPORT_STEP, config.chunk.skip_limit);

    let job = JobBuilder::new()
        .name(IMPORT_JOB.to_string())
        .start(&step)
        .build();
    debug!("Job {} ready", IMPORT_JOB);

    let execution = job.run()?;

    if let Some(step_execution) = execution.step_executions.first() {
        info!(
            "Imported {} books in {} chunks, {} lines skipped",
            step_execution.write_count,
            step_execution.commit_count,
            step_execution.read_error_count + step_execution.process_error_count
        );
    }

    Ok(execution)
}

/// Deletes `delete.path`. The job succeeds whether or not the file could be
/// removed.
pub fn run_delete_job(config: &BatchConfig) -> Result<JobExecution, BatchError> {
    let tasklet = DeleteFileTaskletBuilder::new()
        .path(config.delete_path()?)
        .build()?;
    debug!("Tasklet ready for {}", tasklet.path().display());

    let step = StepBuilder::new(DELETE_STEP)
        .tasklet(&tasklet)
        .allow_start_if_complete(true)
        .build();
    debug!("Step {} ready", DELETE_STEP);

    let job = JobBuilder::new()
        .name(DELETE_JOB.to_string())
        .start(&step)
        .build();
    debug!("Job {} ready", DELETE_JOB);

    job.run()
}
