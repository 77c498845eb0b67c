use thiserror::Error;

#[derive(Error, Debug)]
/// Batch error
pub enum BatchError {
    /// A record could not be read or parsed from the source.
    #[error("ItemReader from: {0}")]
    ItemReader(String),

    /// A processor rejected a record.
    #[error("ItemProcessor from: {0}")]
    ItemProcessor(String),

    /// A chunk could not be written to the sink.
    #[error("ItemWriter from: {0}")]
    ItemWriter(String),

    #[error("Step {0} failed")]
    Step(String),

    #[error("Step {0} stopped")]
    Stopped(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
