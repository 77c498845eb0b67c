//! # Delete File Tasklet
//!
//! Best-effort removal of a single file as a batch step.
//!
//! The tasklet never fails its step: a file that cannot be deleted is
//! reported in the log and in the [`DeletionOutcome`], and the job goes on.
//!
//! ## Example
//!
//! ```rust
//! use bookstore_batch::core::job::{Job, JobBuilder};
//! use bookstore_batch::core::step::StepBuilder;
//! use bookstore_batch::tasklet::delete::DeleteFileTaskletBuilder;
//! use std::env::temp_dir;
//! use std::fs;
//!
//! # fn example() -> Result<(), bookstore_batch::BatchError> {
//! let path = temp_dir().join("delete_tasklet_example.txt");
//! fs::write(&path, "to be removed").unwrap();
//!
//! let tasklet = DeleteFileTaskletBuilder::new().path(&path).build()?;
//!
//! let step = StepBuilder::new("Delete file step")
//!     .tasklet(&tasklet)
//!     .allow_start_if_complete(true)
//!     .build();
//!
//! let job = JobBuilder::new()
//!     .name("Delete file job".to_string())
//!     .start(&step)
//!     .build();
//! job.run()?;
//!
//! assert!(!path.exists());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use crate::{
    BatchError,
    core::step::{RepeatStatus, StepExecution, Tasklet},
};
use log::{error, info, warn};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Result of a deletion attempt.
#[derive(Debug, PartialEq)]
pub enum DeletionOutcome {
    /// The file (or empty directory) was removed.
    Deleted,
    /// Nothing was removed: the path does not exist, or is a directory that
    /// is not empty.
    NotDeleted,
    /// The removal failed with an unexpected error.
    Failed(String),
}

/// A tasklet deleting one file.
pub struct DeleteFileTasklet {
    path: PathBuf,
}

impl DeleteFileTasklet {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Attempts the deletion once. Never returns an error.
    pub fn delete(&self) -> DeletionOutcome {
        let result = match fs::symlink_metadata(&self.path) {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir(&self.path),
            Ok(_) => fs::remove_file(&self.path),
            Err(error) => Err(error),
        };

        match result {
            Ok(()) => DeletionOutcome::Deleted,
            Err(error) if Self::is_not_deletable(&error) => DeletionOutcome::NotDeleted,
            Err(error) => DeletionOutcome::Failed(error.to_string()),
        }
    }

    fn is_not_deletable(error: &io::Error) -> bool {
        matches!(
            error.kind(),
            io::ErrorKind::NotFound | io::ErrorKind::DirectoryNotEmpty
        )
    }
}

impl Tasklet for DeleteFileTasklet {
    fn execute(&self, _step_execution: &StepExecution) -> Result<RepeatStatus, BatchError> {
        match self.delete() {
            DeletionOutcome::Deleted => {
                info!("File {} deleted successfully", self.path.display())
            }
            DeletionOutcome::NotDeleted => {
                warn!("It was not possible to delete {}", self.path.display())
            }
            DeletionOutcome::Failed(reason) => error!(
                "Error during deletion of {}: {}",
                self.path.display(),
                reason
            ),
        }

        Ok(RepeatStatus::Finished)
    }
}

/// Builder for [`DeleteFileTasklet`].
#[derive(Default)]
pub struct DeleteFileTaskletBuilder {
    path: Option<PathBuf>,
}

impl DeleteFileTaskletBuilder {
    pub fn new() -> Self {
        Self { path: None }
    }

    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Result<DeleteFileTasklet, BatchError> {
        match self.path {
            Some(path) if !path.as_os_str().is_empty() => Ok(DeleteFileTasklet::new(path)),
            _ => Err(BatchError::Configuration(
                "Path of the file to delete is required".to_string(),
            )),
        }
    }
}
