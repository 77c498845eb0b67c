use std::{
    cell::RefCell,
    time::{Duration, Instant},
};

use log::{error, info};
use uuid::Uuid;

use crate::BatchError;

use super::{
    build_name,
    step::{Step, StepExecution, StepStatus},
};

/// Type alias for job execution results.
type JobResult<T> = Result<T, BatchError>;

/// Represents a job that can be executed.
///
/// A job is a container for a sequence of steps that are executed in order.
/// Running the same job again is a restart: steps that failed resume from
/// their cursor, completed steps are skipped unless they allow a new start.
///
/// # Example Usage
///
/// ```rust
/// use bookstore_batch::core::job::{Job, JobBuilder};
/// use bookstore_batch::core::step::{RepeatStatus, StepBuilder, StepExecution, Tasklet};
/// use bookstore_batch::BatchError;
///
/// struct Hello;
///
/// impl Tasklet for Hello {
///     fn execute(&self, _step_execution: &StepExecution) -> Result<RepeatStatus, BatchError> {
///         Ok(RepeatStatus::Finished)
///     }
/// }
///
/// let step = StepBuilder::new("hello").tasklet(&Hello).build();
///
/// let job = JobBuilder::new()
///     .name("hello-job".to_string())
///     .start(&step)
///     .build();
///
/// let execution = job.run().unwrap();
/// assert_eq!(execution.step_executions.len(), 1);
/// ```
pub trait Job {
    /// Runs the job and returns the result of the job execution.
    ///
    /// # Returns
    /// - `Ok(JobExecution)` when the job executes successfully
    /// - `Err(BatchError::Step)` naming the first step that failed
    /// - `Err(BatchError::Stopped)` naming the step that was stopped
    fn run(&self) -> JobResult<JobExecution>;
}

/// Represents the execution of a job.
#[derive(Debug)]
pub struct JobExecution {
    /// The time when the job started executing
    pub start: Instant,
    /// The time when the job finished executing
    pub end: Instant,
    /// The total duration of the job execution
    pub duration: Duration,
    /// Executions of the steps that ran, in order
    pub step_executions: Vec<StepExecution>,
}

/// Represents an instance of a job.
///
/// The instance remembers the last execution of each of its steps, which is
/// what makes a second call to [`Job::run`] a restart.
pub struct JobInstance<'a> {
    /// Unique identifier for this job instance
    id: Uuid,
    /// Human-readable name for the job
    name: String,
    /// Collection of steps that make up this job, in execution order
    steps: Vec<&'a dyn Step>,
    /// Last execution of each step, indexed like `steps`
    executions: RefCell<Vec<Option<StepExecution>>>,
}

impl JobInstance<'_> {
    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Returns the last execution of the step with the given name.
    pub fn get_step_execution(&self, name: &str) -> Option<StepExecution> {
        self.executions
            .borrow()
            .iter()
            .flatten()
            .find(|step_execution| step_execution.name == name)
            .cloned()
    }

    /// Chooses the execution a step runs with, or `None` to skip it.
    fn next_execution(step: &dyn Step, previous: Option<&StepExecution>) -> Option<StepExecution> {
        match previous {
            None => Some(StepExecution::new(step.get_name())),
            Some(previous) if previous.status == StepStatus::Success => {
                if step.allow_start_if_complete() {
                    info!("Step {} already complete, starting again", step.get_name());
                    Some(StepExecution::new(step.get_name()))
                } else {
                    info!("Step {} already complete, skipping", step.get_name());
                    None
                }
            }
            Some(previous) => {
                info!(
                    "Restarting step {} from cursor {}",
                    step.get_name(),
                    previous.cursor
                );
                Some(previous.restart())
            }
        }
    }
}

impl Job for JobInstance<'_> {
    fn run(&self) -> JobResult<JobExecution> {
        let start = Instant::now();

        info!("Start of job: {}, id: {}", self.name, self.id);

        let mut executions = self.executions.borrow_mut();
        let mut step_executions = Vec::with_capacity(self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            let Some(mut step_execution) = Self::next_execution(*step, executions[index].as_ref())
            else {
                continue;
            };

            let result = step.execute(&mut step_execution);
            executions[index] = Some(step_execution.clone());

            if let Err(error) = result {
                error!("Job {} failed at step {}: {}", self.name, step.get_name(), error);
                return Err(match error {
                    BatchError::Stopped(name) => BatchError::Stopped(name),
                    _ => BatchError::Step(step.get_name().to_owned()),
                });
            }

            step_executions.push(step_execution);
        }

        info!("End of job: {}, id: {}", self.name, self.id);

        Ok(JobExecution {
            start,
            end: Instant::now(),
            duration: start.elapsed(),
            step_executions,
        })
    }
}

/// Builder for creating a job instance.
///
/// ```rust,ignore
/// use bookstore_batch::core::job::JobBuilder;
///
/// let job = JobBuilder::new()
///     .name("import-books".to_string())
///     .start(&import_step)
///     .next(&cleanup_step)
///     .build();
/// ```
#[derive(Default)]
pub struct JobBuilder<'a> {
    /// Optional name for the job (generated randomly if not specified)
    name: Option<String>,
    /// Collection of steps to be executed, in order
    steps: Vec<&'a dyn Step>,
}

impl<'a> JobBuilder<'a> {
    pub fn new() -> Self {
        Self {
            name: None,
            steps: Vec::new(),
        }
    }

    pub fn name(mut self, name: String) -> JobBuilder<'a> {
        self.name = Some(name);
        self
    }

    /// Sets the first step of the job.
    pub fn start(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    /// Adds a step to the job. Steps are executed in the order they are added.
    pub fn next(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    /// Builds a `JobInstance`. If no name has been provided, a random name is generated.
    pub fn build(self) -> JobInstance<'a> {
        let executions = RefCell::new(vec![None; self.steps.len()]);
        JobInstance {
            id: Uuid::new_v4(),
            name: self.name.unwrap_or_else(build_name),
            steps: self.steps,
            executions,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use anyhow::Result;

    use crate::{
        BatchError,
        core::step::{RepeatStatus, StepBuilder, StepExecution, StepStatus, Tasklet},
    };

    use super::{Job, JobBuilder};

    /// Fails as many times as configured, then succeeds.
    struct FlakyTasklet {
        runs: Cell<usize>,
        failures: Cell<usize>,
    }

    impl FlakyTasklet {
        fn new(failures: usize) -> Self {
            Self {
                runs: Cell::new(0),
                failures: Cell::new(failures),
            }
        }
    }

    impl Tasklet for FlakyTasklet {
        fn execute(&self, _step_execution: &StepExecution) -> Result<RepeatStatus, BatchError> {
            self.runs.set(self.runs.get() + 1);
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(BatchError::Io(std::io::Error::other("flaky")));
            }
            Ok(RepeatStatus::Finished)
        }
    }

    #[test]
    fn runs_steps_in_order() -> Result<()> {
        let first = FlakyTasklet::new(0);
        let second = FlakyTasklet::new(0);
        let step1 = StepBuilder::new("first").tasklet(&first).build();
        let step2 = StepBuilder::new("second").tasklet(&second).build();

        let job = JobBuilder::new()
            .name("ordered".to_string())
            .start(&step1)
            .next(&step2)
            .build();
        let execution = job.run()?;

        let names: Vec<&str> = execution
            .step_executions
            .iter()
            .map(|step_execution| step_execution.name.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(execution.start <= execution.end);
        assert_eq!(job.get_name(), "ordered");

        Ok(())
    }

    #[test]
    fn failing_step_is_named_and_stops_the_job() {
        let broken = FlakyTasklet::new(1);
        let never = FlakyTasklet::new(0);
        let step1 = StepBuilder::new("broken").tasklet(&broken).build();
        let step2 = StepBuilder::new("never").tasklet(&never).build();

        let job = JobBuilder::new().start(&step1).next(&step2).build();
        let result = job.run();

        assert!(matches!(result, Err(BatchError::Step(name)) if name == "broken"));
        assert_eq!(never.runs.get(), 0);
        assert_eq!(
            job.get_step_execution("broken").map(|execution| execution.status),
            Some(StepStatus::TaskletError)
        );
    }

    #[test]
    fn rerun_skips_completed_steps_and_restarts_failed_ones() -> Result<()> {
        let done = FlakyTasklet::new(0);
        let flaky = FlakyTasklet::new(1);
        let step1 = StepBuilder::new("done").tasklet(&done).build();
        let step2 = StepBuilder::new("flaky").tasklet(&flaky).build();

        let job = JobBuilder::new().start(&step1).next(&step2).build();
        assert!(job.run().is_err());

        let execution = job.run()?;

        assert_eq!(done.runs.get(), 1);
        assert_eq!(flaky.runs.get(), 2);
        assert_eq!(execution.step_executions.len(), 1);
        assert_eq!(execution.step_executions[0].name, "flaky");

        Ok(())
    }

    #[test]
    fn completed_step_runs_again_when_allowed() -> Result<()> {
        let tasklet = FlakyTasklet::new(0);
        let step = StepBuilder::new("repeatable")
            .tasklet(&tasklet)
            .allow_start_if_complete(true)
            .build();

        let job = JobBuilder::new().start(&step).build();
        job.run()?;
        job.run()?;

        assert_eq!(tasklet.runs.get(), 2);

        Ok(())
    }

    #[test]
    fn unnamed_job_gets_generated_name() {
        let job = JobBuilder::new().build();
        assert_eq!(job.get_name().len(), 8);
        assert!(job.run().is_ok());
    }
}
