use std::path::Path;

use thiserror::Error;

use crate::{CancellationToken, JobId, OutputSink};

/// Outcome of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The computation is still active; run another unit.
    Continue,
    /// The computation cleared its active flag; the loop ends.
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputationError {
    #[error("failed to launch solver: {0}")]
    Launch(String),
    #[error("solver exited with {0}")]
    ExitStatus(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("{0}")]
    Fault(String),
}

impl From<std::io::Error> for ComputationError {
    fn from(err: std::io::Error) -> Self {
        ComputationError::Io(err.to_string())
    }
}

/// What a unit of work gets to see of its job.
#[derive(Debug)]
pub struct JobContext<'a> {
    pub job_id: JobId,
    pub input: &'a Path,
    /// Explicit destination for everything the computation wants shown.
    pub sink: &'a OutputSink,
    /// Long units may poll this to finish early; the runner also checks it
    /// between units.
    pub cancel: &'a CancellationToken,
}

/// A blocking computation driven one unit of work at a time on a job thread.
pub trait Computation: Send {
    /// One solve step plus its output step.
    fn step(&mut self, ctx: &JobContext<'_>) -> Result<Step, ComputationError>;

    /// Releases everything the computation owns. Runs exactly once after the
    /// loop ends, whether it finished, failed or was cancelled.
    fn finish(&mut self, _ctx: &JobContext<'_>) -> Result<(), ComputationError> {
        Ok(())
    }
}

/// Builds a fresh computation for each job.
pub trait ComputationFactory: Send + Sync {
    fn create(&self, input: &Path) -> Result<Box<dyn Computation>, ComputationError>;
}

impl<F> ComputationFactory for F
where
    F: Fn(&Path) -> Result<Box<dyn Computation>, ComputationError> + Send + Sync,
{
    fn create(&self, input: &Path) -> Result<Box<dyn Computation>, ComputationError> {
        self(input)
    }
}
